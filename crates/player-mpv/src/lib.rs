//! mpv-backed video widget driven over mpv's JSON IPC socket.
#![cfg(unix)]

mod backend;
mod error;
mod ipc;
mod protocol;
mod tracker;

pub use backend::{MpvBackend, MpvWidget};
pub use error::{MpvError, Result};
pub use ipc::IpcConnection;
pub use tracker::StateTracker;
