//! UI-agnostic trim-range and playback controller for Cliptrim.

pub mod api;
pub mod clip;
pub mod config;
pub mod dispatch;
pub mod editors;
pub mod error;
pub mod playback;
pub mod range;
pub mod session;
pub mod source;
pub mod time;
pub mod widget;

#[cfg(test)]
mod testing;

pub use api::{Command, Engine, EngineErrorEvent, EngineErrorKind, Event};
pub use clip::{ClipFormat, ClipRequest, WireClipRequest};
pub use config::{ClipperConfig, DispatchMode};
pub use dispatch::{
    ClipDispatcher, HttpClipDispatcher, LocalClipDispatcher, SavedClip, dispatcher_from_config,
};
pub use editors::{PositionScrubber, RangeSlider, TimeField, TimeFields};
pub use error::{EngineError, Result};
pub use playback::{PlaybackAdapter, PlaybackState};
pub use range::{RangeModel, RangeSnapshot, Reconciliation};
pub use session::Session;
pub use source::{SourceRef, extract_video_id};
pub use time::{format_timestamp, parse_timestamp, try_parse_timestamp};
pub use widget::{
    PlayerBackend, SessionId, SignalSink, TaggedSignal, VideoWidget, WidgetSignal, WidgetState,
};
