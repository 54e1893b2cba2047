use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{MpvError, Result};
use crate::protocol::{Incoming, encode_command, parse_line};

type Reply = std::result::Result<Value, String>;
type PendingReplies = Arc<Mutex<HashMap<u64, Sender<Reply>>>>;

/// Request/reply channel to one mpv IPC socket.
///
/// A reader thread routes replies to their waiting request by
/// `request_id` and hands property changes to a callback.
pub struct IpcConnection {
    stream: UnixStream,
    pending: PendingReplies,
    next_request_id: u64,
    reply_timeout: Duration,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for IpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcConnection")
            .field("next_request_id", &self.next_request_id)
            .field("reply_timeout", &self.reply_timeout)
            .finish_non_exhaustive()
    }
}

impl IpcConnection {
    pub fn connect<F>(path: &Path, reply_timeout: Duration, on_property: F) -> Result<Self>
    where
        F: FnMut(&str, &Value) + Send + 'static,
    {
        let stream = UnixStream::connect(path).map_err(|source| MpvError::Io {
            context: "connect to mpv IPC socket",
            source,
        })?;
        let read_half = stream.try_clone().map_err(|source| MpvError::Io {
            context: "clone mpv IPC stream",
            source,
        })?;

        let pending = PendingReplies::default();
        let reader = {
            let pending = Arc::clone(&pending);
            thread::spawn(move || read_loop(read_half, pending, on_property))
        };

        Ok(Self {
            stream,
            pending,
            next_request_id: 1,
            reply_timeout,
            reader: Some(reader),
        })
    }

    /// Sends a command and waits for its reply.
    pub fn command(&mut self, args: &[Value]) -> Result<Value> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.pending
            .lock()
            .map_err(|_| MpvError::Disconnected)?
            .insert(request_id, reply_tx);

        if let Err(error) = self.write(request_id, args) {
            self.forget(request_id);
            return Err(error);
        }

        match reply_rx.recv_timeout(self.reply_timeout) {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(error)) => Err(MpvError::Command {
                command: describe(args),
                error,
            }),
            Err(RecvTimeoutError::Timeout) => {
                self.forget(request_id);
                Err(MpvError::ReplyTimeout {
                    command: describe(args),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(MpvError::Disconnected),
        }
    }

    /// Sends a command without waiting for a reply.
    pub fn send(&mut self, args: &[Value]) -> Result<()> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.write(request_id, args)
    }

    pub fn get_property(&mut self, name: &str) -> Result<Value> {
        self.command(&[json!("get_property"), json!(name)])
    }

    pub fn get_f64(&mut self, name: &str) -> Result<f64> {
        let value = self.get_property(name)?;
        value.as_f64().ok_or_else(|| MpvError::UnexpectedReply {
            property: name.to_owned(),
            value: value.to_string(),
        })
    }

    pub fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        self.command(&[json!("set_property"), json!(name), value])
            .map(|_| ())
    }

    pub fn observe_property(&mut self, id: u64, name: &str) -> Result<()> {
        self.command(&[json!("observe_property"), json!(id), json!(name)])
            .map(|_| ())
    }

    fn write(&mut self, request_id: u64, args: &[Value]) -> Result<()> {
        let line = encode_command(request_id, args);
        self.stream
            .write_all(line.as_bytes())
            .and_then(|()| self.stream.flush())
            .map_err(|source| MpvError::Io {
                context: "write mpv IPC command",
                source,
            })
    }

    fn forget(&self, request_id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&request_id);
        }
    }
}

impl Drop for IpcConnection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            warn!("mpv IPC reader thread panicked");
        }
    }
}

fn read_loop<F>(stream: UnixStream, pending: PendingReplies, mut on_property: F)
where
    F: FnMut(&str, &Value),
{
    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                debug!(%error, "mpv IPC read ended");
                break;
            }
        };
        match parse_line(&line) {
            Some(Incoming::Reply { request_id, result }) => {
                let waiter = pending
                    .lock()
                    .ok()
                    .and_then(|mut pending| pending.remove(&request_id));
                if let Some(waiter) = waiter {
                    let _ = waiter.send(result);
                }
            }
            Some(Incoming::PropertyChange { name, data }) => on_property(&name, &data),
            Some(Incoming::Event { name }) => debug!(event = %name, "mpv event"),
            None => debug!(line = %line, "ignoring unparsable mpv IPC line"),
        }
    }

    if let Ok(mut pending) = pending.lock() {
        pending.clear();
    }
}

fn describe(args: &[Value]) -> String {
    args.first()
        .and_then(Value::as_str)
        .unwrap_or("command")
        .to_owned()
}
