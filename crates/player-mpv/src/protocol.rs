//! Line-delimited JSON messages of mpv's IPC protocol.

use serde_json::{Value, json};

/// One parsed line received from mpv.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Incoming {
    Reply {
        request_id: u64,
        result: std::result::Result<Value, String>,
    },
    PropertyChange {
        name: String,
        data: Value,
    },
    Event {
        name: String,
    },
}

/// Serializes one command, newline-terminated.
pub(crate) fn encode_command(request_id: u64, args: &[Value]) -> String {
    let mut line = json!({ "command": args, "request_id": request_id }).to_string();
    line.push('\n');
    line
}

pub(crate) fn parse_line(line: &str) -> Option<Incoming> {
    let message: Value = serde_json::from_str(line.trim()).ok()?;

    if let Some(event) = message.get("event").and_then(Value::as_str) {
        if event == "property-change" {
            let name = message.get("name")?.as_str()?.to_owned();
            let data = message.get("data").cloned().unwrap_or(Value::Null);
            return Some(Incoming::PropertyChange { name, data });
        }
        return Some(Incoming::Event {
            name: event.to_owned(),
        });
    }

    let request_id = message.get("request_id")?.as_u64()?;
    let error = message.get("error").and_then(Value::as_str).unwrap_or("success");
    let result = if error == "success" {
        Ok(message.get("data").cloned().unwrap_or(Value::Null))
    } else {
        Err(error.to_owned())
    };
    Some(Incoming::Reply { request_id, result })
}
