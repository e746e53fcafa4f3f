use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::diff::diff_json;
use crate::protocol::redact;

/// How response bodies are written to the traffic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every response body in full.
    Full,
    /// First response per path in full, then only the changed fields.
    Diffed,
}

/// NDJSON log of API traffic. Secrets are redacted before anything is written.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    /// Last successful body per path, for diffed mode.
    last_body: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            last_body: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        self.append(
            "req",
            json!({ "method": method, "path": path, "body": body.map(redact) }),
        );
    }

    pub fn log_command(&mut self, action: &str, device_id: u64, body: &Value) {
        self.append(
            "cmd",
            json!({ "action": action, "device": device_id, "body": redact(body) }),
        );
    }

    pub fn log_response(&mut self, path: &str, status: u16, body: &Value) {
        let body = redact(body);
        let ok = (200..300).contains(&status);
        let fields = match self.mode {
            MessageLogMode::Full => json!({ "path": path, "status": status, "body": body }),
            MessageLogMode::Diffed => match self.last_body.get(path).filter(|_| ok) {
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(prev, &body, "", &mut changes);
                    let changes: Vec<Value> = changes
                        .into_iter()
                        .map(|(field, old, new)| json!({ "path": field, "old": old, "new": new }))
                        .collect();
                    json!({ "path": path, "status": status, "changes": changes })
                }
                None => json!({ "path": path, "status": status, "full": true, "body": body }),
            },
        };
        self.append("resp", fields);
        if self.mode == MessageLogMode::Diffed && ok {
            self.last_body.insert(path.to_string(), body);
        }
    }

    /// Write one line: timestamp and direction first, then `fields`.
    fn append(&mut self, dir: &str, fields: Value) {
        let mut entry = Map::new();
        entry.insert("ts".into(), Value::String(Utc::now().to_rfc3339()));
        entry.insert("dir".into(), Value::String(dir.to_string()));
        if let Value::Object(fields) = fields {
            entry.extend(fields);
        }
        let line = Value::Object(entry).to_string();
        if let Err(e) = writeln!(self.file, "{line}") {
            warn!("failed to write traffic log entry: {e}");
        }
    }
}
