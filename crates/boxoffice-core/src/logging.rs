//! HTTP wire log.
//!
//! Appends one timestamped line per request and response to
//! `{log_dir}/{log_id}.log`, which is what you want open in a second terminal
//! while debugging a CSRF handshake. Secrets are redacted before writing.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

const REDACTED: &str = "***";

/// Body fields never written to the log.
const SECRET_FIELDS: &[&str] = &["password", "password_confirmation", "token"];

/// Headers whose values are never written to the log.
const SECRET_HEADERS: &[&str] = &["authorization", "x-xsrf-token", "x-csrf-token", "cookie"];

fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), direction, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) a log file at `{log_dir}/{log_id}.log` and return a shared handle.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{}.log", log_id)))
            .ok()
    });
    Arc::new(Mutex::new(file))
}

/// A handle that drops every line.
pub fn disabled_log() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Copy of `value` with secret fields replaced, recursively.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    if SECRET_FIELDS.contains(&key.as_str()) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_json(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}

/// Header value safe to log.
pub fn redact_header<'a>(name: &str, value: &'a str) -> &'a str {
    if SECRET_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
        REDACTED
    } else {
        value
    }
}

/// Redact a raw response body if it parses as JSON; otherwise log it as-is.
pub fn redact_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => redact_json(&value).to_string(),
        Err(_) => body.to_string(),
    }
}
