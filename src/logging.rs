use std::io::{stderr, stdout, Write};
use std::time::SystemTime;

use humantime::format_rfc3339;
use serde_json::{Map, Value};

pub const ALLOWED_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];

fn current_timestamp() -> String {
    format_rfc3339(SystemTime::now()).to_string()
}

/// Writes one structured JSON line per entry; `error`/`fatal` go to stderr,
/// everything else to stdout. Unknown levels are coerced to `info`.
pub fn emit(level: &str, message: &str, data: Option<Value>) {
    let level = if ALLOWED_LEVELS.contains(&level) {
        level
    } else {
        "info"
    };

    let mut entry = Map::new();
    entry.insert("level".to_string(), Value::String(level.to_string()));
    entry.insert("message".to_string(), Value::String(message.to_string()));
    entry.insert("timestamp".to_string(), Value::String(current_timestamp()));
    if let Some(Value::Object(data)) = data {
        entry.insert("data".to_string(), Value::Object(data));
    }

    if let Ok(serialized) = serde_json::to_string(&entry) {
        if matches!(level, "error" | "fatal") {
            let _ = writeln!(stderr(), "{serialized}");
        } else {
            let _ = writeln!(stdout(), "{serialized}");
        }
    }
}

pub fn info(message: &str, data: Option<Value>) {
    emit("info", message, data);
}

pub fn warn(message: &str, data: Option<Value>) {
    emit("warn", message, data);
}

pub fn error(message: &str, data: Option<Value>) {
    emit("error", message, data);
}
