use std::time::{Duration, SystemTime, UNIX_EPOCH};

use humantime::format_rfc3339_seconds;

const UNIT_LADDER: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];

/// Converts a raw millisecond epoch timestamp to an instant. `None` and NaN
/// both mean the field was never set; zero is the epoch start and is kept.
pub fn timestamp_from_millis(value: Option<f64>) -> Option<SystemTime> {
    let millis = value?;
    if millis.is_nan() {
        return None;
    }
    if millis >= 0.0 {
        Some(UNIX_EPOCH + Duration::from_millis(millis as u64))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_millis(-millis as u64))
    }
}

pub fn render_timestamp(instant: Option<SystemTime>) -> Option<String> {
    instant.map(|t| format_rfc3339_seconds(t).to_string())
}

/// Human-readable byte count. The unit ladder and the two precision rules
/// (3-width with a space below the ladder, plain width for the Z fallback)
/// are a golden-output contract relied upon by downstream tooling.
pub fn format_file_size(num: f64) -> String {
    let mut value = num;
    for unit in UNIT_LADDER {
        if value.abs() < 1024.0 {
            return format!("{value:3.1} {unit}B");
        }
        value /= 1024.0;
    }
    format!("{value:.1}ZB")
}
