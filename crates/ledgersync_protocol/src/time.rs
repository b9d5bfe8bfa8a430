//! Timestamp helper shared by device and server code.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as Unix milliseconds.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
