//! A single seam for reading wall-clock time, so that timeline and scheduler tests can offset
//! "now" without mocking a whole clock trait.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}
