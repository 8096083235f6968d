use std::time::{SystemTime, UNIX_EPOCH};

pub fn unix_millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

pub fn now_unix_millis() -> u64 {
    unix_millis(SystemTime::now()).unwrap_or(0)
}

pub(crate) fn now_unix_micros() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros()
}
