use std::time::Duration;

/// Duration of a beacon chain slot.
pub const SLOT_DURATION_MS: u64 = 12_000;

/// Largest slot count whose duration in milliseconds still fits an `i64` timestamp offset.
pub const MAX_SLOTS_JUMP: u64 = i64::MAX as u64 / SLOT_DURATION_MS;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Time covered by `slots` consecutive beacon slots.
pub fn slots_to_duration(slots: u64) -> Duration {
    Duration::from_millis(slots.saturating_mul(SLOT_DURATION_MS))
}
