//! Jitter for retry cooldowns
//!
//! Uses the sub-second part of the system clock as a cheap source of
//! variation; it only spreads retries and needs no real randomness.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Pseudo-random value between 0 and `max_jitter_ms` (inclusive)
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    (nanos % (max_jitter_ms as u128 + 1)) as u64
}

/// `base` plus up to `jitter_percent` percent of it
pub fn with_jitter(base: Duration, jitter_percent: u8) -> Duration {
    if jitter_percent == 0 || base.is_zero() {
        return base;
    }

    let base_ms = base.as_millis() as u64;
    let max_jitter = base_ms.saturating_mul(jitter_percent as u64) / 100;
    base + Duration::from_millis(generate_jitter_ms(max_jitter))
}
