//! Delay schedule between retry attempts.
//!
//! Doubles from a base delay up to a cap, then adds up to 10% random jitter so
//! callers of a recovering dependency spread their retries out.

use std::time::Duration;

use rand::Rng;

/// Delay to wait after `attempt` (1-based) failed. Attempt 0 waits nothing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(exponent) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(max_ms);
    Duration::from_millis(delay_ms + jitter_ms(delay_ms))
}

fn jitter_ms(delay_ms: u64) -> u64 {
    match delay_ms / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    }
}
