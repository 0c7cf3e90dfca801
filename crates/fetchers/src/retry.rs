use rand::Rng;
use std::time::Duration;

/// Exponential backoff delay for attempt `attempt` (0-indexed), doubling
/// from `base` and capped at `cap`, with up to `jitter_max` added on top.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration, jitter_max: Duration) -> Duration {
    let doubled = base.saturating_mul(1u32 << attempt.min(16));
    let capped = doubled.min(cap);
    let jitter = if jitter_max.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_max.as_millis() as u64))
    };
    capped + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_cap() {
        let base = Duration::from_millis(250);
        let cap = Duration::from_millis(3000);
        let jitter = Duration::from_millis(120);

        assert!(backoff_delay(0, base, cap, jitter) >= base);
        assert!(backoff_delay(0, base, cap, jitter) <= base + jitter);

        // By attempt 4, 250ms * 2^4 = 4000ms, which should already be capped.
        let delay = backoff_delay(4, base, cap, jitter);
        assert!(delay <= cap + jitter);
    }
}
