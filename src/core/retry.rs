/*!
 * Retry delay helper used between failed attempts across all mirrors
 */

use std::thread;
use std::time::Duration;

use rand::Rng;

/// Sleeps `retry_delay_ms`, plus up to 10% jitter, so that many workers
/// retrying in lockstep don't all hammer the same mirror at once.
pub fn sleep_before_retry(retry_delay_ms: u64) {
    if retry_delay_ms == 0 {
        return;
    }
    let jitter_ms = rand::rng().random_range(0..=(retry_delay_ms / 10).max(1));
    thread::sleep(Duration::from_millis(retry_delay_ms + jitter_ms));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleeps_at_least_the_configured_delay() {
        let start = Instant::now();
        sleep_before_retry(10);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn zero_delay_returns_immediately() {
        let start = Instant::now();
        sleep_before_retry(0);
        assert!(start.elapsed() < Duration::from_millis(5));
    }
}
