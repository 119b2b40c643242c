/*!
 * Bandwidth throttling for a single worker's ranged-GET reads
 */

use std::thread;
use std::time::{Duration, Instant};

/// Sleeps as needed to keep `bytes_read` bytes read since `last_check` from
/// exceeding `max_bandwidth` bytes/sec, then rolls `last_check` forward once
/// a full second has elapsed. Call once per chunk read from the response
/// body, not once per whole fetch.
pub fn apply_limit(bytes_read: u64, max_bandwidth: u64, last_check: &mut Instant) {
    let elapsed = last_check.elapsed();
    let elapsed_secs = elapsed.as_secs_f64();

    if elapsed_secs < 1.0 {
        let bytes_per_sec = if elapsed_secs > 0.0 {
            bytes_read as f64 / elapsed_secs
        } else {
            f64::INFINITY
        };
        if bytes_per_sec > max_bandwidth as f64 {
            let sleep_time =
                Duration::from_secs_f64((bytes_read as f64 / max_bandwidth as f64) - elapsed_secs);
            thread::sleep(sleep_time);
        }
    }

    if elapsed >= Duration::from_secs(1) {
        *last_check = Instant::now();
    }
}
