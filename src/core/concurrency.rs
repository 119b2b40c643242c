/*!
 * Default worker-thread count detection
 */

/// Detects a sane default thread count when the caller passes `0`, i.e.
/// "auto". Falls back to `1` and logs a warning if detection fails, since
/// `std::thread::available_parallelism` can fail in restricted containers.
pub fn detect_thread_count(requested: usize) -> usize {
    if requested != 0 {
        return requested;
    }
    num_cpus::get()
}

mod num_cpus {
    use std::thread;

    pub fn get() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|e| {
                eprintln!(
                    "WARN: fastget failed to detect available parallelism: {}. \
                    Defaulting to 1 worker thread.",
                    e
                );
                1
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_thread_count_is_passed_through() {
        assert_eq!(detect_thread_count(8), 8);
    }

    #[test]
    fn auto_detect_never_returns_zero() {
        assert!(detect_thread_count(0) >= 1);
    }
}
