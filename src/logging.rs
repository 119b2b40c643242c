/*!
 * Logging and tracing initialization
 */

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging on stdout, driven by `FASTGET_LOG` (falling
/// back to `RUST_LOG`, then to `verbose`).
pub fn init(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_env("FASTGET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("fastget={}", default_level)));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
}

/// Initialize logging once for tests, ignoring re-init errors.
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fastget=debug"));
        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();
        let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic() {
        init_test_logging();
    }
}
