/*!
 * Reporter - the progress/summary sink the engine publishes to
 *
 * Free-form text, not a stable wire contract; the field shapes in `summary`
 * are the stable part.
 */

/// External capability for surfacing progress. Implementation is free; the
/// engine only calls these four methods at the points described in the
/// component design.
pub trait Reporter: Send + Sync {
    fn header(&self, path: &str, total: u64, workers: usize);
    fn progress(&self, downloaded: u64, total: u64, speed_bps: f64);
    fn footer(&self, ok: bool, err_msg: Option<&str>);
    #[allow(clippy::too_many_arguments)]
    fn summary(
        &self,
        total: u64,
        downloaded: u64,
        avg_speed_bps: f64,
        duration_s: u64,
        resumed: bool,
        resumed_bytes: u64,
        workers: usize,
    );
}

/// A `Reporter` that discards everything; useful for library callers and
/// tests that don't care about progress output.
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn header(&self, _path: &str, _total: u64, _workers: usize) {}
    fn progress(&self, _downloaded: u64, _total: u64, _speed_bps: f64) {}
    fn footer(&self, _ok: bool, _err_msg: Option<&str>) {}
    fn summary(
        &self,
        _total: u64,
        _downloaded: u64,
        _avg_speed_bps: f64,
        _duration_s: u64,
        _resumed: bool,
        _resumed_bytes: u64,
        _workers: usize,
    ) {
    }
}

/// A plain `println!`-based terminal reporter: a clear-line progress bar,
/// speed, and ETA, matching the formatting conventions of the CLI.
pub struct CliReporter;

impl Reporter for CliReporter {
    fn header(&self, path: &str, total: u64, workers: usize) {
        println!("Downloading: {}", path);
        println!("Size: {}", format_size(total));
        println!("Connections: {}", workers);
    }

    fn progress(&self, downloaded: u64, total: u64, speed_bps: f64) {
        if total == 0 {
            return;
        }
        let percent = (downloaded as f64 / total as f64) * 100.0;
        let bar_width = 30;
        let pos = (bar_width as f64 * percent / 100.0) as usize;

        let mut bar = String::with_capacity(bar_width);
        for i in 0..bar_width {
            bar.push(if i <= pos { '#' } else { '.' });
        }

        print!("\r\x1b[2KProgress: {:>5.1}% [{}] {}", percent, bar, format_speed(speed_bps));
        if speed_bps > 0.0 {
            let remaining = total.saturating_sub(downloaded);
            let eta = (remaining as f64 / speed_bps) as u64;
            print!(" ETA: {}", format_duration(eta));
        }
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }

    fn footer(&self, ok: bool, err_msg: Option<&str>) {
        println!();
        if ok {
            println!("Download complete!");
        } else {
            eprintln!("Download failed: {}", err_msg.unwrap_or("unknown error"));
        }
    }

    fn summary(
        &self,
        total: u64,
        downloaded: u64,
        avg_speed_bps: f64,
        duration_s: u64,
        resumed: bool,
        resumed_bytes: u64,
        workers: usize,
    ) {
        println!("Summary");
        println!("Total: {}", format_size(total));
        println!("Downloaded: {}", format_size(downloaded));
        println!("Average speed: {}", format_speed(avg_speed_bps));
        println!("Time: {}", format_duration(duration_s));
        if resumed {
            println!("Resumed: {}", format_size(resumed_bytes));
        }
        println!("Connections: {}", workers);
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn format_speed(speed_bps: f64) -> String {
    format!("{}/s", format_size(speed_bps as u64))
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_scales_units() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn format_duration_switches_units() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3700), "1h 1m");
    }

    #[test]
    fn noop_reporter_accepts_all_calls() {
        let r = NoopReporter;
        r.header("out.bin", 100, 4);
        r.progress(50, 100, 1000.0);
        r.footer(true, None);
        r.summary(100, 100, 1000.0, 1, false, 0, 4);
    }
}
