/*!
 * fastget CLI - thin process entry point
 *
 * Flag parsing, output-path defaulting, size-suffix parsing and signal
 * wiring all live here, deliberately kept out of the engine.
 */

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fastget::{
    CliReporter, DownloadOptions, Engine, HashAlgorithm, HttpFetcher, MultiHashVerifier, Verifier,
};

#[derive(Parser, Debug)]
#[command(name = "fastget", version = fastget::VERSION, about = "Parallel range-based file downloader")]
struct Args {
    /// Origin URL to download
    url: String,

    /// Mirror URL, repeatable; tried in order after the origin on failure
    #[arg(long = "mirror")]
    mirrors: Vec<String>,

    /// Output file path; defaults to the URL's last path segment
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of worker threads (0 = auto-detect)
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Disable resume state (re-download from scratch, ignore any .fastget file)
    #[arg(long = "no-resume")]
    no_resume: bool,

    #[arg(long, default_value_t = 2)]
    retries: u32,

    #[arg(long = "retry-delay-ms", default_value_t = 500)]
    retry_delay_ms: u64,

    /// Maximum transfer rate, e.g. "2m", "500k"; 0 = unlimited
    #[arg(long = "max-rate", default_value = "0")]
    max_rate: String,

    #[arg(long = "chunk-size", default_value_t = 1024 * 1024)]
    chunk_size: u64,

    #[arg(long = "timeout-ms", default_value_t = 0)]
    timeout_ms: u64,

    #[arg(long = "connect-timeout-ms", default_value_t = 0)]
    connect_timeout_ms: u64,

    /// Additional HTTP header, "Name: value"; repeatable
    #[arg(long = "header")]
    headers: Vec<String>,

    #[arg(long = "user-agent")]
    user_agent: Option<String>,

    /// Disable TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Expected checksum of the final file
    #[arg(long)]
    checksum: Option<String>,

    /// Algorithm the --checksum value was computed with
    #[arg(long = "hash-algorithm", default_value = "sha256")]
    hash_algorithm: String,

    #[arg(long)]
    verbose: bool,
}

fn parse_size(value: &str) -> u64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let split = trimmed.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let number: f64 = number.parse().unwrap_or(0.0);
    let multiplier: u64 = match suffix.trim().to_lowercase().as_str() {
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => 1,
    };
    (number * multiplier as f64) as u64
}

fn output_path_from_url(url: &str) -> PathBuf {
    let cleaned = url.split(['?', '#']).next().unwrap_or(url);
    match cleaned.rsplit('/').next() {
        Some(name) if !name.is_empty() => PathBuf::from(name),
        _ => PathBuf::from("downloaded_file"),
    }
}

fn main() {
    let args = Args::parse();
    fastget::logging::init(args.verbose);

    let output = args.output.clone().unwrap_or_else(|| output_path_from_url(&args.url));

    let mut options = DownloadOptions {
        num_threads: fastget::core::concurrency::detect_thread_count(args.threads),
        retries: args.retries,
        retry_delay_ms: args.retry_delay_ms,
        resume_enabled: !args.no_resume,
        initial_chunk_size: args.chunk_size,
        max_rate: parse_size(&args.max_rate),
        ..Default::default()
    };
    options.network.timeout_ms = args.timeout_ms;
    options.network.connect_timeout_ms = args.connect_timeout_ms;
    options.network.verify_tls = !args.insecure;
    options.network.extra_headers = args.headers.clone();
    if let Some(ua) = &args.user_agent {
        options.network.user_agent = ua.clone();
    }

    let fetcher = Arc::new(HttpFetcher::new());
    let reporter = Arc::new(CliReporter);
    let engine = Engine::new(args.url.clone(), args.mirrors.clone(), output.clone(), options, fetcher, reporter);

    install_pause_on_sigint(engine.handle());

    let result = engine.start();

    let success = match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("fastget: {}", e);
            false
        }
    };

    let mut exit_ok = success;
    if success {
        if let Some(expected) = &args.checksum {
            let algorithm: HashAlgorithm = match args.hash_algorithm.parse() {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("fastget: {}", e);
                    std::process::exit(1);
                }
            };
            println!("Verifying {}...", algorithm);
            match (MultiHashVerifier { algorithm }).verify(&output, expected) {
                Ok(true) => println!("Checksum verified: SUCCESS"),
                Ok(false) => {
                    println!("Checksum verified: FAILED (file might be corrupted)");
                    exit_ok = false;
                }
                Err(e) => {
                    eprintln!("fastget: checksum verification error: {}", e);
                    exit_ok = false;
                }
            }
        }
    }

    std::process::exit(if exit_ok { 0 } else { 1 });
}

/// Installs a SIGINT handler that pauses the engine instead of reaching
/// into process-global state. The engine itself holds no signal-related
/// state; only this thin entry point does.
fn install_pause_on_sigint(handle: fastget::EngineHandle) {
    let _ = ctrlc::set_handler(move || {
        eprintln!("\nPausing download safely...");
        handle.pause();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_applies_suffix_multipliers() {
        assert_eq!(parse_size("2m"), 2 * 1024 * 1024);
        assert_eq!(parse_size("500k"), 500 * 1024);
        assert_eq!(parse_size("1g"), 1024 * 1024 * 1024);
        assert_eq!(parse_size("0"), 0);
        assert_eq!(parse_size(""), 0);
    }

    #[test]
    fn output_path_from_url_uses_last_segment() {
        assert_eq!(output_path_from_url("https://example.com/files/a.zip"), PathBuf::from("a.zip"));
        assert_eq!(output_path_from_url("https://example.com/files/a.zip?x=1"), PathBuf::from("a.zip"));
        assert_eq!(output_path_from_url("https://example.com/"), PathBuf::from("downloaded_file"));
    }
}
