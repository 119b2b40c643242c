/*!
 * Fetcher - the ranged-GET capability the engine consumes
 *
 * The engine owns the wire-facing contract (Range header, acceptance of
 * 200/206, size-probe strategy); the actual HTTP transport is a swappable
 * implementation of this trait.
 */

use std::io::Read;
use std::time::{Duration, Instant};

use crate::core::bandwidth;

/// Per-request network options. When `max_recv_bytes_per_sec > 0`, the
/// caller (Engine) has already divided the global cap by worker count.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_recv_bytes_per_sec: u64,
    pub verify_tls: bool,
    pub user_agent: String,
    pub extra_headers: Vec<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            timeout_ms: 0,
            connect_timeout_ms: 0,
            max_recv_bytes_per_sec: 0,
            verify_tls: true,
            user_agent: "fastget/1.1".to_string(),
            extra_headers: Vec::new(),
        }
    }
}

pub enum SizeProbe {
    Known(u64),
    Unknown,
}

pub enum FetchOutcome {
    Success { bytes: Vec<u8>, elapsed: Duration },
    Transient(String),
    Permanent(String),
}

/// External capability the engine consumes for HEAD / ranged-GET. No
/// content transformation (no decompression, no hashing) happens here or in
/// the engine - that is deliberately out of scope.
pub trait Fetcher: Send + Sync {
    /// Tries HEAD first; if the server refuses or returns no Content-Length,
    /// implementations should fall back to a zero-byte range request and
    /// parse `Content-Range`. Must follow redirects. Never fabricate a size:
    /// return `Unknown` on total failure.
    fn probe_size(&self, url: &str, opts: &RequestOptions) -> SizeProbe;

    /// HTTP status 200 and 206 are both accepted. Carries the raw body
    /// bytes and wall-clock elapsed time for speed measurement.
    fn fetch_range(&self, url: &str, start: u64, end_inclusive: u64, opts: &RequestOptions) -> FetchOutcome;
}

/// Default `Fetcher` backed by a blocking `reqwest::Client`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher { client: reqwest::blocking::Client::new() }
    }

    fn build_client(opts: &RequestOptions) -> reqwest::blocking::Client {
        let mut builder = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!opts.verify_tls)
            .user_agent(opts.user_agent.clone());
        if opts.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(opts.timeout_ms));
        }
        if opts.connect_timeout_ms > 0 {
            builder = builder.connect_timeout(Duration::from_millis(opts.connect_timeout_ms));
        }
        builder.build().unwrap_or_else(|_| reqwest::blocking::Client::new())
    }

    fn apply_headers(
        mut req: reqwest::blocking::RequestBuilder,
        opts: &RequestOptions,
    ) -> reqwest::blocking::RequestBuilder {
        for header in &opts.extra_headers {
            if let Some((name, value)) = header.split_once(':') {
                req = req.header(name.trim(), value.trim());
            }
        }
        req
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn probe_size(&self, url: &str, opts: &RequestOptions) -> SizeProbe {
        let client = Self::build_client(opts);

        let head = Self::apply_headers(client.head(url), opts).send();
        if let Ok(resp) = head {
            if let Some(len) = resp.content_length() {
                if len > 0 {
                    return SizeProbe::Known(len);
                }
            }
        }

        let zero_range = Self::apply_headers(client.get(url), opts)
            .header("Range", "bytes=0-0")
            .send();
        if let Ok(resp) = zero_range {
            if let Some(total) = parse_content_range_total(resp.headers()) {
                return SizeProbe::Known(total);
            }
        }

        SizeProbe::Unknown
    }

    fn fetch_range(&self, url: &str, start: u64, end_inclusive: u64, opts: &RequestOptions) -> FetchOutcome {
        let client = Self::build_client(opts);
        let range = format!("bytes={}-{}", start, end_inclusive);
        let started = Instant::now();

        let response = Self::apply_headers(client.get(url), opts)
            .header("Range", &range)
            .send();

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() == 200 || status.as_u16() == 206 {
                    match read_body(resp, opts.max_recv_bytes_per_sec) {
                        Ok(bytes) => FetchOutcome::Success { bytes, elapsed: started.elapsed() },
                        Err(e) => FetchOutcome::Transient(e),
                    }
                } else if status.is_client_error() {
                    FetchOutcome::Permanent(format!("HTTP {}", status))
                } else {
                    FetchOutcome::Transient(format!("HTTP {}", status))
                }
            }
            Err(e) => FetchOutcome::Transient(e.to_string()),
        }
    }
}

/// Reads the response body to completion, applying `bandwidth::apply_limit`
/// per chunk when `max_bytes_per_sec > 0`. A cap of 0 means unlimited and
/// reads the whole body in one shot.
fn read_body(mut resp: reqwest::blocking::Response, max_bytes_per_sec: u64) -> Result<Vec<u8>, String> {
    if max_bytes_per_sec == 0 {
        return resp.bytes().map(|b| b.to_vec()).map_err(|e| e.to_string());
    }

    let mut body = Vec::new();
    let mut buf = [0u8; 64 * 1024];
    let mut last_check = Instant::now();
    loop {
        let n = resp.read(&mut buf).map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
        bandwidth::apply_limit(n as u64, max_bytes_per_sec, &mut last_check);
    }
    Ok(body)
}

fn parse_content_range_total(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let value = headers.get(reqwest::header::CONTENT_RANGE)?.to_str().ok()?;
    let slash = value.rfind('/')?;
    value[slash + 1..].trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_options_has_standard_user_agent() {
        let opts = RequestOptions::default();
        assert_eq!(opts.user_agent, "fastget/1.1");
        assert_eq!(opts.max_recv_bytes_per_sec, 0);
    }

    #[test]
    fn parse_content_range_total_extracts_trailing_size() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_RANGE,
            "bytes 0-0/10485760".parse().unwrap(),
        );
        assert_eq!(parse_content_range_total(&headers), Some(10_485_760));
    }

    #[test]
    fn parse_content_range_total_is_none_when_header_absent() {
        let headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_content_range_total(&headers), None);
    }
}
