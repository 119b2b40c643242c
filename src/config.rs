/*!
 * Engine configuration and TOML-backed overrides
 */

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FastgetError, Result};
use crate::fetcher::RequestOptions;

/// Engine-facing download options.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub num_threads: usize,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub resume_enabled: bool,
    pub initial_chunk_size: u64,
    /// Global rate cap in bytes/sec, 0 = unlimited.
    pub max_rate: u64,
    pub network: NetworkOptions,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            num_threads: 8,
            retries: 2,
            retry_delay_ms: 500,
            resume_enabled: true,
            initial_chunk_size: crate::core::plan::DEFAULT_CHUNK_SIZE,
            max_rate: 0,
            network: NetworkOptions::default(),
        }
    }
}

impl DownloadOptions {
    /// Per-request options for one worker, dividing the global rate cap
    /// equally across threads (falling back to the full cap if the
    /// division underflows to zero).
    pub fn request_options(&self) -> RequestOptions {
        let mut opts = RequestOptions {
            timeout_ms: self.network.timeout_ms,
            connect_timeout_ms: self.network.connect_timeout_ms,
            verify_tls: self.network.verify_tls,
            user_agent: self.network.user_agent.clone(),
            extra_headers: self.network.extra_headers.clone(),
            max_recv_bytes_per_sec: 0,
        };
        if self.max_rate > 0 {
            let threads = self.num_threads.max(1) as u64;
            let per_thread = self.max_rate / threads;
            opts.max_recv_bytes_per_sec = if per_thread == 0 { self.max_rate } else { per_thread };
        }
        opts
    }
}

#[derive(Debug, Clone)]
pub struct NetworkOptions {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub verify_tls: bool,
    pub user_agent: String,
    pub extra_headers: Vec<String>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        NetworkOptions {
            timeout_ms: 0,
            connect_timeout_ms: 0,
            verify_tls: true,
            user_agent: "fastget/1.1".to_string(),
            extra_headers: Vec::new(),
        }
    }
}

/// TOML-backed overrides, loaded with project-then-home fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: ConfigDefaults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub num_threads: Option<usize>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub resume_enabled: Option<bool>,
    pub initial_chunk_size: Option<u64>,
    pub max_rate: Option<u64>,
    pub user_agent: Option<String>,
    pub verify_tls: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FastgetError::Config(format!("failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| FastgetError::Config(format!("failed to parse config file: {}", e)))
    }

    /// Load with fallback priority: `./fastget.toml` -> `~/.fastget/fastget.toml`
    /// -> built-in defaults.
    pub fn load_with_fallback() -> Self {
        if let Ok(config) = Self::load(Path::new("fastget.toml")) {
            return config;
        }
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".fastget").join("fastget.toml");
            if let Ok(config) = Self::load(&user_config) {
                return config;
            }
        }
        Self::default()
    }

    /// Layers this file's overrides onto a base `DownloadOptions`.
    pub fn apply_to(&self, opts: &mut DownloadOptions) {
        let d = &self.defaults;
        if let Some(v) = d.num_threads {
            opts.num_threads = v;
        }
        if let Some(v) = d.retries {
            opts.retries = v;
        }
        if let Some(v) = d.retry_delay_ms {
            opts.retry_delay_ms = v;
        }
        if let Some(v) = d.resume_enabled {
            opts.resume_enabled = v;
        }
        if let Some(v) = d.initial_chunk_size {
            opts.initial_chunk_size = v;
        }
        if let Some(v) = d.max_rate {
            opts.max_rate = v;
        }
        if let Some(v) = &d.user_agent {
            opts.network.user_agent = v.clone();
        }
        if let Some(v) = d.verify_tls {
            opts.network.verify_tls = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_baseline() {
        let opts = DownloadOptions::default();
        assert_eq!(opts.num_threads, 8);
        assert_eq!(opts.retries, 2);
        assert_eq!(opts.retry_delay_ms, 500);
        assert_eq!(opts.initial_chunk_size, 1024 * 1024);
    }

    #[test]
    fn rate_cap_divides_across_threads() {
        let mut opts = DownloadOptions::default();
        opts.num_threads = 4;
        opts.max_rate = 4_000_000;
        assert_eq!(opts.request_options().max_recv_bytes_per_sec, 1_000_000);
    }

    #[test]
    fn rate_cap_falls_back_to_full_cap_on_underflow() {
        let mut opts = DownloadOptions::default();
        opts.num_threads = 8;
        opts.max_rate = 3;
        assert_eq!(opts.request_options().max_recv_bytes_per_sec, 3);
    }

    #[test]
    fn config_file_overrides_layer_onto_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fastget.toml");
        std::fs::write(&path, "[defaults]\nnum_threads = 16\nmax_rate = 1000\n").unwrap();
        let file = ConfigFile::load(&path).unwrap();
        let mut opts = DownloadOptions::default();
        file.apply_to(&mut opts);
        assert_eq!(opts.num_threads, 16);
        assert_eq!(opts.max_rate, 1000);
    }

    #[test]
    fn missing_config_file_is_an_error_not_a_panic() {
        let result = ConfigFile::load(Path::new("/nonexistent/fastget.toml"));
        assert!(result.is_err());
    }
}
