/*!
 * fastget - Parallel range-based file downloader
 *
 * Provides a download coordination engine: an adaptive chunk planner, a
 * worker pool that drives concurrent range fetches with mirror failover and
 * retry, a sparse writer that commits ranges to disk at arbitrary offsets,
 * and a crash-safe on-disk resume format.
 *
 * HTTP transport, checksum verification, progress rendering and CLI parsing
 * are all external collaborators, consumed through the `Fetcher`,
 * `Verifier` and `Reporter` traits.
 */

pub mod config;
pub mod core;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod reporter;
pub mod verifier;

pub use config::{DownloadOptions, NetworkOptions};
pub use core::engine::{Engine, EngineHandle};
pub use core::plan::{Chunk, ChunkPlan, ChunkRef};
pub use core::resume::ResumeStore;
pub use core::sparse::SparseWriter;
pub use core::table::ChunkTable;
pub use error::{ErrorCategory, FastgetError, Result};
pub use fetcher::{FetchOutcome, Fetcher, HttpFetcher, RequestOptions, SizeProbe};
pub use reporter::{CliReporter, NoopReporter, Reporter};
pub use verifier::{HashAlgorithm, MultiHashVerifier, Sha256Verifier, Verifier};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
