/*!
 * Error types for fastget
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FastgetError>;

#[derive(Debug)]
pub enum FastgetError {
    /// No URL (origin or mirror) answered with a usable total length
    SizeUnknown,

    /// Could not open/create/extend the output file
    OutputUnwritable(PathBuf),

    /// I/O error
    Io(io::Error),

    /// Configuration error
    Config(String),

    /// Resume store error (corrupt record, unexpected I/O failure on save/load)
    Resume(String),

    /// A single (url, range, attempt) fetch failed
    ChunkFetchFailed { chunk_id: u32, message: String },

    /// Engine exited with the plan not fully downloaded
    IncompleteDownload { done: u32, total: u32 },

    /// Construction of a chunk plan exceeded the maximum chunk count
    PlanTooLarge { chunk_count: u64 },

    /// A chunk plan was requested with a zero chunk size against a nonzero total
    InvalidChunkSize,

    /// Generic error with message
    Other(String),
}

impl FastgetError {
    /// Fatal errors abort `Engine::start` before any worker thread is spawned.
    pub fn is_fatal(&self) -> bool {
        match self {
            FastgetError::SizeUnknown => true,
            FastgetError::OutputUnwritable(_) => true,
            FastgetError::Config(_) => true,
            FastgetError::PlanTooLarge { .. } => true,
            FastgetError::InvalidChunkSize => true,
            FastgetError::IncompleteDownload { .. } => true,

            FastgetError::Io(_) => false,
            FastgetError::Resume(_) => false,
            FastgetError::ChunkFetchFailed { .. } => false,
            FastgetError::Other(_) => false,
        }
    }

    /// Get error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FastgetError::SizeUnknown => ErrorCategory::Probe,
            FastgetError::OutputUnwritable(_) => ErrorCategory::Filesystem,
            FastgetError::Io(_) => ErrorCategory::IoError,
            FastgetError::Config(_) => ErrorCategory::Configuration,
            FastgetError::Resume(_) => ErrorCategory::Resume,
            FastgetError::ChunkFetchFailed { .. } => ErrorCategory::Network,
            FastgetError::IncompleteDownload { .. } => ErrorCategory::Incomplete,
            FastgetError::PlanTooLarge { .. } => ErrorCategory::Validation,
            FastgetError::InvalidChunkSize => ErrorCategory::Validation,
            FastgetError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Probe,
    Filesystem,
    IoError,
    Configuration,
    Resume,
    Network,
    Incomplete,
    Validation,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Probe => write!(f, "probe"),
            ErrorCategory::Filesystem => write!(f, "filesystem"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Resume => write!(f, "resume"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Incomplete => write!(f, "incomplete"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for FastgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastgetError::SizeUnknown => {
                write!(f, "could not determine remote file size from origin or any mirror")
            }
            FastgetError::OutputUnwritable(path) => {
                write!(f, "cannot open or extend output file: {}", path.display())
            }
            FastgetError::Io(err) => write!(f, "I/O error: {}", err),
            FastgetError::Config(msg) => write!(f, "configuration error: {}", msg),
            FastgetError::Resume(msg) => write!(f, "resume store error: {}", msg),
            FastgetError::ChunkFetchFailed { chunk_id, message } => {
                write!(f, "chunk {} fetch failed: {}", chunk_id, message)
            }
            FastgetError::IncompleteDownload { done, total } => {
                write!(f, "download incomplete: {}/{} chunks done", done, total)
            }
            FastgetError::PlanTooLarge { chunk_count } => {
                write!(f, "chunk plan exceeds maximum chunk count: {}", chunk_count)
            }
            FastgetError::InvalidChunkSize => {
                write!(f, "chunk size must be nonzero for a nonzero total size")
            }
            FastgetError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FastgetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FastgetError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FastgetError {
    fn from(err: io::Error) -> Self {
        FastgetError::Io(err)
    }
}
