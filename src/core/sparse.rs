/*!
 * Sparse writer - commits byte ranges to arbitrary offsets of a pre-extended file
 */

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{FastgetError, Result};

/// Exclusive owner of the output file. All writes serialize through a single
/// mutex: writes to disjoint offsets still share one file handle's seek
/// position, so there is no per-range locking.
pub struct SparseWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl SparseWriter {
    /// Opens the file for random-access read+write. First attempt "open
    /// existing read+write"; on failure, create zero-length then reopen.
    /// Failure to produce a writable handle is fatal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(false)
                    .open(&path)?;
                OpenOptions::new().read(true).write(true).open(&path)
            })
            .map_err(|_| FastgetError::OutputUnwritable(path.clone()))?;

        Ok(SparseWriter { path, file: Mutex::new(file) })
    }

    /// Extends the file to at least `n` bytes by writing a single byte at
    /// offset `n - 1`. Idempotent: a no-op if the file is already long enough.
    pub fn preallocate(&self, n: u64) -> Result<()> {
        if n == 0 || self.size()? >= n {
            return Ok(());
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(n - 1))?;
        file.write_all(&[0u8])?;
        file.flush()?;
        Ok(())
    }

    /// Writes `bytes` starting at `offset`. Serialized across concurrent
    /// callers by holding the mutex across seek + write + flush. Flushes to
    /// the OS after each write to bound data loss on crash; fsync is not
    /// required.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn size(&self) -> Result<u64> {
        if !self.exists() {
            return Ok(0);
        }
        Ok(std::fs::metadata(&self.path)?.len())
    }
}
