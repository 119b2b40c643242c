/*!
 * Durable, crash-safe resume state for interrupted downloads
 *
 * On-disk layout (little-endian throughout), bit-exact for interop:
 *   offset  size  field
 *   0       8     magic = ASCII "FASTGET1"
 *   8       8     total_size    (u64)
 *   16      8     chunk_size    (u64)
 *   24      8     chunk_count   (u64)
 *   32      C     completed[]   (C = chunk_count bytes; byte != 0 => done)
 */

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::Result;

const MAGIC: &[u8; 8] = b"FASTGET1";
const HEADER_SIZE: usize = 32;
const SAVE_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of attempting to load an existing resume file against the size
/// the engine just probed for the current download.
pub enum LoadOutcome {
    Loaded { chunk_size: u64, chunk_count: u64 },
    Absent,
    /// Shape mismatch (or corrupt header). Treated as absent by the caller;
    /// the file itself is left on disk until the next Save overwrites it.
    Incompatible,
}

struct State {
    total_size: u64,
    chunk_size: u64,
    chunk_count: u64,
    completed: Vec<u8>,
    initialized: bool,
    dirty: bool,
    last_save: Instant,
}

/// Exclusive owner of the resume file path `<output>.fastget`. All
/// operations are serialized by an internal mutex.
pub struct ResumeStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl ResumeStore {
    pub fn new(output_path: impl AsRef<Path>) -> Self {
        let path = resume_path_for(output_path.as_ref());
        ResumeStore {
            path,
            state: Mutex::new(State {
                total_size: 0,
                chunk_size: 0,
                chunk_count: 0,
                completed: Vec::new(),
                initialized: false,
                dirty: false,
                last_save: Instant::now(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the resume file if its shape (`total_size`) matches what the
    /// engine just probed. Populates the in-memory bitmap on success.
    pub fn load(&self, expected_total_size: u64) -> Result<LoadOutcome> {
        let mut s = self.state.lock().unwrap();
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(_) => return Ok(LoadOutcome::Absent),
        };
        if bytes.len() < HEADER_SIZE || &bytes[0..8] != MAGIC {
            return Ok(LoadOutcome::Incompatible);
        }
        let total_size = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let chunk_size = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let chunk_count = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        if total_size != expected_total_size {
            return Ok(LoadOutcome::Incompatible);
        }
        let expected_len = HEADER_SIZE + chunk_count as usize;
        if bytes.len() < expected_len {
            return Ok(LoadOutcome::Incompatible);
        }

        s.total_size = total_size;
        s.chunk_size = chunk_size;
        s.chunk_count = chunk_count;
        s.completed = bytes[HEADER_SIZE..expected_len].to_vec();
        s.initialized = true;
        s.dirty = false;
        s.last_save = Instant::now();

        Ok(LoadOutcome::Loaded { chunk_size, chunk_count })
    }

    pub fn initialize(&self, total_size: u64, chunk_size: u64, chunk_count: u64) {
        let mut s = self.state.lock().unwrap();
        s.total_size = total_size;
        s.chunk_size = chunk_size;
        s.chunk_count = chunk_count;
        s.completed = vec![0u8; chunk_count as usize];
        s.initialized = true;
        s.dirty = true;
        s.last_save = Instant::now();
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    pub fn is_chunk_complete(&self, chunk_id: u32) -> bool {
        let s = self.state.lock().unwrap();
        s.initialized
            && (chunk_id as usize) < s.completed.len()
            && s.completed[chunk_id as usize] != 0
    }

    /// Idempotent: marks a clean->dirty transition only the first time.
    pub fn mark_completed(&self, chunk_id: u32) {
        let mut s = self.state.lock().unwrap();
        if !s.initialized || (chunk_id as usize) >= s.completed.len() {
            return;
        }
        if s.completed[chunk_id as usize] == 0 {
            s.completed[chunk_id as usize] = 1;
            s.dirty = true;
        }
    }

    pub fn completed_chunks(&self) -> Vec<u32> {
        let s = self.state.lock().unwrap();
        if !s.initialized {
            return Vec::new();
        }
        s.completed
            .iter()
            .enumerate()
            .filter(|(_, &done)| done != 0)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Writes the entire record to `path.tmp`, flushes, then renames over
    /// `path`. Atomic replacement gives crash-consistency.
    pub fn save(&self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        self.save_locked(&mut s)
    }

    /// No-op unless dirty and at least one second has elapsed since the
    /// last save. Used on the worker hot path to amortize resume I/O.
    pub fn maybe_save(&self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if !s.dirty || s.last_save.elapsed() < SAVE_INTERVAL {
            return Ok(());
        }
        self.save_locked(&mut s)
    }

    fn save_locked(&self, s: &mut State) -> Result<()> {
        if !s.initialized {
            return Ok(());
        }
        let tmp_path = self.path.with_extension("fastget.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(MAGIC)?;
            file.write_all(&s.total_size.to_le_bytes())?;
            file.write_all(&s.chunk_size.to_le_bytes())?;
            file.write_all(&s.chunk_count.to_le_bytes())?;
            file.write_all(&s.completed)?;
            file.flush()?;
        }
        sleep_before_rename_for_tests();
        fs::rename(&tmp_path, &self.path)?;
        s.dirty = false;
        s.last_save = Instant::now();
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// `<output>.fastget` — the sibling resume file for output path `P`.
pub fn resume_path_for(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(".fastget");
    PathBuf::from(name)
}

/// Crash-injection point for the atomic-rename test below. Inert unless
/// `FASTGET_RESUME_SLEEP_BEFORE_RENAME_MS` is set, which it never is outside
/// that test's subprocess.
fn sleep_before_rename_for_tests() {
    if let Ok(val) = std::env::var("FASTGET_RESUME_SLEEP_BEFORE_RENAME_MS") {
        if let Ok(ms) = val.parse::<u64>() {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}
