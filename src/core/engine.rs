/*!
 * Engine - binds ChunkTable, SparseWriter, ResumeStore and Fetcher into one
 * coordinated download
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::DownloadOptions;
use crate::core::plan::ChunkPlan;
use crate::core::resume::{LoadOutcome, ResumeStore};
use crate::core::retry::sleep_before_retry;
use crate::core::sparse::SparseWriter;
use crate::core::table::ChunkTable;
use crate::error::{FastgetError, Result};
use crate::fetcher::{FetchOutcome, Fetcher, SizeProbe};
use crate::reporter::Reporter;

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// A cheap, cloneable, process-scoped handle to pause/resume/cancel a
/// running engine. The engine contains no global state of its own; the
/// process entry point owns this handle and a signal subscription, and the
/// signal callback simply calls `pause()`.
#[derive(Clone)]
pub struct EngineHandle {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    resume: Arc<ResumeStore>,
    resume_enabled: bool,
}

impl EngineHandle {
    /// Cooperative pause: workers poll this flag and sleep without
    /// releasing any chunk they already hold. Also triggers a resume save
    /// so a SIGINT-initiated pause persists progress before process exit.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        if self.resume_enabled {
            if let Err(e) = self.resume.save() {
                warn!("resume save on pause failed: {}", e);
            }
        }
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Cooperative cancellation: workers exit at their next acquire
    /// boundary, finishing any in-flight chunk first.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Binds a `ChunkTable`, `SparseWriter`, `ResumeStore` and `Fetcher` into a
/// single coordinated download of one resource. One Engine instance
/// downloads one resource; multi-URL batch orchestration is not in scope.
pub struct Engine {
    url: String,
    mirrors: Vec<String>,
    output_path: std::path::PathBuf,
    options: DownloadOptions,
    fetcher: Arc<dyn Fetcher>,
    reporter: Arc<dyn Reporter>,

    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    downloaded_size: Arc<AtomicU64>,
    resume: Arc<ResumeStore>,
}

struct WorkerContext {
    url: String,
    mirrors: Vec<String>,
    table: Arc<ChunkTable>,
    writer: Arc<SparseWriter>,
    resume: Arc<ResumeStore>,
    fetcher: Arc<dyn Fetcher>,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    downloaded_size: Arc<AtomicU64>,
    retries: u32,
    retry_delay_ms: u64,
    resume_enabled: bool,
    req_opts: crate::fetcher::RequestOptions,
}

impl Engine {
    pub fn new(
        url: impl Into<String>,
        mirrors: Vec<String>,
        output_path: impl Into<std::path::PathBuf>,
        options: DownloadOptions,
        fetcher: Arc<dyn Fetcher>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let output_path = output_path.into();
        let resume = Arc::new(ResumeStore::new(&output_path));
        Engine {
            url: url.into(),
            mirrors,
            output_path,
            options,
            fetcher,
            reporter,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            downloaded_size: Arc::new(AtomicU64::new(0)),
            resume,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            running: self.running.clone(),
            paused: self.paused.clone(),
            resume: self.resume.clone(),
            resume_enabled: self.options.resume_enabled,
        }
    }

    fn all_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.mirrors.len());
        urls.push(self.url.clone());
        urls.extend(self.mirrors.iter().cloned());
        urls
    }

    /// Runs the full lifecycle: probe -> open -> plan -> replay -> spawn ->
    /// join -> teardown. Blocks the calling thread until the download
    /// terminates (ok or err); pause/cancel come in concurrently through an
    /// `EngineHandle` obtained before calling this.
    pub fn start(&self) -> Result<()> {
        let req_opts = self.options.request_options();
        let urls = self.all_urls();

        let total_size = self.probe_size(&urls, &req_opts)?;
        info!(total_size, "probed remote size");

        let writer = Arc::new(SparseWriter::open(&self.output_path)?);
        writer.preallocate(total_size)?;

        let (chunk_size, resumed) = self.initialize_resume(total_size)?;
        let plan = ChunkPlan::new(total_size, chunk_size)?;
        let table = Arc::new(ChunkTable::new(&plan));

        let resumed_bytes = self.replay_resume(&table, &plan, resumed);
        self.downloaded_size.store(resumed_bytes, Ordering::SeqCst);

        self.reporter.header(&self.output_path.to_string_lossy(), total_size, self.options.num_threads);

        if table.is_finished() {
            info!("plan already complete from resume state");
            self.teardown(&table, true, Duration::from_secs(0), resumed_bytes > 0, resumed_bytes)?;
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        let start_time = Instant::now();

        let mut workers = Vec::with_capacity(self.options.num_threads);
        for _ in 0..self.options.num_threads.max(1) {
            let ctx = WorkerContext {
                url: self.url.clone(),
                mirrors: self.mirrors.clone(),
                table: table.clone(),
                writer: writer.clone(),
                resume: self.resume.clone(),
                fetcher: self.fetcher.clone(),
                running: self.running.clone(),
                paused: self.paused.clone(),
                downloaded_size: self.downloaded_size.clone(),
                retries: self.options.retries,
                retry_delay_ms: self.options.retry_delay_ms,
                resume_enabled: self.options.resume_enabled,
                req_opts: req_opts.clone(),
            };
            workers.push(thread::spawn(move || worker_loop(ctx)));
        }

        let watcher = {
            let table = table.clone();
            let reporter = self.reporter.clone();
            let running = self.running.clone();
            let downloaded_size = self.downloaded_size.clone();
            thread::spawn(move || progress_watcher(table, reporter, running, downloaded_size, total_size, start_time))
        };

        for w in workers {
            let _ = w.join();
        }
        self.running.store(false, Ordering::SeqCst);
        let _ = watcher.join();

        let finished = table.is_finished();
        let duration = start_time.elapsed();
        self.teardown(&table, finished, duration, resumed_bytes > 0, resumed_bytes)?;

        if finished {
            Ok(())
        } else {
            Err(FastgetError::IncompleteDownload { done: table.done_count(), total: table.chunk_count() })
        }
    }

    fn probe_size(&self, urls: &[String], req_opts: &crate::fetcher::RequestOptions) -> Result<u64> {
        for url in urls {
            if let SizeProbe::Known(n) = self.fetcher.probe_size(url, req_opts) {
                if n > 0 {
                    return Ok(n);
                }
            }
        }
        Err(FastgetError::SizeUnknown)
    }

    /// Returns `(chunk_size, was_loaded_from_resume)`.
    fn initialize_resume(&self, total_size: u64) -> Result<(u64, bool)> {
        if !self.options.resume_enabled {
            return Ok((self.options.initial_chunk_size, false));
        }
        match self.resume.load(total_size)? {
            LoadOutcome::Loaded { chunk_size, .. } => {
                debug!(chunk_size, "resumed from existing resume file");
                Ok((chunk_size.max(1), true))
            }
            LoadOutcome::Incompatible => {
                warn!("resume file present but shape mismatched; treating as absent");
                Ok((self.options.initial_chunk_size, false))
            }
            LoadOutcome::Absent => Ok((self.options.initial_chunk_size, false)),
        }
    }

    fn replay_resume(&self, table: &ChunkTable, plan: &ChunkPlan, was_loaded: bool) -> u64 {
        if !self.options.resume_enabled {
            return 0;
        }
        if !was_loaded {
            self.resume.initialize(plan.total_size, plan.chunk_size, plan.chunk_count() as u64);
            return 0;
        }
        let mut resumed_bytes = 0u64;
        for id in self.resume.completed_chunks() {
            if let Some((start, end)) = table.chunk_range(id) {
                resumed_bytes += end - start + 1;
                table.mark_completed_from_resume(id);
            }
        }
        resumed_bytes
    }

    fn teardown(
        &self,
        table: &ChunkTable,
        finished: bool,
        duration: Duration,
        resumed: bool,
        resumed_bytes: u64,
    ) -> Result<()> {
        if self.options.resume_enabled {
            self.resume.save()?;
            if finished {
                self.resume.delete()?;
            }
        }

        let downloaded = self.downloaded_size.load(Ordering::SeqCst);
        let avg_speed = if duration.as_secs_f64() > 0.0 {
            downloaded as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        self.reporter.footer(finished, if finished { None } else { Some("could not complete download") });
        self.reporter.summary(
            table.total_size(),
            downloaded,
            avg_speed,
            duration.as_secs(),
            resumed,
            resumed_bytes,
            self.options.num_threads,
        );
        Ok(())
    }
}

fn worker_loop(ctx: WorkerContext) {
    let mut urls = Vec::with_capacity(1 + ctx.mirrors.len());
    urls.push(ctx.url.clone());
    urls.extend(ctx.mirrors.iter().cloned());

    while ctx.running.load(Ordering::SeqCst) && !ctx.table.is_finished() {
        if ctx.paused.load(Ordering::SeqCst) {
            thread::sleep(PAUSE_POLL_INTERVAL);
            continue;
        }

        let Some(chunk) = ctx.table.acquire_next() else { break };
        let expected_len = chunk.end_inclusive - chunk.start + 1;

        let mut success = false;
        let mut speed = 0.0f64;
        let mut body = Vec::new();

        for attempt in 0..=ctx.retries {
            if !ctx.running.load(Ordering::SeqCst) {
                break;
            }
            for url in &urls {
                match ctx.fetcher.fetch_range(url, chunk.start, chunk.end_inclusive, &ctx.req_opts) {
                    FetchOutcome::Success { bytes, elapsed } => {
                        if bytes.len() as u64 == expected_len {
                            speed = if elapsed.as_secs_f64() > 0.0 {
                                bytes.len() as f64 / elapsed.as_secs_f64()
                            } else {
                                0.0
                            };
                            body = bytes;
                            success = true;
                            break;
                        }
                        warn!(chunk_id = chunk.id, "response length mismatch, treating as failed attempt");
                    }
                    FetchOutcome::Transient(msg) => {
                        debug!(chunk_id = chunk.id, url = %url, "transient fetch error: {}", msg);
                    }
                    FetchOutcome::Permanent(msg) => {
                        debug!(chunk_id = chunk.id, url = %url, "permanent fetch error: {}", msg);
                    }
                }
            }
            if success {
                break;
            }
            if attempt < ctx.retries {
                sleep_before_retry(ctx.retry_delay_ms);
            }
        }

        if success {
            match ctx.writer.write_at(chunk.start, &body) {
                Ok(()) => {
                    ctx.downloaded_size.fetch_add(body.len() as u64, Ordering::SeqCst);
                    ctx.table.mark_success(chunk.id, speed);
                    if ctx.resume_enabled {
                        ctx.resume.mark_completed(chunk.id);
                        if let Err(e) = ctx.resume.maybe_save() {
                            warn!("resume maybe_save failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!(chunk_id = chunk.id, "write_at failed: {}", e);
                    ctx.table.mark_failure(chunk.id);
                }
            }
        } else {
            ctx.table.mark_failure(chunk.id);
        }
    }
}

fn progress_watcher(
    table: Arc<ChunkTable>,
    reporter: Arc<dyn Reporter>,
    running: Arc<AtomicBool>,
    downloaded_size: Arc<AtomicU64>,
    total_size: u64,
    start_time: Instant,
) {
    while running.load(Ordering::SeqCst) {
        let elapsed = start_time.elapsed().as_secs_f64();
        let downloaded = downloaded_size.load(Ordering::SeqCst);
        let speed = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };
        reporter.progress(downloaded, total_size, speed);

        if table.is_finished() {
            break;
        }
        thread::sleep(PROGRESS_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NoopReporter;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    /// An in-memory `Fetcher` serving a fixed byte buffer, with a
    /// configurable per-url failure script used by the engine integration
    /// tests to exercise retry and mirror failover.
    struct MockFetcher {
        data: Vec<u8>,
        /// url -> number of leading calls to fail with Transient before succeeding
        fail_counts: StdMutex<HashMap<String, u32>>,
    }

    impl MockFetcher {
        fn new(data: Vec<u8>) -> Self {
            MockFetcher { data, fail_counts: StdMutex::new(HashMap::new()) }
        }

        fn fail_url_times(self, url: &str, times: u32) -> Self {
            self.fail_counts.lock().unwrap().insert(url.to_string(), times);
            self
        }
    }

    impl Fetcher for MockFetcher {
        fn probe_size(&self, _url: &str, _opts: &crate::fetcher::RequestOptions) -> SizeProbe {
            SizeProbe::Known(self.data.len() as u64)
        }

        fn fetch_range(
            &self,
            url: &str,
            start: u64,
            end_inclusive: u64,
            _opts: &crate::fetcher::RequestOptions,
        ) -> FetchOutcome {
            let mut counts = self.fail_counts.lock().unwrap();
            if let Some(remaining) = counts.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return FetchOutcome::Transient("simulated failure".to_string());
                }
            }
            let start = start as usize;
            let end = end_inclusive as usize;
            FetchOutcome::Success {
                bytes: self.data[start..=end].to_vec(),
                elapsed: Duration::from_millis(1),
            }
        }
    }

    fn make_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn happy_path_downloads_all_bytes_and_removes_resume_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let data = make_data(10 * 1024 * 1024);
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new(data.clone()));
        let mut opts = DownloadOptions::default();
        opts.num_threads = 4;
        opts.initial_chunk_size = 1024 * 1024;

        let engine = Engine::new("origin", vec![], &out, opts, fetcher, Arc::new(NoopReporter));
        engine.start().unwrap();

        let written = std::fs::read(&out).unwrap();
        assert_eq!(written, data);
        assert!(!crate::core::resume::resume_path_for(&out).exists());
    }

    #[test]
    fn mirror_failover_serves_from_mirror_when_origin_always_fails() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let data = make_data(2 * 1024 * 1024);
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(MockFetcher::new(data.clone()).fail_url_times("origin", 1000));
        let mut opts = DownloadOptions::default();
        opts.num_threads = 2;
        opts.initial_chunk_size = 1024 * 1024;
        opts.retries = 1;
        opts.retry_delay_ms = 1;

        let engine = Engine::new(
            "origin",
            vec!["mirror1".to_string()],
            &out,
            opts,
            fetcher,
            Arc::new(NoopReporter),
        );
        engine.start().unwrap();

        let written = std::fs::read(&out).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn transient_failure_succeeds_after_retry() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let data = make_data(1024 * 1024);
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(MockFetcher::new(data.clone()).fail_url_times("origin", 2));
        let mut opts = DownloadOptions::default();
        opts.num_threads = 1;
        opts.initial_chunk_size = 1024 * 1024;
        opts.retries = 2;
        opts.retry_delay_ms = 1;

        let engine = Engine::new("origin", vec![], &out, opts, fetcher, Arc::new(NoopReporter));
        engine.start().unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), data);
    }

    #[test]
    fn resume_after_crash_only_refetches_missing_chunks() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let data = make_data(20 * 1024 * 1024);

        // Simulate a crash that persisted chunks {0,2,5,7,9} to the resume file.
        let resume = ResumeStore::new(&out);
        resume.initialize(data.len() as u64, 1024 * 1024, 20);
        for id in [0, 2, 5, 7, 9] {
            resume.mark_completed(id);
        }
        resume.save().unwrap();

        let writer = SparseWriter::open(&out).unwrap();
        writer.preallocate(data.len() as u64).unwrap();
        for id in [0u64, 2, 5, 7, 9] {
            let start = (id * 1024 * 1024) as usize;
            let end = ((start as u64 + 1024 * 1024).min(data.len() as u64)) as usize;
            writer.write_at(start as u64, &data[start..end]).unwrap();
        }
        drop(writer);

        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new(data.clone()));
        let mut opts = DownloadOptions::default();
        opts.num_threads = 4;
        opts.initial_chunk_size = 1024 * 1024;

        let engine = Engine::new("origin", vec![], &out, opts, fetcher, Arc::new(NoopReporter));
        engine.start().unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), data);
    }

    #[test]
    fn resume_shape_mismatch_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let data = make_data(1024 * 1024);

        let resume = ResumeStore::new(&out);
        resume.initialize(999_999, 1024 * 1024, 1);
        resume.save().unwrap();

        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new(data.clone()));
        let mut opts = DownloadOptions::default();
        opts.num_threads = 1;
        opts.initial_chunk_size = 1024 * 1024;

        let engine = Engine::new("origin", vec![], &out, opts, fetcher, Arc::new(NoopReporter));
        engine.start().unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), data);
    }

    #[test]
    fn pause_then_resume_via_handle_still_completes() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let data = make_data(4 * 1024 * 1024);
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new(data.clone()));
        let mut opts = DownloadOptions::default();
        opts.num_threads = 2;
        opts.initial_chunk_size = 1024 * 1024;

        let engine = Engine::new("origin", vec![], &out, opts, fetcher, Arc::new(NoopReporter));
        let handle = engine.handle();
        handle.pause();
        assert!(handle.is_paused());
        handle.resume();

        engine.start().unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), data);
    }
}
