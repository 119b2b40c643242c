/*!
 * Mutable, thread-safe chunk status table with the adaptive chunk-size controller
 */

use std::sync::Mutex;

use super::plan::{Chunk, ChunkPlan, ChunkRef, ChunkStatus, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

struct Row {
    chunk: Chunk,
    status: ChunkStatus,
}

struct State {
    rows: Vec<Row>,
    done_count: u32,
    current_chunk_size: u64,
    success_streak: u32,
    fail_streak: u32,
}

const STREAK_THRESHOLD: u32 = 3;

/// The mutable, thread-safe state of a `ChunkPlan`: per-chunk status, a
/// monotone done-count, and the adaptive chunk-size controller. Owned by the
/// Engine and shared by reference with all workers.
pub struct ChunkTable {
    state: Mutex<State>,
    total_size: u64,
}

impl ChunkTable {
    pub fn new(plan: &ChunkPlan) -> Self {
        let rows = plan
            .chunks
            .iter()
            .map(|c| Row { chunk: *c, status: ChunkStatus::Pending })
            .collect();
        ChunkTable {
            state: Mutex::new(State {
                rows,
                done_count: 0,
                current_chunk_size: plan.chunk_size,
                success_streak: 0,
                fail_streak: 0,
            }),
            total_size: plan.total_size,
        }
    }

    pub fn chunk_count(&self) -> u32 {
        self.state.lock().unwrap().rows.len() as u32
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn done_count(&self) -> u32 {
        self.state.lock().unwrap().done_count
    }

    pub fn current_chunk_size(&self) -> u64 {
        self.state.lock().unwrap().current_chunk_size
    }

    pub fn is_finished(&self) -> bool {
        let s = self.state.lock().unwrap();
        s.done_count == s.rows.len() as u32
    }

    pub fn chunk_range(&self, id: u32) -> Option<(u64, u64)> {
        let s = self.state.lock().unwrap();
        s.rows.get(id as usize).map(|r| (r.chunk.start, r.chunk.end_inclusive))
    }

    /// Returns the lowest-id pending chunk, flipping it to in-flight.
    /// Ascending id gives a deterministic acquisition order under contention.
    pub fn acquire_next(&self) -> Option<ChunkRef> {
        let mut s = self.state.lock().unwrap();
        for row in s.rows.iter_mut() {
            if row.status == ChunkStatus::Pending {
                row.status = ChunkStatus::InFlight;
                return Some(ChunkRef {
                    id: row.chunk.id,
                    start: row.chunk.start,
                    end_inclusive: row.chunk.end_inclusive,
                });
            }
        }
        None
    }

    /// `in_flight -> done`; idempotent (a second call for an already-done id
    /// is a no-op and does not double-count `done_count`).
    pub fn mark_success(&self, id: u32, observed_speed: f64) {
        let mut s = self.state.lock().unwrap();
        if let Some(row) = s.rows.get_mut(id as usize) {
            if row.status != ChunkStatus::Done {
                row.status = ChunkStatus::Done;
                s.done_count += 1;
            }
        }
        Self::adapt(&mut s, true, observed_speed);
    }

    /// `in_flight -> pending`, re-acquirable by any worker.
    pub fn mark_failure(&self, id: u32) {
        let mut s = self.state.lock().unwrap();
        if let Some(row) = s.rows.get_mut(id as usize) {
            if row.status == ChunkStatus::InFlight {
                row.status = ChunkStatus::Pending;
            }
        }
        Self::adapt(&mut s, false, 0.0);
    }

    /// `pending -> done` without controller feedback, used during resume
    /// replay. Idempotent: a second call for the same id does not change
    /// `done_count`.
    pub fn mark_completed_from_resume(&self, id: u32) {
        let mut s = self.state.lock().unwrap();
        if let Some(row) = s.rows.get_mut(id as usize) {
            if row.status != ChunkStatus::Done {
                row.status = ChunkStatus::Done;
                s.done_count += 1;
            }
        }
    }

    /// Not a rate limiter: a bandit over future chunk sizes. It does NOT
    /// re-partition the current plan, which stays fixed for the download.
    fn adapt(s: &mut State, success: bool, _speed: f64) {
        if success {
            s.fail_streak = 0;
            s.success_streak += 1;
            if s.success_streak >= STREAK_THRESHOLD {
                s.current_chunk_size = (s.current_chunk_size * 2).min(MAX_CHUNK_SIZE);
                s.success_streak = 0;
            }
        } else {
            s.success_streak = 0;
            s.current_chunk_size = (s.current_chunk_size / 2).max(MIN_CHUNK_SIZE);
            s.fail_streak = 0;
        }
    }
}
