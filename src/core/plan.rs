/*!
 * Immutable partition of [0, total_size) into contiguous chunks
 */

use crate::error::{FastgetError, Result};

/// A safety bound on absurd (total_size, chunk_size) combinations.
pub const MAX_CHUNKS: u64 = 1_000_000;

pub const MIN_CHUNK_SIZE: u64 = 512 * 1024;
pub const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Pending,
    InFlight,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub id: u32,
    pub start: u64,
    pub end_inclusive: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end_inclusive - self.start + 1
    }
}

/// A small value type returned by `ChunkTable::acquire_next`; an opaque ticket
/// rather than a pointer into the table, so it carries no aliasing hazard.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRef {
    pub id: u32,
    pub start: u64,
    pub end_inclusive: u64,
}

/// The immutable-after-construction partition of `[0, total_size)`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// Partitions `total_size` into chunks of `chunk_size`, last chunk possibly smaller.
    /// `total_size == 0` produces an empty, trivially finished plan regardless of
    /// `chunk_size`. A zero `chunk_size` against a nonzero `total_size` is rejected
    /// rather than silently treated as "nothing to do".
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        if total_size == 0 {
            return Ok(ChunkPlan { total_size, chunk_size, chunks: Vec::new() });
        }
        if chunk_size == 0 {
            return Err(FastgetError::InvalidChunkSize);
        }

        let mut chunks = Vec::new();

        let mut offset = 0u64;
        let mut id = 0u32;
        while offset < total_size {
            if (id as u64) >= MAX_CHUNKS {
                return Err(FastgetError::PlanTooLarge {
                    chunk_count: total_size.div_ceil(chunk_size),
                });
            }
            let end = (offset + chunk_size - 1).min(total_size - 1);
            chunks.push(Chunk { id, start: offset, end_inclusive: end });
            offset = end + 1;
            id += 1;
        }

        Ok(ChunkPlan { total_size, chunk_size, chunks })
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunks.len() as u32
    }
}
