use std::sync::atomic::{AtomicUsize, Ordering};

pub const MAX_CHUNK_CONCURRENCY: usize = 64;

pub(crate) const CONCURRENCY_ENV: &str = "SEARCH_INDEXER_CONCURRENCY";

static CHUNK_WORKERS_QUEUED: AtomicUsize = AtomicUsize::new(0);
static CHUNK_WORKERS_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

/// Process-wide view of rebuild chunk workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConcurrencySnapshot {
    /// Spawned onto the blocking pool but not yet running.
    pub queued: usize,
    pub in_flight: usize,
}

pub fn chunk_concurrency_snapshot() -> ChunkConcurrencySnapshot {
    ChunkConcurrencySnapshot {
        queued: CHUNK_WORKERS_QUEUED.load(Ordering::Relaxed),
        in_flight: CHUNK_WORKERS_IN_FLIGHT.load(Ordering::Relaxed),
    }
}

pub(crate) fn default_chunk_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .clamp(1, MAX_CHUNK_CONCURRENCY)
}

pub(crate) fn parse_chunk_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_CHUNK_CONCURRENCY)
}

pub(crate) fn chunk_concurrency_from_env() -> usize {
    let raw = std::env::var(CONCURRENCY_ENV).ok();
    parse_chunk_concurrency(raw.as_deref(), default_chunk_concurrency())
}

/// Tracks one chunk worker from spawn until it finishes.
pub(crate) struct ChunkWorkerGuard {
    running: bool,
}

impl ChunkWorkerGuard {
    pub(crate) fn queued() -> Self {
        CHUNK_WORKERS_QUEUED.fetch_add(1, Ordering::Relaxed);
        Self { running: false }
    }

    pub(crate) fn start(mut self) -> Self {
        CHUNK_WORKERS_QUEUED.fetch_sub(1, Ordering::Relaxed);
        CHUNK_WORKERS_IN_FLIGHT.fetch_add(1, Ordering::Relaxed);
        self.running = true;
        self
    }
}

impl Drop for ChunkWorkerGuard {
    fn drop(&mut self) {
        if self.running {
            CHUNK_WORKERS_IN_FLIGHT.fetch_sub(1, Ordering::Relaxed);
        } else {
            CHUNK_WORKERS_QUEUED.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
