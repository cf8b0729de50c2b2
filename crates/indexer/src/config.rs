use crate::limits::{chunk_concurrency_from_env, default_chunk_concurrency, MAX_CHUNK_CONCURRENCY};
use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};

/// Items per chunk when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

pub(crate) const CHUNK_SIZE_ENV: &str = "SEARCH_INDEXER_CHUNK_SIZE";

/// Whether the incremental indexer commits on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Leave durability to the caller (or to the writer's release).
    #[default]
    Deferred,
    /// Commit once after every item has been applied.
    OnSuccess,
}

/// Tuning for indexing and rebuild runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Items per chunk handed to one rebuild worker.
    pub chunk_size: usize,

    /// Upper bound on chunk workers running at once during a rebuild.
    pub max_concurrent_chunks: usize,

    /// Compact the index after every worker of a rebuild succeeded.
    pub optimize_after_rebuild: bool,

    /// Commit behaviour of incremental indexing.
    pub commit_policy: CommitPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_chunks: default_chunk_concurrency(),
            optimize_after_rebuild: true,
            commit_policy: CommitPolicy::Deferred,
        }
    }
}

impl IndexerConfig {
    /// Defaults overridden by `SEARCH_INDEXER_CHUNK_SIZE` and `SEARCH_INDEXER_CONCURRENCY`.
    pub fn from_env() -> Result<Self> {
        let chunk_size = match std::env::var(CHUNK_SIZE_ENV) {
            Ok(raw) => parse_chunk_size(&raw)?,
            Err(_) => DEFAULT_CHUNK_SIZE,
        };
        let config = Self {
            chunk_size,
            max_concurrent_chunks: chunk_concurrency_from_env(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_chunks(mut self, max_concurrent_chunks: usize) -> Self {
        self.max_concurrent_chunks = max_concurrent_chunks;
        self
    }

    #[must_use]
    pub fn with_optimize_after_rebuild(mut self, optimize: bool) -> Self {
        self.optimize_after_rebuild = optimize;
        self
    }

    #[must_use]
    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IndexerError::invalid_config("chunk_size must be > 0"));
        }

        if self.max_concurrent_chunks == 0 || self.max_concurrent_chunks > MAX_CHUNK_CONCURRENCY {
            return Err(IndexerError::invalid_config(format!(
                "max_concurrent_chunks must be within 1..={MAX_CHUNK_CONCURRENCY}, got {}",
                self.max_concurrent_chunks
            )));
        }

        Ok(())
    }
}

fn parse_chunk_size(raw: &str) -> Result<usize> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_CHUNK_SIZE);
    }
    match trimmed.parse::<usize>() {
        Ok(0) | Err(_) => Err(IndexerError::invalid_config(format!(
            "{CHUNK_SIZE_ENV} must be a positive integer, got {trimmed:?}"
        ))),
        Ok(size) => Ok(size),
    }
}
