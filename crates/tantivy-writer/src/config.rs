use search_indexer::{IndexerError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HEAP_SIZE_BYTES: usize = 50_000_000;

/// Smallest indexing heap tantivy accepts for a single indexing thread.
pub const MIN_HEAP_SIZE_BYTES: usize = 15_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TantivyWriterConfig {
    /// Indexing heap shared by all indexing threads of one writer.
    pub heap_size_bytes: usize,
    /// Indexing threads; `None` lets tantivy pick from the heap size and CPU count.
    pub num_threads: Option<usize>,
    /// Commit pending work when the writer is released.
    pub commit_on_release: bool,
}

impl Default for TantivyWriterConfig {
    fn default() -> Self {
        Self {
            heap_size_bytes: DEFAULT_HEAP_SIZE_BYTES,
            num_threads: None,
            commit_on_release: true,
        }
    }
}

impl TantivyWriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(IndexerError::invalid_config("num_threads must be at least 1"));
        }
        let threads = self.num_threads.unwrap_or(1);
        if self.heap_size_bytes / threads < MIN_HEAP_SIZE_BYTES {
            return Err(IndexerError::invalid_config(format!(
                "heap_size_bytes {} leaves less than {MIN_HEAP_SIZE_BYTES} bytes per indexing thread",
                self.heap_size_bytes
            )));
        }
        Ok(())
    }
}
