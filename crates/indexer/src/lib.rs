//! # Search Indexer
//!
//! Writer-scoped maintenance of a full-text search index.
//!
//! ## Pipeline
//!
//! ```text
//! Records
//!     │
//!     ├──> Chunker (fixed size, lazy)
//!     │      └─> Chunks of IndexItem { key, documents }
//!     │
//!     ├──> Scoped Writer (one writer per location)
//!     │      ├─> index:    sequential upserts, optional commit
//!     │      ├─> rebuild:  clear + commit, parallel chunks, compaction
//!     │      └─> optimize: compaction only
//!     │
//!     └──> Release (always, even on failure)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use search_indexer::{writer_factory, IndexItem, IndexLocation, SearchIndexer, TermFactories};
//! # use search_indexer::{Result, WriterHandle};
//! # struct Engine;
//! # impl WriterHandle for Engine {
//! #     type Term = String;
//! #     type Document = String;
//! #     fn location(&self) -> IndexLocation { IndexLocation::in_memory("tasks") }
//! #     fn update_document(&self, _: String, _: String) -> Result<()> { Ok(()) }
//! #     fn delete_documents(&self, _: String) -> Result<()> { Ok(()) }
//! #     fn delete_all(&self) -> Result<()> { Ok(()) }
//! #     fn commit(&self) -> Result<()> { Ok(()) }
//! #     fn optimize(&self) -> Result<()> { Ok(()) }
//! #     fn release(self) -> Result<()> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> search_indexer::Result<()> {
//!     let factory = writer_factory(IndexLocation::in_memory("tasks"), || Ok(Engine));
//!     let indexer = SearchIndexer::new(factory);
//!
//!     let chunks = indexer.chunk_items(1..=1000_u32, |id| {
//!         IndexItem::single(id, format!("task {id}"))
//!     })?;
//!     indexer
//!         .rebuild(chunks, TermFactories::new(|id: &u32, _: &String| Ok(format!("Id:{id}"))))
//!         .await
//! }
//! ```

mod chunker;
mod config;
mod error;
mod incremental;
mod index_lock;
mod indexer;
mod limits;
mod optimize;
mod rebuild;
mod scoped;
mod terms;
mod writer;

#[cfg(test)]
mod test_support;

pub use chunker::{chunk, map_to_chunks, Chunk, Chunks, IndexItem};
pub use config::{CommitPolicy, IndexerConfig, DEFAULT_CHUNK_SIZE};
pub use error::{IndexerError, Result};
pub use incremental::{index, index_items, IndexStats};
pub use index_lock::{writer_lock_wait_ms_last, writer_lock_wait_ms_max};
pub use indexer::SearchIndexer;
pub use limits::{chunk_concurrency_snapshot, ChunkConcurrencySnapshot, MAX_CHUNK_CONCURRENCY};
pub use optimize::optimize;
pub use rebuild::{rebuild, ChunkProgress, RebuildOptions};
pub use scoped::ScopedWriter;
pub use terms::TermFactories;
pub use writer::{
    writer_factory, DocumentOf, FnWriterFactory, IndexLocation, SharedWriter, TermOf,
    WriterFactory, WriterHandle,
};
