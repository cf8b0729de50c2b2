//! # Search Indexer for tantivy
//!
//! Implements the `search-indexer` writer contract on a [`tantivy`] index.
//!
//! ```no_run
//! use search_indexer::{IndexItem, SearchIndexer, TermFactories};
//! use search_indexer_tantivy::{lowercase_keyword_text_options, TantivyWriterFactory};
//! use tantivy::schema::{Schema, STORED, TEXT};
//! use tantivy::{doc, Term};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut builder = Schema::builder();
//!     let id = builder.add_text_field("id", lowercase_keyword_text_options() | STORED);
//!     let body = builder.add_text_field("body", TEXT);
//!
//!     let factory = TantivyWriterFactory::open_or_create("/var/lib/tasks", builder.build())?;
//!     let indexer = SearchIndexer::new(factory);
//!     let chunks = indexer.chunk_items(1..=1000_u32, |n| {
//!         IndexItem::single(n.to_string(), doc!(id => n.to_string(), body => format!("task {n}")))
//!     })?;
//!     indexer
//!         .rebuild(chunks, TermFactories::new(move |key: &String, _| Ok(Term::from_field_text(id, key))))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod analyzer;
mod config;
mod error;
mod factory;
mod writer;

pub use analyzer::{
    lowercase_keyword_analyzer, lowercase_keyword_term, lowercase_keyword_text_options,
    register_lowercase_keyword, LOWERCASE_KEYWORD,
};
pub use config::{TantivyWriterConfig, DEFAULT_HEAP_SIZE_BYTES, MIN_HEAP_SIZE_BYTES};
pub use factory::{scoped_writer, TantivyWriterFactory};
pub use writer::TantivyWriter;
