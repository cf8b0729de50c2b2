use crate::analyzer::register_lowercase_keyword;
use crate::error::engine_error;
use crate::{TantivyWriter, TantivyWriterConfig};
use search_indexer::{IndexLocation, IndexerError, Result, ScopedWriter, WriterFactory};
use std::path::PathBuf;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

/// Opens [`TantivyWriter`]s over one tantivy [`Index`].
pub struct TantivyWriterFactory {
    index: Index,
    location: IndexLocation,
    config: TantivyWriterConfig,
}

impl TantivyWriterFactory {
    /// Open the index stored in `dir`, creating the directory and an empty index when missing.
    ///
    /// An existing index must have been created with an identical schema.
    pub fn open_or_create(dir: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let directory = MmapDirectory::open(&dir).map_err(|err| {
            IndexerError::engine(format!("cannot open index directory {}: {err}", dir.display()))
        })?;
        let index = Index::open_or_create(directory, schema).map_err(engine_error)?;
        Ok(Self::from_index(index, IndexLocation::Directory(dir)))
    }

    /// A fresh index held in RAM, addressed as `memory:<name>`.
    pub fn in_memory(name: impl Into<String>, schema: Schema) -> Self {
        Self::from_index(Index::create_in_ram(schema), IndexLocation::in_memory(name))
    }

    pub fn from_index(index: Index, location: IndexLocation) -> Self {
        register_lowercase_keyword(&index);
        Self {
            index,
            location,
            config: TantivyWriterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TantivyWriterConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn config(&self) -> &TantivyWriterConfig {
        &self.config
    }

    /// A reader that only sees new commits after [`IndexReader::reload`].
    pub fn reader(&self) -> Result<IndexReader> {
        self.index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(engine_error)
    }

    /// Documents visible in the latest commit.
    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.reader()?.searcher().num_docs())
    }
}

impl WriterFactory for TantivyWriterFactory {
    type Writer = TantivyWriter;

    fn location(&self) -> IndexLocation {
        self.location.clone()
    }

    fn open(&self) -> Result<TantivyWriter> {
        let heap = self.config.heap_size_bytes;
        let writer: IndexWriter = match self.config.num_threads {
            Some(threads) => self.index.writer_with_num_threads(threads, heap),
            None => self.index.writer(heap),
        }
        .map_err(engine_error)?;

        Ok(TantivyWriter::new(
            self.index.clone(),
            self.location.clone(),
            writer,
            self.config.commit_on_release,
        ))
    }
}

/// Scoped executor over `factory`.
pub fn scoped_writer(factory: TantivyWriterFactory) -> ScopedWriter<TantivyWriterFactory> {
    ScopedWriter::new(factory)
}
