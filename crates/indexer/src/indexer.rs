use crate::chunker::{map_to_chunks, Chunks};
use crate::rebuild::{rebuild, ChunkProgress, RebuildOptions};
use crate::writer::{DocumentOf, TermOf};
use crate::{
    incremental, optimize, Chunk, CommitPolicy, IndexItem, IndexLocation, IndexerConfig, Result,
    ScopedWriter, TermFactories, WriterFactory,
};
use std::iter::Map;

/// Search index maintenance bound to one writer factory and one configuration.
pub struct SearchIndexer<F> {
    scoped: ScopedWriter<F>,
    config: IndexerConfig,
}

impl<F: WriterFactory> SearchIndexer<F> {
    /// Create an indexer with [`IndexerConfig::default`].
    pub fn new(factory: F) -> Self {
        Self {
            scoped: ScopedWriter::new(factory),
            config: IndexerConfig::default(),
        }
    }

    pub fn with_config(factory: F, config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scoped: ScopedWriter::new(factory),
            config,
        })
    }

    /// Configuration read from the environment, see [`IndexerConfig::from_env`].
    pub fn from_env(factory: F) -> Result<Self> {
        Self::with_config(factory, IndexerConfig::from_env()?)
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn location(&self) -> IndexLocation {
        self.scoped.location()
    }

    pub fn scoped_writer(&self) -> &ScopedWriter<F> {
        &self.scoped
    }

    /// Map `items` to index entries and split them by the configured chunk size.
    pub fn chunk_items<T, K, I, M>(
        &self,
        items: I,
        mapper: M,
    ) -> Result<Chunks<Map<I::IntoIter, M>>>
    where
        I: IntoIterator<Item = T>,
        M: FnMut(T) -> IndexItem<K, DocumentOf<F>>,
    {
        map_to_chunks(items, mapper, self.config.chunk_size)
    }

    /// Targeted upserts using the configured commit policy.
    pub async fn index<K, C>(
        &self,
        chunks: C,
        terms: TermFactories<K, DocumentOf<F>, TermOf<F>>,
    ) -> Result<IndexLocation>
    where
        K: Send + 'static,
        C: IntoIterator<Item = Chunk<K, DocumentOf<F>>> + Send + 'static,
    {
        self.index_with(chunks, terms, self.config.commit_policy)
            .await
    }

    pub async fn index_with<K, C>(
        &self,
        chunks: C,
        terms: TermFactories<K, DocumentOf<F>, TermOf<F>>,
        commit: CommitPolicy,
    ) -> Result<IndexLocation>
    where
        K: Send + 'static,
        C: IntoIterator<Item = Chunk<K, DocumentOf<F>>> + Send + 'static,
    {
        incremental::index(&self.scoped, chunks, terms, commit).await
    }

    /// Replace the index contents with `chunks`.
    pub async fn rebuild<K, C>(
        &self,
        chunks: C,
        terms: TermFactories<K, DocumentOf<F>, TermOf<F>>,
    ) -> Result<()>
    where
        K: Send + 'static,
        C: IntoIterator<Item = Chunk<K, DocumentOf<F>>>,
    {
        rebuild(
            &self.scoped,
            chunks,
            terms,
            None,
            RebuildOptions::from(&self.config),
        )
        .await
    }

    pub async fn rebuild_with_progress<K, C>(
        &self,
        chunks: C,
        terms: TermFactories<K, DocumentOf<F>, TermOf<F>>,
        on_chunk_indexed: ChunkProgress<'_>,
    ) -> Result<()>
    where
        K: Send + 'static,
        C: IntoIterator<Item = Chunk<K, DocumentOf<F>>>,
    {
        rebuild(
            &self.scoped,
            chunks,
            terms,
            Some(on_chunk_indexed),
            RebuildOptions::from(&self.config),
        )
        .await
    }

    pub async fn optimize(&self) -> Result<()> {
        optimize::optimize(&self.scoped).await
    }
}
