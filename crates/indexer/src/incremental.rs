use crate::writer::{DocumentOf, TermOf};
use crate::{
    Chunk, CommitPolicy, IndexItem, IndexLocation, Result, ScopedWriter, TermFactories,
    WriterFactory, WriterHandle,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Work done by one incremental run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub items: usize,
    pub documents: usize,
    pub deletes: usize,
}

/// Apply targeted upserts against an open writer, one item at a time.
///
/// For every item the delete term (when a delete factory is present) is applied first, then each
/// document is written under its update term, in order. The first failure stops the run.
pub fn index_items<W, K, C>(
    writer: &W,
    chunks: C,
    terms: &TermFactories<K, W::Document, W::Term>,
    commit: CommitPolicy,
) -> Result<IndexStats>
where
    W: WriterHandle,
    C: IntoIterator<Item = Chunk<K, W::Document>>,
{
    let mut stats = IndexStats::default();

    for (chunk_no, chunk) in chunks.into_iter().enumerate() {
        stats.chunks += 1;
        for (position, item) in chunk.into_iter().enumerate() {
            apply_item(writer, item, terms, &mut stats)
                .map_err(|err| err.into_operation(&format!("chunk {chunk_no}, item {position}")))?;
        }
    }

    if commit == CommitPolicy::OnSuccess {
        writer.commit().map_err(|err| err.into_operation("commit"))?;
    }

    Ok(stats)
}

fn apply_item<W, K>(
    writer: &W,
    item: IndexItem<K, W::Document>,
    terms: &TermFactories<K, W::Document, W::Term>,
    stats: &mut IndexStats,
) -> Result<()>
where
    W: WriterHandle,
{
    let IndexItem { key, documents } = item;

    if let Some(term) = terms.delete_term(&key) {
        writer.delete_documents(term?)?;
        stats.deletes += 1;
    }

    for document in documents {
        let term = terms.update_term(&key, &document)?;
        writer.update_document(term, document)?;
        stats.documents += 1;
    }

    stats.items += 1;
    Ok(())
}

/// Acquire a writer, apply [`index_items`], release, and report where the index lives.
pub async fn index<F, K, C>(
    scoped: &ScopedWriter<F>,
    chunks: C,
    terms: TermFactories<K, DocumentOf<F>, TermOf<F>>,
    commit: CommitPolicy,
) -> Result<IndexLocation>
where
    F: WriterFactory,
    K: Send + 'static,
    C: IntoIterator<Item = Chunk<K, DocumentOf<F>>> + Send + 'static,
{
    let start = Instant::now();
    log::debug!(
        "Indexing into {} (delete before update: {})",
        scoped.location(),
        terms.deletes_before_update()
    );
    scoped
        .run_blocking(move |writer| {
            let stats = index_items(writer, chunks, &terms, commit)?;
            log::info!(
                "Indexed {} items ({} documents, {} deletes) into {} in {} ms",
                stats.items,
                stats.documents,
                stats.deletes,
                writer.location(),
                start.elapsed().as_millis()
            );
            Ok(writer.location())
        })
        .await
}
