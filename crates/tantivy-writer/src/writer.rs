use crate::error::{engine_error, poisoned};
use search_indexer::{IndexLocation, Result, WriterHandle};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tantivy::indexer::UserOperation;
use tantivy::{Index, IndexWriter, TantivyDocument, Term};

/// A tantivy [`IndexWriter`] behind the [`WriterHandle`] contract.
///
/// Updates and deletes share the writer through a read lock; tantivy queues them to its own
/// indexing threads. Commit, delete-all and optimize hold the write lock so no update is
/// interleaved with them.
pub struct TantivyWriter {
    index: Index,
    location: IndexLocation,
    writer: RwLock<IndexWriter>,
    commit_on_release: bool,
}

impl TantivyWriter {
    pub(crate) fn new(
        index: Index,
        location: IndexLocation,
        writer: IndexWriter,
        commit_on_release: bool,
    ) -> Self {
        Self {
            index,
            location,
            writer: RwLock::new(writer),
            commit_on_release,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, IndexWriter>> {
        self.writer.read().map_err(|_| poisoned(&self.location))
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, IndexWriter>> {
        self.writer.write().map_err(|_| poisoned(&self.location))
    }
}

impl WriterHandle for TantivyWriter {
    type Term = Term;
    type Document = TantivyDocument;

    fn location(&self) -> IndexLocation {
        self.location.clone()
    }

    fn update_document(&self, term: Term, document: TantivyDocument) -> Result<()> {
        self.shared()?
            .run([UserOperation::Delete(term), UserOperation::Add(document)])
            .map_err(engine_error)?;
        Ok(())
    }

    fn delete_documents(&self, term: Term) -> Result<()> {
        self.shared()?.delete_term(term);
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.exclusive()?
            .delete_all_documents()
            .map_err(engine_error)?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let opstamp = self.exclusive()?.commit().map_err(engine_error)?;
        log::debug!("Committed {} at opstamp {opstamp}", self.location);
        Ok(())
    }

    fn optimize(&self) -> Result<()> {
        let mut writer = self.exclusive()?;
        writer.commit().map_err(engine_error)?;

        let segment_ids = self.index.searchable_segment_ids().map_err(engine_error)?;
        if segment_ids.len() > 1 {
            writer.merge(&segment_ids).wait().map_err(engine_error)?;
        }
        let collected = writer
            .garbage_collect_files()
            .wait()
            .map_err(engine_error)?;

        log::debug!(
            "Merged {} segments of {}; removed {} obsolete files",
            segment_ids.len(),
            self.location,
            collected.deleted_files.len()
        );
        Ok(())
    }

    fn release(self) -> Result<()> {
        let Self {
            location,
            writer,
            commit_on_release,
            ..
        } = self;
        let mut writer = writer.into_inner().map_err(|_| poisoned(&location))?;

        if commit_on_release {
            writer.commit().map_err(engine_error)?;
        }
        writer.wait_merging_threads().map_err(engine_error)
    }
}
