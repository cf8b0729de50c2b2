use crate::index_lock::WriterLock;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where an index lives. Opaque to the orchestration code beyond equality and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexLocation {
    /// On-disk index rooted at a directory.
    Directory(PathBuf),
    /// Process-local index identified by name.
    InMemory(String),
}

impl IndexLocation {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::InMemory(name.into())
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Directory(path) => Some(path),
            Self::InMemory(_) => None,
        }
    }
}

impl fmt::Display for IndexLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(path) => write!(f, "{}", path.display()),
            Self::InMemory(name) => write!(f, "memory:{name}"),
        }
    }
}

/// The operations the indexer needs from an engine-backed index writer.
///
/// Every method takes `&self`: implementations synchronize internally so a single open
/// handle can be shared by the workers of one rebuild.
///
/// # Concurrency precondition
///
/// Implementations must tolerate concurrent [`update_document`](Self::update_document) and
/// [`delete_documents`](Self::delete_documents) calls against one open handle. They are *not*
/// required to tolerate two handles open against the same [`IndexLocation`]; the
/// [`ScopedWriter`](crate::ScopedWriter) serializes acquisition so that never happens within
/// this process.
pub trait WriterHandle: Send + Sync + 'static {
    type Term: Send + 'static;
    type Document: Send + 'static;

    /// Where the index written by this handle is stored.
    fn location(&self) -> IndexLocation;

    /// Replace every document matching `term` with `document`.
    fn update_document(&self, term: Self::Term, document: Self::Document) -> Result<()>;

    /// Remove every document matching `term`. Matching nothing is not an error.
    fn delete_documents(&self, term: Self::Term) -> Result<()>;

    /// Remove every document in the index.
    fn delete_all(&self) -> Result<()>;

    /// Make prior mutations durable and visible to new readers.
    fn commit(&self) -> Result<()>;

    /// Merge internal segments. Expensive; callers run it only when no other mutation is in
    /// flight on this handle.
    fn optimize(&self) -> Result<()>;

    /// Relinquish the handle. Must be safe to call after any earlier call failed.
    fn release(self) -> Result<()>
    where
        Self: Sized;
}

/// Produces writers bound to one storage location.
pub trait WriterFactory: Send + Sync + 'static {
    type Writer: WriterHandle;

    fn location(&self) -> IndexLocation;

    fn open(&self) -> Result<Self::Writer>;
}

/// Document type of the writers a factory produces.
pub type DocumentOf<F> = <<F as WriterFactory>::Writer as WriterHandle>::Document;

/// Term type of the writers a factory produces.
pub type TermOf<F> = <<F as WriterFactory>::Writer as WriterHandle>::Term;

/// A [`WriterFactory`] built from a location and a closure.
pub struct FnWriterFactory<F> {
    location: IndexLocation,
    open: F,
}

/// Adapt a closure into a [`WriterFactory`] bound to `location`.
pub fn writer_factory<W, F>(location: IndexLocation, open: F) -> FnWriterFactory<F>
where
    W: WriterHandle,
    F: Fn() -> Result<W> + Send + Sync + 'static,
{
    FnWriterFactory { location, open }
}

impl<W, F> WriterFactory for FnWriterFactory<F>
where
    W: WriterHandle,
    F: Fn() -> Result<W> + Send + Sync + 'static,
{
    type Writer = W;

    fn location(&self) -> IndexLocation {
        self.location.clone()
    }

    fn open(&self) -> Result<W> {
        (self.open)()
    }
}

/// A writer shared between the tasks of one scoped call.
///
/// Clones are cheap. The writer and its acquisition lock belong to the clones, not to the call
/// that opened them: whichever clone is dropped last releases the writer and only then gives up
/// the lock. Work that outlives its caller (a cancelled rebuild whose blocking workers are still
/// running) therefore keeps the location locked until it finishes.
pub struct SharedWriter<W: WriterHandle> {
    lease: Arc<Lease<W>>,
}

/// Exclusive use of one open writer. Released at most once.
pub(crate) struct Lease<W: WriterHandle> {
    writer: Option<W>,
    location: IndexLocation,
    // Declared after `writer`: the lock is dropped only once the writer has been released.
    _lock: Option<WriterLock>,
}

impl<W: WriterHandle> Lease<W> {
    /// Release the writer now, on the calling thread.
    pub(crate) fn release(mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.release(),
            None => Ok(()),
        }
    }
}

impl<W: WriterHandle> Drop for Lease<W> {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        match writer.release() {
            Ok(()) => log::debug!("Index writer for {} released by its last holder", self.location),
            Err(err) => log::warn!("Index writer for {} failed to release: {err}", self.location),
        }
    }
}

impl<W: WriterHandle> SharedWriter<W> {
    pub(crate) fn new(writer: W, lock: Option<WriterLock>) -> Self {
        let location = writer.location();
        Self {
            lease: Arc::new(Lease {
                writer: Some(writer),
                location,
                _lock: lock,
            }),
        }
    }

    /// Number of live clones, including this one.
    #[must_use]
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.lease)
    }

    /// The lease, when this is the last clone.
    pub(crate) fn try_into_lease(self) -> std::result::Result<Lease<W>, Self> {
        Arc::try_unwrap(self.lease).map_err(|lease| Self { lease })
    }
}

impl<W: WriterHandle> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            lease: Arc::clone(&self.lease),
        }
    }
}

impl<W: WriterHandle> Deref for SharedWriter<W> {
    type Target = W;

    fn deref(&self) -> &W {
        self.lease
            .writer
            .as_ref()
            .unwrap_or_else(|| unreachable!("shared index writer taken before its last holder"))
    }
}

impl<W: WriterHandle> fmt::Debug for SharedWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedWriter")
            .field("location", &self.lease.location)
            .field("holders", &self.holders())
            .finish()
    }
}
