use crate::index_lock::acquire_writer_lock;
use crate::writer::SharedWriter;
use crate::{IndexLocation, IndexerError, Result, WriterFactory, WriterHandle};
use std::future::Future;
use std::sync::Arc;

/// Runs work against a freshly acquired writer and always gives the writer back.
///
/// Acquisition is serialized per [`IndexLocation`], so two scoped calls against the same
/// location never hold open writers at the same time. Work receives a [`SharedWriter`] it may
/// clone into worker tasks. Clones that outlive the call (the caller's future was dropped, for
/// example by a timeout, while blocking workers still run) keep the writer and the lock; the
/// last one to finish releases the writer.
pub struct ScopedWriter<F> {
    factory: Arc<F>,
}

impl<F> Clone for ScopedWriter<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<F: WriterFactory> ScopedWriter<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    pub fn location(&self) -> IndexLocation {
        self.factory.location()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Acquire a writer, run `work`, release the writer.
    ///
    /// A factory failure is returned as [`IndexerError::Acquisition`] and `work` never runs.
    /// Otherwise the writer is released exactly once; a release failure is the result only when
    /// `work` succeeded, and is logged when it would mask an earlier error.
    pub async fn run<R, Fut, Work>(&self, work: Work) -> Result<R>
    where
        Work: FnOnce(SharedWriter<F::Writer>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let location = self.factory.location();
        let lock = acquire_writer_lock(&location)
            .await
            .map_err(IndexerError::into_acquisition)?;

        let writer = self.open_writer().await?;
        log::debug!("Opened index writer for {location}");

        let shared = SharedWriter::new(writer, Some(lock));
        let mut guard = ReleaseGuard {
            writer: Some(shared.clone()),
            location: location.clone(),
        };

        let outcome = work(shared).await;
        let released = guard.release().await;
        log::debug!("Released index writer for {location}");

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(release_err)) => {
                log::warn!("Index writer for {location} failed to release after error: {release_err}");
                Err(err)
            }
        }
    }

    /// Like [`run`](Self::run), for synchronous work executed on the blocking pool.
    pub async fn run_blocking<R, Work>(&self, work: Work) -> Result<R>
    where
        Work: FnOnce(&F::Writer) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.run(|writer| async move {
            tokio::task::spawn_blocking(move || work(&writer))
                .await
                .map_err(|err| IndexerError::Operation(format!("writer task failed: {err}")))?
        })
        .await
    }

    async fn open_writer(&self) -> Result<F::Writer> {
        let factory = Arc::clone(&self.factory);
        tokio::task::spawn_blocking(move || factory.open())
            .await
            .map_err(|err| IndexerError::Acquisition(format!("writer factory task failed: {err}")))?
            .map_err(IndexerError::into_acquisition)
    }
}

/// Owns the executor's reference to the writer until it is released.
///
/// The explicit path is [`ReleaseGuard::release`]. Dropping the guard with the writer still in
/// place (the work panicked or the call was cancelled) only drops this reference; the writer is
/// released by whichever holder goes last.
struct ReleaseGuard<W: WriterHandle> {
    writer: Option<SharedWriter<W>>,
    location: IndexLocation,
}

impl<W: WriterHandle> ReleaseGuard<W> {
    async fn release(&mut self) -> Result<()> {
        let Some(shared) = self.writer.take() else {
            return Ok(());
        };

        let lease = shared.try_into_lease().map_err(|shared| {
            IndexerError::Release(format!(
                "writer for {} still has {} outstanding reference(s); released when the last one drops",
                self.location,
                shared.holders() - 1
            ))
        })?;

        tokio::task::spawn_blocking(move || lease.release())
            .await
            .map_err(|err| IndexerError::Release(format!("release task failed: {err}")))?
            .map_err(IndexerError::into_release)
    }
}

impl<W: WriterHandle> Drop for ReleaseGuard<W> {
    fn drop(&mut self) {
        let Some(shared) = self.writer.take() else {
            return;
        };
        let others = shared.holders() - 1;
        if others > 0 {
            log::warn!(
                "Scoped call on {} ended early; {others} worker reference(s) will release the writer",
                self.location
            );
        }
        drop(shared);
    }
}
