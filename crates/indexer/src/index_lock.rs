use crate::{IndexLocation, IndexerError, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

static WRITER_LOCK_WAIT_MS_LAST: AtomicU64 = AtomicU64::new(0);
static WRITER_LOCK_WAIT_MS_MAX: AtomicU64 = AtomicU64::new(0);

pub fn writer_lock_wait_ms_last() -> u64 {
    WRITER_LOCK_WAIT_MS_LAST.load(Ordering::Relaxed)
}

pub fn writer_lock_wait_ms_max() -> u64 {
    WRITER_LOCK_WAIT_MS_MAX.load(Ordering::Relaxed)
}

fn update_write_lock_wait_ms(wait_ms: u64) {
    WRITER_LOCK_WAIT_MS_LAST.store(wait_ms, Ordering::Relaxed);
    WRITER_LOCK_WAIT_MS_MAX.fetch_max(wait_ms, Ordering::Relaxed);
}

/// Held for as long as a writer is open against a location.
///
/// Dropping it unlocks the cross-process file lock first, then the in-process mutex.
pub(crate) struct WriterLock {
    file: Option<std::fs::File>,
    _local: OwnedMutexGuard<()>,
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

fn local_lock_for(location: &IndexLocation) -> Arc<TokioMutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<IndexLocation, Arc<TokioMutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    locks
        .entry(location.clone())
        .or_insert_with(|| Arc::new(TokioMutex::new(())))
        .clone()
}

/// Sibling of the index directory, so the engine never sees a foreign file in its own
/// directory.
pub(crate) fn lock_path_for_dir(dir: &Path) -> PathBuf {
    match (dir.parent(), dir.file_name()) {
        (Some(parent), Some(name)) => {
            let mut file_name = name.to_os_string();
            file_name.push(".writer.lock");
            parent.join(file_name)
        }
        _ => dir.join(".writer.lock"),
    }
}

/// Serialize writer acquisition for `location` within this process and, for on-disk indexes,
/// across processes.
pub(crate) async fn acquire_writer_lock(location: &IndexLocation) -> Result<WriterLock> {
    let start = Instant::now();
    let local = local_lock_for(location).lock_owned().await;

    let file = match location.as_path() {
        Some(dir) => Some(lock_file(lock_path_for_dir(dir)).await?),
        None => None,
    };
    update_write_lock_wait_ms(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));

    Ok(WriterLock {
        file,
        _local: local,
    })
}

async fn lock_file(path: PathBuf) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || -> Result<std::fs::File> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Acquisition(format!("open writer lock {}: {err}", path.display()))
            })?;

        file.lock_exclusive().map_err(|err| {
            IndexerError::Acquisition(format!("acquire writer lock {}: {err}", path.display()))
        })?;

        Ok(file)
    })
    .await
    .map_err(|err| IndexerError::Acquisition(format!("join writer lock task: {err}")))?
}
