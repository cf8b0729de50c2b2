use search_indexer::IndexerError;
use tantivy::TantivyError;

/// Map an engine failure; a held index lock is an acquisition failure.
pub(crate) fn engine_error(err: TantivyError) -> IndexerError {
    match err {
        TantivyError::LockFailure(lock_err, Some(detail)) => {
            IndexerError::Acquisition(format!("{lock_err}: {detail}"))
        }
        TantivyError::LockFailure(lock_err, None) => IndexerError::Acquisition(lock_err.to_string()),
        other => IndexerError::engine(other.to_string()),
    }
}

pub(crate) fn poisoned(location: &search_indexer::IndexLocation) -> IndexerError {
    IndexerError::engine(format!("index writer lock for {location} poisoned"))
}
