use crate::{IndexerError, Result, ScopedWriter, WriterFactory, WriterHandle};
use std::time::Instant;

/// Compact an existing index outside of a rebuild.
///
/// Merging segments is expensive; run it when the index sees little traffic.
pub async fn optimize<F: WriterFactory>(scoped: &ScopedWriter<F>) -> Result<()> {
    let start = Instant::now();
    let location = scoped.location();

    scoped
        .run_blocking(|writer| writer.optimize().map_err(IndexerError::into_compaction))
        .await?;

    log::info!(
        "Optimized index at {location} in {} ms",
        start.elapsed().as_millis()
    );
    Ok(())
}
