use crate::limits::ChunkWorkerGuard;
use crate::writer::{DocumentOf, SharedWriter, TermOf};
use crate::{
    Chunk, IndexItem, IndexerConfig, IndexerError, Result, ScopedWriter, TermFactories,
    WriterFactory, WriterHandle,
};
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};

/// Progress callback invoked with the item count of every chunk that finished indexing.
pub type ChunkProgress<'a> = &'a mut (dyn FnMut(usize) + Send);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildOptions {
    /// Chunk workers allowed to run at once.
    pub max_concurrent_chunks: usize,
    /// Compact once every chunk has been indexed.
    pub optimize: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self::from(&IndexerConfig::default())
    }
}

impl From<&IndexerConfig> for RebuildOptions {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            max_concurrent_chunks: config.max_concurrent_chunks,
            optimize: config.optimize_after_rebuild,
        }
    }
}

/// Replace the whole index with `chunks`.
///
/// 1. Clear: `delete_all` then `commit`. A failure here aborts before any worker starts.
/// 2. Fan-out: every non-empty chunk is indexed by its own blocking task; all tasks share the
///    one writer. Updates inside a chunk keep the chunk's order; chunks run in any order.
/// 3. Fan-in: every started task is awaited. The first failure observed is the result and no
///    further chunks are launched once it is seen.
/// 4. Compact, only when every chunk succeeded and `options.optimize` is set.
///
/// `on_chunk_indexed` receives the item count of each chunk that succeeded. The delete factory
/// of `terms` is not consulted: the index is empty when the workers start.
pub async fn rebuild<F, K, C>(
    scoped: &ScopedWriter<F>,
    chunks: C,
    terms: TermFactories<K, DocumentOf<F>, TermOf<F>>,
    on_chunk_indexed: Option<ChunkProgress<'_>>,
    options: RebuildOptions,
) -> Result<()>
where
    F: WriterFactory,
    K: Send + 'static,
    C: IntoIterator<Item = Chunk<K, DocumentOf<F>>>,
{
    let start = Instant::now();
    let location = scoped.location();
    log::info!("Rebuilding index at {location}");
    if terms.deletes_before_update() {
        log::debug!("Rebuild of {location} ignores the delete term factory; the index starts empty");
    }

    scoped
        .run(|writer| async move {
            clear_index(&writer).await?;

            let fan_in = fan_out(
                &writer,
                chunks,
                &terms,
                on_chunk_indexed,
                options.max_concurrent_chunks,
            )
            .await;
            if let Some(err) = fan_in.first_error {
                log::warn!(
                    "Rebuild of {location} failed after {} chunks; skipping compaction",
                    fan_in.chunks
                );
                return Err(err);
            }

            if options.optimize {
                on_blocking_pool(&writer, |writer| writer.optimize())
                    .await
                    .map_err(IndexerError::into_compaction)?;
            }

            log::info!(
                "Rebuilt index at {location}: {} chunks, {} items, {} documents in {} ms",
                fan_in.chunks,
                fan_in.items,
                fan_in.documents,
                start.elapsed().as_millis()
            );
            Ok(())
        })
        .await
}

async fn clear_index<W: WriterHandle>(writer: &SharedWriter<W>) -> Result<()> {
    on_blocking_pool(writer, |writer| {
        writer.delete_all()?;
        writer.commit()
    })
    .await
    .map_err(|err| err.into_operation("clear index"))
}

async fn on_blocking_pool<W, R, Op>(writer: &SharedWriter<W>, op: Op) -> Result<R>
where
    W: WriterHandle,
    R: Send + 'static,
    Op: FnOnce(&W) -> Result<R> + Send + 'static,
{
    let writer = writer.clone();
    tokio::task::spawn_blocking(move || op(&writer))
        .await
        .map_err(|err| IndexerError::Other(format!("writer task failed: {err}")))?
}

struct ChunkReport {
    items: usize,
    documents: usize,
}

#[derive(Default)]
struct FanIn {
    chunks: usize,
    items: usize,
    documents: usize,
    first_error: Option<IndexerError>,
}

impl FanIn {
    fn failed(&self) -> bool {
        self.first_error.is_some()
    }

    fn record(
        &mut self,
        joined: std::result::Result<Result<ChunkReport>, JoinError>,
        on_chunk_indexed: &mut Option<ChunkProgress<'_>>,
    ) {
        let err = match joined {
            Ok(Ok(report)) => {
                self.chunks += 1;
                self.items += report.items;
                self.documents += report.documents;
                if let Some(callback) = on_chunk_indexed.as_mut() {
                    callback(report.items);
                }
                return;
            }
            Ok(Err(err)) => err,
            Err(join_err) => IndexerError::Operation(format!("chunk worker failed: {join_err}")),
        };

        if self.first_error.is_none() {
            log::warn!("Chunk failed during rebuild: {err}");
            self.first_error = Some(err);
        } else {
            log::debug!("Additional chunk failure during rebuild: {err}");
        }
    }
}

async fn fan_out<W, K, C>(
    writer: &SharedWriter<W>,
    chunks: C,
    terms: &TermFactories<K, W::Document, W::Term>,
    mut on_chunk_indexed: Option<ChunkProgress<'_>>,
    max_concurrent_chunks: usize,
) -> FanIn
where
    W: WriterHandle,
    K: Send + 'static,
    C: IntoIterator<Item = Chunk<K, W::Document>>,
{
    let limit = max_concurrent_chunks.max(1);
    let mut workers = JoinSet::new();
    let mut fan_in = FanIn::default();

    for (chunk_no, chunk) in chunks.into_iter().enumerate() {
        while let Some(joined) = workers.try_join_next() {
            fan_in.record(joined, &mut on_chunk_indexed);
        }
        while workers.len() >= limit {
            let Some(joined) = workers.join_next().await else {
                break;
            };
            fan_in.record(joined, &mut on_chunk_indexed);
        }
        if fan_in.failed() {
            log::debug!("Not launching chunk {chunk_no} or later after a failure");
            break;
        }
        if chunk.is_empty() {
            continue;
        }

        let writer = writer.clone();
        let terms = terms.clone();
        let queued = ChunkWorkerGuard::queued();
        workers.spawn_blocking(move || {
            let _running = queued.start();
            index_chunk(&*writer, chunk, &terms)
                .map_err(|err| err.into_operation(&format!("chunk {chunk_no}")))
        });
    }

    while let Some(joined) = workers.join_next().await {
        fan_in.record(joined, &mut on_chunk_indexed);
    }
    fan_in
}

fn index_chunk<W, K>(
    writer: &W,
    chunk: Chunk<K, W::Document>,
    terms: &TermFactories<K, W::Document, W::Term>,
) -> Result<ChunkReport>
where
    W: WriterHandle,
{
    let items = chunk.len();
    let mut documents = 0;

    for (position, IndexItem { key, documents: docs }) in chunk.into_iter().enumerate() {
        for document in docs {
            let term = terms
                .update_term(&key, &document)
                .map_err(|err| err.into_operation(&format!("item {position}")))?;
            writer
                .update_document(term, document)
                .map_err(|err| err.into_operation(&format!("item {position}")))?;
            documents += 1;
        }
    }

    Ok(ChunkReport { items, documents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, Faults, Recorder};
    use crate::{chunk, map_to_chunks};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::time::Duration;

    fn id_terms() -> TermFactories<u32, String, String> {
        TermFactories::new(|key: &u32, _doc: &String| Ok(format!("Id:{key}")))
    }

    fn options(max_concurrent_chunks: usize) -> RebuildOptions {
        RebuildOptions {
            max_concurrent_chunks,
            optimize: true,
        }
    }

    fn three_items_and_an_empty_chunk() -> Vec<Chunk<u32, String>> {
        vec![
            vec![
                IndexItem::single(1, "one".to_string()),
                IndexItem::single(2, "two".to_string()),
                IndexItem::single(3, "three".to_string()),
            ],
            Vec::new(),
        ]
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rebuild_clears_indexes_and_compacts() {
        let recorder = Recorder::new("rebuild-happy", Faults::default());
        let mut indexed = 0;

        rebuild(
            &recorder.scoped(),
            three_items_and_an_empty_chunk(),
            id_terms(),
            Some(&mut |count: usize| indexed += count),
            options(4),
        )
        .await
        .expect("rebuild");

        let calls = recorder.calls();
        assert_eq!(calls[..2].to_vec(), vec![Call::DeleteAll, Call::Commit]);
        assert_eq!(
            calls[calls.len() - 2..].to_vec(),
            vec![Call::Optimize, Call::Release]
        );
        assert_eq!(recorder.count(&Call::DeleteAll), 1);
        assert_eq!(recorder.count(&Call::Commit), 1);
        assert_eq!(recorder.count(&Call::Optimize), 1);

        let terms: HashSet<String> = recorder.updates().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            terms,
            HashSet::from(["Id:1".to_string(), "Id:2".to_string(), "Id:3".to_string()])
        );
        assert_eq!(indexed, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_update_fails_rebuild_without_compaction() {
        let recorder = Recorder::new(
            "rebuild-update-fails",
            Faults {
                update_terms: vec!["Id:2".into()],
                ..Faults::default()
            },
        );
        let mut indexed = 0;

        let err = rebuild(
            &recorder.scoped(),
            three_items_and_an_empty_chunk(),
            id_terms(),
            Some(&mut |count: usize| indexed += count),
            options(4),
        )
        .await
        .expect_err("update failure");

        assert!(matches!(err, IndexerError::Operation(_)), "{err}");
        assert!(err.to_string().contains("chunk 0: item 1"), "{err}");
        assert_eq!(recorder.count(&Call::DeleteAll), 1);
        assert_eq!(recorder.count(&Call::Commit), 1);
        assert_eq!(recorder.count(&Call::Optimize), 0);
        assert_eq!(recorder.count(&Call::Release), 1);
        assert_eq!(indexed, 0, "failed chunks never report progress");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clear_failure_starts_no_workers() {
        let recorder = Recorder::new(
            "rebuild-clear-fails",
            Faults {
                delete_all: true,
                ..Faults::default()
            },
        );

        let err = rebuild(
            &recorder.scoped(),
            three_items_and_an_empty_chunk(),
            id_terms(),
            None,
            options(4),
        )
        .await
        .expect_err("clear failure");

        assert!(err.to_string().contains("clear index"), "{err}");
        assert_eq!(recorder.calls(), vec![Call::DeleteAll, Call::Release]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn progress_sums_to_item_count() {
        let recorder = Recorder::new("rebuild-progress", Faults::default());
        let mut reports = Vec::new();
        let chunks = map_to_chunks(
            0..1050_u32,
            |i| IndexItem::new(i, vec![format!("doc-{i}")]),
            100,
        )
        .expect("chunker");

        rebuild(
            &recorder.scoped(),
            chunks,
            id_terms(),
            Some(&mut |count: usize| reports.push(count)),
            options(3),
        )
        .await
        .expect("rebuild");

        assert_eq!(reports.len(), 11);
        assert_eq!(reports.iter().sum::<usize>(), 1050);
        assert_eq!(recorder.updates().len(), 1050);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn chunk_order_is_kept_within_a_chunk() {
        let recorder = Recorder::new("rebuild-order", Faults::default());
        let items = (0..40_u32).map(|i| IndexItem::new(i, vec![format!("{i}-a"), format!("{i}-b")]));
        let chunks = chunk(items, 10).expect("chunker");

        rebuild(&recorder.scoped(), chunks, id_terms(), None, options(4))
            .await
            .expect("rebuild");

        let documents: Vec<String> = recorder.updates().into_iter().map(|(_, d)| d).collect();
        for chunk_start in (0..40_u32).step_by(10) {
            let positions: Vec<usize> = (chunk_start..chunk_start + 10)
                .flat_map(|i| [format!("{i}-a"), format!("{i}-b")])
                .map(|doc| {
                    documents
                        .iter()
                        .position(|d| *d == doc)
                        .expect("document indexed")
                })
                .collect();
            assert!(
                positions.windows(2).all(|w| w[0] < w[1]),
                "chunk starting at {chunk_start} reordered"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_share_one_writer_concurrently() {
        let recorder = Recorder::new(
            "rebuild-concurrent",
            Faults {
                update_delay: Some(Duration::from_millis(20)),
                ..Faults::default()
            },
        );
        let chunks = chunk((0..8_u32).map(|i| IndexItem::single(i, i.to_string())), 2)
            .expect("chunker");

        rebuild(&recorder.scoped(), chunks, id_terms(), None, options(4))
            .await
            .expect("rebuild");

        assert_eq!(recorder.opened(), 1);
        assert!(recorder.peak_concurrent_updates() >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_limit_is_respected() {
        let recorder = Recorder::new(
            "rebuild-serial",
            Faults {
                update_delay: Some(Duration::from_millis(5)),
                ..Faults::default()
            },
        );
        let chunks = chunk((0..8_u32).map(|i| IndexItem::single(i, i.to_string())), 2)
            .expect("chunker");

        rebuild(&recorder.scoped(), chunks, id_terms(), None, options(1))
            .await
            .expect("rebuild");

        assert_eq!(recorder.peak_concurrent_updates(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn no_chunks_launch_after_a_failure() {
        let recorder = Recorder::new(
            "rebuild-stops-launching",
            Faults {
                update_terms: vec!["Id:0".into()],
                ..Faults::default()
            },
        );
        let chunks = chunk((0..6_u32).map(|i| IndexItem::single(i, i.to_string())), 2)
            .expect("chunker");

        rebuild(&recorder.scoped(), chunks, id_terms(), None, options(1))
            .await
            .expect_err("first chunk fails");

        assert!(recorder.updates().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compaction_can_be_skipped_or_fail() {
        let skipped = Recorder::new("rebuild-no-optimize", Faults::default());
        rebuild(
            &skipped.scoped(),
            three_items_and_an_empty_chunk(),
            id_terms(),
            None,
            RebuildOptions {
                max_concurrent_chunks: 2,
                optimize: false,
            },
        )
        .await
        .expect("rebuild without compaction");
        assert_eq!(skipped.count(&Call::Optimize), 0);

        let failing = Recorder::new(
            "rebuild-optimize-fails",
            Faults {
                optimize: true,
                ..Faults::default()
            },
        );
        let err = rebuild(
            &failing.scoped(),
            three_items_and_an_empty_chunk(),
            id_terms(),
            None,
            options(2),
        )
        .await
        .expect_err("compaction failure");
        assert!(matches!(err, IndexerError::Compaction(_)), "{err}");
        assert_eq!(failing.updates().len(), 3);
        assert_eq!(failing.count(&Call::Release), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_return_the_first_after_all_workers_finish() {
        let recorder = Recorder::new(
            "rebuild-two-failures",
            Faults {
                update_terms: vec!["Id:0".into(), "Id:3".into()],
                update_delay: Some(Duration::from_millis(30)),
                ..Faults::default()
            },
        );
        let chunks = vec![
            vec![IndexItem::single(0_u32, "zero".to_string())],
            vec![
                IndexItem::single(1, "one".to_string()),
                IndexItem::single(2, "two".to_string()),
                IndexItem::single(3, "three".to_string()),
            ],
        ];

        let err = rebuild(&recorder.scoped(), chunks, id_terms(), None, options(2))
            .await
            .expect_err("both chunks fail");

        let message = err.to_string();
        assert!(matches!(err, IndexerError::Operation(_)), "{message}");
        assert!(message.contains("chunk 0: item 0"), "{message}");
        assert!(!message.contains("chunk 1"), "{message}");

        let calls = recorder.calls();
        assert_eq!(
            recorder.updates(),
            vec![
                ("Id:1".to_string(), "one".to_string()),
                ("Id:2".to_string(), "two".to_string()),
            ]
        );
        assert_eq!(calls.last(), Some(&Call::Release));
        assert_eq!(recorder.count(&Call::Release), 1);
        assert_eq!(recorder.count(&Call::Optimize), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn timed_out_rebuild_holds_the_writer_until_workers_finish() {
        let recorder = Recorder::new(
            "rebuild-timeout",
            Faults {
                update_delay: Some(Duration::from_millis(100)),
                ..Faults::default()
            },
        );
        let scoped = recorder.scoped();
        let chunks = chunk((0..8_u32).map(|i| IndexItem::single(i, i.to_string())), 1)
            .expect("chunker");

        let timed_out = tokio::time::timeout(
            Duration::from_millis(40),
            rebuild(&scoped, chunks, id_terms(), None, options(8)),
        )
        .await;
        assert!(timed_out.is_err(), "rebuild should still be running");

        scoped
            .run_blocking(|writer| writer.commit())
            .await
            .expect("second call once the first writer is released");

        let calls = recorder.calls();
        assert_eq!(recorder.opened(), 2);
        assert_eq!(recorder.updates().len(), 8);
        assert_eq!(recorder.count(&Call::Release), 2);

        let first_release = calls
            .iter()
            .position(|call| *call == Call::Release)
            .expect("first writer released");
        assert_eq!(
            recorder.updates().len(),
            calls[..first_release]
                .iter()
                .filter(|call| matches!(call, Call::Update { .. }))
                .count()
        );
        assert_eq!(
            calls[first_release + 1..].to_vec(),
            vec![Call::Commit, Call::Release]
        );
    }
}
