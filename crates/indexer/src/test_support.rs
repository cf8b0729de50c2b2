//! Recording writer used by the unit tests.

use crate::{IndexLocation, IndexerError, Result, ScopedWriter, WriterFactory, WriterHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Update { term: String, document: String },
    Delete(String),
    DeleteAll,
    Commit,
    Optimize,
    Release,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Faults {
    pub open: bool,
    /// Fail `update_document` for any of these exact terms.
    pub update_terms: Vec<String>,
    pub delete_all: bool,
    pub commit: bool,
    pub optimize: bool,
    pub release: bool,
    pub update_delay: Option<Duration>,
}

pub(crate) struct Recorder {
    name: String,
    faults: Faults,
    calls: Mutex<Vec<Call>>,
    opened: AtomicUsize,
    active_updates: AtomicUsize,
    peak_updates: AtomicUsize,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl Recorder {
    pub fn new(name: &str, faults: Faults) -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            name: name.to_string(),
            faults,
            calls: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            active_updates: AtomicUsize::new(0),
            peak_updates: AtomicUsize::new(0),
        })
    }

    pub fn factory(self: &Arc<Self>) -> RecordingFactory {
        RecordingFactory {
            recorder: Arc::clone(self),
        }
    }

    pub fn scoped(self: &Arc<Self>) -> ScopedWriter<RecordingFactory> {
        ScopedWriter::new(self.factory())
    }

    pub fn writer(self: &Arc<Self>) -> RecordingWriter {
        self.opened.fetch_add(1, Ordering::SeqCst);
        RecordingWriter {
            recorder: Arc::clone(self),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn updates(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update { term, document } => Some((term, document)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_updates(&self) -> usize {
        self.peak_updates.load(Ordering::SeqCst)
    }

    fn location(&self) -> IndexLocation {
        IndexLocation::in_memory(self.name.clone())
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

pub(crate) struct RecordingFactory {
    recorder: Arc<Recorder>,
}

impl WriterFactory for RecordingFactory {
    type Writer = RecordingWriter;

    fn location(&self) -> IndexLocation {
        self.recorder.location()
    }

    fn open(&self) -> Result<RecordingWriter> {
        if self.recorder.faults.open {
            return Err(IndexerError::engine("cannot open writer: lock held"));
        }
        Ok(self.recorder.writer())
    }
}

pub(crate) struct RecordingWriter {
    recorder: Arc<Recorder>,
}

impl WriterHandle for RecordingWriter {
    type Term = String;
    type Document = String;

    fn location(&self) -> IndexLocation {
        self.recorder.location()
    }

    fn update_document(&self, term: String, document: String) -> Result<()> {
        let recorder = &self.recorder;
        let active = recorder.active_updates.fetch_add(1, Ordering::SeqCst) + 1;
        recorder.peak_updates.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = recorder.faults.update_delay {
            std::thread::sleep(delay);
        }
        recorder.active_updates.fetch_sub(1, Ordering::SeqCst);

        if recorder.faults.update_terms.contains(&term) {
            return Err(IndexerError::engine(format!("update rejected for {term}")));
        }
        recorder.record(Call::Update { term, document });
        Ok(())
    }

    fn delete_documents(&self, term: String) -> Result<()> {
        self.recorder.record(Call::Delete(term));
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.recorder.record(Call::DeleteAll);
        if self.recorder.faults.delete_all {
            return Err(IndexerError::engine("delete all rejected"));
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.recorder.record(Call::Commit);
        if self.recorder.faults.commit {
            return Err(IndexerError::engine("commit rejected"));
        }
        Ok(())
    }

    fn optimize(&self) -> Result<()> {
        self.recorder.record(Call::Optimize);
        if self.recorder.faults.optimize {
            return Err(IndexerError::engine("merge failed"));
        }
        Ok(())
    }

    fn release(self) -> Result<()> {
        self.recorder.record(Call::Release);
        if self.recorder.faults.release {
            return Err(IndexerError::engine("close failed"));
        }
        Ok(())
    }
}
