//! Shared test fixtures: a scriptable engine, inputs that count closes and an
//! observer that records everything it is told.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use transcoder::controller::{JobController, JobEvents, JobObserver, JobReport};
use transcoder::engine::{CancelHandle, Engine, EngineListener};
use transcoder::format::FormatPolicy;
use transcoder::input::{InputHandle, InputResolver};
use transcoder_common::{
    Error, InputMetadata, JobId, Outcome, OutputConfig, Progress, Result, VideoMetadata,
};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One `start_transcode` call seen by [`MockEngine`].
pub struct StartedJob {
    pub listener: Arc<dyn EngineListener>,
    pub output_path: PathBuf,
    pub config: OutputConfig,
    pub input_location: Option<PathBuf>,
}

#[derive(Default)]
struct MockEngineState {
    started: Mutex<Vec<StartedJob>>,
    cancels: AtomicUsize,
    fail_start: AtomicBool,
}

/// Engine that does nothing on its own; tests drive its listeners by hand.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<MockEngineState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next starts fail synchronously.
    pub fn fail_start(&self) {
        self.state.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn start_count(&self) -> usize {
        self.state.started.lock().len()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.cancels.load(Ordering::SeqCst)
    }

    /// Listener handed over by the most recent start.
    pub fn listener(&self) -> Arc<dyn EngineListener> {
        let started = self.state.started.lock();
        Arc::clone(&started.last().expect("engine was never started").listener)
    }

    pub fn last_config(&self) -> OutputConfig {
        let started = self.state.started.lock();
        started.last().expect("engine was never started").config.clone()
    }

    pub fn last_output_path(&self) -> PathBuf {
        let started = self.state.started.lock();
        started
            .last()
            .expect("engine was never started")
            .output_path
            .clone()
    }

    pub fn last_input_location(&self) -> Option<PathBuf> {
        let started = self.state.started.lock();
        started
            .last()
            .expect("engine was never started")
            .input_location
            .clone()
    }
}

struct MockCancel {
    state: Arc<MockEngineState>,
}

impl CancelHandle for MockCancel {
    fn cancel(&self) {
        self.state.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

impl Engine for MockEngine {
    fn start_transcode(
        &self,
        input: &dyn InputHandle,
        output_path: &Path,
        config: &OutputConfig,
        listener: Arc<dyn EngineListener>,
    ) -> Result<Arc<dyn CancelHandle>> {
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(Error::engine("mock engine refused to start"));
        }

        self.state.started.lock().push(StartedJob {
            listener,
            output_path: output_path.to_path_buf(),
            config: config.clone(),
            input_location: input.location().map(Path::to_path_buf),
        });

        Ok(Arc::new(MockCancel {
            state: Arc::clone(&self.state),
        }))
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input whose closes are counted through a shared counter.
pub struct RecordingInput {
    metadata: InputMetadata,
    location: Option<PathBuf>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl RecordingInput {
    pub fn new(metadata: InputMetadata) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let input = Self {
            metadata,
            location: None,
            closes: Arc::clone(&closes),
            fail_close: false,
        };
        (input, closes)
    }

    /// A 1920x1080 30 fps input.
    pub fn hd() -> (Self, Arc<AtomicUsize>) {
        Self::new(hd_metadata())
    }

    /// Make `close` report an error (it is still counted).
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn at(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl InputHandle for RecordingInput {
    fn metadata(&self) -> &InputMetadata {
        &self.metadata
    }

    fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::Other, "close failed"))
        } else {
            Ok(())
        }
    }
}

pub fn hd_metadata() -> InputMetadata {
    InputMetadata {
        byte_len: 48_000_000,
        video: Some(VideoMetadata {
            width: 1920,
            height: 1080,
            frame_rate: Some(30.0),
            duration_secs: Some(60.0),
        }),
    }
}

/// Resolver that records how often it opened and allocated.
pub struct RecordingResolver {
    pub dir: TempDir,
    pub opens: AtomicUsize,
    pub allocations: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub metadata: InputMetadata,
}

impl RecordingResolver {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            opens: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            metadata: hd_metadata(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl InputResolver for RecordingResolver {
    type Input = RecordingInput;

    fn open(&self, location: &Path) -> Result<RecordingInput> {
        if !location.exists() {
            return Err(Error::resource_unavailable(location, "no such file"));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingInput {
            metadata: self.metadata.clone(),
            location: Some(location.to_path_buf()),
            closes: Arc::clone(&self.closes),
            fail_close: false,
        })
    }

    fn allocate_output(&self) -> Result<PathBuf> {
        let n = self.allocations.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.path().join(format!("transcode_{n}.mp4"));
        std::fs::write(&path, b"")?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Progress(Progress),
    Finished(JobReport),
}

/// Observer that records every notification in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub seen: Vec<(JobId, Seen)>,
}

impl RecordingObserver {
    pub fn progress(&self) -> Vec<Progress> {
        self.seen
            .iter()
            .filter_map(|(_, s)| match s {
                Seen::Progress(p) => Some(*p),
                Seen::Finished(_) => None,
            })
            .collect()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.seen
            .iter()
            .filter_map(|(_, s)| match s {
                Seen::Finished(report) => Some(report.outcome.clone()),
                Seen::Progress(_) => None,
            })
            .collect()
    }
}

impl JobObserver for RecordingObserver {
    fn on_progress(&mut self, job_id: JobId, progress: Progress) {
        self.seen.push((job_id, Seen::Progress(progress)));
    }

    fn on_finished(&mut self, job_id: JobId, report: &JobReport) {
        self.seen.push((job_id, Seen::Finished(report.clone())));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Controller wired to a [`MockEngine`].
pub fn controller() -> (JobController, JobEvents, MockEngine) {
    controller_with_policy(FormatPolicy::default())
}

pub fn controller_with_policy(policy: FormatPolicy) -> (JobController, JobEvents, MockEngine) {
    let engine = MockEngine::new();
    let (controller, events) = JobController::new(engine.clone(), policy);
    (controller, events, engine)
}

/// Drain everything queued so far into a fresh observer.
pub fn drain(events: &mut JobEvents) -> RecordingObserver {
    let mut observer = RecordingObserver::default();
    events.drain_into(&mut observer);
    observer
}
