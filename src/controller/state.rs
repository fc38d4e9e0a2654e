use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use transcoder_common::{JobId, JobState, Outcome, OutputConfig, Progress};

use crate::engine::CancelHandle;
use crate::input::InputHandle;

/// Handle to an accepted job, used for cancellation and to match events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    id: JobId,
}

impl JobHandle {
    pub(crate) fn new(id: JobId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> JobId {
        self.id
    }
}

/// Point-in-time view of the active job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: Progress,
    pub output_path: PathBuf,
    pub config: OutputConfig,
    pub started_at: DateTime<Utc>,
    pub cancel_requested: bool,
}

/// The job occupying the controller.
pub(crate) struct Job {
    pub id: JobId,
    /// `None` only while the engine is being started.
    pub input: Option<Box<dyn InputHandle>>,
    pub output_path: PathBuf,
    pub config: OutputConfig,
    pub state: JobState,
    pub progress: Progress,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    pub cancel: Option<Arc<dyn CancelHandle>>,
    pub cancel_requested: bool,
    /// Set while `start_transcode` is still running.
    pub starting: bool,
    /// A terminal event that arrived while starting.
    pub pending: Option<Outcome>,
}

impl Job {
    pub fn new(output_path: PathBuf, config: OutputConfig) -> Self {
        Self {
            id: JobId::new(),
            input: None,
            output_path,
            config,
            state: JobState::Running,
            progress: Progress::Indeterminate,
            started: Instant::now(),
            started_at: Utc::now(),
            cancel: None,
            cancel_requested: false,
            starting: true,
            pending: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Accept `update` unless it would move progress backwards.
    pub fn advance(&mut self, update: Progress) -> bool {
        let accept = match (self.progress.fraction(), update.fraction()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(current), Some(next)) => next >= current,
        };
        if accept {
            self.progress = update;
        }
        accept
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            state: self.state,
            progress: self.progress,
            output_path: self.output_path.clone(),
            config: self.config.clone(),
            started_at: self.started_at,
            cancel_requested: self.cancel_requested,
        }
    }
}
