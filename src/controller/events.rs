//! Observer transport.
//!
//! The controller never calls observers directly. Engine callbacks arrive on
//! engine threads, so every notification is queued on an unbounded channel
//! and delivered wherever the receiving [`JobEvents`] is drained.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;
use transcoder_common::{JobId, Outcome, Progress};

/// Terminal summary of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Wall time from acceptance to the terminal event.
    pub elapsed_ms: u64,
    pub output_path: PathBuf,
    /// Size of the written output; only known on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
}

/// A notification for the observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress { job_id: JobId, progress: Progress },
    Finished { job_id: JobId, report: JobReport },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }

    /// Hand this event to `observer`.
    pub fn deliver_to<O: JobObserver + ?Sized>(&self, observer: &mut O) {
        match self {
            Self::Progress { job_id, progress } => observer.on_progress(*job_id, *progress),
            Self::Finished { job_id, report } => observer.on_finished(*job_id, report),
        }
    }
}

/// Receives job notifications.
pub trait JobObserver {
    fn on_progress(&mut self, job_id: JobId, progress: Progress);

    /// Called exactly once per accepted job, after its input was released.
    fn on_finished(&mut self, job_id: JobId, report: &JobReport);
}

/// Receiving end of a controller's notifications.
#[derive(Debug)]
pub struct JobEvents {
    rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobEvents {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<JobEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next event. Returns `None` once every controller clone
    /// has been dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }

    /// Deliver everything already queued to `observer`. Returns the number of
    /// events delivered.
    pub fn drain_into<O: JobObserver + ?Sized>(&mut self, observer: &mut O) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.try_recv() {
            event.deliver_to(observer);
            delivered += 1;
        }
        delivered
    }

    /// Deliver events to `observer` until job `job_id` finishes, and return
    /// its report. Events for other jobs are delivered too.
    pub async fn follow<O: JobObserver + ?Sized>(
        &mut self,
        job_id: JobId,
        observer: &mut O,
    ) -> Option<JobReport> {
        while let Some(event) = self.recv().await {
            event.deliver_to(observer);
            if let JobEvent::Finished { job_id: id, report } = event {
                if id == job_id {
                    return Some(report);
                }
            }
        }
        None
    }
}
