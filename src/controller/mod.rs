//! Transcode job controller.
//!
//! A [`JobController`] runs at most one job at a time. It resolves the output
//! configuration, starts the [`Engine`], relays engine progress to the
//! observer channel and, on the first terminal event, closes the job's input
//! and returns to idle.
//!
//! All job state lives behind one mutex. Engine calls (start and cancel) are
//! made with the lock released, so an engine may call its listener from any
//! thread, including synchronously from inside `start_transcode`.

mod events;
mod state;

pub use events::{JobEvent, JobEvents, JobObserver, JobReport};
pub use state::{JobHandle, JobSnapshot};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use transcoder_common::{Error, JobId, Outcome, Progress, Result};

use crate::engine::{Engine, EngineListener};
use crate::format::{FormatPolicy, FormatStrategy, TranscodeParams};
use crate::input::{InputHandle, InputResolver};
use state::Job;

/// Runs transcode jobs one at a time.
///
/// Cloning is cheap; clones share the same job slot and event channel.
#[derive(Clone)]
pub struct JobController {
    shared: Arc<Shared>,
}

struct Shared {
    engine: Box<dyn Engine>,
    policy: FormatPolicy,
    slot: Mutex<Option<Job>>,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl JobController {
    /// Create a controller driving `engine`. Notifications are delivered
    /// through the returned [`JobEvents`].
    pub fn new<E: Engine + 'static>(engine: E, policy: FormatPolicy) -> (Self, JobEvents) {
        let (events, receiver) = JobEvents::channel();
        let controller = Self {
            shared: Arc::new(Shared {
                engine: Box::new(engine),
                policy,
                slot: Mutex::new(None),
                events,
            }),
        };
        (controller, receiver)
    }

    /// Submit a job transcoding `input` into `output_path`.
    ///
    /// Returns as soon as the engine has been asked to start. On success the
    /// controller owns `input` and closes it when the job ends; on error the
    /// input is dropped unclosed and no job exists.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `params` carries a malformed bit rate.
    /// - [`Error::AlreadyRunning`] if a job is in progress.
    /// - [`Error::UnsupportedInput`] if the input lacks what the requested
    ///   format needs.
    ///
    /// Engine failures, including a failure to start, are reported as a
    /// [`Outcome::Failed`] event rather than returned here.
    pub fn submit<I: InputHandle + 'static>(
        &self,
        input: I,
        output_path: impl Into<PathBuf>,
        params: &TranscodeParams,
    ) -> Result<JobHandle> {
        let strategy = FormatStrategy::from_params(params, &self.shared.policy)?;
        let output_path = output_path.into();
        let mut input: Box<dyn InputHandle> = Box::new(input);

        let (id, config) = {
            let mut slot = self.shared.slot.lock();
            if slot.is_some() {
                return Err(Error::AlreadyRunning);
            }
            let config = strategy.resolve(input.metadata())?;
            let job = Job::new(output_path.clone(), config.clone());
            let id = job.id;
            *slot = Some(job);
            (id, config)
        };

        info!(
            job_id = %id,
            "Submitting transcode: {}x{} @ {} bps -> {:?}",
            config.video.width, config.video.height, config.video.bit_rate, output_path
        );

        let listener: Arc<dyn EngineListener> = Arc::new(JobListener {
            job_id: id,
            shared: Arc::downgrade(&self.shared),
        });
        let started =
            self.shared
                .engine
                .start_transcode(&*input, &output_path, &config, listener);

        let handle = JobHandle::new(id);
        let mut slot = self.shared.slot.lock();
        let Some(job) = slot.as_mut().filter(|job| job.id == id) else {
            // Only `finish` empties the slot and it never runs while starting
            error!(job_id = %id, "Job vanished while the engine was starting");
            close_input(id, &mut *input);
            return Ok(handle);
        };

        job.input = Some(input);
        job.starting = false;

        let mut cancel_now = None;
        match started {
            Ok(cancel) => {
                if job.cancel_requested && job.pending.is_none() {
                    cancel_now = Some(Arc::clone(&cancel));
                }
                job.cancel = Some(cancel);
            }
            Err(e) => {
                error!(job_id = %id, "Engine failed to start: {}", e);
                if job.pending.is_none() {
                    job.pending = Some(Outcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Some(outcome) = job.pending.take() {
            self.shared.finish(&mut slot, outcome);
        }
        drop(slot);

        if let Some(cancel) = cancel_now {
            debug!(job_id = %id, "Forwarding cancellation requested during start");
            cancel.cancel();
        }

        Ok(handle)
    }

    /// Validate `params`, allocate an output, open `location` and submit.
    ///
    /// Nothing is opened when the parameters are rejected or a job is already
    /// running. An output allocated for a job that is then rejected is
    /// removed again.
    pub fn submit_with<R: InputResolver>(
        &self,
        resolver: &R,
        location: &Path,
        params: &TranscodeParams,
    ) -> Result<JobHandle> {
        FormatStrategy::from_params(params, &self.shared.policy)?;
        if !self.is_idle() {
            return Err(Error::AlreadyRunning);
        }

        let output_path = resolver.allocate_output()?;
        let result = resolver
            .open(location)
            .and_then(|input| self.submit(input, output_path.clone(), params));

        if result.is_err() {
            if let Err(e) = std::fs::remove_file(&output_path) {
                debug!("Failed to remove unused output {:?}: {}", output_path, e);
            }
        }
        result
    }

    /// Request cancellation of `handle`'s job.
    ///
    /// Returns `false`, and does nothing, if that job is no longer running.
    /// Resources are released only once the engine confirms the
    /// cancellation.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        let cancel = {
            let mut slot = self.shared.slot.lock();
            let Some(job) = slot
                .as_mut()
                .filter(|job| job.id == handle.id() && job.is_running())
            else {
                debug!(job_id = %handle.id(), "Cancel ignored, job is not running");
                return false;
            };
            if job.cancel_requested {
                return true;
            }
            job.cancel_requested = true;
            info!(job_id = %job.id, "Cancellation requested");
            job.cancel.clone()
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        true
    }

    /// Snapshot of the active job, if any.
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.shared.slot.lock().as_ref().map(Job::snapshot)
    }

    pub fn is_idle(&self) -> bool {
        self.shared.slot.lock().is_none()
    }
}

impl Shared {
    fn progress(&self, job_id: JobId, raw: f64) {
        let Some(update) = Progress::from_raw(raw) else {
            trace!(job_id = %job_id, "Dropping NaN progress");
            return;
        };

        let mut slot = self.slot.lock();
        let Some(job) = slot
            .as_mut()
            .filter(|job| job.id == job_id && job.is_running())
        else {
            trace!(job_id = %job_id, "Dropping progress for inactive job");
            return;
        };

        if !job.advance(update) {
            trace!(job_id = %job_id, "Dropping regressing progress {}", update);
            return;
        }

        // Sent under the lock so progress can never overtake the terminal event
        let event = JobEvent::Progress {
            job_id,
            progress: update,
        };
        if self.events.send(event).is_err() {
            debug!(job_id = %job_id, "No observer left to receive progress {}", update);
        }
    }

    fn terminal(&self, job_id: JobId, outcome: Outcome) {
        let mut slot = self.slot.lock();
        let Some(job) = slot
            .as_mut()
            .filter(|job| job.id == job_id && job.is_running())
        else {
            debug!(job_id = %job_id, "Dropping duplicate terminal event: {}", outcome);
            return;
        };

        if job.starting {
            job.state = outcome.state();
            job.pending = Some(outcome);
            return;
        }

        self.finish(&mut slot, outcome);
    }

    /// Close the job's input, report `outcome` and free the slot.
    fn finish(&self, slot: &mut Option<Job>, outcome: Outcome) {
        let Some(mut job) = slot.take() else {
            return;
        };
        job.state = outcome.state();

        if let Some(mut input) = job.input.take() {
            close_input(job.id, &mut *input);
        }

        let output_size = if outcome.is_success() {
            std::fs::metadata(&job.output_path).ok().map(|m| m.len())
        } else {
            None
        };
        let elapsed_ms = u64::try_from(job.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome {
            Outcome::Failed { reason } => {
                warn!(job_id = %job.id, "Transcode failed after {} ms: {}", elapsed_ms, reason)
            }
            _ => info!(job_id = %job.id, "Transcode {} after {} ms", outcome, elapsed_ms),
        }

        let event = JobEvent::Finished {
            job_id: job.id,
            report: JobReport {
                outcome,
                elapsed_ms,
                output_path: job.output_path,
                output_size,
            },
        };
        if self.events.send(event).is_err() {
            debug!("No observer left to receive the terminal event");
        }
    }
}

fn close_input(job_id: JobId, input: &mut dyn InputHandle) {
    if let Err(e) = input.close() {
        warn!(job_id = %job_id, "{}", Error::CleanupFailure(e));
    }
}

/// Engine-facing side of one job.
struct JobListener {
    job_id: JobId,
    shared: Weak<Shared>,
}

impl JobListener {
    fn with_shared(&self, f: impl FnOnce(&Shared)) {
        match self.shared.upgrade() {
            Some(shared) => f(&shared),
            None => trace!(job_id = %self.job_id, "Controller dropped, ignoring engine event"),
        }
    }
}

impl EngineListener for JobListener {
    fn on_progress(&self, fraction: f64) {
        self.with_shared(|shared| shared.progress(self.job_id, fraction));
    }

    fn on_completed(&self) {
        self.with_shared(|shared| shared.terminal(self.job_id, Outcome::Success));
    }

    fn on_canceled(&self) {
        self.with_shared(|shared| shared.terminal(self.job_id, Outcome::Canceled));
    }

    fn on_failed(&self, error: Error) {
        self.with_shared(|shared| {
            shared.terminal(
                self.job_id,
                Outcome::Failed {
                    reason: error.to_string(),
                },
            )
        });
    }
}
