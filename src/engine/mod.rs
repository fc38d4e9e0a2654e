//! Engine boundary.
//!
//! The engine does the actual decode/encode/mux work on its own execution
//! context. The controller starts it through [`Engine::start_transcode`],
//! hears back through an [`EngineListener`] and asks it to stop through the
//! returned [`CancelHandle`].
//!
//! Engines must call exactly one of `on_completed`, `on_canceled` or
//! `on_failed` per job. The controller tolerates engines that misbehave
//! (duplicate or late events are dropped), but observers only ever see one
//! terminal event.

mod ffmpeg;
mod progress;

pub use ffmpeg::FfmpegEngine;
pub use progress::ProgressParser;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use transcoder_common::{Error, OutputConfig, Result};

use crate::input::InputHandle;

/// Receives events from a running engine job.
///
/// Callbacks may arrive on any thread.
pub trait EngineListener: Send + Sync {
    /// Progress update. Negative values mean the fraction is unknown.
    fn on_progress(&self, fraction: f64);

    /// The output was written successfully.
    fn on_completed(&self);

    /// The job stopped because cancellation was requested.
    fn on_canceled(&self);

    /// The job failed.
    fn on_failed(&self, error: Error);
}

/// Requests cooperative cancellation of an engine job.
pub trait CancelHandle: Send + Sync {
    fn cancel(&self);
}

impl CancelHandle for CancellationToken {
    fn cancel(&self) {
        CancellationToken::cancel(self);
    }
}

/// A transcoding engine.
pub trait Engine: Send + Sync {
    /// Start transcoding `input` into `output_path` with `config`.
    ///
    /// Must return promptly; the work itself runs asynchronously and reports
    /// through `listener`. An `Err` means nothing was started and no listener
    /// callback will follow.
    fn start_transcode(
        &self,
        input: &dyn InputHandle,
        output_path: &Path,
        config: &OutputConfig,
        listener: Arc<dyn EngineListener>,
    ) -> Result<Arc<dyn CancelHandle>>;
}

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn start_transcode(
        &self,
        input: &dyn InputHandle,
        output_path: &Path,
        config: &OutputConfig,
        listener: Arc<dyn EngineListener>,
    ) -> Result<Arc<dyn CancelHandle>> {
        (**self).start_transcode(input, output_path, config, listener)
    }
}
