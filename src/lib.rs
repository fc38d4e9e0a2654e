//! Transcoder - single-job video transcode controller
//!
//! This library crate exposes the controller, the output format selector and
//! the ffmpeg-backed engine used by the `transcoder` binary.

pub mod config;
pub mod controller;
pub mod engine;
pub mod format;
pub mod input;
pub mod probe;
pub mod tools;

pub use controller::{JobController, JobEvent, JobEvents, JobHandle, JobObserver, JobReport};
pub use format::{FormatPolicy, FormatPreset, FormatStrategy, TranscodeParams};
