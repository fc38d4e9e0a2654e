//! Transcoder-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across transcoder:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for transcode jobs
//! - **Core Types**: Input metadata, output configurations, progress and outcomes
//! - **Path Utilities**: Video extension checks and unique output allocation
//! - **Error Handling**: The controller's error taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use transcoder_common::{Error, JobId, Progress, Result};
//! use transcoder_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let job_id = JobId::new();
//! assert_eq!(Progress::from_raw(-1.0), Some(Progress::Indeterminate));
//! assert!(is_video_file(Path::new("clip.mp4")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::invalid_parameter("bitrate must be a positive integer"))
//! }
//! # let _ = job_id;
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
