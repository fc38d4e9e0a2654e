//! Path utilities for inputs and outputs.
//!
//! Inputs are recognised by extension; outputs are allocated as uniquely named
//! files under a designated output directory so concurrent or repeated jobs
//! never collide.

use std::io;
use std::path::{Path, PathBuf};

/// List of recognised video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv", "3gp",
];

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use transcoder_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.mp4")));
/// assert!(is_video_file(Path::new("/sdcard/DCIM/VID_0001.3GP")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Allocate a unique, empty output file under `dir`.
///
/// The directory is created if needed. The file name is `prefix`, a random
/// suffix, then `.extension`. The file is left on disk so the name stays
/// reserved until the engine overwrites it.
///
/// # Examples
///
/// ```
/// use transcoder_common::paths::allocate_output_path;
///
/// let dir = tempfile::tempdir().unwrap();
/// let a = allocate_output_path(dir.path(), "transcode_", "mp4").unwrap();
/// let b = allocate_output_path(dir.path(), "transcode_", "mp4").unwrap();
/// assert_ne!(a, b);
/// assert!(a.exists());
/// ```
pub fn allocate_output_path(dir: &Path, prefix: &str, extension: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&suffix)
        .tempfile_in(dir)?;

    let (_file, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
