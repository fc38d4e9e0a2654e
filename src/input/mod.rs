//! Input resolution.
//!
//! An [`InputHandle`] is an opened, readable source plus the metadata the
//! format selector needs. Once a job is accepted the controller holds the
//! handle exclusively and closes it on the job's terminal event; nothing else
//! may close it while the engine might still be reading.
//!
//! [`InputResolver`] is the capability that turns a caller-selected location
//! into a handle and allocates unique output paths.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use transcoder_common::paths::{allocate_output_path, is_video_file};
use transcoder_common::{Error, InputMetadata, Result};

use crate::config::Config;
use crate::probe;

/// An opened input resource.
pub trait InputHandle: Send {
    /// Metadata describing the input.
    fn metadata(&self) -> &InputMetadata;

    /// Filesystem location, for engines that read by path.
    fn location(&self) -> Option<&Path> {
        None
    }

    /// Release the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: InputHandle + ?Sized> InputHandle for Box<T> {
    fn metadata(&self) -> &InputMetadata {
        (**self).metadata()
    }

    fn location(&self) -> Option<&Path> {
        (**self).location()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Opens inputs and allocates outputs.
pub trait InputResolver {
    type Input: InputHandle + 'static;

    /// Open `location` for reading.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceUnavailable`] if the resource cannot be opened.
    fn open(&self, location: &Path) -> Result<Self::Input>;

    /// Allocate a fresh, unique output path.
    fn allocate_output(&self) -> Result<PathBuf>;
}

/// A local file held open for the duration of a job.
#[derive(Debug)]
pub struct FileInput {
    path: PathBuf,
    file: Option<File>,
    metadata: InputMetadata,
}

impl FileInput {
    /// Open `path` without probing it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::resource_unavailable(path, e.to_string()))?;
        let byte_len = file
            .metadata()
            .map_err(|e| Error::resource_unavailable(path, e.to_string()))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            metadata: InputMetadata {
                byte_len,
                video: None,
            },
        })
    }

    /// Attach probed metadata.
    pub fn with_metadata(mut self, metadata: InputMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

impl InputHandle for FileInput {
    fn metadata(&self) -> &InputMetadata {
        &self.metadata
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        close_file(file)
    }
}

#[cfg(unix)]
fn close_file(file: File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    // Dropping a File swallows close(2) errors; close explicitly to see them.
    nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

/// Resolves local files and allocates outputs under a configured directory.
#[derive(Debug, Clone)]
pub struct FileInputResolver {
    ffprobe: Option<PathBuf>,
    output_dir: PathBuf,
    prefix: String,
    extension: String,
}

impl FileInputResolver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: None,
            output_dir: output_dir.into(),
            prefix: "transcode_".to_string(),
            extension: "mp4".to_string(),
        }
    }

    /// Build a resolver from loaded configuration.
    pub fn from_config(config: &Config, ffprobe: Option<PathBuf>) -> Self {
        Self {
            ffprobe,
            output_dir: config.output.dir.clone(),
            prefix: config.output.prefix.clone(),
            extension: config.output.extension.clone(),
        }
    }

    /// Probe opened inputs with the ffprobe at `path`.
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe = Some(path.into());
        self
    }
}

impl InputResolver for FileInputResolver {
    type Input = FileInput;

    fn open(&self, location: &Path) -> Result<FileInput> {
        let input = FileInput::open(location)?;
        tracing::info!("original size={}", input.metadata().byte_len);
        if !is_video_file(location) {
            tracing::warn!("{:?} does not have a known video extension", location);
        }

        let Some(ref ffprobe) = self.ffprobe else {
            return Ok(input);
        };

        // Probe failures are not fatal here; the preset path does not need
        // metadata and the bit-rate path reports the missing video track.
        match probe::probe_file(ffprobe, location) {
            Ok(probe) => {
                let metadata = InputMetadata {
                    byte_len: input.metadata().byte_len,
                    video: probe.video,
                };
                Ok(input.with_metadata(metadata))
            }
            Err(e) => {
                tracing::warn!("Failed to probe {:?}: {}", location, e);
                Ok(input)
            }
        }
    }

    fn allocate_output(&self) -> Result<PathBuf> {
        allocate_output_path(&self.output_dir, &self.prefix, &self.extension).map_err(|e| {
            tracing::error!("Failed to create output file in {:?}: {}", self.output_dir, e);
            Error::Io(e)
        })
    }
}
