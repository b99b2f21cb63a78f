//! Where finished thumbnails go.
//!
//! The resize pipeline hands back an in-memory [`ImageBuffer`]; persisting it
//! is the caller's business. [`ResultSink`] is that seam: the CLI writes PNGs
//! into a directory with [`DirectorySink`], tests record writes in memory.
//!
//! `DirectorySink` never overwrites. Names are resolved through
//! [`naming::unique_output_path`](crate::naming::unique_output_path), so
//! saving `avatar_1` twice yields `avatar_1.png` and `avatar_1_1.png`.

use crate::imaging::{BufferError, ImageBuffer};
use crate::naming::unique_output_path;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] BufferError),
}

/// Persist a finished thumbnail under a base name.
pub trait ResultSink: Send + Sync {
    /// Store `image` as `name`, returning where it ended up.
    fn write(&self, name: &str, image: &ImageBuffer) -> Result<PathBuf, SinkError>;
}

/// Writes PNG files into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Target `dir`, creating it (and parents) if missing.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultSink for DirectorySink {
    fn write(&self, name: &str, image: &ImageBuffer) -> Result<PathBuf, SinkError> {
        let bytes = image.to_png()?;
        // create_new: a concurrent writer may claim the same free name first.
        loop {
            let path = unique_output_path(&self.dir, name, "png");
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&bytes)?;
                    debug!(path = %path.display(), "thumbnail written");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
