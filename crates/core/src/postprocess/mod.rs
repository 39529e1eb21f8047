//! Post-processing: moving completed downloads into the library.

mod actions;
mod placer;
mod processor;

pub use actions::{PostProcessItem, PostProcessScheduler};
pub use placer::{place_file, remove_empty_dirs};
pub use processor::PostProcessor;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::library::LibraryError;
use crate::quality::Quality;

#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to place {path}: {source}")]
    Placement {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("library error: {0}")]
    Library(#[from] LibraryError),
}

impl PostProcessError {
    pub(crate) fn placement(path: &Path, source: std::io::Error) -> Self {
        PostProcessError::Placement {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A video file placed into the library.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub show_id: i64,
    pub show_name: String,
    pub season: u32,
    pub episodes: Vec<u32>,
    pub quality: Quality,
    /// Subtitles and other files that travelled with the video.
    pub associated: Vec<PathBuf>,
}

/// A file that was not placed, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostProcessReport {
    pub processed: Vec<ProcessedFile>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<SkippedFile>,
}

impl PostProcessReport {
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}
