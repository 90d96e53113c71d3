//! Error types shared across the alignment driver

use std::path::{Path, PathBuf};

/// Errors surfaced to the caller of the library.
///
/// Failures of individual partitions are not represented here: a partition
/// that cannot be aligned reports an empty result instead of an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    #[error("no read files found under {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("incomplete record {record_index}: only {lines_present} of 4 lines present")]
    IncompleteRecord { record_index: u64, lines_present: usize },

    #[error("line {0} appears more than once in the input stream")]
    DuplicateLine(u64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("could not serialize run report: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AlignError>;

impl AlignError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AlignError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
