use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to hash a single file. Contained within that file's hashing task.
#[derive(Error, Debug)]
pub enum HashError {
    #[error("error while opening file {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error while reading file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    pub fn path(&self) -> &Path {
        match self {
            HashError::Open { path, .. } | HashError::Read { path, .. } => path,
        }
    }
}

/// Conditions that abort a whole run. Everything else is reported per file.
#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("failed to start walker thread")]
    Spawn(#[source] io::Error),

    #[error("walker thread panicked")]
    WalkerPanicked,

    #[error("failed to build hashing thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("run finished with {reported} of {discovered} discovered files reported")]
    Incomplete { discovered: usize, reported: usize },
}

pub type Result<T> = std::result::Result<T, ChecksumError>;
