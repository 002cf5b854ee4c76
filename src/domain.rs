use crate::error::HashError;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Length of the rendered hex digest.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One regular file found by the walker, waiting to be hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    path: PathBuf,
}

impl FileTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[derive(Debug)]
pub struct ChecksumResult {
    pub task: FileTask,
    pub outcome: Result<String, HashError>,
}

impl ChecksumResult {
    pub fn new(task: FileTask, outcome: Result<String, HashError>) -> Self {
        Self { task, outcome }
    }

    /// The `path: digest` line on success, the failure otherwise.
    pub fn report(&self) -> Result<String, &HashError> {
        self.outcome
            .as_ref()
            .map(|digest| format!("{}: {}", self.task.path().display(), digest))
    }
}

/// How many hashing tasks may run at once.
///
/// `Unbounded` starts one thread per discovered file and is the default. Very
/// large trees can exhaust threads or file descriptors in that mode; `Bounded`
/// runs the same tasks on a fixed pool instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    Unbounded,
    Bounded(NonZeroUsize),
}

impl Concurrency {
    pub fn from_jobs(jobs: Option<NonZeroUsize>) -> Self {
        match jobs {
            Some(workers) => Concurrency::Bounded(workers),
            None => Concurrency::Unbounded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChecksumConfig {
    pub root: PathBuf,
    pub algorithm: HashAlgorithm,
    pub concurrency: Concurrency,
    pub follow_symlinks: bool,
    pub chunk_size: usize,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            algorithm: HashAlgorithm::Sha256,
            concurrency: Concurrency::Unbounded,
            follow_symlinks: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChecksumConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub hashed: usize,
    pub failed: usize,
    pub traversal_errors: usize,
}

impl RunSummary {
    pub fn reported(&self) -> usize {
        self.hashed + self.failed
    }

    /// Every discovered file produced exactly one result.
    pub fn is_complete(&self) -> bool {
        self.discovered == self.reported()
    }
}
