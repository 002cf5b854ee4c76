use crate::domain::{FileTask, HashAlgorithm, WalkStats};
use crate::error::HashError;
use std::fmt;
use std::path::Path;

/// Sink for diagnostics that are only shown in verbose mode.
pub trait LoggingPort {
    fn debug(&self, message: fmt::Arguments<'_>);
}

pub trait FileSystemPort {
    /// Walks `root` and hands every regular file to `emit`.
    ///
    /// Per-entry errors are reported through `logger` and the walk carries on.
    /// `emit` returns `false` once nobody is listening, which ends the walk.
    fn walk(
        &self,
        root: &Path,
        logger: &dyn LoggingPort,
        emit: &mut dyn FnMut(FileTask) -> bool,
    ) -> WalkStats;
}

pub trait HashingPort {
    fn hash_file(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, HashError>;
}
