use crate::domain::{FileTask, WalkStats};
use crate::ports::{FileSystemPort, LoggingPort};
use ignore::WalkBuilder;
use std::path::Path;
use tracing::{debug, trace};

/// Recursive walker over the local filesystem.
///
/// Symlinks are skipped unless `follow_symlinks` is set. When they are
/// followed, a link to a file is emitted like a file, a link to a directory is
/// descended into, and link loops surface as traversal errors.
pub struct FileSystemAdapter {
    follow_symlinks: bool,
}

impl FileSystemAdapter {
    pub fn new() -> Self {
        Self {
            follow_symlinks: false,
        }
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

impl Default for FileSystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemPort for FileSystemAdapter {
    fn walk(
        &self,
        root: &Path,
        logger: &dyn LoggingPort,
        emit: &mut dyn FnMut(FileTask) -> bool,
    ) -> WalkStats {
        let mut builder = WalkBuilder::new(root);
        // Every regular file counts, including hidden and git-ignored ones.
        builder.standard_filters(false);
        builder.follow_links(self.follow_symlinks);

        let mut stats = WalkStats::default();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    stats.errors += 1;
                    logger.debug(format_args!("Traversal error: {err}"));
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
                continue;
            }

            trace!(path = %entry.path().display(), "found file");
            stats.files += 1;
            if !emit(FileTask::new(entry.into_path())) {
                debug!("task receiver closed, stopping walk");
                break;
            }
        }

        stats
    }
}
