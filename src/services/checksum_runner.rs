//! The hashing pipeline.
//!
//! ```text
//! walker thread ──(rendezvous channel)──> controller ──spawn──> hash task per file
//!       │                                     │                        │
//!       └──────────── WaitGroup clone ────────┴──── WaitGroup clone ───┘
//! ```
//!
//! The walker blocks on every send until the controller takes the task, so
//! discovery never runs ahead of dispatch. Each hashing task holds its own
//! `WaitGroup` handle, created at spawn time, which lets the wait-set grow
//! while the walk is still in progress.

use crate::adapters::LineLogger;
use crate::domain::{ChecksumConfig, ChecksumResult, Concurrency, FileTask, HashAlgorithm, RunSummary};
use crate::error::{ChecksumError, Result};
use crate::ports::{FileSystemPort, HashingPort};
use crossbeam::channel::bounded;
use crossbeam::sync::WaitGroup;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error, trace, warn};

const HASH_THREAD_STACK_SIZE: usize = 256 * 1024;

#[derive(Default)]
struct Counters {
    discovered: AtomicUsize,
    hashed: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self, traversal_errors: usize) -> RunSummary {
        RunSummary {
            discovered: self.discovered.load(Ordering::SeqCst),
            hashed: self.hashed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            traversal_errors,
        }
    }
}

/// Where hashing tasks run.
enum Executor {
    /// One thread per file. `fallback` takes the jobs whose thread could not
    /// be spawned.
    Unbounded { fallback: rayon::ThreadPool },
    /// At most `num_threads` files at once.
    Pool(rayon::ThreadPool),
}

impl Executor {
    fn for_concurrency(concurrency: Concurrency) -> Result<Self> {
        match concurrency {
            Concurrency::Unbounded => Ok(Executor::Unbounded {
                fallback: hashing_pool(None, "checksum-fallback")?,
            }),
            Concurrency::Bounded(workers) => Ok(Executor::Pool(hashing_pool(Some(workers.get()), "checksum-worker")?)),
        }
    }

    /// Starts one job. `make_job` may be called twice if a dedicated thread
    /// cannot be spawned; the first job is dropped unrun in that case.
    fn spawn<M, J>(&self, make_job: M)
    where
        M: Fn() -> J,
        J: FnOnce() + Send + 'static,
    {
        match self {
            Executor::Unbounded { fallback } => {
                let spawned = thread::Builder::new()
                    .name("checksum-hash".to_string())
                    .stack_size(HASH_THREAD_STACK_SIZE)
                    .spawn(make_job());
                if let Err(err) = spawned {
                    warn!(error = %err, "cannot spawn hashing thread, using the fallback pool");
                    fallback.spawn(make_job());
                }
            }
            Executor::Pool(pool) => pool.spawn(make_job()),
        }
    }
}

/// A rayon pool whose panicking jobs are logged instead of aborting the
/// process. `None` lets rayon pick the thread count.
fn hashing_pool(workers: Option<usize>, name: &'static str) -> Result<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or(0))
        .thread_name(move |index| format!("{name}-{index}"))
        .panic_handler(|_| error!("hashing task panicked"))
        .build()?;
    Ok(pool)
}

struct HashJob<H> {
    task: FileTask,
    algorithm: HashAlgorithm,
    hasher: Arc<H>,
    logger: Arc<LineLogger>,
    counters: Arc<Counters>,
    _done: WaitGroup,
}

impl<H: HashingPort> HashJob<H> {
    fn run(self) {
        self.logger.debug(format_args!(
            "Computing {} checksum for file: {}",
            self.algorithm.display_name(),
            self.task.path().display()
        ));
        let outcome = self.hasher.hash_file(self.task.path(), self.algorithm);
        let result = ChecksumResult::new(self.task, outcome);

        match result.report() {
            Ok(line) => {
                self.logger.info(line);
                self.counters.hashed.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                self.logger.debug(format_args!("Checksum error: {err}"));
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

pub struct ChecksumService<F, H> {
    filesystem: Arc<F>,
    hasher: Arc<H>,
    logger: Arc<LineLogger>,
}

impl<F, H> ChecksumService<F, H>
where
    F: FileSystemPort + Send + Sync + 'static,
    H: HashingPort + Send + Sync + 'static,
{
    pub fn new(filesystem: F, hasher: H, logger: Arc<LineLogger>) -> Self {
        Self {
            filesystem: Arc::new(filesystem),
            hasher: Arc::new(hasher),
            logger,
        }
    }

    /// Hashes every regular file under `config.root` and returns once each of
    /// them has been reported. Per-file failures do not make this fail.
    pub fn run(&self, config: &ChecksumConfig) -> Result<RunSummary> {
        let executor = Executor::for_concurrency(config.concurrency)?;
        let counters = Arc::new(Counters::default());
        let barrier = WaitGroup::new();
        let (task_tx, task_rx) = bounded::<FileTask>(0);

        self.logger.debug(format_args!(
            "Looking for files in root directory: {}",
            config.root.display()
        ));

        let walker = {
            let filesystem = Arc::clone(&self.filesystem);
            let logger = Arc::clone(&self.logger);
            let root = config.root.clone();
            let done = barrier.clone();
            thread::Builder::new()
                .name("checksum-walker".to_string())
                .spawn(move || {
                    let stats = filesystem.walk(&root, &*logger, &mut |task: FileTask| task_tx.send(task).is_ok());
                    // Closing the channel ends the dispatch loop.
                    drop(task_tx);
                    drop(done);
                    stats
                })
                .map_err(ChecksumError::Spawn)?
        };

        for task in task_rx.iter() {
            counters.discovered.fetch_add(1, Ordering::SeqCst);
            trace!(path = %task.path().display(), "dispatching");
            self.dispatch(&executor, task, config.algorithm, &counters, &barrier);
        }

        barrier.wait();
        let walk_stats = walker.join().map_err(|_| ChecksumError::WalkerPanicked)?;
        let summary = counters.snapshot(walk_stats.errors);

        debug!(
            algorithm = config.algorithm.as_str(),
            discovered = summary.discovered,
            hashed = summary.hashed,
            failed = summary.failed,
            traversal_errors = summary.traversal_errors,
            "run finished"
        );

        if walk_stats.files != summary.discovered || !summary.is_complete() {
            return Err(ChecksumError::Incomplete {
                discovered: walk_stats.files,
                reported: summary.reported(),
            });
        }
        Ok(summary)
    }

    fn dispatch(
        &self,
        executor: &Executor,
        task: FileTask,
        algorithm: HashAlgorithm,
        counters: &Arc<Counters>,
        barrier: &WaitGroup,
    ) {
        executor.spawn(|| {
            let job = HashJob {
                task: task.clone(),
                algorithm,
                hasher: Arc::clone(&self.hasher),
                logger: Arc::clone(&self.logger),
                counters: Arc::clone(counters),
                _done: barrier.clone(),
            };
            move || job.run()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::logger::{capture_logger, CaptureBuffer};
    use crate::adapters::{FileSystemAdapter, MultiAlgorithmHasher};
    use crate::domain::WalkStats;
    use crate::error::HashError;
    use crate::ports::LoggingPort;
    use std::collections::HashSet;
    use std::fs;
    use std::io;
    use std::num::NonZeroUsize;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// Emits a fixed list of paths without touching the filesystem.
    struct StaticWalker(Vec<PathBuf>);

    impl FileSystemPort for StaticWalker {
        fn walk(&self, _root: &Path, _logger: &dyn LoggingPort, emit: &mut dyn FnMut(FileTask) -> bool) -> WalkStats {
            let mut stats = WalkStats::default();
            for path in &self.0 {
                stats.files += 1;
                if !emit(FileTask::new(path.clone())) {
                    break;
                }
            }
            stats
        }
    }

    struct PanickingWalker;

    impl FileSystemPort for PanickingWalker {
        fn walk(&self, _root: &Path, _logger: &dyn LoggingPort, _emit: &mut dyn FnMut(FileTask) -> bool) -> WalkStats {
            panic!("walker blew up");
        }
    }

    /// Returns the file name as its digest.
    struct NameHasher;

    impl HashingPort for NameHasher {
        fn hash_file(&self, path: &Path, _algorithm: HashAlgorithm) -> std::result::Result<String, HashError> {
            Ok(path.file_name().unwrap().to_string_lossy().into_owned())
        }
    }

    struct PanickingHasher;

    impl HashingPort for PanickingHasher {
        fn hash_file(&self, path: &Path, _algorithm: HashAlgorithm) -> std::result::Result<String, HashError> {
            if path.ends_with("boom") {
                panic!("hasher blew up");
            }
            Err(HashError::Read {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, "unreadable"),
            })
        }
    }

    fn pool_of(workers: usize) -> Concurrency {
        Concurrency::Bounded(NonZeroUsize::new(workers).unwrap())
    }

    fn build_service<F, H>(filesystem: F, hasher: H, verbose: bool) -> (ChecksumService<F, H>, CaptureBuffer, CaptureBuffer)
    where
        F: FileSystemPort + Send + Sync + 'static,
        H: HashingPort + Send + Sync + 'static,
    {
        let (logger, normal, debug) = capture_logger(verbose);
        (ChecksumService::new(filesystem, hasher, Arc::new(logger)), normal, debug)
    }

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn hashes_hello_with_md5() {
        let tmp = tempdir().unwrap();
        write(&tmp.path().join("a.txt"), b"hello");
        let (service, normal, _) = build_service(FileSystemAdapter::new(), MultiAlgorithmHasher::new(), false);

        let config = ChecksumConfig::new().with_root(tmp.path()).with_algorithm(HashAlgorithm::Md5);
        let summary = service.run(&config).unwrap();

        assert_eq!(summary.hashed, 1);
        assert_eq!(
            normal.lines(),
            vec![format!("{}: 5d41402abc4b2a76b9719d911017c592", tmp.path().join("a.txt").display())]
        );
    }

    #[test]
    fn empty_directory_produces_nothing() {
        let tmp = tempdir().unwrap();
        for concurrency in [Concurrency::Unbounded, pool_of(2)] {
            let (service, normal, _) = build_service(FileSystemAdapter::new(), MultiAlgorithmHasher::new(), true);
            let config = ChecksumConfig::new().with_root(tmp.path()).with_concurrency(concurrency);

            let summary = service.run(&config).unwrap();
            assert_eq!(summary, RunSummary::default());
            assert_eq!(normal.contents(), "");
        }
    }

    #[test]
    fn one_line_per_readable_file() {
        let tmp = tempdir().unwrap();
        let mut expected = HashSet::new();
        for i in 0..50 {
            let path = tmp.path().join(format!("d{}/f{i}.bin", i % 7));
            write(&path, format!("content {i}").as_bytes());
            expected.insert(path);
        }

        for concurrency in [Concurrency::Unbounded, pool_of(3)] {
            let (service, normal, _) = build_service(FileSystemAdapter::new(), MultiAlgorithmHasher::new(), false);
            let config = ChecksumConfig::new()
                .with_root(tmp.path())
                .with_algorithm(HashAlgorithm::Sha256)
                .with_concurrency(concurrency);
            let summary = service.run(&config).unwrap();

            let lines = normal.lines();
            assert_eq!(lines.len(), 50);
            assert_eq!(summary.discovered, 50);
            let reported: HashSet<PathBuf> = lines
                .iter()
                .map(|line| {
                    let (path, digest) = line.rsplit_once(": ").unwrap();
                    assert_eq!(digest.len(), 64);
                    PathBuf::from(path)
                })
                .collect();
            assert_eq!(reported, expected);
        }
    }

    #[test]
    fn missing_file_is_debug_only() {
        let tmp = tempdir().unwrap();
        let mut paths = Vec::new();
        for name in ["one", "two", "three"] {
            let path = tmp.path().join(name);
            write(&path, name.as_bytes());
            paths.push(path);
        }
        let missing = tmp.path().join("vanished");
        paths.push(missing.clone());

        let (service, normal, debug) = build_service(StaticWalker(paths), MultiAlgorithmHasher::new(), true);
        let summary = service.run(&ChecksumConfig::new().with_algorithm(HashAlgorithm::Sha1)).unwrap();

        assert_eq!(summary, RunSummary { discovered: 4, hashed: 3, failed: 1, traversal_errors: 0 });
        assert_eq!(normal.lines().len(), 3);
        assert!(!normal.contents().contains("vanished"));

        let errors: Vec<String> = debug
            .lines()
            .into_iter()
            .filter(|line| line.starts_with("Checksum error"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(&missing.display().to_string()));
        assert!(debug.contents().contains("Computing SHA-1 checksum for file: "));
    }

    #[test]
    fn failures_are_silent_without_verbose() {
        let paths = vec![PathBuf::from("/nonexistent/checksum-test/a")];
        let (service, normal, debug) = build_service(StaticWalker(paths), MultiAlgorithmHasher::new(), false);

        let summary = service.run(&ChecksumConfig::new()).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(normal.contents(), "");
        assert_eq!(debug.contents(), "");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_among_many() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        for i in 0..5 {
            write(&tmp.path().join(format!("ok{i}.txt")), b"fine");
        }
        let locked = tmp.path().join("locked.txt");
        write(&locked, b"secret");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            // Running privileged; permissions are not enforced.
            return;
        }

        let (service, normal, debug) = build_service(FileSystemAdapter::new(), MultiAlgorithmHasher::new(), true);
        let summary = service.run(&ChecksumConfig::new().with_root(tmp.path())).unwrap();

        assert_eq!(normal.lines().len(), 5);
        assert_eq!(summary.failed, 1);
        let errors: Vec<String> = debug
            .lines()
            .into_iter()
            .filter(|line| line.starts_with("Checksum error"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("locked.txt"));
    }

    #[test]
    fn ten_thousand_tasks_all_complete() {
        let paths: Vec<PathBuf> = (0..10_000).map(|i| PathBuf::from(format!("virtual/{i}"))).collect();

        for concurrency in [Concurrency::Unbounded, pool_of(4)] {
            let (service, normal, _) = build_service(StaticWalker(paths.clone()), NameHasher, false);
            let summary = service.run(&ChecksumConfig::new().with_concurrency(concurrency)).unwrap();

            assert_eq!(summary.discovered, 10_000);
            assert_eq!(summary.hashed, 10_000);
            let lines = normal.lines();
            assert_eq!(lines.len(), 10_000);
            let unique: HashSet<&String> = lines.iter().collect();
            assert_eq!(unique.len(), 10_000);
        }
    }

    #[test]
    fn single_worker_pool_does_not_deadlock() {
        let paths: Vec<PathBuf> = (0..100).map(|i| PathBuf::from(format!("p/{i}"))).collect();
        let (service, normal, _) = build_service(StaticWalker(paths), NameHasher, false);

        let summary = service.run(&ChecksumConfig::new().with_concurrency(pool_of(1))).unwrap();
        assert_eq!(summary.hashed, 100);
        assert_eq!(normal.lines().len(), 100);
    }

    #[test]
    fn walker_panic_is_fatal() {
        let (service, _, _) = build_service(PanickingWalker, NameHasher, false);
        let err = service.run(&ChecksumConfig::new()).unwrap_err();
        assert!(matches!(err, ChecksumError::WalkerPanicked));
    }

    #[test]
    fn lost_result_is_fatal() {
        let paths = vec![PathBuf::from("x/fine"), PathBuf::from("x/boom")];
        let (service, _, _) = build_service(StaticWalker(paths), PanickingHasher, false);

        let err = service.run(&ChecksumConfig::new()).unwrap_err();
        match err {
            ChecksumError::Incomplete { discovered, reported } => {
                assert_eq!(discovered, 2);
                assert_eq!(reported, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fallback_pool_survives_panicking_job() {
        let executor = Executor::for_concurrency(Concurrency::Unbounded).unwrap();
        let Executor::Unbounded { fallback } = &executor else {
            panic!("unbounded executor expected");
        };

        let barrier = WaitGroup::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let done = barrier.clone();
        fallback.spawn(move || {
            let _done = done;
            panic!("hasher blew up");
        });
        for _ in 0..4 {
            let done = barrier.clone();
            let finished = Arc::clone(&finished);
            fallback.spawn(move || {
                let _done = done;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        barrier.wait();
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }
}
