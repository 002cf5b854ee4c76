use anyhow::{Context, Result};
use checksum::adapters::{FileSystemAdapter, LineLogger, MultiAlgorithmHasher};
use checksum::cli::Cli;
use checksum::domain::RunSummary;
use checksum::services::ChecksumService;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Cli::parse();
    setup_logging();
    let logger = Arc::new(LineLogger::new(args.verbose));

    match run(&args, Arc::clone(&logger)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            logger.fatal(format_args!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli, logger: Arc<LineLogger>) -> Result<RunSummary> {
    let config = args.to_config();
    let filesystem = FileSystemAdapter::new().with_follow_symlinks(config.follow_symlinks);
    let hasher = MultiAlgorithmHasher::new().with_chunk_size(config.chunk_size);

    let service = ChecksumService::new(filesystem, hasher, logger);
    service.run(&config).with_context(|| {
        format!(
            "{} checksum run over {} failed",
            config.algorithm.display_name(),
            config.root.display()
        )
    })
}

// Diagnostics only; results and --verbose output go through LineLogger.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
