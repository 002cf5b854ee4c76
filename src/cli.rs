use crate::domain::{ChecksumConfig, Concurrency, HashAlgorithm};
use clap::builder::{PathBufValueParser, TypedValueParser};
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "checksum")]
#[command(about = "A command line utility for computing checksums")]
#[command(version)]
pub struct Cli {
    #[arg(long = "verbose", global = true, help = "Enable verbose mode")]
    pub verbose: bool,

    #[arg(
        short = 'j',
        long = "jobs",
        global = true,
        help = "Maximum number of files hashed at once (one thread per file if not specified)"
    )]
    pub jobs: Option<NonZeroUsize>,

    #[arg(
        short = 'L',
        long = "follow-symlinks",
        global = true,
        help = "Follow symbolic links"
    )]
    pub follow_symlinks: bool,

    #[arg(
        long = "chunk-size",
        global = true,
        help = "Read buffer size in bytes",
        default_value = "65536"
    )]
    pub chunk_size: NonZeroUsize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    #[command(about = "Compute MD5 checksum")]
    Md5(TargetArgs),
    #[command(about = "Compute SHA-1 checksum")]
    Sha1(TargetArgs),
    #[command(about = "Compute SHA-256 checksum")]
    Sha256(TargetArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    #[arg(
        help = "File or directory to read",
        value_parser = PathBufValueParser::new().try_map(existing_path)
    )]
    pub path: PathBuf,
}

impl Command {
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Command::Md5(_) => HashAlgorithm::Md5,
            Command::Sha1(_) => HashAlgorithm::Sha1,
            Command::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Command::Md5(target) | Command::Sha1(target) | Command::Sha256(target) => &target.path,
        }
    }
}

impl Cli {
    pub fn to_config(&self) -> ChecksumConfig {
        ChecksumConfig::new()
            .with_root(self.command.path())
            .with_algorithm(self.command.algorithm())
            .with_concurrency(Concurrency::from_jobs(self.jobs))
            .with_follow_symlinks(self.follow_symlinks)
            .with_chunk_size(self.chunk_size.get())
    }
}

// Parsed from the OS string, so non-UTF-8 paths are accepted.
fn existing_path(path: PathBuf) -> Result<PathBuf, String> {
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("path '{}' does not exist", path.display()))
    }
}
