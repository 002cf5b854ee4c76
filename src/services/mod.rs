pub mod checksum_runner;

pub use checksum_runner::ChecksumService;
