pub mod filesystem;
pub mod logger;
pub mod multi_hasher;

pub use filesystem::FileSystemAdapter;
pub use logger::LineLogger;
pub use multi_hasher::MultiAlgorithmHasher;
