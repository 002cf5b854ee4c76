use crate::domain::{HashAlgorithm, DEFAULT_CHUNK_SIZE};
use crate::error::HashError;
use crate::ports::HashingPort;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub struct MultiAlgorithmHasher {
    chunk_size: usize,
}

impl MultiAlgorithmHasher {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Streams `reader` to the end and returns the lowercase hex digest.
    pub fn digest_reader<R: Read>(&self, reader: &mut R, algorithm: HashAlgorithm) -> io::Result<String> {
        match algorithm {
            HashAlgorithm::Md5 => {
                let mut hasher = md5::Context::new();
                self.process_chunks(reader, |data| hasher.consume(data))?;
                Ok(format!("{:x}", hasher.compute()))
            }
            HashAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                self.process_chunks(reader, |data| hasher.update(data))?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                self.process_chunks(reader, |data| hasher.update(data))?;
                Ok(format!("{:x}", hasher.finalize()))
            }
        }
    }

    fn process_chunks<R, F>(&self, reader: &mut R, mut update_fn: F) -> io::Result<()>
    where
        R: Read,
        F: FnMut(&[u8]),
    {
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            update_fn(&buffer[..bytes_read]);
        }
        Ok(())
    }
}

impl Default for MultiAlgorithmHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl HashingPort for MultiAlgorithmHasher {
    fn hash_file(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, HashError> {
        let mut file = File::open(path).map_err(|source| HashError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        self.digest_reader(&mut file, algorithm)
            .map_err(|source| HashError::Read {
                path: path.to_path_buf(),
                source,
            })
    }
}
