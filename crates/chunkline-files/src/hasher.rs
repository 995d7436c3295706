//! BLAKE3 whole-file hashing for post-write verification.

use crate::FileError;
use crate::reader::read_chunks;
use std::path::Path;

/// Hash a byte slice
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Block count, byte count and hash of one pass over a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDigest {
    /// Blocks delivered by the reader
    pub blocks: u64,
    /// Bytes hashed
    pub bytes: u64,
    /// BLAKE3 hash of the contents
    pub hash: [u8; 32],
}

/// Walk a file through the mapped reader, hashing every block
///
/// Blocks of `block_size` bytes are fed to the hasher straight from the
/// mapping, so no copy of the file is made.
pub fn digest_file<P: AsRef<Path>>(path: P, block_size: usize) -> Result<FileDigest, FileError> {
    let mut hasher = blake3::Hasher::new();
    let mut blocks = 0u64;
    let mut bytes = 0u64;

    read_chunks(path, block_size, |block| {
        blocks += 1;
        bytes += block.len() as u64;
        #[cfg(feature = "rayon")]
        hasher.update_rayon(block);
        #[cfg(not(feature = "rayon"))]
        hasher.update(block);
        Ok::<_, FileError>(())
    })?;

    Ok(FileDigest {
        blocks,
        bytes,
        hash: *hasher.finalize().as_bytes(),
    })
}

/// Hash an entire file through the mapped reader
pub fn hash_file<P: AsRef<Path>>(path: P, block_size: usize) -> Result<[u8; 32], FileError> {
    digest_file(path, block_size).map(|digest| digest.hash)
}

/// Whether two files have identical contents
pub fn files_match<P: AsRef<Path>, Q: AsRef<Path>>(
    a: P,
    b: Q,
    block_size: usize,
) -> Result<bool, FileError> {
    Ok(hash_file(a, block_size)? == hash_file(b, block_size)?)
}

/// Lowercase hex rendering of a digest
pub fn to_hex(digest: &[u8; 32]) -> String {
    blake3::Hash::from(*digest).to_hex().to_string()
}
