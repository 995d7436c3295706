//! Zero-copy block reader over a read-only memory mapping.
//!
//! The file is mapped once, shared and read-only, and walked front to back
//! in fixed-size blocks. Blocks are borrowed straight out of the mapping, so
//! no byte is copied into process-managed buffers. A block never outlives
//! the borrow it came from: [`read_chunks`] hands each one to a handler for
//! a single call, and [`MappedFile::blocks`] ties them to the `MappedFile`.
//!
//! Modifying or truncating the file while it is mapped is undefined
//! behavior and is not guarded against.

use crate::FileError;
use memmap2::Mmap;
use std::fs::File;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::slice::Chunks;
use tracing::debug;

/// A file mapped read-only into memory
///
/// Zero-length files are not mapped at all; they expose an empty slice.
/// The mapping is released when this value is dropped.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl MappedFile {
    /// Open and map `path`
    ///
    /// # Errors
    /// Returns [`FileError::Setup`] if the file cannot be opened, stat'ed
    /// or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FileError> {
        let path = path.as_ref();
        let setup = |source| FileError::Setup {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(setup)?;
        let size = file.metadata().map_err(setup)?.len();

        if size == 0 {
            debug!("{} is empty, skipping mapping", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                mmap: None,
            });
        }

        // SAFETY: The mapping is read-only. Concurrent modification of the
        // underlying file by another process is undefined behavior, which
        // callers accept as a documented boundary of this reader.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(setup)?;

        #[cfg(unix)]
        if let Err(e) = mmap.advise(memmap2::Advice::Sequential) {
            debug!("madvise(SEQUENTIAL) failed for {}: {}", path.display(), e);
        }

        debug!("Mapped {} ({} bytes)", path.display(), size);

        Ok(Self {
            path: path.to_path_buf(),
            mmap: Some(mmap),
        })
    }

    /// Path this mapping was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.mmap.is_none()
    }

    /// Whole mapping as one slice
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Lazy, forward-only sequence of blocks of `block_size` bytes
    ///
    /// The final block is shorter when the length is not a multiple of
    /// `block_size`.
    ///
    /// # Errors
    /// Returns [`FileError::InvalidBlockSize`] if `block_size` is zero.
    pub fn blocks(&self, block_size: usize) -> Result<Blocks<'_>, FileError> {
        if block_size == 0 {
            return Err(FileError::InvalidBlockSize);
        }
        Ok(Blocks {
            inner: self.as_bytes().chunks(block_size),
        })
    }
}

/// Iterator over borrowed blocks of a [`MappedFile`]
#[derive(Debug)]
pub struct Blocks<'a> {
    inner: Chunks<'a, u8>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Blocks<'_> {}

impl FusedIterator for Blocks<'_> {}

/// Stream `path` through `handler` in blocks of `block_size` bytes
///
/// Blocks arrive in increasing offset order starting at 0; the last one may
/// be short. An empty file succeeds without calling `handler`. The first
/// handler error stops iteration and is returned unchanged. The mapping is
/// released on every return path.
///
/// # Errors
/// Setup failures and an invalid block size are converted into `E` through
/// `From<FileError>`.
///
/// # Examples
/// ```no_run
/// use chunkline_files::{FileError, read_chunks};
///
/// let mut total = 0usize;
/// read_chunks("/var/tmp/large.bin", 4 * 1024 * 1024, |block| {
///     total += block.len();
///     Ok::<_, FileError>(())
/// })?;
/// # Ok::<(), FileError>(())
/// ```
pub fn read_chunks<P, F, E>(path: P, block_size: usize, mut handler: F) -> Result<(), E>
where
    P: AsRef<Path>,
    F: FnMut(&[u8]) -> Result<(), E>,
    E: From<FileError>,
{
    if block_size == 0 {
        return Err(FileError::InvalidBlockSize.into());
    }

    let mapped = MappedFile::open(path)?;
    for block in mapped.blocks(block_size)? {
        handler(block)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(data: &[u8]) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(data).unwrap();
        temp.flush().unwrap();
        temp
    }

    #[test]
    fn test_blocks_with_short_tail() {
        let temp = temp_with(b"0123456789");
        let mut lens = Vec::new();
        let mut joined = Vec::new();

        read_chunks(temp.path(), 4, |block| {
            lens.push(block.len());
            joined.extend_from_slice(block);
            Ok::<_, FileError>(())
        })
        .unwrap();

        assert_eq!(lens, vec![4, 4, 2]);
        assert_eq!(joined, b"0123456789");
    }

    #[test]
    fn test_block_larger_than_file() {
        let temp = temp_with(b"abc");
        let mut calls = 0;

        read_chunks(temp.path(), 1024, |block| {
            calls += 1;
            assert_eq!(block, b"abc");
            Ok::<_, FileError>(())
        })
        .unwrap();

        assert_eq!(calls, 1);
    }

    #[test]
    fn test_empty_file_no_calls() {
        let temp = temp_with(b"");
        let mut calls = 0;

        read_chunks(temp.path(), 16, |_| {
            calls += 1;
            Ok::<_, FileError>(())
        })
        .unwrap();

        assert_eq!(calls, 0);
    }

    #[test]
    fn test_handler_error_stops_iteration() {
        #[derive(Debug)]
        #[allow(dead_code)]
        enum TestError {
            Stop(usize),
            File(FileError),
        }

        impl From<FileError> for TestError {
            fn from(e: FileError) -> Self {
                TestError::File(e)
            }
        }

        let temp = temp_with(&[0u8; 100]);
        let mut calls = 0;

        let err = read_chunks(temp.path(), 10, |_| {
            calls += 1;
            if calls == 3 {
                Err(TestError::Stop(calls))
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert!(matches!(err, TestError::Stop(3)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let temp = temp_with(b"data");
        let result = read_chunks(temp.path(), 0, |_| Ok::<_, FileError>(()));
        assert!(matches!(result, Err(FileError::InvalidBlockSize)));
    }

    #[test]
    fn test_missing_file_is_setup_error() {
        let result = read_chunks("/nonexistent/chunkline/file", 8, |_| Ok::<_, FileError>(()));
        assert!(matches!(result, Err(FileError::Setup { .. })));
    }

    #[test]
    fn test_mapped_file_blocks_iterator() {
        let temp = temp_with(b"abcdefgh");
        let mapped = MappedFile::open(temp.path()).unwrap();

        assert_eq!(mapped.len(), 8);
        assert!(!mapped.is_empty());
        assert_eq!(mapped.path(), temp.path());

        let blocks = mapped.blocks(3).unwrap();
        assert_eq!(blocks.len(), 3);
        let collected: Vec<&[u8]> = blocks.collect();
        assert_eq!(collected, vec![&b"abc"[..], &b"def"[..], &b"gh"[..]]);
    }

    #[test]
    fn test_mapped_empty_file() {
        let temp = temp_with(b"");
        let mapped = MappedFile::open(temp.path()).unwrap();

        assert!(mapped.is_empty());
        assert_eq!(mapped.as_bytes(), b"");
        assert_eq!(mapped.blocks(4).unwrap().count(), 0);
    }
}
