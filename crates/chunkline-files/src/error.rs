//! Error types for the Chunkline file engine.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// File engine errors
#[derive(Debug, Error)]
pub enum FileError {
    /// Destination or source could not be prepared (create, truncate, stat, map)
    #[error("setup failed for {}: {source}", .path.display())]
    Setup {
        /// Path being prepared
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Cancellation token deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A single positional write failed
    #[error("write of {len} bytes at offset {offset} failed: {source}")]
    Write {
        /// Destination offset
        offset: u64,
        /// Payload length
        len: usize,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Chunk does not fit inside the declared file size
    #[error("chunk of {len} bytes at offset {offset} exceeds file size {total_size}")]
    OutOfBounds {
        /// Destination offset
        offset: u64,
        /// Payload length
        len: usize,
        /// Declared file size
        total_size: u64,
    },

    /// Two chunk spans cover the same bytes
    #[error("chunk at offset {second} overlaps chunk at offset {first}")]
    Overlap {
        /// Offset of the earlier span
        first: u64,
        /// Offset of the overlapping span
        second: u64,
    },

    /// Consumer side of the chunk queue went away
    #[error("chunk queue closed by consumer")]
    QueueClosed,

    /// Block size must be non-zero
    #[error("block size must be greater than zero")]
    InvalidBlockSize,

    /// Invalid engine configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Several non-fatal errors collected by the writer
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<FileError>),
}

impl FileError {
    /// Combine collected errors into a single value
    ///
    /// Returns `None` for an empty list and the error itself for a
    /// single-element list.
    pub fn join(mut errors: Vec<FileError>) -> Option<FileError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(FileError::Aggregate(errors)),
        }
    }

    /// Whether this error, or any error it aggregates, is a cancellation
    pub fn is_cancellation(&self) -> bool {
        match self {
            FileError::Cancelled | FileError::DeadlineExceeded => true,
            FileError::Aggregate(errors) => errors.iter().any(FileError::is_cancellation),
            _ => false,
        }
    }

    /// Number of leaf errors carried by this value
    pub fn count(&self) -> usize {
        match self {
            FileError::Aggregate(errors) => errors.iter().map(FileError::count).sum(),
            _ => 1,
        }
    }

    /// Iterate over leaf errors
    pub fn iter(&self) -> Box<dyn Iterator<Item = &FileError> + '_> {
        match self {
            FileError::Aggregate(errors) => Box::new(errors.iter().flat_map(FileError::iter)),
            other => Box::new(std::iter::once(other)),
        }
    }
}

struct AggregateDisplay<'a>(&'a [FileError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_empty_is_none() {
        assert!(FileError::join(Vec::new()).is_none());
    }

    #[test]
    fn test_join_single_unwraps() {
        let err = FileError::join(vec![FileError::Cancelled]).unwrap();
        assert!(matches!(err, FileError::Cancelled));
    }

    #[test]
    fn test_join_many_displays_each_line() {
        let err = FileError::join(vec![
            FileError::Cancelled,
            FileError::OutOfBounds {
                offset: 10,
                len: 5,
                total_size: 12,
            },
        ])
        .unwrap();

        assert_eq!(err.count(), 2);
        assert!(err.is_cancellation());
        assert_eq!(
            err.to_string(),
            "operation cancelled\nchunk of 5 bytes at offset 10 exceeds file size 12"
        );
    }

    #[test]
    fn test_iter_flattens_nested() {
        let nested = FileError::Aggregate(vec![
            FileError::InvalidBlockSize,
            FileError::Aggregate(vec![FileError::Cancelled, FileError::DeadlineExceeded]),
        ]);

        assert_eq!(nested.iter().count(), 3);
        assert_eq!(nested.count(), 3);
    }
}
