//! File chunking.
//!
//! [`Chunk`] is the unit of work the writer consumes. [`ChunkPlan`] tiles a
//! file into non-overlapping spans, and [`produce_from_file`] is a reference
//! producer that fills pooled buffers from a source file and feeds them into
//! a writer queue.

use crate::positional::read_exact_at;
use crate::{BufferPool, FileError};
use crossbeam_channel::Sender;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// A payload tagged with its destination offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Destination offset in bytes
    pub offset: u64,
    /// Payload; ownership passes to the writer once sent
    pub data: Vec<u8>,
}

impl Chunk {
    /// Create a chunk
    pub fn new(offset: u64, data: Vec<u8>) -> Self {
        Self { offset, data }
    }

    /// Payload length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One past the last destination byte
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.data.len() as u64)
    }
}

/// A byte range of a planned file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Zero-based span index
    pub index: u64,
    /// Start offset
    pub offset: u64,
    /// Length in bytes
    pub len: usize,
}

impl ChunkSpan {
    /// One past the last byte, saturating at `u64::MAX`
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len as u64)
    }

    /// One past the last byte, or `None` if it does not fit in a `u64`
    pub fn checked_end(&self) -> Option<u64> {
        self.offset.checked_add(self.len as u64)
    }
}

/// Tiling of `[0, total_size)` into fixed-size spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: usize,
}

impl ChunkPlan {
    /// Plan a file of `total_size` bytes in spans of `chunk_size`
    ///
    /// # Errors
    /// Returns [`FileError::InvalidConfig`] if `chunk_size` is zero.
    pub fn new(total_size: u64, chunk_size: usize) -> Result<Self, FileError> {
        if chunk_size == 0 {
            return Err(FileError::InvalidConfig(
                "chunk size must be greater than zero".into(),
            ));
        }
        Ok(Self {
            total_size,
            chunk_size,
        })
    }

    /// Total file size
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Get chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of spans covering the file
    pub fn chunk_count(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size as u64)
    }

    /// Span at `index`, or `None` past the end
    pub fn span(&self, index: u64) -> Option<ChunkSpan> {
        if index >= self.chunk_count() {
            return None;
        }
        let offset = index * self.chunk_size as u64;
        let len = (self.total_size - offset).min(self.chunk_size as u64) as usize;
        Some(ChunkSpan { index, offset, len })
    }

    /// Spans in offset order
    pub fn spans(&self) -> impl Iterator<Item = ChunkSpan> + '_ {
        (0..self.chunk_count()).filter_map(move |i| self.span(i))
    }

    /// Check that `spans` are pairwise disjoint
    ///
    /// Positional writes rely on producers never sending overlapping chunks
    /// concurrently; this is an optional check for producers that build
    /// their own tilings.
    ///
    /// # Errors
    /// Returns [`FileError::OutOfBounds`] for a span whose end does not fit
    /// in a `u64`, otherwise [`FileError::Overlap`] for the first
    /// overlapping pair found.
    pub fn validate_disjoint(spans: &[ChunkSpan]) -> Result<(), FileError> {
        if let Some(span) = spans.iter().find(|s| s.checked_end().is_none()) {
            return Err(FileError::OutOfBounds {
                offset: span.offset,
                len: span.len,
                total_size: u64::MAX,
            });
        }

        let mut sorted: Vec<&ChunkSpan> = spans.iter().filter(|s| s.len > 0).collect();
        sorted.sort_by_key(|s| s.offset);

        for pair in sorted.windows(2) {
            if pair[1].offset < pair[0].end() {
                return Err(FileError::Overlap {
                    first: pair[0].offset,
                    second: pair[1].offset,
                });
            }
        }
        Ok(())
    }
}

/// Read `spans` from `source` into pooled buffers and send them as chunks
///
/// Spans are delivered in the order given, so callers can shuffle them.
/// `on_sent` runs after each successful send. The sender is dropped when
/// this returns, which closes the stream for the writer.
///
/// Returns the number of bytes sent.
///
/// # Errors
/// Fails if the source cannot be opened or read, if a span is larger than
/// the pool capacity, or with [`FileError::QueueClosed`] if the writer
/// stopped receiving.
pub fn produce_from_file<P, I, F>(
    pool: &BufferPool,
    source: P,
    spans: I,
    tx: Sender<Chunk>,
    mut on_sent: F,
) -> Result<u64, FileError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = ChunkSpan>,
    F: FnMut(&ChunkSpan),
{
    let path = source.as_ref();
    let file = File::open(path).map_err(|source| FileError::Setup {
        path: path.to_path_buf(),
        source,
    })?;

    let mut sent = 0u64;
    for span in spans {
        if span.len > pool.capacity() {
            return Err(FileError::InvalidConfig(format!(
                "span of {} bytes exceeds buffer capacity {}",
                span.len,
                pool.capacity()
            )));
        }

        let mut buf = pool.acquire();
        buf.truncate(span.len);
        if let Err(e) = read_exact_at(&file, &mut buf, span.offset) {
            pool.release(buf);
            return Err(e.into());
        }

        tx.send(Chunk::new(span.offset, buf))
            .map_err(|_| FileError::QueueClosed)?;
        sent += span.len as u64;
        on_sent(&span);
    }

    debug!("Producer sent {} bytes from {}", sent, path.display());
    Ok(sent)
}
