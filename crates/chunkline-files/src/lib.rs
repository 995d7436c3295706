//! # Chunkline Files
//!
//! Bulk file I/O engine for Chunkline.
//!
//! This crate provides:
//! - An elastic pool of fixed-capacity reusable buffers
//! - A concurrent writer that rebuilds a file from an unordered chunk stream
//!   using positional writes into a pre-sized destination
//! - A zero-copy reader that walks a memory-mapped file block by block
//! - Chunk planning, a reference file producer and BLAKE3 whole-file hashing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod chunker;
pub mod error;
pub mod hasher;
pub mod pool;
mod positional;
pub mod reader;
pub mod writer;

pub use cancel::CancellationToken;
pub use chunker::{Chunk, ChunkPlan, ChunkSpan};
pub use error::FileError;
pub use pool::BufferPool;
pub use reader::{MappedFile, read_chunks};
pub use writer::{ConcurrentWriter, WriteReport, WriterConfig, write_concurrently};

/// Default chunk capacity (10 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Default number of writer worker threads
pub const DEFAULT_WORKERS: usize = 4;

/// Default bounded queue depth between producer and writer
pub const DEFAULT_QUEUE_DEPTH: usize = 16;
