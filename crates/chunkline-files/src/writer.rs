//! Concurrent chunk writer.
//!
//! Rebuilds a file from an unordered stream of [`Chunk`]s:
//! - The destination is created, truncated and pre-sized once, before any
//!   worker starts, so positional writes never race with file growth
//! - A fixed number of workers share one file handle and write each chunk at
//!   its own offset without locking (offsets never overlap by contract)
//! - Failed chunks are recorded and skipped; siblings keep going
//! - Cancellation is polled once per iteration and raced against the queue
//!   in a `select!`, so idle workers wake as soon as the token fires
//!
//! All recorded errors are joined into one [`FileError`] at the end. Bytes
//! already written stay in place when an error is returned.

use crate::positional::write_all_at;
use crate::{BufferPool, CancellationToken, Chunk, DEFAULT_WORKERS, FileError};
use crossbeam_channel::{Receiver, select};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Number of worker threads
    pub workers: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Summary of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Chunks written
    pub chunks_written: u64,
    /// Bytes written
    pub bytes_written: u64,
    /// Wall time from setup to join
    pub elapsed: Duration,
}

impl WriteReport {
    /// Throughput in bytes per second
    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.bytes_written as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Per-worker counters
#[derive(Debug, Default)]
struct WorkerStats {
    chunks_written: AtomicU64,
    bytes_written: AtomicU64,
    errors: AtomicU64,
}

/// Mutex-guarded error list shared by all workers
#[derive(Debug, Default)]
struct ErrorSink {
    errors: Mutex<Vec<FileError>>,
}

impl ErrorSink {
    fn record(&self, err: FileError) {
        match self.errors.lock() {
            Ok(mut errors) => errors.push(err),
            Err(poisoned) => poisoned.into_inner().push(err),
        }
    }

    /// Record a cancellation unless an equal one is already present
    fn record_cancellation(&self, err: FileError) {
        let mut errors = match self.errors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let duplicate = errors
            .iter()
            .any(|e| std::mem::discriminant(e) == std::mem::discriminant(&err));
        if !duplicate {
            errors.push(err);
        }
    }

    fn into_inner(self) -> Vec<FileError> {
        match self.errors.into_inner() {
            Ok(errors) => errors,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Fixed-size worker pool writing chunks into one destination file
///
/// The buffer pool is injected so callers (and tests) control its lifetime
/// and can observe which buffers were recycled.
#[derive(Debug, Clone)]
pub struct ConcurrentWriter {
    config: WriterConfig,
    pool: Arc<BufferPool>,
}

impl ConcurrentWriter {
    /// Create a writer returning buffers to `pool`
    pub fn new(config: WriterConfig, pool: Arc<BufferPool>) -> Self {
        Self { config, pool }
    }

    /// Number of worker threads used per write
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Buffer pool chunks are returned to
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Drain `chunks` into `path`, pre-sized to `total_size`
    ///
    /// Returns once the producer has dropped its sender and every worker has
    /// drained the queue, or once every worker has observed cancellation.
    ///
    /// # Errors
    /// - [`FileError::InvalidConfig`] if the worker count is zero
    /// - [`FileError::Setup`] if the destination cannot be created or sized;
    ///   no worker is started in that case
    /// - Otherwise the joined cancellation and per-chunk errors
    pub fn write<P: AsRef<Path>>(
        &self,
        token: &CancellationToken,
        path: P,
        chunks: Receiver<Chunk>,
        total_size: u64,
    ) -> Result<WriteReport, FileError> {
        if self.config.workers == 0 {
            return Err(FileError::InvalidConfig(
                "writer needs at least one worker".into(),
            ));
        }

        let path = path.as_ref();
        let start = Instant::now();
        let file = create_presized(path, total_size)?;

        info!(
            "Writing {} bytes to {} with {} workers",
            total_size,
            path.display(),
            self.config.workers
        );

        let sink = ErrorSink::default();
        let stats: Vec<WorkerStats> = (0..self.config.workers)
            .map(|_| WorkerStats::default())
            .collect();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.config.workers);

            for (id, worker_stats) in stats.iter().enumerate() {
                let worker = Worker {
                    id,
                    file: &file,
                    total_size,
                    pool: &self.pool,
                    token,
                    chunks: chunks.clone(),
                    stats: worker_stats,
                    sink: &sink,
                };

                match thread::Builder::new()
                    .name(format!("chunkline-writer-{id}"))
                    .spawn_scoped(scope, move || worker.run())
                {
                    Ok(handle) => handles.push((id, handle)),
                    Err(e) => {
                        error!("Failed to spawn writer worker {}: {}", id, e);
                        sink.record(FileError::Io(e));
                    }
                }
            }

            // Only workers hold the queue now; if they all exit early the
            // producer sees a disconnected channel instead of blocking.
            drop(chunks);

            for (id, handle) in handles {
                if let Err(payload) = handle.join() {
                    error!("Writer worker {} panicked", id);
                    std::panic::resume_unwind(payload);
                }
            }
        });

        let report = WriteReport {
            chunks_written: stats
                .iter()
                .map(|s| s.chunks_written.load(Ordering::Relaxed))
                .sum(),
            bytes_written: stats
                .iter()
                .map(|s| s.bytes_written.load(Ordering::Relaxed))
                .sum(),
            elapsed: start.elapsed(),
        };
        let failed: u64 = stats.iter().map(|s| s.errors.load(Ordering::Relaxed)).sum();

        match FileError::join(sink.into_inner()) {
            None => {
                info!(
                    "Wrote {} chunks ({} bytes) to {} in {:?}",
                    report.chunks_written,
                    report.bytes_written,
                    path.display(),
                    report.elapsed
                );
                Ok(report)
            }
            Some(err) => {
                warn!(
                    "Write to {} finished with errors ({} chunks written, {} failed)",
                    path.display(),
                    report.chunks_written,
                    failed
                );
                Err(err)
            }
        }
    }
}

/// Drain `chunks` into `path` with the default worker count
///
/// See [`ConcurrentWriter::write`].
pub fn write_concurrently<P: AsRef<Path>>(
    token: &CancellationToken,
    path: P,
    chunks: Receiver<Chunk>,
    total_size: u64,
    pool: Arc<BufferPool>,
) -> Result<(), FileError> {
    ConcurrentWriter::new(WriterConfig::default(), pool)
        .write(token, path, chunks, total_size)
        .map(|_| ())
}

fn create_presized(path: &Path, total_size: u64) -> Result<File, FileError> {
    let setup = |source| FileError::Setup {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(setup)?;
    file.set_len(total_size).map_err(setup)?;
    Ok(file)
}

/// One writer thread's view of the shared state
struct Worker<'a> {
    id: usize,
    file: &'a File,
    total_size: u64,
    pool: &'a BufferPool,
    token: &'a CancellationToken,
    chunks: Receiver<Chunk>,
    stats: &'a WorkerStats,
    sink: &'a ErrorSink,
}

impl Worker<'_> {
    fn run(self) {
        debug!("Writer worker {} starting", self.id);
        let deadline = self.token.deadline_channel();

        loop {
            if let Some(err) = self.token.error() {
                self.cancelled(err);
                break;
            }

            select! {
                recv(self.token.done()) -> _ => {
                    self.cancelled(FileError::Cancelled);
                    break;
                }
                recv(deadline) -> _ => {
                    self.cancelled(FileError::DeadlineExceeded);
                    break;
                }
                recv(self.chunks) -> msg => match msg {
                    Ok(chunk) => self.write_chunk(chunk),
                    Err(_) => break,
                },
            }
        }

        debug!(
            "Writer worker {} exiting (wrote {} chunks, {} bytes, {} errors)",
            self.id,
            self.stats.chunks_written.load(Ordering::Relaxed),
            self.stats.bytes_written.load(Ordering::Relaxed),
            self.stats.errors.load(Ordering::Relaxed)
        );
    }

    fn cancelled(&self, err: FileError) {
        debug!("Writer worker {} stopping: {}", self.id, err);
        self.sink.record_cancellation(err);
    }

    fn write_chunk(&self, chunk: Chunk) {
        let Chunk { offset, data } = chunk;
        let len = data.len();

        let in_bounds = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.total_size);
        if !in_bounds {
            self.fail(FileError::OutOfBounds {
                offset,
                len,
                total_size: self.total_size,
            });
            return;
        }

        if let Err(source) = write_all_at(self.file, &data, offset) {
            self.fail(FileError::Write {
                offset,
                len,
                source,
            });
            return;
        }

        self.stats.chunks_written.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_written
            .fetch_add(len as u64, Ordering::Relaxed);
        self.pool.release(data);
    }

    fn fail(&self, err: FileError) {
        warn!("Writer worker {}: {}", self.id, err);
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        self.sink.record(err);
    }
}
