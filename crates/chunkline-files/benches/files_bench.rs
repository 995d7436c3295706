//! Performance benchmarks for chunkline-files.
//!
//! Run with: `cargo bench -p chunkline-files`
//!
//! Covers:
//! - Buffer pool acquire/release against fresh allocation
//! - Concurrent writer throughput by worker count and delivery order
//! - Mapped block reads by block size

use chunkline_files::chunker::{ChunkPlan, produce_from_file};
use chunkline_files::hasher::hash_file;
use chunkline_files::{
    BufferPool, CancellationToken, ConcurrentWriter, WriterConfig, read_chunks,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use crossbeam_channel::bounded;
use rand::RngCore;
use rand::seq::SliceRandom;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::{NamedTempFile, TempDir};

const BENCH_CHUNK_SIZE: usize = 1024 * 1024;

fn random_file(size: usize) -> NamedTempFile {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut data);
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(&data).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

// ============================================================================
// Buffer Pool Benchmarks
// ============================================================================

/// Pooled acquire/release against a fresh allocation per chunk
fn bench_pool_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool");
    group.throughput(Throughput::Elements(1));

    let pool = BufferPool::new(BENCH_CHUNK_SIZE);
    pool.release(pool.acquire());

    group.bench_function("pooled", |b| {
        b.iter(|| {
            let buf = pool.acquire();
            black_box(buf.len());
            pool.release(buf)
        });
    });

    group.bench_function("allocate", |b| {
        b.iter(|| {
            let buf = vec![0u8; BENCH_CHUNK_SIZE];
            black_box(buf.len())
        });
    });

    group.finish();
}

// ============================================================================
// Concurrent Writer Benchmarks
// ============================================================================

/// Rebuild a 64 MB file with varying worker counts, in order and shuffled
fn bench_concurrent_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_write");
    group.sample_size(10);

    let size = 64 * BENCH_CHUNK_SIZE;
    let source = random_file(size);
    let plan = ChunkPlan::new(size as u64, BENCH_CHUNK_SIZE).unwrap();
    let dir = TempDir::new().unwrap();
    let dst = dir.path().join("bench_output.bin");
    let pool = Arc::new(BufferPool::new(BENCH_CHUNK_SIZE));

    group.throughput(Throughput::Bytes(size as u64));

    for shuffled in [false, true] {
        for workers in [1, 2, 4, 8] {
            let label = if shuffled { "shuffled" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, workers), &workers, |b, &workers| {
                let writer = ConcurrentWriter::new(WriterConfig { workers }, pool.clone());

                b.iter(|| {
                    let mut spans: Vec<_> = plan.spans().collect();
                    if shuffled {
                        spans.shuffle(&mut rand::thread_rng());
                    }

                    let (tx, rx) = bounded(16);
                    let producer = {
                        let pool = pool.clone();
                        let source = source.path().to_path_buf();
                        thread::spawn(move || produce_from_file(&pool, source, spans, tx, |_| {}))
                    };

                    let report = writer
                        .write(&CancellationToken::new(), &dst, rx, size as u64)
                        .unwrap();
                    producer.join().unwrap().unwrap();
                    black_box(report.bytes_written)
                });
            });
        }
    }

    group.finish();
}

// ============================================================================
// Mapped Reader Benchmarks
// ============================================================================

/// Walk a 64 MB mapping at different block sizes
fn bench_mapped_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapped_read");

    let size = 64 * BENCH_CHUNK_SIZE;
    let source = random_file(size);
    group.throughput(Throughput::Bytes(size as u64));

    for block_size in [64 * 1024, 1024 * 1024, 8 * 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("xor_fold", block_size),
            &block_size,
            |b, &block_size| {
                b.iter(|| {
                    let mut acc = 0u8;
                    read_chunks(source.path(), block_size, |block| {
                        acc ^= block.iter().fold(0u8, |a, &x| a ^ x);
                        Ok::<_, chunkline_files::FileError>(())
                    })
                    .unwrap();
                    black_box(acc)
                });
            },
        );
    }

    group.bench_function("hash_file", |b| {
        b.iter(|| black_box(hash_file(source.path(), 1024 * 1024).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(pool_benches, bench_pool_acquire_release);

criterion_group!(writer_benches, bench_concurrent_write);

criterion_group!(reader_benches, bench_mapped_read);

criterion_main!(pool_benches, writer_benches, reader_benches);
