//! Property-based tests for Chunkline
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Chunk Plan Properties
// ============================================================================

mod plan_properties {
    use super::*;
    use chunkline_files::ChunkPlan;

    proptest! {
        /// Spans tile [0, total) exactly, in order, with no gaps
        #[test]
        fn spans_tile_the_file(total in 0u64..1_000_000, chunk_size in 16usize..100_000) {
            let plan = ChunkPlan::new(total, chunk_size).unwrap();
            let spans: Vec<_> = plan.spans().collect();

            prop_assert_eq!(spans.len() as u64, plan.chunk_count());

            let mut expected = 0u64;
            for (i, span) in spans.iter().enumerate() {
                prop_assert_eq!(span.index, i as u64);
                prop_assert_eq!(span.offset, expected);
                prop_assert!(span.len > 0 && span.len <= chunk_size);
                expected = span.end();
            }
            prop_assert_eq!(expected, total);
            prop_assert!(ChunkPlan::validate_disjoint(&spans).is_ok());
        }

        /// Shuffling a plan never introduces overlap
        #[test]
        fn shuffled_spans_stay_disjoint(
            total in 1u64..200_000,
            chunk_size in 1usize..10_000,
            seed in any::<u64>(),
        ) {
            use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

            let plan = ChunkPlan::new(total, chunk_size).unwrap();
            let mut spans: Vec<_> = plan.spans().collect();
            spans.shuffle(&mut StdRng::seed_from_u64(seed));

            prop_assert!(ChunkPlan::validate_disjoint(&spans).is_ok());
        }

        /// Duplicating any span is caught as an overlap
        #[test]
        fn duplicate_span_overlaps(
            total in 1u64..200_000,
            chunk_size in 1usize..10_000,
            pick in any::<prop::sample::Index>(),
        ) {
            let plan = ChunkPlan::new(total, chunk_size).unwrap();
            let mut spans: Vec<_> = plan.spans().collect();
            let dup = spans[pick.index(spans.len())];
            spans.push(dup);

            prop_assert!(ChunkPlan::validate_disjoint(&spans).is_err());
        }
    }
}

// ============================================================================
// Buffer Pool Properties
// ============================================================================

mod pool_properties {
    use super::*;
    use chunkline_files::BufferPool;

    proptest! {
        /// Acquire always hands out exactly C bytes, whatever was released
        #[test]
        fn acquire_is_always_full_capacity(
            capacity in 1usize..8192,
            released in prop::collection::vec((0usize..16_384, any::<bool>()), 0..32),
        ) {
            let pool = BufferPool::new(capacity);

            for (size, truncate) in released {
                let mut buf = if truncate {
                    let mut b = pool.acquire();
                    b.truncate(size.min(capacity));
                    b
                } else {
                    Vec::with_capacity(size)
                };
                buf.push(0);
                pool.release(buf);

                let got = pool.acquire();
                prop_assert_eq!(got.len(), capacity);
                pool.release(got);
            }
        }

        /// Only buffers of the configured capacity are retained
        #[test]
        fn foreign_capacities_rejected(
            capacity in 1usize..4096,
            sizes in prop::collection::vec(0usize..8192, 1..16),
        ) {
            let pool = BufferPool::new(capacity);
            let mut admitted = 0u64;

            for size in sizes {
                let buf = vec![0u8; size];
                let exact = buf.capacity() == capacity;
                prop_assert_eq!(pool.release(buf), exact);
                if exact {
                    admitted += 1;
                }
            }

            prop_assert_eq!(pool.stats().admitted, admitted);
            prop_assert_eq!(pool.idle() as u64, admitted);
        }
    }
}

// ============================================================================
// Write/Read Properties
// ============================================================================

mod pipeline_properties {
    use super::*;
    use chunkline_files::{FileError, MappedFile, read_chunks};
    use chunkline_integration_tests::{pattern_bytes, tiling, write_in_order};
    use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
    use std::sync::Arc;
    use tempfile::TempDir;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Any delivery order reproduces the source byte for byte
        #[test]
        fn shuffled_write_reconstructs_source(
            total in 0usize..200_000,
            chunk_size in 64usize..50_000,
            seed in any::<u64>(),
        ) {
            let dir = TempDir::new().unwrap();
            let dst = dir.path().join("out.bin");
            let src = Arc::new(pattern_bytes(total));

            let mut spans = tiling(total, chunk_size);
            spans.shuffle(&mut StdRng::seed_from_u64(seed));

            write_in_order(&dst, src.clone(), chunk_size, spans).unwrap();

            let out = std::fs::read(&dst).unwrap();
            prop_assert_eq!(out.len(), total);
            prop_assert!(out == *src);
        }

        /// Blocks come back in order, full-size except possibly the last
        #[test]
        fn read_block_lengths(total in 0usize..200_000, block_size in 1usize..50_000) {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("in.bin");
            let src = pattern_bytes(total);
            std::fs::write(&path, &src).unwrap();

            let mut lens = Vec::new();
            let mut data = Vec::with_capacity(total);
            read_chunks(&path, block_size, |block| {
                lens.push(block.len());
                data.extend_from_slice(block);
                Ok::<_, FileError>(())
            })
            .unwrap();

            prop_assert_eq!(lens.len(), total.div_ceil(block_size));
            if let Some((last, full)) = lens.split_last() {
                prop_assert!(full.iter().all(|&l| l == block_size));
                prop_assert!(*last > 0 && *last <= block_size);
            }
            prop_assert!(data == src);

            let mapped = MappedFile::open(&path).unwrap();
            prop_assert_eq!(mapped.blocks(block_size).unwrap().len(), lens.len());
        }
    }
}
