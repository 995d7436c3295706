//! Chunkline CLI
//!
//! Drives the Chunkline file engine: rebuild files from chunk streams and
//! stream them back through memory-mapped block reads.

mod config;
mod progress;

use anyhow::Context;
use chunkline_files::chunker::{ChunkPlan, produce_from_file};
use chunkline_files::hasher::{digest_file, files_match, hash_file, to_hex};
use chunkline_files::{BufferPool, CancellationToken, ConcurrentWriter, FileError, WriterConfig};
use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use config::Config;
use progress::{TransferProgress, format_bytes, format_duration, format_speed};

/// Chunkline - concurrent chunked writes and zero-copy mapped reads
#[derive(Parser)]
#[command(name = "chunkline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild a file from a chunk stream and verify the result
    Copy {
        /// Source file
        #[arg(required = true)]
        source: PathBuf,

        /// Destination file (created or truncated)
        #[arg(required = true)]
        destination: PathBuf,

        /// Deliver chunks in random order
        #[arg(long)]
        shuffle: bool,

        /// Abort after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Override the worker count
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip the post-copy hash comparison
        #[arg(long)]
        no_verify: bool,
    },

    /// Stream a file through mapped blocks and print its hash
    Read {
        /// File to read
        #[arg(required = true)]
        path: PathBuf,

        /// Override the block size in bytes
        #[arg(short, long)]
        block_size: Option<usize>,
    },

    /// Compare two files by BLAKE3 hash
    Verify {
        /// First file
        #[arg(required = true)]
        first: PathBuf,

        /// Second file
        #[arg(required = true)]
        second: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Also save it to the config path
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.to_lowercase())
        .init();

    match cli.command {
        Commands::Copy {
            source,
            destination,
            shuffle,
            timeout,
            workers,
            no_verify,
        } => {
            if let Some(workers) = workers {
                config.transfer.workers = workers;
                config.validate()?;
            }
            let timeout = timeout
                .map(Duration::from_secs)
                .or_else(|| config.transfer.timeout());
            copy_file(source, destination, shuffle, timeout, !no_verify, &config).await?;
        }
        Commands::Read { path, block_size } => {
            if let Some(block_size) = block_size {
                config.read.block_size = block_size;
                config.validate()?;
            }
            read_file(path, &config).await?;
        }
        Commands::Verify { first, second } => {
            verify_files(first, second, &config).await?;
        }
        Commands::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if save {
                let path = cli.config.unwrap_or_else(Config::default_path);
                config.save(&path)?;
                println!("Saved to {}", path.display());
            }
        }
    }

    Ok(())
}

/// Rebuild `destination` from chunks of `source`
async fn copy_file(
    source: PathBuf,
    destination: PathBuf,
    shuffle: bool,
    timeout: Option<Duration>,
    verify: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let total_size = std::fs::metadata(&source)
        .with_context(|| format!("File not found: {}", source.display()))?
        .len();
    let label = display_name(&source);

    tracing::info!(
        "Copying {:?} -> {:?} ({} bytes, shuffle: {})",
        source,
        destination,
        total_size,
        shuffle
    );

    println!("Source: {}", source.display());
    println!("Destination: {}", destination.display());
    println!("Size: {}", format_bytes(total_size));
    println!(
        "Chunk size: {} x {} workers",
        format_bytes(config.transfer.chunk_size as u64),
        config.transfer.workers
    );

    let token = match timeout {
        Some(timeout) => CancellationToken::with_timeout(timeout),
        None => CancellationToken::new(),
    };
    let pool = Arc::new(BufferPool::new(config.transfer.chunk_size));
    let plan = ChunkPlan::new(total_size, config.transfer.chunk_size)?;

    let mut spans: Vec<_> = plan.spans().collect();
    if shuffle {
        spans.shuffle(&mut rand::thread_rng());
    }

    let (tx, rx) = crossbeam_channel::bounded(config.transfer.queue_depth);
    let progress = TransferProgress::new(total_size, &label);

    let producer = {
        let pool = pool.clone();
        let source = source.clone();
        let bar = progress.handle();
        tokio::task::spawn_blocking(move || {
            produce_from_file(&pool, &source, spans, tx, |span| bar.inc(span.len as u64))
        })
    };

    let mut writer_task = {
        let writer = ConcurrentWriter::new(
            WriterConfig {
                workers: config.transfer.workers,
            },
            pool.clone(),
        );
        let token = token.clone();
        let destination = destination.clone();
        tokio::task::spawn_blocking(move || writer.write(&token, &destination, rx, total_size))
    };

    let written = tokio::select! {
        res = &mut writer_task => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling copy");
            token.cancel();
            writer_task.await?
        }
    };

    let produced = producer.await?;

    let report = match written {
        Ok(report) => report,
        Err(e) => {
            progress.abandon();
            tracing::error!("Copy failed with {} error(s)", e.count());
            return Err(anyhow::Error::new(e).context("Concurrent write failed"));
        }
    };
    produced.context("Chunk producer failed")?;

    progress.finish_with_message(format!(
        "Wrote {} chunks in {} ({})",
        report.chunks_written,
        format_duration(report.elapsed),
        format_speed(report.bytes_per_second())
    ));

    let stats = pool.stats();
    tracing::debug!(
        "Buffer pool: {} allocated, {} reused, {} admitted, {} rejected",
        stats.allocated,
        stats.reused,
        stats.admitted,
        stats.rejected
    );

    if verify {
        let block_size = config.read.block_size;
        let matched = tokio::task::spawn_blocking(move || {
            files_match(&source, &destination, block_size)
        })
        .await??;

        if !matched {
            anyhow::bail!("Verification failed: destination differs from source");
        }
        println!("Verified: contents match");
    }

    Ok(())
}

/// Stream `path` through the mapped reader and print a summary
async fn read_file(path: PathBuf, config: &Config) -> anyhow::Result<()> {
    let block_size = config.read.block_size;
    tracing::info!("Reading {:?} in blocks of {} bytes", path, block_size);

    let start = Instant::now();
    let digest = tokio::task::spawn_blocking(move || digest_file(&path, block_size)).await??;

    println!("Blocks: {}", digest.blocks);
    println!("Bytes: {} ({})", format_bytes(digest.bytes), digest.bytes);
    println!("BLAKE3: {}", to_hex(&digest.hash));
    println!("Elapsed: {}", format_duration(start.elapsed()));

    Ok(())
}

/// Compare two files by hash
async fn verify_files(first: PathBuf, second: PathBuf, config: &Config) -> anyhow::Result<()> {
    let block_size = config.read.block_size;

    let (a, b) = tokio::task::spawn_blocking(move || {
        Ok::<_, FileError>((hash_file(&first, block_size)?, hash_file(&second, block_size)?))
    })
    .await??;

    println!("First:  {}", to_hex(&a));
    println!("Second: {}", to_hex(&b));

    if a != b {
        anyhow::bail!("Files differ");
    }
    println!("Files match");
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}
