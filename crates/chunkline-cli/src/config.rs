//! Configuration system for the Chunkline CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted chunk or block size (1 GiB)
const MAX_BUFFER_SIZE: usize = 1024 * 1024 * 1024;

/// Chunkline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Write-side configuration
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Read-side configuration
    #[serde(default)]
    pub read: ReadConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Write-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Chunk size in bytes (also the buffer pool capacity)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Writer worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded queue depth between producer and writer
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Overall deadline for a copy, in seconds (0 = none)
    #[serde(default)]
    pub timeout_secs: u64,
}

/// Read-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Block size in bytes for mapped reads
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_chunk_size() -> usize {
    chunkline_files::DEFAULT_CHUNK_SIZE
}

fn default_workers() -> usize {
    chunkline_files::DEFAULT_WORKERS
}

fn default_queue_depth() -> usize {
    chunkline_files::DEFAULT_QUEUE_DEPTH
}

fn default_block_size() -> usize {
    chunkline_files::DEFAULT_CHUNK_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            workers: default_workers(),
            queue_depth: default_queue_depth(),
            timeout_secs: 0,
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TransferConfig {
    /// Copy deadline, if one is configured
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("chunkline/config.toml")
    }

    /// Load `path` if given, else the default path, else built-in defaults
    ///
    /// An explicitly given path must exist; the default path may not.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        if self.transfer.chunk_size == 0 || self.transfer.chunk_size > MAX_BUFFER_SIZE {
            anyhow::bail!("Chunk size must be between 1 byte and 1GB");
        }

        if self.read.block_size == 0 || self.read.block_size > MAX_BUFFER_SIZE {
            anyhow::bail!("Block size must be between 1 byte and 1GB");
        }

        if self.transfer.workers == 0 || self.transfer.workers > 256 {
            anyhow::bail!("Workers must be between 1 and 256");
        }

        if self.transfer.queue_depth == 0 || self.transfer.queue_depth > 4096 {
            anyhow::bail!("Queue depth must be between 1 and 4096");
        }

        Ok(())
    }
}
