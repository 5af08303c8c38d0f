//! Ripple: a concurrent web-crawling engine
//!
//! This crate fans crawl work across a bounded pipeline of download and analysis
//! stages connected by bounded queues, expands discovered requests up to a depth
//! limit, and feeds extracted items through an ordered processing chain.

pub mod config;
pub mod coordination;
pub mod crawler;
pub mod model;
pub mod output;

use std::fmt;
use thiserror::Error;

pub use coordination::{PoolError, TransportError};

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler has not been started")]
    NotStarted,

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// The pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Download,
    Analyze,
    ItemProcess,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Download => "downloader error",
            Self::Analyze => "analyzer error",
            Self::ItemProcess => "item processor error",
        };
        f.write_str(name)
    }
}

/// A failure of a single unit of work, carried on the error queue
///
/// None of these abort a crawl run: the worker that produced one forwards it
/// and moves on to its next unit of work.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrawlError {
    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("Analysis failed: {0}")]
    Analyze(String),

    #[error("Item processing failed: {0}")]
    ItemProcess(String),
}

impl CrawlError {
    /// Returns the stage this error was raised by
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Download { .. } => ErrorKind::Download,
            Self::Analyze(_) => ErrorKind::Analyze,
            Self::ItemProcess(_) => ErrorKind::ItemProcess,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    html_link_parser, Analyzer, Downloader, ItemPipeline, ItemProcessor, PageItem, ParseFn,
    Scheduler, SchedulerStatus, Transport,
};
pub use model::{Item, Parsed, Request, Response};
