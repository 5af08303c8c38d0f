//! Crawler module: the pipeline stages and the scheduler that drives them
//!
//! This module contains the core crawling logic, including:
//! - Downloaders wrapping a pluggable transport (HTTP by default)
//! - Analyzers running parse functions and deriving new requests
//! - The item pipeline feeding extracted items through processors
//! - The scheduler wiring all stages to the shared queues

mod analyzer;
mod downloader;
mod parser;
mod pipeline;
mod scheduler;
mod workers;

pub use analyzer::{Analyzer, ParseFn};
pub use downloader::{build_http_client, user_agent_string, Downloader, Transport};
pub use parser::{html_link_parser, PageItem};
pub use pipeline::{ItemPipeline, ItemProcessor, PipelineCounts, PipelineSummary};
pub use scheduler::{ErrorStream, Scheduler, SchedulerStatus};
