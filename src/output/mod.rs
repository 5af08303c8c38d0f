//! Output module for reporting on a crawl
//!
//! This module handles:
//! - Rendering scheduler summaries for diagnostics
//! - Recording and printing end-of-run statistics

pub mod stats;
mod summary;

pub use stats::{print_statistics, CrawlStatistics};
pub use summary::SchedulerSummary;
