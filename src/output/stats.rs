//! Crawl statistics gathered at the end of a run
//!
//! This module provides functionality for tallying the pipeline counters and
//! the errors drained from the error stream, and for displaying them.

use crate::crawler::PipelineCounts;
use crate::{CrawlError, ErrorKind};
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Item pipeline totals
    pub items: PipelineCounts,

    /// Errors seen on the error stream, by originating stage
    pub errors_by_kind: HashMap<ErrorKind, u64>,
}

impl CrawlStatistics {
    pub fn new(items: PipelineCounts) -> Self {
        Self {
            items,
            errors_by_kind: HashMap::new(),
        }
    }

    pub fn record_error(&mut self, error: &CrawlError) {
        *self.errors_by_kind.entry(error.kind()).or_insert(0) += 1;
    }

    pub fn total_errors(&self) -> u64 {
        self.errors_by_kind.values().sum()
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Items:");
    println!("  Sent to pipeline: {}", stats.items.sent);
    println!("  Accepted: {}", stats.items.accepted);
    println!("  Fully processed: {}", stats.items.processed);
    println!();

    if !stats.errors_by_kind.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let success_rate = if stats.items.sent > 0 {
        (stats.items.processed as f64 / stats.items.sent as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} items fully processed)",
        success_rate, stats.items.processed, stats.items.sent
    );
}
