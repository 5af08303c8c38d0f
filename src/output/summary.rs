//! Point-in-time snapshot of a scheduler and every component it owns

use crate::config::CrawlerConfig;
use crate::coordination::{PoolSummary, TransportSummary};
use crate::crawler::{PipelineSummary, SchedulerStatus};
use std::fmt;

/// Snapshot returned by `Scheduler::summary`
///
/// Components that only exist while a run is set up (pools, pipeline) are
/// `None` before the first `start`.
#[derive(Debug, Clone)]
pub struct SchedulerSummary {
    /// Prepended to every line of `detail()`
    pub prefix: String,
    pub status: SchedulerStatus,
    pub config: Option<CrawlerConfig>,
    pub stop: String,
    pub transport: TransportSummary,
    /// Derived requests waiting to enter the request queue
    pub staged: usize,
    pub downloaders: Option<PoolSummary>,
    pub analyzers: Option<PoolSummary>,
    pub pipeline: Option<PipelineSummary>,
    pub in_flight: usize,
}

fn or_none<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "none".to_string(),
    }
}

impl SchedulerSummary {
    /// Multi-line rendering of every component
    pub fn detail(&self) -> String {
        let config = match &self.config {
            Some(c) => format!(
                "queue capacity: {}, pool size: {}, max depth: {}, fail fast: {}",
                c.queue_capacity, c.pool_size, c.max_depth, c.fail_fast
            ),
            None => "none".to_string(),
        };

        let lines = [
            format!("status: {}", self.status),
            format!("config: {}", config),
            format!("stop sign: {}", self.stop),
            format!("transport: {}", self.transport),
            format!("staged requests: {}", self.staged),
            format!("downloaders: {}", or_none(&self.downloaders)),
            format!("analyzers: {}", or_none(&self.analyzers)),
            format!("item pipeline: {}", or_none(&self.pipeline)),
            format!("in flight: {}", self.in_flight),
        ];

        lines
            .iter()
            .map(|line| format!("{}{}\n", self.prefix, line))
            .collect()
    }

    /// Compares rendered detail, not live state
    pub fn same(&self, other: &SchedulerSummary) -> bool {
        self.detail() == other.detail()
    }
}

impl fmt::Display for SchedulerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}status: {}, downloaders: {}, analyzers: {}, in flight: {}",
            self.prefix,
            self.status,
            or_none(&self.downloaders),
            or_none(&self.analyzers),
            self.in_flight
        )
    }
}
