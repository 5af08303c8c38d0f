//! Item pipeline: the ordered processor chain every extracted item runs through

use crate::model::Item;
use crate::CrawlError;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A caller-supplied processing step
///
/// Returns the item handed to the next processor. `Ok(None)` means the
/// processor produced nothing usable, which halts the chain for that item.
pub type ItemProcessor<I> = Arc<dyn Fn(&I) -> anyhow::Result<Option<I>> + Send + Sync>;

/// Running totals of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineCounts {
    /// Items handed to `send`
    pub sent: u64,
    /// Items that passed the validity check
    pub accepted: u64,
    /// Items that went through the whole chain without halting
    pub processed: u64,
}

/// Ordered chain of item processors
pub struct ItemPipeline<I> {
    processors: Vec<ItemProcessor<I>>,
    fail_fast: AtomicBool,
    sent: AtomicU64,
    accepted: AtomicU64,
    processed: AtomicU64,
    processing: AtomicU64,
}

/// Decrements the in-chain gauge when an item leaves `send`, on every path
struct ProcessingGuard<'a>(&'a AtomicU64);

impl<'a> ProcessingGuard<'a> {
    fn enter(gauge: &'a AtomicU64) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<I: Item> ItemPipeline<I> {
    pub fn new(processors: Vec<ItemProcessor<I>>) -> Self {
        Self {
            processors,
            fail_fast: AtomicBool::new(false),
            sent: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            processing: AtomicU64::new(0),
        }
    }

    /// Runs `item` through the processor chain
    ///
    /// # Returns
    ///
    /// Every error raised while processing this item. An empty list means the
    /// item went through the whole chain cleanly.
    pub fn send(&self, item: I) -> Vec<CrawlError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        let mut errors = Vec::new();

        if !item.is_valid() {
            errors.push(CrawlError::ItemProcess(format!("invalid item: {:?}", item)));
            return errors;
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);

        let _guard = ProcessingGuard::enter(&self.processing);
        let fail_fast = self.fail_fast();
        let mut current = item;

        for (index, processor) in self.processors.iter().enumerate() {
            match processor(&current) {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    errors.push(CrawlError::ItemProcess(format!(
                        "processed item missing after processor {}",
                        index
                    )));
                    return errors;
                }
                Err(e) => {
                    errors.push(CrawlError::ItemProcess(format!(
                        "processor {}: {:#}",
                        index, e
                    )));
                    if fail_fast {
                        return errors;
                    }
                }
            }
        }

        self.processed.fetch_add(1, Ordering::SeqCst);
        errors
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::SeqCst)
    }

    pub fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::SeqCst);
    }

    pub fn count(&self) -> PipelineCounts {
        PipelineCounts {
            sent: self.sent.load(Ordering::SeqCst),
            accepted: self.accepted.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
        }
    }

    /// Number of items currently inside the processor chain
    pub fn processing_number(&self) -> u64 {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            fail_fast: self.fail_fast(),
            processors: self.processors.len(),
            counts: self.count(),
            processing: self.processing_number(),
        }
    }
}

/// Snapshot of a pipeline's settings and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub fail_fast: bool,
    pub processors: usize,
    pub counts: PipelineCounts,
    pub processing: u64,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fail fast: {}, processors: {}, sent: {}, accepted: {}, processed: {}, processing: {}",
            self.fail_fast,
            self.processors,
            self.counts.sent,
            self.counts.accepted,
            self.counts.processed,
            self.processing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        value: i64,
    }

    impl Item for Record {
        fn is_valid(&self) -> bool {
            self.value >= 0
        }
    }

    fn add(n: i64) -> ItemProcessor<Record> {
        Arc::new(move |r: &Record| Ok(Some(Record { value: r.value + n })))
    }

    fn failing() -> ItemProcessor<Record> {
        Arc::new(|_: &Record| anyhow::bail!("rejected"))
    }

    /// Records the value it was given so tests can observe the chain
    fn tally(seen: Arc<AtomicUsize>) -> ItemProcessor<Record> {
        Arc::new(move |r: &Record| {
            seen.store(r.value as usize, Ordering::SeqCst);
            Ok(Some(r.clone()))
        })
    }

    #[test]
    fn test_valid_item_runs_whole_chain() {
        let seen = Arc::new(AtomicUsize::new(0));
        let pipeline = ItemPipeline::new(vec![add(1), add(10), tally(Arc::clone(&seen))]);

        let errors = pipeline.send(Record { value: 1 });
        assert!(errors.is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 12);
        assert_eq!(
            pipeline.count(),
            PipelineCounts {
                sent: 1,
                accepted: 1,
                processed: 1
            }
        );
        assert_eq!(pipeline.processing_number(), 0);
    }

    #[test]
    fn test_invalid_item_is_sent_but_not_accepted() {
        let pipeline = ItemPipeline::new(vec![add(1)]);
        let errors = pipeline.send(Record { value: -1 });

        assert!(!errors.is_empty());
        let counts = pipeline.count();
        assert_eq!(counts.sent, 1);
        assert_eq!(counts.accepted, 0);
        assert_eq!(counts.processed, 0);
    }

    #[test]
    fn test_fail_fast_halts_chain() {
        let seen = Arc::new(AtomicUsize::new(0));
        let pipeline = ItemPipeline::new(vec![add(1), failing(), tally(Arc::clone(&seen))]);
        pipeline.set_fail_fast(true);
        assert!(pipeline.fail_fast());

        let errors = pipeline.send(Record { value: 5 });
        assert_eq!(errors.len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0, "later processors must not run");
        assert_eq!(pipeline.count().processed, 0);
    }

    #[test]
    fn test_without_fail_fast_chain_continues_from_last_good_item() {
        let seen = Arc::new(AtomicUsize::new(0));
        let pipeline = ItemPipeline::new(vec![add(1), failing(), tally(Arc::clone(&seen))]);

        let errors = pipeline.send(Record { value: 5 });
        assert_eq!(
            errors,
            vec![CrawlError::ItemProcess("processor 1: rejected".to_string())]
        );
        assert_eq!(seen.load(Ordering::SeqCst), 6);
        assert_eq!(pipeline.count().processed, 1);
    }

    #[test]
    fn test_missing_output_stops_chain() {
        let seen = Arc::new(AtomicUsize::new(0));
        let vanish: ItemProcessor<Record> = Arc::new(|_: &Record| Ok(None));
        let pipeline = ItemPipeline::new(vec![vanish, tally(Arc::clone(&seen))]);

        let errors = pipeline.send(Record { value: 3 });
        assert_eq!(
            errors,
            vec![CrawlError::ItemProcess(
                "processed item missing after processor 0".to_string()
            )]
        );
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.processing_number(), 0);
    }

    #[test]
    fn test_summary() {
        let pipeline = ItemPipeline::new(vec![add(1)]);
        pipeline.send(Record { value: 0 });
        assert_eq!(
            pipeline.summary().to_string(),
            "fail fast: false, processors: 1, sent: 1, accepted: 1, processed: 1, processing: 0"
        );
    }
}
