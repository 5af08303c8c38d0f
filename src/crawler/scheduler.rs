//! Crawl scheduler: wires the stages together and owns their lifecycle
//!
//! `start` builds a fresh transport, both worker pools and the item pipeline,
//! seeds the request queue and spawns one task per pool slot plus a single
//! request feeder and a single item consumer. The caller then polls `idle`,
//! drains `error_stream`, and finally calls `stop` followed by `shutdown`.

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::coordination::{ChannelTransport, IdIssuer, QueueHandle, ResourcePool, StopCoordinator};
use crate::crawler::workers::{
    run_analyzer, run_downloader, run_item_consumer, run_request_feeder, WorkerContext,
};
use crate::crawler::{Analyzer, Downloader, ItemPipeline, ItemProcessor, ParseFn, Transport};
use crate::model::{Item, Request};
use crate::output::SchedulerSummary;
use crate::{CrawlError, EngineError, EngineResult, TransportError};
use kanal::AsyncReceiver;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Lifecycle state of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    /// Never started
    Idle,
    Running,
    /// Stop was signed; the scheduler may be started again
    Stopped,
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Read side of the shared error queue
pub struct ErrorStream {
    receiver: AsyncReceiver<CrawlError>,
}

impl ErrorStream {
    /// Waits for the next error; None once the run has been shut down
    pub async fn next(&self) -> Option<CrawlError> {
        self.receiver.recv().await.ok()
    }

    /// Takes an error if one is queued, without waiting
    pub fn try_next(&self) -> Option<CrawlError> {
        self.receiver.try_recv().ok().flatten()
    }
}

/// A configured run; kept after shutdown so its counters stay readable
struct Run<C, I> {
    config: CrawlerConfig,
    context: WorkerContext<C, I>,
}

/// Orchestrates one crawl at a time
pub struct Scheduler<C, I> {
    ids: Arc<IdIssuer>,
    stop: Arc<StopCoordinator>,
    transport: Arc<ChannelTransport<I>>,
    run: Option<Run<C, I>>,
    workers: JoinSet<()>,
}

impl<C: Transport, I: Item> Default for Scheduler<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Transport, I: Item> Scheduler<C, I> {
    pub fn new() -> Self {
        Self {
            ids: Arc::new(IdIssuer::new()),
            stop: Arc::new(StopCoordinator::new()),
            transport: Arc::new(ChannelTransport::new()),
            run: None,
            workers: JoinSet::new(),
        }
    }

    /// Builds every component and launches the crawl from `seed`
    ///
    /// Returns as soon as the workers are spawned and the seed is queued. A
    /// stopped scheduler is shut down and re-armed first.
    ///
    /// # Arguments
    ///
    /// * `config` - Queue capacity, pool size, depth limit and fail-fast flag
    /// * `transport_factory` - Called once per downloader
    /// * `parsers` - Run in order against every response
    /// * `processors` - The item processor chain
    /// * `seed` - The first request; always enqueued at depth 0
    ///
    /// # Errors
    ///
    /// * `EngineError::AlreadyRunning` - A crawl is in progress
    /// * `EngineError::InvalidArgument` - Bad sizing, no parsers, or an invalid seed
    pub async fn start<F>(
        &mut self,
        config: &CrawlerConfig,
        transport_factory: F,
        parsers: Vec<Option<ParseFn<I>>>,
        processors: Vec<ItemProcessor<I>>,
        seed: Request,
    ) -> EngineResult<()>
    where
        F: Fn() -> C,
    {
        if self.running() {
            return Err(EngineError::AlreadyRunning);
        }
        validate_crawler_config(config)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        if parsers.is_empty() {
            return Err(EngineError::InvalidArgument(
                "at least one parse function is required".to_string(),
            ));
        }
        if !seed.valid() {
            return Err(EngineError::InvalidArgument(format!(
                "seed request {} is not a valid HTTP(S) request",
                seed.url()
            )));
        }

        if self.run.is_some() {
            self.shutdown().await;
        }
        self.stop.reset();

        let transport = Arc::new(ChannelTransport::with_capacity(config.queue_capacity)?);
        let downloaders = ResourcePool::new(config.pool_size, &self.ids, |id| {
            Downloader::new(id, transport_factory())
        })?;
        let analyzers = ResourcePool::new(config.pool_size, &self.ids, Analyzer::new)?;
        let pipeline = ItemPipeline::new(processors);
        pipeline.set_fail_fast(config.fail_fast);

        let context = WorkerContext {
            staged: QueueHandle::unbounded(),
            requests: transport.request_queue()?,
            responses: transport.response_queue()?,
            items: transport.item_queue()?,
            errors: transport.error_queue()?,
            downloaders: Arc::new(downloaders),
            analyzers: Arc::new(analyzers),
            pipeline: Arc::new(pipeline),
            parsers: parsers.into(),
            stop: Arc::clone(&self.stop),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_depth: config.max_depth,
        };

        // Fresh queue with capacity >= 1: room for the seed is guaranteed
        let seed = seed.with_depth(0);
        tracing::info!("Seeding crawl with {}", seed.url());
        context.in_flight.fetch_add(1, Ordering::SeqCst);
        if !matches!(context.requests.sender().try_send(seed), Ok(true)) {
            return Err(TransportError::Closed.into());
        }

        for slot in 0..config.pool_size {
            self.workers
                .spawn(run_downloader(context.clone(), format!("downloader-{}", slot)));
            self.workers
                .spawn(run_analyzer(context.clone(), format!("analyzer-{}", slot)));
        }
        self.workers
            .spawn(run_request_feeder(context.clone(), "request-feeder".to_string()));
        self.workers
            .spawn(run_item_consumer(context.clone(), "item-pipeline".to_string()));

        self.transport = transport;
        self.run = Some(Run {
            config: *config,
            context,
        });

        tracing::info!(
            "Scheduler started: {} downloaders, {} analyzers, queue capacity {}, max depth {}",
            config.pool_size,
            config.pool_size,
            config.queue_capacity,
            config.max_depth
        );
        Ok(())
    }

    /// Signs the stop; true only for the call that moved Running to Stopped
    ///
    /// Workers exit cooperatively. Use `shutdown` to wait for them.
    pub fn stop(&self) -> bool {
        if !self.running() {
            return false;
        }
        let signed = self.stop.sign();
        if signed {
            tracing::info!("Scheduler stop signed");
        }
        signed
    }

    /// Waits for every worker to exit, then closes the pools and the transport
    ///
    /// Signs the stop if nobody has yet. Errors still queued are discarded, so
    /// drain `error_stream` first if they matter.
    pub async fn shutdown(&mut self) {
        let Some(run) = &self.run else {
            return;
        };

        self.stop.sign();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        run.context.staged.close();
        run.context.downloaders.close();
        run.context.analyzers.close();
        if self.transport.close() {
            tracing::info!("Scheduler shut down ({})", self.stop.summary());
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        match (&self.run, self.stop.signed()) {
            (None, _) => SchedulerStatus::Idle,
            (Some(_), false) => SchedulerStatus::Running,
            (Some(_), true) => SchedulerStatus::Stopped,
        }
    }

    pub fn running(&self) -> bool {
        self.status() == SchedulerStatus::Running
    }

    /// True once nothing is queued, checked out, or in flight
    ///
    /// Queued errors count as pending work; drain the error stream to let the
    /// scheduler go idle.
    pub fn idle(&self) -> bool {
        let Some(run) = &self.run else {
            return true;
        };
        let ctx = &run.context;

        self.transport.is_drained()
            && ctx.staged.is_empty()
            && ctx.downloaders.used() == 0
            && ctx.analyzers.used() == 0
            && ctx.pipeline.processing_number() == 0
            && ctx.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Read-only view of the error queue of the current run
    pub fn error_stream(&self) -> EngineResult<ErrorStream> {
        if self.run.is_none() {
            return Err(EngineError::NotStarted);
        }
        let errors = self.transport.error_queue()?;
        Ok(ErrorStream {
            receiver: errors.receiver().clone(),
        })
    }

    /// The item pipeline of the current (or last) run
    pub fn pipeline(&self) -> Option<&ItemPipeline<I>> {
        self.run.as_ref().map(|run| run.context.pipeline.as_ref())
    }

    pub fn stop_coordinator(&self) -> &StopCoordinator {
        &self.stop
    }

    pub fn summary(&self, prefix: &str) -> SchedulerSummary {
        let run = self.run.as_ref();
        SchedulerSummary {
            prefix: prefix.to_string(),
            status: self.status(),
            config: run.map(|r| r.config),
            stop: self.stop.summary(),
            transport: self.transport.summary(),
            staged: run.map(|r| r.context.staged.len()).unwrap_or(0),
            downloaders: run.map(|r| r.context.downloaders.summary()),
            analyzers: run.map(|r| r.context.analyzers.summary()),
            pipeline: run.map(|r| r.context.pipeline.summary()),
            in_flight: run
                .map(|r| r.context.in_flight.load(Ordering::SeqCst))
                .unwrap_or(0),
        }
    }
}
