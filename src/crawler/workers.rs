//! Stage worker loops
//!
//! Every loop follows the same shape: wait for a unit of work (or the stop
//! signal), check out a pooled worker, process, give the worker back, then
//! forward results downstream. Sends block on full queues but still observe the
//! stop signal, so a stopped run never leaves a task parked forever.
//!
//! Derived requests never go straight into the bounded request queue. Analyzers
//! stage them on an unbounded queue and a single feeder moves them across, so
//! an analyzer never waits on downloaders that are themselves waiting on
//! analyzers.
//!
//! Each queued request, response and item counts as one unit in flight from
//! the moment it is enqueued until its consumer has finished with it. Children
//! are counted before their parent is released, so the counter only reaches
//! zero once the crawl has nothing left to do.

use crate::coordination::{QueueHandle, ResourcePool, StopCoordinator, StopSignal};
use crate::crawler::{Analyzer, Downloader, ItemPipeline, ParseFn, Transport};
use crate::model::{Item, Parsed, Request, Response};
use crate::CrawlError;
use kanal::{AsyncReceiver, AsyncSender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Everything a worker loop shares with its siblings
pub(crate) struct WorkerContext<C, I> {
    /// Unbounded; drained into `requests` by the feeder
    pub staged: QueueHandle<Request>,
    pub requests: QueueHandle<Request>,
    pub responses: QueueHandle<Response>,
    pub items: QueueHandle<I>,
    pub errors: QueueHandle<CrawlError>,
    pub downloaders: Arc<ResourcePool<Downloader<C>>>,
    pub analyzers: Arc<ResourcePool<Analyzer>>,
    pub pipeline: Arc<ItemPipeline<I>>,
    pub parsers: Arc<[Option<ParseFn<I>>]>,
    pub stop: Arc<StopCoordinator>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_depth: u32,
}

impl<C, I> Clone for WorkerContext<C, I> {
    fn clone(&self) -> Self {
        Self {
            staged: self.staged.clone(),
            requests: self.requests.clone(),
            responses: self.responses.clone(),
            items: self.items.clone(),
            errors: self.errors.clone(),
            downloaders: Arc::clone(&self.downloaders),
            analyzers: Arc::clone(&self.analyzers),
            pipeline: Arc::clone(&self.pipeline),
            parsers: Arc::clone(&self.parsers),
            stop: Arc::clone(&self.stop),
            in_flight: Arc::clone(&self.in_flight),
            max_depth: self.max_depth,
        }
    }
}

/// Waits for the next value, or None once stopped or the queue is closed
async fn receive<T>(receiver: &AsyncReceiver<T>, signal: &mut StopSignal) -> Option<T> {
    tokio::select! {
        biased;
        _ = signal.raised() => None,
        received = receiver.recv() => received.ok(),
    }
}

/// Sends `value`, waiting for room; false if stopped or the queue is closed
async fn forward<T>(sender: &AsyncSender<T>, value: T, signal: &mut StopSignal) -> bool {
    tokio::select! {
        biased;
        _ = signal.raised() => false,
        sent = sender.send(value) => sent.is_ok(),
    }
}

impl<C: Transport, I: Item> WorkerContext<C, I> {
    /// Enqueues one unit of work, counting it in flight first
    async fn enqueue<T>(&self, sender: &AsyncSender<T>, value: T, signal: &mut StopSignal) -> bool {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if forward(sender, value, signal).await {
            true
        } else {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    async fn report(&self, error: CrawlError, signal: &mut StopSignal) -> bool {
        tracing::debug!(kind = %error.kind(), "{}", error);
        forward(self.errors.sender(), error, signal).await
    }

    /// Releases the unit a worker just finished with
    fn finish_unit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Derived requests beyond the depth limit are dropped without error
    fn admit(&self, request: &Request) -> Result<bool, CrawlError> {
        if request.depth() > self.max_depth {
            tracing::trace!(
                depth = request.depth(),
                max_depth = self.max_depth,
                "Dropping {}",
                request.url()
            );
            return Ok(false);
        }
        if !request.valid() {
            return Err(CrawlError::Analyze(format!(
                "derived request {} is not a valid HTTP(S) request",
                request.url()
            )));
        }
        Ok(true)
    }
}

/// Downloader slot: request -> response
pub(crate) async fn run_downloader<C: Transport, I: Item>(ctx: WorkerContext<C, I>, code: String) {
    let mut signal = ctx.stop.subscribe();

    while let Some(request) = receive(ctx.requests.receiver(), &mut signal).await {
        if ctx.stop.signed() {
            ctx.finish_unit();
            break;
        }

        let downloader = tokio::select! {
            biased;
            _ = signal.raised() => None,
            taken = ctx.downloaders.take() => taken.ok(),
        };
        let Some(downloader) = downloader else {
            ctx.finish_unit();
            break;
        };

        let result = downloader.download(&request).await;
        if let Err(e) = ctx.downloaders.give_back(downloader) {
            tracing::warn!("Failed to return downloader: {}", e);
        }

        let delivered = match result {
            Ok(response) => {
                ctx.enqueue(ctx.responses.sender(), response, &mut signal)
                    .await
            }
            Err(error) => ctx.report(error, &mut signal).await,
        };
        ctx.finish_unit();
        if !delivered {
            break;
        }
    }

    ctx.stop.deal(&code);
    tracing::debug!("Worker {} exited", code);
}

/// Analyzer slot: response -> derived requests and items
pub(crate) async fn run_analyzer<C: Transport, I: Item>(ctx: WorkerContext<C, I>, code: String) {
    let mut signal = ctx.stop.subscribe();

    'units: while let Some(response) = receive(ctx.responses.receiver(), &mut signal).await {
        if ctx.stop.signed() {
            ctx.finish_unit();
            break;
        }

        let analyzer = tokio::select! {
            biased;
            _ = signal.raised() => None,
            taken = ctx.analyzers.take() => taken.ok(),
        };
        let Some(analyzer) = analyzer else {
            ctx.finish_unit();
            break;
        };

        let (values, errors) = analyzer.analyze(&ctx.parsers[..], &response);
        if let Err(e) = ctx.analyzers.give_back(analyzer) {
            tracing::warn!("Failed to return analyzer: {}", e);
        }

        for value in values {
            let delivered = match value {
                Parsed::Request(request) => match ctx.admit(&request) {
                    Ok(true) => {
                        ctx.enqueue(ctx.staged.sender(), request, &mut signal)
                            .await
                    }
                    Ok(false) => true,
                    Err(error) => ctx.report(error, &mut signal).await,
                },
                Parsed::Item(item) => ctx.enqueue(ctx.items.sender(), item, &mut signal).await,
            };
            if !delivered {
                ctx.finish_unit();
                break 'units;
            }
        }

        for error in errors {
            if !ctx.report(error, &mut signal).await {
                ctx.finish_unit();
                break 'units;
            }
        }

        ctx.finish_unit();
    }

    ctx.stop.deal(&code);
    tracing::debug!("Worker {} exited", code);
}

/// Single request feeder: staged requests -> bounded request queue
///
/// A staged request is already counted in flight; moving it does not change
/// the count.
pub(crate) async fn run_request_feeder<C: Transport, I: Item>(
    ctx: WorkerContext<C, I>,
    code: String,
) {
    let mut signal = ctx.stop.subscribe();

    while let Some(request) = receive(ctx.staged.receiver(), &mut signal).await {
        if !forward(ctx.requests.sender(), request, &mut signal).await {
            ctx.finish_unit();
            break;
        }
    }

    ctx.stop.deal(&code);
    tracing::debug!("Worker {} exited", code);
}

/// Single item consumer: item -> processor chain
pub(crate) async fn run_item_consumer<C: Transport, I: Item>(
    ctx: WorkerContext<C, I>,
    code: String,
) {
    let mut signal = ctx.stop.subscribe();

    'units: while let Some(item) = receive(ctx.items.receiver(), &mut signal).await {
        if ctx.stop.signed() {
            ctx.finish_unit();
            break;
        }

        for error in ctx.pipeline.send(item) {
            if !ctx.report(error, &mut signal).await {
                ctx.finish_unit();
                break 'units;
            }
        }

        ctx.finish_unit();
    }

    ctx.stop.deal(&code);
    tracing::debug!("Worker {} exited", code);
}
