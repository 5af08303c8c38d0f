//! The bounded queues connecting pipeline stages
//!
//! A `ChannelTransport` owns four multi-producer/multi-consumer queues
//! (requests, responses, items, errors) of equal capacity. A full queue blocks
//! its senders; that is the only backpressure in the engine.
//!
//! The lifecycle is `Uninitialized -> Initialized -> Closed`. Status reads and
//! the init/close transitions share one reader/writer lock, so an accessor
//! never observes a half-built set of queues.

use crate::model::{Request, Response};
use crate::CrawlError;
use kanal::{AsyncReceiver, AsyncSender};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors returned by transport accessors and transitions
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport is not initialized")]
    Uninitialized,

    #[error("Transport is closed")]
    Closed,

    #[error("Queue capacity must be greater than 0")]
    InvalidCapacity,
}

/// Lifecycle state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Uninitialized,
    Initialized,
    Closed,
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Both ends of one bounded queue
pub struct QueueHandle<T> {
    sender: AsyncSender<T>,
    receiver: AsyncReceiver<T>,
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> QueueHandle<T> {
    fn bounded(capacity: u32) -> Self {
        let (sender, receiver) = kanal::bounded_async(capacity as usize);
        Self { sender, receiver }
    }

    /// A queue whose sends never wait
    pub(crate) fn unbounded() -> Self {
        let (sender, receiver) = kanal::unbounded_async();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> &AsyncSender<T> {
        &self.sender
    }

    pub fn receiver(&self) -> &AsyncReceiver<T> {
        &self.receiver
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn usage(&self, capacity: u32) -> QueueUsage {
        QueueUsage {
            len: self.len(),
            capacity: capacity as usize,
        }
    }

    pub(crate) fn close(&self) {
        let _ = self.sender.close();
    }
}

/// Occupancy of one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueUsage {
    pub len: usize,
    pub capacity: usize,
}

impl fmt::Display for QueueUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.len, self.capacity)
    }
}

/// Best-effort snapshot of a transport; may be stale as soon as it is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSummary {
    pub status: TransportStatus,
    pub requests: QueueUsage,
    pub responses: QueueUsage,
    pub items: QueueUsage,
    pub errors: QueueUsage,
}

impl fmt::Display for TransportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status: {}, request queue: {}, response queue: {}, item queue: {}, error queue: {}",
            self.status, self.requests, self.responses, self.items, self.errors
        )
    }
}

struct Queues<I> {
    requests: QueueHandle<Request>,
    responses: QueueHandle<Response>,
    items: QueueHandle<I>,
    errors: QueueHandle<CrawlError>,
}

impl<I> Queues<I> {
    fn new(capacity: u32) -> Self {
        Self {
            requests: QueueHandle::bounded(capacity),
            responses: QueueHandle::bounded(capacity),
            items: QueueHandle::bounded(capacity),
            errors: QueueHandle::bounded(capacity),
        }
    }

    fn close(&self) {
        self.requests.close();
        self.responses.close();
        self.items.close();
        self.errors.close();
    }
}

struct TransportState<I> {
    status: TransportStatus,
    capacity: u32,
    queues: Option<Queues<I>>,
}

/// Four bounded queues with an explicit lifecycle
pub struct ChannelTransport<I> {
    state: RwLock<TransportState<I>>,
}

impl<I> Default for ChannelTransport<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> ChannelTransport<I> {
    /// Creates an uninitialized transport
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TransportState {
                status: TransportStatus::Uninitialized,
                capacity: 0,
                queues: None,
            }),
        }
    }

    /// Creates a transport and initializes it with `capacity` slots per queue
    pub fn with_capacity(capacity: u32) -> Result<Self, TransportError> {
        let transport = Self::new();
        transport.init(capacity, false)?;
        Ok(transport)
    }

    /// Allocates the four queues
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Queues were (re)allocated
    /// * `Ok(false)` - Already initialized and `reset` is false; nothing changed
    /// * `Err(TransportError::InvalidCapacity)` - `capacity` is 0
    /// * `Err(TransportError::Closed)` - The transport was closed; it cannot be revived
    pub fn init(&self, capacity: u32, reset: bool) -> Result<bool, TransportError> {
        if capacity == 0 {
            return Err(TransportError::InvalidCapacity);
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.status {
            TransportStatus::Closed => return Err(TransportError::Closed),
            TransportStatus::Initialized if !reset => return Ok(false),
            _ => {}
        }

        state.capacity = capacity;
        state.queues = Some(Queues::new(capacity));
        state.status = TransportStatus::Initialized;
        tracing::debug!("Transport initialized with capacity {}", capacity);
        Ok(true)
    }

    /// Closes every queue; returns false unless the transport was initialized
    ///
    /// Only call this once every producer has exited, otherwise pending sends
    /// fail.
    pub fn close(&self) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.status != TransportStatus::Initialized {
            return false;
        }
        if let Some(queues) = &state.queues {
            queues.close();
        }
        state.status = TransportStatus::Closed;
        tracing::debug!("Transport closed");
        true
    }

    pub fn status(&self) -> TransportStatus {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    pub fn capacity(&self) -> u32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    fn with_queues<T>(&self, pick: impl FnOnce(&Queues<I>) -> T) -> Result<T, TransportError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match (state.status, &state.queues) {
            (TransportStatus::Initialized, Some(queues)) => Ok(pick(queues)),
            (TransportStatus::Closed, _) => Err(TransportError::Closed),
            _ => Err(TransportError::Uninitialized),
        }
    }

    pub fn request_queue(&self) -> Result<QueueHandle<Request>, TransportError> {
        self.with_queues(|q| q.requests.clone())
    }

    pub fn response_queue(&self) -> Result<QueueHandle<Response>, TransportError> {
        self.with_queues(|q| q.responses.clone())
    }

    pub fn item_queue(&self) -> Result<QueueHandle<I>, TransportError> {
        self.with_queues(|q| q.items.clone())
    }

    pub fn error_queue(&self) -> Result<QueueHandle<CrawlError>, TransportError> {
        self.with_queues(|q| q.errors.clone())
    }

    /// Returns true if all four queues are empty (or were never allocated)
    pub fn is_drained(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &state.queues {
            Some(q) => {
                q.requests.is_empty()
                    && q.responses.is_empty()
                    && q.items.is_empty()
                    && q.errors.is_empty()
            }
            None => true,
        }
    }

    pub fn summary(&self) -> TransportSummary {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let capacity = state.capacity;
        match &state.queues {
            Some(q) => TransportSummary {
                status: state.status,
                requests: q.requests.usage(capacity),
                responses: q.responses.usage(capacity),
                items: q.items.usage(capacity),
                errors: q.errors.usage(capacity),
            },
            None => TransportSummary {
                status: state.status,
                requests: QueueUsage::default(),
                responses: QueueUsage::default(),
                items: QueueUsage::default(),
                errors: QueueUsage::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestTransport = ChannelTransport<String>;

    #[test]
    fn test_init_rejects_zero_capacity() {
        let transport = TestTransport::new();
        assert_eq!(transport.init(0, false), Err(TransportError::InvalidCapacity));
        assert_eq!(transport.status(), TransportStatus::Uninitialized);
    }

    #[test]
    fn test_init_is_idempotent_without_reset() {
        let transport = TestTransport::new();
        assert_eq!(transport.init(4, false), Ok(true));
        assert_eq!(transport.init(8, false), Ok(false));
        assert_eq!(transport.capacity(), 4);

        assert_eq!(transport.init(8, true), Ok(true));
        assert_eq!(transport.capacity(), 8);
    }

    #[test]
    fn test_accessors_before_init() {
        let transport = TestTransport::new();
        assert_eq!(
            transport.request_queue().err(),
            Some(TransportError::Uninitialized)
        );
        assert_eq!(
            transport.error_queue().err(),
            Some(TransportError::Uninitialized)
        );
    }

    #[test]
    fn test_close_lifecycle() {
        let transport = TestTransport::new();
        assert!(!transport.close(), "close before init must fail");

        transport.init(2, false).unwrap();
        assert!(transport.close());
        assert!(!transport.close());
        assert_eq!(transport.status(), TransportStatus::Closed);
        assert_eq!(
            transport.item_queue().err(),
            Some(TransportError::Closed)
        );
        assert_eq!(transport.init(2, true), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_summary_reports_occupancy() {
        let transport = TestTransport::with_capacity(3).unwrap();
        let items = transport.item_queue().unwrap();
        items.sender().send("one".to_string()).await.unwrap();
        items.sender().send("two".to_string()).await.unwrap();

        let summary = transport.summary();
        assert_eq!(summary.items, QueueUsage { len: 2, capacity: 3 });
        assert_eq!(summary.requests, QueueUsage { len: 0, capacity: 3 });
        assert_eq!(
            summary.to_string(),
            "status: initialized, request queue: 0/3, response queue: 0/3, item queue: 2/3, error queue: 0/3"
        );
        assert!(!transport.is_drained());

        items.receiver().recv().await.unwrap();
        items.receiver().recv().await.unwrap();
        assert!(transport.is_drained());
    }

    #[tokio::test]
    async fn test_queue_is_bounded() {
        let transport = TestTransport::with_capacity(1).unwrap();
        let items = transport.item_queue().unwrap();
        assert!(items.sender().try_send("a".to_string()).unwrap());
        assert!(!items.sender().try_send("b".to_string()).unwrap());
    }

    #[tokio::test]
    async fn test_close_ends_receivers() {
        let transport = TestTransport::with_capacity(2).unwrap();
        let requests = transport.request_queue().unwrap();
        transport.close();
        assert!(requests.receiver().recv().await.is_err());
    }
}
