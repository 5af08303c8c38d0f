//! Concurrency substrate shared by every pipeline stage
//!
//! This module provides:
//! - `IdIssuer`: monotonic ids for pooled entities
//! - `ResourcePool`: fixed-capacity pool with exclusive checkout
//! - `ChannelTransport`: the four bounded queues connecting stages
//! - `StopCoordinator`: cooperative stop flag and acknowledgement ledger

mod channels;
mod id_issuer;
mod pool;
mod stop;

pub use channels::{
    ChannelTransport, QueueHandle, QueueUsage, TransportError, TransportStatus, TransportSummary,
};
pub use id_issuer::IdIssuer;
pub use pool::{Identifiable, PoolError, PoolSummary, ResourcePool};
pub use stop::{StopCoordinator, StopSignal};
