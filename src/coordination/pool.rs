//! Fixed-capacity pool of reusable workers
//!
//! Entities are built eagerly at construction and cycle between "available"
//! and "checked out" for the lifetime of the pool. Availability is a bounded
//! channel holding the idle entities; a small id map records which ids are
//! currently available so misuse of `give_back` is detected.

use crate::coordination::IdIssuer;
use kanal::{AsyncReceiver, AsyncSender};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// A pooled entity with a stable identity
pub trait Identifiable {
    fn id(&self) -> u32;
}

/// Errors returned by pool operations
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool size cannot be 0")]
    ZeroSize,

    #[error("Entity id {0} was issued twice")]
    DuplicateId(u32),

    #[error("Entity {0} does not belong to this pool")]
    ForeignEntity(u32),

    #[error("Entity {0} has already been returned")]
    AlreadyReturned(u32),

    #[error("Pool has been closed")]
    Closed,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub total: u32,
    pub used: u32,
}

impl fmt::Display for PoolSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.used, self.total)
    }
}

/// Pool of exactly `total` entities of one concrete type
pub struct ResourcePool<E> {
    total: u32,
    available_tx: AsyncSender<E>,
    available_rx: AsyncReceiver<E>,
    /// id -> true while the entity sits in the availability channel
    ids: Mutex<HashMap<u32, bool>>,
}

impl<E> ResourcePool<E>
where
    E: Identifiable + Send + 'static,
{
    /// Builds a pool of `total` entities
    ///
    /// `factory` is called once per slot with a fresh id from `ids`.
    ///
    /// # Errors
    ///
    /// * `PoolError::ZeroSize` - `total` is 0
    /// * `PoolError::DuplicateId` - the factory produced an id already in the pool
    ///
    /// # Example
    ///
    /// ```
    /// use ripple_engine::coordination::{IdIssuer, Identifiable, ResourcePool};
    ///
    /// struct Slot(u32);
    ///
    /// impl Identifiable for Slot {
    ///     fn id(&self) -> u32 {
    ///         self.0
    ///     }
    /// }
    ///
    /// let pool = ResourcePool::new(3, &IdIssuer::new(), Slot).unwrap();
    /// assert_eq!(pool.total(), 3);
    /// assert_eq!(pool.used(), 0);
    /// ```
    pub fn new<F>(total: u32, ids: &IdIssuer, mut factory: F) -> Result<Self, PoolError>
    where
        F: FnMut(u32) -> E,
    {
        if total == 0 {
            return Err(PoolError::ZeroSize);
        }

        let (available_tx, available_rx) = kanal::bounded_async(total as usize);
        let mut registry = HashMap::with_capacity(total as usize);

        for _ in 0..total {
            let entity = factory(ids.next_id());
            let id = entity.id();
            if registry.insert(id, true).is_some() {
                return Err(PoolError::DuplicateId(id));
            }
            // Capacity equals total, so this never reports a full queue
            if !matches!(available_tx.try_send(entity), Ok(true)) {
                return Err(PoolError::Closed);
            }
        }

        tracing::debug!("Built pool of {} entities", total);

        Ok(Self {
            total,
            available_tx,
            available_rx,
            ids: Mutex::new(registry),
        })
    }

    /// Checks out an entity, waiting until one is available
    pub async fn take(&self) -> Result<E, PoolError> {
        let entity = self
            .available_rx
            .recv()
            .await
            .map_err(|_| PoolError::Closed)?;

        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        ids.insert(entity.id(), false);
        Ok(entity)
    }

    /// Returns a checked-out entity to the pool
    ///
    /// The id state is flipped inside the lock; the entity is reinserted after
    /// the lock is released. On a closed pool the entity is dropped and its id
    /// stays checked out.
    pub fn give_back(&self, entity: E) -> Result<(), PoolError> {
        let id = entity.id();
        {
            let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
            match ids.get_mut(&id) {
                None => return Err(PoolError::ForeignEntity(id)),
                Some(true) => return Err(PoolError::AlreadyReturned(id)),
                Some(_) if self.available_tx.is_closed() => return Err(PoolError::Closed),
                Some(available) => *available = true,
            }
        }

        match self.available_tx.try_send(entity) {
            Ok(true) => Ok(()),
            _ => {
                // Closed between the check and the send
                let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
                ids.insert(id, false);
                Err(PoolError::Closed)
            }
        }
    }

    /// Returns true if the entity with `id` is sitting in the pool
    pub fn is_available(&self, id: u32) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or(false)
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of checked-out entities; eventually consistent
    pub fn used(&self) -> u32 {
        let available = self.available_rx.len() as u32;
        self.total.saturating_sub(available)
    }

    /// Closes the availability channel; later `take` calls fail with `Closed`
    pub fn close(&self) {
        let _ = self.available_tx.close();
    }

    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            total: self.total,
            used: self.used(),
        }
    }
}
