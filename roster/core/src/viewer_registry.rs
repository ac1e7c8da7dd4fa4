//! Viewer Registry - Connected Viewer Channels
//!
//! Tracks the transport channel of every connected viewer so instruction
//! batches can be routed to one viewer or fanned out to all of them.
//!
//! # Architecture
//!
//! ```text
//!                      ViewerRegistry
//!                     ┌───────────────────────────────────────┐
//!                     │ HashMap<ViewerId, ViewerHandle>       │
//!                     │   - wrapped in Arc<RwLock<>>          │
//!                     └───────────────┬───────────────────────┘
//!                                     │  Vec<RosterInstruction>
//!              ┌──────────────────────┼──────────────────────┐
//!              │                      │                      │
//!       ┌──────▼──────┐       ┌───────▼──────┐       ┌───────▼──────┐
//!       │  viewer-1   │       │   viewer-2   │       │   viewer-3   │
//!       │  transport  │       │   transport  │       │   transport  │
//!       └─────────────┘       └──────────────┘       └──────────────┘
//! ```
//!
//! # Thread Safety
//!
//! Sends vastly outnumber joins and leaves, so the map sits behind an
//! `RwLock` and every send takes the read side. Delivery uses `try_send`: the
//! core never waits on a slow viewer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Result, RosterError};
use crate::instructions::{InstructionBatch, RosterInstruction};

/// Unique identifier for a connected viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewerId(u64);

impl ViewerId {
    /// Allocate a new unique viewer ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Create a viewer ID from a raw value (for testing)
    #[cfg(test)]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Handle to a connected viewer's transport
#[derive(Debug)]
pub struct ViewerHandle {
    /// Viewer identifier
    pub id: ViewerId,
    /// Channel feeding the viewer's transport
    pub tx: mpsc::Sender<InstructionBatch>,
    /// When the viewer connected
    pub connected_at: std::time::Instant,
}

impl ViewerHandle {
    /// Create a new viewer handle
    #[must_use]
    pub fn new(id: ViewerId, tx: mpsc::Sender<InstructionBatch>) -> Self {
        Self {
            id,
            tx,
            connected_at: std::time::Instant::now(),
        }
    }

    /// Hand a batch to the transport without waiting
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::TransportFailure`] if the channel is full or
    /// closed.
    pub fn try_send(&self, batch: InstructionBatch) -> Result<()> {
        self.tx.try_send(batch).map_err(|e| RosterError::TransportFailure {
            viewer: self.id,
            reason: match e {
                mpsc::error::TrySendError::Full(_) => "channel full".to_string(),
                mpsc::error::TrySendError::Closed(_) => "channel closed".to_string(),
            },
        })
    }

    /// Check if the viewer channel is still open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Result of a broadcast operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Number of viewers that accepted the batch
    pub successful: usize,
    /// Number of viewers whose channel rejected the batch
    pub failed: usize,
    /// IDs of viewers that failed
    pub failed_ids: Vec<ViewerId>,
}

impl BroadcastResult {
    /// Check if all recipients accepted the batch
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Check if no recipients accepted the batch
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.successful == 0
    }
}

/// Registry of connected viewers
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Debug)]
pub struct ViewerRegistry {
    inner: Arc<RwLock<HashMap<ViewerId, ViewerHandle>>>,
}

impl Default for ViewerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a viewer, replacing any previous handle with the same ID
    pub fn register(&self, handle: ViewerHandle) -> ViewerId {
        let id = handle.id;
        self.inner.write().insert(id, handle);
        tracing::info!(viewer = %id, "Viewer registered");
        id
    }

    /// Unregister a viewer
    pub fn unregister(&self, id: &ViewerId) -> Option<ViewerHandle> {
        let handle = self.inner.write().remove(id);
        if handle.is_some() {
            tracing::info!(viewer = %id, "Viewer unregistered");
        }
        handle
    }

    /// Number of connected viewers
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if a viewer is registered
    #[must_use]
    pub fn contains(&self, id: &ViewerId) -> bool {
        self.inner.read().contains_key(id)
    }

    /// IDs of all connected viewers
    #[must_use]
    pub fn viewer_ids(&self) -> Vec<ViewerId> {
        self.inner.read().keys().copied().collect()
    }

    /// Send a batch to one viewer
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::UnknownViewer`] if the viewer is not registered,
    /// or [`RosterError::TransportFailure`] if its channel rejects the batch.
    pub fn send_to(&self, id: &ViewerId, batch: InstructionBatch) -> Result<()> {
        let inner = self.inner.read();
        match inner.get(id) {
            Some(handle) => handle.try_send(batch),
            None => {
                tracing::warn!(viewer = %id, "Attempted to send to unknown viewer");
                Err(RosterError::UnknownViewer(*id))
            }
        }
    }

    /// Send a batch to every connected viewer
    #[must_use]
    pub fn broadcast(&self, batch: &[RosterInstruction]) -> BroadcastResult {
        let inner = self.inner.read();
        let mut result = BroadcastResult::default();

        for (id, handle) in inner.iter() {
            match handle.try_send(batch.to_vec()) {
                Ok(()) => result.successful += 1,
                Err(e) => {
                    tracing::warn!(viewer = %id, error = %e, "Broadcast delivery failed");
                    result.failed += 1;
                    result.failed_ids.push(*id);
                }
            }
        }

        result
    }

    /// Drop viewers whose channel has closed
    ///
    /// Returns the IDs that were removed.
    pub fn cleanup_disconnected(&self) -> Vec<ViewerId> {
        let mut inner = self.inner.write();
        let closed: Vec<ViewerId> = inner
            .iter()
            .filter(|(_, handle)| !handle.is_connected())
            .map(|(id, _)| *id)
            .collect();
        for id in &closed {
            inner.remove(id);
            tracing::info!(viewer = %id, "Removed disconnected viewer");
        }
        closed
    }
}
