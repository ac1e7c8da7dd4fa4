//! Icon cache with insertion-order eviction
//!
//! One cache is shared by every viewer session. It provides:
//! - Key deduplication by participant identity
//! - Bounded size with least-recently-inserted eviction
//! - Pinned presets that count towards capacity but are never evicted
//! - Case-insensitive lookup of presets by name
//! - Broadcast of icon slots to every connected viewer, plus a record of what
//!   is currently broadcast so late joiners can be synchronised in bulk
//!
//! # Design
//!
//! All state sits behind a single `parking_lot::Mutex`. Every operation is a
//! short in-memory map update; the lock is released before anything is handed
//! to the viewer registry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::addressing::{icon_identity, ParticipantId};
use crate::diff::{icon_install, SlotIcon};
use crate::instructions::{IconTexture, Latency, RosterInstruction};
use crate::viewer_registry::{BroadcastResult, ViewerRegistry};

/// Default maximum number of cached icons
pub const DEFAULT_MAX_ICON_ENTRIES: usize = 5000;

/// A cached icon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconEntry {
    /// Texture data
    pub texture: IconTexture,
    /// Human-readable key for presets
    pub name: Option<String>,
    /// Pinned entries are never evicted
    pub pinned: bool,
    seq: u64,
}

/// Errors that can occur during icon cache operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IconCacheError {
    /// Cache is full and every entry is pinned
    #[error("Cannot evict: all {capacity} cached icons are pinned presets")]
    CannotEvict {
        /// Configured capacity
        capacity: usize,
    },
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<ParticipantId, IconEntry>,
    order: BTreeMap<u64, ParticipantId>,
    displayed: HashSet<ParticipantId>,
    next_seq: u64,
    capacity: usize,
}

impl Inner {
    fn evict_oldest(&mut self) -> Option<ParticipantId> {
        let (seq, id) = self
            .order
            .iter()
            .find(|(_, id)| self.entries.get(*id).is_some_and(|e| !e.pinned))
            .map(|(seq, id)| (*seq, *id))?;
        self.order.remove(&seq);
        self.entries.remove(&id);
        Some(id)
    }
}

/// Bounded, shared icon store
///
/// # Example
///
/// ```
/// use roster_core::addressing::ParticipantId;
/// use roster_core::icon_cache::IconCache;
/// use roster_core::instructions::IconTexture;
///
/// let cache = IconCache::new(2);
/// let (a, b, c) = (ParticipantId::random(), ParticipantId::random(), ParticipantId::random());
///
/// cache.register(a, IconTexture::new("a", None), None).unwrap();
/// cache.register(b, IconTexture::new("b", None), None).unwrap();
/// let evicted = cache.register(c, IconTexture::new("c", None), None).unwrap();
///
/// assert_eq!(evicted, Some(a));
/// assert_eq!(cache.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct IconCache {
    inner: Arc<Mutex<Inner>>,
}

impl Default for IconCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ICON_ENTRIES)
    }
}

impl IconCache {
    /// Create a cache holding at most `capacity` icons
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                displayed: HashSet::new(),
                next_seq: 0,
                capacity: capacity.max(1),
            })),
        }
    }

    /// Insert or refresh an icon
    ///
    /// Refreshing moves the identity to the newest insertion position and
    /// keeps a preset pinned under its name. Returns
    /// the identity evicted to make room, if any. An evicted identity that was
    /// broadcast stays marked as displayed until [`IconCache::broadcast_remove`]
    /// takes its slot off the viewers.
    ///
    /// # Errors
    ///
    /// Returns [`IconCacheError::CannotEvict`] if the cache is full of pinned
    /// entries; the icon is not stored.
    pub fn register(
        &self,
        id: ParticipantId,
        texture: IconTexture,
        name: Option<&str>,
    ) -> Result<Option<ParticipantId>, IconCacheError> {
        self.insert(id, texture, name.map(str::to_string), false)
    }

    /// Insert a named, pinned preset
    ///
    /// # Errors
    ///
    /// Returns [`IconCacheError::CannotEvict`] if the cache is full of pinned
    /// entries.
    pub fn register_preset(
        &self,
        name: &str,
        texture: IconTexture,
    ) -> Result<ParticipantId, IconCacheError> {
        let id = ParticipantId::for_preset(name);
        self.insert(id, texture, Some(name.to_string()), true)?;
        Ok(id)
    }

    fn insert(
        &self,
        id: ParticipantId,
        texture: IconTexture,
        name: Option<String>,
        pinned: bool,
    ) -> Result<Option<ParticipantId>, IconCacheError> {
        let mut inner = self.inner.lock();

        let mut evicted = None;
        let mut pinned = pinned;
        let mut name = name;
        if let Some(old) = inner.entries.remove(&id) {
            inner.order.remove(&old.seq);
            pinned |= old.pinned;
            name = name.or(old.name);
        } else if inner.entries.len() >= inner.capacity {
            evicted = inner.evict_oldest();
            if evicted.is_none() {
                return Err(IconCacheError::CannotEvict {
                    capacity: inner.capacity,
                });
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, id);
        inner.entries.insert(
            id,
            IconEntry {
                texture,
                name,
                pinned,
                seq,
            },
        );
        drop(inner);

        if let Some(old) = evicted {
            tracing::debug!(evicted = %old, inserted = %id, "Icon cache full, evicted oldest entry");
        }
        Ok(evicted)
    }

    /// Entry for an identity
    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<IconEntry> {
        self.inner.lock().entries.get(id).cloned()
    }

    /// Icon for a slot, if the identity is cached
    #[must_use]
    pub fn slot_icon(&self, id: ParticipantId) -> Option<SlotIcon> {
        self.get(&id).map(|entry| SlotIcon {
            owner: id,
            texture: entry.texture,
        })
    }

    /// Find a named entry, ignoring case
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<(ParticipantId, IconEntry)> {
        let inner = self.inner.lock();
        let found = inner
            .entries
            .iter()
            .find(|(_, entry)| {
                entry
                    .name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|(id, entry)| (*id, entry.clone()));
        found
    }

    /// Drop an entry
    pub fn remove(&self, id: &ParticipantId) -> Option<IconEntry> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.remove(id)?;
        inner.order.remove(&entry.seq);
        inner.displayed.remove(id);
        Some(entry)
    }

    /// Current contents
    #[must_use]
    pub fn snapshot(&self) -> HashMap<ParticipantId, IconEntry> {
        self.inner.lock().entries.clone()
    }

    /// Number of cached icons
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Maximum number of cached icons
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Whether an identity's icon slot is currently broadcast
    #[must_use]
    pub fn is_displayed(&self, id: &ParticipantId) -> bool {
        self.inner.lock().displayed.contains(id)
    }

    /// Install a cached icon slot on every connected viewer
    ///
    /// Returns `None` when the identity is not cached.
    pub fn broadcast_install(
        &self,
        id: ParticipantId,
        viewers: &ViewerRegistry,
    ) -> Option<BroadcastResult> {
        let texture = {
            let mut inner = self.inner.lock();
            let texture = inner.entries.get(&id)?.texture.clone();
            inner.displayed.insert(id);
            texture
        };

        let batch = icon_install(icon_identity(id), "", Latency::Five, Some(texture)).to_vec();
        let result = viewers.broadcast(&batch);
        tracing::debug!(
            participant = %id,
            successful = result.successful,
            failed = result.failed,
            "Icon slot broadcast"
        );
        Some(result)
    }

    /// Remove an icon slot from every connected viewer
    pub fn broadcast_remove(&self, id: ParticipantId, viewers: &ViewerRegistry) -> BroadcastResult {
        self.inner.lock().displayed.remove(&id);
        viewers.broadcast(&[RosterInstruction::RemoveEntry {
            identity: icon_identity(id),
        }])
    }

    /// Insert instructions for every broadcast icon slot, oldest first
    ///
    /// Sent to a viewer on join so it sees the same icon slots as everyone
    /// else.
    #[must_use]
    pub fn bulk_sync(&self) -> Vec<RosterInstruction> {
        let inner = self.inner.lock();
        let mut shown: Vec<(&ParticipantId, &IconEntry)> = inner
            .displayed
            .iter()
            .filter_map(|id| inner.entries.get(id).map(|entry| (id, entry)))
            .collect();
        shown.sort_by_key(|(_, entry)| entry.seq);

        shown
            .into_iter()
            .map(|(id, entry)| {
                RosterInstruction::insert(
                    icon_identity(*id),
                    "",
                    Latency::Five,
                    Some(entry.texture.clone()),
                )
            })
            .collect()
    }
}
