//! Host interface
//!
//! The host process owns participants, permissions and third-party text
//! expansion. The roster only ever asks questions through [`RosterHost`];
//! [`InMemoryHost`] answers them from plain maps and backs the daemon's
//! simulation and the tests.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::addressing::ParticipantId;
use crate::instructions::{GameMode, Latency};

/// Position of a participant
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// World (or zone) name; distances across worlds are unbounded
    pub world: String,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Location {
    /// Create a location
    #[must_use]
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Euclidean distance, or `f64::INFINITY` across worlds
    #[must_use]
    pub fn distance(&self, other: &Location) -> f64 {
        if self.world != other.world {
            return f64::INFINITY;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A live participant as the host reports it
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Identity
    pub id: ParticipantId,
    /// Display name
    pub name: String,
    /// Current position, if known
    pub location: Option<Location>,
    /// Connection quality
    pub latency: Latency,
    /// Game mode
    pub game_mode: GameMode,
}

impl Participant {
    /// Participant with no location, full latency bars and default mode
    #[must_use]
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: None,
            latency: Latency::Five,
            game_mode: GameMode::default(),
        }
    }
}

/// Questions the roster asks its host
pub trait RosterHost: Send + Sync {
    /// Every live participant, in the host's natural order
    fn participants(&self) -> Vec<Participant>;

    /// Whether `subject` holds `permission`; an empty permission always holds
    fn has_permission(&self, subject: &ParticipantId, permission: &str) -> bool;

    /// Whether `viewer` is allowed to see `other` in lists
    fn can_see(&self, viewer: &ParticipantId, other: &ParticipantId) -> bool;

    /// Host-side variable for a participant, used by sort rules
    fn variable(&self, subject: &ParticipantId, name: &str) -> Option<String>;

    /// Third-party text expansion for `subject`
    fn expand_text(&self, _subject: &ParticipantId, text: &str) -> String {
        text.to_string()
    }
}

#[derive(Debug, Default)]
struct Record {
    participant: Option<Participant>,
    permissions: HashSet<String>,
    variables: HashMap<String, String>,
    hidden_from: HashSet<ParticipantId>,
}

/// Map-backed host
#[derive(Debug, Default)]
pub struct InMemoryHost {
    records: RwLock<HashMap<ParticipantId, Record>>,
    order: RwLock<Vec<ParticipantId>>,
}

impl InMemoryHost {
    /// Create an empty host
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a participant
    pub fn join(&self, participant: Participant) {
        let id = participant.id;
        let mut records = self.records.write();
        let record = records.entry(id).or_default();
        if record.participant.is_none() {
            self.order.write().push(id);
        }
        record.participant = Some(participant);
    }

    /// Remove a participant and everything known about it
    pub fn leave(&self, id: &ParticipantId) {
        self.records.write().remove(id);
        self.order.write().retain(|other| other != id);
    }

    /// Grant a permission
    pub fn grant(&self, id: ParticipantId, permission: impl Into<String>) {
        self.records
            .write()
            .entry(id)
            .or_default()
            .permissions
            .insert(permission.into());
    }

    /// Set a variable
    pub fn set_variable(&self, id: ParticipantId, name: impl Into<String>, value: impl Into<String>) {
        self.records
            .write()
            .entry(id)
            .or_default()
            .variables
            .insert(name.into(), value.into());
    }

    /// Hide `target` from `viewer`
    pub fn hide(&self, viewer: ParticipantId, target: ParticipantId) {
        self.records
            .write()
            .entry(target)
            .or_default()
            .hidden_from
            .insert(viewer);
    }

    /// Move a participant
    pub fn relocate(&self, id: &ParticipantId, location: Location) {
        if let Some(participant) = self
            .records
            .write()
            .get_mut(id)
            .and_then(|r| r.participant.as_mut())
        {
            participant.location = Some(location);
        }
    }

    /// Change a participant's latency bucket
    pub fn set_latency(&self, id: &ParticipantId, latency: Latency) {
        if let Some(participant) = self
            .records
            .write()
            .get_mut(id)
            .and_then(|r| r.participant.as_mut())
        {
            participant.latency = latency;
        }
    }

    /// Number of live participants
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    /// Whether nobody is online
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.read().is_empty()
    }
}

impl RosterHost for InMemoryHost {
    fn participants(&self) -> Vec<Participant> {
        let records = self.records.read();
        self.order
            .read()
            .iter()
            .filter_map(|id| records.get(id).and_then(|r| r.participant.clone()))
            .collect()
    }

    fn has_permission(&self, subject: &ParticipantId, permission: &str) -> bool {
        permission.is_empty()
            || self
                .records
                .read()
                .get(subject)
                .is_some_and(|r| r.permissions.contains(permission))
    }

    fn can_see(&self, viewer: &ParticipantId, other: &ParticipantId) -> bool {
        !self
            .records
            .read()
            .get(other)
            .is_some_and(|r| r.hidden_from.contains(viewer))
    }

    fn variable(&self, subject: &ParticipantId, name: &str) -> Option<String> {
        self.records
            .read()
            .get(subject)
            .and_then(|r| r.variables.get(name).cloned())
    }
}
