//! Roster Diff Emitter - Minimal Instructions per Slot
//!
//! Remembers, per grid cell, what was last physically sent to one viewer and
//! turns the next desired state into the smallest ordered instruction list.
//!
//! # Two-Phase Updates
//!
//! [`RosterDiffEmitter::apply`] only computes a [`SlotChange`]; the cached row
//! is updated by [`RosterDiffEmitter::commit`] once the batch was handed to
//! the transport. A failed send leaves the row stale, so the next render
//! produces the same change again.
//!
//! ```text
//!   desired (text, icon, latency)
//!            │
//!            ▼
//!   ┌──────────────────┐   differs?   ┌──────────────┐  sent?  ┌────────────┐
//!   │ SlotCacheRow     │ ───────────▶ │ SlotChange   │ ──────▶ │ commit()   │
//!   │ (last sent)      │              │ instructions │         │ row = next │
//!   └──────────────────┘              └──────────────┘         └────────────┘
//! ```
//!
//! A cell with no cached row is blank: the join bootstrap inserts every cell
//! with empty text, no icon and full latency bars.

use std::collections::HashMap;

use crate::addressing::{display_identity, GridBounds, GridCoordinate, ParticipantId, SyntheticIdentity};
use crate::instructions::{IconTexture, Latency, RosterInstruction};

/// Icon a slot should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIcon {
    /// Identity the icon belongs to
    pub owner: ParticipantId,
    /// Texture to install
    pub texture: IconTexture,
}

/// Desired state of one slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesiredSlot {
    /// Fully rendered text
    pub text: String,
    /// Icon, if the slot should show one
    pub icon: Option<SlotIcon>,
    /// Latency bucket
    pub latency: Latency,
}

impl DesiredSlot {
    /// A blank slot: no text, no icon
    #[must_use]
    pub fn blank() -> Self {
        Self::default()
    }

    /// A slot showing `text` with no icon
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// What was last sent to one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCacheRow {
    /// CRC32 of the last text sent
    pub text_hash: u32,
    /// Owner of the last icon installed
    pub icon: Option<ParticipantId>,
    /// Last latency bucket sent
    pub latency: Latency,
}

impl SlotCacheRow {
    fn blank() -> Self {
        Self {
            text_hash: text_hash(""),
            icon: None,
            latency: Latency::default(),
        }
    }

    fn of(desired: &DesiredSlot) -> Self {
        Self {
            text_hash: text_hash(&desired.text),
            icon: desired.icon.as_ref().map(|icon| icon.owner),
            latency: desired.latency,
        }
    }
}

/// Pending update for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    /// Cell being updated
    pub coord: GridCoordinate,
    /// Instructions to send, in order
    pub instructions: Vec<RosterInstruction>,
    next: SlotCacheRow,
}

/// Per-viewer slot cache and diff engine
#[derive(Debug)]
pub struct RosterDiffEmitter {
    bounds: GridBounds,
    rows: HashMap<GridCoordinate, SlotCacheRow>,
}

impl RosterDiffEmitter {
    /// Create an emitter with every slot blank
    #[must_use]
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            bounds,
            rows: HashMap::new(),
        }
    }

    /// Grid this emitter addresses
    #[must_use]
    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Compute the instructions that move `coord` to `desired`
    ///
    /// Returns `None` when nothing changed. Out-of-bounds coordinates are a
    /// programmer error: they panic in debug builds and are logged and
    /// ignored otherwise.
    #[must_use]
    pub fn apply(&self, coord: GridCoordinate, desired: &DesiredSlot) -> Option<SlotChange> {
        debug_assert!(
            self.bounds.contains(coord),
            "addressing violation: {coord} outside {}x{}",
            self.bounds.columns,
            self.bounds.rows
        );
        if !self.bounds.contains(coord) {
            tracing::error!(
                column = coord.column(),
                row = coord.row(),
                "Addressing violation, slot ignored"
            );
            return None;
        }

        let last = self.rows.get(&coord).copied().unwrap_or_else(SlotCacheRow::blank);
        let next = SlotCacheRow::of(desired);
        if last == next {
            return None;
        }

        let identity = display_identity(coord);
        let mut instructions = Vec::with_capacity(2);

        if last.icon != next.icon {
            instructions.extend(icon_install(
                identity,
                &desired.text,
                desired.latency,
                desired.icon.as_ref().map(|icon| icon.texture.clone()),
            ));
        } else {
            if last.text_hash != next.text_hash {
                instructions.push(RosterInstruction::UpdateDisplayText {
                    identity: identity.clone(),
                    display_text: desired.text.clone(),
                });
            }
            if last.latency != next.latency {
                instructions.push(RosterInstruction::UpdateLatency {
                    identity,
                    latency: desired.latency,
                });
            }
        }

        Some(SlotChange {
            coord,
            instructions,
            next,
        })
    }

    /// Record a change as delivered
    pub fn commit(&mut self, change: &SlotChange) {
        if change.next == SlotCacheRow::blank() {
            self.rows.remove(&change.coord);
        } else {
            self.rows.insert(change.coord, change.next);
        }
    }

    /// Remove a slot's identity and forget its cached state
    #[must_use]
    pub fn remove(&mut self, coord: GridCoordinate) -> RosterInstruction {
        self.rows.remove(&coord);
        RosterInstruction::RemoveEntry {
            identity: display_identity(coord),
        }
    }

    /// Cached row for a slot, if it differs from blank
    #[must_use]
    pub fn row(&self, coord: GridCoordinate) -> Option<&SlotCacheRow> {
        self.rows.get(&coord)
    }

    /// Whether a slot currently shows an icon
    #[must_use]
    pub fn has_icon(&self, coord: GridCoordinate) -> bool {
        self.rows.get(&coord).is_some_and(|row| row.icon.is_some())
    }

    /// Number of non-blank slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether every slot is blank
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Forget all cached state
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Replace an identity's icon
///
/// The protocol cannot change the icon of an inserted identity, so the
/// identity is removed and inserted again carrying the new texture.
#[must_use]
pub fn icon_install(
    identity: SyntheticIdentity,
    text: &str,
    latency: Latency,
    texture: Option<IconTexture>,
) -> [RosterInstruction; 2] {
    [
        RosterInstruction::RemoveEntry {
            identity: identity.clone(),
        },
        RosterInstruction::insert(identity, text, latency, texture),
    ]
}

fn text_hash(text: &str) -> u32 {
    crc32fast::hash(text.as_bytes())
}
