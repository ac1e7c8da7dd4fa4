//! Slot Addressing - Grid Coordinates to Synthetic Identities
//!
//! Every cell of the remote grid is backed by a fabricated roster identity.
//! The remote side sorts and renders identities by name, so the name encodes
//! the cell position; icons are carried by a second namespace derived from the
//! real participant's identity.
//!
//! ```text
//!   GridCoordinate (2, 7)                 ParticipantId 5f1c...
//!          │                                      │
//!          ▼                                      ▼
//!   id = 2 * 100 + 7 = 207                 uuid = 5f1c...
//!   uuid = v3(nil, be32(207) ++ 0*12)      name = "§\u{1}"
//!   name = "\u{0}207"
//! ```
//!
//! The two namespaces are told apart by the marker character in the name, so
//! a display slot can never collide with an icon slot. All functions here are
//! pure; identities are recomputed on demand and never stored.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RosterError};

/// Marker leading every display-slot name
pub const DISPLAY_MARKER: char = '\u{0}';

/// Marker trailing every icon-slot name
pub const ICON_MARKER: char = '\u{1}';

/// Escape introducer for colour and format codes
pub const ESCAPE: char = '§';

/// Largest row count that keeps `column * 100 + row` unambiguous
pub const MAX_ROWS: u8 = 99;

// =============================================================================
// Grid
// =============================================================================

/// A (column, row) cell of the grid, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoordinate {
    column: u8,
    row: u8,
}

impl GridCoordinate {
    /// Create a coordinate without checking it against any grid
    ///
    /// Use [`GridBounds::coordinate`] when the values come from outside.
    #[must_use]
    pub const fn new(column: u8, row: u8) -> Self {
        Self { column, row }
    }

    /// Column, starting at 1
    #[must_use]
    pub const fn column(&self) -> u8 {
        self.column
    }

    /// Row, starting at 1
    #[must_use]
    pub const fn row(&self) -> u8 {
        self.row
    }

    /// Numeric slot id used to build the display identity
    #[must_use]
    pub fn slot_id(&self) -> i32 {
        i32::from(self.column) * 100 + i32::from(self.row)
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Configured size of the remote grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    /// Number of columns
    pub columns: u8,
    /// Number of rows per column
    pub rows: u8,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 20,
        }
    }
}

impl GridBounds {
    /// Create bounds, rejecting empty grids and grids too tall to address
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Configuration`] if either dimension is zero or
    /// `rows` exceeds [`MAX_ROWS`].
    pub fn new(columns: u8, rows: u8) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(RosterError::configuration(
                "grid",
                "columns and rows must both be at least 1",
            ));
        }
        if rows > MAX_ROWS {
            return Err(RosterError::configuration(
                "grid",
                format!("rows must be at most {MAX_ROWS}, got {rows}"),
            ));
        }
        Ok(Self { columns, rows })
    }

    /// Whether the coordinate lies inside the grid
    #[must_use]
    pub fn contains(&self, coord: GridCoordinate) -> bool {
        (1..=self.columns).contains(&coord.column) && (1..=self.rows).contains(&coord.row)
    }

    /// Build a checked coordinate
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::AddressingViolation`] when out of bounds.
    pub fn coordinate(&self, column: u8, row: u8) -> Result<GridCoordinate> {
        let coord = GridCoordinate::new(column, row);
        if self.contains(coord) {
            Ok(coord)
        } else {
            Err(RosterError::AddressingViolation {
                column,
                row,
                columns: self.columns,
                rows: self.rows,
            })
        }
    }

    /// Every cell, column-major
    pub fn cells(&self) -> impl Iterator<Item = GridCoordinate> + '_ {
        (1..=self.columns)
            .flat_map(move |column| (1..=self.rows).map(move |row| GridCoordinate::new(column, row)))
    }

    /// Total number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.columns) * usize::from(self.rows)
    }

    /// Always false for validated bounds
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Identities
// =============================================================================

/// Identity of a real participant on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Fresh random identity
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Stable identity for a named icon preset, case-insensitive
    #[must_use]
    pub fn for_preset(name: &str) -> Self {
        Self(Uuid::new_v3(&Uuid::NAMESPACE_OID, name.to_lowercase().as_bytes()))
    }

    /// The underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fabricated roster identity addressing one slot or carrying one icon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyntheticIdentity {
    /// Wire UUID
    pub uuid: Uuid,
    /// Encoded name, which carries the namespace marker
    pub name: String,
}

/// What a synthetic identity addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTarget {
    /// A grid cell
    Display(GridCoordinate),
    /// The icon slot of a real participant
    Icon(ParticipantId),
}

/// Identity backing a grid cell
#[must_use]
pub fn display_identity(coord: GridCoordinate) -> SyntheticIdentity {
    let id = coord.slot_id();
    SyntheticIdentity {
        uuid: slot_uuid(id),
        name: format!("{DISPLAY_MARKER}{id}"),
    }
}

/// Identity carrying a participant's icon
#[must_use]
pub fn icon_identity(participant: ParticipantId) -> SyntheticIdentity {
    SyntheticIdentity {
        uuid: participant.0,
        name: format!("{ESCAPE}{ICON_MARKER}"),
    }
}

/// Recover what an identity addresses
///
/// Returns `None` for identities that were not produced by this module.
#[must_use]
pub fn decode(identity: &SyntheticIdentity) -> Option<SlotTarget> {
    if let Some(digits) = identity.name.strip_prefix(DISPLAY_MARKER) {
        let id: i32 = digits.parse().ok()?;
        let column = u8::try_from(id / 100).ok()?;
        let row = u8::try_from(id % 100).ok()?;
        let coord = GridCoordinate::new(column, row);
        return (slot_uuid(id) == identity.uuid).then_some(SlotTarget::Display(coord));
    }

    let mut chars = identity.name.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(ESCAPE), Some(ICON_MARKER), None) => {
            Some(SlotTarget::Icon(ParticipantId(identity.uuid)))
        }
        _ => None,
    }
}

/// Name-based UUID of the slot id's 16-byte big-endian encoding
fn slot_uuid(id: i32) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[..4].copy_from_slice(&id.to_be_bytes());
    Uuid::new_v3(&Uuid::nil(), &bytes)
}
