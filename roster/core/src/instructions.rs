//! Wire instructions handed to the viewer transport
//!
//! The remote roster only understands inserting an identity, changing one
//! mutable field of an inserted identity, removing it, and replacing the
//! banner text. Each instruction carries at most one changed field; a batch
//! is delivered in order.

use serde::{Deserialize, Serialize};

use crate::addressing::SyntheticIdentity;

/// Icon data attached to an identity on insertion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconTexture {
    /// Encoded texture value
    pub value: String,
    /// Signature over `value`, when the texture is signed
    pub signature: Option<String>,
}

impl IconTexture {
    /// Create a texture
    #[must_use]
    pub fn new(value: impl Into<String>, signature: Option<String>) -> Self {
        Self {
            value: value.into(),
            signature,
        }
    }
}

/// Connection-quality bucket shown next to an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Latency {
    /// Full bars
    #[default]
    Five,
    /// Four bars
    Four,
    /// Three bars
    Three,
    /// Two bars
    Two,
    /// One bar
    One,
    /// No connection indicator
    None,
}

impl Latency {
    /// Milliseconds reported on the wire for this bucket
    #[must_use]
    pub const fn millis(self) -> i32 {
        match self {
            Self::Five => 0,
            Self::Four => 250,
            Self::Three => 500,
            Self::Two => 750,
            Self::One => 1000,
            Self::None => -1,
        }
    }
}

/// Game mode of the identity behind an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Default mode
    #[default]
    Survival,
    /// Creative mode
    Creative,
    /// Adventure mode
    Adventure,
    /// Spectator mode (rendered greyed out remotely)
    Spectator,
}

/// One unit of the roster wire protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterInstruction {
    /// Add an identity to the roster
    InsertEntry {
        /// Identity being inserted
        identity: SyntheticIdentity,
        /// Visible text
        display_text: String,
        /// Latency bucket
        latency: Latency,
        /// Game mode
        game_mode: GameMode,
        /// Icon texture, if any
        icon: Option<IconTexture>,
    },
    /// Change the visible text of an inserted identity
    UpdateDisplayText {
        /// Identity being updated
        identity: SyntheticIdentity,
        /// New visible text
        display_text: String,
    },
    /// Change the latency bucket of an inserted identity
    UpdateLatency {
        /// Identity being updated
        identity: SyntheticIdentity,
        /// New latency bucket
        latency: Latency,
    },
    /// Change the game mode of an inserted identity
    UpdateGameMode {
        /// Identity being updated
        identity: SyntheticIdentity,
        /// New game mode
        game_mode: GameMode,
    },
    /// Remove an identity from the roster
    RemoveEntry {
        /// Identity being removed
        identity: SyntheticIdentity,
    },
    /// Replace the header and footer text
    SetBanner {
        /// Header text, lines joined with `\n`
        header: String,
        /// Footer text, lines joined with `\n`
        footer: String,
    },
}

impl RosterInstruction {
    /// Identity the instruction addresses, if any
    #[must_use]
    pub fn identity(&self) -> Option<&SyntheticIdentity> {
        match self {
            Self::InsertEntry { identity, .. }
            | Self::UpdateDisplayText { identity, .. }
            | Self::UpdateLatency { identity, .. }
            | Self::UpdateGameMode { identity, .. }
            | Self::RemoveEntry { identity } => Some(identity),
            Self::SetBanner { .. } => None,
        }
    }

    /// Insert a blank entry, optionally carrying an icon
    #[must_use]
    pub fn insert(
        identity: SyntheticIdentity,
        display_text: impl Into<String>,
        latency: Latency,
        icon: Option<IconTexture>,
    ) -> Self {
        Self::InsertEntry {
            identity,
            display_text: display_text.into(),
            latency,
            game_mode: GameMode::default(),
            icon,
        }
    }
}

/// An ordered batch of instructions for one viewer
pub type InstructionBatch = Vec<RosterInstruction>;
