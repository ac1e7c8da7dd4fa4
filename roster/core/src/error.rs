//! Error types for the roster core
//!
//! Every failure is contained to the viewer or column it affects. Nothing in
//! this crate terminates the host process; callers log and carry on.

use thiserror::Error;

use crate::config::ConfigError;
use crate::viewer_registry::ViewerId;

/// Errors surfaced by roster operations
#[derive(Debug, Error)]
pub enum RosterError {
    /// A tab, column, group or icon definition is malformed
    ///
    /// Fatal for that definition only: it is logged and skipped.
    #[error("Invalid definition '{definition}': {reason}")]
    Configuration {
        /// Name (or index) of the offending definition
        definition: String,
        /// What was wrong with it
        reason: String,
    },

    /// A coordinate outside the configured grid was addressed
    #[error("Coordinate ({column}, {row}) is outside the {columns}x{rows} grid")]
    AddressingViolation {
        /// Requested column (1-based)
        column: u8,
        /// Requested row (1-based)
        row: u8,
        /// Configured column count
        columns: u8,
        /// Configured row count
        rows: u8,
    },

    /// An instruction batch could not be handed to a viewer's transport
    #[error("Failed to deliver instructions to {viewer}: {reason}")]
    TransportFailure {
        /// The viewer whose channel rejected the batch
        viewer: ViewerId,
        /// Why delivery failed
        reason: String,
    },

    /// A sort variable did not resolve to a number
    #[error("Sort variable '{variable}' resolved to non-numeric value '{value}'")]
    UnknownSortRule {
        /// The variable the list sorts by
        variable: String,
        /// What the host returned for it
        value: String,
    },

    /// No session exists for the viewer
    #[error("Unknown viewer {0}")]
    UnknownViewer(ViewerId),

    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for roster operations
pub type Result<T> = std::result::Result<T, RosterError>;

impl RosterError {
    /// Build a configuration error for a named definition
    pub fn configuration(definition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            definition: definition.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects a single viewer
    #[must_use]
    pub fn is_viewer_scoped(&self) -> bool {
        matches!(self, Self::TransportFailure { .. } | Self::UnknownViewer(_))
    }
}
