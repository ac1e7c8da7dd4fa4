//! Roster Core - Per-Viewer Paginated Rosters on a Fixed Slot Grid
//!
//! A remote client shows a roster of at most `columns × rows` entries and
//! sorts whatever it receives by its own rules. This crate turns that grid
//! into an addressable display surface: every slot is occupied by a synthetic
//! identity whose name sorts into a fixed position, and each viewer is driven
//! by a diff of what it was last sent.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Host                                   │
//! │   participants · permissions · visibility · variables · expansion │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ RosterHost
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │ SessionManager                ▼                                   │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │ ViewerSession (one per viewer)                              │  │
//! │  │   ColumnRenderer ─▶ PaginationEngine ─▶ AnimatedText         │  │
//! │  │          │                                                  │  │
//! │  │          ▼                                                  │  │
//! │  │   RosterDiffEmitter (slot cache) ─▶ RosterInstruction batch │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │  IconCache (shared)          ViewerRegistry (transports)          │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ mpsc::Sender<InstructionBatch>
//!                                 ▼
//!                             viewers
//! ```
//!
//! # Module Overview
//!
//! - [`addressing`]: grid coordinates and synthetic identities
//! - [`instructions`]: the instruction vocabulary sent to viewers
//! - [`diff`]: per-viewer slot cache and minimal diffs
//! - [`text`]: colour codes, trimming and animated text
//! - [`pagination`]: page windows over long lists
//! - [`column`]: one grid column rendered for one viewer
//! - [`content`]: live participant lists and sort rules
//! - [`groups`]: weight-based definition resolution
//! - [`icon_cache`]: bounded shared icon store
//! - [`viewer_registry`]: connected viewers and delivery
//! - [`session`]: everything one viewer sees
//! - [`manager`]: all sessions, host events and the tick
//! - [`scheduler`]: periodic tick driver
//! - [`config`]: layered settings and definition loading
//! - [`host`]: the host abstraction and an in-memory host

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod addressing;
pub mod column;
pub mod config;
pub mod content;
pub mod diff;
pub mod error;
pub mod groups;
pub mod host;
pub mod icon_cache;
pub mod instructions;
pub mod manager;
pub mod pagination;
pub mod scheduler;
pub mod session;
pub mod text;
pub mod viewer_registry;

// Re-exports for convenience
pub use addressing::{GridBounds, GridCoordinate, ParticipantId, SyntheticIdentity};
pub use diff::{DesiredSlot, RosterDiffEmitter, SlotChange};
pub use error::{Result, RosterError};
pub use host::{InMemoryHost, Location, Participant, RosterHost};
pub use icon_cache::{IconCache, IconCacheError};
pub use instructions::{GameMode, IconTexture, InstructionBatch, Latency, RosterInstruction};
pub use manager::{SessionManager, TickReport};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use session::ViewerSession;
pub use text::{AnimatedText, Cooldown};
pub use viewer_registry::{BroadcastResult, ViewerHandle, ViewerId, ViewerRegistry};

// Config exports
pub use config::definitions::{load_definitions_from_str, DefinitionSet};
pub use config::{
    default_config_path, load_settings, load_settings_from_path, ConfigError, ConfigOverrides,
    ConfigSource, LoadedConfig, RosterSettings,
};
