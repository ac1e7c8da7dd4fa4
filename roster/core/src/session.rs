//! Viewer Session - Everything One Viewer Sees
//!
//! A session owns the column renderers of the viewer's tab, the header and
//! footer animations, and the diff emitter holding what was last sent to that
//! viewer. Sessions never share state with each other; the icon cache and the
//! host are reached through the [`RenderContext`].
//!
//! # Lifecycle
//!
//! ```text
//!   bootstrap()          every slot inserted blank + icon bulk sync
//!        │
//!        ▼
//!   render() ─▶ send ─▶ commit()     once per tick, commit only on success
//!                                    animations and pages move on commit
//!        │
//!        ▼
//!   teardown()           every slot removed, cached state dropped
//! ```

use std::collections::BTreeMap;

use crate::addressing::{display_identity, ParticipantId};
use crate::column::{ColumnRenderer, Placeholders, RenderContext};
use crate::config::definitions::{DefinitionSet, TabDef};
use crate::config::RosterSettings;
use crate::diff::{RosterDiffEmitter, SlotChange};
use crate::error::Result;
use crate::icon_cache::IconCache;
use crate::instructions::{InstructionBatch, Latency, RosterInstruction};
use crate::text::format::colorize;
use crate::text::AnimatedText;
use crate::viewer_registry::ViewerId;

/// Header and footer text as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    /// Header lines joined with `\n`
    pub header: String,
    /// Footer lines joined with `\n`
    pub footer: String,
}

/// Result of rendering one session for one tick
#[derive(Debug, Default)]
pub struct RenderOutcome {
    /// Slot changes, in grid order
    pub changes: Vec<SlotChange>,
    /// New banner, when it differs from the last one sent
    pub banner: Option<Banner>,
}

impl RenderOutcome {
    /// Whether there is nothing to send
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.banner.is_none()
    }

    /// Flatten into one ordered batch
    #[must_use]
    pub fn batch(&self) -> InstructionBatch {
        let mut batch: InstructionBatch = self
            .changes
            .iter()
            .flat_map(|change| change.instructions.iter().cloned())
            .collect();
        if let Some(banner) = &self.banner {
            batch.push(RosterInstruction::SetBanner {
                header: banner.header.clone(),
                footer: banner.footer.clone(),
            });
        }
        batch
    }
}

/// Render state of one connected viewer
#[derive(Debug)]
pub struct ViewerSession {
    viewer: ViewerId,
    subject: ParticipantId,
    tab: Option<String>,
    columns: BTreeMap<u8, ColumnRenderer>,
    header: Vec<AnimatedText>,
    footer: Vec<AnimatedText>,
    emitter: RosterDiffEmitter,
    placeholders: Placeholders,
    last_banner: Option<Banner>,
}

impl ViewerSession {
    /// Build a session showing `tab`
    ///
    /// With no tab every slot stays blank.
    ///
    /// # Errors
    ///
    /// Returns an error if the placeholder matchers cannot be compiled.
    pub fn new(
        viewer: ViewerId,
        subject: ParticipantId,
        tab: Option<&TabDef>,
        definitions: &DefinitionSet,
        settings: &RosterSettings,
    ) -> Result<Self> {
        let mut columns = BTreeMap::new();
        let (header, footer) = match tab {
            Some(tab) => {
                let show_titles = tab.display_titles.unwrap_or(settings.display_titles);
                for placement in &tab.columns {
                    match definitions.column(&placement.column) {
                        Some(def) if (1..=settings.grid.columns).contains(&placement.slot) => {
                            columns.insert(
                                placement.slot,
                                ColumnRenderer::new(placement.slot, def, settings, show_titles),
                            );
                        }
                        _ => {
                            tracing::warn!(
                                viewer = %viewer,
                                tab = %tab.name,
                                column = %placement.column,
                                slot = placement.slot,
                                "Column placement not renderable, skipped"
                            );
                        }
                    }
                }
                (
                    tab.header.iter().map(|line| line.build()).collect(),
                    tab.footer.iter().map(|line| line.build()).collect(),
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(Self {
            viewer,
            subject,
            tab: tab.map(|t| t.name.clone()),
            columns,
            header,
            footer,
            emitter: RosterDiffEmitter::new(settings.grid),
            placeholders: Placeholders::new()?,
            last_banner: None,
        })
    }

    /// Viewer this session renders for
    #[must_use]
    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    /// Participant behind the viewer
    #[must_use]
    pub fn subject(&self) -> ParticipantId {
        self.subject
    }

    /// Name of the tab shown, if any
    #[must_use]
    pub fn tab(&self) -> Option<&str> {
        self.tab.as_deref()
    }

    /// Column renderers keyed by grid column
    #[must_use]
    pub fn columns(&self) -> &BTreeMap<u8, ColumnRenderer> {
        &self.columns
    }

    /// Slot cache for this viewer
    #[must_use]
    pub fn emitter(&self) -> &RosterDiffEmitter {
        &self.emitter
    }

    /// Batch that prepares a freshly connected viewer
    ///
    /// Inserts every slot blank, then every icon slot currently broadcast.
    #[must_use]
    pub fn bootstrap(&self, icons: &IconCache) -> InstructionBatch {
        let bounds = self.emitter.bounds();
        let mut batch: InstructionBatch = bounds
            .cells()
            .map(|coord| RosterInstruction::insert(display_identity(coord), "", Latency::Five, None))
            .collect();
        batch.extend(icons.bulk_sync());
        batch
    }

    /// Render one tick without committing anything
    ///
    /// Rendering again before [`ViewerSession::commit`] yields the same
    /// frame.
    pub fn render(&mut self, ctx: &RenderContext<'_>) -> RenderOutcome {
        let mut changes = Vec::new();
        for column in self.columns.values_mut() {
            changes.extend(column.render(ctx, &self.placeholders, &self.emitter));
        }

        let banner = Banner {
            header: banner_text(&self.header, ctx),
            footer: banner_text(&self.footer, ctx),
        };
        let first_blank = self.last_banner.is_none() && banner.header.is_empty() && banner.footer.is_empty();
        let banner = (self.last_banner.as_ref() != Some(&banner) && !first_blank).then_some(banner);

        RenderOutcome { changes, banner }
    }

    /// Record a rendered outcome as delivered and move to the next frame
    ///
    /// Also called with an empty outcome when there was nothing to send.
    pub fn commit(&mut self, outcome: RenderOutcome) {
        for change in &outcome.changes {
            self.emitter.commit(change);
        }
        if let Some(banner) = outcome.banner {
            self.last_banner = Some(banner);
        }
        for column in self.columns.values_mut() {
            column.advance();
        }
        for line in self.header.iter_mut().chain(self.footer.iter_mut()) {
            line.advance();
        }
    }

    /// Batch that removes every slot, forgetting all cached state
    #[must_use]
    pub fn teardown(&mut self) -> InstructionBatch {
        let bounds = self.emitter.bounds();
        let batch = bounds.cells().map(|coord| self.emitter.remove(coord)).collect();
        self.emitter.clear();
        self.last_banner = None;
        tracing::debug!(viewer = %self.viewer, "Session torn down");
        batch
    }
}

fn banner_text(lines: &[AnimatedText], ctx: &RenderContext<'_>) -> String {
    lines
        .iter()
        .map(|line| colorize(&ctx.host.expand_text(&ctx.subject, &line.visible())))
        .collect::<Vec<_>>()
        .join("\n")
}
