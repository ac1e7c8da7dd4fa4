//! Column Renderer - One Logical Column onto One Grid Column
//!
//! A column pulls its entries (fixed elements or live participants), pages
//! them, and turns every grid row into a [`DesiredSlot`] for the viewer's
//! diff emitter.
//!
//! # Row Layout
//!
//! ```text
//!   row 1          title                     (titles shown)
//!   row 2          spacer, column_width wide (titles shown)
//!   rows 3..       entries of the current page
//!   next row       page indicator            (list longer than a page)
//!   remaining      blank
//! ```
//!
//! # Text Pipeline
//!
//! Every row's text goes through the same steps before it is diffed:
//!
//! ```text
//!   visible frame ─▶ {current_page}/{max_page} ─▶ host expansion
//!                 ─▶ & codes to § ─▶ width trim ─▶ optional centring
//! ```
//!
//! Entries are keyed (`static:3`, `participant:<id>:<group>`), so a refresh
//! keeps the animation state of every entry that is still listed.

use std::collections::HashMap;
use std::iter;

use crate::addressing::{GridCoordinate, ParticipantId};
use crate::config::definitions::{ColumnDef, EntryDef, GroupDef, ListColumnDef};
use crate::config::RosterSettings;
use crate::content::{highest_group, list_participants, ListQuery, ParticipantSnapshot};
use crate::diff::{DesiredSlot, RosterDiffEmitter, SlotChange, SlotIcon};
use crate::error::{Result, RosterError};
use crate::host::RosterHost;
use crate::icon_cache::IconCache;
use crate::instructions::Latency;
use crate::pagination::{fingerprint, PageLayout, PageWindow, PaginationEngine};
use crate::text::format::{colorize, strip};
use crate::text::{AnimatedText, Cooldown, PlaceholderPattern, TrimRule};

/// Shared services a column renders against
pub struct RenderContext<'a> {
    /// Host for permissions, visibility and text expansion
    pub host: &'a dyn RosterHost,
    /// Shared icon store
    pub icons: &'a IconCache,
    /// Group definitions
    pub groups: &'a [GroupDef],
    /// Participants online this tick
    pub snapshot: &'a ParticipantSnapshot,
    /// Participant behind the viewer
    pub subject: ParticipantId,
}

/// Compiled placeholder matchers used by every column
#[derive(Debug, Clone)]
pub struct Placeholders {
    current_page: PlaceholderPattern,
    max_page: PlaceholderPattern,
    participant_name: PlaceholderPattern,
}

impl Placeholders {
    /// Compile the matchers
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Configuration`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let compile = |key: &str| {
            PlaceholderPattern::new(key)
                .map_err(|e| RosterError::configuration("placeholders", e.to_string()))
        };
        Ok(Self {
            current_page: compile("current_page")?,
            max_page: compile("max_page")?,
            participant_name: compile("participant_name")?,
        })
    }

    fn pages(&self, text: &str, window: &PageWindow) -> String {
        let text = self
            .current_page
            .replace(text, &window.page.to_string())
            .into_owned();
        self.max_page
            .replace(&text, &window.max_page.to_string())
            .into_owned()
    }
}

/// Where a row's icon comes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum IconSource {
    /// A named preset
    Named(String),
    /// A participant's own icon
    Participant(ParticipantId),
    /// Whoever the last word of the text names, if anyone
    TrailingName,
}

#[derive(Debug)]
struct RowEntry {
    key: String,
    text: AnimatedText,
    icon: IconSource,
    latency: Latency,
    center: bool,
}

#[derive(Debug)]
enum Source {
    Static(Vec<EntryDef>),
    List(ListColumnDef),
}

/// Renders one column definition into one grid column
#[derive(Debug)]
pub struct ColumnRenderer {
    slot: u8,
    rows: u8,
    name: String,
    title: AnimatedText,
    source: Source,
    pager: PaginationEngine<RowEntry>,
    page_text: String,
    trim: TrimRule,
}

impl ColumnRenderer {
    /// Build a renderer placing `def` on grid column `slot`
    #[must_use]
    pub fn new(slot: u8, def: &ColumnDef, settings: &RosterSettings, show_titles: bool) -> Self {
        let page = def.page();
        let layout = PageLayout {
            rows: usize::from(settings.grid.rows),
            show_titles,
            enabled: page.enabled,
            max_pages: page.max_pages,
        };
        let pager = PaginationEngine::new(
            layout,
            Cooldown::new(settings.refresh_interval_ticks),
            Cooldown::new(page.interval.unwrap_or(settings.page_interval_ticks)),
        );
        let source = match def {
            ColumnDef::Static(def) => Source::Static(def.elements.clone()),
            ColumnDef::List(def) => Source::List(def.clone()),
        };

        Self {
            slot,
            rows: settings.grid.rows,
            name: def.name().to_string(),
            title: def.title().build(),
            source,
            pager,
            page_text: page.text.clone().unwrap_or_else(|| settings.page_text.clone()),
            trim: settings.trim_rule(),
        }
    }

    /// Grid column this renderer draws into
    #[must_use]
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Column definition name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current page window
    #[must_use]
    pub fn window(&self) -> PageWindow {
        self.pager.window()
    }

    /// Render one tick
    ///
    /// Returns the slot changes against `emitter`. Nothing moves until
    /// [`ColumnRenderer::advance`] is called, so a render whose batch was not
    /// delivered can be repeated as is.
    pub fn render(
        &mut self,
        ctx: &RenderContext<'_>,
        placeholders: &Placeholders,
        emitter: &RosterDiffEmitter,
    ) -> Vec<SlotChange> {
        if self.pager.needs_refresh() {
            self.load_entries(ctx, placeholders);
        }

        let window = self.pager.window();
        let mut lines = Vec::with_capacity(usize::from(self.rows));

        if self.pager.layout().show_titles {
            let title = self.finish(&self.title.visible(), false, &window, ctx, placeholders);
            lines.push(DesiredSlot::text(title));
            lines.push(DesiredSlot::text(" ".repeat(self.trim.width)));
        }

        for entry in &self.pager.entries()[window.start..window.end] {
            let text = self.finish(&entry.text.visible(), entry.center, &window, ctx, placeholders);
            let icon = resolve_icon(&entry.icon, &text, ctx);
            lines.push(DesiredSlot {
                text,
                icon,
                latency: entry.latency,
            });
        }

        if window.paginated {
            let indicator = self.finish(&self.page_text, false, &window, ctx, placeholders);
            lines.push(DesiredSlot::text(indicator));
        }

        let changes = (1..=self.rows)
            .zip(lines.into_iter().chain(iter::repeat_with(DesiredSlot::blank)))
            .filter_map(|(row, desired)| emitter.apply(GridCoordinate::new(self.slot, row), &desired))
            .collect();

        changes
    }

    /// Step every animation and count one scroll tick
    pub fn advance(&mut self) {
        self.title.advance();
        for entry in self.pager.entries_mut() {
            entry.text.advance();
        }
        self.pager.scroll();
    }

    fn finish(
        &self,
        text: &str,
        center: bool,
        window: &PageWindow,
        ctx: &RenderContext<'_>,
        placeholders: &Placeholders,
    ) -> String {
        let text = placeholders.pages(text, window);
        let text = colorize(&ctx.host.expand_text(&ctx.subject, &text));
        let trimmed = self.trim.apply(&text);
        if center {
            self.trim.center(&trimmed)
        } else {
            trimmed.into_owned()
        }
    }

    fn load_entries(&mut self, ctx: &RenderContext<'_>, placeholders: &Placeholders) {
        let mut previous: HashMap<String, RowEntry> = self
            .pager
            .take_entries()
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect();

        let entries: Vec<RowEntry> = match &self.source {
            Source::Static(elements) => elements
                .iter()
                .enumerate()
                .filter(|(_, def)| {
                    def.permission.is_empty() || ctx.host.has_permission(&ctx.subject, &def.permission)
                })
                .map(|(index, def)| {
                    let key = format!("static:{index}");
                    previous.remove(&key).unwrap_or_else(|| RowEntry {
                        key,
                        text: def.text.build(),
                        icon: def
                            .icon
                            .clone()
                            .map_or(IconSource::TrailingName, IconSource::Named),
                        latency: def.latency,
                        center: def.center,
                    })
                })
                .collect(),
            Source::List(def) => {
                let query = ListQuery {
                    sort: def.sort,
                    sort_variable: def.sort_variable.as_deref(),
                    permission: &def.permission,
                };
                list_participants(ctx.host, ctx.snapshot, &ctx.subject, &query, ctx.groups)
                    .into_iter()
                    .map(|participant| {
                        let group = highest_group(ctx.host, &participant.id, ctx.groups);
                        let key = format!(
                            "participant:{}:{}",
                            participant.id,
                            group.map_or("", |g| g.name.as_str())
                        );
                        let mut entry = previous.remove(&key).unwrap_or_else(|| {
                            let template = group
                                .and_then(|g| g.display.as_ref())
                                .unwrap_or(&def.element);
                            let mut text = template.build();
                            text.apply_placeholder(&placeholders.participant_name, &participant.name);
                            RowEntry {
                                key,
                                text,
                                icon: IconSource::Participant(participant.id),
                                latency: participant.latency,
                                center: def.center,
                            }
                        });
                        entry.latency = participant.latency;
                        entry
                    })
                    .collect()
            }
        };

        let fp = fingerprint(entries.iter().map(|entry| entry.key.as_str()));
        tracing::debug!(
            column = %self.name,
            slot = self.slot,
            entries = entries.len(),
            "Column entries refreshed"
        );
        self.pager.refresh(entries, fp);
    }
}

fn resolve_icon(source: &IconSource, text: &str, ctx: &RenderContext<'_>) -> Option<SlotIcon> {
    match source {
        IconSource::Named(name) => ctx.icons.lookup(name).map(|(owner, entry)| SlotIcon {
            owner,
            texture: entry.texture,
        }),
        IconSource::Participant(id) => ctx.icons.slot_icon(*id),
        IconSource::TrailingName => {
            let stripped = strip(text);
            let token = stripped.split_whitespace().last()?;
            let participant = ctx.snapshot.find_by_name(token)?;
            ctx.icons.slot_icon(participant.id)
        }
    }
}
