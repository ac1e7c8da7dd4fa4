//! Session Manager - Per-Viewer Sessions Over One Shared Tick
//!
//! The manager owns every [`ViewerSession`] and the services they render
//! against. It is the single entry point for host events (viewer join/leave,
//! icon changes, game-mode changes, reloads) and for the scheduler's tick.
//!
//! # Architecture
//!
//! ```text
//!   host events                       scheduler
//!       │                                 │
//!       ▼                                 ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ SessionManager                               │
//!   │   settings / definitions   (swapped on reload)│
//!   │   sessions: DashMap<ViewerId, ViewerSession> │
//!   │   icons: IconCache      viewers: ViewerRegistry
//!   └──────────────────────────────────────────────┘
//!                          │ try_send per viewer
//!                          ▼
//!                  viewer transports
//! ```
//!
//! One tick captures a single participant snapshot, renders every session
//! against it and hands each viewer its batch. A session only commits what
//! its viewer actually accepted, so a failed delivery is retried as a diff on
//! the next tick. Animations and pages of that viewer hold still until then.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::addressing::{icon_identity, ParticipantId};
use crate::column::RenderContext;
use crate::config::definitions::{DefinitionSet, TabDef};
use crate::config::RosterSettings;
use crate::content::ParticipantSnapshot;
use crate::error::Result;
use crate::groups::resolve_highest;
use crate::host::RosterHost;
use crate::icon_cache::{IconCache, IconCacheError};
use crate::instructions::{GameMode, IconTexture, InstructionBatch, RosterInstruction};
use crate::session::ViewerSession;
use crate::viewer_registry::{BroadcastResult, ViewerHandle, ViewerId, ViewerRegistry};

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sessions rendered
    pub sessions: usize,
    /// Viewers that accepted a batch
    pub delivered: usize,
    /// Instructions accepted across all viewers
    pub instructions: usize,
    /// Viewers whose transport rejected the batch
    pub failed: Vec<ViewerId>,
    /// Viewers dropped because their transport closed
    pub disconnected: Vec<ViewerId>,
    /// Wall-clock time spent in the tick
    pub elapsed: Duration,
}

/// Owner of every viewer session
pub struct SessionManager {
    settings: RwLock<Arc<RosterSettings>>,
    definitions: RwLock<Arc<DefinitionSet>>,
    host: Arc<dyn RosterHost>,
    icons: IconCache,
    viewers: ViewerRegistry,
    sessions: DashMap<ViewerId, ViewerSession>,
    render_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("viewers", &self.viewers.count())
            .field("icons", &self.icons.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager and pin the configured icon presets
    pub fn new(
        settings: RosterSettings,
        definitions: DefinitionSet,
        host: Arc<dyn RosterHost>,
        icons: IconCache,
        viewers: ViewerRegistry,
    ) -> Self {
        register_presets(&icons, &definitions);
        tracing::info!(
            tabs = definitions.tabs.len(),
            columns = definitions.columns.len(),
            groups = definitions.groups.len(),
            source = %settings.source(),
            "Session manager created"
        );
        Self {
            settings: RwLock::new(Arc::new(settings)),
            definitions: RwLock::new(Arc::new(definitions)),
            host,
            icons,
            viewers,
            sessions: DashMap::new(),
            render_lock: Mutex::new(()),
        }
    }

    /// Settings in effect
    #[must_use]
    pub fn settings(&self) -> Arc<RosterSettings> {
        Arc::clone(&self.settings.read())
    }

    /// Definitions in effect
    #[must_use]
    pub fn definitions(&self) -> Arc<DefinitionSet> {
        Arc::clone(&self.definitions.read())
    }

    /// Shared icon cache
    #[must_use]
    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    /// Connected viewers
    #[must_use]
    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    /// Number of live sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Tab shown to a viewer
    #[must_use]
    pub fn tab_of(&self, viewer: &ViewerId) -> Option<String> {
        self.sessions
            .get(viewer)
            .and_then(|session| session.tab().map(str::to_string))
    }

    // =========================================================================
    // Viewer lifecycle
    // =========================================================================

    /// Start a session for a newly connected viewer
    ///
    /// The viewer receives the bootstrap batch immediately; its first render
    /// follows on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RosterError::TransportFailure`] if the bootstrap batch
    /// cannot be delivered. The viewer is not kept in that case.
    pub fn on_viewer_join(
        &self,
        viewer: ViewerId,
        subject: ParticipantId,
        sender: mpsc::Sender<InstructionBatch>,
    ) -> Result<()> {
        let _guard = self.render_lock.lock();
        let session = self.build_session(viewer, subject)?;
        let bootstrap = session.bootstrap(&self.icons);

        self.viewers.register(ViewerHandle::new(viewer, sender));
        if let Err(e) = self.viewers.send_to(&viewer, bootstrap) {
            tracing::warn!(viewer = %viewer, error = %e, "Bootstrap not delivered, viewer dropped");
            self.viewers.unregister(&viewer);
            return Err(e);
        }

        tracing::info!(
            viewer = %viewer,
            subject = %subject,
            tab = session.tab().unwrap_or("-"),
            "Viewer session started"
        );
        self.sessions.insert(viewer, session);
        Ok(())
    }

    /// End a viewer's session
    ///
    /// The teardown batch is sent on a best-effort basis; the viewer is
    /// unregistered either way.
    pub fn on_viewer_leave(&self, viewer: &ViewerId) {
        let _guard = self.render_lock.lock();
        if let Some((_, mut session)) = self.sessions.remove(viewer) {
            let batch = session.teardown();
            if let Err(e) = self.viewers.send_to(viewer, batch) {
                tracing::debug!(viewer = %viewer, error = %e, "Teardown not delivered");
            }
            tracing::info!(viewer = %viewer, "Viewer session ended");
        }
        self.viewers.unregister(viewer);
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Render every session once
    pub fn tick(&self) -> TickReport {
        let _guard = self.render_lock.lock();
        let started = Instant::now();
        let mut report = TickReport {
            disconnected: self.viewers.cleanup_disconnected(),
            ..TickReport::default()
        };
        for viewer in &report.disconnected {
            self.sessions.remove(viewer);
        }

        let definitions = self.definitions();
        let snapshot = ParticipantSnapshot::capture(self.host.as_ref());

        for mut entry in self.sessions.iter_mut() {
            let session = entry.value_mut();
            let ctx = RenderContext {
                host: self.host.as_ref(),
                icons: &self.icons,
                groups: &definitions.groups,
                snapshot: &snapshot,
                subject: session.subject(),
            };
            let outcome = session.render(&ctx);
            report.sessions += 1;
            if outcome.is_empty() {
                session.commit(outcome);
                continue;
            }

            let batch = outcome.batch();
            let count = batch.len();
            match self.viewers.send_to(&session.viewer(), batch) {
                Ok(()) => {
                    session.commit(outcome);
                    report.delivered += 1;
                    report.instructions += count;
                }
                Err(e) => {
                    tracing::warn!(
                        viewer = %session.viewer(),
                        error = %e,
                        "Render batch not delivered, retrying next tick"
                    );
                    report.failed.push(session.viewer());
                }
            }
        }

        report.elapsed = started.elapsed();
        tracing::trace!(
            sessions = report.sessions,
            delivered = report.delivered,
            instructions = report.instructions,
            elapsed_us = report.elapsed.as_micros() as u64,
            "Tick complete"
        );
        report
    }

    // =========================================================================
    // Host events
    // =========================================================================

    /// Replace settings and definitions
    ///
    /// Every session is torn down and rebuilt against the new set before the
    /// next tick renders. Viewers keep their connection and receive the
    /// teardown and bootstrap batches back to back.
    pub fn reload(&self, settings: RosterSettings, definitions: DefinitionSet) {
        let _guard = self.render_lock.lock();
        register_presets(&self.icons, &definitions);
        *self.settings.write() = Arc::new(settings);
        *self.definitions.write() = Arc::new(definitions);

        let viewers: Vec<ViewerId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for viewer in viewers {
            let Some((_, mut old)) = self.sessions.remove(&viewer) else {
                continue;
            };
            let mut batch = old.teardown();
            match self.build_session(viewer, old.subject()) {
                Ok(session) => {
                    batch.extend(session.bootstrap(&self.icons));
                    self.sessions.insert(viewer, session);
                }
                Err(e) => {
                    tracing::error!(viewer = %viewer, error = %e, "Session rebuild failed");
                }
            }
            if let Err(e) = self.viewers.send_to(&viewer, batch) {
                tracing::warn!(viewer = %viewer, error = %e, "Reload batch not delivered");
            }
        }

        tracing::info!(sessions = self.sessions.len(), "Definitions reloaded");
    }

    /// Propagate a participant's game mode to every viewer
    pub fn on_game_mode_change(&self, participant: ParticipantId, mode: GameMode) -> BroadcastResult {
        let result = self.viewers.broadcast(&[RosterInstruction::UpdateGameMode {
            identity: icon_identity(participant),
            game_mode: mode,
        }]);
        tracing::debug!(
            participant = %participant,
            mode = ?mode,
            successful = result.successful,
            failed = result.failed,
            "Game mode broadcast"
        );
        result
    }

    /// Cache a participant's icon and broadcast its icon slot
    ///
    /// An icon evicted to make room has its slot removed from every viewer
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`IconCacheError::CannotEvict`] if the cache holds only pinned
    /// presets.
    pub fn register_icon(
        &self,
        participant: ParticipantId,
        texture: IconTexture,
    ) -> std::result::Result<BroadcastResult, IconCacheError> {
        if let Some(evicted) = self.icons.register(participant, texture, None)? {
            if self.icons.is_displayed(&evicted) {
                let _ = self.icons.broadcast_remove(evicted, &self.viewers);
            }
        }
        Ok(self
            .icons
            .broadcast_install(participant, &self.viewers)
            .unwrap_or_default())
    }

    /// Forget a participant's icon and remove its slot from every viewer
    pub fn remove_icon(&self, participant: &ParticipantId) -> BroadcastResult {
        let shown = self.icons.is_displayed(participant);
        self.icons.remove(participant);
        if shown {
            self.icons.broadcast_remove(*participant, &self.viewers)
        } else {
            BroadcastResult::default()
        }
    }

    fn build_session(&self, viewer: ViewerId, subject: ParticipantId) -> Result<ViewerSession> {
        let settings = self.settings();
        let definitions = self.definitions();
        let tab = select_tab(self.host.as_ref(), &subject, &definitions, &settings);
        ViewerSession::new(viewer, subject, tab, &definitions, &settings)
    }
}

/// Tab a participant should see
///
/// The heaviest tab whose permission the participant holds wins. With no
/// match the tab named by `default_tab` is used, if it exists.
#[must_use]
pub fn select_tab<'a>(
    host: &dyn RosterHost,
    subject: &ParticipantId,
    definitions: &'a DefinitionSet,
    settings: &RosterSettings,
) -> Option<&'a TabDef> {
    resolve_highest(&definitions.tabs, |permission| host.has_permission(subject, permission))
        .or_else(|| definitions.tab(&settings.default_tab))
}

fn register_presets(icons: &IconCache, definitions: &DefinitionSet) {
    for preset in &definitions.icon_presets {
        if let Err(e) = icons.register_preset(&preset.name, preset.texture()) {
            tracing::warn!(preset = %preset.name, error = %e, "Icon preset not cached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::GridBounds;
    use crate::config::definitions::{
        ColumnDef, IconPresetDef, PageDef, StaticColumnDef, TabColumnDef, TextDef,
    };
    use crate::host::{InMemoryHost, Participant};

    fn tab(name: &str, permission: &str, weight: i32, column: &str) -> TabDef {
        TabDef {
            name: name.to_string(),
            permission: permission.to_string(),
            weight,
            display_titles: Some(false),
            columns: vec![TabColumnDef {
                slot: 1,
                column: column.to_string(),
            }],
            header: Vec::new(),
            footer: Vec::new(),
        }
    }

    fn column(name: &str, text: &str) -> ColumnDef {
        ColumnDef::Static(StaticColumnDef {
            name: name.to_string(),
            title: TextDef::default(),
            page: PageDef::default(),
            elements: vec![TextDef::from(text).into()],
        })
    }

    fn definitions() -> DefinitionSet {
        DefinitionSet {
            tabs: vec![
                tab("default", "", 0, "plain"),
                tab("staff", "tab.staff", 10, "secret"),
            ],
            columns: vec![column("plain", "welcome"), column("secret", "staff only")],
            icon_presets: vec![IconPresetDef {
                name: "question".to_string(),
                value: "q".to_string(),
                signature: None,
            }],
            ..DefinitionSet::default()
        }
    }

    fn manager() -> (SessionManager, Arc<InMemoryHost>) {
        let host = Arc::new(InMemoryHost::new());
        let manager = SessionManager::new(
            RosterSettings::default(),
            definitions(),
            host.clone(),
            IconCache::new(4),
            ViewerRegistry::new(),
        );
        (manager, host)
    }

    fn join(
        manager: &SessionManager,
        host: &InMemoryHost,
        name: &str,
    ) -> (ViewerId, ParticipantId, mpsc::Receiver<InstructionBatch>) {
        let subject = ParticipantId::random();
        host.join(Participant::new(subject, name));
        let viewer = ViewerId::new();
        let (tx, rx) = mpsc::channel(16);
        manager.on_viewer_join(viewer, subject, tx).unwrap();
        (viewer, subject, rx)
    }

    fn texts(batch: &[RosterInstruction]) -> Vec<String> {
        batch
            .iter()
            .filter_map(|i| match i {
                RosterInstruction::UpdateDisplayText { display_text, .. } => {
                    Some(display_text.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_presets_pinned_on_creation() {
        let (manager, _) = manager();
        let (_, entry) = manager.icons().lookup("question").unwrap();
        assert!(entry.pinned);
    }

    #[test]
    fn test_join_sends_bootstrap() {
        let (manager, host) = manager();
        let (viewer, _, mut rx) = join(&manager, &host, "Alex");

        let bootstrap = rx.try_recv().unwrap();
        assert_eq!(bootstrap.len(), GridBounds::default().len());
        assert!(manager.viewers().contains(&viewer));
        assert_eq!(manager.session_count(), 1);
        assert_eq!(manager.tab_of(&viewer).as_deref(), Some("default"));
    }

    #[test]
    fn test_tick_renders_and_commits() {
        let (manager, host) = manager();
        let (_, _, mut rx) = join(&manager, &host, "Alex");
        rx.try_recv().unwrap();

        let report = manager.tick();
        assert_eq!(report.sessions, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(texts(&rx.try_recv().unwrap()), vec!["welcome"]);

        let report = manager.tick();
        assert_eq!(report.delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tab_by_permission_weight() {
        let (manager, host) = manager();
        let subject = ParticipantId::random();
        host.join(Participant::new(subject, "Mod"));
        host.grant(subject, "tab.staff");
        let viewer = ViewerId::new();
        let (tx, mut rx) = mpsc::channel(16);
        manager.on_viewer_join(viewer, subject, tx).unwrap();
        rx.try_recv().unwrap();

        assert_eq!(manager.tab_of(&viewer).as_deref(), Some("staff"));
        manager.tick();
        assert_eq!(texts(&rx.try_recv().unwrap()), vec!["staff only"]);
    }

    #[test]
    fn test_failed_delivery_retries() {
        let (manager, host) = manager();
        let subject = ParticipantId::random();
        host.join(Participant::new(subject, "Alex"));
        let viewer = ViewerId::new();
        let (tx, mut rx) = mpsc::channel(1);
        manager.on_viewer_join(viewer, subject, tx).unwrap();

        // bootstrap still queued, channel full
        let report = manager.tick();
        assert_eq!(report.failed, vec![viewer]);

        rx.try_recv().unwrap();
        let report = manager.tick();
        assert_eq!(report.delivered, 1);
        assert_eq!(texts(&rx.try_recv().unwrap()), vec!["welcome"]);
    }

    #[test]
    fn test_failed_delivery_holds_animation() {
        let mut defs = definitions();
        defs.tabs[0].header = vec![TextDef::Frames {
            frames: vec!["one".to_string(), "two".to_string()],
            interval: 1,
        }];
        let host = Arc::new(InMemoryHost::new());
        let manager = SessionManager::new(
            RosterSettings::default(),
            defs,
            host.clone(),
            IconCache::new(4),
            ViewerRegistry::new(),
        );
        let subject = ParticipantId::random();
        host.join(Participant::new(subject, "Alex"));
        let (tx, mut rx) = mpsc::channel(1);
        manager.on_viewer_join(ViewerId::new(), subject, tx).unwrap();

        assert_eq!(manager.tick().failed.len(), 1);
        rx.try_recv().unwrap();

        let banner = |batch: &[RosterInstruction]| {
            batch.iter().find_map(|i| match i {
                RosterInstruction::SetBanner { header, .. } => Some(header.clone()),
                _ => None,
            })
        };
        manager.tick();
        assert_eq!(banner(&rx.try_recv().unwrap()).as_deref(), Some("one"));
        manager.tick();
        assert_eq!(banner(&rx.try_recv().unwrap()).as_deref(), Some("two"));
    }

    #[test]
    fn test_leave_tears_down() {
        let (manager, host) = manager();
        let (viewer, _, mut rx) = join(&manager, &host, "Alex");
        rx.try_recv().unwrap();
        manager.tick();
        rx.try_recv().unwrap();

        manager.on_viewer_leave(&viewer);
        let teardown = rx.try_recv().unwrap();
        assert!(teardown
            .iter()
            .all(|i| matches!(i, RosterInstruction::RemoveEntry { .. })));
        assert_eq!(manager.session_count(), 0);
        assert!(!manager.viewers().contains(&viewer));
    }

    #[test]
    fn test_closed_transport_dropped_on_tick() {
        let (manager, host) = manager();
        let (viewer, _, rx) = join(&manager, &host, "Alex");
        drop(rx);

        let report = manager.tick();
        assert_eq!(report.disconnected, vec![viewer]);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_reload_rebuilds_sessions() {
        let (manager, host) = manager();
        let (_, _, mut rx) = join(&manager, &host, "Alex");
        rx.try_recv().unwrap();
        manager.tick();
        rx.try_recv().unwrap();

        let mut defs = definitions();
        defs.columns = vec![column("plain", "changed"), column("secret", "staff only")];
        manager.reload(RosterSettings::default(), defs);

        let batch = rx.try_recv().unwrap();
        let cells = GridBounds::default().len();
        assert!(batch.len() >= cells * 2);
        assert!(matches!(batch[0], RosterInstruction::RemoveEntry { .. }));
        assert!(matches!(batch[cells], RosterInstruction::InsertEntry { .. }));

        manager.tick();
        assert_eq!(texts(&rx.try_recv().unwrap()), vec!["changed"]);
    }

    #[test]
    fn test_register_icon_evicts_and_broadcasts() {
        let host = Arc::new(InMemoryHost::new());
        let manager = SessionManager::new(
            RosterSettings::default(),
            DefinitionSet::default(),
            host.clone(),
            IconCache::new(2),
            ViewerRegistry::new(),
        );
        let (_, _, mut rx) = join(&manager, &host, "Alex");
        rx.try_recv().unwrap();

        let (a, b, c) = (
            ParticipantId::random(),
            ParticipantId::random(),
            ParticipantId::random(),
        );
        for id in [a, b] {
            let result = manager.register_icon(id, IconTexture::new("t", None)).unwrap();
            assert_eq!(result.successful, 1);
            assert_eq!(rx.try_recv().unwrap().len(), 2);
        }

        manager.register_icon(c, IconTexture::new("t", None)).unwrap();
        let removal = rx.try_recv().unwrap();
        assert_eq!(
            removal,
            vec![RosterInstruction::RemoveEntry {
                identity: icon_identity(a)
            }]
        );
        assert_eq!(rx.try_recv().unwrap().len(), 2);
        assert!(!manager.icons().is_displayed(&a));
        assert_eq!(manager.icons().bulk_sync().len(), 2);
    }

    #[test]
    fn test_game_mode_broadcast() {
        let (manager, host) = manager();
        let (_, subject, mut rx) = join(&manager, &host, "Alex");
        rx.try_recv().unwrap();

        let result = manager.on_game_mode_change(subject, GameMode::Creative);
        assert!(result.all_succeeded());
        assert_eq!(
            rx.try_recv().unwrap(),
            vec![RosterInstruction::UpdateGameMode {
                identity: icon_identity(subject),
                game_mode: GameMode::Creative,
            }]
        );
    }
}
