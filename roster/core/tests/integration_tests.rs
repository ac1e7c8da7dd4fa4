//! Integration tests for the roster pipeline
//!
//! These drive a [`SessionManager`] the way a host would and replay every
//! batch into a small model of the remote roster, so assertions are made
//! against what a viewer would actually display.
//! Tests cover:
//! - Pagination of a long participant list across ticks
//! - Group weight resolution in list formatting
//! - Icon cache eviction seen by connected viewers
//! - Join bootstrap and late-join icon sync
//! - Retry after a rejected delivery
//! - Reload from a configuration file

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use roster_core::addressing::{decode, icon_identity, SlotTarget};
use roster_core::text::format::strip;
use roster_core::{
    load_definitions_from_str, load_settings_from_path, GridCoordinate, IconCache, IconTexture,
    InMemoryHost, InstructionBatch, Participant, ParticipantId, RosterInstruction, RosterSettings,
    SessionManager, ViewerId, ViewerRegistry,
};

// =============================================================================
// Remote roster model
// =============================================================================

/// What a viewer's client would show after applying every batch
#[derive(Default)]
struct RemoteRoster {
    slots: HashMap<GridCoordinate, String>,
    icons: HashMap<ParticipantId, bool>,
    banner: Option<(String, String)>,
}

impl RemoteRoster {
    fn apply(&mut self, batch: &InstructionBatch) {
        for instruction in batch {
            match instruction {
                RosterInstruction::InsertEntry {
                    identity,
                    display_text,
                    icon,
                    ..
                } => match decode(identity) {
                    Some(SlotTarget::Display(coord)) => {
                        self.slots.insert(coord, strip(display_text));
                    }
                    Some(SlotTarget::Icon(id)) => {
                        self.icons.insert(id, icon.is_some());
                    }
                    None => {}
                },
                RosterInstruction::UpdateDisplayText {
                    identity,
                    display_text,
                } => {
                    if let Some(SlotTarget::Display(coord)) = decode(identity) {
                        self.slots.insert(coord, strip(display_text));
                    }
                }
                RosterInstruction::RemoveEntry { identity } => match decode(identity) {
                    Some(SlotTarget::Display(coord)) => {
                        self.slots.remove(&coord);
                    }
                    Some(SlotTarget::Icon(id)) => {
                        self.icons.remove(&id);
                    }
                    None => {}
                },
                RosterInstruction::SetBanner { header, footer } => {
                    self.banner = Some((strip(header), strip(footer)));
                }
                RosterInstruction::UpdateLatency { .. }
                | RosterInstruction::UpdateGameMode { .. } => {}
            }
        }
    }

    fn drain(&mut self, rx: &mut mpsc::Receiver<InstructionBatch>) {
        while let Ok(batch) = rx.try_recv() {
            self.apply(&batch);
        }
    }

    fn text(&self, column: u8, row: u8) -> &str {
        self.slots
            .get(&GridCoordinate::new(column, row))
            .map_or("", String::as_str)
    }
}

fn manager_with(definitions: &str, host: Arc<InMemoryHost>, icons: IconCache) -> SessionManager {
    SessionManager::new(
        RosterSettings::default(),
        load_definitions_from_str(definitions).unwrap(),
        host,
        icons,
        ViewerRegistry::new(),
    )
}

fn connect(
    manager: &SessionManager,
    subject: ParticipantId,
    capacity: usize,
) -> (ViewerId, mpsc::Receiver<InstructionBatch>) {
    let viewer = ViewerId::new();
    let (tx, rx) = mpsc::channel(capacity);
    assert_ok!(manager.on_viewer_join(viewer, subject, tx));
    (viewer, rx)
}

// =============================================================================
// Test 1: Long lists page through
// =============================================================================

const ONLINE: &str = r#"
[[columns]]
kind = "list"
name = "online"
title = "&6Online"
page = { interval = 1 }

[[tabs]]
name = "default"
columns = [{ slot = 1, column = "online" }]
"#;

/// 45 participants on a 20-row column with titles: 17 per page plus the
/// indicator row, three pages, then back to the first.
#[test]
fn test_long_list_paginates_across_ticks() {
    let host = Arc::new(InMemoryHost::new());
    for i in 0..45 {
        host.join(Participant::new(ParticipantId::random(), format!("p{i:02}")));
    }
    let manager = manager_with(ONLINE, host.clone(), IconCache::new(16));
    let (_, mut rx) = connect(&manager, ParticipantId::random(), 16);
    let mut roster = RemoteRoster::default();
    roster.drain(&mut rx);

    manager.tick();
    roster.drain(&mut rx);
    assert_eq!(roster.text(1, 1), "Online");
    assert_eq!(roster.text(1, 3), "p00");
    assert_eq!(roster.text(1, 19), "p16");
    assert_eq!(roster.text(1, 20), "1/3");

    manager.tick();
    roster.drain(&mut rx);
    assert_eq!(roster.text(1, 3), "p17");
    assert_eq!(roster.text(1, 20), "2/3");

    manager.tick();
    roster.drain(&mut rx);
    assert_eq!(roster.text(1, 3), "p34");
    assert_eq!(roster.text(1, 13), "p44");
    assert_eq!(roster.text(1, 14), "3/3");
    assert_eq!(roster.text(1, 20), "");

    manager.tick();
    roster.drain(&mut rx);
    assert_eq!(roster.text(1, 3), "p00");
    assert_eq!(roster.text(1, 20), "1/3");
}

// =============================================================================
// Test 2: Group weights
// =============================================================================

/// A participant in groups of weight 1 and 5 is formatted by the weight-5
/// group and sorted ahead of lighter participants.
#[test]
fn test_highest_group_formats_entry() {
    let definitions = r#"
[[columns]]
kind = "list"
name = "online"
sort = "group_weight"

[[tabs]]
name = "default"
display_titles = false
columns = [{ slot = 1, column = "online" }]

[[groups]]
name = "member"
permission = "group.member"
weight = 1
display = "[M] {participant_name}"

[[groups]]
name = "admin"
permission = "group.admin"
weight = 5
display = "[A] {participant_name}"
"#;
    let host = Arc::new(InMemoryHost::new());
    let plain = ParticipantId::random();
    let both = ParticipantId::random();
    host.join(Participant::new(plain, "Plain"));
    host.join(Participant::new(both, "Boss"));
    host.grant(both, "group.member");
    host.grant(both, "group.admin");

    let manager = manager_with(definitions, host.clone(), IconCache::new(16));
    let (_, mut rx) = connect(&manager, plain, 16);
    let mut roster = RemoteRoster::default();
    manager.tick();
    roster.drain(&mut rx);

    assert_eq!(roster.text(1, 1), "[A] Boss");
    assert_eq!(roster.text(1, 2), "Plain");
}

// =============================================================================
// Test 3: Icon eviction
// =============================================================================

/// With capacity 2, registering A, B, C leaves {B, C} cached and on screen.
#[test]
fn test_icon_eviction_reaches_viewers() {
    let host = Arc::new(InMemoryHost::new());
    let manager = manager_with("", host, IconCache::new(2));
    let (_, mut rx) = connect(&manager, ParticipantId::random(), 16);
    let mut roster = RemoteRoster::default();

    let (a, b, c) = (
        ParticipantId::random(),
        ParticipantId::random(),
        ParticipantId::random(),
    );
    for id in [a, b, c] {
        assert_ok!(manager.register_icon(id, IconTexture::new("skin", None)));
    }
    roster.drain(&mut rx);

    let cached: Vec<ParticipantId> = {
        let mut keys: Vec<_> = manager.icons().snapshot().into_keys().collect();
        keys.sort();
        keys
    };
    let mut expected = vec![b, c];
    expected.sort();
    assert_eq!(cached, expected);
    assert!(!roster.icons.contains_key(&a));
    assert_eq!(roster.icons.get(&b), Some(&true));
    assert_eq!(roster.icons.get(&c), Some(&true));
}

// =============================================================================
// Test 4: Join bootstrap
// =============================================================================

/// A late joiner receives every grid slot blank plus the icon slots other
/// viewers already see, in a single batch.
#[test]
fn test_late_joiner_bootstrap() {
    let host = Arc::new(InMemoryHost::new());
    let manager = manager_with(ONLINE, host, IconCache::new(8));
    let (_, mut early) = connect(&manager, ParticipantId::random(), 16);
    early.try_recv().unwrap();

    let shown = ParticipantId::random();
    assert_ok!(manager.register_icon(shown, IconTexture::new("skin", Some("sig".into()))));

    let (_, mut late) = connect(&manager, ParticipantId::random(), 16);
    let bootstrap = late.try_recv().unwrap();
    assert_eq!(bootstrap.len(), 4 * 20 + 1);
    assert_eq!(bootstrap.last().and_then(|i| i.identity()), Some(&icon_identity(shown)));
    assert!(late.try_recv().is_err());
}

// =============================================================================
// Test 5: Transport failure
// =============================================================================

/// A viewer whose channel is full misses a tick but converges on the next
/// one, while other viewers are unaffected.
#[test]
fn test_rejected_batch_is_retried() {
    let host = Arc::new(InMemoryHost::new());
    host.join(Participant::new(ParticipantId::random(), "Alex"));
    let manager = manager_with(ONLINE, host, IconCache::new(8));

    let (slow, mut slow_rx) = connect(&manager, ParticipantId::random(), 1);
    let (_, mut fast_rx) = connect(&manager, ParticipantId::random(), 16);
    let mut fast = RemoteRoster::default();
    fast.drain(&mut fast_rx);

    let report = manager.tick();
    assert_eq!(report.failed, vec![slow]);
    assert_eq!(report.delivered, 1);
    fast.drain(&mut fast_rx);
    assert_eq!(fast.text(1, 3), "Alex");

    let mut roster = RemoteRoster::default();
    roster.drain(&mut slow_rx);
    let report = manager.tick();
    assert!(report.failed.is_empty());
    roster.drain(&mut slow_rx);
    assert_eq!(roster.text(1, 1), "Online");
    assert_eq!(roster.text(1, 3), "Alex");
}

// =============================================================================
// Test 6: Reload from file
// =============================================================================

/// Settings and definitions loaded from disk replace the running set; the
/// viewer's roster is rebuilt without reconnecting.
#[test]
fn test_reload_from_config_file() {
    let host = Arc::new(InMemoryHost::new());
    let manager = manager_with(ONLINE, host.clone(), IconCache::new(8));
    let (_, mut rx) = connect(&manager, ParticipantId::random(), 16);
    let mut roster = RemoteRoster::default();
    manager.tick();
    roster.drain(&mut rx);
    assert_eq!(roster.text(1, 1), "Online");

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[grid]
columns = 2
rows = 10

[[columns]]
kind = "static"
name = "motd"
elements = ["Welcome back"]

[[tabs]]
name = "default"
display_titles = false
columns = [{{ slot = 2, column = "motd" }}]
footer = ["&7see you"]
"#
    )
    .unwrap();
    let loaded = load_settings_from_path(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(loaded.settings.grid.rows, 10);

    manager.reload(loaded.settings, loaded.definitions);
    roster.drain(&mut rx);
    assert!(roster.slots.values().all(String::is_empty));
    assert_eq!(roster.slots.len(), 2 * 10);

    manager.tick();
    roster.drain(&mut rx);
    assert_eq!(roster.text(2, 1), "Welcome back");
    assert_eq!(roster.text(1, 1), "");
    assert_eq!(
        roster.banner,
        Some((String::new(), "see you".to_string()))
    );
}
