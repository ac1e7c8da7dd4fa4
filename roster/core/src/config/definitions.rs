//! Declarative Definitions - Tabs, Columns, Groups and Icon Presets
//!
//! Definitions live in the same TOML file as the settings:
//!
//! ```toml
//! [[columns]]
//! kind = "list"
//! name = "online"
//! title = "&6&lOnline"
//! sort = "group_weight"
//!
//! [[columns]]
//! kind = "static"
//! name = "info"
//! title = { frames = ["&aInfo", "&2Info"], interval = 20 }
//! elements = [
//!     "Welcome!",
//!     { text = { scroll = "A very long scrolling announcement", width = 16 } },
//!     { text = "Staff only", permission = "roster.staff", icon = "crown" },
//! ]
//!
//! [[tabs]]
//! name = "default"
//! columns = [{ slot = 1, column = "online" }, { slot = 2, column = "info" }]
//! header = ["&lWelcome"]
//!
//! [[groups]]
//! name = "admin"
//! permission = "group.admin"
//! weight = 5
//! display = "&c[Admin] &f{participant_name}"
//!
//! [[icons.presets]]
//! name = "crown"
//! value = "e3RleHR1cmVzOnt9fQ=="
//! ```
//!
//! Every definition is deserialized on its own. A malformed one is logged
//! and skipped; the rest still load.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ConfigError, RosterSettings};
use crate::content::SortRule;
use crate::error::RosterError;
use crate::groups::Weighted;
use crate::instructions::{IconTexture, Latency};
use crate::text::{AnimatedText, Cooldown, FrameText, ScrollingText};

// =============================================================================
// Text
// =============================================================================

/// Configured text: a plain string, a frame list or a scrolling string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TextDef {
    /// Static text
    Plain(String),
    /// Frame-cycling text
    Frames {
        /// Frames shown in order
        frames: Vec<String>,
        /// Ticks between frames; negative keeps frame 0
        #[serde(default = "disabled_interval")]
        interval: i32,
    },
    /// Scrolling text
    Scrolling {
        /// Text to scroll
        scroll: String,
        /// Window width in printable characters
        width: usize,
        /// Ticks between steps
        #[serde(default = "default_scroll_interval")]
        interval: i32,
    },
}

fn disabled_interval() -> i32 {
    -1
}

fn default_scroll_interval() -> i32 {
    1
}

impl Default for TextDef {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

impl From<&str> for TextDef {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl TextDef {
    /// Build fresh animation state
    #[must_use]
    pub fn build(&self) -> AnimatedText {
        match self {
            Self::Plain(text) => AnimatedText::fixed(text.clone()),
            Self::Frames { frames, interval } => {
                FrameText::new(frames.clone(), Cooldown::new(*interval)).into()
            }
            Self::Scrolling {
                scroll,
                width,
                interval,
            } => ScrollingText::new(scroll.clone(), *width, Cooldown::new(*interval)).into(),
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

/// One element of a static column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "EntryRepr")]
pub struct EntryDef {
    /// Text shown
    pub text: TextDef,
    /// Named icon preset
    pub icon: Option<String>,
    /// Latency bucket
    pub latency: Latency,
    /// Pad the text to the middle of the column
    pub center: bool,
    /// Permission the viewer needs to see the entry; empty shows it to all
    pub permission: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Full {
        text: TextDef,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        latency: Latency,
        #[serde(default)]
        center: bool,
        #[serde(default)]
        permission: String,
    },
    Short(TextDef),
}

impl From<EntryRepr> for EntryDef {
    fn from(repr: EntryRepr) -> Self {
        match repr {
            EntryRepr::Full {
                text,
                icon,
                latency,
                center,
                permission,
            } => Self {
                text,
                icon,
                latency,
                center,
                permission,
            },
            EntryRepr::Short(text) => text.into(),
        }
    }
}

impl From<TextDef> for EntryDef {
    fn from(text: TextDef) -> Self {
        Self {
            text,
            icon: None,
            latency: Latency::default(),
            center: false,
            permission: String::new(),
        }
    }
}

/// Paging options of a column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageDef {
    /// Whether long lists page
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Cap on the reported page count
    #[serde(default)]
    pub max_pages: Option<usize>,
    /// Ticks between pages, overriding the global interval
    #[serde(default)]
    pub interval: Option<i32>,
    /// Indicator text, overriding the global one
    #[serde(default)]
    pub text: Option<String>,
}

fn enabled() -> bool {
    true
}

impl Default for PageDef {
    fn default() -> Self {
        Self {
            enabled: true,
            max_pages: None,
            interval: None,
            text: None,
        }
    }
}

/// A column of fixed entries
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticColumnDef {
    /// Name tabs refer to
    pub name: String,
    /// Title row text
    #[serde(default)]
    pub title: TextDef,
    /// Paging options
    #[serde(default)]
    pub page: PageDef,
    /// Entries in order
    #[serde(default)]
    pub elements: Vec<EntryDef>,
}

/// A column listing live participants
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListColumnDef {
    /// Name tabs refer to
    pub name: String,
    /// Title row text
    #[serde(default)]
    pub title: TextDef,
    /// Paging options
    #[serde(default)]
    pub page: PageDef,
    /// Ordering
    #[serde(default)]
    pub sort: SortRule,
    /// Host variable read by variable sort rules
    #[serde(default)]
    pub sort_variable: Option<String>,
    /// Text of each participant's row, unless their group overrides it
    #[serde(default = "default_element")]
    pub element: TextDef,
    /// Permission a participant needs to be listed
    #[serde(default)]
    pub permission: String,
    /// Pad rows to the middle of the column
    #[serde(default)]
    pub center: bool,
}

fn default_element() -> TextDef {
    TextDef::Plain("{participant_name}".to_string())
}

/// A column definition, told apart by its `kind`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnDef {
    /// Fixed entries
    Static(StaticColumnDef),
    /// Live participants
    List(ListColumnDef),
}

impl ColumnDef {
    /// Name tabs refer to
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Static(def) => &def.name,
            Self::List(def) => &def.name,
        }
    }

    /// Title row text
    #[must_use]
    pub fn title(&self) -> &TextDef {
        match self {
            Self::Static(def) => &def.title,
            Self::List(def) => &def.title,
        }
    }

    /// Paging options
    #[must_use]
    pub fn page(&self) -> &PageDef {
        match self {
            Self::Static(def) => &def.page,
            Self::List(def) => &def.page,
        }
    }
}

// =============================================================================
// Tabs, Groups, Presets
// =============================================================================

/// Placement of a column on the grid
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabColumnDef {
    /// Grid column, from 1
    pub slot: u8,
    /// Column name
    pub column: String,
}

/// A full layout shown to viewers holding its permission
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabDef {
    /// Tab name
    pub name: String,
    /// Permission the viewer needs; empty matches everyone
    #[serde(default)]
    pub permission: String,
    /// Selection weight
    #[serde(default)]
    pub weight: i32,
    /// Show title and spacer rows, overriding the global setting
    #[serde(default)]
    pub display_titles: Option<bool>,
    /// Columns on the grid
    #[serde(default)]
    pub columns: Vec<TabColumnDef>,
    /// Header lines
    #[serde(default)]
    pub header: Vec<TextDef>,
    /// Footer lines
    #[serde(default)]
    pub footer: Vec<TextDef>,
}

impl Weighted for TabDef {
    fn weight(&self) -> i32 {
        self.weight
    }

    fn permission(&self) -> &str {
        &self.permission
    }
}

/// A participant group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupDef {
    /// Group name
    pub name: String,
    /// Permission marking membership; empty matches everyone
    #[serde(default)]
    pub permission: String,
    /// Selection weight
    #[serde(default)]
    pub weight: i32,
    /// Row text for members in list columns
    #[serde(default)]
    pub display: Option<TextDef>,
}

impl Weighted for GroupDef {
    fn weight(&self) -> i32 {
        self.weight
    }

    fn permission(&self) -> &str {
        &self.permission
    }
}

/// A named, pinned icon
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IconPresetDef {
    /// Lookup name
    pub name: String,
    /// Encoded texture
    pub value: String,
    /// Texture signature
    #[serde(default)]
    pub signature: Option<String>,
}

impl IconPresetDef {
    /// Texture carried by the preset
    #[must_use]
    pub fn texture(&self) -> IconTexture {
        IconTexture::new(self.value.clone(), self.signature.clone())
    }
}

// =============================================================================
// Definition Set
// =============================================================================

/// Every loaded definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSet {
    /// Tabs in registration order
    pub tabs: Vec<TabDef>,
    /// Columns in registration order
    pub columns: Vec<ColumnDef>,
    /// Groups in registration order
    pub groups: Vec<GroupDef>,
    /// Icon presets
    pub icon_presets: Vec<IconPresetDef>,
}

impl DefinitionSet {
    /// Column by name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Tab by name
    #[must_use]
    pub fn tab(&self, name: &str) -> Option<&TabDef> {
        self.tabs.iter().find(|t| t.name == name)
    }

    /// Drop whatever the grid cannot show
    ///
    /// Duplicate names keep the first definition, and list columns sorted by
    /// a variable without naming one are dropped. Tab placements outside the
    /// grid, onto an occupied slot, or naming an unknown column are removed
    /// from their tab.
    #[must_use]
    pub fn validated(mut self, settings: &RosterSettings) -> Self {
        let mut seen = HashSet::new();
        self.columns.retain(|column| {
            if let ColumnDef::List(list) = column {
                let missing = !matches!(list.sort_variable.as_deref(), Some(v) if !v.is_empty());
                if list.sort.needs_variable() && missing {
                    skip(&RosterError::configuration(
                        column.name(),
                        format!("sort rule {:?} needs a sort_variable", list.sort),
                    ));
                    return false;
                }
            }
            let fresh = seen.insert(column.name().to_string());
            if !fresh {
                skip(&RosterError::configuration(column.name(), "duplicate column name"));
            }
            fresh
        });

        let mut seen = HashSet::new();
        self.tabs.retain(|tab| {
            let fresh = seen.insert(tab.name.clone());
            if !fresh {
                skip(&RosterError::configuration(&tab.name, "duplicate tab name"));
            }
            fresh
        });

        let columns = settings.grid.columns;
        let known: HashSet<String> = self.columns.iter().map(|c| c.name().to_string()).collect();
        for tab in &mut self.tabs {
            let mut used = HashSet::new();
            let name = tab.name.clone();
            tab.columns.retain(|placement| {
                let reason = if !(1..=columns).contains(&placement.slot) {
                    Some(format!("slot {} outside 1..={columns}", placement.slot))
                } else if !known.contains(&placement.column) {
                    Some(format!("unknown column '{}'", placement.column))
                } else if !used.insert(placement.slot) {
                    Some(format!("slot {} used twice", placement.slot))
                } else {
                    None
                };
                if let Some(reason) = &reason {
                    skip(&RosterError::configuration(format!("tabs.{name}"), reason.as_str()));
                }
                reason.is_none()
            });
        }

        self
    }
}

/// Parse every definition table out of a TOML document
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] only when the document itself is not
/// valid TOML. Individual definitions that fail are logged and skipped.
pub fn load_definitions_from_str(content: &str) -> Result<DefinitionSet, ConfigError> {
    let table: toml::Table = toml::from_str(content)?;

    let presets = table
        .get("icons")
        .and_then(|icons| icons.get("presets"));

    let set = DefinitionSet {
        tabs: parse_each("tabs", table.get("tabs")),
        columns: parse_each("columns", table.get("columns")),
        groups: parse_each("groups", table.get("groups")),
        icon_presets: parse_each("icons.presets", presets),
    };

    tracing::debug!(
        tabs = set.tabs.len(),
        columns = set.columns.len(),
        groups = set.groups.len(),
        presets = set.icon_presets.len(),
        "Parsed definitions"
    );
    Ok(set)
}

fn parse_each<T: DeserializeOwned>(key: &str, value: Option<&toml::Value>) -> Vec<T> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        skip(&RosterError::configuration(key, "expected an array of tables"));
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item.clone().try_into::<T>() {
            Ok(def) => Some(def),
            Err(e) => {
                skip(&RosterError::configuration(format!("{key}[{index}]"), e.to_string()));
                None
            }
        })
        .collect()
}

fn skip(error: &RosterError) {
    tracing::warn!(%error, "Skipping definition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[[columns]]
kind = "list"
name = "online"
title = "&6Online"
sort = "number_variable"
sort_variable = "kills"

[[columns]]
kind = "static"
name = "info"
title = { frames = ["a", "b"], interval = 20 }
page = { enabled = false }
elements = [
    "Welcome",
    { text = { scroll = "long text here", width = 4 } },
    { text = "Staff", permission = "roster.staff", icon = "crown", latency = "three", center = true },
]

[[columns]]
kind = "carousel"
name = "broken"

[[tabs]]
name = "default"
columns = [{ slot = 1, column = "online" }, { slot = 2, column = "info" }]
header = ["top"]

[[groups]]
name = "admin"
permission = "group.admin"
weight = 5
display = "&c{participant_name}"

[[icons.presets]]
name = "crown"
value = "abc"
"#;

    #[test]
    fn test_parse_sample() {
        let set = load_definitions_from_str(SAMPLE).unwrap();
        assert_eq!(set.columns.len(), 2);
        assert_eq!(set.tabs.len(), 1);
        assert_eq!(set.groups.len(), 1);
        assert_eq!(set.icon_presets.len(), 1);

        match set.column("online") {
            Some(ColumnDef::List(list)) => {
                assert_eq!(list.sort, SortRule::NumberVariable);
                assert_eq!(list.sort_variable.as_deref(), Some("kills"));
                assert_eq!(list.element, TextDef::Plain("{participant_name}".to_string()));
                assert!(list.page.enabled);
            }
            other => panic!("expected list column, got {other:?}"),
        }
    }

    #[test]
    fn test_static_elements_short_and_full_forms() {
        let set = load_definitions_from_str(SAMPLE).unwrap();
        let Some(ColumnDef::Static(info)) = set.column("info") else {
            panic!("expected static column");
        };
        assert!(!info.page.enabled);
        assert_eq!(
            info.title,
            TextDef::Frames {
                frames: vec!["a".to_string(), "b".to_string()],
                interval: 20
            }
        );
        assert_eq!(info.elements[0], EntryDef::from(TextDef::from("Welcome")));
        assert!(matches!(info.elements[1].text, TextDef::Scrolling { width: 4, interval: 1, .. }));

        let staff = &info.elements[2];
        assert_eq!(staff.icon.as_deref(), Some("crown"));
        assert_eq!(staff.latency, Latency::Three);
        assert!(staff.center);
        assert_eq!(staff.permission, "roster.staff");
    }

    #[test]
    fn test_malformed_definition_is_skipped() {
        let set = load_definitions_from_str(
            r#"
[[groups]]
name = "ok"

[[groups]]
weight = "heavy"
"#,
        )
        .unwrap();
        assert_eq!(set.groups.len(), 1);
        assert_eq!(set.groups[0].name, "ok");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            load_definitions_from_str("[[columns]\nkind ="),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validated_drops_bad_placements() {
        let set = load_definitions_from_str(
            r#"
[[columns]]
kind = "static"
name = "a"

[[columns]]
kind = "static"
name = "a"

[[tabs]]
name = "t"
columns = [
    { slot = 1, column = "a" },
    { slot = 9, column = "a" },
    { slot = 2, column = "missing" },
    { slot = 1, column = "a" },
]
"#,
        )
        .unwrap()
        .validated(&RosterSettings::default());

        assert_eq!(set.columns.len(), 1);
        assert_eq!(
            set.tabs[0].columns,
            vec![TabColumnDef {
                slot: 1,
                column: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_variable_sort_without_variable_is_dropped() {
        let set = load_definitions_from_str(
            r#"
[[columns]]
kind = "list"
name = "top"
sort = "number_variable"

[[columns]]
kind = "list"
name = "kills"
sort = "number_variable"
sort_variable = "kills"

[[tabs]]
name = "t"
columns = [{ slot = 1, column = "top" }, { slot = 2, column = "kills" }]
"#,
        )
        .unwrap()
        .validated(&RosterSettings::default());

        assert_eq!(set.columns.len(), 1);
        assert_eq!(set.columns[0].name(), "kills");
        assert_eq!(
            set.tabs[0].columns,
            vec![TabColumnDef {
                slot: 2,
                column: "kills".to_string()
            }]
        );
    }

    #[test]
    fn test_text_def_build() {
        let mut frames = TextDef::Frames {
            frames: vec!["x".to_string(), "y".to_string()],
            interval: 1,
        }
        .build();
        frames.advance();
        assert_eq!(frames.visible(), "y");

        let plain = TextDef::from("static").build();
        assert_eq!(plain.visible(), "static");
    }
}
