//! TOML Configuration File Support
//!
//! Settings and declarative definitions are read from one TOML file at
//! `$XDG_CONFIG_HOME/roster/roster.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`ROSTER_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! default_tab = "default"
//!
//! [grid]
//! columns = 4
//! rows = 20
//! column_width = 70
//!
//! [render]
//! tick_interval_ms = 50
//! refresh_interval_ticks = 100
//! page_interval_ticks = 100
//! page_text = "&7{current_page}&8/&7{max_page}"
//! bold_compensation = 0.125
//! trim_margin = 4
//! display_titles = true
//!
//! [icons]
//! max_entries = 5000
//! ```
//!
//! Tabs, columns, groups and icon presets live in the same file; see
//! [`definitions`].

pub mod definitions;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::addressing::{GridBounds, MAX_ROWS};
use crate::icon_cache::DEFAULT_MAX_ICON_ENTRIES;
use crate::text::TrimRule;

pub use definitions::{load_definitions_from_str, DefinitionSet};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Grid section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridToml {
    /// Number of grid columns
    pub columns: Option<u8>,
    /// Rows per column
    pub rows: Option<u8>,
    /// Printable width of one column
    pub column_width: Option<usize>,
}

/// Render section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Scheduler period in milliseconds
    pub tick_interval_ms: Option<u64>,
    /// Ticks between content refreshes
    pub refresh_interval_ticks: Option<i32>,
    /// Ticks between page turns
    pub page_interval_ticks: Option<i32>,
    /// Page indicator text
    pub page_text: Option<String>,
    /// Extra visual width per bold character
    pub bold_compensation: Option<f32>,
    /// Characters kept free when trimming
    pub trim_margin: Option<usize>,
    /// Show title and spacer rows
    pub display_titles: Option<bool>,
}

/// Icons section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IconsToml {
    /// Icon cache capacity
    pub max_entries: Option<usize>,
}

/// Top-level TOML configuration structure
///
/// Definition arrays are read separately by [`load_definitions_from_str`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterToml {
    /// Tab used when no weighted tab matches
    pub default_tab: Option<String>,
    /// Grid section
    pub grid: GridToml,
    /// Render section
    pub render: RenderToml,
    /// Icons section
    pub icons: IconsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved roster settings
#[derive(Clone, Debug, PartialEq)]
pub struct RosterSettings {
    /// Grid size
    pub grid: GridBounds,
    /// Printable width of one column
    pub column_width: usize,
    /// Scheduler period
    pub tick_interval: Duration,
    /// Ticks between content refreshes
    pub refresh_interval_ticks: i32,
    /// Ticks between page turns
    pub page_interval_ticks: i32,
    /// Page indicator text
    pub page_text: String,
    /// Extra visual width per bold character
    pub bold_compensation: f32,
    /// Characters kept free when trimming
    pub trim_margin: usize,
    /// Show title and spacer rows
    pub display_titles: bool,
    /// Icon cache capacity
    pub max_icon_entries: usize,
    /// Tab used when no weighted tab matches
    pub default_tab: String,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    pub(crate) source: ConfigSource,
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            grid: GridBounds::default(),
            column_width: 70,
            tick_interval: Duration::from_millis(50),
            refresh_interval_ticks: 100,
            page_interval_ticks: 100,
            page_text: "&7{current_page}&8/&7{max_page}".to_string(),
            bold_compensation: 0.125,
            trim_margin: 4,
            display_titles: true,
            max_icon_entries: DEFAULT_MAX_ICON_ENTRIES,
            default_tab: "default".to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RosterSettings {
    /// Create settings with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of these settings
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Trimming rule for one column
    #[must_use]
    pub fn trim_rule(&self) -> TrimRule {
        TrimRule {
            width: self.column_width,
            bold_compensation: self.bold_compensation,
            margin: self.trim_margin,
        }
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        GridBounds::new(self.grid.columns, self.grid.rows)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if self.column_width == 0 {
            return Err(ConfigError::ValidationError(
                "column_width must be at least 1".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        if !self.bold_compensation.is_finite() || self.bold_compensation < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "bold_compensation must be a non-negative number, got {}",
                self.bold_compensation
            )));
        }
        Ok(())
    }
}

/// Settings plus the definitions read from the same file
#[derive(Clone, Debug, Default)]
pub struct LoadedConfig {
    /// Resolved settings
    pub settings: RosterSettings,
    /// Definitions, already validated against the settings
    pub definitions: DefinitionSet,
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/roster/roster.toml` or
/// `~/.config/roster/roster.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("roster").join("roster.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// resulting settings are invalid. A missing config file is not an error.
pub fn load_settings() -> Result<LoadedConfig, ConfigError> {
    load_settings_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// the resulting settings are invalid.
pub fn load_settings_from_path(path: Option<PathBuf>) -> Result<LoadedConfig, ConfigError> {
    let mut settings = RosterSettings::default();
    let mut definitions = DefinitionSet::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let content = read_config_file(config_path)?;
            let toml_config: RosterToml = toml::from_str(&content)?;
            apply_toml_config(&mut settings, &toml_config);
            definitions = load_definitions_from_str(&content)?;
            settings.config_file_path = Some(config_path.clone());
            settings.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut settings);
    settings.validate()?;

    let definitions = definitions.validated(&settings);
    Ok(LoadedConfig {
        settings,
        definitions,
    })
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply TOML configuration values to the settings
fn apply_toml_config(settings: &mut RosterSettings, toml: &RosterToml) {
    if let Some(ref tab) = toml.default_tab {
        settings.default_tab.clone_from(tab);
    }

    if let Some(columns) = toml.grid.columns {
        settings.grid.columns = columns;
    }
    if let Some(rows) = toml.grid.rows {
        settings.grid.rows = rows;
    }
    if let Some(width) = toml.grid.column_width {
        settings.column_width = width;
    }

    if let Some(ms) = toml.render.tick_interval_ms {
        settings.tick_interval = Duration::from_millis(ms);
    }
    if let Some(ticks) = toml.render.refresh_interval_ticks {
        settings.refresh_interval_ticks = ticks;
    }
    if let Some(ticks) = toml.render.page_interval_ticks {
        settings.page_interval_ticks = ticks;
    }
    if let Some(ref text) = toml.render.page_text {
        settings.page_text.clone_from(text);
    }
    if let Some(compensation) = toml.render.bold_compensation {
        settings.bold_compensation = compensation;
    }
    if let Some(margin) = toml.render.trim_margin {
        settings.trim_margin = margin;
    }
    if let Some(titles) = toml.render.display_titles {
        settings.display_titles = titles;
    }

    if let Some(max) = toml.icons.max_entries {
        settings.max_icon_entries = max;
    }
}

/// Apply environment variable overrides to the settings
fn apply_env_config(settings: &mut RosterSettings) {
    apply_env_from(settings, |key| std::env::var(key).ok());
}

fn apply_env_from(settings: &mut RosterSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(ms) = var("ROSTER_TICK_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.tick_interval = Duration::from_millis(ms);
        settings.source = ConfigSource::Env;
    }
    if let Some(columns) = var("ROSTER_COLUMNS").and_then(|v| v.parse::<u8>().ok()) {
        settings.grid.columns = columns;
        settings.source = ConfigSource::Env;
    }
    if let Some(rows) = var("ROSTER_ROWS").and_then(|v| v.parse::<u8>().ok()) {
        settings.grid.rows = rows;
        settings.source = ConfigSource::Env;
    }
    if let Some(width) = var("ROSTER_COLUMN_WIDTH").and_then(|v| v.parse::<usize>().ok()) {
        settings.column_width = width;
        settings.source = ConfigSource::Env;
    }
    if let Some(max) = var("ROSTER_MAX_ICONS").and_then(|v| v.parse::<usize>().ok()) {
        settings.max_icon_entries = max;
        settings.source = ConfigSource::Env;
    }
    if let Some(tab) = var("ROSTER_DEFAULT_TAB") {
        settings.default_tab = tab;
        settings.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to settings
///
/// Use this after [`load_settings`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Scheduler period override (milliseconds)
    pub tick_interval_ms: Option<u64>,

    /// Grid column count override
    pub columns: Option<u8>,

    /// Grid row count override
    pub rows: Option<u8>,

    /// Default tab override
    pub default_tab: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scheduler period override
    #[must_use]
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = Some(ms);
        self
    }

    /// Set grid column count override
    #[must_use]
    pub fn with_columns(mut self, columns: u8) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Set grid row count override
    #[must_use]
    pub fn with_rows(mut self, rows: u8) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Set default tab override
    #[must_use]
    pub fn with_default_tab(mut self, tab: String) -> Self {
        self.default_tab = Some(tab);
        self
    }

    /// Apply overrides to settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the overridden settings
    /// are invalid; `settings` is left untouched in that case.
    pub fn apply(&self, settings: &mut RosterSettings) -> Result<(), ConfigError> {
        let mut next = settings.clone();

        if self.tick_interval_ms.is_some()
            || self.columns.is_some()
            || self.rows.is_some()
            || self.default_tab.is_some()
        {
            next.source = ConfigSource::Cli;
        }

        if let Some(ms) = self.tick_interval_ms {
            next.tick_interval = Duration::from_millis(ms);
        }
        if let Some(columns) = self.columns {
            next.grid.columns = columns;
        }
        if let Some(rows) = self.rows {
            next.grid.rows = rows;
        }
        if let Some(ref tab) = self.default_tab {
            next.default_tab.clone_from(tab);
        }

        next.validate()?;
        *settings = next;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
