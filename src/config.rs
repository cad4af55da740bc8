//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults (the selector table for the current host markup)
//! 2. Global config: `$XDG_CONFIG_HOME/panorama/panorama.toml`
//! 3. Environment variables: `PANORAMA_*` prefix, `__` between sections,
//!    e.g. `PANORAMA_TIMING__DEBOUNCE_MS=300`
//!
//! List keys (`selectors.secondary`, `selectors.force_full_width`,
//! `timing.retry_delays_ms`) are split on `,` in the environment, so a list
//! entry that itself contains a comma can only be set in the config file.
//! Scalar selectors such as `selectors.sliding_panel` are never split.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Lookup expressions for host elements, by role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Primary marker (the video player)
    pub primary: String,
    /// Secondary marker candidates, first selector matching anything wins
    pub secondary: Vec<String>,
    /// Nodes that get full-width overrides on every sweep
    pub force_full_width: Vec<String>,
    /// Never resized by the sweep
    pub force_exclude: String,
    /// Slide-in panel whose transform/transition is neutralized
    pub sliding_panel: String,
    /// Host control that hides the secondary region; forced hidden
    pub visibility_toggle: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            primary: ".persistent-player".into(),
            secondary: vec![
                ".right-column".into(),
                ".right-column--chat-panel".into(),
                "[class*=\"right-column\"]".into(),
                ".chat-shell".into(),
            ],
            force_full_width: vec![
                ".right-column".into(),
                ".right-column--collapsed".into(),
                ".right-column--expanded".into(),
                ".chat-shell".into(),
                ".stream-chat".into(),
                ".chat-room".into(),
                ".tcp-chat-section".into(),
                ".tcp-chat-section > *".into(),
            ],
            force_exclude: "[class*=\"toggle-visibility\"]".into(),
            sliding_panel: ".channel-root__right-column, [class*=\"channel-root__right-column\"]"
                .into(),
            visibility_toggle:
                ".right-column__toggle-visibility, [class*=\"toggle-visibility__right-column\"]"
                    .into(),
        }
    }
}

/// Marker class names written onto host nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassConfig {
    pub root_mode: String,
    pub ancestor: String,
    pub primary_branch: String,
    pub secondary_branch: String,
}

impl Default for ClassConfig {
    fn default() -> Self {
        Self {
            root_mode: "twitch-chat-panorama-enabled".into(),
            ancestor: "tcp-panorama-container".into(),
            primary_branch: "tcp-video-section".into(),
            secondary_branch: "tcp-chat-section".into(),
        }
    }
}

/// Delays of the reconciliation loop, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Apply attempts scheduled after every enable
    pub retry_delays_ms: Vec<u64>,
    /// Quiet window before a reconciliation pass
    pub debounce_ms: u64,
    /// Wait after a location change before re-applying
    pub navigation_settle_ms: u64,
    /// Wait before reading the stored preference at start-up
    pub startup_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            retry_delays_ms: vec![100, 500, 1000],
            debounce_ms: 200,
            navigation_settle_ms: 1000,
            startup_delay_ms: 1000,
        }
    }
}

/// Where the enabled preference lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Preference key
    pub key: String,
    /// Preference file (default: `<data_dir>/panorama/preferences.toml`)
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: "twitchChatPanorama_enabled".into(),
            path: None,
        }
    }
}

/// Unified configuration for panorama.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    pub selectors: SelectorConfig,
    pub classes: ClassConfig,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
}

/// Get the XDG config directory for panorama.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "panorama").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("panorama.toml"))
}

/// Default preference file location.
pub fn default_preferences_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "panorama").map(|dirs| dirs.data_dir().join("preferences.toml"))
}

impl Settings {
    /// Load settings with layered precedence from the global config location.
    pub fn load() -> Result<Self, ApplicationError> {
        Self::load_with(global_config_path().as_deref())
    }

    /// Load settings using `config_file` as the file layer.
    ///
    /// A missing file is not an error. Tables present in the file replace the
    /// corresponding defaults field by field; arrays replace entirely.
    pub fn load_with(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(path) = config_file {
            if path.exists() {
                current = Self::from_file(path)?;
            }
        }

        Self::apply_env_overrides(current)
    }

    fn from_file(path: &Path) -> Result<Self, ApplicationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
            message: format!("read {}: {}", path.display(), e),
        })?;
        Self::from_toml(&content).map_err(|e| ApplicationError::Config {
            message: format!("parse {}: {}", path.display(), e),
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply PANORAMA_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("PANORAMA")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("timing.retry_delays_ms")
                .with_list_parse_key("selectors.secondary")
                .with_list_parse_key("selectors.force_full_width")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("selectors.primary") {
            settings.selectors.primary = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("selectors.secondary") {
            settings.selectors.secondary = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("selectors.force_full_width") {
            settings.selectors.force_full_width = val;
        }
        if let Ok(val) = config.get_string("selectors.force_exclude") {
            settings.selectors.force_exclude = val;
        }
        if let Ok(val) = config.get_string("selectors.sliding_panel") {
            settings.selectors.sliding_panel = val;
        }
        if let Ok(val) = config.get_string("selectors.visibility_toggle") {
            settings.selectors.visibility_toggle = val;
        }
        if let Ok(val) = config.get_string("classes.root_mode") {
            settings.classes.root_mode = val;
        }
        if let Ok(val) = config.get_string("classes.ancestor") {
            settings.classes.ancestor = val;
        }
        if let Ok(val) = config.get_string("classes.primary_branch") {
            settings.classes.primary_branch = val;
        }
        if let Ok(val) = config.get_string("classes.secondary_branch") {
            settings.classes.secondary_branch = val;
        }
        if let Ok(val) = config.get::<Vec<u64>>("timing.retry_delays_ms") {
            settings.timing.retry_delays_ms = val;
        }
        if let Ok(val) = config.get::<u64>("timing.debounce_ms") {
            settings.timing.debounce_ms = val;
        }
        if let Ok(val) = config.get::<u64>("timing.navigation_settle_ms") {
            settings.timing.navigation_settle_ms = val;
        }
        if let Ok(val) = config.get::<u64>("timing.startup_delay_ms") {
            settings.timing.startup_delay_ms = val;
        }
        if let Ok(val) = config.get_string("storage.key") {
            settings.storage.key = val;
        }
        if let Ok(val) = config.get_string("storage.path") {
            settings.storage.path = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Preference file to use, explicit path first.
    pub fn preferences_path(&self) -> Option<PathBuf> {
        self.storage.path.clone().or_else(default_preferences_path)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# panorama configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/panorama/panorama.toml
#   Env:    PANORAMA_* environment variables, e.g. PANORAMA_TIMING__DEBOUNCE_MS=300
#
# Only the keys you set replace the compiled defaults.

[selectors]
# primary = ".persistent-player"
# secondary = [".right-column", ".right-column--chat-panel", "[class*=\"right-column\"]", ".chat-shell"]
# force_exclude = "[class*=\"toggle-visibility\"]"

[classes]
# ancestor = "tcp-panorama-container"

[timing]
# retry_delays_ms = [100, 500, 1000]
# debounce_ms = 200
# navigation_settle_ms = 1000
# startup_delay_ms = 1000

[storage]
# key = "twitchChatPanorama_enabled"
# path = "/tmp/panorama-preferences.toml"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
