//! Integration tests for Settings layered loading.
//!
//! Precedence:
//! - Defaults → File: tables REPLACE field by field, arrays REPLACE entirely
//! - Any → Env vars (`PANORAMA_*`): REPLACE (explicit user override)
//!
//! Note: These tests only touch temp directories; the global config location is never read.
//! Every test runs `#[serial]` because the environment layer is process-wide.

use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use panorama::application::ApplicationError;
use panorama::config::Settings;

// ============================================================
// Settings::load_with() file layer tests
// ============================================================

#[test]
#[serial]
fn given_config_file_when_load_with_then_file_values_replace_defaults() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("panorama.toml");
    let content = r#"
[selectors]
primary = ".video-player"
secondary = [".chat-column"]

[timing]
retry_delays_ms = [50, 250]
navigation_settle_ms = 1500
"#;
    fs::write(&path, content).unwrap();

    // Act
    let settings = Settings::load_with(Some(path.as_path())).expect("load settings");

    // Assert
    assert_eq!(settings.selectors.primary, ".video-player");
    assert_eq!(settings.selectors.secondary, vec![".chat-column".to_string()]);
    assert_eq!(settings.timing.retry_delays_ms, vec![50, 250]);
    assert_eq!(settings.timing.navigation_settle_ms, 1500);
    // Untouched keys keep compiled defaults
    assert_eq!(settings.timing.startup_delay_ms, 1000);
    assert_eq!(settings.classes.ancestor, "tcp-panorama-container");
    assert!(settings
        .selectors
        .force_full_width
        .contains(&".tcp-chat-section > *".to_string()));
}

#[test]
#[serial]
fn given_missing_config_file_when_load_with_then_defaults() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.toml");

    // Act
    let settings = Settings::load_with(Some(path.as_path())).expect("load settings");

    // Assert
    assert_eq!(settings.selectors, Settings::default().selectors);
    assert_eq!(settings.classes, Settings::default().classes);
}

#[test]
#[serial]
fn given_malformed_config_file_when_load_with_then_config_error() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("panorama.toml");
    fs::write(&path, "[timing\ndebounce_ms = ").unwrap();

    // Act
    let result = Settings::load_with(Some(path.as_path()));

    // Assert
    match result {
        Err(ApplicationError::Config { message }) => {
            assert!(message.contains("panorama.toml"), "message: {message}")
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
#[serial]
fn given_explicit_storage_path_in_file_when_load_with_then_preferences_path_uses_it() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("panorama.toml");
    let prefs = temp.path().join("prefs.toml");
    fs::write(
        &path,
        format!("[storage]\npath = {:?}\n", prefs.to_string_lossy()),
    )
    .unwrap();

    // Act
    let settings = Settings::load_with(Some(path.as_path())).expect("load settings");

    // Assert
    assert_eq!(settings.preferences_path(), Some(prefs));
}

// ============================================================
// Environment override tests
// ============================================================

/// Sets environment variables for one test and removes them on drop.
struct EnvGuard(Vec<&'static str>);

impl EnvGuard {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        Self(vars.iter().map(|(name, _)| *name).collect())
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for name in &self.0 {
            std::env::remove_var(name);
        }
    }
}

#[test]
#[serial]
fn given_env_override_when_load_with_then_env_wins_over_file() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("panorama.toml");
    fs::write(&path, "[storage]\nkey = \"from_file\"\n").unwrap();
    let _env = EnvGuard::set(&[("PANORAMA_STORAGE__KEY", "from_env")]);

    // Act
    let settings = Settings::load_with(Some(path.as_path())).expect("load settings");

    // Assert
    assert_eq!(settings.storage.key, "from_env");
}

#[test]
#[serial]
fn given_env_timing_overrides_when_load_with_then_scalar_and_list_keys_applied() {
    // Arrange
    let _env = EnvGuard::set(&[
        ("PANORAMA_TIMING__DEBOUNCE_MS", "321"),
        ("PANORAMA_TIMING__RETRY_DELAYS_MS", "50,250"),
    ]);

    // Act
    let settings = Settings::load_with(None).expect("load settings");

    // Assert
    assert_eq!(settings.timing.debounce_ms, 321);
    assert_eq!(settings.timing.retry_delays_ms, vec![50, 250]);
    assert_eq!(settings.timing.navigation_settle_ms, 1000);
}

#[test]
#[serial]
fn given_env_selector_list_when_load_with_then_split_on_comma() {
    // Arrange
    let _env = EnvGuard::set(&[("PANORAMA_SELECTORS__SECONDARY", ".chat-a,.chat-b")]);

    // Act
    let settings = Settings::load_with(None).expect("load settings");

    // Assert
    assert_eq!(
        settings.selectors.secondary,
        vec![".chat-a".to_string(), ".chat-b".to_string()]
    );
}

#[test]
#[serial]
fn given_env_scalar_selector_with_comma_when_load_with_then_kept_whole() {
    // Arrange
    let _env = EnvGuard::set(&[
        ("PANORAMA_SELECTORS__SLIDING_PANEL", ".panel, .drawer"),
        ("PANORAMA_CLASSES__ANCESTOR", "my-container"),
    ]);

    // Act
    let settings = Settings::load_with(None).expect("load settings");

    // Assert
    assert_eq!(settings.selectors.sliding_panel, ".panel, .drawer");
    assert_eq!(settings.classes.ancestor, "my-container");
    assert_eq!(settings.classes.root_mode, "twitch-chat-panorama-enabled");
}

// ============================================================
// Template tests
// ============================================================

#[test]
#[serial]
fn given_template_when_written_as_config_then_loads_as_defaults() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("panorama.toml");
    fs::write(&path, Settings::template()).unwrap();

    // Act
    let settings = Settings::load_with(Some(path.as_path())).expect("load settings");

    // Assert
    assert_eq!(settings.selectors, Settings::default().selectors);
    assert_eq!(settings.timing, Settings::default().timing);
}
