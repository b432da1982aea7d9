//! Integration tests for engine settings persistence.

use std::fs;
use std::time::Duration;

use inspectmaker::config::{BrowserKind, BrowserSetting, ConfigError, EngineSettings, MatchMode};
use tempfile::TempDir;

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let settings = EngineSettings::load_from(&temp_dir.path().join("config.yaml"))
        .expect("missing file should load");

    assert_eq!(settings, EngineSettings::default());
    assert_eq!(settings.url_poll_interval(), Duration::from_millis(1000));
}

#[test]
fn test_save_and_reload() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("nested").join("config.yaml");
    let settings = EngineSettings {
        browser: BrowserSetting::Firefox,
        url_poll_interval_ms: 250,
        url_matching: MatchMode::Anchored,
        log_level: "debug".to_string(),
        ..EngineSettings::default()
    };

    settings.save_to(&path).expect("save should succeed");
    let loaded = EngineSettings::load_from(&path).expect("reload should succeed");

    assert_eq!(loaded, settings);
    assert!(!path.with_extension("yaml.tmp").exists(), "temp file renamed away");
    assert_eq!(loaded.log_level_filter(), log::LevelFilter::Debug);
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "url_matching: anchored\nurl_poll_interval_ms: 0\n").unwrap();

    let settings = EngineSettings::load_from(&path).expect("partial file should load");

    assert_eq!(settings.url_matching, MatchMode::Anchored);
    assert_eq!(settings.browser, BrowserSetting::Auto);
    assert_eq!(
        settings.bridge_resource_url,
        EngineSettings::default().bridge_resource_url
    );
    assert_eq!(settings.url_poll_interval(), Duration::from_millis(1000));
}

#[test]
fn test_empty_resource_url_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "bridge_resource_url: \"  \"\n").unwrap();

    let result = EngineSettings::load_from(&path);

    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_unknown_log_level_falls_back_to_info() {
    let settings = EngineSettings {
        log_level: "chatty".to_string(),
        ..EngineSettings::default()
    };
    assert_eq!(settings.log_level_filter(), log::LevelFilter::Info);
}

#[test]
fn test_fixed_browser_ignores_detection() {
    assert_eq!(
        BrowserSetting::Edge.resolve("Mozilla/5.0 Firefox/128.0", true),
        BrowserKind::Edge
    );
    assert_eq!(
        BrowserSetting::Auto.resolve("Mozilla/5.0 Firefox/128.0", true),
        BrowserKind::Firefox
    );
}
