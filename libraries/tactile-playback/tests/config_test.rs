//! Configuration loading tests

use std::io::Write;
use tactile_playback::{PlaybackConfig, PlaybackError};

fn config_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_without_file() {
    let config = PlaybackConfig::load(None).unwrap();
    assert_eq!(config.default_priority, 128);
    assert_eq!(config.session_lifetime_secs, 30.0);
}

#[test]
fn toml_file_overrides_defaults() {
    let file = config_file(
        ".toml",
        r#"
            default_priority = 64
            session_lifetime_secs = 10.0
            rotation_margin_secs = 0.5
            derive_gamepad_rumble = false
        "#,
    );

    let config = PlaybackConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.default_priority, 64);
    assert_eq!(config.rotation_after_secs(), 9.5);
    assert!(!config.derive_gamepad_rumble);
    assert_eq!(config.min_ramp_duration_secs, 0.001);
}

#[test]
fn json_file_is_accepted() {
    let file = config_file(".json", r#"{ "on_off_threshold": 0.25 }"#);
    let config = PlaybackConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.on_off_threshold, 0.25);
}

#[test]
fn inconsistent_file_is_rejected() {
    let file = config_file(
        ".toml",
        r#"
            session_lifetime_secs = 1.0
            rotation_margin_secs = 2.0
        "#,
    );
    assert!(matches!(
        PlaybackConfig::load(Some(file.path())),
        Err(PlaybackError::Config(_))
    ));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(
        PlaybackConfig::load(Some(&path)),
        Err(PlaybackError::Config(_))
    ));
}

#[test]
fn environment_overrides_file() {
    std::env::set_var("TACTILE_FALLBACK_PRESET", "buzz");
    let config = PlaybackConfig::load(None).unwrap();
    std::env::remove_var("TACTILE_FALLBACK_PRESET");
    assert_eq!(config.fallback_preset.as_deref(), Some("buzz"));
}
