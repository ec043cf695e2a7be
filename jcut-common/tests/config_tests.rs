//! Settings file resolution and loading
//!
//! Tests that touch JCUT_CONFIG are marked #[serial] so they never race on the
//! process environment.

use jcut_common::config::{default_config_path, resolve_config_path, CONFIG_ENV_VAR};
use jcut_common::{Error, Settings, StrategyKind};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_settings(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("settings.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_argument_has_priority_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/jcut-from-env.toml");
    let resolved = resolve_config_path(Some(Path::new("/tmp/jcut-from-cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/tmp/jcut-from-cli.toml")));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/jcut-from-env.toml");
    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/jcut-from-env.toml")));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_falls_back_to_platform_default() {
    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolve_config_path(None), default_config_path());
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let settings = Settings::load_or_default(Some(&missing)).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_settings(
        dir.path(),
        r#"
        volume_threshold = 0.02
        sounded_speed = 1.25
        silence_speed = 3.0
        margin_before = 0.1
        strategy = "always_sounded"
        enable_desync_correction = true
        "#,
    );

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.volume_threshold, 0.02);
    assert_eq!(settings.sounded_speed, 1.25);
    assert_eq!(settings.strategy, StrategyKind::AlwaysSounded);
    assert!(settings.enable_desync_correction);
    assert_eq!(settings.margin_after, 0.100);
}

#[test]
fn test_out_of_range_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_settings(dir.path(), "sounded_speed = -1.0\n");
    let result = Settings::load(&path);
    assert!(matches!(result, Err(Error::InvalidSetting { field: "sounded_speed", .. })));
}

#[test]
fn test_malformed_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_settings(dir.path(), "sounded_speed = \"fast\"\n");
    assert!(matches!(Settings::load(&path), Err(Error::Toml(_))));
}
