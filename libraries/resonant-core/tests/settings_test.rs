//! Configuration and settings persistence tests

use resonant_core::{
    defaults, keys, EngineConfig, FileStore, JsonSettings, LocalFileStore, Namespace,
    SettingValue, SettingsStore,
};
use std::path::PathBuf;
use tempfile::TempDir;

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[test]
fn test_config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resonant.toml");
    std::fs::write(
        &path,
        "[engine]\nsample_rate = 96000.0\n\n[library]\nroot = \"/srv/presets\"\n\n[logging]\nfilter = \"debug\"\n",
    )
    .unwrap();

    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config.engine.sample_rate, 96000.0);
    assert_eq!(config.engine.command_queue_capacity, 64);
    assert_eq!(config.library.root, PathBuf::from("/srv/presets"));
    assert_eq!(config.logging.filter, "debug");
    assert!(config.settings.path.is_none());
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.engine.sample_rate, 48000.0);
    assert_eq!(config.logging.filter, "info");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resonant.toml");
    std::fs::write(&path, "[engine]\nsample_rate = 0.0\n").unwrap();
    assert!(EngineConfig::load_from(&path).is_err());

    std::fs::write(&path, "[engine]\ncommand_queue_capacity = 0\n").unwrap();
    assert!(EngineConfig::load_from(&path).is_err());
}

// ============================================================================
// JSON SETTINGS
// ============================================================================

#[test]
fn test_json_settings_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/settings.json");

    let mut settings = JsonSettings::open(&path).unwrap();
    settings.set(Namespace::Bass, keys::BASS_ENABLE, SettingValue::Bool(true));
    settings.set(Namespace::Bass, keys::BASS_MAX_GAIN, SettingValue::Float(7.5));
    settings.set(Namespace::Reverb, keys::REVERB_PRESET, SettingValue::Int(3));
    settings.save().unwrap();

    let reopened = JsonSettings::open(&path).unwrap();
    assert!(reopened.get_bool(Namespace::Bass, keys::BASS_ENABLE, false));
    assert_eq!(reopened.get_f32(Namespace::Bass, keys::BASS_MAX_GAIN, 0.0), 7.5);
    assert_eq!(reopened.get_i32(Namespace::Reverb, keys::REVERB_PRESET, 0), 3);
}

#[test]
fn test_hand_written_document_coerces_text_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{ "dsp_tube": { "tube_enable": "true", "tube_drive": "4.5" }, "dsp_crossfeed": { "crossfeed_mode": 2 } }"#,
    )
    .unwrap();

    let settings = JsonSettings::open(&path).unwrap();
    assert!(settings.get_bool(Namespace::Tube, keys::TUBE_ENABLE, false));
    assert_eq!(settings.get_f32(Namespace::Tube, keys::TUBE_DRIVE, 0.0), 4.5);
    assert_eq!(settings.get_i32(Namespace::Crossfeed, keys::CROSSFEED_MODE, 0), 2);
    assert_eq!(
        settings.get_f32(Namespace::Bass, keys::BASS_MAX_GAIN, defaults::BASS_MAX_GAIN),
        defaults::BASS_MAX_GAIN
    );
}

#[test]
fn test_unknown_namespace_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "dsp_unknown": { "x": 1 } }"#).unwrap();
    assert!(JsonSettings::open(&path).is_err());
}

#[test]
fn test_reload_discards_unsaved_changes() {
    let dir = TempDir::new().unwrap();
    let mut settings = JsonSettings::open(dir.path().join("settings.json")).unwrap();
    settings.set(Namespace::Tube, keys::TUBE_DRIVE, SettingValue::Float(3.0));
    settings.save().unwrap();

    settings.set(Namespace::Tube, keys::TUBE_DRIVE, SettingValue::Float(9.0));
    settings.reload().unwrap();
    assert_eq!(settings.get_f32(Namespace::Tube, keys::TUBE_DRIVE, 0.0), 3.0);
}

// ============================================================================
// FILE STORE
// ============================================================================

#[test]
fn test_local_store_resolves_against_root() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("room.wav"), b"RIFF").unwrap();
    let store = LocalFileStore::new(dir.path());

    let resolved = store.resolve("room.wav");
    assert!(store.is_file(&resolved));
    assert_eq!(store.read_bytes(&resolved).unwrap(), b"RIFF");
    assert!(store.read_to_string(&store.resolve("absent.eel")).is_err());
}
