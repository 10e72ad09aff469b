//! Parameter synchronizer integration tests
//!
//! Settings come from a JSON file on disk; the engine reads its IRs and
//! scripts from a temporary library directory.

use resonant_audio::effects::AudioEffect;
use resonant_audio::realtime::split;
use resonant_audio::{
    DspController, Engine, ModuleId, ModuleObservation, ParameterSynchronizer, ProcessorEvent,
};
use resonant_core::{
    keys, EngineConfig, JsonSettings, LocalFileStore, Namespace, SettingValue, SettingsStore,
};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// TEST UTILITIES
// ============================================================================

fn write_unit_ir(dir: &TempDir, name: &str) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.path().join(name), spec).unwrap();
    for s in [i16::MAX, i16::MAX, 0, 0, 0, 0] {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

fn settings_with_convolver(dir: &TempDir) -> JsonSettings {
    let mut settings = JsonSettings::open(dir.path().join("settings.json")).unwrap();
    settings.set(
        Namespace::Convolver,
        keys::CONVOLVER_ENABLE,
        SettingValue::Bool(true),
    );
    settings.set(
        Namespace::Convolver,
        keys::CONVOLVER_FILE,
        SettingValue::from("room.wav"),
    );
    settings.save().unwrap();
    settings
}

fn convolver_enabled(engine: &Engine) -> bool {
    engine
        .pipeline()
        .unwrap()
        .module(ModuleId::Convolver)
        .is_enabled()
}

// ============================================================================
// FILE-BACKED SETTINGS
// ============================================================================

#[test]
fn test_settings_file_drives_engine() {
    let dir = TempDir::new().unwrap();
    let mut settings = JsonSettings::open(dir.path().join("settings.json")).unwrap();
    settings.set(Namespace::Tube, keys::TUBE_ENABLE, SettingValue::Bool(true));
    settings.set(Namespace::Reverb, keys::REVERB_ENABLE, SettingValue::from("true"));
    settings.set(Namespace::Reverb, keys::REVERB_PRESET, SettingValue::from("5"));
    settings.save().unwrap();

    let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(dir.path())));
    let mut sync = ParameterSynchronizer::new(JsonSettings::open(settings.path()).unwrap());
    let report = sync.sync(&mut engine, &[]);

    assert!(report.failed.is_empty());
    let pipeline = engine.pipeline().unwrap();
    assert!(pipeline.module(ModuleId::Tube).is_enabled());
    assert!(pipeline.module(ModuleId::Reverb).is_enabled());
    assert_eq!(pipeline.reverb().preset_index(), 5);
}

#[test]
fn test_rejected_eq_string_is_reported_and_keeps_state() {
    let dir = TempDir::new().unwrap();
    let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(dir.path())));
    let mut sync =
        ParameterSynchronizer::new(JsonSettings::open(dir.path().join("s.json")).unwrap());

    sync.store_mut()
        .set(Namespace::Equalizer, keys::EQ_ENABLE, SettingValue::Bool(true));
    sync.sync(&mut engine, &[]);
    assert!(engine.pipeline().unwrap().module(ModuleId::Equalizer).is_enabled());

    sync.store_mut()
        .set(Namespace::Equalizer, keys::EQ_BANDS, SettingValue::from("25;40;oops"));
    let report = sync.sync(&mut engine, &[]);
    assert_eq!(report.failed, vec![Namespace::Equalizer]);
    assert!(engine.pipeline().unwrap().module(ModuleId::Equalizer).is_enabled());
}

// ============================================================================
// FILE RE-READ GATING
// ============================================================================

#[test]
fn test_impulse_is_only_reread_when_forced() {
    let dir = TempDir::new().unwrap();
    write_unit_ir(&dir, "room.wav");
    let settings = settings_with_convolver(&dir);

    let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(dir.path())));
    let mut sync = ParameterSynchronizer::new(settings);
    sync.sync(&mut engine, &[]);
    assert!(convolver_enabled(&engine));

    // Unchanged settings: the missing file goes unnoticed
    std::fs::remove_file(dir.path().join("room.wav")).unwrap();
    assert!(sync.sync(&mut engine, &[]).is_empty());
    assert!(convolver_enabled(&engine));

    // A rate change forces the convolver namespace and the stage disables
    sync.notify_sample_rate_changed();
    let report = sync.sync(&mut engine, &[]);
    assert!(report.applied.contains(&Namespace::Convolver));
    assert!(!convolver_enabled(&engine));
}

#[test]
fn test_engine_rate_change_rereads_impulse() {
    let dir = TempDir::new().unwrap();
    write_unit_ir(&dir, "room.wav");
    let settings = settings_with_convolver(&dir);

    let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(dir.path())));
    let mut sync = ParameterSynchronizer::new(settings);
    sync.sync(&mut engine, &[]);
    let frames_at_48k = engine.pipeline().unwrap().convolver().frames();

    assert!(engine.set_sample_rate(96000.0));
    let report = sync.sync(&mut engine, &[]);
    assert_eq!(report.applied, vec![Namespace::Ddc, Namespace::Convolver]);
    let frames_at_96k = engine.pipeline().unwrap().convolver().frames();
    assert!(convolver_enabled(&engine));
    assert!((frames_at_48k * 2 - 1..=frames_at_48k * 2 + 1).contains(&frames_at_96k));
}

// ============================================================================
// MODULE STATUS
// ============================================================================

#[test]
fn test_reenabled_module_is_pushed_again() {
    let dir = TempDir::new().unwrap();
    let mut engine = Engine::new(48000.0, Arc::new(LocalFileStore::new(dir.path())));
    let mut sync =
        ParameterSynchronizer::new(JsonSettings::open(dir.path().join("s.json")).unwrap());
    sync.sync(&mut engine, &[]);

    engine.observe_module(
        ModuleId::BassBoost,
        ModuleObservation {
            enabled: true,
            has_control: false,
        },
    );
    engine.observe_module(
        ModuleId::BassBoost,
        ModuleObservation {
            enabled: true,
            has_control: true,
        },
    );

    let report = sync.sync(&mut engine, &[]);
    assert_eq!(report.applied, vec![Namespace::Bass]);
    assert!(sync.sync(&mut engine, &[]).is_empty());
}

// ============================================================================
// REALTIME SPLIT
// ============================================================================

#[test]
fn test_synchronizer_feeds_realtime_processor() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.engine.command_queue_capacity = 32;
    let (mut controller, mut processor) =
        split(&config, Arc::new(LocalFileStore::new(dir.path())));

    let mut sync =
        ParameterSynchronizer::new(JsonSettings::open(dir.path().join("s.json")).unwrap());
    sync.store_mut()
        .set(Namespace::Tube, keys::TUBE_ENABLE, SettingValue::Bool(true));

    let report = sync.sync(&mut controller, &[]);
    assert!(report.failed.is_empty());
    assert!(!processor.pipeline().module(ModuleId::Tube).is_enabled());

    let mut output = [0i16; 4];
    processor.process_i16(&[0; 4], &mut output);
    assert!(processor.pipeline().module(ModuleId::Tube).is_enabled());

    // Status-driven resyncs travel back as forced namespaces
    processor.observe_module(
        ModuleId::Tube,
        ModuleObservation {
            enabled: true,
            has_control: false,
        },
    );
    processor.observe_module(
        ModuleId::Tube,
        ModuleObservation {
            enabled: true,
            has_control: true,
        },
    );
    let forced = processor.take_resync();
    let report = sync.sync(&mut controller, &forced);
    assert_eq!(report.applied, vec![Namespace::Tube]);

    assert!(matches!(
        processor.drain_events().first(),
        Some(ProcessorEvent::ModuleStatusChanged { .. })
    ));
    assert!(controller.is_open());
}
