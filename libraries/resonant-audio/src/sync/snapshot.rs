//! Typed view of one namespace in the settings store

use crate::control::DspController;
use crate::effects::CROSSFEED_MODE_CUSTOM;
use resonant_core::{defaults, keys, Namespace, SettingValue, SettingsStore};

/// Every setting of one namespace, read with its default
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Snapshot {
    OutputControl {
        post_gain: f32,
        threshold: f32,
        release: f32,
    },
    Compander {
        enable: bool,
        time_constant: f32,
        granularity: i32,
        transforms: i32,
        response: String,
    },
    Bass {
        enable: bool,
        max_gain: f32,
    },
    Equalizer {
        enable: bool,
        filter_type: i32,
        interpolation: i32,
        bands: String,
    },
    GraphicEq {
        enable: bool,
        nodes: String,
    },
    Reverb {
        enable: bool,
        preset: i32,
    },
    StereoWide {
        enable: bool,
        level: f32,
    },
    Crossfeed {
        enable: bool,
        mode: i32,
        cutoff: i32,
        feed: i32,
    },
    Tube {
        enable: bool,
        drive: f32,
    },
    Ddc {
        enable: bool,
        file: String,
    },
    Liveprog {
        enable: bool,
        file: String,
    },
    Convolver {
        enable: bool,
        file: String,
        mode: i32,
        advanced: String,
    },
}

impl Snapshot {
    pub(super) fn read<S: SettingsStore + ?Sized>(store: &S, namespace: Namespace) -> Self {
        let ns = namespace;
        match namespace {
            Namespace::OutputControl => Snapshot::OutputControl {
                post_gain: store.get_f32(ns, keys::OUTPUT_POSTGAIN, defaults::OUTPUT_POSTGAIN),
                threshold: store.get_f32(ns, keys::LIMITER_THRESHOLD, defaults::LIMITER_THRESHOLD),
                release: store.get_f32(ns, keys::LIMITER_RELEASE, defaults::LIMITER_RELEASE),
            },
            Namespace::Compander => Snapshot::Compander {
                enable: store.get_bool(ns, keys::COMPANDER_ENABLE, false),
                time_constant: store.get_f32(
                    ns,
                    keys::COMPANDER_TIMECONSTANT,
                    defaults::COMPANDER_TIMECONSTANT,
                ),
                granularity: store.get_i32(
                    ns,
                    keys::COMPANDER_GRANULARITY,
                    defaults::COMPANDER_GRANULARITY,
                ),
                transforms: store.get_i32(
                    ns,
                    keys::COMPANDER_TFTRANSFORMS,
                    defaults::COMPANDER_TFTRANSFORMS,
                ),
                response: store.get_string(
                    ns,
                    keys::COMPANDER_RESPONSE,
                    defaults::COMPANDER_RESPONSE,
                ),
            },
            Namespace::Bass => Snapshot::Bass {
                enable: store.get_bool(ns, keys::BASS_ENABLE, false),
                max_gain: store.get_f32(ns, keys::BASS_MAX_GAIN, defaults::BASS_MAX_GAIN),
            },
            Namespace::Equalizer => Snapshot::Equalizer {
                enable: store.get_bool(ns, keys::EQ_ENABLE, false),
                filter_type: store.get_i32(ns, keys::EQ_FILTER_TYPE, defaults::EQ_FILTER_TYPE),
                interpolation: store.get_i32(
                    ns,
                    keys::EQ_INTERPOLATION,
                    defaults::EQ_INTERPOLATION,
                ),
                bands: store.get_string(ns, keys::EQ_BANDS, defaults::EQ_BANDS),
            },
            Namespace::GraphicEq => Snapshot::GraphicEq {
                enable: store.get_bool(ns, keys::GEQ_ENABLE, false),
                nodes: store.get_string(ns, keys::GEQ_NODES, defaults::GEQ_NODES),
            },
            Namespace::Reverb => Snapshot::Reverb {
                enable: store.get_bool(ns, keys::REVERB_ENABLE, false),
                preset: store.get_i32(ns, keys::REVERB_PRESET, defaults::REVERB_PRESET),
            },
            Namespace::StereoWide => Snapshot::StereoWide {
                enable: store.get_bool(ns, keys::STEREOWIDE_ENABLE, false),
                level: store.get_f32(ns, keys::STEREOWIDE_MODE, defaults::STEREOWIDE_MODE),
            },
            Namespace::Crossfeed => Snapshot::Crossfeed {
                enable: store.get_bool(ns, keys::CROSSFEED_ENABLE, false),
                mode: store.get_i32(ns, keys::CROSSFEED_MODE, defaults::CROSSFEED_MODE),
                cutoff: store.get_i32(
                    ns,
                    keys::CROSSFEED_CUSTOM_FCUT,
                    defaults::CROSSFEED_CUSTOM_FCUT,
                ),
                feed: store.get_i32(
                    ns,
                    keys::CROSSFEED_CUSTOM_FEED,
                    defaults::CROSSFEED_CUSTOM_FEED,
                ),
            },
            Namespace::Tube => Snapshot::Tube {
                enable: store.get_bool(ns, keys::TUBE_ENABLE, false),
                drive: store.get_f32(ns, keys::TUBE_DRIVE, defaults::TUBE_DRIVE),
            },
            Namespace::Ddc => Snapshot::Ddc {
                enable: store.get_bool(ns, keys::DDC_ENABLE, false),
                file: store.get_string(ns, keys::DDC_FILE, ""),
            },
            Namespace::Liveprog => Snapshot::Liveprog {
                enable: store.get_bool(ns, keys::LIVEPROG_ENABLE, false),
                file: store.get_string(ns, keys::LIVEPROG_FILE, ""),
            },
            Namespace::Convolver => Snapshot::Convolver {
                enable: store.get_bool(ns, keys::CONVOLVER_ENABLE, false),
                file: store.get_string(ns, keys::CONVOLVER_FILE, ""),
                mode: store.get_i32(ns, keys::CONVOLVER_MODE, defaults::CONVOLVER_MODE),
                advanced: store.get_string(
                    ns,
                    keys::CONVOLVER_ADV_IMP,
                    defaults::CONVOLVER_ADV_IMP,
                ),
            },
        }
    }

    pub(super) fn namespace(&self) -> Namespace {
        match self {
            Snapshot::OutputControl { .. } => Namespace::OutputControl,
            Snapshot::Compander { .. } => Namespace::Compander,
            Snapshot::Bass { .. } => Namespace::Bass,
            Snapshot::Equalizer { .. } => Namespace::Equalizer,
            Snapshot::GraphicEq { .. } => Namespace::GraphicEq,
            Snapshot::Reverb { .. } => Namespace::Reverb,
            Snapshot::StereoWide { .. } => Namespace::StereoWide,
            Snapshot::Crossfeed { .. } => Namespace::Crossfeed,
            Snapshot::Tube { .. } => Namespace::Tube,
            Snapshot::Ddc { .. } => Namespace::Ddc,
            Snapshot::Liveprog { .. } => Namespace::Liveprog,
            Snapshot::Convolver { .. } => Namespace::Convolver,
        }
    }

    /// Key/value pairs as the cache stores them
    pub(super) fn entries(&self) -> Vec<(&'static str, SettingValue)> {
        let float = |v: f32| SettingValue::Float(f64::from(v));
        let int = |v: i32| SettingValue::Int(i64::from(v));
        let text = |v: &str| SettingValue::Text(v.to_string());

        match self {
            Snapshot::OutputControl {
                post_gain,
                threshold,
                release,
            } => vec![
                (keys::OUTPUT_POSTGAIN, float(*post_gain)),
                (keys::LIMITER_THRESHOLD, float(*threshold)),
                (keys::LIMITER_RELEASE, float(*release)),
            ],
            Snapshot::Compander {
                enable,
                time_constant,
                granularity,
                transforms,
                response,
            } => vec![
                (keys::COMPANDER_ENABLE, SettingValue::Bool(*enable)),
                (keys::COMPANDER_TIMECONSTANT, float(*time_constant)),
                (keys::COMPANDER_GRANULARITY, int(*granularity)),
                (keys::COMPANDER_TFTRANSFORMS, int(*transforms)),
                (keys::COMPANDER_RESPONSE, text(response)),
            ],
            Snapshot::Bass { enable, max_gain } => vec![
                (keys::BASS_ENABLE, SettingValue::Bool(*enable)),
                (keys::BASS_MAX_GAIN, float(*max_gain)),
            ],
            Snapshot::Equalizer {
                enable,
                filter_type,
                interpolation,
                bands,
            } => vec![
                (keys::EQ_ENABLE, SettingValue::Bool(*enable)),
                (keys::EQ_FILTER_TYPE, int(*filter_type)),
                (keys::EQ_INTERPOLATION, int(*interpolation)),
                (keys::EQ_BANDS, text(bands)),
            ],
            Snapshot::GraphicEq { enable, nodes } => vec![
                (keys::GEQ_ENABLE, SettingValue::Bool(*enable)),
                (keys::GEQ_NODES, text(nodes)),
            ],
            Snapshot::Reverb { enable, preset } => vec![
                (keys::REVERB_ENABLE, SettingValue::Bool(*enable)),
                (keys::REVERB_PRESET, int(*preset)),
            ],
            Snapshot::StereoWide { enable, level } => vec![
                (keys::STEREOWIDE_ENABLE, SettingValue::Bool(*enable)),
                (keys::STEREOWIDE_MODE, float(*level)),
            ],
            Snapshot::Crossfeed {
                enable,
                mode,
                cutoff,
                feed,
            } => vec![
                (keys::CROSSFEED_ENABLE, SettingValue::Bool(*enable)),
                (keys::CROSSFEED_MODE, int(*mode)),
                (keys::CROSSFEED_CUSTOM_FCUT, int(*cutoff)),
                (keys::CROSSFEED_CUSTOM_FEED, int(*feed)),
            ],
            Snapshot::Tube { enable, drive } => vec![
                (keys::TUBE_ENABLE, SettingValue::Bool(*enable)),
                (keys::TUBE_DRIVE, float(*drive)),
            ],
            Snapshot::Ddc { enable, file } => vec![
                (keys::DDC_ENABLE, SettingValue::Bool(*enable)),
                (keys::DDC_FILE, text(file)),
            ],
            Snapshot::Liveprog { enable, file } => vec![
                (keys::LIVEPROG_ENABLE, SettingValue::Bool(*enable)),
                (keys::LIVEPROG_FILE, text(file)),
            ],
            Snapshot::Convolver {
                enable,
                file,
                mode,
                advanced,
            } => vec![
                (keys::CONVOLVER_ENABLE, SettingValue::Bool(*enable)),
                (keys::CONVOLVER_FILE, text(file)),
                (keys::CONVOLVER_MODE, int(*mode)),
                (keys::CONVOLVER_ADV_IMP, text(advanced)),
            ],
        }
    }

    /// Push the snapshot through the controller's setters
    pub(super) fn apply<C: DspController + ?Sized>(&self, target: &mut C) -> bool {
        match self {
            Snapshot::OutputControl {
                post_gain,
                threshold,
                release,
            } => target.set_output_control(*threshold, *release, *post_gain),
            Snapshot::Compander {
                enable,
                time_constant,
                granularity,
                transforms,
                response,
            } => target.set_compander(*enable, *time_constant, *granularity, *transforms, response),
            Snapshot::Bass { enable, max_gain } => target.set_bass_boost(*enable, *max_gain),
            Snapshot::Equalizer {
                enable,
                filter_type,
                interpolation,
                bands,
            } => target.set_multi_equalizer(*enable, *filter_type, *interpolation, bands),
            Snapshot::GraphicEq { enable, nodes } => target.set_graphic_eq(*enable, nodes),
            Snapshot::Reverb { enable, preset } => target.set_reverb(*enable, *preset),
            Snapshot::StereoWide { enable, level } => target.set_stereo_enhancement(*enable, *level),
            Snapshot::Crossfeed {
                enable,
                mode,
                cutoff,
                feed,
            } => {
                if *mode == CROSSFEED_MODE_CUSTOM {
                    target.set_crossfeed_custom(*enable, *cutoff, *feed)
                } else {
                    target.set_crossfeed(*enable, *mode)
                }
            }
            Snapshot::Tube { enable, drive } => target.set_vacuum_tube(*enable, *drive),
            Snapshot::Ddc { enable, file } => target.set_vdc(*enable, file),
            Snapshot::Liveprog { enable, file } => target.set_liveprog(*enable, file),
            Snapshot::Convolver {
                enable,
                file,
                mode,
                advanced,
            } => target.set_convolver(*enable, file, *mode, advanced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::MemorySettings;

    #[test]
    fn absent_keys_read_as_defaults() {
        let store = MemorySettings::new();
        assert_eq!(
            Snapshot::read(&store, Namespace::OutputControl),
            Snapshot::OutputControl {
                post_gain: defaults::OUTPUT_POSTGAIN,
                threshold: defaults::LIMITER_THRESHOLD,
                release: defaults::LIMITER_RELEASE,
            }
        );
    }

    #[test]
    fn list_values_stored_as_text_are_parsed() {
        let mut store = MemorySettings::new();
        store.set(Namespace::Reverb, keys::REVERB_PRESET, SettingValue::from("4"));
        store.set(Namespace::Reverb, keys::REVERB_ENABLE, SettingValue::Bool(true));
        assert_eq!(
            Snapshot::read(&store, Namespace::Reverb),
            Snapshot::Reverb {
                enable: true,
                preset: 4
            }
        );
    }

    #[test]
    fn snapshot_namespace_matches_request() {
        let store = MemorySettings::new();
        for ns in Namespace::ALL {
            let snapshot = Snapshot::read(&store, ns);
            assert_eq!(snapshot.namespace(), ns);
            assert!(!snapshot.entries().is_empty());
        }
    }
}
