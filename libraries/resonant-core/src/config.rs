/// Engine configuration
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine")]
    pub engine: EngineSettings,

    #[serde(default = "default_library")]
    pub library: LibrarySettings,

    #[serde(default)]
    pub settings: SettingsFileSettings,

    #[serde(default = "default_logging")]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Initial sampling rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f32,

    /// Capacity of the control-to-audio update queue
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// Root directory for relative IR, DDC and script paths
    #[serde(default = "default_library_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsFileSettings {
    /// JSON settings file polled by the synchronizer
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            library: default_library(),
            settings: SettingsFileSettings::default(),
            logging: default_logging(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `resonant.toml` (if present) and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("resonant.toml"))
    }

    /// Load configuration from a specific file (if present) and environment
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut settings = config::Config::builder();

        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path.to_path_buf()));
        }

        // Override with environment variables (prefixed with RESONANT_)
        settings = settings.add_source(
            config::Environment::with_prefix("RESONANT")
                .separator("_")
                .try_parsing(true),
        );

        let config = settings.build()?;
        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.sample_rate.is_nan() || self.engine.sample_rate <= 0.0 {
            return Err(CoreError::config(format!(
                "Sample rate must be positive, got {}",
                self.engine.sample_rate
            )));
        }

        if self.engine.command_queue_capacity == 0 {
            return Err(CoreError::config("Command queue capacity must be non-zero"));
        }

        Ok(())
    }
}

// Default values
fn default_engine() -> EngineSettings {
    EngineSettings {
        sample_rate: default_sample_rate(),
        command_queue_capacity: default_command_queue_capacity(),
    }
}

fn default_sample_rate() -> f32 {
    48000.0
}

fn default_command_queue_capacity() -> usize {
    64
}

fn default_library() -> LibrarySettings {
    LibrarySettings {
        root: default_library_root(),
    }
}

fn default_library_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_logging() -> LoggingSettings {
    LoggingSettings {
        filter: default_log_filter(),
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
