//! Configuration management
//!
//! The settings live in `config.toml` next to the executable, inside a single
//! `[Settings]` table. The file is re-read on every scheduler poll, so edits
//! take effect without a restart. Missing keys fall back to their defaults,
//! a missing file is created, and an unparsable file is moved aside to
//! `config.toml.bak` (replacing any earlier backup) and replaced with
//! defaults.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, ConfigResult};

/// File name of the configuration inside the base directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Suffix appended to an unparsable config file before it is replaced
const BACKUP_SUFFIX: &str = "bak";

/// On-disk configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// The single `[Settings]` table
    #[serde(rename = "Settings", default)]
    pub settings: SettingsTable,
}

/// Raw values of the `[Settings]` table, exactly as written by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsTable {
    /// Lower bound of the random interval between cues, in seconds
    #[serde(default = "default_interval_min")]
    pub intervalo_minimo_segundos: i64,

    /// Upper bound of the random interval between cues, in seconds
    #[serde(default = "default_interval_max")]
    pub intervalo_maximo_segundos: i64,

    /// Folder holding the cue files, relative to the program directory
    #[serde(default = "default_cue_dir")]
    pub carpeta_cunas: String,

    /// Volume other applications are lowered to while a cue plays (0.0 to 1.0)
    #[serde(default = "default_attenuated_volume")]
    pub volumen_atenuado: f32,

    /// Sentinel file whose presence pauses playback
    #[serde(default = "default_stop_file")]
    pub archivo_stop: String,

    /// Where log lines go: "consola" or "archivo"
    #[serde(default)]
    pub destino_log: LogDestination,

    /// Log file used when `destino_log = "archivo"`
    #[serde(default = "default_log_file")]
    pub archivo_log: String,
}

/// Log output destination, resolved once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogDestination {
    /// Timestamped lines on stdout
    #[default]
    #[serde(rename = "consola", alias = "console")]
    Console,
    /// Timestamped lines appended to the configured log file
    #[serde(rename = "archivo", alias = "file")]
    File,
}

// Default value functions
fn default_interval_min() -> i64 {
    30
}
fn default_interval_max() -> i64 {
    300
}
fn default_cue_dir() -> String {
    "Cunas".to_string()
}
fn default_attenuated_volume() -> f32 {
    0.10
}
fn default_stop_file() -> String {
    "stop.txt".to_string()
}
fn default_log_file() -> String {
    "log_reproductor.txt".to_string()
}

impl Default for SettingsTable {
    fn default() -> Self {
        Self {
            intervalo_minimo_segundos: default_interval_min(),
            intervalo_maximo_segundos: default_interval_max(),
            carpeta_cunas: default_cue_dir(),
            volumen_atenuado: default_attenuated_volume(),
            archivo_stop: default_stop_file(),
            destino_log: LogDestination::default(),
            archivo_log: default_log_file(),
        }
    }
}

/// Effective settings for one scheduler iteration
///
/// Paths are absolute (resolved against the program directory), the interval
/// bounds are ordered and the attenuated volume is within `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Shortest wait between cues, in seconds
    pub interval_min: u64,
    /// Longest wait between cues, in seconds
    pub interval_max: u64,
    /// Folder scanned for cues
    pub cue_dir: PathBuf,
    /// Volume other applications are ducked to
    pub attenuated_volume: f32,
    /// Pause sentinel
    pub stop_file: PathBuf,
    /// Where log lines go
    pub log_destination: LogDestination,
    /// Log file for [`LogDestination::File`]
    pub log_file: PathBuf,
}

impl Settings {
    /// Inclusive range the next interval is drawn from, in seconds
    pub fn interval_bounds(&self) -> RangeInclusive<u64> {
        self.interval_min..=self.interval_max
    }
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize the configuration to TOML text
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the raw values and resolve paths against `base_dir`
    pub fn resolve(&self, base_dir: &Path) -> Settings {
        let raw = &self.settings;

        let mut min = clamp_seconds("intervalo_minimo_segundos", raw.intervalo_minimo_segundos);
        let mut max = clamp_seconds("intervalo_maximo_segundos", raw.intervalo_maximo_segundos);
        if min > max {
            warn!(
                min,
                max, "Minimum interval is greater than the maximum, swapping the values"
            );
            std::mem::swap(&mut min, &mut max);
        }

        let attenuated_volume = match validate_volume(raw.volumen_atenuado) {
            Ok(volume) => volume,
            Err(e) => {
                warn!(error = %e, "Using a clamped attenuation volume");
                if raw.volumen_atenuado.is_nan() {
                    default_attenuated_volume()
                } else {
                    raw.volumen_atenuado.clamp(0.0, 1.0)
                }
            }
        };

        Settings {
            interval_min: min,
            interval_max: max,
            cue_dir: base_dir.join(&raw.carpeta_cunas),
            attenuated_volume,
            stop_file: base_dir.join(&raw.archivo_stop),
            log_destination: raw.destino_log,
            log_file: base_dir.join(&raw.archivo_log),
        }
    }
}

fn clamp_seconds(key: &str, value: i64) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| {
        warn!(key, value, "Negative interval, using 0 seconds");
        0
    })
}

fn validate_volume(volume: f32) -> ConfigResult<f32> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(ConfigError::InvalidValue(format!(
            "volumen_atenuado must be between 0 and 1, got {volume}"
        )))
    }
}

/// Loads and persists `config.toml` inside a base directory
#[derive(Debug, Clone)]
pub struct ConfigStore {
    base_dir: PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create a store rooted at the directory of the running executable
    pub fn beside_executable() -> Self {
        Self::new(program_dir())
    }

    /// Directory relative paths are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path to the configuration file
    pub fn path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    /// Load the effective settings, never failing
    ///
    /// Any error reading or persisting the file is logged and the defaults
    /// are used for this iteration.
    pub fn load(&self) -> Settings {
        match self.load_config() {
            Ok(config) => config.resolve(&self.base_dir),
            Err(e) => {
                error!(
                    error = %e,
                    path = %self.path().display(),
                    "Failed to load configuration, using defaults"
                );
                Config::default().resolve(&self.base_dir)
            }
        }
    }

    /// Load the configuration file, creating or repairing it as needed
    pub fn load_config(&self) -> ConfigResult<Config> {
        let path = self.path();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating one with defaults");
            let config = Config::default();
            self.save(&config)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)?;
        match Config::from_toml(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "Configuration loaded");
                Ok(config)
            }
            Err(e) => {
                let backup = path.with_extension(format!("toml.{BACKUP_SUFFIX}"));
                if backup.exists() {
                    warn!(backup = %backup.display(), "Replacing the previous config backup");
                }
                warn!(
                    error = %e,
                    backup = %backup.display(),
                    "Config file is invalid, moving it aside and writing defaults"
                );
                std::fs::rename(&path, &backup)?;
                let config = Config::default();
                self.save(&config)?;
                Ok(config)
            }
        }
    }

    /// Save a configuration to the file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::write(self.path(), config.to_toml()?)?;
        Ok(())
    }
}

/// Directory containing the running program
///
/// Falls back to the working directory when the executable path is unknown.
pub fn program_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
