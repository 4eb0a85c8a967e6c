use crate::geometry::InterestPolicy;
use crate::symbology::SymbolType;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BarcamConfig {
    pub camera: CameraConfig,
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub interest: InterestPolicy,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Capture backend: "v4l2" or "mock"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory holding the video device nodes
    #[serde(default = "default_device_dir")]
    pub device_dir: String,

    /// Device index of the back camera (e.g., 0 for /dev/video0)
    #[serde(default = "default_back_index")]
    pub back_index: u32,

    /// Device index of the front camera
    #[serde(default = "default_front_index")]
    pub front_index: u32,

    /// Capture resolution used for the photo preset (width, height)
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),

    /// sysfs LED directory driving the back camera torch; empty for none
    #[serde(default)]
    pub back_torch_led: String,

    /// sysfs LED directory driving the front camera torch; empty for none
    #[serde(default)]
    pub front_torch_led: String,

    /// File storing the selected camera position between runs
    #[serde(default = "default_preferences_path")]
    pub preferences_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScannerConfig {
    /// Seconds after a report during which further detections are discarded
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Symbol types that may be reported
    #[serde(default = "default_accepted_symbols")]
    pub accepted_symbols: Vec<SymbolType>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ScannerConfig {
    /// Cooldown window; rejects values that are not positive or too large
    /// for a [`Duration`]
    pub fn cooldown(&self) -> Result<Duration, ConfigError> {
        if !self.cooldown_seconds.is_finite() || self.cooldown_seconds <= 0.0 {
            return Err(ConfigError::Message(
                "Scanner cooldown_seconds must be a positive number".to_string(),
            ));
        }

        Duration::try_from_secs_f64(self.cooldown_seconds).map_err(|e| {
            ConfigError::Message(format!(
                "Scanner cooldown_seconds {} is out of range: {}",
                self.cooldown_seconds, e
            ))
        })
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            accepted_symbols: default_accepted_symbols(),
        }
    }
}

impl BarcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("barcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let accepted: Vec<&str> = default_accepted_symbols()
            .iter()
            .map(|symbol| symbol.as_str())
            .collect();

        let settings = Config::builder()
            .set_default("camera.backend", default_backend())?
            .set_default("camera.device_dir", default_device_dir())?
            .set_default("camera.back_index", default_back_index())?
            .set_default("camera.front_index", default_front_index())?
            .set_default(
                "camera.resolution",
                vec![default_resolution().0, default_resolution().1],
            )?
            .set_default("camera.back_torch_led", "")?
            .set_default("camera.front_torch_led", "")?
            .set_default("camera.preferences_path", default_preferences_path())?
            .set_default("scanner.cooldown_seconds", default_cooldown_seconds())?
            .set_default("scanner.accepted_symbols", accepted)?
            .set_default("interest.mode", "unrestricted")?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // e.g. BARCAM_SCANNER__COOLDOWN_SECONDS=1.5
            .add_source(
                Environment::with_prefix("BARCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: BarcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.camera.backend.as_str(), "v4l2" | "mock") {
            return Err(ConfigError::Message(format!(
                "Unknown camera backend '{}' (expected v4l2 or mock)",
                self.camera.backend
            )));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        self.scanner.cooldown()?;

        if self.scanner.accepted_symbols.is_empty() {
            return Err(ConfigError::Message(
                "Scanner must accept at least one symbol type".to_string(),
            ));
        }

        self.interest.validate().map_err(ConfigError::Message)?;

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as a TOML document
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for BarcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                backend: default_backend(),
                device_dir: default_device_dir(),
                back_index: default_back_index(),
                front_index: default_front_index(),
                resolution: default_resolution(),
                back_torch_led: String::new(),
                front_torch_led: String::new(),
                preferences_path: default_preferences_path(),
            },
            scanner: ScannerConfig::default(),
            interest: InterestPolicy::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_backend() -> String {
    "v4l2".to_string()
}
fn default_device_dir() -> String {
    "/dev".to_string()
}
fn default_back_index() -> u32 {
    0
}
fn default_front_index() -> u32 {
    1
}
fn default_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_preferences_path() -> String {
    "./barcam-preferences.json".to_string()
}

fn default_cooldown_seconds() -> f64 {
    2.5
}
fn default_accepted_symbols() -> Vec<SymbolType> {
    SymbolType::ALL.to_vec()
}

fn default_event_bus_capacity() -> usize {
    100
}
