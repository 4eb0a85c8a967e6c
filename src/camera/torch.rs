//! Torch control through a sysfs LED class device.
//!
//! Writes the `brightness` file of an LED such as `/sys/class/leds/white:flash`,
//! which is how most Linux camera flash LEDs are exposed to userspace.

use super::device::TorchMode;
use crate::error::CaptureError;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LedTorch {
    path: PathBuf,
    max_brightness: u32,
}

impl LedTorch {
    /// Detect the LED directory. Returns `None` when the LED does not exist or
    /// reports no usable brightness range.
    pub fn detect<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref().to_path_buf();
        let max_path = path.join("max_brightness");

        let max_brightness = match fs::read_to_string(&max_path) {
            Ok(s) => match s.trim().parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!("Invalid max_brightness in {}", max_path.display());
                    return None;
                }
            },
            Err(e) => {
                debug!("No torch LED at {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            path,
            max_brightness,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Brightness is writable by this process
    pub fn is_writable(&self) -> bool {
        OpenOptions::new()
            .write(true)
            .open(self.path.join("brightness"))
            .is_ok()
    }

    pub fn mode(&self) -> TorchMode {
        match fs::read_to_string(self.path.join("brightness")) {
            Ok(s) if s.trim().parse::<u32>().map(|v| v > 0).unwrap_or(false) => TorchMode::On,
            _ => TorchMode::Off,
        }
    }

    pub fn set_mode(&self, mode: TorchMode) -> Result<(), CaptureError> {
        let value = match mode {
            TorchMode::On => self.max_brightness,
            TorchMode::Off => 0,
        };

        fs::write(self.path.join("brightness"), value.to_string()).map_err(|e| {
            CaptureError::TorchConfigurationFailed {
                device: self.path.display().to_string(),
                details: e.to_string(),
            }
        })
    }
}
