use crate::error::CaptureError;
use crate::preferences::{PreferenceStore, CAMERA_POSITION_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Logical camera position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    #[default]
    Back,
    Front,
}

impl CameraPosition {
    /// Discriminant written to the preference store
    pub fn discriminant(&self) -> i64 {
        match self {
            CameraPosition::Back => 1,
            CameraPosition::Front => 2,
        }
    }

    /// Inverse of [`discriminant`](Self::discriminant); 0 means unspecified
    pub fn from_discriminant(value: i64) -> Option<Self> {
        match value {
            1 => Some(CameraPosition::Back),
            2 => Some(CameraPosition::Front),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            CameraPosition::Back => CameraPosition::Front,
            CameraPosition::Front => CameraPosition::Back,
        }
    }

    /// Read the persisted selection, defaulting to the back camera
    pub fn load(store: &dyn PreferenceStore) -> Self {
        store
            .get(CAMERA_POSITION_KEY)
            .and_then(Self::from_discriminant)
            .unwrap_or_default()
    }

    /// Persist the selection; failures are logged and otherwise ignored
    pub fn store(&self, store: &dyn PreferenceStore) {
        if let Err(e) = store.set(CAMERA_POSITION_KEY, self.discriminant()) {
            warn!("Failed to persist camera position {}: {}", self, e);
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Back => f.write_str("back"),
            CameraPosition::Front => f.write_str("front"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorchMode {
    #[default]
    Off,
    On,
}

impl TorchMode {
    pub fn toggled(&self) -> Self {
        match self {
            TorchMode::Off => TorchMode::On,
            TorchMode::On => TorchMode::Off,
        }
    }
}

/// A physical camera as exposed by a capture backend
pub trait CaptureDevice: Send + Sync {
    /// Stable identifier, used in logs and fault reports
    fn id(&self) -> &str;

    fn position(&self) -> CameraPosition;

    /// Torch hardware is physically present
    fn has_torch(&self) -> bool;

    /// Torch can currently be used (not overheated, not in use elsewhere)
    fn is_torch_available(&self) -> bool;

    fn is_torch_mode_supported(&self, mode: TorchMode) -> bool;

    fn torch_mode(&self) -> TorchMode;

    /// Apply a torch mode under exclusive configuration access.
    ///
    /// Fails with [`CaptureError::TorchConfigurationFailed`] when the device
    /// cannot be locked or rejects the mode.
    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), CaptureError>;
}

/// Torch is usable on this device: hardware present, available, and "on" supported
pub fn torch_available_for(device: &dyn CaptureDevice) -> bool {
    device.has_torch() && device.is_torch_available() && device.is_torch_mode_supported(TorchMode::On)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferenceStore;

    #[test]
    fn test_position_defaults_to_back_when_absent_or_invalid() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(CameraPosition::load(&store), CameraPosition::Back);

        store.set(CAMERA_POSITION_KEY, 0).unwrap();
        assert_eq!(CameraPosition::load(&store), CameraPosition::Back);

        store.set(CAMERA_POSITION_KEY, 42).unwrap();
        assert_eq!(CameraPosition::load(&store), CameraPosition::Back);
    }

    #[test]
    fn test_position_round_trips_through_store() {
        let store = MemoryPreferenceStore::new();
        CameraPosition::Front.store(&store);
        assert_eq!(store.get(CAMERA_POSITION_KEY), Some(2));
        assert_eq!(CameraPosition::load(&store), CameraPosition::Front);
    }

    #[test]
    fn test_toggles() {
        assert_eq!(CameraPosition::Back.toggled(), CameraPosition::Front);
        assert_eq!(CameraPosition::Front.toggled(), CameraPosition::Back);
        assert_eq!(TorchMode::Off.toggled(), TorchMode::On);
    }
}
