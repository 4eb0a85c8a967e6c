use crate::camera::CameraPosition;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BarcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl BarcamError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Hardware-facing faults. The capture controller absorbs all of these and
/// leaves the session inert; none of them are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No capture device available for the {position} camera")]
    DeviceUnavailable { position: CameraPosition },

    #[error("Failed to acquire input for device {device}: {details}")]
    InputAcquisitionFailed { device: String, details: String },

    #[error("Torch is not supported by device {device}")]
    TorchUnsupported { device: String },

    #[error("Failed to configure torch on device {device}: {details}")]
    TorchConfigurationFailed { device: String, details: String },

    #[error("Capture pipeline error: {details}")]
    Pipeline { details: String },
}

impl CaptureError {
    /// Short machine-readable name used in fault events
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::DeviceUnavailable { .. } => "device_unavailable",
            CaptureError::InputAcquisitionFailed { .. } => "input_acquisition_failed",
            CaptureError::TorchUnsupported { .. } => "torch_unsupported",
            CaptureError::TorchConfigurationFailed { .. } => "torch_configuration_failed",
            CaptureError::Pipeline { .. } => "pipeline",
        }
    }
}

#[derive(Error, Debug)]
pub enum PreferenceError {
    #[error("Failed to read preference file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write preference file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed preference file {path}: {details}")]
    Malformed { path: String, details: String },
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event receiver lagged behind by {count} events")]
    Lagged { count: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, BarcamError>;
