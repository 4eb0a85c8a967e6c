mod backend;
mod controller;
mod device;
mod mock;
mod session;
mod torch;
mod v4l2;

pub use backend::CaptureBackend;
pub use controller::CaptureSessionController;
pub use device::{torch_available_for, CameraPosition, CaptureDevice, TorchMode};
pub use mock::{MockCaptureBackend, MockDevice};
pub use session::{
    CaptureInput, CaptureSession, PreviewSurface, RecognitionOutput, SessionPreset, VideoGravity,
};
pub use torch::LedTorch;
pub use v4l2::{V4l2Backend, V4l2Device};
