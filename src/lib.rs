pub mod app;
pub mod camera;
pub mod config;
pub mod debounce;
pub mod detection;
pub mod error;
pub mod events;
pub mod geometry;
pub mod keyboard_input;
pub mod preferences;
pub mod symbology;

pub use app::{BarcodeReader, ReaderBuilder, ReaderCommand, ShutdownReason};
pub use camera::{
    CameraPosition, CaptureBackend, CaptureDevice, CaptureSessionController, MockCaptureBackend,
    TorchMode, V4l2Backend,
};
pub use config::BarcamConfig;
pub use debounce::{CooldownTimer, DebounceState, ScanEventDebouncer};
pub use detection::{DetectionBatch, DetectionDelegate, RawDetection};
pub use error::{BarcamError, CaptureError, EventBusError, Result};
pub use events::{BarcodeSink, EventBus, EventFilter, EventReceiver, FnSink, ScanEvent, ScanReport, ScanSource};
pub use geometry::{InterestPolicy, Orientation, Rect, RegionOfInterest};
pub use keyboard_input::KeyboardInputHandler;
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use symbology::SymbolType;
