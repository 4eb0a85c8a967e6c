use super::device::{CameraPosition, CaptureDevice};
use super::session::{CaptureInput, CaptureSession};
use crate::error::CaptureError;
use crate::symbology::SymbolType;
use std::sync::Arc;

/// Hardware capture platform the controller drives.
///
/// All calls are blocking and must not overlap; the controller serializes
/// them and always stops a running pipeline before starting another.
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Any capture-capable hardware is present at all
    fn is_capture_available(&self) -> bool;

    /// Default camera for `position`, if one exists
    fn device(&self, position: CameraPosition) -> Option<Arc<dyn CaptureDevice>>;

    /// Claim exclusive use of `device` as a session input
    fn open_input(&self, device: Arc<dyn CaptureDevice>) -> Result<Box<dyn CaptureInput>, CaptureError>;

    /// Symbol types the recognition engine can classify natively
    fn native_symbols(&self) -> Vec<SymbolType>;

    /// Begin feeding frames from the session input to its recognition output
    fn start_running(&self, session: &CaptureSession) -> Result<(), CaptureError>;

    /// Stop the pipeline. Must be safe to call when nothing is running.
    fn stop_running(&self);
}
