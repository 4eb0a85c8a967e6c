use super::backend::CaptureBackend;
use super::device::{CameraPosition, CaptureDevice, TorchMode};
use super::session::{CaptureInput, CaptureSession, RecognitionOutput};
use crate::detection::{DetectionDelegate, RawDetection};
use crate::error::CaptureError;
use crate::symbology::SymbolType;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Scriptable camera used by tests and `--mock` runs
pub struct MockDevice {
    id: String,
    position: CameraPosition,
    has_torch: bool,
    torch_available: AtomicBool,
    torch_mode: Mutex<TorchMode>,
    lock_fails: AtomicBool,
}

impl MockDevice {
    pub fn new<S: Into<String>>(id: S, position: CameraPosition, has_torch: bool) -> Self {
        Self {
            id: id.into(),
            position,
            has_torch,
            torch_available: AtomicBool::new(has_torch),
            torch_mode: Mutex::new(TorchMode::Off),
            lock_fails: AtomicBool::new(false),
        }
    }

    pub fn set_torch_available(&self, available: bool) {
        self.torch_available.store(available, Ordering::SeqCst);
    }

    /// Make every configuration lock attempt fail
    pub fn set_lock_fails(&self, fails: bool) {
        self.lock_fails.store(fails, Ordering::SeqCst);
    }
}

impl CaptureDevice for MockDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn has_torch(&self) -> bool {
        self.has_torch
    }

    fn is_torch_available(&self) -> bool {
        self.has_torch && self.torch_available.load(Ordering::SeqCst)
    }

    fn is_torch_mode_supported(&self, _mode: TorchMode) -> bool {
        self.has_torch
    }

    fn torch_mode(&self) -> TorchMode {
        *self.torch_mode.lock()
    }

    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), CaptureError> {
        if self.lock_fails.load(Ordering::SeqCst) {
            return Err(CaptureError::TorchConfigurationFailed {
                device: self.id.clone(),
                details: "device is locked by another client".to_string(),
            });
        }
        *self.torch_mode.lock() = mode;
        Ok(())
    }
}

#[derive(Default)]
struct MockState {
    claimed: Mutex<Vec<String>>,
    peak_claims: AtomicUsize,
    claim_failures: Mutex<HashSet<String>>,
    output: Mutex<Option<RecognitionOutput>>,
    script_token: Mutex<Option<CancellationToken>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
}

impl MockState {
    fn release(&self, id: &str) {
        let mut claimed = self.claimed.lock();
        if let Some(index) = claimed.iter().position(|c| c == id) {
            claimed.remove(index);
            trace!("Mock device {} released", id);
        }
    }
}

struct MockInput {
    device: Arc<dyn CaptureDevice>,
    state: Arc<MockState>,
}

impl CaptureInput for MockInput {
    fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }
}

impl Drop for MockInput {
    fn drop(&mut self) {
        self.state.release(self.device.id());
    }
}

/// In-process capture backend with claim accounting and detection injection
pub struct MockCaptureBackend {
    capture_available: AtomicBool,
    devices: Mutex<HashMap<CameraPosition, Arc<MockDevice>>>,
    native: Vec<SymbolType>,
    script: Vec<RawDetection>,
    script_interval: Duration,
    state: Arc<MockState>,
}

impl MockCaptureBackend {
    /// Back camera with torch, front camera without
    pub fn new() -> Self {
        let backend = Self::without_devices();
        backend.add_device(MockDevice::new("mock-back", CameraPosition::Back, true));
        backend.add_device(MockDevice::new("mock-front", CameraPosition::Front, false));
        backend
    }

    /// Capture hardware present but no cameras registered yet
    pub fn without_devices() -> Self {
        Self {
            capture_available: AtomicBool::new(true),
            devices: Mutex::new(HashMap::new()),
            native: SymbolType::ALL.to_vec(),
            script: Vec::new(),
            script_interval: Duration::from_millis(100),
            state: Arc::new(MockState::default()),
        }
    }

    /// No capture hardware at all
    pub fn without_hardware() -> Self {
        let backend = Self::without_devices();
        backend.capture_available.store(false, Ordering::SeqCst);
        backend
    }

    /// Replay `detections` in a loop, one per `interval`, while running
    pub fn with_script(mut self, detections: Vec<RawDetection>, interval: Duration) -> Self {
        self.script = detections;
        self.script_interval = interval;
        self
    }

    pub fn with_native_symbols(mut self, symbols: Vec<SymbolType>) -> Self {
        self.native = symbols;
        self
    }

    pub fn add_device(&self, device: MockDevice) -> Arc<MockDevice> {
        let device = Arc::new(device);
        self.devices
            .lock()
            .insert(device.position(), Arc::clone(&device));
        device
    }

    pub fn mock_device(&self, position: CameraPosition) -> Option<Arc<MockDevice>> {
        self.devices.lock().get(&position).cloned()
    }

    /// Make claiming the device with `id` fail
    pub fn fail_claims_for<S: Into<String>>(&self, id: S) {
        self.state.claim_failures.lock().insert(id.into());
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Deliver one frame's detections through the running session's output
    pub fn emit(&self, detections: Vec<RawDetection>) -> bool {
        match self.state.output.lock().as_ref() {
            Some(output) => output.deliver(detections),
            None => false,
        }
    }

    /// Delegate registered by the running output, kept past teardown by callers
    /// that want to replay frames from a stale session
    pub fn delegate(&self) -> Option<DetectionDelegate> {
        self.state
            .output
            .lock()
            .as_ref()
            .and_then(|output| output.delegate().cloned())
    }

    pub fn claimed_devices(&self) -> Vec<String> {
        self.state.claimed.lock().clone()
    }

    /// Highest number of simultaneously claimed devices ever observed
    pub fn peak_claims(&self) -> usize {
        self.state.peak_claims.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state.output.lock().is_some()
    }

    fn spawn_script(&self, output: RecognitionOutput) {
        if self.script.is_empty() {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Mock detection script needs a tokio runtime; not replaying");
            return;
        };

        let token = CancellationToken::new();
        *self.state.script_token.lock() = Some(token.clone());

        let script = self.script.clone();
        let interval = self.script_interval;

        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            info!("Mock detection script started ({} entries)", script.len());

            for detection in script.iter().cycle() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !output.deliver(vec![detection.clone()]) {
                            break;
                        }
                    }
                }
            }

            debug!("Mock detection script stopped");
        });
    }
}

impl Default for MockCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for MockCaptureBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_capture_available(&self) -> bool {
        self.capture_available.load(Ordering::SeqCst)
    }

    fn device(&self, position: CameraPosition) -> Option<Arc<dyn CaptureDevice>> {
        self.devices
            .lock()
            .get(&position)
            .map(|device| Arc::clone(device) as Arc<dyn CaptureDevice>)
    }

    fn open_input(&self, device: Arc<dyn CaptureDevice>) -> Result<Box<dyn CaptureInput>, CaptureError> {
        let id = device.id().to_string();

        if self.state.claim_failures.lock().contains(&id) {
            return Err(CaptureError::InputAcquisitionFailed {
                device: id,
                details: "device is in use by another process".to_string(),
            });
        }

        {
            let mut claimed = self.state.claimed.lock();
            if claimed.contains(&id) {
                return Err(CaptureError::InputAcquisitionFailed {
                    device: id,
                    details: "device already claimed".to_string(),
                });
            }
            claimed.push(id.clone());
            self.state
                .peak_claims
                .fetch_max(claimed.len(), Ordering::SeqCst);
        }

        trace!("Mock device {} claimed", id);
        Ok(Box::new(MockInput {
            device,
            state: Arc::clone(&self.state),
        }))
    }

    fn native_symbols(&self) -> Vec<SymbolType> {
        self.native.clone()
    }

    fn start_running(&self, session: &CaptureSession) -> Result<(), CaptureError> {
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::Pipeline {
                details: "mock pipeline refused to start".to_string(),
            });
        }

        let output = session.output().cloned().ok_or_else(|| CaptureError::Pipeline {
            details: "session has no recognition output".to_string(),
        })?;

        self.state.starts.fetch_add(1, Ordering::SeqCst);
        *self.state.output.lock() = Some(output.clone());
        self.spawn_script(output);
        Ok(())
    }

    fn stop_running(&self) {
        if let Some(token) = self.state.script_token.lock().take() {
            token.cancel();
        }
        if self.state.output.lock().take().is_some() {
            self.state.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
