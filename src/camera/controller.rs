use super::backend::CaptureBackend;
use super::device::{torch_available_for, CameraPosition, CaptureDevice, TorchMode};
use super::session::{CaptureSession, PreviewSurface, RecognitionOutput, SessionPreset};
use crate::detection::{DetectionDelegate, DetectionSender};
use crate::error::CaptureError;
use crate::geometry::{InterestPolicy, Orientation, Rect, RegionOfInterest};
use crate::preferences::PreferenceStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the capture hardware: device selection, session wiring, preview,
/// torch, orientation and region of interest.
///
/// Every fault is absorbed here. The controller logs it, remembers it as
/// [`last_error`](Self::last_error) and leaves the session inert.
pub struct CaptureSessionController {
    backend: Arc<dyn CaptureBackend>,
    preferences: Arc<dyn PreferenceStore>,
    detections: DetectionSender,
    /// Generation of the running session, 0 when none
    active_session: Arc<AtomicU64>,
    next_generation: u64,
    session: CaptureSession,
    device: Option<Arc<dyn CaptureDevice>>,
    capture_bounds: Rect,
    guide_bounds: Option<Rect>,
    orientation: Orientation,
    interest_policy: InterestPolicy,
    region: RegionOfInterest,
    last_error: Option<CaptureError>,
}

impl CaptureSessionController {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        preferences: Arc<dyn PreferenceStore>,
        detections: DetectionSender,
    ) -> Self {
        info!("Creating capture session controller on {} backend", backend.name());
        Self {
            backend,
            preferences,
            detections,
            active_session: Arc::new(AtomicU64::new(0)),
            next_generation: 0,
            session: CaptureSession::new(),
            device: None,
            capture_bounds: Rect::default(),
            guide_bounds: None,
            orientation: Orientation::default(),
            interest_policy: InterestPolicy::default(),
            region: RegionOfInterest::full_frame(),
            last_error: None,
        }
    }

    pub fn with_interest_policy(mut self, policy: InterestPolicy) -> Self {
        self.interest_policy = policy;
        self.update_region_of_interest();
        self
    }

    /// Handle the dispatcher uses to discard batches from stale sessions
    pub fn active_session(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.active_session)
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn device(&self) -> Option<&Arc<dyn CaptureDevice>> {
        self.device.as_ref()
    }

    pub fn region_of_interest(&self) -> RegionOfInterest {
        self.region
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<CaptureError> {
        self.last_error.take()
    }

    /// Persisted camera selection, `Back` when unset
    pub fn camera_position(&self) -> CameraPosition {
        CameraPosition::load(self.preferences.as_ref())
    }

    /// Bounds of the host view the preview fills
    pub fn set_capture_bounds(&mut self, bounds: Rect) {
        self.capture_bounds = bounds;
        self.update_orientation();
        self.update_region_of_interest();
    }

    /// Configure and run a session for the preferred camera.
    ///
    /// Any previous session is fully torn down first, so repeated calls never
    /// accumulate inputs, outputs or detection callbacks.
    pub fn start_capture(&mut self) {
        self.last_error = None;
        let position = self.camera_position();

        if !self.backend.is_capture_available() {
            self.absorb(CaptureError::DeviceUnavailable { position });
            return;
        }

        self.teardown();
        self.update_region_of_interest();
        self.session.set_preset(SessionPreset::Photo);

        let Some(device) = self.backend.device(position) else {
            self.absorb(CaptureError::DeviceUnavailable { position });
            return;
        };
        self.device = Some(Arc::clone(&device));
        let device_id = device.id().to_string();

        match self.backend.open_input(device) {
            Ok(input) => self.session.attach_input(input),
            Err(e) => self.absorb(e),
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        self.session.set_generation(generation);

        let mut output =
            RecognitionOutput::new(self.backend.native_symbols(), self.region, self.orientation);
        output.set_delegate(Some(DetectionDelegate::new(
            generation,
            self.detections.clone(),
        )));
        self.session.attach_output(output);
        self.session
            .attach_preview(PreviewSurface::new(self.capture_bounds, self.orientation));

        self.active_session.store(generation, Ordering::SeqCst);

        match self.backend.start_running(&self.session) {
            Ok(()) => {
                self.session.set_running(true);
                info!(
                    "Capture session {} running on {} camera ({})",
                    generation, position, device_id
                );
            }
            Err(e) => {
                self.absorb(e);
                self.teardown();
            }
        }
    }

    /// Release the device and stop the pipeline. Safe to call when idle.
    pub fn stop_capture(&mut self) {
        let was_running = self.session.is_running();
        self.teardown();
        if was_running {
            info!("Capture session stopped");
        } else {
            debug!("Stop requested with no running capture session");
        }
    }

    /// Switch between back and front cameras, returning the new position
    pub fn change_camera_mode(&mut self) -> CameraPosition {
        let position = self.camera_position().toggled();
        self.set_camera_position(position);
        position
    }

    /// Persist `position`; restart the session on it when running
    pub fn set_camera_position(&mut self, position: CameraPosition) {
        position.store(self.preferences.as_ref());

        if self.session.is_running() {
            info!("Switching running capture to {} camera", position);
            self.stop_capture();
            self.start_capture();
            self.update_orientation();
        } else {
            debug!("Camera preference set to {}", position);
            self.device = self.backend.device(position);
        }
    }

    /// Flip the torch of the selected device. No-op without usable torch hardware.
    pub fn toggle_torch(&mut self) {
        let Some(device) = self.device.clone() else {
            debug!("Cannot toggle torch: no device selected");
            return;
        };

        if !torch_available_for(device.as_ref()) {
            debug!(
                "{}",
                CaptureError::TorchUnsupported {
                    device: device.id().to_string(),
                }
            );
            return;
        }

        let target = device.torch_mode().toggled();
        match device.set_torch_mode(target) {
            Ok(()) => info!("Torch on {} set to {:?}", device.id(), target),
            Err(e) => self.absorb(e),
        }
    }

    /// Torch of the selected device is usable and on
    pub fn is_torch_active(&self) -> bool {
        match &self.device {
            Some(device) => {
                torch_available_for(device.as_ref()) && device.torch_mode() == TorchMode::On
            }
            None => false,
        }
    }

    /// Whether the host's torch button agrees with the device. An enabled
    /// button offers to switch the torch on, so it matches a torch that is off.
    pub fn is_torch_matching(&self, ui_enabled: bool) -> bool {
        let expected = if ui_enabled { TorchMode::Off } else { TorchMode::On };
        self.device
            .as_ref()
            .map(|device| device.torch_mode() == expected)
            .unwrap_or(false)
    }

    /// Torch is usable on the camera at the preferred position
    pub fn is_torch_available(&self) -> bool {
        self.is_torch_available_for_camera(self.camera_position())
    }

    pub fn is_torch_available_for_camera(&self, position: CameraPosition) -> bool {
        self.backend
            .device(position)
            .map(|device| torch_available_for(device.as_ref()))
            .unwrap_or(false)
    }

    /// Restrict recognition to the area under the host's scan guide
    pub fn set_interest_rectangle(&mut self, guide_bounds: Rect) {
        self.guide_bounds = Some(guide_bounds);
        self.update_region_of_interest();
    }

    /// Re-layout after the device rotated or the host view resized
    pub fn handle_orientation_change(&mut self, orientation: Orientation, bounds: Rect) {
        debug!("Orientation changed to {:?}", orientation);
        self.orientation = orientation;
        self.capture_bounds = bounds;
        self.update_orientation();
        self.update_region_of_interest();
    }

    fn update_orientation(&mut self) {
        let (bounds, orientation) = (self.capture_bounds, self.orientation);
        if let Some(preview) = self.session.preview_mut() {
            preview.frame = bounds;
            preview.orientation = orientation;
        }
        if let Some(output) = self.session.output_mut() {
            output.set_orientation(orientation);
        }
    }

    fn update_region_of_interest(&mut self) {
        self.region =
            self.interest_policy
                .compute(self.guide_bounds, self.capture_bounds, self.orientation);
        if let Some(output) = self.session.output_mut() {
            output.set_region_of_interest(self.region);
        }
        debug!("Region of interest: {:?}", self.region.rect());
    }

    /// Undo everything `start_capture` set up, pipeline first
    fn teardown(&mut self) {
        self.active_session.store(0, Ordering::SeqCst);
        self.backend.stop_running();
        self.session.detach_preview();
        self.session.detach_input();
        self.device = None;
        if let Some(output) = self.session.output_mut() {
            output.set_delegate(None);
        }
        self.session.detach_output();
        self.session.set_running(false);
    }

    fn absorb(&mut self, error: CaptureError) {
        match &error {
            CaptureError::DeviceUnavailable { .. } => debug!("{}", error),
            _ => warn!("{}", error),
        }
        self.last_error = Some(error);
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
