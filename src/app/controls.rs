use super::reader::{publish, BarcodeReader};
use crate::camera::CameraPosition;
use crate::events::{ScanEvent, ScanReport};
use crate::geometry::{Orientation, Rect};
use chrono::Utc;
use tracing::{debug, info};

impl BarcodeReader {
    /// Switch to the other camera and remember the choice.
    ///
    /// A running scan restarts on the new camera with the held candidate
    /// dropped and the consumer guard released.
    pub async fn change_camera_mode(&self) -> CameraPosition {
        let mut controller = self.controller.lock().await;
        let was_running = controller.is_running();

        // cleared before the restart so frames of the new session survive
        self.debouncer.clear_pending();
        if was_running {
            self.debouncer.set_awaiting_consumer(false);
        }

        let position = controller.change_camera_mode();
        Self::publish_fault(&self.event_bus, &mut controller);

        info!("Camera switched to {}", position);
        publish(
            &self.event_bus,
            ScanEvent::CameraSwitched {
                position,
                timestamp: Utc::now(),
            },
        );
        position
    }

    /// Flip the torch of the active camera. Returns the resulting state.
    pub async fn toggle_torch(&self) -> bool {
        let mut controller = self.controller.lock().await;
        let before = controller.is_torch_active();

        controller.toggle_torch();
        Self::publish_fault(&self.event_bus, &mut controller);

        let active = controller.is_torch_active();
        if active != before {
            publish(
                &self.event_bus,
                ScanEvent::TorchChanged {
                    active,
                    timestamp: Utc::now(),
                },
            );
        }
        active
    }

    pub async fn is_torch_active(&self) -> bool {
        self.controller.lock().await.is_torch_active()
    }

    pub async fn is_torch_matching(&self, ui_enabled: bool) -> bool {
        self.controller.lock().await.is_torch_matching(ui_enabled)
    }

    pub async fn is_torch_available(&self) -> bool {
        self.controller.lock().await.is_torch_available()
    }

    pub async fn is_torch_available_for_camera(&self, position: CameraPosition) -> bool {
        self.controller
            .lock()
            .await
            .is_torch_available_for_camera(position)
    }

    /// Bounds of the on-screen scanning guide, in capture coordinates
    pub async fn set_interest_rectangle(&self, guide_bounds: Rect) {
        self.controller
            .lock()
            .await
            .set_interest_rectangle(guide_bounds);
    }

    pub async fn set_capture_bounds(&self, bounds: Rect) {
        self.controller.lock().await.set_capture_bounds(bounds);
    }

    pub async fn handle_orientation_change(&self, orientation: Orientation, bounds: Rect) {
        self.controller
            .lock()
            .await
            .handle_orientation_change(orientation, bounds);
    }

    /// Hold camera reports back while the consumer handles the previous one
    pub fn set_awaiting_consumer(&self, awaiting: bool) {
        self.debouncer.set_awaiting_consumer(awaiting);
    }

    /// Report a value typed by the user. Bypasses the debouncer entirely;
    /// only an empty string is rejected.
    pub fn submit_manual(&self, text: &str) -> Option<ScanReport> {
        if text.is_empty() {
            debug!("Ignoring empty manual entry");
            return None;
        }

        let report = ScanReport::manual(text);
        self.reports.barcode_reported(&report);
        Some(report)
    }
}
