use super::reader::{publish, BarcodeReader};
use crate::camera::CaptureSessionController;
use crate::events::{EventBus, ScanEvent};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

impl BarcodeReader {
    /// Start capturing. Faults are absorbed by the controller and published
    /// as [`ScanEvent::CaptureFault`]; the reader then simply stays idle.
    pub async fn start(&self) {
        start_session(&self.controller, &self.event_bus).await;
    }

    /// Start capturing without holding up the caller, as when the scanner
    /// view is first shown
    pub fn present(&self) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        let event_bus = self.event_bus.clone();

        debug!("Presenting scanner");
        tokio::spawn(async move {
            start_session(&controller, &event_bus).await;
        })
    }

    /// Tear the session down and return the debouncer to idle. No report is
    /// delivered for frames of the stopped session.
    pub async fn stop(&self) {
        let mut controller = self.controller.lock().await;
        let was_running = controller.is_running();

        controller.stop_capture();
        self.debouncer.reset();

        if was_running {
            info!("Capture stopped");
            publish(
                &self.event_bus,
                ScanEvent::CaptureStopped {
                    timestamp: Utc::now(),
                },
            );
        }
    }

    /// Dismiss the scanner: stop and forget any candidate held back
    pub async fn cancel(&self) {
        self.stop().await;
        self.debouncer.clear_pending();
        info!("Scan canceled");
    }
}

async fn start_session(controller: &Mutex<CaptureSessionController>, event_bus: &EventBus) {
    let mut controller = controller.lock().await;

    controller.start_capture();
    BarcodeReader::publish_fault(event_bus, &mut controller);

    if !controller.is_running() {
        return;
    }

    let position = controller.camera_position();
    let device = controller
        .device()
        .map(|device| device.id().to_string())
        .unwrap_or_default();

    info!("Capture started on {} camera ({})", position, device);
    publish(
        event_bus,
        ScanEvent::CaptureStarted {
            position,
            device,
            timestamp: Utc::now(),
        },
    );
}
