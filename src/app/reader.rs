use crate::camera::{CameraPosition, CaptureSessionController};
use crate::debounce::{DebounceState, ScanEventDebouncer};
use crate::detection::DetectionReceiver;
use crate::events::{BarcodeSink, EventBus, ScanEvent, ScanReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Host-facing scanner: the capture controller, the debouncer between the
/// recognition engine and the consumer, and the manual entry path.
///
/// Hardware calls are serialized through one async mutex around the
/// controller. Detection batches are drained by a single dispatch task, so the
/// debouncer sees them one at a time and in order.
pub struct BarcodeReader {
    pub(super) controller: Arc<Mutex<CaptureSessionController>>,
    pub(super) debouncer: Arc<ScanEventDebouncer>,
    pub(super) reports: Arc<dyn BarcodeSink>,
    pub(super) event_bus: EventBus,
    pub(super) dispatcher: JoinHandle<()>,
    /// Ends the dispatch task; only cancelled when the reader is dropped
    pub(super) cancellation_token: CancellationToken,
}

impl BarcodeReader {
    pub fn builder() -> super::ReaderBuilder {
        super::ReaderBuilder::new()
    }

    /// Wire the parts together and spawn the dispatch task.
    /// Must be called from within a tokio runtime.
    pub(super) fn assemble(
        controller: CaptureSessionController,
        detections: DetectionReceiver,
        debouncer: ScanEventDebouncer,
        reports: Arc<dyn BarcodeSink>,
        event_bus: EventBus,
    ) -> Self {
        let cancellation_token = CancellationToken::new();
        let debouncer = Arc::new(debouncer);

        let dispatcher = tokio::spawn(dispatch_detections(
            detections,
            controller.active_session(),
            Arc::clone(&debouncer),
            cancellation_token.clone(),
        ));

        info!(
            "Barcode reader ready (cooldown {:?})",
            debouncer.cooldown()
        );

        Self {
            controller: Arc::new(Mutex::new(controller)),
            debouncer,
            reports,
            event_bus,
            dispatcher,
            cancellation_token,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Shared handle on the capture controller for host view bindings
    pub fn controller(&self) -> Arc<Mutex<CaptureSessionController>> {
        Arc::clone(&self.controller)
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.debouncer.state()
    }

    pub fn pending_payload(&self) -> Option<String> {
        self.debouncer.pending_payload()
    }

    pub async fn is_running(&self) -> bool {
        self.controller.lock().await.is_running()
    }

    pub async fn camera_position(&self) -> CameraPosition {
        self.controller.lock().await.camera_position()
    }

    /// Publish any fault the controller absorbed during the last call
    pub(super) fn publish_fault(event_bus: &EventBus, controller: &mut CaptureSessionController) {
        if let Some(error) = controller.take_last_error() {
            publish(event_bus, ScanEvent::fault(&error));
        }
    }
}

impl Drop for BarcodeReader {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
        self.dispatcher.abort();
        self.debouncer.reset();
    }
}

pub(super) fn publish(event_bus: &EventBus, event: ScanEvent) {
    if let Err(e) = event_bus.publish(event) {
        trace!("Event not delivered: {}", e);
    }
}

async fn dispatch_detections(
    mut detections: DetectionReceiver,
    active_session: Arc<AtomicU64>,
    debouncer: Arc<ScanEventDebouncer>,
    cancellation_token: CancellationToken,
) {
    debug!("Detection dispatcher started");

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            batch = detections.recv() => {
                let Some(batch) = batch else {
                    break;
                };

                let active = active_session.load(Ordering::SeqCst);
                if active == 0 || batch.session != active {
                    trace!(
                        "Dropping batch from session {} (active {})",
                        batch.session,
                        active
                    );
                    continue;
                }

                debouncer.handle_batch(&batch.detections);
            }
        }
    }

    debug!("Detection dispatcher stopped");
}

/// Delivers every report to the consumer and onto the event bus
pub(super) struct ReportFanout {
    pub(super) consumer: Option<Arc<dyn BarcodeSink>>,
    pub(super) event_bus: EventBus,
}

impl BarcodeSink for ReportFanout {
    fn barcode_reported(&self, report: &ScanReport) {
        if let Some(consumer) = &self.consumer {
            consumer.barcode_reported(report);
        }
        self.event_bus.barcode_reported(report);
    }
}
