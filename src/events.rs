use crate::camera::CameraPosition;
use crate::error::{CaptureError, EventBusError};
use crate::symbology::SymbolType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a reported value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Camera,
    Manual,
}

/// A single value delivered to the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: Uuid,
    pub payload: String,
    /// Symbol type for camera scans; manual entries carry none
    pub symbol: Option<SymbolType>,
    pub source: ScanSource,
    pub timestamp: DateTime<Utc>,
}

impl ScanReport {
    pub fn camera<S: Into<String>>(payload: S, symbol: SymbolType) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            symbol: Some(symbol),
            source: ScanSource::Camera,
            timestamp: Utc::now(),
        }
    }

    pub fn manual<S: Into<String>>(payload: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            symbol: None,
            source: ScanSource::Manual,
            timestamp: Utc::now(),
        }
    }
}

/// Consumer of scan reports
pub trait BarcodeSink: Send + Sync {
    fn barcode_reported(&self, report: &ScanReport);
}

/// Adapts a closure into a [`BarcodeSink`]
pub struct FnSink<F>(pub F);

impl<F> BarcodeSink for FnSink<F>
where
    F: Fn(&ScanReport) + Send + Sync,
{
    fn barcode_reported(&self, report: &ScanReport) {
        (self.0)(report)
    }
}

/// Events emitted by the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A value was reported to the consumer
    BarcodeScanned(ScanReport),
    /// A capture session began running
    CaptureStarted {
        position: CameraPosition,
        device: String,
        timestamp: DateTime<Utc>,
    },
    /// The capture session was torn down
    CaptureStopped { timestamp: DateTime<Utc> },
    /// The preferred camera position changed
    CameraSwitched {
        position: CameraPosition,
        timestamp: DateTime<Utc>,
    },
    /// Torch state after a toggle request
    TorchChanged {
        active: bool,
        timestamp: DateTime<Utc>,
    },
    /// A hardware fault was absorbed by the controller
    CaptureFault {
        kind: String,
        details: String,
        timestamp: DateTime<Utc>,
    },
    /// Shutdown was requested
    ShutdownRequested {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    pub fn fault(error: &CaptureError) -> Self {
        ScanEvent::CaptureFault {
            kind: error.kind().to_string(),
            details: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScanEvent::BarcodeScanned(report) => report.timestamp,
            ScanEvent::CaptureStarted { timestamp, .. } => *timestamp,
            ScanEvent::CaptureStopped { timestamp } => *timestamp,
            ScanEvent::CameraSwitched { timestamp, .. } => *timestamp,
            ScanEvent::TorchChanged { timestamp, .. } => *timestamp,
            ScanEvent::CaptureFault { timestamp, .. } => *timestamp,
            ScanEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::BarcodeScanned(report) => match report.symbol {
                Some(symbol) => format!("Scanned {} ({})", report.payload, symbol),
                None => format!("Entered {} manually", report.payload),
            },
            ScanEvent::CaptureStarted {
                position, device, ..
            } => format!("Capture started on {} camera ({})", position, device),
            ScanEvent::CaptureStopped { .. } => "Capture stopped".to_string(),
            ScanEvent::CameraSwitched { position, .. } => {
                format!("Switched to {} camera", position)
            }
            ScanEvent::TorchChanged { active, .. } => {
                format!("Torch {}", if *active { "on" } else { "off" })
            }
            ScanEvent::CaptureFault { kind, details, .. } => {
                format!("Capture fault ({}): {}", kind, details)
            }
            ScanEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::BarcodeScanned(_) => "barcode_scanned",
            ScanEvent::CaptureStarted { .. } => "capture_started",
            ScanEvent::CaptureStopped { .. } => "capture_stopped",
            ScanEvent::CameraSwitched { .. } => "camera_switched",
            ScanEvent::TorchChanged { .. } => "torch_changed",
            ScanEvent::CaptureFault { .. } => "capture_fault",
            ScanEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus carrying scanner events to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    debug_logging: bool,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ScanEvent) -> Result<usize, EventBusError> {
        match &event {
            ScanEvent::BarcodeScanned(report) => {
                info!("Barcode reported: {} ({:?})", report.payload, report.source);
            }
            ScanEvent::CaptureFault { kind, details, .. } => {
                warn!("Capture fault {}: {}", kind, details);
            }
            ScanEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Publishing event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl BarcodeSink for EventBus {
    fn barcode_reported(&self, report: &ScanReport) {
        if let Err(e) = self.publish(ScanEvent::BarcodeScanned(report.clone())) {
            debug!("Scan report not delivered: {}", e);
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Named, filtered view over a bus subscription
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ScanEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next event that passes the filter
    pub async fn recv(&mut self) -> Result<ScanEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive a matching event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ScanEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
