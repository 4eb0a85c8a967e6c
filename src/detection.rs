use crate::symbology::SymbolType;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// One symbol recognized in one processed frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDetection {
    pub symbol: SymbolType,
    /// Decoded value; `None` when the engine located a symbol it could not read
    pub payload: Option<String>,
}

impl RawDetection {
    pub fn new<S: Into<String>>(symbol: SymbolType, payload: S) -> Self {
        Self {
            symbol,
            payload: Some(payload.into()),
        }
    }

    pub fn undecoded(symbol: SymbolType) -> Self {
        Self {
            symbol,
            payload: None,
        }
    }
}

/// All detections of a single processed frame, in engine order
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    /// Generation of the capture session that produced the batch
    pub session: u64,
    pub detections: Vec<RawDetection>,
}

pub type DetectionSender = mpsc::UnboundedSender<DetectionBatch>;
pub type DetectionReceiver = mpsc::UnboundedReceiver<DetectionBatch>;

/// Callback registration handed to the recognition engine.
///
/// Every batch delivered through it is stamped with the session generation it
/// was registered for, so the dispatcher can drop frames from a torn-down
/// session.
#[derive(Debug, Clone)]
pub struct DetectionDelegate {
    session: u64,
    sender: DetectionSender,
}

impl DetectionDelegate {
    pub fn new(session: u64, sender: DetectionSender) -> Self {
        Self { session, sender }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Deliver one frame's detections. Returns false once the queue is gone.
    pub fn deliver(&self, detections: Vec<RawDetection>) -> bool {
        trace!(
            "Delivering {} detections for session {}",
            detections.len(),
            self.session
        );
        self.sender
            .send(DetectionBatch {
                session: self.session,
                detections,
            })
            .is_ok()
    }
}
