use super::reader::{BarcodeReader, ReportFanout};
use crate::camera::{CaptureBackend, CaptureSessionController};
use crate::config::{BarcamConfig, ScannerConfig};
use crate::debounce::ScanEventDebouncer;
use crate::error::{BarcamError, Result};
use crate::events::{BarcodeSink, EventBus};
use crate::geometry::InterestPolicy;
use crate::preferences::PreferenceStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Builder for [`BarcodeReader`]
pub struct ReaderBuilder {
    backend: Option<Arc<dyn CaptureBackend>>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    scanner: ScannerConfig,
    interest: InterestPolicy,
    event_bus: Option<EventBus>,
    sink: Option<Arc<dyn BarcodeSink>>,
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            preferences: None,
            scanner: ScannerConfig::default(),
            interest: InterestPolicy::default(),
            event_bus: None,
            sink: None,
        }
    }

    /// Take scanner and interest settings from a loaded configuration
    pub fn config(mut self, config: &BarcamConfig) -> Self {
        self.scanner = config.scanner.clone();
        self.interest = config.interest.clone();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CaptureBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn scanner(mut self, scanner: ScannerConfig) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn interest(mut self, interest: InterestPolicy) -> Self {
        self.interest = interest;
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Consumer notified of every report, in addition to the event bus
    pub fn sink(mut self, sink: Arc<dyn BarcodeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the reader. Spawns the dispatch task, so this must run inside a
    /// tokio runtime.
    pub fn build(self) -> Result<BarcodeReader> {
        let backend = self
            .backend
            .ok_or_else(|| BarcamError::component("reader", "Capture backend is required"))?;

        let preferences = self
            .preferences
            .ok_or_else(|| BarcamError::component("reader", "Preference store is required"))?;

        let cooldown = self.scanner.cooldown()?;

        let event_bus = self.event_bus.unwrap_or_else(|| EventBus::new(100));

        let (detections_tx, detections_rx) = mpsc::unbounded_channel();
        let controller = CaptureSessionController::new(backend, preferences, detections_tx)
            .with_interest_policy(self.interest);

        let reports: Arc<dyn BarcodeSink> = Arc::new(ReportFanout {
            consumer: self.sink,
            event_bus: event_bus.clone(),
        });

        let debouncer = ScanEventDebouncer::new(cooldown)
            .with_accepted_symbols(self.scanner.accepted_symbols)
            .with_sink(Arc::clone(&reports));

        Ok(BarcodeReader::assemble(
            controller,
            detections_rx,
            debouncer,
            reports,
            event_bus,
        ))
    }
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
