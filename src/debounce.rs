//! Turns the recognition engine's per-frame detections into one report per
//! physical scan.
//!
//! A code held in front of the camera is recognized on dozens of consecutive
//! frames. The debouncer reports the first qualifying detection, then discards
//! everything for a fixed cooldown window. The consumer can additionally hold
//! reporting off while it is busy with a previous result.

use crate::detection::RawDetection;
use crate::events::{BarcodeSink, ScanReport};
use crate::symbology::SymbolType;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default cooldown between two reports
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2500);

/// Reporting guards. A report is only emitted when both are false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebounceState {
    /// Within the cooldown window after the last report
    pub cooling: bool,
    /// The consumer is still handling a previous report
    pub awaiting_consumer: bool,
}

impl DebounceState {
    pub fn is_idle(&self) -> bool {
        !self.cooling && !self.awaiting_consumer
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    payload: String,
    symbol: SymbolType,
}

/// Single-shot deferred callback that can be canceled before it fires
#[derive(Default)]
pub struct CooldownTimer {
    handle: Option<JoinHandle<()>>,
}

impl CooldownTimer {
    /// Run `on_expire` after `delay`, replacing any pending timer.
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, delay: Duration, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expire();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Default)]
struct Inner {
    state: DebounceState,
    pending: Option<Candidate>,
    /// Bumped whenever a window opens or the debouncer resets; an expiring
    /// timer only clears `cooling` for the window it was armed for
    window: u64,
    timer: CooldownTimer,
}

/// Rate limiter between the recognition callback and the consumer.
///
/// Batches must be fed from a single serialized queue; the internal lock only
/// guards against the cooldown timer and consumer-side guard updates.
pub struct ScanEventDebouncer {
    inner: Arc<Mutex<Inner>>,
    cooldown: Duration,
    accepted: Vec<SymbolType>,
    sink: Option<Arc<dyn BarcodeSink>>,
}

impl ScanEventDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            cooldown,
            accepted: SymbolType::ALL.to_vec(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn BarcodeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_accepted_symbols(mut self, accepted: Vec<SymbolType>) -> Self {
        self.accepted = accepted;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn state(&self) -> DebounceState {
        self.inner.lock().state
    }

    /// Payload waiting for the next eligible window, if any
    pub fn pending_payload(&self) -> Option<String> {
        self.inner
            .lock()
            .pending
            .as_ref()
            .map(|candidate| candidate.payload.clone())
    }

    pub fn is_cooldown_pending(&self) -> bool {
        self.inner.lock().timer.is_pending()
    }

    /// Hold reporting off (or release it) while the consumer is busy
    pub fn set_awaiting_consumer(&self, awaiting: bool) {
        let mut inner = self.inner.lock();
        if inner.state.awaiting_consumer != awaiting {
            debug!("Awaiting consumer: {}", awaiting);
        }
        inner.state.awaiting_consumer = awaiting;
    }

    pub fn clear_pending(&self) {
        self.inner.lock().pending = None;
    }

    /// Cancel the cooldown timer and return to idle with nothing pending
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.timer.cancel();
        inner.window += 1;
        inner.state = DebounceState::default();
        inner.pending = None;
        debug!("Debouncer reset");
    }

    /// Process one frame's detections, reporting at most one value.
    ///
    /// The first accepted, decoded detection replaces the pending candidate.
    /// When neither guard is set the candidate is reported and a cooldown
    /// window opens; otherwise it waits and may be replaced by later frames.
    ///
    /// Opening a window arms the cooldown timer, so this must be called from
    /// within a tokio runtime.
    pub fn handle_batch(&self, detections: &[RawDetection]) -> Option<ScanReport> {
        let candidate = {
            let mut inner = self.inner.lock();

            let first = detections.iter().find_map(|detection| {
                match (&detection.payload, self.accepted.contains(&detection.symbol)) {
                    (Some(payload), true) => Some(Candidate {
                        payload: payload.clone(),
                        symbol: detection.symbol,
                    }),
                    _ => None,
                }
            });
            if let Some(candidate) = first {
                inner.pending = Some(candidate);
            }

            if !inner.state.is_idle() {
                trace!("Detection held back: {:?}", inner.state);
                return None;
            }

            let candidate = inner.pending.take()?;

            inner.state.cooling = true;
            inner.window += 1;
            let window = inner.window;
            let weak = Arc::downgrade(&self.inner);
            inner
                .timer
                .arm(self.cooldown, move || Self::end_cooldown(weak, window));

            candidate
        };

        let report = ScanReport::camera(candidate.payload, candidate.symbol);
        debug!(
            "Reporting {} ({}); cooling for {:?}",
            report.payload, candidate.symbol, self.cooldown
        );
        if let Some(sink) = &self.sink {
            sink.barcode_reported(&report);
        }
        Some(report)
    }

    fn end_cooldown(inner: Weak<Mutex<Inner>>, window: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock();
        if inner.window == window {
            inner.state.cooling = false;
            trace!("Cooldown window {} ended", window);
        }
    }
}

impl Default for ScanEventDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FnSink;
    use tokio::time::sleep;

    fn ean(payload: &str) -> Vec<RawDetection> {
        vec![RawDetection::new(SymbolType::Ean13, payload)]
    }

    fn recording_debouncer() -> (ScanEventDebouncer, Arc<Mutex<Vec<String>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink_reports = Arc::clone(&reports);
        let sink = FnSink(move |report: &ScanReport| {
            sink_reports.lock().push(report.payload.clone());
        });
        let debouncer = ScanEventDebouncer::default().with_sink(Arc::new(sink));
        (debouncer, reports)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window_reports_first_payload_once() {
        let (debouncer, reports) = recording_debouncer();

        for i in 0..25 {
            debouncer.handle_batch(&ean(&format!("code-{}", i)));
            sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(*reports.lock(), vec!["code-0".to_string()]);
        assert!(debouncer.state().cooling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_scenario() {
        let (debouncer, reports) = recording_debouncer();

        // 40 frames within 0.1s
        for _ in 0..40 {
            debouncer.handle_batch(&ean("8901234"));
            sleep(Duration::from_micros(2500)).await;
        }
        assert_eq!(*reports.lock(), vec!["8901234".to_string()]);

        // 37 more frames within the next 2.0s
        for _ in 0..37 {
            debouncer.handle_batch(&ean("8901234"));
            sleep(Duration::from_millis(54)).await;
        }
        assert_eq!(reports.lock().len(), 1);

        // past 2.5s since the report
        sleep(Duration::from_millis(405)).await;
        assert!(!debouncer.state().cooling);
        debouncer.handle_batch(&ean("5551212"));

        assert_eq!(
            *reports.lock(),
            vec!["8901234".to_string(), "5551212".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_report_before_cooldown_elapses() {
        let (debouncer, reports) = recording_debouncer();

        debouncer.handle_batch(&ean("A"));
        sleep(Duration::from_millis(2499)).await;
        assert!(debouncer.handle_batch(&ean("B")).is_none());
        assert_eq!(reports.lock().len(), 1);

        sleep(Duration::from_millis(2)).await;
        let report = debouncer.handle_batch(&ean("C")).unwrap();
        assert_eq!(report.payload, "C");
        assert_eq!(report.symbol, Some(SymbolType::Ean13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_awaiting_consumer_suppresses_until_cleared() {
        let (debouncer, reports) = recording_debouncer();
        debouncer.set_awaiting_consumer(true);

        for _ in 0..10 {
            debouncer.handle_batch(&ean("held"));
            sleep(Duration::from_secs(3)).await;
        }
        assert!(reports.lock().is_empty());
        assert!(!debouncer.state().cooling);

        debouncer.set_awaiting_consumer(false);
        debouncer.handle_batch(&ean("released"));
        assert_eq!(*reports.lock(), vec!["released".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_candidate_before_eligible_window_wins() {
        let (debouncer, reports) = recording_debouncer();
        debouncer.set_awaiting_consumer(true);

        debouncer.handle_batch(&ean("first"));
        debouncer.handle_batch(&ean("second"));
        assert_eq!(debouncer.pending_payload().as_deref(), Some("second"));

        debouncer.set_awaiting_consumer(false);
        debouncer.handle_batch(&[]);

        assert_eq!(*reports.lock(), vec!["second".to_string()]);
        assert!(debouncer.pending_payload().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_frames_do_not_open_a_window() {
        let (debouncer, reports) = recording_debouncer();

        assert!(debouncer.handle_batch(&[]).is_none());
        assert!(debouncer.state().is_idle());
        assert!(!debouncer.is_cooldown_pending());

        debouncer.handle_batch(&ean("X"));
        assert_eq!(reports.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_qualifying_detection_in_frame_wins() {
        let debouncer = ScanEventDebouncer::default()
            .with_accepted_symbols(vec![SymbolType::Qr, SymbolType::Code128]);

        let report = debouncer
            .handle_batch(&[
                RawDetection::new(SymbolType::Ean8, "96385074"),
                RawDetection::undecoded(SymbolType::Qr),
                RawDetection::new(SymbolType::Code128, "PKG-1"),
                RawDetection::new(SymbolType::Qr, "https://example.org"),
            ])
            .unwrap();

        assert_eq!(report.payload, "PKG-1");
        assert_eq!(report.symbol, Some(SymbolType::Code128));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unaccepted_frames_report_nothing() {
        let debouncer =
            ScanEventDebouncer::default().with_accepted_symbols(vec![SymbolType::Qr]);

        assert!(debouncer.handle_batch(&ean("4006381333931")).is_none());
        assert!(debouncer.state().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_timer_and_stale_expiry_is_ignored() {
        let (debouncer, reports) = recording_debouncer();

        debouncer.handle_batch(&ean("one"));
        assert!(debouncer.is_cooldown_pending());

        debouncer.reset();
        assert!(debouncer.state().is_idle());
        assert!(!debouncer.is_cooldown_pending());

        sleep(Duration::from_secs(1)).await;
        debouncer.handle_batch(&ean("two"));

        // the first window's deadline passes without ending the second window
        sleep(Duration::from_millis(1600)).await;
        assert!(debouncer.state().cooling);
        assert!(debouncer.handle_batch(&ean("three")).is_none());

        sleep(Duration::from_secs(1)).await;
        assert!(!debouncer.state().cooling);
        assert_eq!(
            *reports.lock(),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_cooldown() {
        let debouncer = ScanEventDebouncer::new(Duration::from_millis(500));

        assert!(debouncer.handle_batch(&ean("a")).is_some());
        sleep(Duration::from_millis(501)).await;
        assert!(debouncer.handle_batch(&ean("b")).is_some());
    }
}
