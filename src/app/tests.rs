use super::*;
use crate::camera::{CameraPosition, CaptureBackend, MockCaptureBackend};
use crate::config::ScannerConfig;
use crate::detection::RawDetection;
use crate::error::BarcamError;
use crate::events::{EventBus, FnSink, ScanEvent, ScanReport, ScanSource};
use crate::preferences::{MemoryPreferenceStore, PreferenceStore, CAMERA_POSITION_KEY};
use crate::symbology::SymbolType;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

struct Fixture {
    reader: BarcodeReader,
    backend: Arc<MockCaptureBackend>,
    preferences: Arc<MemoryPreferenceStore>,
    reports: Arc<Mutex<Vec<ScanReport>>>,
    events: broadcast::Receiver<ScanEvent>,
}

fn fixture_with(backend: MockCaptureBackend) -> Fixture {
    let backend = Arc::new(backend);
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let reports = Arc::new(Mutex::new(Vec::new()));
    let event_bus = EventBus::new(64);
    let events = event_bus.subscribe();

    let sink_reports = Arc::clone(&reports);
    let reader = BarcodeReader::builder()
        .backend(Arc::clone(&backend) as Arc<dyn CaptureBackend>)
        .preferences(Arc::clone(&preferences) as Arc<dyn PreferenceStore>)
        .event_bus(event_bus)
        .sink(Arc::new(FnSink(move |report: &ScanReport| {
            sink_reports.lock().push(report.clone());
        })))
        .build()
        .unwrap();

    Fixture {
        reader,
        backend,
        preferences,
        reports,
        events,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockCaptureBackend::new())
}

fn payloads(reports: &Mutex<Vec<ScanReport>>) -> Vec<String> {
    reports.lock().iter().map(|r| r.payload.clone()).collect()
}

fn drain(events: &mut broadcast::Receiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn ean(payload: &str) -> Vec<RawDetection> {
    vec![RawDetection::new(SymbolType::Ean13, payload)]
}

/// Let the dispatch task drain the detection queue
async fn settle() {
    sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_builder_requires_backend_and_preferences() {
    let missing_backend = BarcodeReader::builder()
        .preferences(Arc::new(MemoryPreferenceStore::new()))
        .build();
    assert!(missing_backend.is_err());

    let missing_preferences = BarcodeReader::builder()
        .backend(Arc::new(MockCaptureBackend::new()))
        .build();
    assert!(missing_preferences.is_err());

    let zero_cooldown = BarcodeReader::builder()
        .backend(Arc::new(MockCaptureBackend::new()))
        .preferences(Arc::new(MemoryPreferenceStore::new()))
        .scanner(ScannerConfig {
            cooldown_seconds: 0.0,
            ..ScannerConfig::default()
        })
        .build();
    assert!(zero_cooldown.is_err());

    let unrepresentable_cooldown = BarcodeReader::builder()
        .backend(Arc::new(MockCaptureBackend::new()))
        .preferences(Arc::new(MemoryPreferenceStore::new()))
        .scanner(ScannerConfig {
            cooldown_seconds: 1e30,
            ..ScannerConfig::default()
        })
        .build();
    assert!(matches!(
        unrepresentable_cooldown,
        Err(BarcamError::Config(_))
    ));
}

#[tokio::test]
async fn test_present_starts_without_blocking_caller() {
    let mut f = fixture();

    let task = f.reader.present();
    task.await.unwrap();

    assert!(f.reader.is_running().await);
    assert!(matches!(
        drain(&mut f.events).as_slice(),
        [ScanEvent::CaptureStarted {
            position: CameraPosition::Back,
            ..
        }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_frames_reports_once() {
    let mut f = fixture();
    f.reader.start().await;

    for _ in 0..40 {
        assert!(f.backend.emit(ean("8901234")));
    }
    settle().await;

    assert_eq!(payloads(&f.reports), vec!["8901234".to_string()]);
    assert_eq!(f.reports.lock()[0].source, ScanSource::Camera);
    assert!(f.reader.debounce_state().cooling);

    let scanned = drain(&mut f.events)
        .into_iter()
        .filter(|e| matches!(e, ScanEvent::BarcodeScanned(_)))
        .count();
    assert_eq!(scanned, 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_code_reported_after_cooldown() {
    let f = fixture();
    f.reader.start().await;

    f.backend.emit(ean("8901234"));
    settle().await;
    sleep(Duration::from_millis(2000)).await;
    f.backend.emit(ean("5551212"));
    settle().await;
    assert_eq!(f.reports.lock().len(), 1);

    sleep(Duration::from_millis(600)).await;
    f.backend.emit(ean("5551212"));
    settle().await;

    assert_eq!(
        payloads(&f.reports),
        vec!["8901234".to_string(), "5551212".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_frames_and_timer() {
    let f = fixture();
    f.reader.start().await;
    f.backend.emit(ean("first"));
    settle().await;

    let stale = f.backend.delegate().unwrap();
    f.reader.stop().await;

    assert!(!f.reader.is_running().await);
    assert!(f.reader.debounce_state().is_idle());

    // frames still in flight from the stopped session
    assert!(stale.deliver(ean("late")));
    settle().await;
    sleep(Duration::from_secs(3)).await;

    assert_eq!(payloads(&f.reports), vec!["first".to_string()]);
    assert!(f.reader.debounce_state().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_restart_ignores_previous_session_batches() {
    let f = fixture();
    f.reader.start().await;
    let stale = f.backend.delegate().unwrap();

    f.reader.stop().await;
    f.reader.start().await;

    stale.deliver(ean("stale"));
    settle().await;
    assert!(f.reports.lock().is_empty());

    f.backend.emit(ean("fresh"));
    settle().await;
    assert_eq!(payloads(&f.reports), vec!["fresh".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_start_opens_new_window_immediately() {
    let f = fixture();
    f.reader.start().await;
    f.backend.emit(ean("one"));
    settle().await;

    f.reader.stop().await;
    f.reader.start().await;
    f.backend.emit(ean("two"));
    settle().await;

    assert_eq!(payloads(&f.reports), vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_awaiting_consumer_holds_reports() {
    let f = fixture();
    f.reader.set_awaiting_consumer(true);
    f.reader.start().await;

    f.backend.emit(ean("held"));
    settle().await;
    sleep(Duration::from_secs(10)).await;
    assert!(f.reports.lock().is_empty());
    assert_eq!(f.reader.pending_payload().as_deref(), Some("held"));

    f.reader.set_awaiting_consumer(false);
    f.backend.emit(vec![]);
    settle().await;
    assert_eq!(payloads(&f.reports), vec!["held".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_manual_entry_bypasses_guards() {
    let f = fixture();
    f.reader.start().await;
    f.backend.emit(ean("camera"));
    settle().await;
    f.reader.set_awaiting_consumer(true);

    let report = f.reader.submit_manual("MANUAL-42").unwrap();
    assert_eq!(report.source, ScanSource::Manual);
    assert_eq!(report.symbol, None);
    assert!(f.reader.submit_manual("").is_none());

    assert_eq!(
        payloads(&f.reports),
        vec!["camera".to_string(), "MANUAL-42".to_string()]
    );
    let state = f.reader.debounce_state();
    assert!(state.cooling);
    assert!(state.awaiting_consumer);
}

#[tokio::test]
async fn test_cancel_forgets_pending_candidate() {
    let f = fixture();
    f.reader.set_awaiting_consumer(true);
    f.reader.start().await;

    f.backend.emit(ean("abandoned"));
    settle().await;
    assert!(f.reader.pending_payload().is_some());

    f.reader.cancel().await;

    assert!(f.reader.pending_payload().is_none());
    assert!(!f.reader.is_running().await);
}

#[tokio::test]
async fn test_camera_switch_persists_and_publishes() {
    let mut f = fixture();
    f.reader.start().await;
    drain(&mut f.events);

    let position = f.reader.change_camera_mode().await;

    assert_eq!(position, CameraPosition::Front);
    assert_eq!(f.reader.camera_position().await, CameraPosition::Front);
    assert_eq!(f.preferences.get(CAMERA_POSITION_KEY), Some(2));
    assert_eq!(f.backend.peak_claims(), 1);
    assert!(drain(&mut f.events).iter().any(|e| matches!(
        e,
        ScanEvent::CameraSwitched {
            position: CameraPosition::Front,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_camera_switch_releases_consumer_guard() {
    let f = fixture();

    // switching an idle reader leaves the guard alone
    f.reader.set_awaiting_consumer(true);
    f.reader.change_camera_mode().await;
    assert!(f.reader.debounce_state().awaiting_consumer);

    f.reader.start().await;
    f.reader.change_camera_mode().await;
    assert!(!f.reader.debounce_state().awaiting_consumer);

    f.backend.emit(ean("after-switch"));
    settle().await;
    assert_eq!(payloads(&f.reports), vec!["after-switch".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_camera_switch_drops_frames_from_previous_camera() {
    let f = fixture();
    f.reader.set_awaiting_consumer(true);
    f.reader.start().await;
    f.backend.emit(ean("held"));
    settle().await;
    assert_eq!(f.reader.pending_payload().as_deref(), Some("held"));

    let stale = f.backend.delegate().unwrap();
    f.reader.change_camera_mode().await;
    assert!(f.reader.pending_payload().is_none());

    stale.deliver(ean("old-camera"));
    settle().await;
    assert!(f.reports.lock().is_empty());
    assert!(f.reader.pending_payload().is_none());

    f.backend.emit(ean("new-camera"));
    settle().await;
    assert_eq!(payloads(&f.reports), vec!["new-camera".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_spans_camera_switch() {
    let f = fixture();
    f.reader.start().await;
    f.backend.emit(ean("before"));
    settle().await;

    f.reader.change_camera_mode().await;
    f.backend.emit(ean("too-soon"));
    settle().await;
    assert_eq!(payloads(&f.reports), vec!["before".to_string()]);
    assert!(f.reader.debounce_state().cooling);

    sleep(Duration::from_millis(2600)).await;
    f.backend.emit(vec![]);
    settle().await;
    assert_eq!(
        payloads(&f.reports),
        vec!["before".to_string(), "too-soon".to_string()]
    );
}

#[tokio::test]
async fn test_torch_toggle_publishes_changes_only() {
    let mut f = fixture();
    f.reader.start().await;
    drain(&mut f.events);

    assert!(f.reader.toggle_torch().await);
    assert!(f.reader.is_torch_active().await);
    assert!(f.reader.is_torch_matching(false).await);
    assert!(f.reader.is_torch_available().await);
    assert!(!f
        .reader
        .is_torch_available_for_camera(CameraPosition::Front)
        .await);

    f.reader.change_camera_mode().await;
    drain(&mut f.events);

    // the front camera has no torch
    assert!(!f.reader.toggle_torch().await);
    assert!(drain(&mut f.events).is_empty());
}

#[tokio::test]
async fn test_missing_hardware_publishes_fault() {
    let mut f = fixture_with(MockCaptureBackend::without_hardware());

    f.reader.start().await;

    assert!(!f.reader.is_running().await);
    match drain(&mut f.events).as_slice() {
        [ScanEvent::CaptureFault { kind, .. }] => assert_eq!(kind, "device_unavailable"),
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn test_run_serves_commands_until_quit() {
    let f = fixture();
    let (tx, rx) = mpsc::unbounded_channel();

    tx.send(ReaderCommand::ManualEntry("typed".to_string())).unwrap();
    tx.send(ReaderCommand::ToggleTorch).unwrap();
    tx.send(ReaderCommand::Quit).unwrap();

    let reason = f.reader.run(rx).await;

    assert_eq!(reason, ShutdownReason::UserRequest);
    assert_eq!(payloads(&f.reports), vec!["typed".to_string()]);
    assert!(!f.reader.is_running().await);
}

#[tokio::test]
async fn test_reader_keeps_reporting_after_run_returns() {
    let f = fixture();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(ReaderCommand::Quit).unwrap();
    assert_eq!(f.reader.run(rx).await, ShutdownReason::UserRequest);

    f.reader.start().await;
    assert!(f.reader.is_running().await);
    f.backend.emit(ean("second-run"));
    settle().await;

    assert_eq!(payloads(&f.reports), vec!["second-run".to_string()]);
}

#[tokio::test]
async fn test_run_ends_when_input_closes() {
    let f = fixture();
    let (tx, rx) = mpsc::unbounded_channel();
    drop(tx);

    assert_eq!(f.reader.run(rx).await, ShutdownReason::InputClosed);
}
