use super::backend::CaptureBackend;
use super::device::{CameraPosition, CaptureDevice, TorchMode};
use super::session::{CaptureInput, CaptureSession};
use super::torch::LedTorch;
use crate::config::CameraConfig;
use crate::error::CaptureError;
use crate::symbology::SymbolType;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer::prelude::*;
#[cfg(all(feature = "camera", target_os = "linux"))]
use std::sync::atomic::{AtomicBool, Ordering};

/// Video4Linux camera node with an optional sysfs torch LED
pub struct V4l2Device {
    id: String,
    path: PathBuf,
    position: CameraPosition,
    torch: Option<LedTorch>,
}

impl V4l2Device {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureDevice for V4l2Device {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn has_torch(&self) -> bool {
        self.torch.is_some()
    }

    fn is_torch_available(&self) -> bool {
        self.torch.as_ref().map(LedTorch::is_writable).unwrap_or(false)
    }

    fn is_torch_mode_supported(&self, _mode: TorchMode) -> bool {
        self.torch.is_some()
    }

    fn torch_mode(&self) -> TorchMode {
        self.torch.as_ref().map(LedTorch::mode).unwrap_or_default()
    }

    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), CaptureError> {
        match &self.torch {
            Some(torch) => torch.set_mode(mode),
            None => Err(CaptureError::TorchUnsupported {
                device: self.id.clone(),
            }),
        }
    }
}

/// Input claimed by holding the device node open
struct V4l2Input {
    device: Arc<dyn CaptureDevice>,
    path: PathBuf,
    _handle: File,
}

impl CaptureInput for V4l2Input {
    fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
struct RunningPipeline {
    pipeline: gstreamer::Pipeline,
    running: Arc<AtomicBool>,
    bus_thread: Option<std::thread::JoinHandle<()>>,
}

/// Linux capture backend: V4L2 device nodes, sysfs torch LEDs and, with the
/// `camera` feature, a GStreamer pipeline using the zbar element for
/// recognition.
pub struct V4l2Backend {
    config: CameraConfig,
    #[cfg(all(feature = "camera", target_os = "linux"))]
    running: Mutex<Option<RunningPipeline>>,
    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    running: Mutex<Option<()>>,
}

impl V4l2Backend {
    pub fn new(config: CameraConfig) -> Self {
        info!(
            "Initializing V4L2 capture backend (back=video{}, front=video{})",
            config.back_index, config.front_index
        );
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    fn device_path(&self, position: CameraPosition) -> PathBuf {
        let index = match position {
            CameraPosition::Back => self.config.back_index,
            CameraPosition::Front => self.config.front_index,
        };
        Path::new(&self.config.device_dir).join(format!("video{}", index))
    }

    fn torch_led(&self, position: CameraPosition) -> Option<LedTorch> {
        let led = match position {
            CameraPosition::Back => &self.config.back_torch_led,
            CameraPosition::Front => &self.config.front_torch_led,
        };
        if led.is_empty() {
            None
        } else {
            LedTorch::detect(led)
        }
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    fn build_pipeline_string(&self, device: &Path) -> String {
        let (width, height) = self.config.resolution;
        format!(
            "v4l2src device={} ! videoconvert ! videoscale ! \
             video/x-raw,width={},height={} ! videoconvert ! \
             zbar name=recognizer cache=false ! fakesink sync=false",
            device.display(),
            width,
            height
        )
    }
}

impl CaptureBackend for V4l2Backend {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn is_capture_available(&self) -> bool {
        [CameraPosition::Back, CameraPosition::Front]
            .iter()
            .any(|position| self.device_path(*position).exists())
    }

    fn device(&self, position: CameraPosition) -> Option<Arc<dyn CaptureDevice>> {
        let path = self.device_path(position);
        if !path.exists() {
            debug!("No {} camera at {}", position, path.display());
            return None;
        }

        Some(Arc::new(V4l2Device {
            id: path.display().to_string(),
            path,
            position,
            torch: self.torch_led(position),
        }))
    }

    fn open_input(&self, device: Arc<dyn CaptureDevice>) -> Result<Box<dyn CaptureInput>, CaptureError> {
        let path = self.device_path(device.position());
        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| CaptureError::InputAcquisitionFailed {
                device: device.id().to_string(),
                details: e.to_string(),
            })?;

        debug!("Claimed capture input {}", path.display());
        Ok(Box::new(V4l2Input {
            device,
            path,
            _handle: handle,
        }))
    }

    fn native_symbols(&self) -> Vec<SymbolType> {
        vec![
            SymbolType::UpcE,
            SymbolType::Code39,
            SymbolType::Ean13,
            SymbolType::Ean8,
            SymbolType::Code93,
            SymbolType::Code128,
            SymbolType::Pdf417,
            SymbolType::Qr,
            SymbolType::Itf14,
        ]
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    fn start_running(&self, session: &CaptureSession) -> Result<(), CaptureError> {
        use crate::detection::RawDetection;
        use tracing::{error, trace, warn};

        let input = session.input().ok_or_else(|| CaptureError::Pipeline {
            details: "session has no input".to_string(),
        })?;
        let output = session.output().cloned().ok_or_else(|| CaptureError::Pipeline {
            details: "session has no recognition output".to_string(),
        })?;

        gstreamer::init().map_err(|e| CaptureError::Pipeline {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let device_path = self.device_path(input.device().position());
        let pipeline_desc = self.build_pipeline_string(&device_path);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CaptureError::Pipeline {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| CaptureError::Pipeline {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let bus = pipeline.bus().ok_or_else(|| CaptureError::Pipeline {
            details: "Pipeline has no bus".to_string(),
        })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CaptureError::Pipeline {
                details: format!("Failed to start GStreamer pipeline: {}", e),
            })?;

        let running = Arc::new(AtomicBool::new(true));
        let bus_running = Arc::clone(&running);

        let bus_thread = std::thread::spawn(move || {
            while bus_running.load(Ordering::Relaxed) {
                let Some(message) = bus.timed_pop_filtered(
                    gstreamer::ClockTime::from_mseconds(100),
                    &[
                        gstreamer::MessageType::Element,
                        gstreamer::MessageType::Error,
                        gstreamer::MessageType::Eos,
                    ],
                ) else {
                    continue;
                };

                match message.view() {
                    gstreamer::MessageView::Element(element) => {
                        let Some(structure) = element.structure() else {
                            continue;
                        };
                        if !structure.has_name("barcode") {
                            continue;
                        }

                        let kind = structure.get::<String>("type").unwrap_or_default();
                        let Some(symbol) = SymbolType::from_zbar_name(&kind) else {
                            trace!("Ignoring unsupported zbar symbol {}", kind);
                            continue;
                        };
                        let payload = structure.get::<String>("symbol").ok();

                        if !output.deliver(vec![RawDetection { symbol, payload }]) {
                            break;
                        }
                    }
                    gstreamer::MessageView::Error(err) => {
                        error!("GStreamer pipeline error: {}", err.error());
                        break;
                    }
                    gstreamer::MessageView::Eos(..) => {
                        warn!("GStreamer pipeline reached end of stream");
                        break;
                    }
                    _ => {}
                }
            }
            debug!("GStreamer bus watcher stopped");
        });

        *self.running.lock() = Some(RunningPipeline {
            pipeline,
            running,
            bus_thread: Some(bus_thread),
        });

        info!("GStreamer pipeline started successfully");
        Ok(())
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    fn start_running(&self, _session: &CaptureSession) -> Result<(), CaptureError> {
        Err(CaptureError::Pipeline {
            details: "built without the camera feature; no recognition pipeline available"
                .to_string(),
        })
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    fn stop_running(&self) {
        if let Some(mut running) = self.running.lock().take() {
            running.running.store(false, Ordering::Relaxed);
            if let Some(thread) = running.bus_thread.take() {
                let _ = thread.join();
            }
            let _ = running.pipeline.set_state(gstreamer::State::Null);
            info!("GStreamer pipeline stopped");
        }
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    fn stop_running(&self) {
        self.running.lock().take();
    }
}

impl Drop for V4l2Input {
    fn drop(&mut self) {
        debug!("Released capture input {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn backend_with_nodes(nodes: &[&str]) -> (TempDir, V4l2Backend) {
        let dir = TempDir::new().unwrap();
        for node in nodes {
            fs::write(dir.path().join(node), b"").unwrap();
        }
        let config = CameraConfig {
            backend: "v4l2".to_string(),
            device_dir: dir.path().display().to_string(),
            back_index: 0,
            front_index: 1,
            resolution: (640, 480),
            back_torch_led: String::new(),
            front_torch_led: String::new(),
            preferences_path: String::new(),
        };
        (dir, V4l2Backend::new(config))
    }

    #[test]
    fn test_device_discovery_by_position() {
        let (_dir, backend) = backend_with_nodes(&["video0"]);

        assert!(backend.is_capture_available());
        let back = backend.device(CameraPosition::Back).unwrap();
        assert_eq!(back.position(), CameraPosition::Back);
        assert!(back.id().ends_with("video0"));
        assert!(backend.device(CameraPosition::Front).is_none());
    }

    #[test]
    fn test_no_nodes_means_no_capture() {
        let (_dir, backend) = backend_with_nodes(&[]);
        assert!(!backend.is_capture_available());
    }

    #[test]
    fn test_open_input_claims_node() {
        let (_dir, backend) = backend_with_nodes(&["video0", "video1"]);
        let front = backend.device(CameraPosition::Front).unwrap();

        let input = backend.open_input(front).unwrap();
        assert_eq!(input.device().position(), CameraPosition::Front);
    }

    #[test]
    fn test_open_input_failure_is_acquisition_error() {
        let (dir, backend) = backend_with_nodes(&["video0"]);
        let back = backend.device(CameraPosition::Back).unwrap();
        fs::remove_file(dir.path().join("video0")).unwrap();

        match backend.open_input(back) {
            Err(CaptureError::InputAcquisitionFailed { .. }) => {}
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Expected claim to fail"),
        }
    }

    #[test]
    fn test_torch_led_wiring() {
        let (dir, mut backend) = backend_with_nodes(&["video0"]);
        let led = dir.path().join("white:flash");
        fs::create_dir(&led).unwrap();
        fs::write(led.join("max_brightness"), "10").unwrap();
        fs::write(led.join("brightness"), "0").unwrap();
        backend.config.back_torch_led = led.display().to_string();

        let back = backend.device(CameraPosition::Back).unwrap();
        assert!(back.has_torch());
        assert!(back.is_torch_available());
        back.set_torch_mode(TorchMode::On).unwrap();
        assert_eq!(back.torch_mode(), TorchMode::On);
    }

    #[test]
    fn test_native_symbols_are_zbar_capabilities() {
        let (_dir, backend) = backend_with_nodes(&[]);
        let native = backend.native_symbols();
        assert!(native.contains(&SymbolType::Qr));
        assert!(!native.contains(&SymbolType::Aztec));
    }
}
