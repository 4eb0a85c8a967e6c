use super::device::CaptureDevice;
use crate::detection::{DetectionDelegate, RawDetection};
use crate::geometry::{Orientation, Rect, RegionOfInterest};
use crate::symbology::SymbolType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resolution preset requested from the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    #[default]
    High,
    /// Full still-photo resolution, best for small printed codes
    Photo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoGravity {
    Resize,
    ResizeAspect,
    #[default]
    ResizeAspectFill,
}

/// A claimed device feeding the session. Dropping it releases the hardware.
pub trait CaptureInput: Send + Sync {
    fn device(&self) -> &Arc<dyn CaptureDevice>;
}

/// Recognition stage of the session and its callback registration
#[derive(Debug, Clone)]
pub struct RecognitionOutput {
    accepted: Vec<SymbolType>,
    region: RegionOfInterest,
    orientation: Orientation,
    delegate: Option<DetectionDelegate>,
}

impl RecognitionOutput {
    pub fn new(accepted: Vec<SymbolType>, region: RegionOfInterest, orientation: Orientation) -> Self {
        Self {
            accepted,
            region,
            orientation,
            delegate: None,
        }
    }

    pub fn accepted_symbols(&self) -> &[SymbolType] {
        &self.accepted
    }

    pub fn accepts(&self, symbol: SymbolType) -> bool {
        self.accepted.contains(&symbol)
    }

    pub fn region_of_interest(&self) -> RegionOfInterest {
        self.region
    }

    pub fn set_region_of_interest(&mut self, region: RegionOfInterest) {
        self.region = region;
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn delegate(&self) -> Option<&DetectionDelegate> {
        self.delegate.as_ref()
    }

    pub fn set_delegate(&mut self, delegate: Option<DetectionDelegate>) {
        self.delegate = delegate;
    }

    /// Forward one frame's detections to the registered delegate, keeping only
    /// accepted symbol types
    pub fn deliver(&self, detections: Vec<RawDetection>) -> bool {
        match &self.delegate {
            Some(delegate) => delegate.deliver(
                detections
                    .into_iter()
                    .filter(|d| self.accepts(d.symbol))
                    .collect(),
            ),
            None => false,
        }
    }
}

/// Live preview layer description handed to the host view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewSurface {
    pub frame: Rect,
    pub orientation: Orientation,
    pub gravity: VideoGravity,
}

impl PreviewSurface {
    pub fn new(frame: Rect, orientation: Orientation) -> Self {
        Self {
            frame,
            orientation,
            gravity: VideoGravity::ResizeAspectFill,
        }
    }
}

/// Capture pipeline wiring: at most one input, one recognition output and one
/// preview surface. Attaching always replaces what was there.
#[derive(Default)]
pub struct CaptureSession {
    generation: u64,
    preset: SessionPreset,
    input: Option<Box<dyn CaptureInput>>,
    output: Option<RecognitionOutput>,
    preview: Option<PreviewSurface>,
    running: bool,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    pub fn input(&self) -> Option<&dyn CaptureInput> {
        self.input.as_deref()
    }

    pub fn input_count(&self) -> usize {
        usize::from(self.input.is_some())
    }

    /// Attach `input`, releasing any previously attached one first
    pub fn attach_input(&mut self, input: Box<dyn CaptureInput>) {
        self.input = None;
        self.input = Some(input);
    }

    pub fn detach_input(&mut self) {
        self.input = None;
    }

    pub fn output(&self) -> Option<&RecognitionOutput> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut RecognitionOutput> {
        self.output.as_mut()
    }

    pub fn output_count(&self) -> usize {
        usize::from(self.output.is_some())
    }

    /// Attach `output`, dropping the previous output and its registration
    pub fn attach_output(&mut self, output: RecognitionOutput) {
        self.output = None;
        self.output = Some(output);
    }

    pub fn detach_output(&mut self) {
        self.output = None;
    }

    pub fn preview(&self) -> Option<&PreviewSurface> {
        self.preview.as_ref()
    }

    pub fn preview_mut(&mut self) -> Option<&mut PreviewSurface> {
        self.preview.as_mut()
    }

    pub fn attach_preview(&mut self, preview: PreviewSurface) {
        self.preview = Some(preview);
    }

    pub fn detach_preview(&mut self) {
        self.preview = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_output_filters_unaccepted_symbols() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = RecognitionOutput::new(
            vec![SymbolType::Qr],
            RegionOfInterest::full_frame(),
            Orientation::Portrait,
        );
        assert!(!output.deliver(vec![RawDetection::new(SymbolType::Qr, "a")]));

        output.set_delegate(Some(DetectionDelegate::new(3, tx)));
        assert!(output.deliver(vec![
            RawDetection::new(SymbolType::Ean13, "4006381333931"),
            RawDetection::new(SymbolType::Qr, "b"),
        ]));

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.detections, vec![RawDetection::new(SymbolType::Qr, "b")]);
    }

    #[test]
    fn test_attach_output_replaces_previous() {
        let mut session = CaptureSession::new();
        session.attach_output(RecognitionOutput::new(
            vec![],
            RegionOfInterest::full_frame(),
            Orientation::Portrait,
        ));
        session.attach_output(RecognitionOutput::new(
            SymbolType::ALL.to_vec(),
            RegionOfInterest::full_frame(),
            Orientation::LandscapeLeft,
        ));

        assert_eq!(session.output_count(), 1);
        assert_eq!(
            session.output().map(|o| o.orientation()),
            Some(Orientation::LandscapeLeft)
        );
    }
}
