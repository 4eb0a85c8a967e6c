use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle. Used both for view-space bounds (points) and for
/// normalized frame coordinates (0-1 per axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole normalized frame
    pub const fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Whether every edge lies within the unit square
    pub fn is_normalized(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.max_x() <= 1.0 && self.max_y() <= 1.0
    }

    /// Express `self` relative to `container`, clamped to the unit square
    pub fn normalized_within(&self, container: &Rect) -> Rect {
        if container.is_empty() {
            return Rect::unit();
        }

        let x0 = ((self.x - container.x) / container.width).clamp(0.0, 1.0);
        let y0 = ((self.y - container.y) / container.height).clamp(0.0, 1.0);
        let x1 = ((self.max_x() - container.x) / container.width).clamp(0.0, 1.0);
        let y1 = ((self.max_y() - container.y) / container.height).clamp(0.0, 1.0);

        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

impl Default for Rect {
    fn default() -> Self {
        Rect::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Device/interface orientation as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl Orientation {
    pub fn is_landscape(&self) -> bool {
        matches!(self, Orientation::LandscapeLeft | Orientation::LandscapeRight)
    }
}

/// Normalized area of the frame in which recognition is attempted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest(Rect);

impl RegionOfInterest {
    pub fn full_frame() -> Self {
        Self(Rect::unit())
    }

    pub fn rect(&self) -> Rect {
        self.0
    }

    pub fn is_full_frame(&self) -> bool {
        self.0 == Rect::unit()
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::full_frame()
    }
}

/// How the region of interest is derived from the scan guide.
///
/// Phone layouts tend to miss codes along the short screen axis, which is what
/// `Fixed` exists for; no particular rectangle is assumed correct, so the
/// default is the unrestricted frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InterestPolicy {
    #[default]
    Unrestricted,
    GuideBounds,
    Fixed { portrait: Rect, landscape: Rect },
}

impl InterestPolicy {
    pub fn compute(
        &self,
        guide_bounds: Option<Rect>,
        capture_bounds: Rect,
        orientation: Orientation,
    ) -> RegionOfInterest {
        let rect = match self {
            InterestPolicy::Unrestricted => Rect::unit(),
            InterestPolicy::GuideBounds => match guide_bounds {
                Some(guide) if !guide.is_empty() => guide.normalized_within(&capture_bounds),
                _ => Rect::unit(),
            },
            InterestPolicy::Fixed {
                portrait,
                landscape,
            } => {
                if orientation.is_landscape() {
                    *landscape
                } else {
                    *portrait
                }
            }
        };

        if rect.is_empty() {
            RegionOfInterest::full_frame()
        } else {
            RegionOfInterest(rect)
        }
    }

    /// Check that fixed rectangles are non-empty and inside the unit square
    pub fn validate(&self) -> Result<(), String> {
        if let InterestPolicy::Fixed {
            portrait,
            landscape,
        } = self
        {
            for (name, rect) in [("portrait", portrait), ("landscape", landscape)] {
                if rect.is_empty() || !rect.is_normalized() {
                    return Err(format!(
                        "Fixed {} interest rectangle must be non-empty and normalized",
                        name
                    ));
                }
            }
        }
        Ok(())
    }
}
