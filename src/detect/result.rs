use crate::error::MalformedDetection;
use crate::labels::Localizer;

/// A record exactly as a detection backend emits it, before validation.
///
/// Coordinates are frame pixels (`xmin`/`ymin` top-left, `xmax`/`ymax` bottom-right).
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Candidate {
    pub fn new(name: impl Into<String>, confidence: f32, xyxy: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            confidence,
            xmin: xyxy[0],
            ymin: xyxy[1],
            xmax: xyxy[2],
            ymax: xyxy[3],
        }
    }
}

/// Axis-aligned box in integer pixel coordinates. Always `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, MalformedDetection> {
        if x1 >= x2 || y1 >= y2 {
            return Err(MalformedDetection::EmptyBox { x1, y1, x2, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Truncates toward zero, matching how detection frameworks report integer boxes.
    pub fn from_f32(xyxy: [f32; 4]) -> Result<Self, MalformedDetection> {
        if xyxy.iter().any(|v| !v.is_finite()) {
            return Err(MalformedDetection::NonFiniteCoordinate);
        }
        Self::new(
            xyxy[0] as i32,
            xyxy[1] as i32,
            xyxy[2] as i32,
            xyxy[3] as i32,
        )
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// A validated detection in the model's own vocabulary.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    class_name: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(
        class_name: impl Into<String>,
        confidence: f32,
        bbox: BoundingBox,
    ) -> Result<Self, MalformedDetection> {
        let class_name = class_name.into();
        if class_name.trim().is_empty() {
            return Err(MalformedDetection::EmptyName);
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(MalformedDetection::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            class_name,
            confidence,
            bbox,
        })
    }

    pub fn from_candidate(candidate: Candidate) -> Result<Self, MalformedDetection> {
        let bbox = BoundingBox::from_f32([
            candidate.xmin,
            candidate.ymin,
            candidate.xmax,
            candidate.ymax,
        ])?;
        Self::new(candidate.name, candidate.confidence, bbox)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Attach the display name for this detection's class.
    pub fn localize(self, localizer: &Localizer) -> Detection {
        let localized_name = localizer.localize(&self.class_name).to_string();
        Detection {
            class_name: self.class_name,
            localized_name,
            confidence: self.confidence,
            bbox: self.bbox,
        }
    }
}

/// An accepted, localized detection. Lives for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    class_name: String,
    localized_name: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn localized_name(&self) -> &str {
        &self.localized_name
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Text drawn next to the box: `"<localized_name> <confidence:.2>"`.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.localized_name, self.confidence)
    }
}
