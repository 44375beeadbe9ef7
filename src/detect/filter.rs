use anyhow::{anyhow, Result};

use super::result::RawDetection;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Accept/reject boundary for detections. The comparison is strict:
/// a detection is accepted only when `confidence > threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceThreshold(f32);

impl ConfidenceThreshold {
    pub fn new(value: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1], got {}",
                value
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    pub fn accepts(&self, confidence: f32) -> bool {
        confidence > self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Keep the detections above `threshold`, in input order.
pub fn filter<I>(detections: I, threshold: ConfidenceThreshold) -> Vec<RawDetection>
where
    I: IntoIterator<Item = RawDetection>,
{
    detections
        .into_iter()
        .filter(|detection| threshold.accepts(detection.confidence()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn det(name: &str, confidence: f32) -> RawDetection {
        RawDetection::new(name, confidence, BoundingBox::new(0, 0, 10, 10).unwrap()).unwrap()
    }

    #[test]
    fn keeps_only_detections_above_threshold_in_order() {
        let input = vec![
            det("a", 0.9),
            det("b", 0.2),
            det("c", 0.41),
            det("d", 0.4),
            det("e", 0.75),
        ];
        let kept = filter(input, ConfidenceThreshold::default());
        let names: Vec<&str> = kept.iter().map(|d| d.class_name()).collect();
        assert_eq!(names, vec!["a", "c", "e"]);
    }

    #[test]
    fn boundary_is_exclusive() -> Result<()> {
        let threshold = ConfidenceThreshold::new(0.5)?;
        assert!(!threshold.accepts(0.5));
        assert!(threshold.accepts(0.500_001));
        assert!(filter(vec![det("x", 0.5)], threshold).is_empty());
        Ok(())
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(filter(Vec::new(), ConfidenceThreshold::default()).is_empty());
    }

    #[test]
    fn filter_matches_set_definition_for_many_thresholds() -> Result<()> {
        let input: Vec<RawDetection> = (0..=20).map(|i| det("x", i as f32 / 20.0)).collect();
        for step in 0..=10 {
            let threshold = ConfidenceThreshold::new(step as f32 / 10.0)?;
            let kept = filter(input.clone(), threshold);
            let expected: Vec<RawDetection> = input
                .iter()
                .filter(|d| d.confidence() > threshold.value())
                .cloned()
                .collect();
            assert_eq!(kept, expected);
            assert!(kept.len() <= input.len());
        }
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        assert!(ConfidenceThreshold::new(-0.1).is_err());
        assert!(ConfidenceThreshold::new(1.1).is_err());
        assert!(ConfidenceThreshold::new(f32::NAN).is_err());
    }
}
