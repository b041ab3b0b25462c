//! Screen cover (face-down) classification.
//!
//! The screen counts as covered when gravity points out of the display side,
//! i.e. the z component is strongly negative relative to the vector length.
//! A hysteresis band around the threshold keeps the flag from chattering
//! while the device is tilted near the boundary.

use serde::{Deserialize, Serialize};

use crate::types::AccelSample;

/// Parameters for cover detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Fraction of the vector length z must reach (negatively) to count as
    /// face down. 0.707 is 1/sqrt(2), i.e. tilted past half-way.
    pub ratio: f64,

    /// Relative width of the band around the threshold where the previous
    /// decision is kept.
    pub hysteresis: f64,

    /// Vectors shorter than this (milli-g) are ignored.
    pub degenerate_magnitude: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            ratio: 0.707,
            hysteresis: 0.1,
            degenerate_magnitude: 100.0,
        }
    }
}

/// Face-down classifier.
#[derive(Debug, Clone)]
pub struct CoverageClassifier {
    config: CoverageConfig,
    covered: Option<bool>,
}

impl CoverageClassifier {
    pub fn new(config: CoverageConfig) -> Self {
        Self {
            config,
            covered: None,
        }
    }

    /// Classify one sample. Returns the new flag only when it changed.
    pub fn process(&mut self, sample: &AccelSample) -> Option<bool> {
        let magnitude = sample.magnitude();
        if magnitude < self.config.degenerate_magnitude {
            return None;
        }

        let limit = magnitude * self.config.ratio;
        let z = sample.z as f64;

        let covered = if z < -limit * (1.0 + self.config.hysteresis) {
            true
        } else if z > -limit * (1.0 - self.config.hysteresis) {
            false
        } else {
            self.covered.unwrap_or(false)
        };

        if self.covered == Some(covered) {
            return None;
        }

        tracing::debug!(covered, z = sample.z, "cover state changed");
        self.covered = Some(covered);
        Some(covered)
    }

    /// Current flag, `None` before the first usable sample.
    pub fn is_covered(&self) -> Option<bool> {
        self.covered
    }

    pub fn reset(&mut self) {
        self.covered = None;
    }
}

impl Default for CoverageClassifier {
    fn default() -> Self {
        Self::new(CoverageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_up_on_table() {
        let mut classifier = CoverageClassifier::default();
        assert_eq!(classifier.process(&AccelSample::new(0, -36, -90, 953)), Some(false));
    }

    #[test]
    fn test_face_down_on_table() {
        let mut classifier = CoverageClassifier::default();
        classifier.process(&AccelSample::new(0, -36, -90, 953));
        assert_eq!(classifier.process(&AccelSample::new(1000, 270, 216, -972)), Some(true));
        assert_eq!(classifier.is_covered(), Some(true));
    }

    #[test]
    fn test_upright_is_not_covered() {
        let mut classifier = CoverageClassifier::default();
        assert_eq!(classifier.process(&AccelSample::new(0, 60, 960, 18)), Some(false));
        // Slightly leaning back does not change anything
        assert_eq!(classifier.process(&AccelSample::new(1000, 72, -990, -162)), None);
    }

    #[test]
    fn test_hysteresis_band_keeps_previous() {
        let mut classifier = CoverageClassifier::default();
        classifier.process(&AccelSample::new(0, 0, 0, -1000));
        assert_eq!(classifier.is_covered(), Some(true));

        // z / |v| = -0.707: inside the band, stays covered
        assert_eq!(classifier.process(&AccelSample::new(1000, 707, 0, -707)), None);
        assert_eq!(classifier.is_covered(), Some(true));

        // z / |v| = -0.5: clearly out of the band
        assert_eq!(classifier.process(&AccelSample::new(2000, 866, 0, -500)), Some(false));
    }

    #[test]
    fn test_band_without_history_reports_uncovered() {
        let mut classifier = CoverageClassifier::default();
        assert_eq!(classifier.process(&AccelSample::new(0, 707, 0, -707)), Some(false));
    }

    #[test]
    fn test_degenerate_sample_ignored() {
        let mut classifier = CoverageClassifier::default();
        classifier.process(&AccelSample::new(0, 270, 216, -972));
        assert_eq!(classifier.process(&AccelSample::new(1000, 0, 0, 0)), None);
        assert_eq!(classifier.is_covered(), Some(true));
    }

    #[test]
    fn test_same_sample_twice() {
        let mut classifier = CoverageClassifier::default();
        let sample = AccelSample::new(0, 270, 216, -972);
        assert_eq!(classifier.process(&sample), Some(true));
        assert_eq!(classifier.process(&sample), None);
    }
}
