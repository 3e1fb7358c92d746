//! Matcher thresholds.

use serde::{Deserialize, Serialize};

/// Instrument-specific limits used by the coarse-to-fine search.
///
/// The defaults describe one survey camera: a field roughly 6° across and
/// quadrant readouts of 3072 × 3080 pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  /// Largest distance (rad) from the field centre worth examining.
  pub coarse_radius:   f64,
  /// Largest distance (rad) from the nearest exposure centre.
  pub fine_radius:     f64,
  /// Detector size in pixels; pixel bounds are `0 ..= size`.
  pub detector_width:  f64,
  pub detector_height: f64,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      coarse_radius:   0.1,
      fine_radius:     0.026,
      detector_width:  3072.0,
      detector_height: 3080.0,
    }
  }
}

impl SearchConfig {
  /// Whether a 0-based pixel position lies on the detector.
  pub fn on_detector(&self, x: f64, y: f64) -> bool {
    (0.0..=self.detector_width).contains(&x) && (0.0..=self.detector_height).contains(&y)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bounds_are_inclusive() {
    let c = SearchConfig::default();
    assert!(c.on_detector(0.0, 0.0));
    assert!(c.on_detector(3072.0, 3080.0));
    assert!(!c.on_detector(-0.1, 10.0));
    assert!(!c.on_detector(10.0, 3080.5));
  }
}
