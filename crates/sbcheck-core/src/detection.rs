//! Detections ("found" records) and the artifacts derived from them.
//!
//! A detection ties one designation to one exposure. Derived files
//! (cutouts, stacks) are tracked by path; when a detection goes away those
//! paths are written to the staleness log instead of being removed inline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::ephemeris::PreciseEphemeris;

// ─── Detections ──────────────────────────────────────────────────────────────

/// Input to [`CatalogStore::write_detection`](crate::store::CatalogStore::write_detection).
///
/// Unique on (`designation`, `pid`); a second write replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDetection {
  pub designation: String,
  pub pid:         i64,
  pub obs_jd:      f64,
  pub ephemeris:   PreciseEphemeris,
  /// 0-based pixel position within the exposure.
  pub x:           i64,
  pub y:           i64,
  pub retrieved:   DateTime<Utc>,
}

impl NewDetection {
  pub fn new(
    designation: impl Into<String>,
    pid: i64,
    obs_jd: f64,
    ephemeris: PreciseEphemeris,
    (x, y): (i64, i64),
  ) -> Self {
    Self {
      designation: designation.into(),
      pid,
      obs_jd,
      ephemeris,
      x,
      y,
      retrieved: Utc::now(),
    }
  }
}

/// Which derived image products have been fetched for a detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactState {
  /// Cutout file, relative to the cutout root.
  pub archive_file:  Option<String>,
  pub sci_sync_date: Option<DateTime<Utc>>,
  pub sciimg:        bool,
  pub mskimg:        bool,
  pub scipsf:        bool,
  pub diffimg:       bool,
  pub diffpsf:       bool,
}

/// A persisted detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub found_id:  i64,
  pub record:    NewDetection,
  pub artifacts: ArtifactState,
}

// ─── Downstream products ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
  pub found_id:   i64,
  /// Stacked image, relative to the stack root.
  pub stack_file: Option<String>,
  pub stacked:    bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
  pub found_id:   i64,
  pub vangle_img: bool,
  pub sangle_img: bool,
}

// ─── Staleness log ───────────────────────────────────────────────────────────

/// The root directory a stale file is relative to.
///
/// Encoded as the configuration key naming that root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ArtifactRoot {
  #[strum(serialize = "cutout path")]
  Cutout,
  #[strum(serialize = "stack path")]
  Stack,
}

/// One entry in the append-only staleness log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleFile {
  pub root: ArtifactRoot,
  pub file: String,
}
