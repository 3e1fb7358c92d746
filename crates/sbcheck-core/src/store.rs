//! The `CatalogStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `sbcheck-store-sqlite`).
//! The search engine and CLI depend on this abstraction, not on any concrete
//! backend.
//!
//! Cascades are the store's job: removing a night removes its exposures,
//! removing an exposure removes its detections, and removing a detection
//! logs its files as stale and removes its stacks and projections, all in
//! the same atomic unit as the parent deletion.

use std::{fmt, future::Future};

use chrono::NaiveDate;

use crate::{
  detection::{ArtifactState, Detection, NewDetection, Projection, Stack, StaleFile},
  ephemeris::{EphemerisSample, ObjectCoverage},
  exposure::{Exposure, Night},
};

// ─── Range type ──────────────────────────────────────────────────────────────

/// An inclusive Julian date range with optional ends.
///
/// The four combinations select the four deletion modes: both bounds, only
/// a start, only an end, or the full history.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JdRange {
  pub start: Option<f64>,
  pub end:   Option<f64>,
}

impl JdRange {
  pub fn between(start: f64, end: f64) -> Self { Self { start: Some(start), end: Some(end) } }

  pub fn from(start: f64) -> Self { Self { start: Some(start), end: None } }

  pub fn until(end: f64) -> Self { Self { start: None, end: Some(end) } }

  pub fn all() -> Self { Self::default() }

  pub fn contains(&self, jd: f64) -> bool {
    self.start.is_none_or(|s| jd >= s) && self.end.is_none_or(|e| jd <= e)
  }
}

impl fmt::Display for JdRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.start, self.end) {
      (Some(s), Some(e)) => write!(f, "between JD {s} and {e}"),
      (Some(s), None) => write!(f, "all dates starting JD {s}"),
      (None, Some(e)) => write!(f, "all dates up to JD {e}"),
      (None, None) => f.write_str("all dates"),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a catalog store backend.
///
/// All methods return `Send` futures so the store can be driven from a
/// multi-threaded runtime, although a search run issues calls one at a time.
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Nights and exposures ──────────────────────────────────────────────

  /// Create or update the night for `date` and insert its exposures.
  ///
  /// Exposures whose `pid` is already present are left untouched.
  fn upsert_night(
    &self,
    date: NaiveDate,
    exposures: Vec<Exposure>,
  ) -> impl Future<Output = Result<Night, Self::Error>> + Send + '_;

  fn night(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<Night>, Self::Error>> + Send + '_;

  /// All nights, ordered by date.
  fn nights(&self) -> impl Future<Output = Result<Vec<Night>, Self::Error>> + Send + '_;

  /// Delete a night and everything that depends on it. Returns `false` if
  /// there was no such night.
  fn delete_night(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Distinct exposure epochs for nights dated `start ..= end`, ascending.
  fn epochs_for_nights(
    &self,
    start: NaiveDate,
    end: NaiveDate,
  ) -> impl Future<Output = Result<Vec<f64>, Self::Error>> + Send + '_;

  /// Exposures with `jd_start <= obs_jd <= jd_end`, ordered by epoch.
  fn exposures_between(
    &self,
    jd_start: f64,
    jd_end: f64,
  ) -> impl Future<Output = Result<Vec<Exposure>, Self::Error>> + Send + '_;

  fn exposure(
    &self,
    pid: i64,
  ) -> impl Future<Output = Result<Option<Exposure>, Self::Error>> + Send + '_;

  // ── Ephemerides ───────────────────────────────────────────────────────

  /// Atomically replace the samples for `designation` within
  /// `start ..= end` by `samples`. Returns the number inserted; exact
  /// (designation, epoch) duplicates are skipped.
  fn refresh_ephemeris(
    &self,
    designation: String,
    start: f64,
    end: f64,
    samples: Vec<EphemerisSample>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Number of samples for `designation` within `start ..= end`.
  fn count_ephemeris(
    &self,
    designation: String,
    start: f64,
    end: f64,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Samples with `after < jd < before`, ordered by epoch.
  fn ephemeris_samples(
    &self,
    designation: String,
    after: f64,
    before: f64,
  ) -> impl Future<Output = Result<Vec<EphemerisSample>, Self::Error>> + Send + '_;

  /// Designations with at least one sample within `jd_start ..= jd_end`.
  fn designations_between(
    &self,
    jd_start: f64,
    jd_end: f64,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Per-designation coverage, in natural designation order.
  fn available_objects(
    &self,
  ) -> impl Future<Output = Result<Vec<ObjectCoverage>, Self::Error>> + Send + '_;

  /// Delete samples for each designation within `range`. Returns the total
  /// number of rows removed.
  fn delete_ephemeris(
    &self,
    designations: Vec<String>,
    range: JdRange,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Detections ────────────────────────────────────────────────────────

  /// Insert or replace the detection keyed by (designation, pid) and
  /// return its id.
  fn write_detection(
    &self,
    detection: NewDetection,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// [`write_detection`](Self::write_detection) for a batch, committed as
  /// one unit.
  fn write_detections(
    &self,
    detections: Vec<NewDetection>,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  fn detection(
    &self,
    designation: String,
    pid: i64,
  ) -> impl Future<Output = Result<Option<Detection>, Self::Error>> + Send + '_;

  /// Detections, optionally for one designation, ordered by designation
  /// then epoch.
  fn detections(
    &self,
    designation: Option<String>,
  ) -> impl Future<Output = Result<Vec<Detection>, Self::Error>> + Send + '_;

  /// Delete detections of each designation whose exposure epoch lies in
  /// `range`. Returns the total number removed.
  fn delete_detections(
    &self,
    designations: Vec<String>,
    range: JdRange,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Record which derived products exist for a detection.
  fn set_artifacts(
    &self,
    found_id: i64,
    artifacts: ArtifactState,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Downstream products ───────────────────────────────────────────────

  fn record_stack(&self, stack: Stack) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn stack(
    &self,
    found_id: i64,
  ) -> impl Future<Output = Result<Option<Stack>, Self::Error>> + Send + '_;

  fn record_projection(
    &self,
    projection: Projection,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn projection(
    &self,
    found_id: i64,
  ) -> impl Future<Output = Result<Option<Projection>, Self::Error>> + Send + '_;

  // ── Staleness log ─────────────────────────────────────────────────────

  fn stale_files(&self) -> impl Future<Output = Result<Vec<StaleFile>, Self::Error>> + Send + '_;

  /// Truncate the staleness log once its files have been dealt with.
  /// Returns the number of entries removed.
  fn clear_stale_files(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_modes() {
    assert!(JdRange::between(1.0, 2.0).contains(1.0));
    assert!(JdRange::between(1.0, 2.0).contains(2.0));
    assert!(!JdRange::between(1.0, 2.0).contains(2.5));
    assert!(JdRange::from(1.0).contains(1e9));
    assert!(!JdRange::from(1.0).contains(0.5));
    assert!(JdRange::until(1.0).contains(-5.0));
    assert!(JdRange::all().contains(0.0));
  }

  #[test]
  fn range_describes_itself() {
    assert_eq!(JdRange::all().to_string(), "all dates");
    assert_eq!(JdRange::until(2.5).to_string(), "all dates up to JD 2.5");
  }
}
