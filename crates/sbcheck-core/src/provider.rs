//! Capability traits for the external services a run talks to.
//!
//! The matcher and the ingestion helpers only see these traits, so they can
//! be driven by network clients in production and by deterministic fakes in
//! tests.

use std::future::Future;

use chrono::{NaiveDateTime, TimeDelta};

use crate::{
  Result,
  ephemeris::{EphemerisSample, PreciseEphemeris},
  exposure::Exposure,
};

/// Source of small-body ephemerides.
///
/// Failures are per object: callers log them and move on.
pub trait EphemerisProvider: Send + Sync {
  /// Precise ephemeris for `designation` at `jd`.
  fn ephemeris_at<'a>(
    &'a self,
    designation: &'a str,
    jd: f64,
  ) -> impl Future<Output = Result<PreciseEphemeris>> + Send + 'a;

  /// Samples for `designation` from `start` to `end` (Julian dates) every
  /// `step`.
  fn ephemeris_range<'a>(
    &'a self,
    designation: &'a str,
    start: f64,
    end: f64,
    step: TimeDelta,
  ) -> impl Future<Output = Result<Vec<EphemerisSample>>> + Send + 'a;
}

/// Source of exposure metadata. An empty result is a valid answer.
pub trait ExposureSource: Send + Sync {
  /// Exposures taken strictly between `after` and `before` (UT).
  fn exposures_between(
    &self,
    after: NaiveDateTime,
    before: NaiveDateTime,
  ) -> impl Future<Output = Result<Vec<Exposure>>> + Send + '_;
}

/// Archive of image products addressed by URL.
pub trait ImageArchive: Send + Sync {
  fn fetch<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<Vec<u8>>> + Send + 'a;
}
