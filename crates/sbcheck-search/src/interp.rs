//! Ephemeris interpolation from sparse stored samples.
//!
//! Samples are bracketed per requested epoch and blended along the great
//! circle joining the bracket. Epochs without a bracket, or whose bracket
//! spans more than [`MAX_BRACKET_GAP`] days, are masked rather than
//! estimated.

use sbcheck_core::{ephemeris::EphemerisSample, geometry::great_circle_blend, store::CatalogStore};
use tracing::debug;

use crate::{Result, error::store_err};

/// Widest sample spacing (days) that is trusted for interpolation.
pub const MAX_BRACKET_GAP: f64 = 1.0;

/// Margin (days) around the requested epochs when fetching samples.
const FETCH_MARGIN: f64 = 1.0;

// ─── Brackets ────────────────────────────────────────────────────────────────

/// The stored samples around one epoch.
#[derive(Debug, Clone, Copy)]
pub enum Bracket<'a> {
  /// The epoch is exactly a stored sample.
  Exact(&'a EphemerisSample),
  /// `t` is the fraction of the way from `lo` to `hi`.
  Between {
    lo: &'a EphemerisSample,
    hi: &'a EphemerisSample,
    t:  f64,
  },
}

impl<'a> Bracket<'a> {
  /// Locate `jd` within `samples`, which must be sorted by epoch.
  pub fn find(samples: &'a [EphemerisSample], jd: f64) -> Option<Self> {
    let i = samples.partition_point(|s| s.jd < jd);
    if let Some(s) = samples.get(i)
      && s.jd == jd
    {
      return Some(Self::Exact(s));
    }
    if i == 0 || i == samples.len() {
      return None;
    }

    let (lo, hi) = (&samples[i - 1], &samples[i]);
    let gap = hi.jd - lo.jd;
    if gap > MAX_BRACKET_GAP {
      return None;
    }
    Some(Self::Between { lo, hi, t: (jd - lo.jd) / gap })
  }

  /// Interpolated position in radians.
  pub fn position(&self) -> (f64, f64) {
    match *self {
      Self::Exact(s) => (s.ra.to_radians(), s.dec.to_radians()),
      Self::Between { lo, hi, t } => great_circle_blend(
        lo.ra.to_radians(),
        lo.dec.to_radians(),
        hi.ra.to_radians(),
        hi.dec.to_radians(),
        t,
      ),
    }
  }

  /// The bracketing sample closest in time.
  pub fn nearest(&self) -> &'a EphemerisSample {
    match *self {
      Self::Exact(s) => s,
      Self::Between { lo, hi, t } => {
        if t <= 0.5 {
          lo
        } else {
          hi
        }
      }
    }
  }
}

/// Positions (radians) for each epoch; `None` marks a masked epoch.
pub fn interpolate(samples: &[EphemerisSample], epochs: &[f64]) -> Vec<Option<(f64, f64)>> {
  epochs
    .iter()
    .map(|&jd| Bracket::find(samples, jd).map(|b| b.position()))
    .collect()
}

// ─── Tracks ──────────────────────────────────────────────────────────────────

/// One object's interpolated positions, aligned with the requested epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
  pub designation: String,
  positions:       Vec<Option<(f64, f64)>>,
}

impl Track {
  pub fn new(designation: impl Into<String>, positions: Vec<Option<(f64, f64)>>) -> Self {
    Self { designation: designation.into(), positions }
  }

  /// Position at epoch index `i`, or `None` if masked.
  pub fn at(&self, i: usize) -> Option<(f64, f64)> { self.positions.get(i).copied().flatten() }

  /// `true` where the epoch could not be estimated.
  pub fn mask(&self) -> Vec<bool> { self.positions.iter().map(Option::is_none).collect() }

  pub fn len(&self) -> usize { self.positions.len() }

  pub fn is_empty(&self) -> bool { self.positions.is_empty() }
}

/// Builds [`Track`]s from the samples held by a store.
pub struct Interpolator<'a, S> {
  store: &'a S,
}

impl<'a, S: CatalogStore> Interpolator<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Interpolate one object at `epochs`, which must be sorted ascending.
  pub async fn track(&self, designation: &str, epochs: &[f64]) -> Result<Track> {
    let (Some(&first), Some(&last)) = (epochs.first(), epochs.last()) else {
      return Ok(Track::new(designation, Vec::new()));
    };

    let samples = self
      .store
      .ephemeris_samples(designation.to_owned(), first - FETCH_MARGIN, last + FETCH_MARGIN)
      .await
      .map_err(store_err)?;
    let positions = interpolate(&samples, epochs);

    let masked = positions.iter().filter(|p| p.is_none()).count();
    debug!("{designation}: {} samples, {masked} of {} epochs masked", samples.len(), epochs.len());
    Ok(Track::new(designation, positions))
  }

  /// [`track`](Self::track) for each designation, in the given order.
  pub async fn tracks(&self, designations: &[String], epochs: &[f64]) -> Result<Vec<Track>> {
    let mut tracks = Vec::with_capacity(designations.len());
    for desg in designations {
      tracks.push(self.track(desg, epochs).await?);
    }
    Ok(tracks)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use sbcheck_core::geometry::angular_separation;

  use super::*;

  fn sample(jd: f64, ra: f64, dec: f64) -> EphemerisSample {
    EphemerisSample {
      designation: "2P".into(),
      jd,
      ra,
      dec,
      dra: 0.0,
      ddec: 0.0,
      vmag: None,
      retrieved: Utc::now(),
    }
  }

  fn dense() -> Vec<EphemerisSample> {
    (0..8)
      .map(|i| {
        let jd = 100.0 + 0.25 * f64::from(i);
        sample(jd, 30.0 + f64::from(i), 10.0 - 0.5 * f64::from(i))
      })
      .collect()
  }

  #[test]
  fn exact_epoch_returns_the_sample() {
    let samples = dense();
    let out = interpolate(&samples, &[100.0, 100.75, 101.75]);
    for (got, jd) in out.into_iter().zip([100.0, 100.75, 101.75]) {
      let s = samples.iter().find(|s| s.jd == jd).unwrap();
      assert_eq!(got, Some((s.ra.to_radians(), s.dec.to_radians())));
    }
  }

  #[test]
  fn midpoint_lies_between_neighbours() {
    let samples = dense();
    let (ra, dec) = interpolate(&samples, &[100.125])[0].unwrap();
    let a = (30.0_f64.to_radians(), 10.0_f64.to_radians());
    let b = (31.0_f64.to_radians(), 9.5_f64.to_radians());
    let da = angular_separation(ra, dec, a.0, a.1);
    let db = angular_separation(ra, dec, b.0, b.1);
    assert!((da - db).abs() < 1e-9);
  }

  #[test]
  fn gap_over_one_day_is_masked_throughout() {
    let samples = vec![sample(100.0, 10.0, 0.0), sample(101.5, 11.0, 0.0)];
    for jd in [100.001, 100.5, 100.75, 101.0, 101.499] {
      assert_eq!(interpolate(&samples, &[jd]), [None], "jd {jd}");
    }
  }

  #[test]
  fn one_day_gap_is_allowed() {
    let samples = vec![sample(100.0, 10.0, 0.0), sample(101.0, 11.0, 0.0)];
    assert!(interpolate(&samples, &[100.9])[0].is_some());
  }

  #[test]
  fn outside_coverage_is_masked() {
    let samples = dense();
    let out = interpolate(&samples, &[99.9, 101.8]);
    assert_eq!(out, [None, None]);
    assert!(interpolate(&[], &[100.0])[0].is_none());
  }

  #[test]
  fn crosses_ra_wraparound() {
    let samples = vec![sample(100.0, 359.8, 5.0), sample(100.5, 0.2, 5.0)];
    let (ra, dec) = interpolate(&samples, &[100.25])[0].unwrap();
    let sep = angular_separation(ra, dec, 0.0, 5.0_f64.to_radians());
    assert!(sep < 1e-5, "separation {sep}");
  }

  #[test]
  fn nearest_sample_follows_fraction() {
    let samples = dense();
    let b = Bracket::find(&samples, 100.05).unwrap();
    assert_eq!(b.nearest().jd, 100.0);
    let b = Bracket::find(&samples, 100.2).unwrap();
    assert_eq!(b.nearest().jd, 100.25);
  }

  #[test]
  fn track_mask_mirrors_positions() {
    let t = Track::new("2P", vec![Some((0.0, 0.0)), None]);
    assert_eq!(t.mask(), [false, true]);
    assert_eq!(t.at(1), None);
    assert_eq!(t.at(7), None);
  }
}
