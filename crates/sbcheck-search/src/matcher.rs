//! Coarse-to-fine search of exposures for known objects.
//!
//! For every distinct exposure epoch in a date range, each object's
//! interpolated position is checked against the centre of that epoch's
//! field, then against the nearest exposure, and finally projected through
//! that exposure's WCS using a precise ephemeris. Accepted matches are
//! written as detections once per epoch, so an interrupted run keeps every
//! epoch that finished.

use std::{collections::HashMap, fmt};

use chrono::{NaiveDate, TimeDelta};
use tracing::{debug, info, warn};

use sbcheck_core::{
  designation::sort_key,
  detection::NewDetection,
  exposure::Exposure,
  geometry::{angular_separation, spherical_mean},
  provider::EphemerisProvider,
  store::CatalogStore,
  time::jd_from_date,
};

use crate::{Error, Interpolator, Result, SearchConfig, Track, error::store_err};

/// Slack (days) added around the UT dates when choosing candidate objects.
const CANDIDATE_SLACK: f64 = 0.01;

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What happened to one object at one epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
  /// No reliable position at this epoch.
  Masked,
  /// Too far from the field centre.
  CoarseReject,
  /// Too far from every exposure centre.
  FineReject,
  /// Near an exposure but off its detector, or the precise ephemeris was
  /// unavailable.
  FootprintReject,
  Accepted(NewDetection),
}

/// Per-object detection counts for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSummary {
  pub epochs:  usize,
  pub objects: usize,
  /// In natural designation order.
  pub found:   Vec<(String, u64)>,
}

impl SearchSummary {
  pub fn total(&self) -> u64 { self.found.iter().map(|(_, n)| n).sum() }
}

impl fmt::Display for SearchSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Found {} objects.", self.found.len())?;
    for (desg, n) in &self.found {
      write!(f, "\n  {desg:15} x{n}")?;
    }
    Ok(())
  }
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

pub struct FovMatcher<'a, S, P> {
  store:    &'a S,
  provider: &'a P,
  config:   SearchConfig,
}

impl<'a, S, P> FovMatcher<'a, S, P>
where
  S: CatalogStore,
  P: EphemerisProvider,
{
  pub fn new(store: &'a S, provider: &'a P, config: SearchConfig) -> Self {
    Self { store, provider, config }
  }

  /// Search the nights dated `start ..= end` for `designations`, or for
  /// every object with ephemerides covering those nights.
  ///
  /// A night's date labels the UT morning on which it ends, so the night
  /// after `end` is included too. Fails with [`Error::EmptyRange`] if no
  /// exposures exist for the range.
  pub async fn search(
    &self,
    start: NaiveDate,
    end: NaiveDate,
    designations: Option<Vec<String>>,
  ) -> Result<SearchSummary> {
    info!("FOV search: {start} to {end}");
    let last_night = end + TimeDelta::days(1);

    let epochs = self
      .store
      .epochs_for_nights(start, last_night)
      .await
      .map_err(store_err)?;
    let (Some(&first), Some(&last)) = (epochs.first(), epochs.last()) else {
      return Err(Error::EmptyRange { start, end });
    };

    let designations = match designations {
      Some(d) => d,
      None => self
        .store
        .designations_between(
          jd_from_date(start) - CANDIDATE_SLACK,
          jd_from_date(last_night) + 1.0 + CANDIDATE_SLACK,
        )
        .await
        .map_err(store_err)?,
    };
    info!("Searching {} epochs for {} objects.", epochs.len(), designations.len());

    let tracks = Interpolator::new(self.store)
      .tracks(&designations, &epochs)
      .await?;

    let mut by_epoch: HashMap<u64, Vec<Exposure>> = HashMap::new();
    for e in self
      .store
      .exposures_between(first, last)
      .await
      .map_err(store_err)?
    {
      by_epoch.entry(e.obs_jd.to_bits()).or_default().push(e);
    }

    let mut counts: HashMap<String, u64> = HashMap::new();
    for (i, &jd) in epochs.iter().enumerate() {
      let Some(exposures) = by_epoch.get(&jd.to_bits()) else {
        continue;
      };
      let found = self.scan_epoch(i, exposures, &tracks).await?;
      if found.is_empty() {
        continue;
      }

      debug!("JD {jd}: {} detections", found.len());
      for d in &found {
        *counts.entry(d.designation.clone()).or_default() += 1;
      }
      self.store.write_detections(found).await.map_err(store_err)?;
    }

    let mut found: Vec<_> = counts.into_iter().collect();
    found.sort_by(|a, b| sort_key(&a.0).cmp(&sort_key(&b.0)));
    let summary = SearchSummary { epochs: epochs.len(), objects: designations.len(), found };
    info!("{summary}");
    Ok(summary)
  }

  /// Check every track at epoch index `i` against the exposures sharing
  /// that epoch.
  async fn scan_epoch(
    &self,
    i: usize,
    exposures: &[Exposure],
    tracks: &[Track],
  ) -> Result<Vec<NewDetection>> {
    let ra: Vec<f64> = exposures.iter().map(|e| e.ra.to_radians()).collect();
    let dec: Vec<f64> = exposures.iter().map(|e| e.dec.to_radians()).collect();
    let Some(field) = spherical_mean(&ra, &dec) else {
      return Ok(Vec::new());
    };

    let mut found = Vec::new();
    for track in tracks {
      if let Verdict::Accepted(d) = self
        .consider(&track.designation, track.at(i), field, exposures)
        .await?
      {
        info!("  Found {}", d.designation);
        found.push(d);
      }
    }
    Ok(found)
  }

  /// Run one object through the coarse, fine and footprint tests.
  ///
  /// `position` and `field` are (RA, Dec) in radians.
  pub async fn consider(
    &self,
    designation: &str,
    position: Option<(f64, f64)>,
    field: (f64, f64),
    exposures: &[Exposure],
  ) -> Result<Verdict> {
    let Some((ra, dec)) = position else {
      return Ok(Verdict::Masked);
    };

    if angular_separation(ra, dec, field.0, field.1) > self.config.coarse_radius {
      return Ok(Verdict::CoarseReject);
    }

    let nearest = exposures
      .iter()
      .map(|e| (e, angular_separation(ra, dec, e.ra.to_radians(), e.dec.to_radians())))
      .min_by(|a, b| a.1.total_cmp(&b.1));
    let Some((exposure, distance)) = nearest else {
      return Ok(Verdict::FineReject);
    };
    if distance > self.config.fine_radius {
      return Ok(Verdict::FineReject);
    }

    Ok(match self.footprint_test(designation, exposure).await? {
      Some(d) => Verdict::Accepted(d),
      None => Verdict::FootprintReject,
    })
  }

  /// Project a precise ephemeris through the exposure's WCS and keep it if
  /// it lands on the detector.
  ///
  /// A provider failure rejects the pair; it is logged and not retried.
  pub async fn footprint_test(
    &self,
    designation: &str,
    exposure: &Exposure,
  ) -> Result<Option<NewDetection>> {
    let eph = match self.provider.ephemeris_at(designation, exposure.obs_jd).await {
      Ok(eph) => eph,
      Err(e) => {
        warn!("Error retrieving ephemeris for {designation} on JD {}: {e}", exposure.obs_jd);
        return Ok(None);
      }
    };

    let Some((x, y)) = exposure.wcs.world_to_pixel(eph.ra, eph.dec)? else {
      return Ok(None);
    };
    if !self.config.on_detector(x, y) {
      return Ok(None);
    }

    Ok(Some(NewDetection::new(
      designation,
      exposure.pid,
      exposure.obs_jd,
      eph,
      (x as i64, y as i64),
    )))
  }
}
