//! An [`EphemerisProvider`] answered from the samples already in a store.

use chrono::{TimeDelta, Utc};

use sbcheck_core::{
  Error as CoreError, Result as CoreResult,
  ephemeris::{EphemerisSample, PreciseEphemeris},
  provider::EphemerisProvider,
  store::CatalogStore,
};

use crate::interp::{Bracket, MAX_BRACKET_GAP};

/// Offline provider: interpolates stored samples at the requested epoch.
///
/// Rates and magnitude are taken from the nearer bracketing sample.
/// Distances and angles are unknown and left empty.
pub struct StoredEphemeris<S> {
  store: S,
}

impl<S: CatalogStore> StoredEphemeris<S> {
  pub fn new(store: S) -> Self { Self { store } }

  async fn samples_around(
    &self,
    designation: &str,
    start: f64,
    end: f64,
  ) -> CoreResult<Vec<EphemerisSample>> {
    self
      .store
      .ephemeris_samples(
        designation.to_owned(),
        start - 2.0 * MAX_BRACKET_GAP,
        end + 2.0 * MAX_BRACKET_GAP,
      )
      .await
      .map_err(|e| CoreError::EphemerisService {
        designation: designation.to_owned(),
        message:     e.to_string(),
      })
  }
}

/// Bracketed position in degrees; a stored sample is returned as is.
fn degrees(bracket: &Bracket<'_>) -> (f64, f64) {
  match bracket {
    Bracket::Exact(s) => (s.ra, s.dec),
    Bracket::Between { .. } => {
      let (ra, dec) = bracket.position();
      (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }
  }
}

impl<S: CatalogStore> EphemerisProvider for StoredEphemeris<S> {
  async fn ephemeris_at<'a>(
    &'a self,
    designation: &'a str,
    jd: f64,
  ) -> CoreResult<PreciseEphemeris> {
    let samples = self.samples_around(designation, jd, jd).await?;
    let Some(bracket) = Bracket::find(&samples, jd) else {
      return Err(CoreError::EphemerisNotFound { designation: designation.to_owned() });
    };

    let (ra, dec) = degrees(&bracket);
    let nearest = bracket.nearest();
    Ok(PreciseEphemeris {
      ra,
      dec,
      dra: nearest.dra,
      ddec: nearest.ddec,
      vmag: nearest.vmag,
      ..Default::default()
    })
  }

  async fn ephemeris_range<'a>(
    &'a self,
    designation: &'a str,
    start: f64,
    end: f64,
    step: TimeDelta,
  ) -> CoreResult<Vec<EphemerisSample>> {
    if start > end {
      return Err(CoreError::InvalidRange { start, end });
    }
    let step_days = step.num_seconds() as f64 / 86_400.0;
    if step_days <= 0.0 {
      return Err(CoreError::InvalidRange { start, end });
    }

    let samples = self.samples_around(designation, start, end).await?;
    let retrieved = Utc::now();
    let mut out = Vec::new();
    let mut k = 0.0;
    loop {
      let jd = start + k * step_days;
      if jd > end {
        break;
      }
      k += 1.0;

      let Some(bracket) = Bracket::find(&samples, jd) else {
        continue;
      };
      let (ra, dec) = degrees(&bracket);
      let nearest = bracket.nearest();
      out.push(EphemerisSample {
        designation: designation.to_owned(),
        jd,
        ra,
        dec,
        dra: nearest.dra,
        ddec: nearest.ddec,
        vmag: nearest.vmag,
        retrieved,
      });
    }

    if out.is_empty() {
      return Err(CoreError::EphemerisNotFound { designation: designation.to_owned() });
    }
    Ok(out)
  }
}
