//! Ephemeris records: stored samples and precise single-epoch positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored ephemeris sample. Unique on (`designation`, `jd`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisSample {
  pub designation: String,
  pub jd:          f64,
  /// Degrees.
  pub ra:          f64,
  pub dec:         f64,
  /// RA·cos(Dec) and Dec rates, arcsec/hr.
  pub dra:         f64,
  pub ddec:        f64,
  pub vmag:        Option<f64>,
  pub retrieved:   DateTime<Utc>,
}

/// A precise ephemeris for one object at one epoch, as returned by the
/// ephemeris provider. Angles in degrees, distances in au.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreciseEphemeris {
  pub ra:          f64,
  pub dec:         f64,
  pub dra:         f64,
  pub ddec:        f64,
  /// 3σ positional uncertainties, arcsec.
  pub ra3sig:      Option<f64>,
  pub dec3sig:     Option<f64>,
  pub vmag:        Option<f64>,
  /// Heliocentric distance (au) and radial velocity (km/s).
  pub rh:          Option<f64>,
  pub rdot:        Option<f64>,
  /// Observer–target distance, au.
  pub delta:       Option<f64>,
  /// Sun–target–observer angle.
  pub phase:       Option<f64>,
  /// Solar elongation.
  pub selong:      Option<f64>,
  /// Position angles of the projected Sun and velocity vectors.
  pub sangle:      Option<f64>,
  pub vangle:      Option<f64>,
  pub trueanomaly: Option<f64>,
  /// Time from perihelion, days.
  pub tmtp:        Option<f64>,
}

/// Sample coverage for one designation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCoverage {
  pub designation: String,
  pub first_jd:    f64,
  pub last_jd:     f64,
  pub samples:     u64,
}
