//! Spherical geometry on the celestial sphere. All angles are radians.

use std::f64::consts::TAU;

/// Great-circle distance between two sky positions.
///
/// Uses the Vincenty form of the spherical law, which stays accurate for
/// both tiny and near-antipodal separations.
pub fn angular_separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
  let (sin_dec1, cos_dec1) = dec1.sin_cos();
  let (sin_dec2, cos_dec2) = dec2.sin_cos();
  let (sin_dra, cos_dra) = (ra2 - ra1).sin_cos();

  let num = ((cos_dec2 * sin_dra).powi(2)
    + (cos_dec1 * sin_dec2 - sin_dec1 * cos_dec2 * cos_dra).powi(2))
  .sqrt();
  let den = sin_dec1 * sin_dec2 + cos_dec1 * cos_dec2 * cos_dra;

  num.atan2(den)
}

pub fn to_unit_vector(ra: f64, dec: f64) -> [f64; 3] {
  let (sin_ra, cos_ra) = ra.sin_cos();
  let (sin_dec, cos_dec) = dec.sin_cos();
  [cos_dec * cos_ra, cos_dec * sin_ra, sin_dec]
}

/// Inverse of [`to_unit_vector`]; the vector need not be normalised.
///
/// RA is returned in `[0, 2π)`.
pub fn from_vector(v: [f64; 3]) -> (f64, f64) {
  let [x, y, z] = v;
  let ra = y.atan2(x).rem_euclid(TAU);
  let dec = z.atan2(x.hypot(y));
  (ra, dec)
}

/// Spherical mean (centroid) of a set of positions.
///
/// Averages the unit vectors and converts back, so RA wraparound is handled.
/// Returns `None` for empty or mismatched inputs.
pub fn spherical_mean(ra: &[f64], dec: &[f64]) -> Option<(f64, f64)> {
  if ra.is_empty() || ra.len() != dec.len() {
    return None;
  }

  let n = ra.len() as f64;
  let sum = ra
    .iter()
    .zip(dec)
    .map(|(&r, &d)| to_unit_vector(r, d))
    .fold([0.0; 3], |acc, v| [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]);

  Some(from_vector([sum[0] / n, sum[1] / n, sum[2] / n]))
}

/// Position a fraction `t` of the way along the great circle from point 1
/// to point 2.
///
/// Endpoints are weighted by `sin((1-t)·w)/sin(w)` and `sin(t·w)/sin(w)`
/// where `w` is their separation; for vanishing `w` the weights degrade to
/// `1-t` and `t`.
pub fn great_circle_blend(ra1: f64, dec1: f64, ra2: f64, dec2: f64, t: f64) -> (f64, f64) {
  let w = angular_separation(ra1, dec1, ra2, dec2);
  let (p1, p2) = if w.abs() < 1e-12 {
    (1.0 - t, t)
  } else {
    let sin_w = w.sin();
    (((1.0 - t) * w).sin() / sin_w, (t * w).sin() / sin_w)
  };

  let a = to_unit_vector(ra1, dec1);
  let b = to_unit_vector(ra2, dec2);
  from_vector([
    p1 * a[0] + p2 * b[0],
    p1 * a[1] + p2 * b[1],
    p1 * a[2] + p2 * b[2],
  ])
}
