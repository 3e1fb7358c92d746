//! Tangent-plane (gnomonic) world coordinate system for one exposure.
//!
//! Only the affine CD-matrix form is supported: a reference pixel, the sky
//! position at that pixel, and a 2×2 matrix mapping pixel offsets to
//! intermediate world coordinates in degrees. Distortion terms are ignored.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DETERMINANT_THRESHOLD: f64 = 1e-15;

/// FITS-style TAN WCS parameters (`CRPIXn`, `CRVALn`, `CDi_j`).
///
/// `crpix` is 1-based as in FITS headers; `crval` and `cd` are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TanWcs {
  pub crpix: [f64; 2],
  pub crval: [f64; 2],
  pub cd:    [[f64; 2]; 2],
}

impl TanWcs {
  pub fn determinant(&self) -> f64 {
    self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
  }

  /// Project a sky position (degrees) to 0-based pixel coordinates.
  ///
  /// Returns `Ok(None)` when the position lies on the far side of the
  /// tangent plane and has no projection.
  pub fn world_to_pixel(&self, ra: f64, dec: f64) -> Result<Option<(f64, f64)>> {
    let det = self.determinant();
    if det.abs() < DETERMINANT_THRESHOLD {
      return Err(Error::SingularWcs(det));
    }

    let (ra0, dec0) = (self.crval[0].to_radians(), self.crval[1].to_radians());
    let (ra, dec) = (ra.to_radians(), dec.to_radians());
    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_dra, cos_dra) = (ra - ra0).sin_cos();

    let cos_c = sin_dec0 * sin_dec + cos_dec0 * cos_dec * cos_dra;
    if cos_c <= 0.0 {
      return Ok(None);
    }

    let xi = (cos_dec * sin_dra / cos_c).to_degrees();
    let eta = ((cos_dec0 * sin_dec - sin_dec0 * cos_dec * cos_dra) / cos_c).to_degrees();

    let inv_det = 1.0 / det;
    let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) * inv_det;
    let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) * inv_det;

    Ok(Some((dx + self.crpix[0] - 1.0, dy + self.crpix[1] - 1.0)))
  }

  /// Inverse of [`world_to_pixel`](Self::world_to_pixel), returning degrees
  /// with RA in `[0, 360)`.
  pub fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64) {
    let dx = x + 1.0 - self.crpix[0];
    let dy = y + 1.0 - self.crpix[1];
    let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
    let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

    let (ra0, dec0) = (self.crval[0].to_radians(), self.crval[1].to_radians());
    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let den = cos_dec0 - eta * sin_dec0;
    let ra = ra0 + xi.atan2(den);
    let dec = (sin_dec0 + eta * cos_dec0).atan2(xi.hypot(den));

    (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn wcs() -> TanWcs {
    // ~1"/pixel, RA increasing to the left as on the sky.
    let scale = 1.0 / 3600.0;
    TanWcs {
      crpix: [1536.5, 1540.5],
      crval: [150.0, 20.0],
      cd:    [[-scale, 0.0], [0.0, scale]],
    }
  }

  #[test]
  fn reference_point_maps_to_crpix() {
    let (x, y) = wcs().world_to_pixel(150.0, 20.0).unwrap().unwrap();
    assert!((x - 1535.5).abs() < 1e-9);
    assert!((y - 1539.5).abs() < 1e-9);
  }

  #[test]
  fn north_is_up_east_is_left() {
    let w = wcs();
    let (_, y) = w.world_to_pixel(150.0, 20.0 + 100.0 / 3600.0).unwrap().unwrap();
    assert!((y - 1639.5).abs() < 0.01, "y = {y}");
    let (x, _) = w.world_to_pixel(150.01, 20.0).unwrap().unwrap();
    assert!(x < 1535.5);
  }

  #[test]
  fn pixel_world_roundtrip() {
    let w = wcs();
    let (ra, dec) = w.pixel_to_world(10.0, 3000.0);
    let (x, y) = w.world_to_pixel(ra, dec).unwrap().unwrap();
    assert!((x - 10.0).abs() < 1e-6 && (y - 3000.0).abs() < 1e-6);
  }

  #[test]
  fn far_hemisphere_has_no_projection() {
    assert!(wcs().world_to_pixel(330.0, -20.0).unwrap().is_none());
  }

  #[test]
  fn singular_matrix_is_an_error() {
    let mut w = wcs();
    w.cd = [[1.0, 2.0], [2.0, 4.0]];
    assert!(matches!(w.world_to_pixel(150.0, 20.0), Err(Error::SingularWcs(_))));
  }
}
