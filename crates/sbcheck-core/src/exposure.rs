//! Nights and exposures — the survey side of the catalog.
//!
//! An exposure is one detector-quadrant readout. Each carries its own sky
//! footprint and tangent-plane WCS, and belongs to the night during which
//! it was ingested.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::wcs::TanWcs;

/// Base URL of the archive's science products.
pub const SCIENCE_PRODUCTS_URL: &str = "https://irsa.ipac.caltech.edu/ibe/data/ztf/products/sci";

/// One UT observing date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Night {
  pub night_id: i64,
  pub date:     NaiveDate,
  /// Number of exposures reported when the night was last ingested.
  pub nframes:  i64,
}

/// One detector-quadrant readout, keyed by the provider's product id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
  pub pid:          i64,
  pub infobits:     i64,
  pub field:        i64,
  pub ccd:          i64,
  pub quadrant:     i64,
  /// Readout channel, `4 × (ccd - 1) + quadrant - 1`.
  pub rcid:         i64,
  pub filter_id:    i64,
  pub filter_code:  String,
  pub exposure_id:  i64,
  /// Calendar time of the exposure as reported by the provider.
  pub obs_date:     String,
  pub obs_jd:       f64,
  /// `YYYYMMDDffffff` — the date plus fractional day used in archive paths.
  pub filefracday:  i64,
  pub seeing:       Option<f64>,
  pub airmass:      Option<f64>,
  pub moon_illf:    Option<f64>,
  pub mag_limit:    Option<f64>,
  pub wcs:          TanWcs,
  /// Footprint centre, degrees.
  pub ra:           f64,
  pub dec:          f64,
  /// Footprint corners, degrees.
  pub corners:      [(f64, f64); 4],
}

impl Exposure {
  /// Science-image cutout URL centred on (`ra`, `dec`) in degrees.
  pub fn cutout_url(&self, ra: f64, dec: f64) -> String {
    let ffd = self.filefracday.to_string();
    let (year, rest) = ffd.split_at(4.min(ffd.len()));
    let (monthday, fraction) = rest.split_at(4.min(rest.len()));
    format!(
      "{SCIENCE_PRODUCTS_URL}/{year}/{monthday}/{fraction}/ztf_{ffd}_{field:06}_{filter}_c{ccd:02}_o_q{qid}_sciimg.fits?center={ra:.6},{dec:.6}deg",
      field = self.field,
      filter = self.filter_code,
      ccd = self.ccd,
      qid = self.quadrant,
    )
  }
}

/// Derive the mask-image URL from a science cutout URL.
pub fn mask_url(science_url: &str) -> String { science_url.replace("sciimg", "mskimg") }

/// Derive the PSF URL from a science cutout URL; PSF products are not cut.
pub fn psf_url(science_url: &str) -> String {
  let full = science_url.replace("sciimg", "sciimgdaopsfcent");
  match full.rfind('?') {
    Some(i) => full[..i].to_owned(),
    None => full,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// An exposure centred on (`ra`, `dec`) with a 1"/px north-up WCS.
  fn exposure(pid: i64, obs_jd: f64, ra: f64, dec: f64) -> Exposure {
    let scale = 1.0 / 3600.0;
    Exposure {
      pid,
      infobits: 0,
      field: 718,
      ccd: 5,
      quadrant: 2,
      rcid: 17,
      filter_id: 2,
      filter_code: "zr".into(),
      exposure_id: pid / 100,
      obs_date: "2018-03-01 06:30:15".into(),
      obs_jd,
      filefracday: 20180301270833,
      seeing: Some(2.1),
      airmass: Some(1.2),
      moon_illf: None,
      mag_limit: Some(20.5),
      wcs: TanWcs {
        crpix: [1536.5, 1540.5],
        crval: [ra, dec],
        cd:    [[-scale, 0.0], [0.0, scale]],
      },
      ra,
      dec,
      corners: [
        (ra - 0.4, dec - 0.4),
        (ra + 0.4, dec - 0.4),
        (ra + 0.4, dec + 0.4),
        (ra - 0.4, dec + 0.4),
      ],
    }
  }

  #[test]
  fn cutout_url_layout() {
    let e = exposure(1, 2_458_178.77, 150.0, 20.0);
    let url = e.cutout_url(150.1, 20.25);
    assert_eq!(
      url,
      "https://irsa.ipac.caltech.edu/ibe/data/ztf/products/sci/2018/0301/270833/\
       ztf_20180301270833_000718_zr_c05_o_q2_sciimg.fits?center=150.100000,20.250000deg"
    );
  }

  #[test]
  fn derived_product_urls() {
    let sci = "https://x/ztf_1_sciimg.fits?center=1,2deg";
    assert_eq!(mask_url(sci), "https://x/ztf_1_mskimg.fits?center=1,2deg");
    assert_eq!(psf_url(sci), "https://x/ztf_1_sciimgdaopsfcent.fits");
  }
}
