//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD` so they sort as text.
//! Timestamps are RFC 3339 strings. Angles are degrees throughout.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, Utc};
use sbcheck_core::{
  detection::{ArtifactRoot, ArtifactState, Detection, NewDetection, StaleFile},
  ephemeris::{EphemerisSample, PreciseEphemeris},
  exposure::{Exposure, Night},
  wcs::TanWcs,
};

use crate::{Error, Result};

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Exposures ───────────────────────────────────────────────────────────────

/// Column order shared by [`exposure_from_row`] and the `obs` insert.
pub const OBS_COLUMNS: &str = "pid, infobits, field, ccdid, qid, rcid, fid, filtercode, expid,
  obsdate, obsjd, filefracday, seeing, airmass, moonillf, maglimit,
  crpix1, crpix2, crval1, crval2, cd11, cd12, cd21, cd22,
  ra, dec, ra1, dec1, ra2, dec2, ra3, dec3, ra4, dec4";

pub fn exposure_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exposure> {
  Ok(Exposure {
    pid:         row.get(0)?,
    infobits:    row.get(1)?,
    field:       row.get(2)?,
    ccd:         row.get(3)?,
    quadrant:    row.get(4)?,
    rcid:        row.get(5)?,
    filter_id:   row.get(6)?,
    filter_code: row.get(7)?,
    exposure_id: row.get(8)?,
    obs_date:    row.get(9)?,
    obs_jd:      row.get(10)?,
    filefracday: row.get(11)?,
    seeing:      row.get(12)?,
    airmass:     row.get(13)?,
    moon_illf:   row.get(14)?,
    mag_limit:   row.get(15)?,
    wcs:         TanWcs {
      crpix: [row.get(16)?, row.get(17)?],
      crval: [row.get(18)?, row.get(19)?],
      cd:    [[row.get(20)?, row.get(21)?], [row.get(22)?, row.get(23)?]],
    },
    ra:          row.get(24)?,
    dec:         row.get(25)?,
    corners:     [
      (row.get(26)?, row.get(27)?),
      (row.get(28)?, row.get(29)?),
      (row.get(30)?, row.get(31)?),
      (row.get(32)?, row.get(33)?),
    ],
  })
}

/// Insert one exposure unless its `pid` exists. Returns the rows changed.
pub fn insert_exposure(
  conn: &rusqlite::Connection,
  night_id: i64,
  e: &Exposure,
) -> rusqlite::Result<usize> {
  let mut stmt = conn.prepare_cached(&format!(
    "INSERT OR IGNORE INTO obs (nightid, {OBS_COLUMNS})
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32,
             ?33, ?34, ?35)"
  ))?;
  let [c1, c2, c3, c4] = e.corners;
  stmt.execute(rusqlite::params![
    night_id,
    e.pid,
    e.infobits,
    e.field,
    e.ccd,
    e.quadrant,
    e.rcid,
    e.filter_id,
    e.filter_code,
    e.exposure_id,
    e.obs_date,
    e.obs_jd,
    e.filefracday,
    e.seeing,
    e.airmass,
    e.moon_illf,
    e.mag_limit,
    e.wcs.crpix[0],
    e.wcs.crpix[1],
    e.wcs.crval[0],
    e.wcs.crval[1],
    e.wcs.cd[0][0],
    e.wcs.cd[0][1],
    e.wcs.cd[1][0],
    e.wcs.cd[1][1],
    e.ra,
    e.dec,
    c1.0,
    c1.1,
    c2.0,
    c2.1,
    c3.0,
    c3.1,
    c4.0,
    c4.1,
  ])
}

// ─── Detections ──────────────────────────────────────────────────────────────

/// Column order shared by [`RawDetection::from_row`] and the `found` upsert.
pub const FOUND_COLUMNS: &str = "foundid, desg, pid, obsjd, ra, dec, dra, ddec, ra3sig, dec3sig,
  vmag, rh, rdot, delta, phase, selong, sangle, vangle, trueanomaly, tmtp,
  x, y, retrieved, archivefile, sci_sync_date, sciimg, mskimg, scipsf, diffimg, diffpsf";

/// Insert or replace the detection keyed by (desg, pid); `foundid` and the
/// artifact columns of an existing row are preserved.
pub fn upsert_detection(conn: &rusqlite::Connection, d: &NewDetection) -> rusqlite::Result<i64> {
  let mut stmt = conn.prepare_cached(
    "INSERT INTO found (
       desg, pid, obsjd, ra, dec, dra, ddec, ra3sig, dec3sig, vmag, rh, rdot,
       delta, phase, selong, sangle, vangle, trueanomaly, tmtp, x, y, retrieved
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
               ?16, ?17, ?18, ?19, ?20, ?21, ?22)
     ON CONFLICT (desg, pid) DO UPDATE SET
       obsjd = excluded.obsjd, ra = excluded.ra, dec = excluded.dec,
       dra = excluded.dra, ddec = excluded.ddec, ra3sig = excluded.ra3sig,
       dec3sig = excluded.dec3sig, vmag = excluded.vmag, rh = excluded.rh,
       rdot = excluded.rdot, delta = excluded.delta, phase = excluded.phase,
       selong = excluded.selong, sangle = excluded.sangle, vangle = excluded.vangle,
       trueanomaly = excluded.trueanomaly, tmtp = excluded.tmtp,
       x = excluded.x, y = excluded.y, retrieved = excluded.retrieved
     RETURNING foundid",
  )?;
  let eph = &d.ephemeris;
  stmt.query_row(
    rusqlite::params![
      d.designation,
      d.pid,
      d.obs_jd,
      eph.ra,
      eph.dec,
      eph.dra,
      eph.ddec,
      eph.ra3sig,
      eph.dec3sig,
      eph.vmag,
      eph.rh,
      eph.rdot,
      eph.delta,
      eph.phase,
      eph.selong,
      eph.sangle,
      eph.vangle,
      eph.trueanomaly,
      eph.tmtp,
      d.x,
      d.y,
      encode_dt(d.retrieved),
    ],
    |row| row.get(0),
  )
}

/// A `found` row with its timestamps still encoded.
pub struct RawDetection {
  pub found_id:      i64,
  pub designation:   String,
  pub pid:           i64,
  pub obs_jd:        f64,
  pub ephemeris:     PreciseEphemeris,
  pub x:             i64,
  pub y:             i64,
  pub retrieved:     String,
  pub archive_file:  Option<String>,
  pub sci_sync_date: Option<String>,
  pub flags:         [bool; 5],
}

impl RawDetection {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      found_id:      row.get(0)?,
      designation:   row.get(1)?,
      pid:           row.get(2)?,
      obs_jd:        row.get(3)?,
      ephemeris:     PreciseEphemeris {
        ra:          row.get(4)?,
        dec:         row.get(5)?,
        dra:         row.get(6)?,
        ddec:        row.get(7)?,
        ra3sig:      row.get(8)?,
        dec3sig:     row.get(9)?,
        vmag:        row.get(10)?,
        rh:          row.get(11)?,
        rdot:        row.get(12)?,
        delta:       row.get(13)?,
        phase:       row.get(14)?,
        selong:      row.get(15)?,
        sangle:      row.get(16)?,
        vangle:      row.get(17)?,
        trueanomaly: row.get(18)?,
        tmtp:        row.get(19)?,
      },
      x:             row.get(20)?,
      y:             row.get(21)?,
      retrieved:     row.get(22)?,
      archive_file:  row.get(23)?,
      sci_sync_date: row.get(24)?,
      flags:         [row.get(25)?, row.get(26)?, row.get(27)?, row.get(28)?, row.get(29)?],
    })
  }

  pub fn into_detection(self) -> Result<Detection> {
    let [sciimg, mskimg, scipsf, diffimg, diffpsf] = self.flags;
    Ok(Detection {
      found_id:  self.found_id,
      record:    NewDetection {
        designation: self.designation,
        pid:         self.pid,
        obs_jd:      self.obs_jd,
        ephemeris:   self.ephemeris,
        x:           self.x,
        y:           self.y,
        retrieved:   decode_dt(&self.retrieved)?,
      },
      artifacts: ArtifactState {
        archive_file: self.archive_file,
        sci_sync_date: self.sci_sync_date.as_deref().map(decode_dt).transpose()?,
        sciimg,
        mskimg,
        scipsf,
        diffimg,
        diffpsf,
      },
    })
  }
}

// ─── Other row types ─────────────────────────────────────────────────────────

pub struct RawNight {
  pub night_id: i64,
  pub date:     String,
  pub nframes:  i64,
}

impl RawNight {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { night_id: row.get(0)?, date: row.get(1)?, nframes: row.get(2)? })
  }

  pub fn into_night(self) -> Result<Night> {
    Ok(Night { night_id: self.night_id, date: decode_date(&self.date)?, nframes: self.nframes })
  }
}

pub struct RawSample {
  pub designation: String,
  pub jd:          f64,
  pub ra:          f64,
  pub dec:         f64,
  pub dra:         f64,
  pub ddec:        f64,
  pub vmag:        Option<f64>,
  pub retrieved:   String,
}

impl RawSample {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      designation: row.get(0)?,
      jd:          row.get(1)?,
      ra:          row.get(2)?,
      dec:         row.get(3)?,
      dra:         row.get(4)?,
      ddec:        row.get(5)?,
      vmag:        row.get(6)?,
      retrieved:   row.get(7)?,
    })
  }

  pub fn into_sample(self) -> Result<EphemerisSample> {
    Ok(EphemerisSample {
      designation: self.designation,
      jd:          self.jd,
      ra:          self.ra,
      dec:         self.dec,
      dra:         self.dra,
      ddec:        self.ddec,
      vmag:        self.vmag,
      retrieved:   decode_dt(&self.retrieved)?,
    })
  }
}

pub fn decode_stale(path: String, file: String) -> Result<StaleFile> {
  let root = ArtifactRoot::from_str(&path).map_err(|_| Error::UnknownArtifactRoot(path))?;
  Ok(StaleFile { root, file })
}
