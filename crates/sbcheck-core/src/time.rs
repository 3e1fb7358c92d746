//! Julian date conversions.
//!
//! Julian dates are UTC-based here; leap seconds are ignored, which is far
//! below the precision the matcher needs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Julian date of 1970-01-01T00:00:00 UTC.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn jd_from_datetime(dt: NaiveDateTime) -> f64 {
  let ts = dt.and_utc();
  UNIX_EPOCH_JD
    + (ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) * 1e-6)
      / SECONDS_PER_DAY
}

/// Julian date at 00:00 UT on `date`.
pub fn jd_from_date(date: NaiveDate) -> f64 { jd_from_datetime(date.and_time(NaiveTime::MIN)) }

/// Calendar time for a Julian date, rounded to the microsecond.
///
/// Returns `None` outside chrono's representable range.
pub fn datetime_from_jd(jd: f64) -> Option<NaiveDateTime> {
  let micros = ((jd - UNIX_EPOCH_JD) * SECONDS_PER_DAY * 1e6).round();
  if !micros.is_finite() || micros.abs() > i64::MAX as f64 {
    return None;
  }
  DateTime::from_timestamp_micros(micros as i64).map(|dt| dt.naive_utc())
}

/// The observing window for a night: from 12:00 UT the day before `date`
/// up to 12:00 UT on `date`.
pub fn night_window(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
  let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
  let end = date.and_time(noon);
  (end - TimeDelta::days(1), end)
}
