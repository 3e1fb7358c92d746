//! Pulling exposure logs and ephemerides from the external services into
//! the store.

use chrono::{NaiveDate, TimeDelta};
use tracing::{debug, error, info};

use sbcheck_core::{
  exposure::Night,
  provider::{EphemerisProvider, ExposureSource},
  store::CatalogStore,
  time::{jd_from_date, night_window},
};

use crate::{Result, error::store_err};

/// Default cadence of refreshed ephemerides.
pub fn default_step() -> TimeDelta { TimeDelta::hours(6) }

/// Objects with more than this many samples in range are considered
/// current unless a refresh is forced.
const EXISTING_SAMPLES: u64 = 2;

/// Ingest the exposures of the night ending on `date`.
///
/// The night runs from 12:00 UT the previous day to 12:00 UT on `date`. An
/// empty night is recorded with zero frames.
pub async fn update_night<S, X>(store: &S, source: &X, date: NaiveDate) -> Result<Night>
where
  S: CatalogStore,
  X: ExposureSource,
{
  let (after, before) = night_window(date);
  let exposures = source.exposures_between(after, before).await?;
  debug!("{date}: {} exposures between {after} and {before} UT", exposures.len());
  store.upsert_night(date, exposures).await.map_err(store_err)
}

/// Refresh the stored ephemerides of `designations` for `start ..= end`.
///
/// Unless `force` is set, objects with more than two samples in the range
/// are skipped; sparser coverage is fetched again. A provider failure skips that object only. Returns the
/// number of objects refreshed.
pub async fn update_ephemeris<S, P>(
  store: &S,
  provider: &P,
  designations: &[String],
  start: NaiveDate,
  end: NaiveDate,
  step: TimeDelta,
  force: bool,
) -> Result<usize>
where
  S: CatalogStore,
  P: EphemerisProvider,
{
  let (jd_start, jd_end) = (jd_from_date(start), jd_from_date(end));
  if force {
    info!("Updating ephemerides for the time period {start} to {end} UT.");
  } else {
    info!("Verifying ephemerides for the time period {start} to {end} UT.");
  }

  let mut updated = 0;
  for desg in designations {
    debug!("* {desg}");

    if !force {
      let n = store
        .count_ephemeris(desg.clone(), jd_start, jd_end)
        .await
        .map_err(store_err)?;
      if n > EXISTING_SAMPLES {
        debug!("  Ephemeris already exists.");
        continue;
      }
    }

    let samples = match provider.ephemeris_range(desg, jd_start, jd_end, step).await {
      Ok(samples) => samples,
      Err(e) => {
        error!("Error retrieving ephemeris for {desg}: {e}");
        continue;
      }
    };
    store
      .refresh_ephemeris(desg.clone(), jd_start, jd_end, samples)
      .await
      .map_err(store_err)?;
    updated += 1;
  }

  info!("  - Updated {updated} objects.");
  Ok(updated)
}
