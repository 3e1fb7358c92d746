//! [`SqliteStore`] — the SQLite implementation of [`CatalogStore`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{OptionalExtension as _, ToSql};
use tracing::{debug, info};

use sbcheck_core::{
  designation::sort_key,
  detection::{ArtifactState, Detection, NewDetection, Projection, Stack, StaleFile},
  ephemeris::{EphemerisSample, ObjectCoverage},
  exposure::{Exposure, Night},
  store::{CatalogStore, JdRange},
};

use crate::{
  Result, cascade,
  encode::{
    FOUND_COLUMNS, OBS_COLUMNS, RawDetection, RawNight, RawSample, decode_stale, encode_date,
    encode_dt, exposure_from_row, insert_exposure, upsert_detection,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A catalog backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted, and every
/// clone talks to the same connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `AND`-clauses bounding `column` by `range`, plus their parameters.
fn range_clause(column: &str, range: JdRange) -> (String, Vec<f64>) {
  let mut sql = String::new();
  let mut params = Vec::new();
  if let Some(start) = range.start {
    sql.push_str(&format!(" AND {column} >= ?"));
    params.push(start);
  }
  if let Some(end) = range.end {
    sql.push_str(&format!(" AND {column} <= ?"));
    params.push(end);
  }
  (sql, params)
}

/// The table family a ranged, per-designation purge applies to.
#[derive(Clone, Copy)]
enum Purge {
  Ephemeris,
  Detections,
}

/// Count then delete, per designation, the rows `purge` selects within
/// `range`. Each count is logged for auditing before its rows go.
fn count_and_delete(
  conn: &mut rusqlite::Connection,
  purge: Purge,
  designations: &[String],
  range: JdRange,
) -> rusqlite::Result<u64> {
  let tx = conn.transaction()?;
  let mut total = 0u64;

  for desg in designations {
    let column = match purge {
      Purge::Ephemeris => "jd",
      Purge::Detections => "obsjd",
    };
    let (clause, bounds) = range_clause(column, range);
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(bounds.len() + 1);
    params.push(desg);
    params.extend(bounds.iter().map(|b| b as &dyn ToSql));

    let n = match purge {
      Purge::Ephemeris => {
        let n: i64 = tx.query_row(
          &format!("SELECT count(*) FROM eph WHERE desg = ?{clause}"),
          params.as_slice(),
          |r| r.get(0),
        )?;
        tx.execute(&format!("DELETE FROM eph WHERE desg = ?{clause}"), params.as_slice())?;
        debug!("* {desg}, {n} epochs");
        n as u64
      }
      Purge::Detections => {
        let sql = if clause.is_empty() {
          "SELECT foundid FROM found WHERE desg = ?".to_owned()
        } else {
          format!(
            "SELECT foundid FROM found WHERE desg = ?
             AND pid IN (SELECT pid FROM obs WHERE 1 = 1{clause})"
          )
        };
        let ids = tx
          .prepare(&sql)?
          .query_map(params.as_slice(), |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        debug!("* {desg}, {} detections", ids.len());
        cascade::delete_found(&tx, &ids)?;
        ids.len() as u64
      }
    };
    total += n;
  }

  tx.commit()?;
  Ok(total)
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = crate::Error;

  // ── Nights and exposures ──────────────────────────────────────────────────

  async fn upsert_night(&self, date: NaiveDate, exposures: Vec<Exposure>) -> Result<Night> {
    let date_str = encode_date(date);
    let nframes = exposures.len() as i64;

    let (night_id, inserted) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let night_id: i64 = tx.query_row(
          "INSERT INTO nights (date, nframes) VALUES (?1, ?2)
           ON CONFLICT (date) DO UPDATE SET nframes = excluded.nframes
           RETURNING nightid",
          rusqlite::params![date_str, nframes],
          |r| r.get(0),
        )?;
        let mut inserted = 0;
        for e in &exposures {
          inserted += insert_exposure(&tx, night_id, e)?;
        }
        tx.commit()?;
        Ok((night_id, inserted))
      })
      .await?;

    info!("Updated observation log for {date} UT with {nframes} images ({inserted} new).");
    Ok(Night { night_id, date, nframes })
  }

  async fn night(&self, date: NaiveDate) -> Result<Option<Night>> {
    let date_str = encode_date(date);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT nightid, date, nframes FROM nights WHERE date = ?1",
              [date_str],
              RawNight::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawNight::into_night).transpose()
  }

  async fn nights(&self) -> Result<Vec<Night>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT nightid, date, nframes FROM nights ORDER BY date")?;
        let rows = stmt
          .query_map([], RawNight::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawNight::into_night).collect()
  }

  async fn delete_night(&self, date: NaiveDate) -> Result<bool> {
    let date_str = encode_date(date);
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let night_id: Option<i64> = tx
          .query_row("SELECT nightid FROM nights WHERE date = ?1", [date_str], |r| r.get(0))
          .optional()?;
        let removed = match night_id {
          Some(id) => Some(cascade::delete_night(&tx, id)?),
          None => None,
        };
        tx.commit()?;
        Ok(removed)
      })
      .await?;

    match removed {
      Some(n) => {
        info!("Deleted night {date} and its {n} exposures.");
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn epochs_for_nights(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<f64>> {
    let (start, end) = (encode_date(start), encode_date(end));
    let epochs = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT obs.obsjd FROM obs
           INNER JOIN nights ON obs.nightid = nights.nightid
           WHERE nights.date >= ?1 AND nights.date <= ?2
           ORDER BY obs.obsjd",
        )?;
        let rows = stmt
          .query_map([start, end], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<f64>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(epochs)
  }

  async fn exposures_between(&self, jd_start: f64, jd_end: f64) -> Result<Vec<Exposure>> {
    let exposures = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OBS_COLUMNS} FROM obs WHERE obsjd >= ?1 AND obsjd <= ?2 ORDER BY obsjd, pid"
        ))?;
        let rows = stmt
          .query_map([jd_start, jd_end], exposure_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(exposures)
  }

  async fn exposure(&self, pid: i64) -> Result<Option<Exposure>> {
    let exposure = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {OBS_COLUMNS} FROM obs WHERE pid = ?1"),
              [pid],
              exposure_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(exposure)
  }

  // ── Ephemerides ───────────────────────────────────────────────────────────

  async fn refresh_ephemeris(
    &self,
    designation: String,
    start: f64,
    end: f64,
    samples: Vec<EphemerisSample>,
  ) -> Result<u64> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM eph WHERE desg = ?1 AND jd >= ?2 AND jd <= ?3",
          rusqlite::params![designation, start, end],
        )?;
        let mut inserted = 0u64;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO eph (desg, jd, ra, dec, dra, ddec, vmag, retrieved)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for s in &samples {
            inserted += stmt.execute(rusqlite::params![
              designation,
              s.jd,
              s.ra,
              s.dec,
              s.dra,
              s.ddec,
              s.vmag,
              encode_dt(s.retrieved),
            ])? as u64;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn count_ephemeris(&self, designation: String, start: f64, end: f64) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT count(*) FROM eph WHERE desg = ?1 AND jd >= ?2 AND jd <= ?3",
          rusqlite::params![designation, start, end],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(n as u64)
  }

  async fn ephemeris_samples(
    &self,
    designation: String,
    after: f64,
    before: f64,
  ) -> Result<Vec<EphemerisSample>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT desg, jd, ra, dec, dra, ddec, vmag, retrieved FROM eph
           WHERE desg = ?1 AND jd > ?2 AND jd < ?3
           ORDER BY jd",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![designation, after, before], RawSample::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSample::into_sample).collect()
  }

  async fn designations_between(&self, jd_start: f64, jd_end: f64) -> Result<Vec<String>> {
    let desgs = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT desg FROM eph WHERE jd >= ?1 AND jd <= ?2 ORDER BY desg")?;
        let rows = stmt
          .query_map([jd_start, jd_end], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(desgs)
  }

  async fn available_objects(&self) -> Result<Vec<ObjectCoverage>> {
    let mut objects = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT desg, min(jd), max(jd), count(*) FROM eph GROUP BY desg")?;
        let rows = stmt
          .query_map([], |r| {
            Ok(ObjectCoverage {
              designation: r.get(0)?,
              first_jd:    r.get(1)?,
              last_jd:     r.get(2)?,
              samples:     r.get::<_, i64>(3)? as u64,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    objects.sort_by(|a, b| sort_key(&a.designation).cmp(&sort_key(&b.designation)));
    Ok(objects)
  }

  async fn delete_ephemeris(&self, designations: Vec<String>, range: JdRange) -> Result<u64> {
    info!("Cleaning the ephemeris database of {} objects, {range}.", designations.len());
    let total = self
      .conn
      .call(move |conn| Ok(count_and_delete(conn, Purge::Ephemeris, &designations, range)?))
      .await?;
    info!("Removed {total} ephemeris rows.");
    Ok(total)
  }

  // ── Detections ────────────────────────────────────────────────────────────

  async fn write_detection(&self, detection: NewDetection) -> Result<i64> {
    let id = self
      .conn
      .call(move |conn| Ok(upsert_detection(conn, &detection)?))
      .await?;
    Ok(id)
  }

  async fn write_detections(&self, detections: Vec<NewDetection>) -> Result<Vec<i64>> {
    let ids = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let ids = detections
          .iter()
          .map(|d| upsert_detection(&tx, d))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
      })
      .await?;
    Ok(ids)
  }

  async fn detection(&self, designation: String, pid: i64) -> Result<Option<Detection>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FOUND_COLUMNS} FROM found WHERE desg = ?1 AND pid = ?2"),
              rusqlite::params![designation, pid],
              RawDetection::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawDetection::into_detection).transpose()
  }

  async fn detections(&self, designation: Option<String>) -> Result<Vec<Detection>> {
    let raws = self
      .conn
      .call(move |conn| {
        let rows = if let Some(d) = designation {
          let mut stmt = conn.prepare(&format!(
            "SELECT {FOUND_COLUMNS} FROM found WHERE desg = ?1 ORDER BY obsjd, pid"
          ))?;
          stmt
            .query_map([d], RawDetection::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {FOUND_COLUMNS} FROM found ORDER BY desg, obsjd, pid"
          ))?;
          stmt
            .query_map([], RawDetection::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawDetection::into_detection).collect()
  }

  async fn delete_detections(&self, designations: Vec<String>, range: JdRange) -> Result<u64> {
    info!("Cleaning the found object database of {} objects, {range}.", designations.len());
    let total = self
      .conn
      .call(move |conn| Ok(count_and_delete(conn, Purge::Detections, &designations, range)?))
      .await?;
    info!("Removed {total} detections.");
    Ok(total)
  }

  async fn set_artifacts(&self, found_id: i64, artifacts: ArtifactState) -> Result<()> {
    let sync = artifacts.sci_sync_date.map(encode_dt);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE found SET archivefile = ?2, sci_sync_date = ?3, sciimg = ?4,
             mskimg = ?5, scipsf = ?6, diffimg = ?7, diffpsf = ?8
           WHERE foundid = ?1",
          rusqlite::params![
            found_id,
            artifacts.archive_file,
            sync,
            artifacts.sciimg,
            artifacts.mskimg,
            artifacts.scipsf,
            artifacts.diffimg,
            artifacts.diffpsf,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Downstream products ───────────────────────────────────────────────────

  async fn record_stack(&self, stack: Stack) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO stacks (foundid, stackfile, stacked) VALUES (?1, ?2, ?3)
           ON CONFLICT (foundid) DO UPDATE SET
             stackfile = excluded.stackfile, stacked = excluded.stacked",
          rusqlite::params![stack.found_id, stack.stack_file, stack.stacked],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn stack(&self, found_id: i64) -> Result<Option<Stack>> {
    let stack = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT foundid, stackfile, stacked FROM stacks WHERE foundid = ?1",
              [found_id],
              |r| Ok(Stack { found_id: r.get(0)?, stack_file: r.get(1)?, stacked: r.get(2)? }),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(stack)
  }

  async fn record_projection(&self, projection: Projection) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO projections (foundid, vangleimg, sangleimg) VALUES (?1, ?2, ?3)
           ON CONFLICT (foundid) DO UPDATE SET
             vangleimg = excluded.vangleimg, sangleimg = excluded.sangleimg",
          rusqlite::params![projection.found_id, projection.vangle_img, projection.sangle_img],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn projection(&self, found_id: i64) -> Result<Option<Projection>> {
    let projection = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT foundid, vangleimg, sangleimg FROM projections WHERE foundid = ?1",
              [found_id],
              |r| {
                Ok(Projection {
                  found_id:   r.get(0)?,
                  vangle_img: r.get(1)?,
                  sangle_img: r.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(projection)
  }

  // ── Staleness log ─────────────────────────────────────────────────────────

  async fn stale_files(&self) -> Result<Vec<StaleFile>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT path, archivefile FROM stale_files ORDER BY rowid")?;
        let rows = stmt
          .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(|(path, file)| decode_stale(path, file)).collect()
  }

  async fn clear_stale_files(&self) -> Result<u64> {
    let n = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM stale_files", [])? as u64))
      .await?;
    Ok(n)
  }
}
