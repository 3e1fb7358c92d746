//! Delete cascades, run inside the caller's transaction.
//!
//! Children are always handled before their parent row is removed, so with
//! foreign keys enforced a partial cascade fails the whole transaction
//! rather than leaving orphans behind.

use rusqlite::Connection;

use sbcheck_core::detection::ArtifactRoot;

/// Delete detections by id: log their cutout and stack files as stale, drop
/// their projections and stacks, then the detections themselves.
pub fn delete_found(conn: &Connection, found_ids: &[i64]) -> rusqlite::Result<()> {
  let cutout: &str = ArtifactRoot::Cutout.into();
  let stack: &str = ArtifactRoot::Stack.into();

  let mut log_cutout = conn.prepare_cached(
    "INSERT INTO stale_files (path, archivefile)
     SELECT ?1, archivefile FROM found
     WHERE foundid = ?2 AND archivefile IS NOT NULL",
  )?;
  let mut log_stack = conn.prepare_cached(
    "INSERT INTO stale_files (path, archivefile)
     SELECT ?1, stackfile FROM stacks
     WHERE foundid = ?2 AND stackfile IS NOT NULL",
  )?;
  let mut drop_projection = conn.prepare_cached("DELETE FROM projections WHERE foundid = ?1")?;
  let mut drop_stack = conn.prepare_cached("DELETE FROM stacks WHERE foundid = ?1")?;
  let mut drop_found = conn.prepare_cached("DELETE FROM found WHERE foundid = ?1")?;

  for &id in found_ids {
    log_cutout.execute(rusqlite::params![cutout, id])?;
    log_stack.execute(rusqlite::params![stack, id])?;
    drop_projection.execute([id])?;
    drop_stack.execute([id])?;
    drop_found.execute([id])?;
  }
  Ok(())
}

/// Delete exposures by pid, cascading to their detections.
pub fn delete_obs(conn: &Connection, pids: &[i64]) -> rusqlite::Result<()> {
  let mut found_of = conn.prepare_cached("SELECT foundid FROM found WHERE pid = ?1")?;
  let mut drop_obs = conn.prepare_cached("DELETE FROM obs WHERE pid = ?1")?;

  for &pid in pids {
    let found_ids = found_of
      .query_map([pid], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<i64>>>()?;
    delete_found(conn, &found_ids)?;
    drop_obs.execute([pid])?;
  }
  Ok(())
}

/// Delete a night, cascading to its exposures. Returns the number of
/// exposures removed.
pub fn delete_night(conn: &Connection, night_id: i64) -> rusqlite::Result<usize> {
  let pids = conn
    .prepare_cached("SELECT pid FROM obs WHERE nightid = ?1")?
    .query_map([night_id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<i64>>>()?;
  delete_obs(conn, &pids)?;
  conn.execute("DELETE FROM nights WHERE nightid = ?1", [night_id])?;
  Ok(pids.len())
}
