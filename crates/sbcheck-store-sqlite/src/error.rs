//! Error type for `sbcheck-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown stale file root: {0:?}")]
  UnknownArtifactRoot(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
