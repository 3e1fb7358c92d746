//! Error types for `sbcheck-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("WCS CD matrix is not invertible (determinant {0:e})")]
  SingularWcs(f64),

  #[error("invalid date range: {start} is after {end}")]
  InvalidRange { start: f64, end: f64 },

  #[error("ephemeris not found for {designation}")]
  EphemerisNotFound { designation: String },

  #[error("ephemeris service error for {designation}: {message}")]
  EphemerisService { designation: String, message: String },

  #[error("exposure metadata service error: {0}")]
  ExposureService(String),

  #[error("download failed for {url}: {message}")]
  Download { url: String, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
