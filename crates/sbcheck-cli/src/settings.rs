//! Layered configuration: optional TOML file, then `SBCHECK_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use sbcheck_search::SearchConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite catalog file.
  pub database:    PathBuf,
  /// Root of downloaded cutouts.
  pub cutout_path: PathBuf,
  /// Root of stacked images.
  pub stack_path:  PathBuf,
  pub search:      SearchConfig,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      database:    PathBuf::from("sbcheck.db"),
      cutout_path: PathBuf::from("cutouts"),
      stack_path:  PathBuf::from("stacks"),
      search:      SearchConfig::default(),
    }
  }
}

impl Settings {
  /// Read `file` (if it exists) under the environment. Nested keys use a
  /// double underscore, e.g. `SBCHECK_SEARCH__COARSE_RADIUS`.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings: Self = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("SBCHECK")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")?;

    Ok(Self {
      database: expand_tilde(&settings.database),
      cutout_path: expand_tilde(&settings.cutout_path),
      stack_path: expand_tilde(&settings.stack_path),
      ..settings
    })
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
