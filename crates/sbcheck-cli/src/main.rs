//! `sbcheck` — search survey exposures for known small bodies.
//!
//! # Usage
//!
//! ```
//! sbcheck nights
//! sbcheck search --start 2018-03-01 --end 2018-03-07 --object 2P --object 29P
//! sbcheck clean-found --object 2P --start 2018-03-01
//! sbcheck --config ~/.config/sbcheck.toml stale-files --purge
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sbcheck_core::{
  store::{CatalogStore, JdRange},
  time::{datetime_from_jd, jd_from_date},
};
use sbcheck_search::{FovMatcher, StoredEphemeris, artifacts::purge_stale_files};
use sbcheck_store_sqlite::SqliteStore;
use serde::Serialize;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sbcheck", version, about = "Find known small bodies in survey exposures")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sbcheck.toml")]
  config: PathBuf,

  /// Print results as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List ingested nights.
  Nights,
  /// List objects with stored ephemerides.
  Objects,
  /// Search the nights dated START ..= END for objects.
  Search {
    #[arg(long)]
    start:  NaiveDate,
    #[arg(long)]
    end:    NaiveDate,
    /// Limit the search to these designations.
    #[arg(long = "object")]
    object: Vec<String>,
  },
  /// List detections.
  Found {
    #[arg(long)]
    object: Option<String>,
  },
  /// Remove stored ephemerides.
  CleanEph(CleanArgs),
  /// Remove detections, logging their files as stale.
  CleanFound(CleanArgs),
  /// Remove a night with its exposures and detections.
  DeleteNight { date: NaiveDate },
  /// List the staleness log.
  StaleFiles {
    /// Delete the listed files and clear the log.
    #[arg(long)]
    purge: bool,
  },
}

#[derive(clap::Args, Debug)]
struct CleanArgs {
  #[arg(long = "object", required = true)]
  objects: Vec<String>,
  /// Remove entries from 00:00 UT on this date.
  #[arg(long)]
  start:   Option<NaiveDate>,
  /// Remove entries up to 00:00 UT on this date; later times that day
  /// are kept.
  #[arg(long)]
  end:     Option<NaiveDate>,
}

impl CleanArgs {
  fn range(&self) -> JdRange {
    JdRange {
      start: self.start.map(jd_from_date),
      end:   self.end.map(jd_from_date),
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store = SqliteStore::open(&settings.database)
    .await
    .with_context(|| format!("failed to open catalog at {:?}", settings.database))?;

  run(cli.command, &store, &settings, cli.json).await
}

async fn run(command: Command, store: &SqliteStore, settings: &Settings, json: bool) -> Result<()> {
  match command {
    Command::Nights => {
      let nights = store.nights().await?;
      emit(json, &nights, || {
        nights.iter().map(|n| format!("{}  {:>6}", n.date, n.nframes)).collect()
      })
    }

    Command::Objects => {
      let objects = store.available_objects().await?;
      emit(json, &objects, || {
        objects
          .iter()
          .map(|o| {
            format!(
              "{:15} {} to {}  {:>6} samples",
              o.designation,
              ut(o.first_jd),
              ut(o.last_jd),
              o.samples
            )
          })
          .collect()
      })
    }

    Command::Search { start, end, object } => {
      let provider = StoredEphemeris::new(store.clone());
      let designations = (!object.is_empty()).then_some(object);
      let summary = FovMatcher::new(store, &provider, settings.search)
        .search(start, end, designations)
        .await?;
      emit(json, &summary.found, || vec![summary.to_string()])
    }

    Command::Found { object } => {
      let found = store.detections(object).await?;
      emit(json, &found, || {
        found
          .iter()
          .map(|d| {
            let r = &d.record;
            format!(
              "{:15} {}  pid {:>12}  ({:>4}, {:>4})  {}",
              r.designation,
              ut(r.obs_jd),
              r.pid,
              r.x,
              r.y,
              d.artifacts.archive_file.as_deref().unwrap_or("-")
            )
          })
          .collect()
      })
    }

    Command::CleanEph(args) => {
      let n = store.delete_ephemeris(args.objects.clone(), args.range()).await?;
      emit(json, &n, || vec![format!("Removed {n} ephemeris rows.")])
    }

    Command::CleanFound(args) => {
      let n = store.delete_detections(args.objects.clone(), args.range()).await?;
      emit(json, &n, || vec![format!("Removed {n} detections.")])
    }

    Command::DeleteNight { date } => {
      if !store.delete_night(date).await? {
        anyhow::bail!("no night recorded for {date}");
      }
      Ok(())
    }

    Command::StaleFiles { purge } => {
      if purge {
        let n = purge_stale_files(store, &settings.cutout_path, &settings.stack_path).await?;
        return emit(json, &n, || vec![format!("Removed {n} files.")]);
      }
      let stale = store.stale_files().await?;
      emit(json, &stale, || stale.iter().map(|s| format!("{:12} {}", s.root, s.file)).collect())
    }
  }
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// Print `value` as JSON, or the lines produced by `text`.
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> Vec<String>) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value)?);
  } else {
    for line in text() {
      println!("{line}");
    }
  }
  Ok(())
}

/// Julian date as UT calendar time to the second.
fn ut(jd: f64) -> String {
  datetime_from_jd(jd)
    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_else(|| format!("JD {jd}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clean_range_uses_midnight_bounds() {
    let cli = Cli::parse_from([
      "sbcheck", "clean-found", "--object", "2P", "--start", "2018-03-01", "--end", "2018-03-03",
    ]);
    let Command::CleanFound(args) = cli.command else {
      panic!("parsed {:?}", cli.command);
    };
    let range = args.range();
    assert_eq!(range.start, Some(2_458_178.5));
    assert_eq!(range.end, Some(2_458_180.5));
    // Noon on the end date is outside the range.
    assert!(range.contains(2_458_180.5));
    assert!(!range.contains(2_458_181.0));

    let cli = Cli::parse_from(["sbcheck", "clean-eph", "--object", "2P"]);
    let Command::CleanEph(args) = cli.command else {
      panic!("parsed {:?}", cli.command);
    };
    assert_eq!(args.range(), JdRange::all());
  }
}
