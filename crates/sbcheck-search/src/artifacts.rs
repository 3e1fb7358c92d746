//! Cutout downloads and clean-up of files orphaned by deletions.
//!
//! Each detection gets a science cutout plus, when available, its mask and
//! PSF, stored under `<cutout root>/<designation stem>/`. Files left behind
//! by deleted detections are listed in the store's staleness log and
//! removed here, outside any database transaction.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::{SubsecRound as _, Utc};
use tracing::{debug, error, info, warn};

use sbcheck_core::{
  designation::designation_file_stem,
  detection::{ArtifactRoot, ArtifactState, Detection},
  exposure::{mask_url, psf_url},
  provider::ImageArchive,
  store::CatalogStore,
  time::datetime_from_jd,
};

use crate::{Result, error::store_err};

/// Outcome of one [`sync_artifacts`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
  pub downloaded: usize,
  pub failed:     usize,
}

/// Cutout file name for a detection, relative to the cutout root.
///
/// `<stem>/<stem>-<YYYYMMDD_HHMMSS>[-<pre|post><rh>]-ztf.fits`, where the
/// pre/post-perihelion tag is present only when the distance and radial
/// velocity are known.
pub fn cutout_file(detection: &Detection) -> String {
  let r = &detection.record;
  let stem = designation_file_stem(&r.designation);
  let time = datetime_from_jd(r.obs_jd)
    .map(|t| t.round_subsecs(0).format("%Y%m%d_%H%M%S").to_string())
    .unwrap_or_else(|| format!("{:.5}", r.obs_jd));
  let orbit = match (r.ephemeris.rh, r.ephemeris.rdot) {
    (Some(rh), Some(rdot)) => {
      let side = if rdot < 0.0 { "pre" } else { "post" };
      format!("-{side}{rh:.3}")
    }
    _ => String::new(),
  };
  format!("{stem}/{stem}-{time}{orbit}-ztf.fits")
}

/// A sibling of `file` with `suffix` inserted before the extension.
fn sibling(file: &Path, suffix: &str) -> PathBuf {
  let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  file.with_file_name(format!("{stem}-{suffix}.fits"))
}

/// Download `url` to `path`, replacing any existing file.
///
/// Failures are logged and leave no file behind.
async fn download<A: ImageArchive>(archive: &A, url: &str, path: &Path) -> bool {
  if let Err(e) = tokio::fs::remove_file(path).await
    && e.kind() != ErrorKind::NotFound
  {
    error!("Cannot replace {}: {e}", path.display());
    return false;
  }

  let result = match archive.fetch(url).await {
    Ok(bytes) => tokio::fs::write(path, bytes).await.map_err(|e| e.to_string()),
    Err(e) => Err(e.to_string()),
  };
  match result {
    Ok(()) => true,
    Err(e) => {
      error!("Error downloading {} from {url}: {e}", path.display());
      let _ = tokio::fs::remove_file(path).await;
      false
    }
  }
}

/// Fetch the cutouts of every detection that has none yet.
///
/// A failed science download, or an unwritable destination, skips that
/// detection; missing masks and PSFs are recorded as absent. Nothing here
/// aborts the pass except store errors.
pub async fn sync_artifacts<S, A>(store: &S, archive: &A, cutout_root: &Path) -> Result<SyncSummary>
where
  S: CatalogStore,
  A: ImageArchive,
{
  let pending: Vec<Detection> = store
    .detections(None)
    .await
    .map_err(store_err)?
    .into_iter()
    .filter(|d| d.artifacts.archive_file.is_none())
    .collect();
  info!("Checking {} cutouts.", pending.len());

  let mut summary = SyncSummary::default();
  for d in pending {
    let r = &d.record;
    let Some(exposure) = store.exposure(r.pid).await.map_err(store_err)? else {
      warn!("Detection {} refers to missing exposure {}", d.found_id, r.pid);
      summary.failed += 1;
      continue;
    };

    let file = cutout_file(&d);
    let path = cutout_root.join(&file);
    if let Some(dir) = path.parent()
      && let Err(e) = tokio::fs::create_dir_all(dir).await
    {
      error!("Cannot create {}: {e}", dir.display());
      summary.failed += 1;
      continue;
    }

    let url = exposure.cutout_url(r.ephemeris.ra, r.ephemeris.dec);
    if !download(archive, &url, &path).await {
      summary.failed += 1;
      continue;
    }
    let mskimg = download(archive, &mask_url(&url), &sibling(&path, "mask")).await;
    let scipsf = download(archive, &psf_url(&url), &sibling(&path, "psf")).await;

    store
      .set_artifacts(d.found_id, ArtifactState {
        archive_file: Some(file.clone()),
        sci_sync_date: Some(Utc::now()),
        sciimg: true,
        mskimg,
        scipsf,
        ..d.artifacts.clone()
      })
      .await
      .map_err(store_err)?;
    info!("  {file}");
    summary.downloaded += 1;
  }

  Ok(summary)
}

/// Remove every file in the staleness log, then clear the log.
///
/// Files that are already gone are not errors. Returns the number of files
/// actually removed.
pub async fn purge_stale_files<S: CatalogStore>(
  store: &S,
  cutout_root: &Path,
  stack_root: &Path,
) -> Result<usize> {
  let stale = store.stale_files().await.map_err(store_err)?;
  let mut removed = 0;

  for entry in &stale {
    let root = match entry.root {
      ArtifactRoot::Cutout => cutout_root,
      ArtifactRoot::Stack => stack_root,
    };
    let mut paths = vec![root.join(&entry.file)];
    if entry.root == ArtifactRoot::Cutout {
      paths.push(sibling(&paths[0], "mask"));
      paths.push(sibling(&paths[0], "psf"));
    }

    for path in paths {
      match tokio::fs::remove_file(&path).await {
        Ok(()) => {
          debug!("Removed {}", path.display());
          removed += 1;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      }
    }
  }

  store.clear_stale_files().await.map_err(store_err)?;
  info!("Removed {removed} stale files ({} log entries).", stale.len());
  Ok(removed)
}
