//! Matcher, ingestion and artifact tests against an in-memory store and
//! deterministic fake collaborators.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use sbcheck_core::{
  Error as CoreError, Result as CoreResult,
  detection::{ArtifactState, Stack},
  ephemeris::{EphemerisSample, PreciseEphemeris},
  exposure::Exposure,
  provider::{EphemerisProvider, ExposureSource, ImageArchive},
  store::{CatalogStore, JdRange},
  time::{jd_from_date, jd_from_datetime, night_window},
  wcs::TanWcs,
};
use sbcheck_store_sqlite::SqliteStore;

use crate::{
  Error, FovMatcher, SearchConfig, StoredEphemeris, Verdict,
  artifacts::{cutout_file, purge_stale_files, sync_artifacts},
  ingest::{update_ephemeris, update_night},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

/// 2018-03-01 06:30:00 UT.
fn epoch() -> f64 {
  let t = NaiveDateTime::parse_from_str("2018-03-01 06:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
  jd_from_datetime(t)
}

/// An exposure centred on (`ra`, `dec`) degrees, 1"/px, north up.
fn exposure(pid: i64, obs_jd: f64, ra: f64, dec: f64) -> Exposure {
  let scale = 1.0 / 3600.0;
  Exposure {
    pid,
    infobits: 0,
    field: 718,
    ccd: 5,
    quadrant: 2,
    rcid: 17,
    filter_id: 2,
    filter_code: "zr".into(),
    exposure_id: pid,
    obs_date: "2018-03-01 06:30:00".into(),
    obs_jd,
    filefracday: 20180301270833,
    seeing: None,
    airmass: None,
    moon_illf: None,
    mag_limit: None,
    wcs: TanWcs {
      crpix: [1536.5, 1540.5],
      crval: [ra, dec],
      cd:    [[-scale, 0.0], [0.0, scale]],
    },
    ra,
    dec,
    corners: [
      (ra - 0.45, dec - 0.43),
      (ra + 0.45, dec - 0.43),
      (ra + 0.45, dec + 0.43),
      (ra - 0.45, dec + 0.43),
    ],
  }
}

fn sample(desg: &str, jd: f64, ra: f64, dec: f64) -> EphemerisSample {
  EphemerisSample {
    designation: desg.into(),
    jd,
    ra,
    dec,
    dra: 12.0,
    ddec: -4.0,
    vmag: Some(17.5),
    retrieved: Utc::now(),
  }
}

/// Fixed positions per designation; counts every call.
#[derive(Default)]
struct FakeProvider {
  positions: HashMap<String, (f64, f64)>,
  calls:     AtomicUsize,
}

impl FakeProvider {
  fn with(objects: &[(&str, f64, f64)]) -> Self {
    Self {
      positions: objects.iter().map(|&(d, ra, dec)| (d.to_owned(), (ra, dec))).collect(),
      calls:     AtomicUsize::new(0),
    }
  }

  fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  fn lookup(&self, designation: &str) -> CoreResult<(f64, f64)> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .positions
      .get(designation)
      .copied()
      .ok_or_else(|| CoreError::EphemerisNotFound { designation: designation.to_owned() })
  }
}

impl EphemerisProvider for FakeProvider {
  async fn ephemeris_at<'a>(
    &'a self,
    designation: &'a str,
    _jd: f64,
  ) -> CoreResult<PreciseEphemeris> {
    let (ra, dec) = self.lookup(designation)?;
    Ok(PreciseEphemeris {
      ra,
      dec,
      dra: 12.0,
      ddec: -4.0,
      vmag: Some(17.5),
      rh: Some(2.5),
      rdot: Some(-1.2),
      delta: Some(1.6),
      phase: Some(11.0),
      ..Default::default()
    })
  }

  async fn ephemeris_range<'a>(
    &'a self,
    designation: &'a str,
    start: f64,
    end: f64,
    step: TimeDelta,
  ) -> CoreResult<Vec<EphemerisSample>> {
    let (ra, dec) = self.lookup(designation)?;
    let step = step.num_seconds() as f64 / 86_400.0;
    let n = ((end - start) / step).floor() as usize;
    Ok((0..=n).map(|i| sample(designation, start + i as f64 * step, ra, dec)).collect())
  }
}

struct FakeSource {
  exposures: Vec<Exposure>,
  window:    Mutex<Option<(NaiveDateTime, NaiveDateTime)>>,
}

impl ExposureSource for FakeSource {
  async fn exposures_between(
    &self,
    after: NaiveDateTime,
    before: NaiveDateTime,
  ) -> CoreResult<Vec<Exposure>> {
    *self.window.lock().unwrap() = Some((after, before));
    Ok(self.exposures.clone())
  }
}

/// An exposure service that is down.
struct UnavailableSource;

impl ExposureSource for UnavailableSource {
  async fn exposures_between(
    &self,
    _after: NaiveDateTime,
    _before: NaiveDateTime,
  ) -> CoreResult<Vec<Exposure>> {
    Err(CoreError::ExposureService("503 Service Unavailable".into()))
  }
}

/// Serves the URL as the file body, failing URLs containing `fail_on`.
struct FakeArchive {
  fail_on: &'static str,
}

impl ImageArchive for FakeArchive {
  async fn fetch<'a>(&'a self, url: &'a str) -> CoreResult<Vec<u8>> {
    if url.contains(self.fail_on) {
      return Err(CoreError::Download { url: url.to_owned(), message: "404".into() });
    }
    Ok(url.as_bytes().to_vec())
  }
}

// ─── Matcher: per-object verdicts ────────────────────────────────────────────

#[tokio::test]
async fn coarse_filter_short_circuits() {
  let s = store().await;
  let ra = 0.15_f64.to_degrees();
  let provider = FakeProvider::with(&[("2P", ra, 0.0)]);
  // The only exposure sits right on the object and would accept it.
  let exposures = [exposure(1, epoch(), ra, 0.0)];

  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());
  let verdict = matcher
    .consider("2P", Some((0.15, 0.0)), (0.0, 0.0), &exposures)
    .await
    .unwrap();
  assert_eq!(verdict, Verdict::CoarseReject);
  assert_eq!(provider.calls(), 0);

  let wide = SearchConfig { coarse_radius: 0.2, ..Default::default() };
  let matcher = FovMatcher::new(&s, &provider, wide);
  let verdict = matcher
    .consider("2P", Some((0.15, 0.0)), (0.0, 0.0), &exposures)
    .await
    .unwrap();
  assert!(matches!(verdict, Verdict::Accepted(ref d) if d.pid == 1));
  assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn masked_epoch_is_skipped() {
  let s = store().await;
  let provider = FakeProvider::default();
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());

  let verdict = matcher.consider("2P", None, (0.0, 0.0), &[]).await.unwrap();
  assert_eq!(verdict, Verdict::Masked);
  assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn fine_filter_rejects_between_exposures() {
  let s = store().await;
  let provider = FakeProvider::with(&[("2P", 0.0, 0.0)]);
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());
  // Two exposures 0.05 rad either side of the object.
  let offset = 0.05_f64.to_degrees();
  let exposures = [exposure(1, epoch(), offset, 0.0), exposure(2, epoch(), 360.0 - offset, 0.0)];

  let verdict = matcher
    .consider("2P", Some((0.0, 0.0)), (0.0, 0.0), &exposures)
    .await
    .unwrap();
  assert_eq!(verdict, Verdict::FineReject);
  assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn footprint_test_rejects_off_detector() {
  let s = store().await;
  // 0.6° east of the exposure centre: near enough for the fine filter,
  // beyond the detector edge.
  let ra = 150.0 + 0.6 / 20f64.to_radians().cos();
  let provider = FakeProvider::with(&[("2P", ra, 20.0)]);
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());
  let exposures = [exposure(1, epoch(), 150.0, 20.0)];

  let position = (ra.to_radians(), 20f64.to_radians());
  let verdict = matcher
    .consider("2P", Some(position), position, &exposures)
    .await
    .unwrap();
  assert_eq!(verdict, Verdict::FootprintReject);
  assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn provider_failure_rejects_the_pair() {
  let s = store().await;
  let provider = FakeProvider::default();
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());
  let e = exposure(1, epoch(), 150.0, 20.0);

  let found = matcher.footprint_test("2P", &e).await.unwrap();
  assert!(found.is_none());
  assert_eq!(provider.calls(), 1);
}

// ─── Matcher: full search ────────────────────────────────────────────────────

/// One night, two side-by-side exposures at one epoch, and two objects:
/// 2P inside exposure 1 only and 9P far from the field.
async fn seeded() -> (SqliteStore, FakeProvider) {
  let s = store().await;
  let jd = epoch();
  s.upsert_night(
    date("2018-03-01"),
    vec![exposure(1, jd, 150.0, 20.0), exposure(2, jd, 150.9, 20.0)],
  )
  .await
  .unwrap();

  for (desg, ra, dec) in [("2P", 150.1, 20.05), ("9P", 200.0, -10.0)] {
    let samples = vec![sample(desg, jd - 0.25, ra, dec), sample(desg, jd + 0.25, ra, dec)];
    s.refresh_ephemeris(desg.into(), jd - 1.0, jd + 1.0, samples)
      .await
      .unwrap();
  }

  let provider = FakeProvider::with(&[("2P", 150.1, 20.05), ("9P", 200.0, -10.0)]);
  (s, provider)
}

#[tokio::test]
async fn search_finds_object_in_one_exposure() {
  let (s, provider) = seeded().await;
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());

  let summary = matcher
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  assert_eq!(summary.epochs, 1);
  assert_eq!(summary.objects, 2);
  assert_eq!(summary.found, [("2P".to_owned(), 1)]);
  // 9P never reached the footprint test.
  assert_eq!(provider.calls(), 1);

  let found = s.detections(None).await.unwrap();
  assert_eq!(found.len(), 1);
  let d = &found[0];
  assert_eq!(d.record.designation, "2P");
  assert_eq!(d.record.pid, 1);
  assert_eq!(d.record.obs_jd, epoch());
  assert_eq!(d.record.ephemeris.rh, Some(2.5));
  assert!((0..=3072).contains(&d.record.x));
  assert!((0..=3080).contains(&d.record.y));
}

#[tokio::test]
async fn repeated_search_does_not_duplicate() {
  let (s, provider) = seeded().await;
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());

  for _ in 0..2 {
    matcher
      .search(date("2018-03-01"), date("2018-03-01"), None)
      .await
      .unwrap();
  }
  assert_eq!(s.detections(None).await.unwrap().len(), 1);
}

/// One night with exposure 1 at `epoch()` and `second` about 14 minutes
/// later, both centred near 2P.
async fn two_epochs(second: Exposure) -> (SqliteStore, FakeProvider) {
  let s = store().await;
  let jd = epoch();
  s.upsert_night(date("2018-03-01"), vec![exposure(1, jd, 150.0, 20.0), second])
    .await
    .unwrap();
  s.refresh_ephemeris("2P".into(), jd - 1.0, jd + 1.0, vec![
    sample("2P", jd - 0.25, 150.1, 20.05),
    sample("2P", jd + 0.25, 150.1, 20.05),
  ])
  .await
  .unwrap();
  (s, FakeProvider::with(&[("2P", 150.1, 20.05)]))
}

#[tokio::test]
async fn counts_accumulate_across_epochs() {
  let (s, provider) = two_epochs(exposure(3, epoch() + 0.01, 150.0, 20.0)).await;

  let summary = FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  assert_eq!(summary.epochs, 2);
  assert_eq!(summary.found, [("2P".to_owned(), 2)]);
  assert_eq!(summary.total(), 2);

  let pids: Vec<_> = s
    .detections(None)
    .await
    .unwrap()
    .into_iter()
    .map(|d| d.record.pid)
    .collect();
  assert_eq!(pids, [1, 3]);
}

#[tokio::test]
async fn earlier_epochs_survive_a_failed_epoch() {
  let mut broken = exposure(3, epoch() + 0.01, 150.0, 20.0);
  broken.wcs.cd = [[0.0, 0.0], [0.0, 0.0]];
  let (s, provider) = two_epochs(broken).await;

  let result = FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await;
  assert!(matches!(result, Err(Error::Core(CoreError::SingularWcs(_)))));

  let found = s.detections(None).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].record.pid, 1);
  assert_eq!(found[0].record.obs_jd, epoch());
}

#[tokio::test]
async fn search_limited_to_named_objects() {
  let (s, provider) = seeded().await;
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());

  let summary = matcher
    .search(date("2018-03-01"), date("2018-03-01"), Some(vec!["9P".into()]))
    .await
    .unwrap();
  assert_eq!(summary.objects, 1);
  assert!(summary.found.is_empty());
  assert_eq!(summary.total(), 0);
  assert!(s.detections(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_skips_sparse_ephemeris() {
  let s = store().await;
  let jd = epoch();
  s.upsert_night(date("2018-03-01"), vec![exposure(1, jd, 150.0, 20.0)])
    .await
    .unwrap();
  // Samples 1.5 days apart bracket the epoch but are not trusted.
  s.refresh_ephemeris(
    "2P".into(),
    jd - 1.0,
    jd + 1.0,
    vec![sample("2P", jd - 0.75, 150.0, 20.0), sample("2P", jd + 0.75, 150.0, 20.0)],
  )
  .await
  .unwrap();
  let provider = FakeProvider::with(&[("2P", 150.0, 20.0)]);

  let summary = FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  assert!(summary.found.is_empty());
  assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn empty_range_is_an_error() {
  let (s, provider) = seeded().await;
  let matcher = FovMatcher::new(&s, &provider, SearchConfig::default());

  let result = matcher
    .search(date("2019-01-01"), date("2019-01-02"), None)
    .await;
  assert!(matches!(result, Err(Error::EmptyRange { .. })));
}

#[tokio::test]
async fn summary_uses_natural_order() {
  let s = store().await;
  let jd = epoch();
  s.upsert_night(date("2018-03-01"), vec![exposure(1, jd, 150.0, 20.0)])
    .await
    .unwrap();
  for desg in ["101P", "9P"] {
    s.refresh_ephemeris(desg.into(), jd - 1.0, jd + 1.0, vec![
      sample(desg, jd - 0.1, 150.0, 20.0),
      sample(desg, jd + 0.1, 150.0, 20.0),
    ])
    .await
    .unwrap();
  }
  let provider = FakeProvider::with(&[("101P", 150.0, 20.0), ("9P", 150.01, 20.0)]);

  let summary = FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  let names: Vec<_> = summary.found.iter().map(|(d, _)| d.as_str()).collect();
  assert_eq!(names, ["9P", "101P"]);
  assert_eq!(summary.to_string().lines().next(), Some("Found 2 objects."));
}

// ─── Offline provider ────────────────────────────────────────────────────────

#[tokio::test]
async fn stored_ephemeris_interpolates() {
  let s = store().await;
  s.refresh_ephemeris("2P".into(), 0.0, 10.0, vec![
    sample("2P", 5.0, 10.0, 1.0),
    sample("2P", 5.5, 11.0, 1.0),
  ])
  .await
  .unwrap();
  let provider = StoredEphemeris::new(s);

  let exact = provider.ephemeris_at("2P", 5.0).await.unwrap();
  assert_eq!((exact.ra, exact.dec), (10.0, 1.0));
  assert_eq!(exact.vmag, Some(17.5));
  assert_eq!(exact.rh, None);

  let mid = provider.ephemeris_at("2P", 5.25).await.unwrap();
  assert!((mid.ra - 10.5).abs() < 1e-3, "ra {}", mid.ra);

  let missing = provider.ephemeris_at("2P", 8.0).await;
  assert!(matches!(missing, Err(CoreError::EphemerisNotFound { .. })));

  let range = provider
    .ephemeris_range("2P", 5.0, 5.5, TimeDelta::hours(6))
    .await
    .unwrap();
  assert_eq!(range.iter().map(|e| e.jd).collect::<Vec<_>>(), [5.0, 5.25, 5.5]);
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn night_ingestion_uses_the_noon_window() {
  let s = store().await;
  let source = FakeSource {
    exposures: vec![exposure(1, epoch(), 150.0, 20.0), exposure(2, epoch(), 151.0, 20.0)],
    window:    Mutex::new(None),
  };

  let night = update_night(&s, &source, date("2018-03-01")).await.unwrap();
  assert_eq!(night.nframes, 2);
  assert_eq!(*source.window.lock().unwrap(), Some(night_window(date("2018-03-01"))));
  assert_eq!(s.exposures_between(0.0, 1e7).await.unwrap().len(), 2);

  let empty = FakeSource { exposures: vec![], window: Mutex::new(None) };
  let night = update_night(&s, &empty, date("2018-03-02")).await.unwrap();
  assert_eq!(night.nframes, 0);
}

#[tokio::test]
async fn night_ingestion_surfaces_service_failure() {
  let s = store().await;

  let result = update_night(&s, &UnavailableSource, date("2018-03-01")).await;
  assert!(matches!(result, Err(Error::Core(CoreError::ExposureService(_)))));
  // A failed query is not an empty night.
  assert!(s.night(date("2018-03-01")).await.unwrap().is_none());
}

#[tokio::test]
async fn ephemeris_refresh_skips_current_and_failing_objects() {
  let s = store().await;
  let provider = FakeProvider::with(&[("2P", 10.0, 1.0)]);
  let objects = vec!["2P".to_owned(), "unknown".to_owned()];
  let (start, end) = (date("2018-03-01"), date("2018-03-02"));

  let n = update_ephemeris(&s, &provider, &objects, start, end, TimeDelta::hours(6), false)
    .await
    .unwrap();
  assert_eq!(n, 1);
  let stored = s.available_objects().await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].samples, 5);

  // Already present: only the unknown object is asked for.
  let calls = provider.calls();
  let n = update_ephemeris(&s, &provider, &objects, start, end, TimeDelta::hours(6), false)
    .await
    .unwrap();
  assert_eq!(n, 0);
  assert_eq!(provider.calls(), calls + 1);

  let n = update_ephemeris(&s, &provider, &objects, start, end, TimeDelta::hours(12), true)
    .await
    .unwrap();
  assert_eq!(n, 1);
  assert_eq!(s.available_objects().await.unwrap()[0].samples, 3);
}

#[tokio::test]
async fn sparse_ephemeris_is_refetched() {
  let s = store().await;
  let provider = FakeProvider::with(&[("2P", 10.0, 1.0)]);
  let (start, end) = (date("2018-03-01"), date("2018-03-02"));
  let (jd0, jd1) = (jd_from_date(start), jd_from_date(end));
  s.refresh_ephemeris("2P".into(), jd0, jd1, vec![
    sample("2P", jd0, 10.0, 1.0),
    sample("2P", jd1, 10.0, 1.0),
  ])
  .await
  .unwrap();

  // Two samples are too few to count as current.
  let objects = ["2P".to_owned()];
  let n = update_ephemeris(&s, &provider, &objects, start, end, TimeDelta::hours(6), false)
    .await
    .unwrap();
  assert_eq!(n, 1);
  assert_eq!(s.count_ephemeris("2P".into(), jd0, jd1).await.unwrap(), 5);
}

// ─── Artifacts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_downloads_cutouts_once() {
  let (s, provider) = seeded().await;
  FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  let dir = tempfile::tempdir().unwrap();
  let archive = FakeArchive { fail_on: "mskimg" };

  let summary = sync_artifacts(&s, &archive, dir.path()).await.unwrap();
  assert_eq!(summary.downloaded, 1);
  assert_eq!(summary.failed, 0);

  let d = s.detection("2P".into(), 1).await.unwrap().unwrap();
  let file = d.artifacts.archive_file.clone().unwrap();
  assert_eq!(file, "2p/2p-20180301_063000-pre2.500-ztf.fits");
  assert!(d.artifacts.sciimg);
  assert!(!d.artifacts.mskimg);
  assert!(d.artifacts.scipsf);
  assert!(d.artifacts.sci_sync_date.is_some());

  let body = std::fs::read_to_string(dir.path().join(&file)).unwrap();
  assert!(body.contains("sciimg.fits?center="));
  assert!(!dir.path().join("2p/2p-20180301_063000-pre2.500-ztf-mask.fits").exists());
  assert!(dir.path().join("2p/2p-20180301_063000-pre2.500-ztf-psf.fits").exists());

  let again = sync_artifacts(&s, &archive, dir.path()).await.unwrap();
  assert_eq!(again.downloaded, 0);
}

#[tokio::test]
async fn failed_science_download_leaves_nothing() {
  let (s, provider) = seeded().await;
  FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  let dir = tempfile::tempdir().unwrap();

  let summary = sync_artifacts(&s, &FakeArchive { fail_on: "ztf" }, dir.path())
    .await
    .unwrap();
  assert_eq!(summary, crate::artifacts::SyncSummary { downloaded: 0, failed: 1 });

  let d = s.detection("2P".into(), 1).await.unwrap().unwrap();
  assert_eq!(d.artifacts, ArtifactState::default());
  let name = cutout_file(&d);
  assert!(!dir.path().join(name).exists());
}

#[tokio::test]
async fn unwritable_destination_is_skipped() {
  let (s, provider) = seeded().await;
  FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  let dir = tempfile::tempdir().unwrap();
  // A plain file where the object's directory should go.
  std::fs::write(dir.path().join("2p"), b"in the way").unwrap();

  let summary = sync_artifacts(&s, &FakeArchive { fail_on: "mskimg" }, dir.path())
    .await
    .unwrap();
  assert_eq!(summary, crate::artifacts::SyncSummary { downloaded: 0, failed: 1 });

  let d = s.detection("2P".into(), 1).await.unwrap().unwrap();
  assert_eq!(d.artifacts, ArtifactState::default());
}

#[tokio::test]
async fn purge_removes_logged_files() {
  let (s, provider) = seeded().await;
  FovMatcher::new(&s, &provider, SearchConfig::default())
    .search(date("2018-03-01"), date("2018-03-01"), None)
    .await
    .unwrap();
  let cutouts = tempfile::tempdir().unwrap();
  let stacks = tempfile::tempdir().unwrap();

  sync_artifacts(&s, &FakeArchive { fail_on: "mskimg" }, cutouts.path())
    .await
    .unwrap();
  let d = s.detection("2P".into(), 1).await.unwrap().unwrap();
  std::fs::write(stacks.path().join("2p-stack.fits"), b"stack").unwrap();
  s.record_stack(Stack {
    found_id:   d.found_id,
    stack_file: Some("2p-stack.fits".into()),
    stacked:    true,
  })
  .await
  .unwrap();

  s.delete_detections(vec!["2P".into()], JdRange::all()).await.unwrap();
  assert_eq!(s.stale_files().await.unwrap().len(), 2);

  // Science cutout, PSF and stack; the mask never existed.
  let removed = purge_stale_files(&s, cutouts.path(), stacks.path()).await.unwrap();
  assert_eq!(removed, 3);
  assert!(s.stale_files().await.unwrap().is_empty());
  let cutout = cutouts.path().join(d.artifacts.archive_file.unwrap());
  assert!(!cutout.exists());
  assert!(!stacks.path().join("2p-stack.fits").exists());

  // A second pass over an empty log is a no-op.
  assert_eq!(purge_stale_files(&s, cutouts.path(), stacks.path()).await.unwrap(), 0);
}
