use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rvh_core::FingerprintPolicy;
use rvh_storage::{CachingFetcher, FetchError, PageCache, PageSource};
use rvh_sync::{read_snapshot, render_tsv, write_snapshot, HarvestPolicy, Harvester, StopReason};
use tempfile::tempdir;

const BASE: &str = "https://www.yelp.com/biz/pike-s-surf-and-sk8-school-santa-barbara";

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/pike-surf")
        .canonicalize()
        .expect("fixture dir")
}

/// Maps the listing URL and its `start=` pages onto fixture files.
#[derive(Clone, Default)]
struct FixtureSource {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let file = match url.strip_prefix(BASE) {
            Some("") => "page-0.html".to_string(),
            Some(query) => match query.strip_prefix("?start=") {
                Some(offset) => format!("page-{offset}.html"),
                None => String::new(),
            },
            None => String::new(),
        };
        let path = fixture_dir().join(&file);
        std::fs::read_to_string(&path).map_err(|source| FetchError::Cache { path, source })
    }
}

const EXPECTED_TSV: &str = "Date\tUser\tRating\tText\n\
2022-08-14\tMaya P.\t5\tPike is the best teacher! My son stood up on his first wave & was hooked.\n\
2022-07-02\tChris D.\t4\tGreat lesson, cold water. Bring a hoodie for after.\n\
2021-03-05\tAlex R.\t5\tPatient and kind. Worth every penny.\n\
2020-12-31\tJordan W.\t3\tFun, but the session started late.\n";

#[tokio::test]
async fn harvests_both_shapes_across_pages() {
    let harvester = Harvester::new(FixtureSource::default(), HarvestPolicy::default());

    let outcome = harvester.run(BASE).await.expect("harvest");

    assert_eq!(outcome.reported_total, 4);
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.stop_reason, StopReason::TargetReached);
    assert_eq!(render_tsv(&outcome.reviews), EXPECTED_TSV);
}

#[tokio::test]
async fn snapshot_is_written_and_reloads_identically() {
    let dir = tempdir().expect("tempdir");
    let out_path = dir.path().join("reviews.json");
    let harvester = Harvester::new(FixtureSource::default(), HarvestPolicy::default());

    let outcome = harvester.run(BASE).await.expect("harvest");
    write_snapshot(&out_path, &outcome.reviews).await.expect("write");

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).expect("read")).expect("json");
    let object = raw.as_object().expect("top-level object");
    assert_eq!(object.len(), 4);
    for (fingerprint, record) in object {
        assert_eq!(fingerprint.len(), 64);
        for field in ["author", "rating", "text", "date"] {
            assert!(record.get(field).is_some(), "missing {field}");
        }
    }

    let reloaded = read_snapshot(&out_path).await.expect("reload");
    assert_eq!(render_tsv(&reloaded), EXPECTED_TSV);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let dir = tempdir().expect("tempdir");
    let source = FixtureSource::default();
    let calls = source.calls.clone();
    let cache = PageCache::new(dir.path().join("debug-cache"));
    let harvester = Harvester::new(
        CachingFetcher::new(source, cache.clone(), true),
        HarvestPolicy::default(),
    );

    let first = harvester.run(BASE).await.expect("first run");
    let second = harvester.run(BASE).await.expect("second run");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(render_tsv(&first.reviews), render_tsv(&second.reviews));
    assert!(cache.path_for(BASE).exists());
    assert!(cache.path_for(&format!("{BASE}?start=10")).exists());
}

#[tokio::test]
async fn date_aware_fingerprints_keep_the_same_entries_here() {
    let policy = HarvestPolicy {
        fingerprint: FingerprintPolicy::ContentAndDate,
        ..HarvestPolicy::default()
    };
    let harvester = Harvester::new(FixtureSource::default(), policy);

    let outcome = harvester.run(BASE).await.expect("harvest");
    assert_eq!(outcome.reviews.len(), 4);
}
