//! Harvest orchestration: paginated mining, dedup accumulation, snapshot + TSV output.

pub mod config;
pub mod harvest;
pub mod output;

use std::time::Duration;

use anyhow::Result;
use rvh_storage::{CachingFetcher, HttpClientConfig, HttpFetcher, PageCache};
use tracing::info;

pub use config::HarvestConfig;
pub use harvest::{page_url, HarvestOutcome, HarvestPolicy, Harvester, StopReason};
pub use output::{read_snapshot, render_tsv, write_snapshot};

pub const CRATE_NAME: &str = "rvh-sync";

/// Network fetcher wrapped in the page cache, as configured.
pub fn build_fetcher(config: &HarvestConfig) -> Result<CachingFetcher<HttpFetcher>> {
    let http = HttpFetcher::new(HttpClientConfig {
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: Some(config.user_agent.clone()),
    })?;
    Ok(CachingFetcher::new(
        http,
        PageCache::new(config.cache_dir.clone()),
        config.cache_enabled,
    ))
}

/// Harvest `config.target_url` and persist the snapshot. Nothing is written on failure.
pub async fn run_harvest(config: &HarvestConfig) -> Result<HarvestOutcome> {
    let harvester = Harvester::new(build_fetcher(config)?, HarvestPolicy::from(config));
    let outcome = harvester.run(&config.target_url).await?;
    write_snapshot(&config.out_path, &outcome.reviews).await?;
    info!(
        run_id = %outcome.run_id,
        path = %config.out_path.display(),
        reviews = outcome.reviews.len(),
        elapsed_ms = (outcome.finished_at - outcome.started_at).num_milliseconds(),
        "snapshot written"
    );
    Ok(outcome)
}

pub async fn run_harvest_from_env() -> Result<HarvestOutcome> {
    run_harvest(&HarvestConfig::from_env()).await
}
