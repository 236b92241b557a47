//! Paginated review harvesting with the target-count / no-growth dual stop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rvh_adapters::mine_page;
use rvh_core::{FingerprintPolicy, ReviewSet};
use rvh_storage::PageSource;
use tracing::{info, info_span, Instrument};
use url::Url;
use uuid::Uuid;

use crate::config::{HarvestConfig, MAX_NO_NEW_REVIEWS, PAGE_SIZE, PAGINATION_PARAM};

#[derive(Debug, Clone)]
pub struct HarvestPolicy {
    pub max_no_new_reviews: usize,
    pub page_size: u64,
    pub pagination_param: String,
    pub fingerprint: FingerprintPolicy,
}

impl Default for HarvestPolicy {
    fn default() -> Self {
        Self {
            max_no_new_reviews: MAX_NO_NEW_REVIEWS,
            page_size: PAGE_SIZE,
            pagination_param: PAGINATION_PARAM.to_string(),
            fingerprint: FingerprintPolicy::Content,
        }
    }
}

impl From<&HarvestConfig> for HarvestPolicy {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            max_no_new_reviews: config.max_no_new_reviews,
            fingerprint: config.fingerprint_policy,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The set reached the site's reported total.
    TargetReached,
    /// Too many consecutive pages added nothing.
    NoGrowth,
}

#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reviews: ReviewSet,
    pub reported_total: u64,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

/// Append the pagination offset to `base` as a query parameter.
pub fn page_url(base: &Url, param: &str, offset: u64) -> String {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair(param, &offset.to_string());
    url.to_string()
}

pub struct Harvester<S> {
    source: S,
    policy: HarvestPolicy,
}

impl<S: PageSource> Harvester<S> {
    pub fn new(source: S, policy: HarvestPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn run(&self, base_url: &str) -> Result<HarvestOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("harvest", %run_id, base_url);
        self.run_inner(run_id, base_url).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, base_url: &str) -> Result<HarvestOutcome> {
        let started_at = Utc::now();
        let base = Url::parse(base_url).with_context(|| format!("invalid target url {base_url}"))?;
        let fingerprint = self.policy.fingerprint;

        let first = mine_page(&self.source, base_url, fingerprint)
            .await
            .with_context(|| format!("mining {base_url}"))?;
        let mut reviews = first.reviews;
        let mut reported_total = first.reported_total;
        let mut pages_fetched = 1usize;
        let mut page_index = 1u64;
        let mut no_growth_streak = 0usize;
        info!(reviews = reviews.len(), reported_total, "mined first page");

        while (reviews.len() as u64) < reported_total
            && no_growth_streak < self.policy.max_no_new_reviews
        {
            let url = page_url(
                &base,
                &self.policy.pagination_param,
                page_index * self.policy.page_size,
            );
            page_index += 1;

            let page = mine_page(&self.source, &url, fingerprint)
                .await
                .with_context(|| format!("mining {url}"))?;
            pages_fetched += 1;
            reported_total = reported_total.max(page.reported_total);

            let added = reviews.merge(page.reviews);
            if added == 0 {
                no_growth_streak += 1;
            } else {
                no_growth_streak = 0;
            }
            info!(
                url = %url,
                added,
                reviews = reviews.len(),
                reported_total,
                no_growth_streak,
                "merged page"
            );
        }

        let stop_reason = if (reviews.len() as u64) >= reported_total {
            StopReason::TargetReached
        } else {
            StopReason::NoGrowth
        };
        info!(
            reviews = reviews.len(),
            reported_total,
            pages_fetched,
            ?stop_reason,
            "harvest finished"
        );

        Ok(HarvestOutcome {
            run_id,
            started_at,
            finished_at: Utc::now(),
            reviews,
            reported_total,
            pages_fetched,
            stop_reason,
        })
    }
}
