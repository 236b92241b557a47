//! Embedded JSON block discovery and review-shape classification.

use rvh_core::{FingerprintPolicy, ReviewSet};
use rvh_storage::PageSource;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::normalize::{normalize, FeedReview, LocalBusinessReview, RawReview};
use crate::AdapterError;

const LOCAL_BUSINESS_TYPE: &str = "LocalBusiness";
const REVIEW_FEED_POINTER: &str = "/bizDetailsPageProps/reviewFeedQueryProps";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBusinessBlock {
    pub aggregate_rating: AggregateRating,
    pub review: Vec<LocalBusinessReview>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRating {
    pub review_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewFeedBlock {
    pub pagination: Pagination,
    pub reviews: Vec<FeedReview>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_results: u64,
}

/// What a parsed JSON block turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedBlock {
    LocalBusiness(LocalBusinessBlock),
    ReviewFeed(ReviewFeedBlock),
    Unrecognized,
}

impl EmbeddedBlock {
    fn into_parts(self) -> Option<(u64, Vec<RawReview>)> {
        match self {
            Self::LocalBusiness(block) => Some((
                block.aggregate_rating.review_count,
                block.review.into_iter().map(RawReview::LocalBusiness).collect(),
            )),
            Self::ReviewFeed(block) => Some((
                block.pagination.total_results,
                block.reviews.into_iter().map(RawReview::Feed).collect(),
            )),
            Self::Unrecognized => None,
        }
    }
}

/// A block carried a known shape's markers but not its fields.
#[derive(Debug)]
pub struct ShapeMismatch {
    pub shape: &'static str,
    pub source: serde_json::Error,
}

/// Decide which known shape `value` is, if any.
pub fn classify_block(value: JsonValue) -> Result<EmbeddedBlock, ShapeMismatch> {
    let is_local_business = value.get("@type").and_then(JsonValue::as_str)
        == Some(LOCAL_BUSINESS_TYPE)
        && value.get("review").is_some();

    if is_local_business {
        return serde_json::from_value(value)
            .map(EmbeddedBlock::LocalBusiness)
            .map_err(|source| ShapeMismatch {
                shape: "local-business",
                source,
            });
    }

    if let Some(feed) = value.pointer(REVIEW_FEED_POINTER) {
        return serde_json::from_value(feed.clone())
            .map(EmbeddedBlock::ReviewFeed)
            .map_err(|source| ShapeMismatch {
                shape: "review-feed",
                source,
            });
    }

    Ok(EmbeddedBlock::Unrecognized)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiningDiagnostics {
    pub json_blocks: usize,
    pub unparsable_blocks: usize,
    pub unrecognized_blocks: usize,
    pub mismatched_blocks: usize,
    pub rejected_entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub reviews: ReviewSet,
    /// Largest review total any recognized block on the page claimed.
    pub reported_total: u64,
    pub diagnostics: MiningDiagnostics,
}

/// Bodies of every `<script>` whose `type` ends in `json`.
pub fn json_script_bodies(document: &Html) -> Result<Vec<String>, AdapterError> {
    let sel = Selector::parse("script[type]").map_err(|e| AdapterError::Message(e.to_string()))?;
    Ok(document
        .select(&sel)
        .filter(|node| {
            node.value()
                .attr("type")
                .is_some_and(|kind| kind.ends_with("json"))
        })
        .map(|node| node.text().collect::<String>())
        .collect())
}

fn strip_comment_wrapper(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("<!--") {
        Some(inner) => inner.strip_suffix("-->").unwrap_or(inner),
        None => trimmed,
    }
}

pub fn extract_reviews(html: &str, policy: FingerprintPolicy) -> Result<PageExtraction, AdapterError> {
    let document = Html::parse_document(html);
    let mut extraction = PageExtraction::default();

    for body in json_script_bodies(&document)? {
        extraction.diagnostics.json_blocks += 1;

        let value: JsonValue = match serde_json::from_str(strip_comment_wrapper(&body)) {
            Ok(value) => value,
            Err(err) => {
                extraction.diagnostics.unparsable_blocks += 1;
                debug!(error = %err, "skipping unparsable json block");
                continue;
            }
        };

        let block = match classify_block(value) {
            Ok(block) => block,
            Err(mismatch) => {
                extraction.diagnostics.mismatched_blocks += 1;
                warn!(shape = mismatch.shape, error = %mismatch.source, "review block missing expected fields");
                continue;
            }
        };

        let Some((reported_total, entries)) = block.into_parts() else {
            extraction.diagnostics.unrecognized_blocks += 1;
            continue;
        };

        extraction.reported_total = extraction.reported_total.max(reported_total);
        for entry in entries {
            match normalize(entry) {
                Ok(record) => {
                    extraction.reviews.insert_record(policy, record);
                }
                Err(err) => {
                    extraction.diagnostics.rejected_entries += 1;
                    warn!(error = %err, "rejecting review entry");
                }
            }
        }
    }

    Ok(extraction)
}

pub async fn mine_page<S>(
    source: &S,
    url: &str,
    policy: FingerprintPolicy,
) -> Result<PageExtraction, AdapterError>
where
    S: PageSource + ?Sized,
{
    let html = source.fetch(url).await?;
    let extraction = extract_reviews(&html, policy)?;
    debug!(
        url,
        reviews = extraction.reviews.len(),
        reported_total = extraction.reported_total,
        diagnostics = ?extraction.diagnostics,
        "mined page"
    );
    Ok(extraction)
}
