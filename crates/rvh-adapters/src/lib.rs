//! Review extraction from business listing pages: block mining + record normalization.

pub mod miner;
pub mod normalize;

use rvh_storage::FetchError;
use thiserror::Error;

pub use miner::{
    classify_block, extract_reviews, mine_page, EmbeddedBlock, MiningDiagnostics, PageExtraction,
};
pub use normalize::{clean_text, flip_local_date, normalize, NormalizeError, RawReview};

pub const CRATE_NAME: &str = "rvh-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
