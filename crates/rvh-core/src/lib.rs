//! Core review model, fingerprinting, and the deduplicated review set for RVH.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use sha2::{Digest, Sha256};

pub const CRATE_NAME: &str = "rvh-core";

/// Lowercase hex SHA-256 of `bytes`. Shared by cache keys and fingerprints.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonical review, independent of which embedded-data shape it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub author: String,
    /// Kept as a JSON number so `5` and `4.5` render the way the source wrote them.
    pub rating: Number,
    pub text: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl ReviewRecord {
    pub fn rating_text(&self) -> String {
        self.rating.to_string()
    }
}

/// Dedup key for a [`ReviewRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewFingerprint(String);

impl ReviewFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which record fields feed the fingerprint.
///
/// `Content` hashes `author`, `rating` and `text` only, so reviews that differ
/// only by date collapse into one entry. `ContentAndDate` keeps them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintPolicy {
    #[default]
    Content,
    ContentAndDate,
}

impl FingerprintPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "content" => Some(Self::Content),
            "content-and-date" | "content_and_date" => Some(Self::ContentAndDate),
            _ => None,
        }
    }

    pub fn fingerprint(&self, record: &ReviewRecord) -> ReviewFingerprint {
        let rating = record.rating_text();
        let mut parts = vec![record.author.as_str(), rating.as_str(), record.text.as_str()];
        if *self == Self::ContentAndDate {
            parts.push(record.date.as_str());
        }
        ReviewFingerprint(sha256_hex(parts.join("\t").as_bytes()))
    }
}

/// Fingerprint-keyed reviews in first-insertion order.
///
/// Re-inserting an existing fingerprint replaces the record but keeps its slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewSet {
    entries: IndexMap<ReviewFingerprint, ReviewRecord>,
}

impl ReviewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the fingerprint was not present before.
    pub fn insert(&mut self, fingerprint: ReviewFingerprint, record: ReviewRecord) -> bool {
        self.entries.insert(fingerprint, record).is_none()
    }

    pub fn insert_record(&mut self, policy: FingerprintPolicy, record: ReviewRecord) -> bool {
        let fingerprint = policy.fingerprint(&record);
        self.insert(fingerprint, record)
    }

    /// Merges `other` into `self`, returning how many fingerprints were new.
    pub fn merge(&mut self, other: ReviewSet) -> usize {
        other
            .entries
            .into_iter()
            .map(|(fingerprint, record)| self.insert(fingerprint, record))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &ReviewFingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &ReviewFingerprint) -> Option<&ReviewRecord> {
        self.entries.get(fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReviewFingerprint, &ReviewRecord)> {
        self.entries.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &ReviewRecord> {
        self.entries.values()
    }
}

impl<'a> IntoIterator for &'a ReviewSet {
    type Item = (&'a ReviewFingerprint, &'a ReviewRecord);
    type IntoIter = indexmap::map::Iter<'a, ReviewFingerprint, ReviewRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
