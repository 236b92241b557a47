use std::path::PathBuf;

use rvh_core::FingerprintPolicy;

pub const DEFAULT_TARGET_URL: &str =
    "https://www.yelp.com/biz/pike-s-surf-and-sk8-school-santa-barbara";
pub const MAX_NO_NEW_REVIEWS: usize = 3;
pub const PAGE_SIZE: u64 = 10;
pub const PAGINATION_PARAM: &str = "start";

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub target_url: String,
    pub out_path: PathBuf,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub max_no_new_reviews: usize,
    pub fingerprint_policy: FingerprintPolicy,
    pub user_agent: String,
    pub http_timeout_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            out_path: PathBuf::from("./reviews.json"),
            cache_enabled: true,
            cache_dir: PathBuf::from("./debug-cache"),
            max_no_new_reviews: MAX_NO_NEW_REVIEWS,
            fingerprint_policy: FingerprintPolicy::Content,
            user_agent: "rvh-bot/0.1".to_string(),
            http_timeout_secs: 20,
        }
    }
}

impl HarvestConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            target_url: lookup("RVH_TARGET_URL").unwrap_or(defaults.target_url),
            out_path: lookup("RVH_OUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.out_path),
            cache_enabled: lookup("RVH_CACHE_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(defaults.cache_enabled),
            cache_dir: lookup("RVH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            max_no_new_reviews: lookup("RVH_MAX_NO_NEW_REVIEWS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_no_new_reviews),
            fingerprint_policy: lookup("RVH_FINGERPRINT")
                .and_then(|v| FingerprintPolicy::parse(&v))
                .unwrap_or(defaults.fingerprint_policy),
            user_agent: lookup("RVH_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: lookup("RVH_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = HarvestConfig::from_lookup(|_| None);
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
        assert!(config.cache_enabled);
        assert_eq!(config.max_no_new_reviews, 3);
        assert_eq!(config.fingerprint_policy, FingerprintPolicy::Content);
    }

    #[test]
    fn lookup_overrides_and_ignores_garbage() {
        let vars = HashMap::from([
            ("RVH_TARGET_URL", "https://example.test/biz/x"),
            ("RVH_CACHE_ENABLED", "0"),
            ("RVH_MAX_NO_NEW_REVIEWS", "five"),
            ("RVH_FINGERPRINT", "content-and-date"),
            ("RVH_OUT_PATH", "/tmp/out.json"),
        ]);
        let config = HarvestConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.target_url, "https://example.test/biz/x");
        assert!(!config.cache_enabled);
        assert_eq!(config.max_no_new_reviews, MAX_NO_NEW_REVIEWS);
        assert_eq!(config.fingerprint_policy, FingerprintPolicy::ContentAndDate);
        assert_eq!(config.out_path, PathBuf::from("/tmp/out.json"));
    }
}
