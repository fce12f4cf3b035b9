//! Process-Wide Shared Cache
//!
//! A lazily-initialized cache of JSON payloads for callers that want one
//! instance across the whole process, plus free-function conveniences over
//! it. Libraries embedding their own [`ResultCache`] never need this module.

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::cache::{CacheConfig, ResultCache};
use crate::error::Result;
use crate::key::Params;
use crate::stats::StatsSnapshot;

static SHARED: OnceCell<ResultCache<Value>> = OnceCell::new();

/// Initialize the shared instance with explicit configuration.
///
/// Only the first successful initialization (including the implicit one from
/// the convenience functions below) takes effect; later calls return the
/// existing instance.
pub fn init_with(config: CacheConfig) -> Result<&'static ResultCache<Value>> {
    SHARED.get_or_try_init(|| ResultCache::new(config))
}

/// The shared instance, built with [`CacheConfig::default`] on first use
pub fn shared() -> Result<&'static ResultCache<Value>> {
    init_with(CacheConfig::default())
}

/// Fetch a previously stored result from the shared cache
pub fn fetch(kind: &str, subject: &str, params: &Params) -> Result<Option<Value>> {
    shared()?.get(kind, subject, params)
}

/// Store a freshly computed result in the shared cache.
///
/// Returns `false` without storing anything when the payload is JSON null;
/// a null result is indistinguishable from a miss and caching it would only
/// pin a useless entry.
pub fn store(kind: &str, subject: &str, params: Params, payload: Value) -> Result<bool> {
    if payload.is_null() {
        return Ok(false);
    }
    shared()?.set(kind, subject, params, payload)?;
    Ok(true)
}

/// Invalidate shared-cache entries; see [`ResultCache::invalidate`]
pub fn invalidate(subject: Option<&str>, kind: Option<&str>) -> Result<usize> {
    Ok(shared()?.invalidate(subject, kind))
}

/// Usage statistics for the shared cache
pub fn stats() -> Result<StatsSnapshot> {
    Ok(shared()?.stats())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_payload_is_rejected_before_initialization() {
        let stored = store(
            "basic_seo",
            "https://example.com",
            Params::new(),
            Value::Null,
        )
        .unwrap();
        assert!(!stored);
    }

    #[test]
    fn test_shared_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        init_with(CacheConfig {
            cache_dir: dir.path().to_path_buf(),
            ..CacheConfig::default()
        })
        .unwrap();

        let payload = json!({"score": 91, "issues": []});
        let stored = store(
            "full_analysis",
            "https://shared.example",
            Params::new(),
            payload.clone(),
        )
        .unwrap();
        assert!(stored);

        let fetched = fetch("full_analysis", "https://shared.example", &Params::new()).unwrap();
        assert_eq!(fetched, Some(payload));

        assert!(stats().unwrap().hits >= 1);
        assert!(invalidate(Some("https://shared.example"), None).unwrap() >= 1);
    }
}
