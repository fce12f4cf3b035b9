//! TTL Policy Table
//!
//! Maps request-kind tags to time-to-live durations: cheap, volatile results
//! get short TTLs, expensive and stable results get long ones. The table is
//! static configuration, not learned.

use std::collections::HashMap;
use std::time::Duration;

/// Request-kind → TTL table with a default for unrecognized kinds
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    by_kind: HashMap<String, Duration>,
}

impl TtlPolicy {
    /// Create an empty table where every kind falls back to `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            by_kind: HashMap::new(),
        }
    }

    /// Register a TTL for one request kind
    pub fn with_kind(mut self, kind: impl Into<String>, ttl: Duration) -> Self {
        self.by_kind.insert(kind.into(), ttl);
        self
    }

    /// TTL for a request kind, or the default for unrecognized kinds
    pub fn ttl_for(&self, kind: &str) -> Duration {
        self.by_kind.get(kind).copied().unwrap_or(self.default_ttl)
    }

    /// Default TTL for unrecognized kinds
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Every explicitly registered kind
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.by_kind.keys().map(String::as_str)
    }

    /// Table tuned for website-analysis workloads.
    ///
    /// TTLs reflect the recomputation-cost/staleness tradeoff: link
    /// extraction is cheap and volatile, LLM-backed analysis is expensive
    /// and stable.
    pub fn analysis_defaults() -> Self {
        Self::new(Duration::from_secs(3600))
            .with_kind("full_analysis", Duration::from_secs(7200))
            .with_kind("professional_diagnostics", Duration::from_secs(3600))
            .with_kind("pagespeed_results", Duration::from_secs(1800))
            .with_kind("llm_analysis", Duration::from_secs(14_400))
            .with_kind("basic_seo", Duration::from_secs(1800))
            .with_kind("links_extraction", Duration::from_secs(900))
            .with_kind("content_analysis", Duration::from_secs(1800))
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::analysis_defaults()
    }
}

// =============================================================================
// Tests
// =============================================================================
