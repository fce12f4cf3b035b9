//! Cache Key Derivation
//!
//! Deterministic, collision-resistant keys derived from the logical request:
//! request kind, subject identifier, and a flat parameter set.
//!
//! # Design
//!
//! - Subject normalization (lowercase, trailing-slash strip) so trivially
//!   equivalent subjects converge on one key
//! - Sorted-key parameter signature (8 hex chars of SHA-256)
//! - Canonical record hashed with SHA-256, 16 hex chars kept as the key body
//! - Keys are prefixed with the request kind for human-readable debugging:
//!   `"<kind>:<hash>"`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Schema version embedded in every key.
///
/// Bumping this invalidates every previously stored key, which is the
/// intended mechanism for flushing the cache on a storage format change.
pub const SCHEMA_VERSION: &str = "2025.1";

/// Hex characters kept from the parameter signature digest
const PARAM_SIGNATURE_LEN: usize = 8;

/// Hex characters kept from the canonical record digest
const KEY_DIGEST_LEN: usize = 16;

/// Flat parameter set attached to a logical request.
///
/// `BTreeMap` keeps iteration (and therefore serialization) sorted by key,
/// which is what makes the parameter signature deterministic.
pub type Params = BTreeMap<String, ParamValue>;

/// A single request parameter: strings, booleans, and numbers only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating-point value (must be finite to be key-serializable)
    Float(f64),
    /// String value
    Str(String),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Canonical record hashed into the key body.
///
/// Field order is fixed (alphabetical) so the serialized form is stable
/// across runs and rustc versions.
#[derive(Serialize)]
struct KeyRecord<'a> {
    kind: &'a str,
    params: &'a str,
    subject: &'a str,
    version: &'a str,
}

/// An opaque, deterministic cache key: `"<kind>:<16-hex-digest>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a logical request.
    ///
    /// Pure and repeatable: identical arguments always yield identical keys,
    /// and any parameter change (with overwhelming probability) yields a
    /// different key.
    pub fn derive(kind: &str, subject: &str, params: &Params) -> Result<Self> {
        let subject = normalize_subject(subject);
        let signature = param_signature(params)?;

        let record = KeyRecord {
            kind,
            params: &signature,
            subject: &subject,
            version: SCHEMA_VERSION,
        };
        let canonical = serde_json::to_vec(&record).map_err(|e| Error::KeyDerivation {
            reason: e.to_string(),
        })?;

        let digest = hex_digest(&canonical);
        Ok(CacheKey(format!("{}:{}", kind, &digest[..KEY_DIGEST_LEN])))
    }

    /// Key as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used by the disk tier: `"<key>.cache"`
    pub fn file_name(&self) -> String {
        format!("{}.cache", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase and strip trailing path separators so `https://Example.com/`
/// and `https://example.com` map to the same key.
fn normalize_subject(subject: &str) -> String {
    subject.to_lowercase().trim_end_matches('/').to_string()
}

/// Signature over the sorted parameter set: 8 hex chars of SHA-256.
///
/// Enough to separate a caller's own parameter variants; not meant to
/// resist adversarial collisions.
fn param_signature(params: &Params) -> Result<String> {
    for (name, value) in params {
        if let ParamValue::Float(f) = value {
            if !f.is_finite() {
                return Err(Error::KeyDerivation {
                    reason: format!("parameter `{name}` is not a finite number"),
                });
            }
        }
    }

    let serialized = serde_json::to_vec(params).map_err(|e| Error::KeyDerivation {
        reason: e.to_string(),
    })?;

    let digest = hex_digest(&serialized);
    Ok(digest[..PARAM_SIGNATURE_LEN].to_string())
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_key_is_deterministic() {
        let p = params(&[("depth", ParamValue::Int(3)), ("follow", ParamValue::Bool(true))]);

        let a = CacheKey::derive("full_analysis", "https://example.com", &p).unwrap();
        let b = CacheKey::derive("full_analysis", "https://example.com", &p).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_has_kind_prefix() {
        let key = CacheKey::derive("llm_analysis", "https://example.com", &Params::new()).unwrap();
        assert!(key.as_str().starts_with("llm_analysis:"));

        let body = key.as_str().split(':').nth(1).unwrap();
        assert_eq!(body.len(), KEY_DIGEST_LEN);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_subject_normalization() {
        let p = Params::new();
        let a = CacheKey::derive("basic_seo", "https://Example.COM/", &p).unwrap();
        let b = CacheKey::derive("basic_seo", "https://example.com", &p).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_subjects_distinct_keys() {
        let p = Params::new();
        let a = CacheKey::derive("basic_seo", "https://example.com", &p).unwrap();
        let b = CacheKey::derive("basic_seo", "https://example.org", &p).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_param_change_changes_key() {
        let a = CacheKey::derive(
            "content_analysis",
            "https://example.com",
            &params(&[("lang", "en".into())]),
        )
        .unwrap();
        let b = CacheKey::derive(
            "content_analysis",
            "https://example.com",
            &params(&[("lang", "de".into())]),
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_change_changes_key() {
        let p = Params::new();
        let a = CacheKey::derive("basic_seo", "https://example.com", &p).unwrap();
        let b = CacheKey::derive("full_analysis", "https://example.com", &p).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        use assert_matches::assert_matches;

        let p = params(&[("weight", ParamValue::Float(f64::NAN))]);
        let err = CacheKey::derive("basic_seo", "https://example.com", &p).unwrap_err();
        assert_matches!(err, Error::KeyDerivation { .. });
    }

    #[test]
    fn test_file_name() {
        let key = CacheKey::derive("basic_seo", "https://example.com", &Params::new()).unwrap();
        assert!(key.file_name().ends_with(".cache"));
        assert!(key.file_name().starts_with("basic_seo:"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_param_value() -> impl Strategy<Value = ParamValue> {
            prop_oneof![
                any::<bool>().prop_map(ParamValue::Bool),
                any::<i64>().prop_map(ParamValue::Int),
                (-1.0e12f64..1.0e12).prop_map(ParamValue::Float),
                "[a-z0-9 ]{0,24}".prop_map(ParamValue::Str),
            ]
        }

        fn arb_params() -> impl Strategy<Value = Params> {
            prop::collection::btree_map("[a-z_]{1,12}", arb_param_value(), 0..6)
        }

        proptest! {
            #[test]
            fn derive_is_pure(kind in "[a-z_]{1,16}", subject in "[a-zA-Z0-9:/._-]{1,40}", p in arb_params()) {
                let a = CacheKey::derive(&kind, &subject, &p).unwrap();
                let b = CacheKey::derive(&kind, &subject, &p).unwrap();
                prop_assert_eq!(a, b);
            }

            #[test]
            fn added_param_changes_key(kind in "[a-z_]{1,16}", subject in "[a-z0-9./-]{1,40}", p in arb_params()) {
                let base = CacheKey::derive(&kind, &subject, &p).unwrap();

                let mut extended = p.clone();
                // Uppercase name cannot collide with the generated keys
                extended.insert("EXTRA".to_string(), ParamValue::Bool(true));
                let changed = CacheKey::derive(&kind, &subject, &extended).unwrap();

                prop_assert_ne!(base, changed);
            }
        }
    }
}
