//! Canonical forms for language codes, cache keys and content hashes.
//!
//! Keys are derived from a SHA-256 digest of the normalized input so every
//! process sharing the L2 cache (and the audit table) computes the same key
//! for the same text.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

/// Source language placeholder asking the provider to detect the language.
pub const AUTO: &str = "auto";

const KEY_PREFIX: &str = "translation:";

static LANGUAGE_TAG: OnceLock<Regex> = OnceLock::new();
static LANGUAGE_CODE_SHAPE: OnceLock<Regex> = OnceLock::new();

fn language_tag() -> &'static Regex {
    LANGUAGE_TAG.get_or_init(|| {
        Regex::new(r"^([a-z]{2,3})(?:-[a-z0-9]+)*$").expect("language tag regex is valid")
    })
}

/// Normalize a language code to its primary ISO 639 subtag.
///
/// `"EN-us"` and `"en_US"` become `"en"`, `"auto"` is kept as is.
/// Codes that don't look like a language tag are only trimmed and lower-cased.
pub fn normalize_language(code: &str) -> String {
    let lowered = code.trim().to_lowercase().replace('_', "-");
    if lowered == AUTO {
        return lowered;
    }

    match language_tag().captures(&lowered) {
        Some(caps) => caps[1].to_string(),
        None => lowered,
    }
}

/// Whether a raw code has an acceptable shape: `auto`, or 2-10 characters of
/// letters, digits and hyphens.
pub fn is_valid_language_code(code: &str) -> bool {
    let shape = LANGUAGE_CODE_SHAPE
        .get_or_init(|| Regex::new(r"^[a-z0-9-]{2,10}$").expect("language code regex is valid"));
    let cleaned = code.trim().to_lowercase();
    cleaned == AUTO || shape.is_match(&cleaned)
}

/// Case-folded, trimmed text used for keying and phrase lookups.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Hex SHA-256 of the normalized text and case-folded target language.
///
/// Used both as the cache key body and as the audit record's content hash.
pub fn content_hash(text: &str, target_language: &str) -> String {
    let material = format!(
        "{}:{}",
        normalize_text(text),
        target_language.trim().to_lowercase()
    );
    format!("{:x}", Sha256::digest(material.as_bytes()))
}

/// Deterministic key of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(text: &str, target_language: &str) -> Self {
        CacheKey(format!("{}{}", KEY_PREFIX, content_hash(text, target_language)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
