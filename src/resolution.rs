//! Result of resolving one text, and the async seam used by the chunker and
//! the batch coordinator to resolve texts through the full pipeline.

use crate::cache::{CacheEntry, CacheLevel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Service name reported when every provider failed.
pub const NO_SERVICE: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub service: String,
    /// 0-100
    pub confidence: u8,
    pub original_text: String,
    /// `None` for a fresh (or failed) resolution
    pub cache_level: Option<CacheLevel>,
    /// Set only when every provider failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolutionResult {
    /// Pass-through result for a text no provider could translate.
    pub fn degraded(
        text: &str,
        source_language: &str,
        target_language: &str,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            translated_text: text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            service: NO_SERVICE.to_string(),
            confidence: 0,
            original_text: text.to_string(),
            cache_level: None,
            error: Some(cause.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cache_hit(&self) -> bool {
        self.cache_level.is_some()
    }

    /// The cacheable part of this result.
    pub fn to_cache_entry(&self) -> CacheEntry {
        CacheEntry {
            translated_text: self.translated_text.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            service: self.service.clone(),
            confidence: self.confidence,
            original_text: self.original_text.clone(),
            cache_level: None,
        }
    }
}

impl From<CacheEntry> for ResolutionResult {
    fn from(entry: CacheEntry) -> Self {
        Self {
            translated_text: entry.translated_text,
            source_language: entry.source_language,
            target_language: entry.target_language,
            service: entry.service,
            confidence: entry.confidence,
            original_text: entry.original_text,
            cache_level: entry.cache_level,
            error: None,
        }
    }
}

/// Anything that can resolve a single text to a [`ResolutionResult`].
///
/// Implementations never fail: failure is carried in `ResolutionResult::error`.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> ResolutionResult;
}
