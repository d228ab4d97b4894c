//! Translation providers consulted by the chain.
//!
//! Each provider wraps one remote (or local) translation source behind the
//! uniform [`Provider`] contract and reports its outcome as an explicit
//! `Result<Candidate, ProviderError>`.

pub mod dictionary;
pub mod libretranslate;
pub mod mymemory;

use crate::error::ProviderError;
use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Duration;

pub use dictionary::{DictionaryProvider, PhraseTable};
pub use libretranslate::LibreTranslateProvider;
pub use mymemory::MyMemoryProvider;

/// Languages a provider accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSupport {
    Unrestricted,
    Only(HashSet<String>),
}

impl LanguageSupport {
    /// Allow-list from language codes, e.g. `["en", "es"]`.
    pub fn only<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        LanguageSupport::Only(
            codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    pub fn supports(&self, lang: &str) -> bool {
        match self {
            LanguageSupport::Unrestricted => true,
            LanguageSupport::Only(langs) => langs.contains(lang),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    /// Lower runs first
    pub priority: u32,
    pub supported_languages: LanguageSupport,
    pub timeout: Duration,
}

/// A successful provider answer, before the chain stamps it into a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub translated_text: String,
    /// Source language the provider reports (or was asked with)
    pub source_language: String,
    pub confidence: u8,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Source language actually sent to this provider.
    ///
    /// Providers without auto-detection substitute a concrete default for
    /// `auto`. Called by the chain before the capability check.
    fn resolve_source<'a>(&self, source_language: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(source_language)
    }

    /// Translate with already-normalized language codes.
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Candidate, ProviderError>;
}

/// Clamp a provider-reported score into 0..=100.
pub(crate) fn clamp_confidence(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_supports_everything() {
        assert!(LanguageSupport::Unrestricted.supports("ta"));
        assert!(LanguageSupport::Unrestricted.supports("auto"));
    }

    #[test]
    fn test_allow_list_is_normalized() {
        let support = LanguageSupport::only([" EN", "es", ""]);
        assert!(support.supports("en"));
        assert!(support.supports("es"));
        assert!(!support.supports("ta"));
        assert_eq!(support, LanguageSupport::only(["es", "en"]));
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(85.4), 85);
        assert_eq!(clamp_confidence(150.0), 100);
        assert_eq!(clamp_confidence(-3.0), 0);
        assert_eq!(clamp_confidence(f64::NAN), 0);
    }
}
