//! Terminal fallback: static phrase table for common Indian-language phrases.

use super::{Candidate, LanguageSupport, Provider, ProviderDescriptor};
use crate::error::{DataError, ProviderError};
use crate::normalize::{normalize_text, AUTO};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const NAME: &str = "mock_indian";
const CONFIDENCE: u8 = 60;

const BUILTIN_PHRASES: &str = include_str!("../../data/phrases.json");

/// Read-only lookup of `normalized phrase -> target language -> translation`.
#[derive(Debug, Clone, Default)]
pub struct PhraseTable {
    phrases: HashMap<String, HashMap<String, String>>,
}

impl PhraseTable {
    /// Phrase table shipped with the crate.
    pub fn builtin() -> Result<Self, DataError> {
        Self::from_json(BUILTIN_PHRASES)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let raw: HashMap<String, HashMap<String, String>> = serde_json::from_str(json)?;
        let phrases = raw
            .into_iter()
            .map(|(phrase, translations)| {
                let translations = translations
                    .into_iter()
                    .map(|(lang, text)| (lang.trim().to_lowercase(), text))
                    .collect();
                (normalize_text(&phrase), translations)
            })
            .collect();
        Ok(Self { phrases })
    }

    pub fn lookup(&self, text: &str, target_language: &str) -> Option<&str> {
        self.phrases
            .get(&normalize_text(text))?
            .get(target_language)
            .map(String::as_str)
    }

    /// Number of phrases
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

pub struct DictionaryProvider {
    table: PhraseTable,
    descriptor: ProviderDescriptor,
}

impl DictionaryProvider {
    pub fn new(table: PhraseTable) -> Self {
        Self {
            table,
            descriptor: ProviderDescriptor {
                name: NAME.to_string(),
                priority: 2,
                supported_languages: LanguageSupport::Unrestricted,
                timeout: Duration::from_secs(1),
            },
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.descriptor.priority = priority;
        self
    }

    pub fn table(&self) -> &PhraseTable {
        &self.table
    }
}

#[async_trait]
impl Provider for DictionaryProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> Result<Candidate, ProviderError> {
        let translated = self
            .table
            .lookup(text, target_language)
            .ok_or(ProviderError::EmptyResult)?;

        Ok(Candidate {
            translated_text: translated.to_string(),
            source_language: AUTO.to_string(),
            confidence: CONFIDENCE,
        })
    }
}
