//! LibreTranslate (secondary provider).
//!
//! Public instances only serve a small set of languages and have no
//! auto-detection, so `auto` is sent as English.

use super::{Candidate, LanguageSupport, Provider, ProviderDescriptor};
use crate::error::ProviderError;
use crate::normalize::AUTO;
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

pub const NAME: &str = "libretranslate";
pub const DEFAULT_BASE_URL: &str = "https://libretranslate.de";
pub const DEFAULT_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ru", "ja", "ko", "ar", "zh", "hi",
];

/// Source language used in place of `auto`
const DEFAULT_SOURCE: &str = "en";
const CONFIDENCE: u8 = 80;
const SAME_LANGUAGE_CONFIDENCE: u8 = 100;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
    #[serde(rename = "detectedLanguage", default)]
    detected_language: Option<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: Option<String>,
}

pub struct LibreTranslateProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    descriptor: ProviderDescriptor,
    retry: RetryConfig,
}

impl LibreTranslateProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            descriptor: ProviderDescriptor {
                name: NAME.to_string(),
                priority: 1,
                supported_languages: LanguageSupport::only(DEFAULT_LANGUAGES),
                timeout,
            },
            retry: RetryConfig::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.descriptor.priority = priority;
        self
    }

    pub fn with_languages(mut self, languages: LanguageSupport) -> Self {
        self.descriptor.supported_languages = languages;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn post(&self, request: &TranslateRequest<'_>) -> Result<TranslateResponse, ProviderError> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        if let (Some(key), Some(map)) = (&self.api_key, body.as_object_mut()) {
            map.insert("api_key".to_string(), key.clone().into());
        }

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Provider for LibreTranslateProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn resolve_source<'a>(&self, source_language: &'a str) -> Cow<'a, str> {
        if source_language == AUTO {
            Cow::Borrowed(DEFAULT_SOURCE)
        } else {
            Cow::Borrowed(source_language)
        }
    }

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Candidate, ProviderError> {
        let source = self.resolve_source(source_language);

        if source == target_language {
            return Ok(Candidate {
                translated_text: text.to_string(),
                source_language: source.into_owned(),
                confidence: SAME_LANGUAGE_CONFIDENCE,
            });
        }

        let request = TranslateRequest {
            q: text,
            source: &source,
            target: target_language,
            format: "text",
        };
        let data = with_retry_if(
            &self.retry,
            "LibreTranslate",
            || self.post(&request),
            ProviderError::is_retryable,
        )
        .await?;

        let translated_text = data
            .translated_text
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResult)?;
        let source_language = data
            .detected_language
            .and_then(|d| d.language)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| source.into_owned());

        Ok(Candidate {
            translated_text,
            source_language,
            confidence: CONFIDENCE,
        })
    }
}
