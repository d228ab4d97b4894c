//! MyMemory translation memory API (primary provider).

use super::{clamp_confidence, Candidate, LanguageSupport, Provider, ProviderDescriptor};
use crate::error::ProviderError;
use crate::normalize::normalize_text;
use crate::retry::{with_retry_if, RetryConfig};
use crate::script::ScriptTable;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "mymemory";
pub const DEFAULT_BASE_URL: &str = "https://api.mymemory.translated.net";

/// Minimum quality for a memory match to be used directly
const MIN_MATCH_QUALITY: f64 = 75.0;
/// Confidence given to the best guess when MyMemory reports no match ratio
const DEFAULT_GUESS_CONFIDENCE: u8 = 75;
/// Placeholder MyMemory returns for some unusable segments
const SENTINEL_TRANSLATION: &str = "Test123";

#[derive(Debug, Deserialize)]
pub(crate) struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: ResponseData,
    #[serde(rename = "responseStatus", default)]
    response_status: Value,
    #[serde(rename = "responseDetails", default)]
    response_details: Value,
    #[serde(default, deserialize_with = "lenient_matches")]
    matches: Vec<MemoryMatch>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
    /// Match ratio in 0..=1
    #[serde(rename = "match", default)]
    match_ratio: Value,
}

#[derive(Debug, Deserialize)]
struct MemoryMatch {
    #[serde(default)]
    segment: String,
    #[serde(default)]
    translation: String,
    /// Percentage, sent either as a number or a numeric string
    #[serde(default)]
    quality: Value,
}

/// `matches` is an array on success but may be an empty string otherwise.
fn lenient_matches<'de, D>(deserializer: D) -> Result<Vec<MemoryMatch>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pick the translation to return from a MyMemory response.
///
/// A memory match qualifies when its segment equals the normalized input, its
/// translation is non-empty and not the sentinel, and its quality clears the
/// threshold. Any qualifying match in the target's native script beats every
/// transliterated one; within a script the highest quality wins (first on
/// ties). Without a qualifying match the best-guess `translatedText` is used,
/// its confidence derived from the match ratio.
pub(crate) fn select_translation(
    response: &MyMemoryResponse,
    input: &str,
    target_language: &str,
    scripts: &ScriptTable,
) -> Result<(String, u8), ProviderError> {
    let input = normalize_text(input);
    let mut native: Option<(String, f64)> = None;
    let mut transliterated: Option<(String, f64)> = None;

    for m in &response.matches {
        let translation = m.translation.trim();
        let quality = as_number(&m.quality).unwrap_or(0.0);

        if normalize_text(&m.segment) != input
            || translation.is_empty()
            || translation == SENTINEL_TRANSLATION
            || quality < MIN_MATCH_QUALITY
        {
            continue;
        }

        let slot = if scripts.is_native(translation, target_language) {
            &mut native
        } else {
            &mut transliterated
        };
        if slot.as_ref().map_or(true, |(_, best)| quality > *best) {
            *slot = Some((translation.to_string(), quality));
        }
    }

    if let Some((text, quality)) = native.or(transliterated) {
        return Ok((text, clamp_confidence(quality)));
    }

    let guess = response
        .response_data
        .translated_text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if guess.is_empty() {
        return Err(ProviderError::EmptyResult);
    }

    let confidence = match as_number(&response.response_data.match_ratio) {
        Some(ratio) if ratio > 0.0 => clamp_confidence(ratio * 100.0),
        _ => DEFAULT_GUESS_CONFIDENCE,
    };
    Ok((guess.to_string(), confidence))
}

pub struct MyMemoryProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    descriptor: ProviderDescriptor,
    retry: RetryConfig,
    scripts: Arc<ScriptTable>,
}

impl MyMemoryProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            descriptor: ProviderDescriptor {
                name: NAME.to_string(),
                priority: 0,
                supported_languages: LanguageSupport::Unrestricted,
                timeout,
            },
            retry: RetryConfig::default(),
            scripts: Arc::new(ScriptTable::builtin().clone()),
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

    pub fn with_scripts(mut self, scripts: Arc<ScriptTable>) -> Self {
        self.scripts = scripts;
        self
    }

    async fn fetch(&self, text: &str, langpair: &str) -> Result<MyMemoryResponse, ProviderError> {
        let mut query = vec![("q", text), ("langpair", langpair)];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/get", self.base_url))
            .query(&query)
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

        let data: MyMemoryResponse = response.json().await?;

        // MyMemory reports API-level failures inside a 200 response
        let status = as_number(&data.response_status).unwrap_or(0.0) as u16;
        if status != 200 {
            let body = match &data.response_details {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(ProviderError::Status { status, body });
        }

        Ok(data)
    }
}

#[async_trait]
impl Provider for MyMemoryProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Candidate, ProviderError> {
        let langpair = format!("{}|{}", source_language, target_language);
        let data = with_retry_if(
            &self.retry,
            "MyMemory",
            || self.fetch(text, &langpair),
            ProviderError::is_retryable,
        )
        .await?;

        let (translated_text, confidence) =
            select_translation(&data, text, target_language, &self.scripts)?;

        Ok(Candidate {
            translated_text,
            source_language: source_language.to_string(),
            confidence,
        })
    }
}
