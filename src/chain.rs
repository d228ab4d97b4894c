//! Cascading resolution over the configured providers.

use crate::error::ProviderError;
use crate::normalize::{normalize_language, AUTO};
use crate::providers::{Provider, ProviderDescriptor};
use crate::resolution::ResolutionResult;
use std::sync::Arc;
use tracing::{debug, warn};

const ALL_FAILED: &str = "All translation services failed";

/// Providers tried in priority order until one answers.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
    /// Build a chain; providers are ordered by ascending priority, keeping
    /// the given order for equal priorities.
    pub fn new(mut providers: Vec<Arc<dyn Provider>>) -> Self {
        providers.sort_by_key(|p| p.descriptor().priority);
        Self { providers }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter().map(|p| p.descriptor())
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Translate `text`, returning the first provider success.
    ///
    /// Never fails: when every provider is skipped or fails, the result is a
    /// pass-through with `service = "none"`, confidence 0 and `error` set.
    pub async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> ResolutionResult {
        let source = normalize_language(source_language);
        let target = normalize_language(target_language);
        let mut failures: Vec<String> = Vec::new();

        for provider in &self.providers {
            let descriptor = provider.descriptor();
            let provider_source = provider.resolve_source(&source);

            if !descriptor.supported_languages.supports(&target)
                || (provider_source != AUTO
                    && !descriptor.supported_languages.supports(&provider_source))
            {
                debug!(
                    "Skipping {}: {} -> {} not supported",
                    descriptor.name, provider_source, target
                );
                continue;
            }

            let outcome = tokio::time::timeout(
                descriptor.timeout,
                provider.translate(text, &provider_source, &target),
            )
            .await
            .unwrap_or(Err(ProviderError::Timeout(descriptor.timeout)));

            match outcome {
                Ok(candidate) => {
                    debug!(
                        "{} translated {} chars to {}",
                        descriptor.name,
                        text.chars().count(),
                        target
                    );
                    return ResolutionResult {
                        translated_text: candidate.translated_text,
                        source_language: candidate.source_language,
                        target_language: target,
                        service: descriptor.name.clone(),
                        confidence: candidate.confidence.min(100),
                        original_text: text.to_string(),
                        cache_level: None,
                        error: None,
                    };
                }
                Err(e) if e.is_skip() => {
                    debug!("Skipping {}: {}", descriptor.name, e);
                }
                Err(e) => {
                    warn!("{} translation failed: {}", descriptor.name, e);
                    failures.push(format!("{}: {}", descriptor.name, e));
                }
            }
        }

        let cause = if failures.is_empty() {
            format!(
                "{}: no provider supports {} -> {}",
                ALL_FAILED, source, target
            )
        } else {
            format!("{}: {}", ALL_FAILED, failures.join("; "))
        };
        warn!("{}", cause);
        ResolutionResult::degraded(text, &source, &target, cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Candidate, LanguageSupport};
    use async_trait::async_trait;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted provider that records calls
    struct Stub {
        descriptor: ProviderDescriptor,
        outcome: Result<&'static str, ProviderError>,
        delay: Duration,
        auto_default: Option<&'static str>,
        calls: AtomicUsize,
        last_source: parking_lot::Mutex<Option<String>>,
    }

    impl Stub {
        fn new(name: &str, priority: u32, outcome: Result<&'static str, ProviderError>) -> Self {
            Self {
                descriptor: ProviderDescriptor {
                    name: name.to_string(),
                    priority,
                    supported_languages: LanguageSupport::Unrestricted,
                    timeout: Duration::from_secs(1),
                },
                outcome,
                delay: Duration::ZERO,
                auto_default: None,
                calls: AtomicUsize::new(0),
                last_source: parking_lot::Mutex::new(None),
            }
        }

        fn languages(mut self, langs: &[&str]) -> Self {
            self.descriptor.supported_languages = LanguageSupport::only(langs);
            self
        }

        fn slow(mut self, delay: Duration, timeout: Duration) -> Self {
            self.delay = delay;
            self.descriptor.timeout = timeout;
            self
        }

        fn auto_default(mut self, lang: &'static str) -> Self {
            self.auto_default = Some(lang);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for Stub {
        fn descriptor(&self) -> &ProviderDescriptor {
            &self.descriptor
        }

        fn resolve_source<'a>(&self, source_language: &'a str) -> Cow<'a, str> {
            match self.auto_default {
                Some(lang) if source_language == AUTO => Cow::Borrowed(lang),
                _ => Cow::Borrowed(source_language),
            }
        }

        async fn translate(
            &self,
            _text: &str,
            source_language: &str,
            _target_language: &str,
        ) -> Result<Candidate, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_source.lock() = Some(source_language.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone().map(|text| Candidate {
                translated_text: text.to_string(),
                source_language: source_language.to_string(),
                confidence: 90,
            })
        }
    }

    fn chain(stubs: &[Arc<Stub>]) -> ProviderChain {
        ProviderChain::new(
            stubs
                .iter()
                .map(|s| s.clone() as Arc<dyn Provider>)
                .collect(),
        )
    }

    fn down() -> ProviderError {
        ProviderError::Unreachable("connection refused".into())
    }

    // ==================== Ordering Tests ====================

    #[tokio::test]
    async fn test_first_success_wins_and_later_providers_are_not_called() {
        let primary = Arc::new(Stub::new("primary", 0, Ok("primary says")));
        let secondary = Arc::new(Stub::new("secondary", 1, Ok("secondary says")));

        let result = chain(&[secondary.clone(), primary.clone()])
            .translate("hello", "en", "ta")
            .await;

        assert_eq!(result.service, "primary");
        assert_eq!(result.translated_text, "primary says");
        assert_eq!(result.target_language, "ta");
        assert!(result.error.is_none());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_cascades_to_next_provider() {
        let primary = Arc::new(Stub::new("primary", 0, Err(down())));
        let secondary = Arc::new(Stub::new("secondary", 1, Ok("second")));

        let result = chain(&[primary.clone(), secondary.clone()])
            .translate("hello", "en", "ta")
            .await;

        assert_eq!(result.service, "secondary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[test]
    fn test_names_follow_priority() {
        let a = Arc::new(Stub::new("a", 5, Ok("")));
        let b = Arc::new(Stub::new("b", 1, Ok("")));
        let c = Arc::new(Stub::new("c", 5, Ok("")));
        assert_eq!(chain(&[a, b, c]).names(), vec!["b", "a", "c"]);
    }

    // ==================== Capability Tests ====================

    #[tokio::test]
    async fn test_unsupported_target_is_skipped_without_call() {
        let limited = Arc::new(Stub::new("limited", 0, Ok("x")).languages(&["en", "hi"]));
        let fallback = Arc::new(Stub::new("fallback", 1, Ok("y")));

        let result = chain(&[limited.clone(), fallback.clone()])
            .translate("hello", "en", "ta")
            .await;

        assert_eq!(result.service, "fallback");
        assert_eq!(limited.calls(), 0);
    }

    #[tokio::test]
    async fn test_auto_source_resolved_before_capability_check() {
        let limited = Arc::new(
            Stub::new("limited", 0, Ok("x"))
                .languages(&["en", "hi"])
                .auto_default("en"),
        );

        let result = chain(&[limited.clone()]).translate("hello", "AUTO", "hi").await;

        assert_eq!(result.service, "limited");
        assert_eq!(limited.last_source.lock().as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_unsupported_source_is_skipped() {
        let limited = Arc::new(Stub::new("limited", 0, Ok("x")).languages(&["en", "hi"]));

        let result = chain(&[limited.clone()]).translate("vanakkam", "ta", "hi").await;

        assert_eq!(limited.calls(), 0);
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("no provider supports ta -> hi"));
    }

    #[tokio::test]
    async fn test_languages_are_normalized() {
        let stub = Arc::new(Stub::new("p", 0, Ok("x")).languages(&["en", "ta"]));

        let result = chain(&[stub.clone()]).translate("hello", "en-US", "TA").await;

        assert_eq!(result.service, "p");
        assert_eq!(result.target_language, "ta");
        assert_eq!(stub.last_source.lock().as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_skip_error_is_not_reported_as_failure() {
        let skipper = Arc::new(Stub::new(
            "skipper",
            0,
            Err(ProviderError::UnsupportedLanguage("ta".into())),
        ));
        let broken = Arc::new(Stub::new("broken", 1, Err(ProviderError::EmptyResult)));

        let result = chain(&[skipper, broken]).translate("hello", "en", "ta").await;

        let cause = result.error.expect("Should fail");
        assert!(!cause.contains("skipper"));
        assert!(cause.contains("broken: empty result"));
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let slow = Arc::new(
            Stub::new("slow", 0, Ok("late")).slow(Duration::from_millis(500), Duration::from_millis(20)),
        );
        let fast = Arc::new(Stub::new("fast", 1, Ok("quick")));

        let result = chain(&[slow, fast]).translate("hello", "en", "ta").await;

        assert_eq!(result.service, "fast");
        assert_eq!(result.translated_text, "quick");
    }

    #[tokio::test]
    async fn test_all_failed_degrades_to_pass_through() {
        let a = Arc::new(Stub::new("a", 0, Err(down())));
        let b = Arc::new(Stub::new("b", 1, Err(ProviderError::Status {
            status: 500,
            body: "boom".into(),
        })));

        let result = chain(&[a, b]).translate("hello", "auto", "ta").await;

        assert_eq!(result.translated_text, "hello");
        assert_eq!(result.original_text, "hello");
        assert_eq!(result.service, "none");
        assert_eq!(result.confidence, 0);
        assert_eq!(result.source_language, "auto");
        let cause = result.error.expect("Should carry a cause");
        assert!(cause.starts_with("All translation services failed"));
        assert!(cause.contains("a: unreachable"));
        assert!(cause.contains("b: HTTP 500"));
    }

    #[tokio::test]
    async fn test_empty_chain_degrades() {
        let result = ProviderChain::new(Vec::new())
            .translate("hello", "en", "ta")
            .await;
        assert!(result.is_error());
        assert_eq!(result.service, "none");
    }
}
