//! The resolution engine: cache in front of the chunker and provider chain.

use crate::batch::{BatchCoordinator, BatchOutcome};
use crate::cache::{CacheSettings, CacheStats, CacheStore, DistributedCache};
use crate::chain::ProviderChain;
use crate::chunker::Chunker;
use crate::config::Config;
use crate::metrics::ServiceMetrics;
use crate::normalize::normalize_language;
use crate::providers::{
    dictionary, libretranslate, mymemory, DictionaryProvider, LanguageSupport,
    LibreTranslateProvider, MyMemoryProvider, PhraseTable, Provider,
};
use crate::resolution::{ResolutionResult, Resolve};
use crate::retry::RetryConfig;
use crate::script::ScriptTable;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Translator {
    cache: CacheStore,
    chain: ProviderChain,
    chunker: Chunker,
    batch: BatchCoordinator,
    metrics: Arc<ServiceMetrics>,
    dictionary_phrases: Option<usize>,
}

impl Translator {
    pub fn new(cache: CacheStore, chain: ProviderChain) -> Self {
        Self {
            cache,
            chain,
            chunker: Chunker::default(),
            batch: BatchCoordinator::default(),
            metrics: Arc::new(ServiceMetrics::new()),
            dictionary_phrases: None,
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_batch(mut self, batch: BatchCoordinator) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Wire providers, cache and limits from configuration.
    ///
    /// `l2` is the already-connected distributed cache, if any.
    pub fn from_config(config: &Config, l2: Option<Arc<dyn DistributedCache>>) -> Result<Self> {
        config.validate()?;

        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let retry = RetryConfig::provider(config.provider_retry_attempts);
        let scripts = Arc::new(match &config.native_scripts_path {
            Some(path) => ScriptTable::from_file(path)
                .with_context(|| format!("Failed to load native script table {}", path))?,
            None => ScriptTable::builtin().clone(),
        });

        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
        let mut dictionary_phrases = None;

        for (priority, name) in config.provider_order.iter().enumerate() {
            let priority = priority as u32;
            match name.as_str() {
                mymemory::NAME => {
                    let languages = config
                        .mymemory_languages
                        .as_ref()
                        .map(LanguageSupport::only)
                        .unwrap_or(LanguageSupport::Unrestricted);
                    providers.push(Arc::new(
                        MyMemoryProvider::new(client.clone(), &config.mymemory_base_url, timeout)
                            .with_api_key(config.mymemory_api_key.clone())
                            .with_languages(languages)
                            .with_priority(priority)
                            .with_retry(retry.clone())
                            .with_scripts(scripts.clone()),
                    ));
                }
                libretranslate::NAME => {
                    providers.push(Arc::new(
                        LibreTranslateProvider::new(
                            client.clone(),
                            &config.libretranslate_base_url,
                            timeout,
                        )
                        .with_api_key(config.libretranslate_api_key.clone())
                        .with_languages(LanguageSupport::only(&config.libretranslate_languages))
                        .with_priority(priority)
                        .with_retry(retry.clone()),
                    ));
                }
                dictionary::NAME => {
                    if !config.enable_mock_fallback {
                        info!("Phrase dictionary fallback disabled");
                        continue;
                    }
                    let table = match &config.phrase_table_path {
                        Some(path) => PhraseTable::from_file(path)
                            .with_context(|| format!("Failed to load phrase table {}", path))?,
                        None => PhraseTable::builtin().context("Embedded phrase table is invalid")?,
                    };
                    dictionary_phrases = Some(table.len());
                    providers.push(Arc::new(
                        DictionaryProvider::new(table).with_priority(priority),
                    ));
                }
                other => bail!("Unknown provider '{}'", other),
            }
        }

        if providers.is_empty() {
            bail!("No translation provider is enabled");
        }

        let settings: CacheSettings = config.cache_settings();
        let chain = ProviderChain::new(providers);
        info!("Provider chain: {}", chain.names().join(" -> "));

        let mut translator = Self::new(CacheStore::new(&settings, l2), chain)
            .with_chunker(Chunker::new(
                config.max_chunk_length,
                config.chunk_delimiter.clone(),
            ))
            .with_batch(BatchCoordinator::new(config.parallel_workers));
        translator.dictionary_phrases = dictionary_phrases;
        Ok(translator)
    }

    /// Resolve one text. Never fails; see [`ResolutionResult::error`].
    pub async fn resolve(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> ResolutionResult {
        let result = self
            .resolve_uncounted(text, source_language, target_language)
            .await;
        self.record(&result);
        result
    }

    /// Resolve many texts concurrently; results keep the input order.
    pub async fn resolve_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        source_language: &str,
        target_language: &str,
    ) -> BatchOutcome {
        let outcome = self
            .batch
            .resolve_batch(self, texts, source_language, target_language)
            .await;
        for result in &outcome.results {
            self.record(result);
        }
        outcome
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Phrase count of the dictionary fallback, when it is enabled.
    pub fn dictionary_phrases(&self) -> Option<usize> {
        self.dictionary_phrases
    }

    /// Count one top-level resolution. Chunk fragments are not counted.
    fn record(&self, result: &ResolutionResult) {
        self.metrics.record_resolution();
        if result.is_cache_hit() {
            self.metrics.record_cache_hit();
            return;
        }
        self.metrics.record_cache_miss();
        if result.is_error() {
            self.metrics.record_failure();
        } else {
            self.metrics.record_provider_resolution();
        }
    }

    /// Cache lookup, then chunker/chain, then cache write on success.
    async fn resolve_uncounted(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> ResolutionResult {
        let target = normalize_language(target_language);

        if let Some(entry) = self.cache.get(text, &target).await {
            return entry.into();
        }

        let result = self
            .chunker
            .translate_chunked(&self.chain, self, text, source_language, &target)
            .await;

        // Failures are never cached so a recovered provider is retried
        if !result.is_error() {
            self.cache
                .set(text, &target, &result.to_cache_entry())
                .await;
            debug!("Cached {} result for {}", result.service, target);
        }

        result
    }
}

/// Chunk fragments and batch items go through the full cache + chain path.
/// Metrics are left to the public entry points.
#[async_trait]
impl Resolve for Translator {
    async fn resolve(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> ResolutionResult {
        self.resolve_uncounted(text, source_language, target_language)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheLevel, MemoryBackend};
    use crate::error::ProviderError;
    use crate::providers::{Candidate, ProviderDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Upper-cases text; fails once `fail` is set
    struct Upper {
        descriptor: ProviderDescriptor,
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl Upper {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                descriptor: ProviderDescriptor {
                    name: "upper".into(),
                    priority: 0,
                    supported_languages: LanguageSupport::Unrestricted,
                    timeout: Duration::from_secs(1),
                },
                calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Provider for Upper {
        fn descriptor(&self) -> &ProviderDescriptor {
            &self.descriptor
        }

        async fn translate(
            &self,
            text: &str,
            source_language: &str,
            _target_language: &str,
        ) -> Result<Candidate, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Unreachable("down".into()));
            }
            Ok(Candidate {
                translated_text: text.to_uppercase(),
                source_language: source_language.to_string(),
                confidence: 90,
            })
        }
    }

    fn translator(provider: Arc<Upper>) -> Translator {
        Translator::new(
            CacheStore::new(&CacheSettings::default(), Some(Arc::new(MemoryBackend::new()))),
            ProviderChain::new(vec![provider as Arc<dyn Provider>]),
        )
    }

    // ==================== resolve Tests ====================

    #[tokio::test]
    async fn test_second_resolve_is_an_l1_hit() {
        let provider = Upper::new();
        let translator = translator(provider.clone());

        let first = translator.resolve("hello", "en", "ta").await;
        assert_eq!(first.translated_text, "HELLO");
        assert_eq!(first.cache_level, None);

        let second = translator.resolve(" Hello ", "en", "TA").await;
        assert_eq!(second.translated_text, "HELLO");
        assert_eq!(second.service, "upper");
        assert_eq!(second.cache_level, Some(CacheLevel::L1));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_region_tags_share_cache_entry() {
        let provider = Upper::new();
        let translator = translator(provider.clone());

        translator.resolve("hello", "en", "pt-BR").await;
        let again = translator.resolve("hello", "en", "pt").await;

        assert!(again.is_cache_hit());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Upper::new();
        provider.fail.store(true, Ordering::SeqCst);
        let translator = translator(provider.clone());

        let failed = translator.resolve("hello", "en", "ta").await;
        assert!(failed.is_error());

        provider.fail.store(false, Ordering::SeqCst);
        let recovered = translator.resolve("hello", "en", "ta").await;
        assert!(!recovered.is_error());
        assert!(!recovered.is_cache_hit());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_long_text_fragments_are_cached_individually() {
        let provider = Upper::new();
        let translator = translator(provider.clone()).with_chunker(Chunker::new(12, ". "));

        let result = translator.resolve("aaaa bbbb. cccc dddd.", "en", "ta").await;
        assert_eq!(result.service, "chunked");
        assert_eq!(result.translated_text, "AAAA BBBB. CCCC DDDD.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        // A fragment on its own is now a cache hit
        let fragment = translator.resolve("cccc dddd.", "en", "ta").await;
        assert!(fragment.is_cache_hit());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    // ==================== Metrics Tests ====================

    #[tokio::test]
    async fn test_metrics_track_hits_misses_and_failures() {
        let provider = Upper::new();
        let metrics = Arc::new(ServiceMetrics::new());
        let translator = translator(provider.clone()).with_metrics(metrics.clone());

        translator.resolve("one", "en", "ta").await;
        translator.resolve("one", "en", "ta").await;
        provider.fail.store(true, Ordering::SeqCst);
        translator.resolve("two", "en", "ta").await;

        assert_eq!(metrics.resolutions(), 3);
        assert_eq!(metrics.cache_hits(), 1);
        assert_eq!(metrics.cache_misses(), 2);
        assert_eq!(metrics.provider_resolutions(), 1);
        assert_eq!(metrics.failures(), 1);
    }

    #[tokio::test]
    async fn test_chunked_text_counts_as_one_resolution() {
        let provider = Upper::new();
        let metrics = Arc::new(ServiceMetrics::new());
        let translator = translator(provider.clone())
            .with_chunker(Chunker::new(12, ". "))
            .with_metrics(metrics.clone());

        let result = translator
            .resolve("aaaa bbbb. cccc dddd. eeee ffff.", "en", "ta")
            .await;
        assert_eq!(result.service, "chunked");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        assert_eq!(metrics.resolutions(), 1);
        assert_eq!(metrics.cache_hits(), 0);
        assert_eq!(metrics.cache_misses(), 1);
        assert_eq!(metrics.provider_resolutions(), 1);
        assert_eq!(metrics.failures(), 0);

        // A fragment hit inside a batch still counts once for the batch item
        translator.resolve_batch(&["cccc dddd."], "en", "ta").await;
        assert_eq!(metrics.resolutions(), 2);
        assert_eq!(metrics.cache_hits(), 1);
        assert_eq!(metrics.cache_misses(), 1);
    }

    // ==================== Batch Tests ====================

    #[tokio::test]
    async fn test_batch_counts_cache_hits() {
        let provider = Upper::new();
        let translator = translator(provider.clone());
        translator.resolve("warm", "en", "ta").await;

        let outcome = translator
            .resolve_batch(&["warm", "cold", "colder"], "en", "ta")
            .await;

        assert_eq!(outcome.results[0].translated_text, "WARM");
        assert_eq!(outcome.results[2].translated_text, "COLDER");
        assert_eq!(outcome.stats.cache_hits, 1);
        assert_eq!(outcome.stats.provider_calls, 2);
        assert_eq!(translator.metrics().resolutions(), 4);
    }

    // ==================== from_config Tests ====================

    #[test]
    fn test_from_config_builds_chain_in_order() {
        let config = Config {
            provider_order: vec![
                "mock_indian".into(),
                "libretranslate".into(),
                "mymemory".into(),
            ],
            ..Config::default()
        };

        let translator = Translator::from_config(&config, None).unwrap();

        assert_eq!(
            translator.chain().names(),
            vec!["mock_indian", "libretranslate", "mymemory"]
        );
        assert!(translator.dictionary_phrases().unwrap() >= 40);
    }

    #[test]
    fn test_disabled_dictionary_is_left_out() {
        let config = Config {
            enable_mock_fallback: false,
            ..Config::default()
        };

        let translator = Translator::from_config(&config, None).unwrap();

        assert_eq!(translator.chain().names(), vec!["mymemory", "libretranslate"]);
        assert!(translator.dictionary_phrases().is_none());
    }

    #[test]
    fn test_only_disabled_dictionary_is_an_error() {
        let config = Config {
            provider_order: vec!["mock_indian".into()],
            enable_mock_fallback: false,
            ..Config::default()
        };
        assert!(Translator::from_config(&config, None).is_err());
    }

    #[test]
    fn test_missing_phrase_table_file_is_an_error() {
        let config = Config {
            phrase_table_path: Some("/nonexistent/phrases.json".into()),
            ..Config::default()
        };
        let err = Translator::from_config(&config, None).err().unwrap();
        assert!(err.to_string().contains("phrase table"));
    }

    #[test]
    fn test_missing_native_script_file_is_an_error() {
        let config = Config {
            native_scripts_path: Some("/nonexistent/scripts.json".into()),
            ..Config::default()
        };
        let err = Translator::from_config(&config, None).err().unwrap();
        assert!(err.to_string().contains("native script table"));
    }

    #[test]
    fn test_native_script_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scripts.json");
        std::fs::write(&path, r#"{"ta": {"script": "Tamil", "ranges": [["0B80", "0BFF"]]}}"#)
            .unwrap();

        let config = Config {
            native_scripts_path: Some(path.to_str().unwrap().to_string()),
            ..Config::default()
        };
        assert!(Translator::from_config(&config, None).is_ok());
    }

    #[tokio::test]
    async fn test_long_blank_text_is_not_cached() {
        let translator = translator(Upper::new()).with_chunker(Chunker::new(10, ". "));

        let result = translator.resolve(&" ".repeat(40), "en", "ta").await;

        assert!(result.is_error());
        assert_eq!(translator.cache_stats().await.l1_size, 0);
    }

    #[tokio::test]
    async fn test_dictionary_answers_when_remote_providers_are_skipped() {
        let config = Config {
            // Neither remote provider accepts Tamil here, so no network is used
            mymemory_languages: Some(vec!["en".into()]),
            ..Config::default()
        };
        let translator = Translator::from_config(&config, None).unwrap();

        let result = translator.resolve("hello", "auto", "ta").await;

        assert_eq!(result.service, "mock_indian");
        assert_eq!(result.confidence, 60);
        assert_eq!(result.translated_text, "வணக்கம்");
    }
}
