use crate::cache::CacheSettings;
use crate::providers::{dictionary, libretranslate, mymemory};
use anyhow::{bail, Result};
use std::str::FromStr;
use std::time::Duration;

pub const KNOWN_PROVIDERS: &[&str] = &[mymemory::NAME, libretranslate::NAME, dictionary::NAME];

#[derive(Debug, Clone)]
pub struct Config {
    // Cache
    pub l1_cache_size: usize,
    pub l1_cache_ttl_secs: u64,
    pub l2_cache_ttl_secs: u64,
    /// Per-call bound on L2 reads, writes and pings
    pub l2_cache_timeout_secs: u64,
    pub enable_l1_cache: bool,
    pub enable_l2_cache: bool,
    pub redis_url: Option<String>,

    // Providers
    pub request_timeout_secs: u64,
    pub provider_order: Vec<String>,
    pub provider_retry_attempts: u32,
    pub mymemory_base_url: String,
    pub mymemory_api_key: Option<String>,
    /// `None` means every language is accepted
    pub mymemory_languages: Option<Vec<String>>,
    pub libretranslate_base_url: String,
    pub libretranslate_api_key: Option<String>,
    pub libretranslate_languages: Vec<String>,
    pub enable_mock_fallback: bool,
    pub phrase_table_path: Option<String>,
    pub native_scripts_path: Option<String>,

    // Chunking and batching
    pub max_chunk_length: usize,
    pub chunk_delimiter: String,
    pub parallel_workers: usize,

    // HTTP
    pub port: u16,
    pub max_text_length: usize,
    pub max_batch_size: usize,

    // Audit trail
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            l1_cache_size: 1000,
            l1_cache_ttl_secs: 300,
            l2_cache_ttl_secs: 3600,
            l2_cache_timeout_secs: 2,
            enable_l1_cache: true,
            enable_l2_cache: true,
            redis_url: None,

            request_timeout_secs: 30,
            provider_order: KNOWN_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            provider_retry_attempts: 2,
            mymemory_base_url: mymemory::DEFAULT_BASE_URL.to_string(),
            mymemory_api_key: None,
            mymemory_languages: None,
            libretranslate_base_url: libretranslate::DEFAULT_BASE_URL.to_string(),
            libretranslate_api_key: None,
            libretranslate_languages: libretranslate::DEFAULT_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            enable_mock_fallback: true,
            phrase_table_path: None,
            native_scripts_path: None,

            max_chunk_length: 450,
            chunk_delimiter: ". ".to_string(),
            parallel_workers: 10,

            port: 8000,
            max_text_length: 1000,
            max_batch_size: 100,

            database_url: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn flag_or(key: &str, default: bool) -> bool {
    match var(key).map(|v| v.to_lowercase()).as_deref() {
        Some("true" | "1" | "yes" | "on") => true,
        Some("false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

fn list(key: &str) -> Option<Vec<String>> {
    var(key).map(|v| {
        v.split(',')
            .map(|item| item.trim().to_lowercase())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        // Chunk delimiter is taken verbatim: ". " must keep its space
        let chunk_delimiter = std::env::var("CHUNK_DELIMITER")
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or(defaults.chunk_delimiter);

        let config = Self {
            // Cache
            l1_cache_size: parse_or("L1_CACHE_SIZE", defaults.l1_cache_size),
            l1_cache_ttl_secs: parse_or("L1_CACHE_TTL", defaults.l1_cache_ttl_secs),
            l2_cache_ttl_secs: parse_or("L2_CACHE_TTL", defaults.l2_cache_ttl_secs),
            l2_cache_timeout_secs: parse_or("L2_CACHE_TIMEOUT", defaults.l2_cache_timeout_secs),
            enable_l1_cache: flag_or("ENABLE_L1_CACHE", defaults.enable_l1_cache),
            enable_l2_cache: flag_or("ENABLE_L2_CACHE", defaults.enable_l2_cache),
            redis_url: var("REDIS_URL"),

            // Providers
            request_timeout_secs: parse_or("REQUEST_TIMEOUT", defaults.request_timeout_secs),
            provider_order: list("PROVIDER_ORDER").unwrap_or(defaults.provider_order),
            provider_retry_attempts: parse_or(
                "PROVIDER_RETRY_ATTEMPTS",
                defaults.provider_retry_attempts,
            ),
            mymemory_base_url: var("MYMEMORY_BASE_URL").unwrap_or(defaults.mymemory_base_url),
            mymemory_api_key: var("MYMEMORY_API_KEY"),
            mymemory_languages: list("MYMEMORY_LANGUAGES"),
            libretranslate_base_url: var("LIBRETRANSLATE_BASE_URL")
                .unwrap_or(defaults.libretranslate_base_url),
            libretranslate_api_key: var("LIBRETRANSLATE_API_KEY"),
            libretranslate_languages: list("LIBRETRANSLATE_LANGUAGES")
                .unwrap_or(defaults.libretranslate_languages),
            enable_mock_fallback: flag_or("ENABLE_MOCK_FALLBACK", defaults.enable_mock_fallback),
            phrase_table_path: var("PHRASE_TABLE_PATH"),
            native_scripts_path: var("NATIVE_SCRIPTS_PATH"),

            // Chunking and batching
            max_chunk_length: parse_or("MAX_CHUNK_LENGTH", defaults.max_chunk_length),
            chunk_delimiter,
            parallel_workers: parse_or("PARALLEL_WORKERS", defaults.parallel_workers),

            // HTTP
            port: parse_or("PORT", defaults.port),
            max_text_length: parse_or("MAX_TEXT_LENGTH", defaults.max_text_length),
            max_batch_size: parse_or("MAX_BATCH_SIZE", defaults.max_batch_size),

            // Audit trail
            database_url: var("DATABASE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider_order.is_empty() {
            bail!("PROVIDER_ORDER must name at least one provider");
        }
        for name in &self.provider_order {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                bail!(
                    "Unknown provider '{}' in PROVIDER_ORDER (expected one of: {})",
                    name,
                    KNOWN_PROVIDERS.join(", ")
                );
            }
        }
        if self.l1_cache_size == 0 && self.enable_l1_cache {
            bail!("L1_CACHE_SIZE must be greater than zero when the L1 cache is enabled");
        }
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            l1_enabled: self.enable_l1_cache,
            l1_capacity: self.l1_cache_size,
            l1_ttl: Duration::from_secs(self.l1_cache_ttl_secs),
            l2_enabled: self.enable_l2_cache && self.redis_url.is_some(),
            l2_ttl: Duration::from_secs(self.l2_cache_ttl_secs),
            l2_timeout: self.l2_timeout(),
        }
    }

    pub fn l2_timeout(&self) -> Duration {
        Duration::from_secs(self.l2_cache_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
