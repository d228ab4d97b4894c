//! Audit trail of fresh translations.
//!
//! Every successful non-cached resolution is upserted, keyed by the content
//! hash of (text, target language). Writes run in the background and a
//! failed write is only logged.

use crate::error::AuditError;
use crate::normalize::content_hash;
use crate::resolution::ResolutionResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub text_hash: String,
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
    pub provider_name: String,
    pub confidence: i16,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Record for a fresh, successful resolution; `None` for cache hits and
    /// failures.
    pub fn from_fresh(result: &ResolutionResult) -> Option<Self> {
        if result.is_cache_hit() || result.is_error() {
            return None;
        }

        Some(Self {
            text_hash: content_hash(&result.original_text, &result.target_language),
            source_text: result.original_text.clone(),
            source_language: result.source_language.clone(),
            target_language: result.target_language.clone(),
            translated_text: result.translated_text.clone(),
            provider_name: result.service.clone(),
            confidence: i16::from(result.confidence),
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Idempotent upsert. Returns `true` if a new row was written.
    async fn record(&self, record: &AuditRecord) -> Result<bool, AuditError>;

    async fn ping(&self) -> Result<(), AuditError>;
}

/// Write `record` in the background.
pub fn spawn_record(sink: Arc<dyn AuditSink>, record: AuditRecord) {
    tokio::spawn(async move {
        match sink.record(&record).await {
            Ok(true) => debug!("Audit record stored for {}", record.text_hash),
            Ok(false) => debug!("Audit record already present for {}", record.text_hash),
            Err(e) => warn!("Failed to store audit record {}: {}", record.text_hash, e),
        }
    });
}

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS translations (
    id BIGSERIAL PRIMARY KEY,
    text_hash TEXT NOT NULL UNIQUE,
    source_text TEXT NOT NULL,
    source_language TEXT NOT NULL,
    target_language TEXT NOT NULL,
    translated_text TEXT NOT NULL,
    provider_name TEXT NOT NULL,
    confidence SMALLINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// PostgreSQL audit store.
#[derive(Clone)]
pub struct PgAuditStore {
    pool: Pool<Postgres>,
}

impl PgAuditStore {
    /// Connect and make sure the table exists.
    pub async fn connect(url: &str) -> Result<Self, AuditError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        info!("Connected to audit database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl AuditSink for PgAuditStore {
    async fn record(&self, record: &AuditRecord) -> Result<bool, AuditError> {
        let result = sqlx::query(
            r#"
            INSERT INTO translations
                (text_hash, source_text, source_language, target_language,
                 translated_text, provider_name, confidence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (text_hash) DO NOTHING
            "#,
        )
        .bind(&record.text_hash)
        .bind(&record.source_text)
        .bind(&record.source_language)
        .bind(&record.target_language)
        .bind(&record.translated_text)
        .bind(&record.provider_name)
        .bind(record.confidence)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), AuditError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory sink with the same first-write-wins semantics.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<HashMap<String, AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, text_hash: &str) -> Option<AuditRecord> {
        self.records.lock().get(text_hash).cloned()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<bool, AuditError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.text_hash) {
            return Ok(false);
        }
        records.insert(record.text_hash.clone(), record.clone());
        Ok(true)
    }

    async fn ping(&self) -> Result<(), AuditError> {
        Ok(())
    }
}
