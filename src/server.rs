//! HTTP surface: request validation, JSON shapes and health reporting.
//!
//! Translation failures are not HTTP errors: a request that reached the
//! engine always answers 200 and carries `error` in the body. Only invalid
//! input is rejected (400).

use crate::audit::{spawn_record, AuditRecord, AuditSink};
use crate::cache::CacheStats;
use crate::engine::Translator;
use crate::metrics::MetricsReport;
use crate::normalize::{is_valid_language_code, AUTO};
use crate::resolution::ResolutionResult;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

// ==================== Errors ====================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ==================== State ====================

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_text_length: usize,
    pub max_batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_text_length: 1000,
            max_batch_size: 100,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    translator: Arc<Translator>,
    audit: Option<Arc<dyn AuditSink>>,
    limits: Limits,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        translator: Arc<Translator>,
        audit: Option<Arc<dyn AuditSink>>,
        limits: Limits,
    ) -> Self {
        Self {
            translator,
            audit,
            limits,
            started_at: Instant::now(),
        }
    }

    fn audit(&self, result: &ResolutionResult) {
        if let (Some(sink), Some(record)) = (&self.audit, AuditRecord::from_fresh(result)) {
            spawn_record(sink.clone(), record);
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/translate", post(translate))
        .route("/translate/batch", post(translate_batch))
        .route("/cache/stats", get(cache_stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Requests and responses ====================

fn default_source() -> String {
    AUTO.to_string()
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
    #[serde(default = "default_source")]
    pub source_language: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub texts: Vec<String>,
    pub target_language: String,
    #[serde(default = "default_source")]
    pub source_language: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    #[serde(default)]
    pub minimal: bool,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    #[serde(flatten)]
    pub result: ResolutionResult,
    pub processing_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct MinimalTranslation {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchResponse {
    Full {
        results: Vec<ResolutionResult>,
        total_count: usize,
        successful_count: usize,
        failed_count: usize,
        cache_hits: usize,
        api_calls: usize,
        total_processing_time_ms: f64,
    },
    Minimal {
        /// Successful translations only
        results: Vec<MinimalTranslation>,
        total_count: usize,
        successful_count: usize,
        failed_count: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct DependencyStatus {
    pub configured: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyStatus {
    fn not_configured() -> Self {
        Self {
            configured: false,
            connected: false,
            response_time_ms: None,
            error: None,
        }
    }

    fn from_outcome<E: std::fmt::Display>(outcome: Result<(), E>, start: Instant) -> Self {
        match outcome {
            Ok(()) => Self {
                configured: true,
                connected: true,
                response_time_ms: Some(elapsed_ms(start)),
                error: None,
            },
            Err(e) => Self {
                configured: true,
                connected: false,
                response_time_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Unconfigured dependencies do not degrade health
    fn is_ok(&self) -> bool {
        !self.configured || self.connected
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderSummary {
    pub name: String,
    pub priority: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub providers: Vec<ProviderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_size: Option<usize>,
    pub l2_cache: DependencyStatus,
    pub database: DependencyStatus,
    pub cache_stats: CacheStats,
    pub metrics: MetricsReport,
}

// ==================== Validation ====================

fn validate_text(text: &str, limits: &Limits) -> ApiResult<()> {
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    let length = text.chars().count();
    if length > limits.max_text_length {
        return Err(ApiError::BadRequest(format!(
            "text is {} characters, maximum is {}",
            length, limits.max_text_length
        )));
    }
    Ok(())
}

fn validate_language(field: &str, code: &str) -> ApiResult<()> {
    if is_valid_language_code(code) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{} '{}' is not a valid language code",
            field, code
        )))
    }
}

fn validate_languages(source: &str, target: &str) -> ApiResult<()> {
    validate_language("source_language", source)?;
    validate_language("target_language", target)?;
    if target.trim().eq_ignore_ascii_case(AUTO) {
        return Err(ApiError::BadRequest(
            "target_language cannot be 'auto'".into(),
        ));
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

// ==================== Handlers ====================

async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Json<TranslateResponse>> {
    validate_text(&request.text, &state.limits)?;
    validate_languages(&request.source_language, &request.target_language)?;

    let start = Instant::now();
    let result = state
        .translator
        .resolve(
            &request.text,
            &request.source_language,
            &request.target_language,
        )
        .await;
    state.audit(&result);

    Ok(Json(TranslateResponse {
        result,
        processing_time_ms: elapsed_ms(start),
    }))
}

async fn translate_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if request.texts.is_empty() {
        return Err(ApiError::BadRequest("texts must not be empty".into()));
    }
    if request.texts.len() > state.limits.max_batch_size {
        return Err(ApiError::BadRequest(format!(
            "batch has {} texts, maximum is {}",
            request.texts.len(),
            state.limits.max_batch_size
        )));
    }
    for text in &request.texts {
        validate_text(text, &state.limits)?;
    }
    validate_languages(&request.source_language, &request.target_language)?;

    let start = Instant::now();
    let outcome = state
        .translator
        .resolve_batch(
            &request.texts,
            &request.source_language,
            &request.target_language,
        )
        .await;
    for result in &outcome.results {
        state.audit(result);
    }

    let stats = outcome.stats;
    let total_count = outcome.results.len();
    let response = if query.minimal {
        BatchResponse::Minimal {
            results: outcome
                .results
                .into_iter()
                .filter(|r| !r.is_error())
                .map(|r| MinimalTranslation {
                    translated_text: r.translated_text,
                    source_language: r.source_language,
                    target_language: r.target_language,
                })
                .collect(),
            total_count,
            successful_count: stats.successful,
            failed_count: stats.failed,
        }
    } else {
        BatchResponse::Full {
            results: outcome.results,
            total_count,
            successful_count: stats.successful,
            failed_count: stats.failed,
            cache_hits: stats.cache_hits,
            api_calls: stats.provider_calls,
            total_processing_time_ms: elapsed_ms(start),
        }
    };

    Ok(Json(response))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.translator.cache_stats().await)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let translator = &state.translator;

    let start = Instant::now();
    let l2_cache = match translator.cache().ping_l2().await {
        Some(outcome) => DependencyStatus::from_outcome(outcome, start),
        None => DependencyStatus::not_configured(),
    };

    let start = Instant::now();
    let database = match &state.audit {
        Some(sink) => DependencyStatus::from_outcome(sink.ping().await, start),
        None => DependencyStatus::not_configured(),
    };

    let status = if l2_cache.is_ok() && database.is_ok() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        providers: translator
            .chain()
            .descriptors()
            .map(|d| ProviderSummary {
                name: d.name.clone(),
                priority: d.priority,
                timeout_secs: d.timeout.as_secs(),
            })
            .collect(),
        dictionary_size: translator.dictionary_phrases(),
        l2_cache,
        database,
        cache_stats: translator.cache_stats().await,
        metrics: translator.metrics().report(),
    })
}
