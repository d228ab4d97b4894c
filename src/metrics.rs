//! Service counters.
//!
//! One `ServiceMetrics` is created at startup and shared through the
//! `Translator`, so tests get their own isolated instance.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Resolutions served through the public entry points
    resolutions: AtomicUsize,

    cache_hits: AtomicUsize,

    cache_misses: AtomicUsize,

    /// Fresh translations produced by a provider (or by chunking)
    provider_resolutions: AtomicUsize,

    /// Resolutions where every provider failed
    failures: AtomicUsize,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_resolution(&self) {
        self.provider_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn provider_resolutions(&self) -> usize {
        self.provider_resolutions.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        let fresh = self.provider_resolutions();
        let failures = self.failures();
        let attempts = fresh + failures;
        let provider_success_rate = if attempts > 0 {
            (fresh as f64 / attempts as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            resolutions: self.resolutions(),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            provider_resolutions: fresh,
            failures,
            provider_success_rate,
        }
    }
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Percentage (0-100)
    pub cache_hit_rate: f64,
    pub provider_resolutions: usize,
    pub failures: usize,
    /// Percentage (0-100) of cache misses a provider answered
    pub provider_success_rate: f64,
}
