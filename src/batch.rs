//! Bounded-concurrency batch resolution.

use crate::resolution::{ResolutionResult, Resolve};
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::debug;

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Aggregate counters of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub cache_hits: usize,
    /// Resolutions that went past the cache, successful or not
    pub provider_calls: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// `results[i]` answers `texts[i]`
    pub results: Vec<ResolutionResult>,
    pub stats: BatchStats,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicUsize,
    provider_calls: AtomicUsize,
    successful: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record(&self, result: &ResolutionResult) {
        if result.is_cache_hit() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.provider_calls.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_error() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.successful.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> BatchStats {
        BatchStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    max_concurrency: usize,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl BatchCoordinator {
    /// `max_concurrency` is clamped to at least 1.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Resolve every text through `resolver`, at most `max_concurrency` at a
    /// time. Output order matches input order; one failed text never aborts
    /// the others.
    pub async fn resolve_batch<R, S>(
        &self,
        resolver: &R,
        texts: &[S],
        source_language: &str,
        target_language: &str,
    ) -> BatchOutcome
    where
        R: Resolve + ?Sized,
        S: AsRef<str>,
    {
        let semaphore = Semaphore::new(self.max_concurrency);
        let counters = Counters::default();

        debug!(
            "Resolving batch of {} texts with {} workers",
            texts.len(),
            self.max_concurrency
        );

        let tasks = texts.iter().map(|text| {
            let semaphore = &semaphore;
            let counters = &counters;
            async move {
                // The semaphore is never closed, so acquire cannot fail
                let _permit = semaphore.acquire().await.ok();
                let result = resolver
                    .resolve(text.as_ref(), source_language, target_language)
                    .await;
                counters.record(&result);
                result
            }
        });

        let results = join_all(tasks).await;

        BatchOutcome {
            results,
            stats: counters.snapshot(),
        }
    }
}
