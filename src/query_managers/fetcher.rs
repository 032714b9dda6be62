//! # Batch Fetcher
//!
//! Chunked bulk lightcurve pulls with a cumulative failure budget.
//!
//! Each chunk is one remote request. Items returned by a successful request
//! are merged into the cache straight away, so a later abort never loses
//! work that already arrived. Only failed requests spend the budget; ids a
//! successful response left out are reported failed but do not count. Once
//! more ids have failed than the budget allows, the remaining chunks are left
//! unattempted for a later cycle.

use crate::error::{BrokerError, Result};
use crate::logging::log_fetch_summary;
use crate::models::Lightcurve;
use crate::query_managers::cache::LightcurveCache;
use crate::resilience::{CircuitBreaker, CircuitState};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One object's history as returned by a bulk request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedLightcurve {
    pub object_id: String,
    pub lightcurve: Lightcurve,
}

/// Remote bulk-query RPC
#[async_trait]
pub trait LightcurveSource: Send + Sync {
    /// Fetch lightcurves for every id in `object_ids` with one request.
    ///
    /// The response may omit ids or include unrequested ones; the fetcher
    /// reconciles it against the request.
    async fn fetch_lightcurves(&self, object_ids: &[String]) -> Result<Vec<FetchedLightcurve>>;
}

/// Partition of the requested ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// Ids in chunks skipped after the failure budget ran out
    pub unattempted: Vec<String>,
    /// Objects the broker returned without being asked, cached alongside
    pub unrequested: Vec<String>,
    pub circuit_opened: bool,
}

impl FetchOutcome {
    pub fn unattempted(object_ids: Vec<String>) -> Self {
        Self {
            unattempted: object_ids,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.unattempted.len()
    }
}

pub struct BatchFetcher {
    broker: String,
    source: Option<Arc<dyn LightcurveSource>>,
    cache: Arc<LightcurveCache>,
    chunk_size: usize,
    max_failures: u64,
    request_timeout: Duration,
}

impl std::fmt::Debug for BatchFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchFetcher")
            .field("broker", &self.broker)
            .field("enabled", &self.source.is_some())
            .field("chunk_size", &self.chunk_size)
            .field("max_failures", &self.max_failures)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl BatchFetcher {
    pub fn new(
        broker: impl Into<String>,
        source: Option<Arc<dyn LightcurveSource>>,
        cache: Arc<LightcurveCache>,
        chunk_size: usize,
        max_failures: u64,
        request_timeout: Duration,
    ) -> Self {
        Self {
            broker: broker.into(),
            source,
            cache,
            chunk_size: chunk_size.max(1),
            max_failures,
            request_timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    /// Fetch `object_ids` in order, chunk by chunk.
    ///
    /// Duplicate ids are requested once. Every distinct id ends up in exactly
    /// one of `succeeded`, `failed` or `unattempted`.
    pub async fn fetch(&self, object_ids: &[String]) -> FetchOutcome {
        let mut seen = HashSet::new();
        let object_ids: Vec<String> = object_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        if object_ids.is_empty() {
            return FetchOutcome::default();
        }

        let Some(source) = self.source.as_ref() else {
            warn!(
                broker = %self.broker,
                count = object_ids.len(),
                "No bulk query source configured; lightcurves not fetched"
            );
            return FetchOutcome::unattempted(object_ids);
        };

        let started = Instant::now();
        let breaker = CircuitBreaker::new(format!("{}_bulk_query", self.broker), self.max_failures);
        let mut outcome = FetchOutcome::default();
        let chunks: Vec<&[String]> = object_ids.chunks(self.chunk_size).collect();
        let n_chunks = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if let Err(e) = breaker.check() {
                outcome.circuit_opened = true;
                let remaining = &object_ids[index * self.chunk_size..];
                warn!(
                    broker = %self.broker,
                    error = %e,
                    remaining = remaining.len(),
                    "Failure budget exhausted; remaining chunks left for a later cycle"
                );
                outcome.unattempted.extend(remaining.iter().cloned());
                break;
            }

            debug!(
                broker = %self.broker,
                chunk = index + 1,
                n_chunks = n_chunks,
                size = chunk.len(),
                "Requesting lightcurve chunk"
            );

            match self.request_chunk(source.as_ref(), chunk).await {
                Ok(items) => {
                    // Only a failed request counts against the budget
                    let succeeded_before = outcome.succeeded.len();
                    self.persist_chunk(chunk, items, &mut outcome).await;
                    breaker.record_success((outcome.succeeded.len() - succeeded_before) as u64);
                }
                Err(e) => {
                    warn!(
                        broker = %self.broker,
                        chunk = index + 1,
                        size = chunk.len(),
                        error = %e,
                        "Lightcurve chunk failed"
                    );
                    outcome.failed.extend(chunk.iter().cloned());
                    breaker.record_failures(chunk.len() as u64);
                }
            }
        }

        let metrics = breaker.metrics();
        if metrics.current_state == CircuitState::Open {
            outcome.circuit_opened = true;
        }
        debug!(
            broker = %self.broker,
            requests = metrics.total_calls,
            failed_ids = metrics.failure_count,
            "Failure budget after fetch"
        );

        log_fetch_summary(
            &self.broker,
            outcome.succeeded.len(),
            outcome.failed.len(),
            outcome.unattempted.len(),
            started.elapsed(),
        );
        outcome
    }

    async fn request_chunk(
        &self,
        source: &dyn LightcurveSource,
        chunk: &[String],
    ) -> Result<Vec<FetchedLightcurve>> {
        match tokio::time::timeout(self.request_timeout, source.fetch_lightcurves(chunk)).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::timeout(
                format!("{} bulk lightcurve query", self.broker),
                self.request_timeout.as_secs(),
            )),
        }
    }

    /// Reconcile one response against its chunk and persist every item
    async fn persist_chunk(
        &self,
        chunk: &[String],
        items: Vec<FetchedLightcurve>,
        outcome: &mut FetchOutcome,
    ) {
        if items.len() != chunk.len() {
            warn!(
                broker = %self.broker,
                requested = chunk.len(),
                returned = items.len(),
                "Bulk query returned a different number of lightcurves than requested"
            );
        }

        let requested: HashSet<&str> = chunk.iter().map(String::as_str).collect();
        let mut by_id: HashMap<String, Lightcurve> = HashMap::new();
        for item in items {
            if !requested.contains(item.object_id.as_str()) {
                warn!(
                    broker = %self.broker,
                    object_id = %item.object_id,
                    "Bulk query returned an unrequested object; caching it anyway"
                );
                match self.cache.store_merged(&item.object_id, item.lightcurve).await {
                    Ok(_) => outcome.unrequested.push(item.object_id),
                    Err(e) => {
                        warn!(broker = %self.broker, object_id = %item.object_id, error = %e, "Failed to cache lightcurve")
                    }
                }
                continue;
            }
            // First occurrence wins
            by_id.entry(item.object_id).or_insert(item.lightcurve);
        }

        for object_id in chunk {
            let Some(lightcurve) = by_id.remove(object_id) else {
                warn!(
                    broker = %self.broker,
                    object_id = %object_id,
                    "Requested object missing from bulk query response"
                );
                outcome.failed.push(object_id.clone());
                continue;
            };
            match self.cache.store_merged(object_id, lightcurve).await {
                Ok(_) => outcome.succeeded.push(object_id.clone()),
                Err(e) => {
                    warn!(
                        broker = %self.broker,
                        object_id = %object_id,
                        error = %e,
                        "Failed to cache lightcurve"
                    );
                    outcome.failed.push(object_id.clone());
                }
            }
        }
    }
}
