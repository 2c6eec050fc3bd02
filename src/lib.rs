mod batch;
pub mod cache;
mod deduplication;
mod error;
pub mod metrics;
mod options;
pub mod pagination;
mod retry;
mod signature;
pub mod transport;


use batch::BatchScheduler;
use cache::{CachePriority, CacheStore, CacheWriteOptions, MemoryCache};
use deduplication::{DedupRegistry, JoinOutcome};
use metrics::{LogMetricsSink, MetricUnit, MetricsSink, PerformanceTracker};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use transport::{HttpRequest, SurfTransport, Transport};

pub use batch::{BatchConfig, BatchRequest};
pub use cache::{CacheConfig, CacheStats};
pub use error::Error;
pub use metrics::PerformanceStats;
pub use options::{FetchOptions, Method};
pub use retry::RetryPolicy;
pub use signature::Signature;

/// Combined view over cache, dedup registry, batch queue and internal
/// counters, in the shape the dashboard's debug panel consumes.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub cache: CacheStats,
    pub pending_requests: usize,
    pub batch_queue_size: usize,
    pub performance: PerformanceStats,
}

/// Data access client for the talent API.
///
/// Every fetch goes cache lookup → dedup check → network with retry →
/// cache write, and concurrent identical requests share one network call.
/// Cloning is cheap and clones share all state; create separate clients
/// when isolation (e.g. between tests) is wanted.
#[derive(Clone)]
pub struct TalentClient {
    inner: Arc<ClientInner>,
    batch: Arc<BatchScheduler>,
}

impl Default for TalentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TalentClient {
    /// Client with the surf transport, a default in-memory cache and
    /// log-backed metrics.
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        Self::with_components(
            Arc::new(SurfTransport::new()),
            Arc::new(MemoryCache::new(config)),
            Arc::new(LogMetricsSink),
            BatchConfig::default(),
        )
    }

    /// Full constructor injection; the cache store and metrics sink are
    /// consumed only through their traits.
    pub fn with_components(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
        metrics: Arc<dyn MetricsSink>,
        batch: BatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                cache,
                metrics,
                registry: DedupRegistry::new(),
                perf: PerformanceTracker::default(),
            }),
            batch: Arc::new(BatchScheduler::new(batch)),
        }
    }

    /// Fetches a value, serving from cache when possible and joining an
    /// identical in-flight request when one exists.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<Value, Error> {
        Arc::clone(&self.inner).fetch(url, options).await
    }

    /// Runs every request through the batch queue; results come back in
    /// request order, each settling independently.
    pub async fn batch_fetch(&self, requests: Vec<BatchRequest>) -> Vec<Result<Value, Error>> {
        let futures = requests.into_iter().map(|request| {
            Arc::clone(&self.batch).enqueue(Arc::clone(&self.inner), request)
        });
        futures::future::join_all(futures).await
    }

    /// Fire-and-forget cache warm-up. Already-cached URLs are skipped;
    /// failures are logged and never surfaced.
    pub fn prefetch(&self, urls: &[String], options: FetchOptions) {
        Arc::clone(&self.inner).prefetch(urls, options);
    }

    /// With tags, removes entries carrying at least one matching tag; with
    /// an empty slice, clears the whole cache.
    pub fn invalidate_cache(&self, tags: &[String]) {
        if tags.is_empty() {
            if let Err(err) = self.inner.cache.clear() {
                log::warn!("cache clear failed: {err}");
            }
            return;
        }
        match self.inner.cache.clear_by_tags(tags) {
            Ok(removed) => log::info!("invalidated {removed} entries for tags {tags:?}"),
            Err(err) => log::warn!("tag invalidation failed: {err}"),
        }
    }

    pub fn get_stats(&self) -> ClientStats {
        ClientStats {
            cache: self.inner.cache.stats(),
            pending_requests: self.inner.registry.pending_count(),
            batch_queue_size: self.batch.queue_len(),
            performance: self.inner.perf.snapshot(),
        }
    }
}

pub(crate) struct ClientInner {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn CacheStore>,
    metrics: Arc<dyn MetricsSink>,
    registry: DedupRegistry,
    perf: PerformanceTracker,
}

impl ClientInner {
    pub(crate) async fn fetch(
        self: Arc<Self>,
        url: &str,
        options: FetchOptions,
    ) -> Result<Value, Error> {
        self.perf.record_fetch();
        let request = self.build_request(url, &options);
        let signature = Signature::of(&request);

        if !options.force_refresh() {
            match self.cache.get(signature.as_str()) {
                Ok(Some(value)) => {
                    self.perf.record_cache_hit();
                    self.metrics
                        .record_metric("fetch.cache_hit", 1.0, MetricUnit::Count, &[]);
                    log::debug!("cache hit for {} {}", request.method, request.url);
                    return Ok(value);
                }
                Ok(None) => {
                    self.perf.record_cache_miss();
                    self.metrics
                        .record_metric("fetch.cache_miss", 1.0, MetricUnit::Count, &[]);
                }
                Err(err) => {
                    // Fail open: an unreachable cache is a miss, never a
                    // fetch failure.
                    self.perf.record_cache_miss();
                    log::warn!("cache read failed, treating as miss: {err}");
                }
            }
        }

        let receiver = match self.registry.join_or_lead(&signature) {
            JoinOutcome::Joined(receiver) => {
                self.perf.record_dedup_join();
                self.metrics
                    .record_metric("fetch.deduplicated", 1.0, MetricUnit::Count, &[]);
                log::debug!("joining in-flight request for {} {}", request.method, request.url);
                receiver
            }
            JoinOutcome::Lead(receiver) => {
                // Detached so the operation runs to completion even if every
                // interested caller goes away before it settles.
                let client = Arc::clone(&self);
                let signature = signature.clone();
                tokio::spawn(async move {
                    client.drive(signature, request, options).await;
                });
                receiver
            }
        };

        receiver.await.unwrap_or(Err(Error::Aborted))
    }

    async fn drive(self: Arc<Self>, signature: Signature, request: HttpRequest, options: FetchOptions) {
        let outcome = self.execute_request(&request, options.retry()).await;

        if let Ok(value) = &outcome {
            let write = CacheWriteOptions {
                ttl: options
                    .cache_ttl()
                    .unwrap_or_else(|| chrono::Duration::minutes(5)),
                priority: options.cache_priority().unwrap_or(CachePriority::Normal),
                tags: options.cache_tags().clone(),
            };
            if let Err(err) = self.cache.set(signature.as_str(), value.clone(), write) {
                log::warn!("cache write failed: {err}");
            }
        }

        self.registry.settle(&signature, &outcome);
    }

    async fn execute_request(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
    ) -> Result<Value, Error> {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = Error::Aborted;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = policy.backoff_delay(attempt - 1);
                log::debug!(
                    "retrying {} {} in {delay:?} (attempt {attempt}/{max_attempts})",
                    request.method,
                    request.url
                );
                self.perf.record_retry();
                tokio::time::sleep(delay).await;
            }

            self.perf.record_network_call();
            let started = Instant::now();
            let result = self.transport.execute(request).await;
            let elapsed = started.elapsed();
            self.perf.record_network_time(elapsed);

            let attempt_attr = attempt.to_string();
            match result {
                Ok(response) if response.is_success() => {
                    self.metrics.record_metric(
                        "fetch.attempt",
                        elapsed.as_millis() as f64,
                        MetricUnit::Milliseconds,
                        &[("outcome", "success"), ("attempt", &attempt_attr)],
                    );
                    return decode_body(&response.body);
                }
                Ok(response) => {
                    self.metrics.record_metric(
                        "fetch.attempt",
                        elapsed.as_millis() as f64,
                        MetricUnit::Milliseconds,
                        &[("outcome", "status_error"), ("attempt", &attempt_attr)],
                    );
                    let error = Error::Status(response.status);
                    if !policy.should_retry_status(response.status) {
                        return Err(error);
                    }
                    log::warn!(
                        "{} {} returned {} (attempt {attempt}/{max_attempts})",
                        request.method,
                        request.url,
                        response.status
                    );
                    last_error = error;
                }
                Err(err) => {
                    self.metrics.record_metric(
                        "fetch.attempt",
                        elapsed.as_millis() as f64,
                        MetricUnit::Milliseconds,
                        &[("outcome", "network_error"), ("attempt", &attempt_attr)],
                    );
                    log::warn!(
                        "{} {} failed: {err} (attempt {attempt}/{max_attempts})",
                        request.method,
                        request.url
                    );
                    last_error = Error::Network(err.to_string());
                }
            }
        }

        Err(Error::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(last_error),
        })
    }

    pub(crate) fn prefetch(self: Arc<Self>, urls: &[String], options: FetchOptions) {
        let options = options.for_prefetch();

        for url in urls {
            let request = self.build_request(url, &options);
            let signature = Signature::of(&request);
            match self.cache.contains(signature.as_str()) {
                Ok(true) => {
                    log::debug!("prefetch skipped, already cached: {url}");
                    continue;
                }
                Ok(false) => {}
                Err(err) => log::debug!("cache unavailable during prefetch: {err}"),
            }

            let client = Arc::clone(&self);
            let options = options.clone();
            let url = url.clone();
            tokio::spawn(async move {
                if let Err(err) = client.fetch(&url, options).await {
                    log::debug!("prefetch for {url} failed: {err}");
                }
            });
        }
    }

    fn build_request(&self, url: &str, options: &FetchOptions) -> HttpRequest {
        HttpRequest {
            url: options::canonical_url(url, options.params()),
            method: options.method(),
            headers: options.headers().clone(),
            body: options.body().clone(),
        }
    }
}

fn decode_body(body: &[u8]) -> Result<Value, Error> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|err| Error::Decode(err.to_string()))
}
