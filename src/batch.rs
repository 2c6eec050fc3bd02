use crate::error::Error;
use crate::options::{FetchOptions, Method};
use crate::ClientInner;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Scheduling knobs for the batch queue.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// How long the first enqueued request waits for companions before the
    /// queue dispatches.
    pub dispatch_delay: std::time::Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            dispatch_delay: std::time::Duration::from_millis(10),
        }
    }
}

impl BatchConfig {
    /// Longer window for constrained clients, trading latency for fewer
    /// request bursts.
    pub fn constrained() -> Self {
        Self {
            dispatch_delay: std::time::Duration::from_millis(50),
        }
    }
}

/// One request handed to [`TalentClient::batch_fetch`](crate::TalentClient::batch_fetch).
#[derive(Clone, Debug)]
pub struct BatchRequest {
    pub url: String,
    pub options: FetchOptions,
}

impl BatchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }
}

struct BatchItem {
    request: BatchRequest,
    waiter: oneshot::Sender<Result<Value, Error>>,
}

/// Accumulates requests arriving within a short window, groups them by
/// logical endpoint and dispatches every item through the fetch path.
///
/// Grouping is a scheduling and logging construct: each item still issues
/// one physical call (and so still benefits from cache and dedup). Items
/// settle independently; one failure never touches its siblings.
pub(crate) struct BatchScheduler {
    queue: Mutex<Vec<BatchItem>>,
    timer_armed: AtomicBool,
    config: BatchConfig,
}

impl BatchScheduler {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            timer_armed: AtomicBool::new(false),
            config,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub async fn enqueue(
        self: Arc<Self>,
        client: Arc<ClientInner>,
        request: BatchRequest,
    ) -> Result<Value, Error> {
        let (tx, rx) = oneshot::channel();

        {
            let mut queue = match self.queue.lock() {
                Ok(queue) => queue,
                Err(_) => return Err(Error::Aborted),
            };
            queue.push(BatchItem {
                request,
                waiter: tx,
            });
        }

        if !self.timer_armed.swap(true, Ordering::SeqCst) {
            let scheduler = Arc::clone(&self);
            let delay = self.config.dispatch_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.dispatch(client).await;
            });
        }

        rx.await.unwrap_or(Err(Error::Aborted))
    }

    async fn dispatch(&self, client: Arc<ClientInner>) {
        // Disarm before draining so requests landing mid-dispatch get a
        // fresh timer instead of sitting in the queue indefinitely.
        self.timer_armed.store(false, Ordering::SeqCst);

        let items: Vec<BatchItem> = match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => return,
        };
        if items.is_empty() {
            return;
        }

        let mut groups: HashMap<(Method, String), Vec<BatchItem>> = HashMap::new();
        for item in items {
            groups.entry(endpoint_of(&item.request)).or_default().push(item);
        }
        log::debug!("dispatching {} batch group(s)", groups.len());

        let group_futures = groups.into_iter().map(|((method, path), items)| {
            let client = Arc::clone(&client);
            async move {
                log::debug!("batch group {method} {path}: {} item(s)", items.len());
                let calls = items.into_iter().map(|item| {
                    let client = Arc::clone(&client);
                    async move {
                        let result = client.fetch(&item.request.url, item.request.options).await;
                        let _ = item.waiter.send(result);
                    }
                });
                join_all(calls).await;
            }
        });
        join_all(group_futures).await;
    }
}

/// Logical endpoint of a request: method plus the URL path before any query.
fn endpoint_of(request: &BatchRequest) -> (Method, String) {
    let path = request
        .url
        .split('?')
        .next()
        .unwrap_or(request.url.as_str())
        .to_string();
    (request.options.method(), path)
}
