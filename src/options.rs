use crate::cache::CachePriority;
use crate::retry::RetryPolicy;
use chrono::Duration;
use getset::{CopyGetters, Getters};
use serde_json::Value;
use std::fmt;

/// HTTP method of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request configuration for [`TalentClient::fetch`](crate::TalentClient::fetch).
///
/// Defaults: `GET`, no headers/body/params, `force_refresh` off, cache TTL
/// 5 minutes (15 for prefetches), priority `Normal` (`Low` for prefetches),
/// no tags, [`RetryPolicy::default`].
#[derive(Clone, Debug, Default, Getters, CopyGetters)]
pub struct FetchOptions {
    #[getset(get_copy = "pub")]
    method: Method,
    #[getset(get = "pub")]
    headers: Vec<(String, String)>,
    #[getset(get = "pub")]
    body: Option<Value>,
    /// Query parameters; appended to the URL in sorted order so equivalent
    /// requests share one signature.
    #[getset(get = "pub")]
    params: Vec<(String, String)>,
    #[getset(get_copy = "pub")]
    force_refresh: bool,
    /// TTL for the cached response; `None` means the fetch/prefetch default.
    #[getset(get_copy = "pub")]
    cache_ttl: Option<Duration>,
    /// Priority hint for cache eviction; `None` means the fetch/prefetch default.
    #[getset(get_copy = "pub")]
    cache_priority: Option<CachePriority>,
    #[getset(get = "pub")]
    cache_tags: Vec<String>,
    #[getset(get = "pub")]
    retry: RetryPolicy,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Replaces the full parameter list.
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_cache_priority(mut self, priority: CachePriority) -> Self {
        self.cache_priority = Some(priority);
        self
    }

    pub fn with_cache_tag(mut self, tag: impl Into<String>) -> Self {
        self.cache_tags.push(tag.into());
        self
    }

    pub fn with_cache_tags(mut self, tags: Vec<String>) -> Self {
        self.cache_tags = tags;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Applies the prefetch defaults: low priority, 15 minute TTL, and no
    /// forced refresh. Explicitly set values are kept.
    pub(crate) fn for_prefetch(mut self) -> Self {
        self.force_refresh = false;
        self.cache_ttl = Some(self.cache_ttl.unwrap_or_else(|| Duration::minutes(15)));
        self.cache_priority = Some(self.cache_priority.unwrap_or(CachePriority::Low));
        self
    }
}

/// Appends query parameters to a URL in sorted, percent-encoded form.
///
/// Sorting keeps the URL, and therefore the request signature, independent
/// of the order callers supplied the parameters in.
pub(crate) fn canonical_url(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let mut pairs: Vec<&(String, String)> = params.iter().collect();
    pairs.sort();

    let query = pairs
        .iter()
        .map(|(name, value)| {
            format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&");

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}
