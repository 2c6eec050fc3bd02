use crate::error::Error;
use crate::options::{canonical_url, FetchOptions};
use crate::TalentClient;
use getset::{CopyGetters, Getters};
use serde_json::Value;

/// Options for paged listings.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct PageOptions {
    /// Items per page, sent as the `limit` query parameter.
    #[getset(get_copy = "pub")]
    page_size: usize,
    /// How many pages on each side of the current one to warm up.
    #[getset(get_copy = "pub")]
    prefetch_pages: u32,
    /// Extra filter query parameters, e.g. `("skill", "rust")`.
    #[getset(get = "pub")]
    filters: Vec<(String, String)>,
    /// Options applied to the underlying fetches.
    #[getset(get = "pub")]
    fetch: FetchOptions,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            prefetch_pages: 2,
            filters: Vec::new(),
            fetch: FetchOptions::default(),
        }
    }
}

impl PageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_prefetch_pages(mut self, prefetch_pages: u32) -> Self {
        self.prefetch_pages = prefetch_pages;
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((name.into(), value.into()));
        self
    }

    pub fn with_fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }
}

/// Fetches pages through a [`TalentClient`] and opportunistically warms the
/// neighboring pages so paging forward or back hits the cache.
pub struct PaginationPrefetcher {
    client: TalentClient,
}

impl PaginationPrefetcher {
    pub fn new(client: TalentClient) -> Self {
        Self { client }
    }

    /// Fetches one page, then triggers the adjacent-page warm-up without
    /// blocking the caller. The page fetch inherits cache and dedup.
    pub async fn fetch_page(
        &self,
        base_url: &str,
        page: u32,
        options: PageOptions,
    ) -> Result<Value, Error> {
        let result = self
            .client
            .fetch(base_url, page_fetch_options(page, &options))
            .await;
        self.prefetch_adjacent_pages(base_url, page, &options);
        result
    }

    /// Issues low-priority prefetches for the pages around `page`, skipping
    /// pages below 1. Already-cached pages are skipped by the prefetch path;
    /// failures never surface here.
    pub fn prefetch_adjacent_pages(&self, base_url: &str, page: u32, options: &PageOptions) {
        let neighbors = window_pages(page, options.prefetch_pages());
        if neighbors.is_empty() {
            return;
        }

        let urls: Vec<String> = neighbors
            .iter()
            .map(|neighbor| {
                let page_options = page_fetch_options(*neighbor, options);
                canonical_url(base_url, page_options.params())
            })
            .collect();

        log::debug!("warming pages {neighbors:?} around page {page}");
        self.client
            .prefetch(&urls, options.fetch().clone().with_params(Vec::new()));
    }
}

fn page_fetch_options(page: u32, options: &PageOptions) -> FetchOptions {
    let mut params = options.fetch().params().clone();
    params.push(("page".to_string(), page.to_string()));
    params.push(("limit".to_string(), options.page_size().to_string()));
    params.extend(options.filters().iter().cloned());
    options.fetch().clone().with_params(params)
}

/// Pages `[page-w, page-1]` and `[page+1, page+w]`, clamped at 1.
fn window_pages(page: u32, window: u32) -> Vec<u32> {
    if window == 0 {
        return Vec::new();
    }
    let first = page.saturating_sub(window).max(1);
    let last = page.saturating_add(window);
    (first..=last).filter(|candidate| *candidate != page).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_surrounds_the_current_page() {
        assert_eq!(window_pages(5, 2), vec![3, 4, 6, 7]);
    }

    #[test]
    fn window_never_goes_below_page_one() {
        assert_eq!(window_pages(1, 2), vec![2, 3]);
        assert_eq!(window_pages(2, 2), vec![1, 3, 4]);
    }

    #[test]
    fn zero_window_prefetches_nothing() {
        assert!(window_pages(5, 0).is_empty());
    }

    #[test]
    fn page_urls_are_canonical() {
        let options = PageOptions::new().with_filter("skill", "rust");
        let fetch = page_fetch_options(5, &options);
        let url = canonical_url("https://api.talent.example/candidates", fetch.params());

        assert_eq!(
            url,
            "https://api.talent.example/candidates?limit=20&page=5&skill=rust"
        );
    }
}
