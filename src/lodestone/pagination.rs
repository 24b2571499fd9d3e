// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Concurrent aggregation of paginated listings
//!
//! The first page tells us how many pages exist. Pages 2..=N are then fetched
//! by one task each, with at most `max_concurrent_pages` tasks alive at a
//! time; a new page is only spawned when an earlier one has reported. The
//! first error aborts every remaining task and is returned to the caller.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use super::client::Fetcher;
use super::types::{LodestoneError, RawResponse};

/// Default cap on concurrently fetched pages per aggregation
pub const DEFAULT_MAX_CONCURRENT_PAGES: usize = 8;

/// A listing spread over numbered pages
pub trait PagedResource: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Human readable name used in errors and logs
    fn describe(&self) -> String;

    /// URL of a 1-based page
    fn page_url(&self, page: u32) -> Url;

    /// Index of the last page as advertised by the first page, or `None`
    /// when the listing does not expose its pagination
    fn last_page(&self, first: &RawResponse) -> Option<u32>;

    /// Items on one page
    fn parse_page(&self, page: &RawResponse) -> Result<Vec<Self::Item>, LodestoneError>;
}

type PageReport<T> = (u32, Result<Vec<T>, LodestoneError>);

async fn fetch_page<R: PagedResource>(
    fetcher: Arc<dyn Fetcher>,
    resource: Arc<R>,
    page: u32,
) -> PageReport<R::Item> {
    let result = match fetcher.fetch(&resource.page_url(page)).await {
        Ok(document) => resource.parse_page(&document),
        Err(e) => Err(e),
    };
    (page, result)
}

/// Fans page fetches out over tokio tasks and concatenates the results
pub struct PageAggregator {
    fetcher: Arc<dyn Fetcher>,
    max_concurrent_pages: usize,
}

impl PageAggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>, max_concurrent_pages: usize) -> Self {
        Self {
            fetcher,
            max_concurrent_pages: max_concurrent_pages.max(1),
        }
    }

    /// Fetch and parse every page of `resource`
    ///
    /// Item order across pages is unspecified. Dropping the returned future
    /// aborts any page fetches still in flight.
    pub async fn fetch_all<R: PagedResource>(
        &self,
        resource: Arc<R>,
    ) -> Result<Vec<R::Item>, LodestoneError> {
        let first = self.fetcher.fetch(&resource.page_url(1)).await?;

        let Some(last_page) = resource.last_page(&first) else {
            return Err(LodestoneError::NotPublic {
                resource: resource.describe(),
            });
        };

        let mut items = resource.parse_page(&first)?;
        if last_page <= 1 {
            return Ok(items);
        }

        debug!(
            "Fetching {} more pages of {} ({} at a time)",
            last_page - 1,
            resource.describe(),
            self.max_concurrent_pages
        );

        let mut pages = 2..=last_page;
        let mut tasks = JoinSet::new();
        for page in pages.by_ref().take(self.max_concurrent_pages) {
            tasks.spawn(fetch_page(
                Arc::clone(&self.fetcher),
                Arc::clone(&resource),
                page,
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            let (page, result) = joined.map_err(|e| LodestoneError::TaskFailed(e.to_string()))?;
            match result {
                Ok(batch) => items.extend(batch),
                Err(e) => {
                    warn!("Page {} of {} failed: {}", page, resource.describe(), e);
                    tasks.abort_all();
                    return Err(e);
                }
            }

            if let Some(next) = pages.next() {
                tasks.spawn(fetch_page(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&resource),
                    next,
                ));
            }
        }

        Ok(items)
    }
}
