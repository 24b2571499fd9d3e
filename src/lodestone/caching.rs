// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Transparent caching in front of a [`Fetcher`]
//!
//! `CachingFetcher` implements `Fetcher` itself, so the Lodestone facade and
//! the page aggregator work the same with or without a cache in between.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::cache::{CacheKey, ResponseCache};
use super::client::Fetcher;
use super::types::{LodestoneError, RawResponse};

/// Cache of raw upstream documents keyed by normalized GET URL
pub type DocumentCache = ResponseCache<RawResponse, LodestoneError>;

/// Routes every fetch through a shared [`DocumentCache`]
pub struct CachingFetcher<F: Fetcher> {
    inner: F,
    cache: Arc<DocumentCache>,
    max_age: Duration,
}

impl<F: Fetcher> CachingFetcher<F> {
    /// Wrap `inner`, serving documents younger than `max_age` from `cache`
    pub fn new(inner: F, cache: Arc<DocumentCache>, max_age: Duration) -> Self {
        Self {
            inner,
            cache,
            max_age,
        }
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachingFetcher<F> {
    async fn fetch(&self, target: &Url) -> Result<RawResponse, LodestoneError> {
        let key = CacheKey::for_get(target);
        self.cache
            .access(&key, self.max_age, || self.inner.fetch(target))
            .await
    }
}
