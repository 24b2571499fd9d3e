// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Response cache for rendered routes
//!
//! Handlers render into a [`CachedResponse`] which is stored under the
//! request URI, so concurrent identical requests share one render and later
//! ones are served from memory until the route TTL runs out. Errors are
//! never stored.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use super::errors::ApiError;
use crate::lodestone::{CacheKey, CacheStats, ResponseCache};

/// A fully rendered route response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    /// 200 with `value` serialized as JSON
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| ApiError::InternalError(format!("failed to encode response: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(Self {
            status: StatusCode::OK,
            headers,
            body: Bytes::from(body),
        })
    }

    /// 302 to `location`
    pub fn redirect(location: &str) -> Result<Self, ApiError> {
        let location = HeaderValue::from_str(location)
            .map_err(|_| ApiError::Upstream(format!("invalid redirect target '{}'", location)))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, location);

        Ok(Self {
            status: StatusCode::FOUND,
            headers,
            body: Bytes::new(),
        })
    }

    fn into_response_with_max_age(self, max_age: Duration) -> Response {
        let mut response = (self.status, self.headers, self.body).into_response();
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", max_age.as_secs())) {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
        response
    }
}

/// Route level cache keyed by request URI
pub struct RouteCache {
    cache: ResponseCache<CachedResponse, ApiError>,
}

impl RouteCache {
    /// `max_entries` of 0 leaves the cache unbounded
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: ResponseCache::new(max_entries),
        }
    }

    /// Key of a GET for `uri`, path and query as received
    pub fn key(uri: &Uri) -> CacheKey {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        CacheKey::new(format!("GET {}", target))
    }

    /// Serve `uri` from the cache or render it with `render`
    ///
    /// Successful responses carry `cache-control: max-age=<max_age>`.
    pub async fn serve<F, Fut>(&self, uri: &Uri, max_age: Duration, render: F) -> Response
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedResponse, ApiError>>,
    {
        match self.cache.access(&Self::key(uri), max_age, render).await {
            Ok(cached) => cached.into_response_with_max_age(max_age),
            Err(e) => e.into_response(),
        }
    }

    /// Drop responses that outlived the TTL they were stored with
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
