// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lodestone access layer
//!
//! Provides:
//! - A retrying fetch client with status-classified backoff
//! - A single-flight response cache with TTL and bounded eviction
//! - A caching transport adapter that puts the cache in front of any fetcher
//! - Concurrent aggregation of paginated listings
//! - HTML extraction and the `LodestoneService` facade

pub mod cache;
pub mod caching;
pub mod client;
pub mod pagination;
pub mod parser;
pub mod retry;
pub mod service;
pub mod types;

pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use caching::{CachingFetcher, DocumentCache};
pub use client::{FetchClient, Fetcher, ReqwestTransport, Transport, UpstreamRequest};
pub use pagination::{PageAggregator, PagedResource, DEFAULT_MAX_CONCURRENT_PAGES};
pub use parser::{Achievement, Character, ClassJob, FreeCompany, GrandCompany, SearchResult};
pub use retry::{FetchAttempt, RETRYABLE_STATUSES, RETRY_DEADLINE};
pub use service::{AchievementListing, Features, LodestoneService};
pub use types::{LodestoneError, RawResponse};
