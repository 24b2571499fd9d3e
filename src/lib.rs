// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod lodestone;
pub mod version;

// Re-export main types
pub use api::{create_router, ApiError, AppState};
pub use config::{GatewayConfig, RouteTtls};
pub use lodestone::{
    CacheKey, CachingFetcher, FetchClient, Fetcher, LodestoneError, LodestoneService,
    PageAggregator, ResponseCache,
};
