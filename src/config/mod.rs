// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the gateway process

use std::env;
use std::time::Duration;

use crate::lodestone::pagination::DEFAULT_MAX_CONCURRENT_PAGES;

/// Default period of the expired cache entry sweep
pub const DEFAULT_CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Cache lifetimes of the JSON routes
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTtls {
    /// `/character/search`
    pub search: Duration,
    /// `/character/{id}`
    pub character: Duration,
    /// `/character/{id}/avatar`
    pub avatar: Duration,
}

impl Default for RouteTtls {
    fn default() -> Self {
        Self {
            search: Duration::from_secs(3600),
            character: Duration::from_secs(15 * 60),
            avatar: Duration::from_secs(30 * 60),
        }
    }
}

/// Configuration for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Lodestone region subdomain (eu, na, jp, fr, de)
    pub region: String,
    /// Whether upstream documents are cached
    pub upstream_cache_enabled: bool,
    /// Max age of cached upstream documents
    pub upstream_cache_ttl: Duration,
    /// Maximum cached upstream documents, 0 for unbounded
    pub upstream_cache_max_entries: usize,
    /// Maximum pages of one listing fetched at the same time
    pub max_concurrent_pages: usize,
    /// Timeout of a single upstream attempt
    pub request_timeout: Duration,
    /// Max age of cached route responses
    pub route_ttls: RouteTtls,
    /// Maximum cached route responses, 0 for unbounded
    pub route_cache_max_entries: usize,
    /// How often expired entries are dropped from both caches
    pub cache_purge_interval: Duration,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

/// Normalize a listen address: a bare `:port` binds every interface
fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Listen address from the `PORT` value and the positional address
///
/// A non-empty `port` wins and binds every interface, then `positional`.
/// `None` when neither is given.
pub fn resolve_listen_addr(positional: Option<&str>, port: Option<&str>) -> Option<String> {
    match port.filter(|p| !p.is_empty()) {
        Some(port) => Some(format!("0.0.0.0:{}", port)),
        None => positional.map(normalize_listen_addr),
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let route_defaults = RouteTtls::default();

        Self {
            listen_addr: resolve_listen_addr(None, env::var("PORT").ok().as_deref())
                .unwrap_or(defaults.listen_addr),
            region: env::var("LODESTONE_REGION")
                .ok()
                .filter(|r| !r.is_empty())
                .unwrap_or(defaults.region),
            // Any non-empty value disables the upstream cache
            upstream_cache_enabled: env::var("LODESTONE_NOCACHE")
                .map(|v| v.is_empty())
                .unwrap_or(true),
            upstream_cache_ttl: env_secs("LODESTONE_CACHE_TTL_SECS")
                .unwrap_or(defaults.upstream_cache_ttl),
            upstream_cache_max_entries: env_parse("LODESTONE_CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.upstream_cache_max_entries),
            max_concurrent_pages: env_parse("LODESTONE_MAX_CONCURRENT_PAGES")
                .unwrap_or(defaults.max_concurrent_pages),
            request_timeout: env_secs("LODESTONE_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            route_ttls: RouteTtls {
                search: env_secs("ROUTE_TTL_SEARCH_SECS").unwrap_or(route_defaults.search),
                character: env_secs("ROUTE_TTL_CHARACTER_SECS")
                    .unwrap_or(route_defaults.character),
                avatar: env_secs("ROUTE_TTL_AVATAR_SECS").unwrap_or(route_defaults.avatar),
            },
            route_cache_max_entries: env_parse("ROUTE_CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.route_cache_max_entries),
            cache_purge_interval: env_secs("CACHE_PURGE_INTERVAL_SECS")
                .unwrap_or(defaults.cache_purge_interval),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.region.is_empty() || !self.region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Invalid lodestone region '{}'", self.region));
        }
        if self.max_concurrent_pages == 0 {
            return Err("Max concurrent pages must be greater than 0".to_string());
        }
        if self.request_timeout.is_zero() {
            return Err("Request timeout must be greater than 0".to_string());
        }
        if self.upstream_cache_enabled && self.upstream_cache_ttl.is_zero() {
            return Err("Upstream cache TTL must be greater than 0".to_string());
        }
        if self.cache_purge_interval.is_zero() {
            return Err("Cache purge interval must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Base URL of the configured Lodestone region
    pub fn lodestone_base_url(&self) -> String {
        format!("https://{}.finalfantasyxiv.com", self.region)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            region: "eu".to_string(),
            upstream_cache_enabled: true,
            upstream_cache_ttl: Duration::from_secs(15 * 60),
            upstream_cache_max_entries: 0,
            max_concurrent_pages: DEFAULT_MAX_CONCURRENT_PAGES,
            request_timeout: Duration::from_secs(10),
            route_ttls: RouteTtls::default(),
            route_cache_max_entries: 0,
            cache_purge_interval: DEFAULT_CACHE_PURGE_INTERVAL,
        }
    }
}
