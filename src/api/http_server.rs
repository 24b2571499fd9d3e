// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::handlers::{
    avatar_handler, character_handler, health_handler, root_handler, search_handler,
};
use super::route_cache::RouteCache;
use crate::config::{GatewayConfig, RouteTtls, DEFAULT_CACHE_PURGE_INTERVAL};
use crate::lodestone::{DocumentCache, LodestoneError, LodestoneService};

#[derive(Clone)]
pub struct AppState {
    pub lodestone: Arc<LodestoneService>,
    pub route_cache: Arc<RouteCache>,
    pub route_ttls: RouteTtls,
    /// Upstream document cache, `None` when it is disabled
    pub documents: Option<Arc<DocumentCache>>,
    pub cache_purge_interval: Duration,
}

impl AppState {
    pub fn new(
        lodestone: Arc<LodestoneService>,
        route_ttls: RouteTtls,
        route_cache_max_entries: usize,
    ) -> Self {
        Self {
            lodestone,
            route_cache: Arc::new(RouteCache::new(route_cache_max_entries)),
            route_ttls,
            documents: None,
            cache_purge_interval: DEFAULT_CACHE_PURGE_INTERVAL,
        }
    }

    /// Wire the service, the upstream document cache and the route cache
    pub fn from_config(config: &GatewayConfig) -> Result<Self, LodestoneError> {
        let documents = Arc::new(DocumentCache::new(config.upstream_cache_max_entries));
        let lodestone = LodestoneService::from_config(config, Arc::clone(&documents))?;

        Ok(Self {
            documents: config.upstream_cache_enabled.then_some(documents),
            cache_purge_interval: config.cache_purge_interval,
            ..Self::new(
                Arc::new(lodestone),
                config.route_ttls.clone(),
                config.route_cache_max_entries,
            )
        })
    }

    /// Drop expired entries from the route cache and the document cache
    pub fn purge_caches(&self) -> usize {
        let mut removed = self.route_cache.purge_expired();
        if let Some(documents) = &self.documents {
            removed += documents.purge_expired();
            debug!(entries = documents.stats().total, "document cache swept");
        }

        debug!(
            removed,
            route_entries = self.route_cache.stats().total,
            "purged expired cache entries"
        );
        removed
    }
}

/// Run [`AppState::purge_caches`] every `cache_purge_interval` until aborted
fn spawn_cache_janitor(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(state.cache_purge_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            state.purge_caches();
        }
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/character/search", get(search_handler))
        .route("/character/:id", get(character_handler))
        .route("/character/:id/avatar", get(avatar_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves
pub async fn start_server<S>(listener: TcpListener, state: AppState, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let janitor = spawn_cache_janitor(state.clone());
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!("HTTP server listening on {}", addr);
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    janitor.abort();
    served?;

    info!("HTTP server stopped");
    Ok(())
}
