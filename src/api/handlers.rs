// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Route handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::errors::ApiError;
use super::http_server::AppState;
use super::route_cache::CachedResponse;
use crate::lodestone::Features;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub world: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CharacterParams {
    pub achievements: Option<String>,
    pub classjob: Option<String>,
}

impl CharacterParams {
    /// Any non-empty value enables a feature
    pub fn features(&self) -> Features {
        let enabled = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.is_empty());
        Features {
            achievements: enabled(&self.achievements),
            class_jobs: enabled(&self.classjob),
        }
    }
}

fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidRequest(format!("invalid character id '{}'", raw)))
}

fn log_failure(route: &str, err: &ApiError) {
    match err {
        ApiError::Upstream(_) | ApiError::InternalError(_) => warn!("{} failed: {}", route, err),
        _ => debug!("{} rejected: {}", route, err),
    }
}

/// GET / - the API has no index page
pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/health")])
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /character/search?name=&world=
///
/// # Errors
/// - 400 Bad Request: `name` or `world` missing
/// - 404 Not Found: no character matched
/// - 502 Bad Gateway: Lodestone failed
pub async fn search_handler(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<SearchParams>,
) -> Response {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(name), Some(world)) = (non_empty(params.name), non_empty(params.world)) else {
        return ApiError::InvalidRequest("name and world are required".to_string())
            .into_response();
    };

    state
        .route_cache
        .serve(&uri, state.route_ttls.search, || async {
            let results = state
                .lodestone
                .search(&name, &world)
                .await
                .map_err(ApiError::from)
                .inspect_err(|e| log_failure("search", e))?;

            if results.is_empty() {
                return Err(ApiError::NotFound(format!(
                    "no character named '{}' on {}",
                    name, world
                )));
            }
            CachedResponse::json(&results)
        })
        .await
}

/// GET /character/:id[?achievements=1&classjob=1]
///
/// # Errors
/// - 400 Bad Request: id is not a number
/// - 403 Forbidden: achievements requested but private
/// - 404 Not Found: no such character
/// - 502 Bad Gateway: Lodestone failed
pub async fn character_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    uri: Uri,
    Query(params): Query<CharacterParams>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let features = params.features();

    state
        .route_cache
        .serve(&uri, state.route_ttls.character, || async {
            let character = state
                .lodestone
                .character(id, features)
                .await
                .map_err(ApiError::from)
                .inspect_err(|e| log_failure("character", e))?;
            CachedResponse::json(&character)
        })
        .await
}

/// GET /character/:id/avatar - redirects to the avatar image
pub async fn avatar_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    uri: Uri,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    state
        .route_cache
        .serve(&uri, state.route_ttls.avatar, || async {
            let character = state
                .lodestone
                .character(id, Features::default())
                .await
                .map_err(ApiError::from)
                .inspect_err(|e| log_failure("avatar", e))?;
            CachedResponse::redirect(&character.avatar)
        })
        .await
}
