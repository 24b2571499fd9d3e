// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Router tests over an in-memory Lodestone

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use lodestone_gateway::{
    api::{create_router, AppState, ErrorResponse, HealthResponse},
    config::RouteTtls,
    lodestone::{Fetcher, LodestoneError, LodestoneService, RawResponse, SearchResult},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use url::Url;

use crate::common::{achievement_html, character_html, search_html};

const BASE: &str = "https://eu.finalfantasyxiv.com";

/// Serves fixed documents by full URL, everything else is `fallback`
struct FakeLodestone {
    documents: HashMap<String, String>,
    fallback: LodestoneError,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for FakeLodestone {
    async fn fetch(&self, target: &Url) -> Result<RawResponse, LodestoneError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.documents.get(target.as_str()) {
            Some(body) => Ok(RawResponse::new(200, body.clone())),
            None => Err(self.fallback.clone()),
        }
    }
}

fn setup(documents: Vec<(&str, String)>, fallback: LodestoneError) -> (Router, Arc<FakeLodestone>) {
    let fake = Arc::new(FakeLodestone {
        documents: documents
            .into_iter()
            .map(|(path, body)| (format!("{}{}", BASE, path), body))
            .collect(),
        fallback,
        calls: AtomicUsize::new(0),
    });
    let service = LodestoneService::new(
        Url::parse(BASE).unwrap(),
        Arc::clone(&fake) as Arc<dyn Fetcher>,
        4,
    );
    let state = AppState::new(Arc::new(service), RouteTtls::default(), 0);
    (create_router(state), fake)
}

fn standard_lodestone() -> (Router, Arc<FakeLodestone>) {
    setup(
        vec![
            (
                "/lodestone/character/7/",
                character_html("Roo Bre", "https://img.example/face.jpg"),
            ),
            (
                "/lodestone/character/?q=Roo+Bre&worldname=Ragnarok",
                search_html(&[(7, "Roo Bre")]),
            ),
            ("/lodestone/character/?q=Nobody&worldname=Ragnarok", search_html(&[])),
            (
                "/lodestone/character/7/achievement/",
                achievement_html(1, None, 0),
            ),
        ],
        LodestoneError::Status(404),
    )
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_redirects_to_health() {
    let (app, _) = standard_lodestone();
    let response = get(&app, "/").await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/health");
}

#[tokio::test]
async fn test_health() {
    let (app, _) = standard_lodestone();
    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = body_json(response).await;
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_search_requires_name_and_world() {
    let (app, fake) = standard_lodestone();

    for uri in [
        "/character/search",
        "/character/search?name=Roo",
        "/character/search?world=Ragnarok",
        "/character/search?name=&world=Ragnarok",
    ] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let error: ErrorResponse = body_json(response).await;
        assert_eq!(error.error_type, "invalid_request");
    }
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_results_are_cached() {
    let (app, fake) = standard_lodestone();
    let uri = "/character/search?name=Roo%20Bre&world=ragnarok";

    let response = get(&app, uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=3600");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let results: Vec<SearchResult> = body_json(response).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 7);

    let again = get(&app, uri).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_without_results_is_not_found() {
    let (app, fake) = standard_lodestone();
    let uri = "/character/search?name=Nobody&world=Ragnarok";

    assert_eq!(get(&app, uri).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, uri).await.status(), StatusCode::NOT_FOUND);
    // Failed renders are not cached
    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_character() {
    let (app, _) = standard_lodestone();
    let response = get(&app, "/character/7").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=900");
    let character: serde_json::Value = body_json(response).await;
    assert_eq!(character["name"], "Roo Bre");
    assert_eq!(character["grandCompany"]["name"], "Maelstrom");
    assert!(character["achievements"].is_null());
}

#[tokio::test]
async fn test_character_bad_id() {
    let (app, fake) = standard_lodestone();
    let response = get(&app, "/character/roo").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_character_not_found() {
    let (app, _) = standard_lodestone();
    let response = get(&app, "/character/8").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ErrorResponse = body_json(response).await;
    assert_eq!(error.error_type, "not_found");
}

#[tokio::test]
async fn test_private_achievements_are_forbidden() {
    let (app, _) = standard_lodestone();
    let response = get(&app, "/character/7?achievements=1").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let error: ErrorResponse = body_json(response).await;
    assert_eq!(error.error_type, "not_public");
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let (app, _) = setup(vec![], LodestoneError::Status(503));
    let response = get(&app, "/character/7").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error: ErrorResponse = body_json(response).await;
    assert_eq!(error.error_type, "upstream_error");
}

#[tokio::test]
async fn test_avatar_redirect() {
    let (app, fake) = standard_lodestone();

    let response = get(&app, "/character/7/avatar").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://img.example/face.jpg"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=1800");

    get(&app, "/character/7/avatar").await;
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}
