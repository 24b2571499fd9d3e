// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! FetchClient against a real HTTP upstream through the reqwest transport

use lodestone_gateway::lodestone::{FetchClient, Fetcher, LodestoneError};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use url::Url;

use crate::common::MockUpstream;

fn client() -> FetchClient {
    FetchClient::new(Duration::from_secs(5)).expect("Failed to build client")
}

#[tokio::test]
async fn test_fetch_sends_identification_headers() {
    let upstream = MockUpstream::start().await;
    upstream.serve("/lodestone/character/1/", "hello");

    let response = client()
        .fetch(&upstream.url("/lodestone/character/1/"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "hello");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].accept_language.as_deref(),
        Some("en-US,en;q=0.5")
    );
    assert!(requests[0]
        .user_agent
        .as_deref()
        .unwrap_or_default()
        .starts_with("Mozilla/5.0"));
    assert_eq!(requests[0].dnt.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let upstream = MockUpstream::start().await;

    let err = client()
        .fetch(&upstream.url("/lodestone/character/0/"))
        .await
        .unwrap_err();

    assert_eq!(err, LodestoneError::Status(404));
    assert!(err.is_not_found());
    assert_eq!(upstream.hits("/lodestone/character/0/"), 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let upstream = MockUpstream::start().await;
    upstream.script("/broken", vec![(500, "boom".to_string())]);

    let err = client().fetch(&upstream.url("/broken")).await.unwrap_err();

    assert_eq!(err, LodestoneError::Status(500));
    assert_eq!(upstream.hits("/broken"), 1);
}

#[tokio::test]
async fn test_rate_limit_is_retried_after_backoff() {
    let upstream = MockUpstream::start().await;
    upstream.script(
        "/limited",
        vec![(429, "slow down".to_string()), (200, "ok".to_string())],
    );

    let started = Instant::now();
    let response = client().fetch(&upstream.url("/limited")).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.text(), "ok");
    assert_eq!(upstream.hits("/limited"), 2);
    // 429 waits 1..=3 seconds on the first attempt
    assert!(elapsed >= Duration::from_secs(1), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_connection_refused_is_connectivity_error() {
    // Grab a free port, then close it again
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/lodestone/character/1/", addr)).unwrap();
    let started = Instant::now();
    let err = client().fetch(&url).await.unwrap_err();

    assert!(matches!(err, LodestoneError::Connectivity(_)), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(1));
}
