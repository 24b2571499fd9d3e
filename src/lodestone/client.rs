// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resilient fetch client for the Lodestone
//!
//! `FetchClient` issues one logical GET, classifies the outcome and retries
//! rate limits and gateway errors with jittered backoff until
//! [`RETRY_DEADLINE`] has passed since the first attempt.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, DNT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::retry::{backoff, FetchAttempt, RETRY_DEADLINE};
use super::types::{LodestoneError, RawResponse};

const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.5";
const USER_AGENT_VALUE: &str =
    "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:77.0) Gecko/20100101 Firefox/81.0";

/// Anything able to turn a fully formed target URL into a raw response
///
/// Implemented by [`FetchClient`] and by the caching adapter that wraps it, so
/// consumers never need to know whether a cache sits in between.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &Url) -> Result<RawResponse, LodestoneError>;
}

/// A single outbound GET
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

/// One network round trip, without any retry logic
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request. Errors are transport level only; any status
    /// code, including 5xx, is a successful round trip.
    async fn execute(&self, request: &UpstreamRequest) -> Result<RawResponse, LodestoneError>;
}

/// `reqwest` backed transport sharing one connection pool
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport whose individual attempts time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, LodestoneError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &UpstreamRequest) -> Result<RawResponse, LodestoneError> {
        let response = self
            .client
            .get(request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Fetch client with classification driven retries
pub struct FetchClient<T: Transport = ReqwestTransport> {
    transport: T,
}

impl FetchClient<ReqwestTransport> {
    /// Create a client over a fresh `reqwest` connection pool
    pub fn new(attempt_timeout: Duration) -> Result<Self, LodestoneError> {
        Ok(Self::with_transport(ReqwestTransport::new(attempt_timeout)?))
    }
}

impl<T: Transport> FetchClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Build the GET with the fixed identification headers
    fn build_request(target: &Url) -> UpstreamRequest {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(DNT, HeaderValue::from_static("1"));

        UpstreamRequest {
            url: target.clone(),
            headers,
        }
    }
}

#[async_trait]
impl<T: Transport> Fetcher for FetchClient<T> {
    async fn fetch(&self, target: &Url) -> Result<RawResponse, LodestoneError> {
        let request = Self::build_request(target);
        let started = Instant::now();
        let mut rng = StdRng::from_entropy();
        let mut state = FetchAttempt::first();

        loop {
            let response = self.transport.execute(&request).await.map_err(|e| {
                debug!("Request to {} failed hard: {}", target, e);
                e
            })?;

            state.elapsed = started.elapsed();
            state.last_status = Some(response.status);

            if response.is_ok() {
                return Ok(response);
            }

            if !state.should_retry() {
                if state.elapsed >= RETRY_DEADLINE {
                    warn!(
                        "Giving up on {} after {} attempts in {:.1}s (status {})",
                        target,
                        state.attempt,
                        state.elapsed.as_secs_f64(),
                        response.status
                    );
                }
                return Err(LodestoneError::Status(response.status));
            }

            let Some(wait) = backoff(response.status, state.attempt, &mut rng) else {
                return Err(LodestoneError::Status(response.status));
            };

            warn!(
                "Lodestone returned {} for {}, retrying in {}s (attempt {})",
                response.status,
                target,
                wait.as_secs(),
                state.attempt
            );
            tokio::time::sleep(wait).await;
            state.attempt += 1;
        }
    }
}
