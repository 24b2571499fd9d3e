// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types shared by the fetch, cache and pagination layers

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;

/// A raw upstream response: status, headers and the fully buffered body
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code returned by the upstream
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Bytes,
}

impl RawResponse {
    /// Build a response with no headers
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }
}

/// Errors produced while talking to the Lodestone
///
/// Every variant is `Clone` so a single failed population can be handed to
/// every task waiting on the same cache entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LodestoneError {
    /// DNS, connect, TLS or I/O failure. Never retried.
    #[error("lodestone unreachable: {0}")]
    Connectivity(String),

    /// Non-200 status from the upstream, after any retries
    #[error("lodestone returned status {0} {reason}", reason = status_text(.0))]
    Status(u16),

    /// The resource exists but does not expose its paginated listing
    #[error("{resource} is not public")]
    NotPublic {
        /// Human readable description of the resource
        resource: String,
    },

    /// A document was missing data required to build a domain object
    #[error("failed to parse lodestone document: {0}")]
    Parse(String),

    /// A concurrent page task panicked or was cancelled by the runtime
    #[error("page task failed: {0}")]
    TaskFailed(String),
}

impl LodestoneError {
    /// Whether the upstream reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(code) if *code == StatusCode::NOT_FOUND.as_u16())
    }
}

impl From<reqwest::Error> for LodestoneError {
    fn from(e: reqwest::Error) -> Self {
        Self::Connectivity(e.to_string())
    }
}

fn status_text(code: &u16) -> &'static str {
    StatusCode::from_u16(*code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
