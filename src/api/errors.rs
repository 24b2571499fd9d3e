// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lodestone::LodestoneError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
}

/// Errors returned by the JSON routes
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not public: {0}")]
    NotPublic(String),

    /// Lodestone failed or was unreachable
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotPublic(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg),
            ApiError::NotFound(msg) => ("not_found", msg),
            ApiError::NotPublic(msg) => ("not_public", msg),
            ApiError::Upstream(msg) => ("upstream_error", msg),
            ApiError::InternalError(msg) => ("internal_error", msg),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message: message.clone(),
        }
    }
}

impl From<LodestoneError> for ApiError {
    fn from(err: LodestoneError) -> Self {
        match &err {
            e if e.is_not_found() => ApiError::NotFound(err.to_string()),
            LodestoneError::NotPublic { .. } => ApiError::NotPublic(err.to_string()),
            _ => ApiError::Upstream(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_response())).into_response()
    }
}
