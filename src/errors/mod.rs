// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing error handling.
//!
//! Maps the backend's error taxonomy onto HTTP responses without leaking
//! internal detail: gateway URLs, file system paths, and upstream error
//! chains stay in the tracing log. Every response carries a reference code
//! so a log line can be found from a bug report.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;

/// Generate a unique error reference code.
/// Format: ERR-YYYYMMDD-XXXXXX (e.g., ERR-20250115-A3F8K2)
pub fn generate_reference_code() -> String {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".chars().collect();
    let random: String = (0..6)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect();
    format!("ERR-{}-{}", date, random)
}

/// User-facing error responses.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum UserError {
    /// The backend is up but the Soulseek session is not (503).
    ServiceUnavailable { message: String, reference: String },

    /// Invalid request from the client (400).
    InvalidRequest { message: String, reference: String },

    /// Resource not found (404).
    NotFound { message: String, reference: String },

    /// Internal server error (500). Never exposes internal details.
    InternalError { message: String, reference: String },
}

impl UserError {
    /// Session is not connected to the Soulseek network.
    pub fn not_connected() -> Self {
        let reference = generate_reference_code();
        tracing::warn!(%reference, "Request rejected: not connected to Soulseek");
        UserError::ServiceUnavailable {
            message: "Not connected to Soulseek".to_string(),
            reference,
        }
    }

    /// A malformed client input, such as an unparseable download id.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        let message = message.into();
        let reference = generate_reference_code();
        tracing::warn!(%reference, %message, "Invalid request");
        UserError::InvalidRequest { message, reference }
    }

    /// A gateway dispatch that failed. The upstream error is logged in
    /// full; the client sees only the summary message.
    pub fn dispatch_failure(summary: impl Into<String>, source: &anyhow::Error) -> Self {
        let message = summary.into();
        let reference = generate_reference_code();
        tracing::error!(%reference, %message, error = %format!("{:#}", source), "Dispatch failure");
        UserError::InternalError { message, reference }
    }

    /// Resource lookup miss.
    pub fn not_found(message: impl Into<String>) -> Self {
        UserError::NotFound {
            message: message.into(),
            reference: generate_reference_code(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UserError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            UserError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            UserError::NotFound { .. } => StatusCode::NOT_FOUND,
            UserError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing message.
    pub fn message(&self) -> &str {
        match self {
            UserError::ServiceUnavailable { message, .. } => message,
            UserError::InvalidRequest { message, .. } => message,
            UserError::NotFound { message, .. } => message,
            UserError::InternalError { message, .. } => message,
        }
    }
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for UserError {}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}
