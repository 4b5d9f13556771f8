//! Centralized error types for the on-air push core library.
//!
//! This module provides a unified error handling system that:
//! - Gives every concern-level error a machine-readable code
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::artwork::ArtworkError;
use crate::control::ControlError;
use crate::metadata::ProviderError;
use crate::playlist::PlaylistError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for PlaylistError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "playlist_unavailable",
            Self::Fixture(_) => "playlist_fixture_invalid",
        }
    }
}

impl ErrorCode for ArtworkError {
    fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "artwork_store_failed",
        }
    }
}

impl ErrorCode for ProviderError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::Status(_) => "http_error_status",
            Self::RateLimited => "provider_rate_limited",
            Self::Malformed(_) => "provider_malformed_response",
        }
    }
}

/// Application-wide error type for the on-air push service.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum OnAirError {
    /// The playlist source failed.
    #[error("Playlist error: {0}")]
    Playlist(String),

    /// The artwork cache failed.
    #[error("Artwork error: {0}")]
    Artwork(String),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Socket setup or I/O failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl OnAirError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Playlist(_) => "playlist_error",
            Self::Artwork(_) => "artwork_error",
            Self::NotFound(_) => "not_found",
            Self::Network(_) => "network_error",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type OnAirResult<T> = Result<T, OnAirError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for OnAirError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PlaylistError> for OnAirError {
    fn from(err: PlaylistError) -> Self {
        Self::Playlist(err.to_string())
    }
}

impl From<ArtworkError> for OnAirError {
    fn from(err: ArtworkError) -> Self {
        Self::Artwork(err.to_string())
    }
}

impl From<ControlError> for OnAirError {
    fn from(err: ControlError) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = OnAirError::NotFound("img/abc".into());
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn control_bind_failure_is_network_error() {
        let err: OnAirError = ControlError::Bind {
            port: 5111,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        }
        .into();
        assert_eq!(err.code(), "network_error");
        assert!(err.to_string().contains("5111"));
    }

    #[test]
    fn concern_errors_have_codes() {
        assert_eq!(ProviderError::RateLimited.code(), "provider_rate_limited");
        assert_eq!(
            PlaylistError::Unavailable("x".into()).code(),
            "playlist_unavailable"
        );
    }
}
