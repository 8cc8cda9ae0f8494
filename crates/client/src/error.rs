//! Client error types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Context captured from a failed response before it reaches the caller
#[derive(Debug, Clone, Serialize)]
pub struct ResponseDetails {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for ResponseDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} returned {}", self.method, self.url, self.status)?;
        if !self.payload.is_empty() {
            write!(f, ": {}", self.payload)?;
        }
        Ok(())
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error: {0}")]
    ServerError(Box<ResponseDetails>),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(Box<ResponseDetails>),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(Box<ResponseDetails>),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(Box<ResponseDetails>),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(Box<ResponseDetails>),

    /// The session could not be renewed; the caller has to log in again
    #[error("Session expired: {0}")]
    SessionExpired(#[from] RefreshError),

    /// A service wrapper rejected its input before sending anything
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: serde_json::Value,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credential storage failure
    #[error("Credential storage error: {0}")]
    Storage(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(details: ResponseDetails) -> Self {
        let details = Box::new(details);
        match details.status {
            400 => Self::BadRequest(details),
            401 => Self::AuthenticationFailed(details),
            403 => Self::Forbidden(details),
            404 => Self::NotFound(details),
            _ => Self::ServerError(details),
        }
    }

    /// Validation error for a required field that was left empty
    pub fn missing_field(field: &str) -> Self {
        Self::Validation {
            message: format!("missing required field {field}"),
            details: serde_json::json!({ "field": field, "reason": "required" }),
        }
    }

    /// Response context, when the error came from a server response
    pub fn details(&self) -> Option<&ResponseDetails> {
        match self {
            Self::ServerError(d)
            | Self::AuthenticationFailed(d)
            | Self::NotFound(d)
            | Self::BadRequest(d)
            | Self::Forbidden(d) => Some(d),
            _ => None,
        }
    }

    /// HTTP status of the failed response, if there was one
    pub fn status(&self) -> Option<u16> {
        self.details().map(|d| d.status)
    }

    /// Whether the caller has to authenticate again
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_) | Self::AuthenticationFailed(_))
    }

    /// Whether no response was received at all
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Request(e) if !e.is_builder())
    }
}

/// Why a token refresh did not produce a new token.
///
/// Cloned into every request that was waiting on the same refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh endpoint answered {status}")]
    Rejected { status: u16 },

    #[error("refresh response did not contain a token")]
    MissingToken,

    #[error("could not persist refreshed token: {0}")]
    Storage(String),

    #[error("refresh was abandoned before it completed")]
    Abandoned,
}

/// Credential storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed credential file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,
}
