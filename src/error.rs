// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for connection and identity handling.
//!
//! This module provides strongly-typed errors for each concern of the crate,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.

use thiserror::Error;

/// Errors that can occur while loading or interpreting configuration.
///
/// These are fatal to the requesting call and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No organization URL was supplied and no default ORG_URL is configured")]
    MissingOrganization,

    #[error("Auth type '{0}' requires a personal access token, but PAT is not set")]
    MissingToken(String),

    #[error("Unsupported auth type '{0}' (expected one of: pat, platformIdentity, interactive)")]
    UnsupportedAuthType(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors raised by credential handling and the challenge protocol.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),

    #[error("Ambient credentials unavailable: {0}")]
    AmbientUnavailable(String),

    #[error("Authentication challenge rejected after retry: {url}")]
    ChallengeRejected { url: String },

    #[error("Invalid credential header: {0}")]
    InvalidHeader(String),
}

/// Errors raised by an HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl TransportError {
    /// Check if this error is worth retrying on a later call.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors surfaced to callers of `get_connection` and `Session::send`.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Verification of {endpoint} failed with status {status}: {message}")]
    Verification {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Request to {url} failed with status {status}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Response parsing error: {0}")]
    Parse(String),
}

impl ConnectionError {
    /// Check if this error came from configuration rather than the network.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this error is an authentication failure.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Verification { status, .. } | Self::Api { status, .. } => {
                *status == 401 || *status == 403
            }
            _ => false,
        }
    }
}

/// Errors from a single identity lookup attempt.
///
/// These never escape the resolver; they are logged and the next strategy runs.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity lookup failed: {0}")]
    Lookup(#[from] ConnectionError),

    #[error("Identity service returned status {0}")]
    Status(u16),

    #[error("Invalid identity query: {0}")]
    InvalidQuery(String),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

/// Convert any error type that implements std::error::Error to an anyhow::Error.
pub fn to_anyhow<E: std::error::Error + Send + Sync + 'static>(err: E) -> anyhow::Error {
    anyhow::Error::new(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_transient() {
        assert!(TransportError::Network("reset".to_string()).is_transient());
        assert!(TransportError::Timeout(100_000).is_transient());
        assert!(!TransportError::InvalidRequest("bad uri".to_string()).is_transient());
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_connection_error_from_config() {
        let err: ConnectionError = ConfigError::MissingOrganization.into();
        assert!(err.is_config());
        assert!(!err.is_auth());
    }

    #[test]
    fn test_connection_error_is_auth() {
        let rejected: ConnectionError = AuthError::ChallengeRejected {
            url: "https://dev.azure.com/contoso".to_string(),
        }
        .into();
        assert!(rejected.is_auth());

        let verification = ConnectionError::Verification {
            endpoint: "https://dev.azure.com/contoso".to_string(),
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(verification.is_auth());

        let server = ConnectionError::Api {
            url: "https://dev.azure.com/contoso/_apis/projects".to_string(),
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!server.is_auth());
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnsupportedAuthType("kerberos".to_string());
        let display = format!("{}", err);
        assert!(display.contains("kerberos"));
        assert!(display.contains("platformIdentity"));
    }
}
