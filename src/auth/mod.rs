// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credential strategies.
//!
//! The configured auth type selects one [`CredentialStrategy`] when the
//! connection provider is built. Each strategy produces a [`Credential`]
//! that sessions apply to outgoing requests:
//!
//! - **PAT** - `Authorization: Basic` with a static secret
//! - **Platform identity** - no header up front, bearer token minted per 401 challenge
//! - **Interactive** - bearer token from the locally signed-in CLI on every request,
//!   reused until shortly before it expires

mod challenge;
mod token;

pub use challenge::ChallengeHandler;
pub use token::{
    scope_to_resource, AccessToken, CliTokenSource, PlatformIdentityTokenSource,
    ReusableTokenSource, TokenSource, AUTHORITY_HOST, DEVOPS_RESOURCE_ID, DEVOPS_SCOPE,
    MANAGED_IDENTITY_ENDPOINT, TOKEN_REUSE_MARGIN,
};

#[cfg(test)]
pub(crate) use token::MockTokenSource;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::config::CredentialConfig;
use crate::error::{AuthError, ConfigError};
use crate::transport::{RequestSnapshot, SharedTransportFactory};

/// Supported authentication schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthType {
    /// Personal access token
    Pat,
    /// Managed or workload identity tokens
    PlatformIdentity,
    /// Ambient credentials of the signed-in user
    Interactive,
}

impl AuthType {
    /// Canonical configuration tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Pat => "pat",
            AuthType::PlatformIdentity => "platformIdentity",
            AuthType::Interactive => "interactive",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pat" => Ok(AuthType::Pat),
            "platformidentity" => Ok(AuthType::PlatformIdentity),
            "interactive" => Ok(AuthType::Interactive),
            _ => Err(ConfigError::UnsupportedAuthType(s.to_string())),
        }
    }
}

/// One implementation per auth kind, selected once from configuration.
#[derive(Clone)]
pub enum CredentialStrategy {
    /// Static personal access token.
    Pat { token: String },
    /// Token client answering 401 challenges.
    PlatformIdentity { source: Arc<dyn TokenSource> },
    /// Ambient token source consulted for every request.
    Interactive { source: Arc<dyn TokenSource> },
}

impl CredentialStrategy {
    /// Select a strategy from configuration using the default token clients.
    ///
    /// Fails for an unrecognized auth type tag, or for `pat` without a token.
    pub fn from_config(config: &CredentialConfig) -> Result<Self, ConfigError> {
        let auth_type: AuthType = config.auth_type.parse()?;
        match auth_type {
            AuthType::Pat => Self::pat(config.pat.as_deref().unwrap_or_default()),
            AuthType::PlatformIdentity => {
                let source = PlatformIdentityTokenSource::new(
                    config.tenant_id.clone(),
                    config.client_id.clone(),
                )
                .with_federated_token_file(config.federated_token_file.clone());
                Ok(Self::PlatformIdentity {
                    source: Arc::new(source),
                })
            }
            AuthType::Interactive => Ok(Self::Interactive {
                source: Arc::new(ReusableTokenSource::new(Arc::new(CliTokenSource::new()))),
            }),
        }
    }

    /// PAT strategy. An empty token is a configuration error.
    pub fn pat(token: &str) -> Result<Self, ConfigError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingToken(AuthType::Pat.to_string()));
        }
        Ok(Self::Pat {
            token: token.to_string(),
        })
    }

    /// The auth type this strategy implements.
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::Pat { .. } => AuthType::Pat,
            Self::PlatformIdentity { .. } => AuthType::PlatformIdentity,
            Self::Interactive { .. } => AuthType::Interactive,
        }
    }

    /// Build the low-level credential for one session.
    pub fn credential(&self, transports: SharedTransportFactory) -> Result<Credential, AuthError> {
        match self {
            Self::Pat { token } => {
                let encoded = STANDARD.encode(format!(":{}", token));
                let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
                    .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
                value.set_sensitive(true);
                Ok(Credential::Basic(value))
            }
            Self::PlatformIdentity { source } => Ok(Credential::Challenge(ChallengeHandler::new(
                source.clone(),
                DEVOPS_SCOPE,
                transports,
            ))),
            Self::Interactive { source } => Ok(Credential::Ambient(source.clone())),
        }
    }
}

impl fmt::Debug for CredentialStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStrategy")
            .field("auth_type", &self.auth_type())
            .finish_non_exhaustive()
    }
}

/// Credential applied by a session to every outgoing request.
#[derive(Clone)]
pub enum Credential {
    /// Pre-computed Basic authorization header.
    Basic(HeaderValue),
    /// No header up front; 401s are answered by the handler.
    Challenge(ChallengeHandler),
    /// Bearer token fetched from an ambient source before each request.
    Ambient(Arc<dyn TokenSource>),
}

impl Credential {
    /// Attach authorization to a request, if this credential does so up front.
    pub async fn authorize(&self, request: RequestSnapshot) -> Result<RequestSnapshot, AuthError> {
        match self {
            Credential::Basic(value) => Ok(request.set_header(AUTHORIZATION, value.clone())),
            Credential::Challenge(_) => Ok(request),
            Credential::Ambient(source) => {
                let token = source.acquire(DEVOPS_SCOPE).await?;
                request.with_bearer(token.secret())
            }
        }
    }

    /// The challenge handler, for credentials that answer 401s.
    pub fn challenge_handler(&self) -> Option<&ChallengeHandler> {
        match self {
            Credential::Challenge(handler) => Some(handler),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic(_) => f.write_str("Credential::Basic(<redacted>)"),
            Credential::Challenge(handler) => write!(f, "Credential::Challenge({:?})", handler),
            Credential::Ambient(_) => f.write_str("Credential::Ambient"),
        }
    }
}
