// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Devlink - connection and identity core for project-management tool servers.
//!
//! Tool handlers that forward calls to a hosted project-management platform
//! need two things from this crate: an authenticated, reusable session for an
//! organization, and a best-effort identity for a reviewer or assignee string.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`error`] - Error types and result aliases
//! - [`config`] - Credential configuration loading and env-first merging
//! - [`endpoint`] - Organization URL normalization
//! - [`transport`] - Immutable request snapshots and HTTP transports
//! - [`auth`] - Credential strategies, token sources and 401 challenge retry
//! - [`session`] - Verified sessions and the per-organization session cache
//! - [`connection`] - The connection provider handlers call into
//! - [`identity`] - Identity lookup fallback chain
//! - [`telemetry`] - Tracing initialization and in-process metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use devlink::{resolve_identity, ConnectionProvider};
//!
//! let provider = ConnectionProvider::from_workspace(Path::new("."))?;
//! let session = provider.get_connection(None).await?;
//!
//! if let Some(reviewer) = resolve_identity(&session, "ada@contoso.com").await {
//!     if !reviewer.is_resolved() {
//!         tracing::warn!(reviewer = %reviewer.unique_name, "Adding unverified reviewer");
//!     }
//! }
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod session;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types at crate root
pub use auth::{AuthType, Credential, CredentialStrategy, TokenSource};
pub use config::{load_config, CredentialConfig, EnvSnapshot};
pub use connection::ConnectionProvider;
pub use endpoint::OrganizationEndpoint;
pub use error::{AuthError, ConfigError, ConnectionError, IdentityError, Result, TransportError};
pub use identity::{resolve_identity, IdentityOrigin, IdentityReference, IdentityResolver};
pub use session::{Session, SessionCache, SessionFactory};
pub use transport::{HttpResponse, HttpTransport, RequestSnapshot, TransportFactory};

/// Devlink version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let endpoint = OrganizationEndpoint::parse("contoso").unwrap();
        assert_eq!(endpoint.as_str(), "https://dev.azure.com/contoso");

        let identity = IdentityReference::synthesized("someone");
        assert_eq!(identity.origin, IdentityOrigin::Synthesized);
        assert_eq!("pat".parse::<AuthType>().unwrap(), AuthType::Pat);
    }
}
