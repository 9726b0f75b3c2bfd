// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Connection provider: the single entry point request handlers use.
//!
//! The credential strategy is selected once, when the provider is built.
//! A selection failure (unsupported auth type, PAT auth without a token) is
//! kept and returned from every [`ConnectionProvider::get_connection`] call
//! instead of failing construction, so a misconfigured process still starts
//! and reports the problem on first use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::{AuthType, CredentialStrategy};
use crate::config::{load_config, CredentialConfig};
use crate::endpoint::OrganizationEndpoint;
use crate::error::{ConfigError, ConnectionError};
use crate::session::{PlatformSessionFactory, Session, SessionCache, SessionFactory};
use crate::transport::{ReqwestTransportFactory, SharedTransportFactory};

/// Hands callers a verified, cached session per organization.
pub struct ConnectionProvider {
    config: CredentialConfig,
    auth_type: Result<AuthType, ConfigError>,
    sessions: SessionCache,
}

impl ConnectionProvider {
    /// Provider using the default `reqwest` transport.
    pub fn new(config: CredentialConfig) -> Self {
        Self::with_transports(config, Arc::new(ReqwestTransportFactory::default()))
    }

    /// Load configuration for `workspace_root` from the process environment
    /// and config files, then build a provider.
    pub fn from_workspace(workspace_root: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(load_config(workspace_root)?))
    }

    /// Provider whose sessions and challenge retries use `transports`.
    pub fn with_transports(config: CredentialConfig, transports: SharedTransportFactory) -> Self {
        let selection = CredentialStrategy::from_config(&config);
        let auth_type = selection
            .as_ref()
            .map(|s| s.auth_type())
            .map_err(|e| e.clone());
        let factory: Arc<dyn SessionFactory> = match selection {
            Ok(strategy) => Arc::new(PlatformSessionFactory::new(strategy, transports)),
            Err(_) => Arc::new(Unconfigured),
        };
        Self {
            config,
            auth_type,
            sessions: SessionCache::new(factory),
        }
    }

    /// Provider with an injected session factory.
    ///
    /// The auth configuration is still validated, so configuration errors
    /// surface the same way as with [`ConnectionProvider::new`].
    pub fn with_factory(config: CredentialConfig, factory: Arc<dyn SessionFactory>) -> Self {
        let auth_type = CredentialStrategy::from_config(&config).map(|s| s.auth_type());
        Self {
            config,
            auth_type,
            sessions: SessionCache::new(factory),
        }
    }

    /// Session for `endpoint`, or for the configured default organization.
    ///
    /// Configuration errors are returned before any network I/O.
    pub async fn get_connection(
        &self,
        endpoint: Option<&str>,
    ) -> Result<Arc<Session>, ConnectionError> {
        let endpoint = self.resolve_endpoint(endpoint)?;
        let auth_type = self.auth_type.clone()?;
        debug!(endpoint = %endpoint, auth_type = %auth_type, "Getting connection");
        self.sessions.get_or_create(&endpoint).await
    }

    /// Normalize the caller's endpoint, falling back to the configured default.
    pub fn resolve_endpoint(
        &self,
        endpoint: Option<&str>,
    ) -> Result<OrganizationEndpoint, ConfigError> {
        let raw = endpoint
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(self.config.organization_url.as_deref())
            .ok_or(ConfigError::MissingOrganization)?;
        OrganizationEndpoint::parse(raw)
    }

    /// Configured default project.
    pub fn default_project(&self) -> Option<&str> {
        self.config.project.as_deref()
    }

    /// Configured default organization URL, as written in configuration.
    pub fn default_organization(&self) -> Option<&str> {
        self.config.organization_url.as_deref()
    }

    /// Selected auth type, or the configuration error that prevented selection.
    pub fn auth_type(&self) -> Result<AuthType, ConfigError> {
        self.auth_type.clone()
    }

    /// Organizations with an established session.
    pub fn cached_organizations(&self) -> Vec<OrganizationEndpoint> {
        self.sessions.endpoints()
    }

    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }
}

/// Stand-in factory when no strategy could be selected.
struct Unconfigured;

#[async_trait]
impl SessionFactory for Unconfigured {
    async fn create(&self, _endpoint: &OrganizationEndpoint) -> Result<Session, ConnectionError> {
        Err(ConfigError::invalid("AUTH_TYPE", "no credential strategy selected").into())
    }
}
