// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the on-disk configuration file shape and the resolved
//! [`CredentialConfig`] handed to the connection provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Auth type used when none is configured.
pub const DEFAULT_AUTH_TYPE: &str = "pat";

/// Configuration file contents.
///
/// Keys mirror the environment variable names (`ORG_URL`, `PAT`, ...);
/// camelCase spellings are accepted as aliases. Can be JSON or YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FileConfig {
    /// Default organization URL
    #[serde(default, alias = "orgUrl", skip_serializing_if = "Option::is_none")]
    pub org_url: Option<String>,

    /// Default project name
    #[serde(default, alias = "project", skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Personal access token
    #[serde(default, alias = "pat", skip_serializing_if = "Option::is_none")]
    pub pat: Option<String>,

    /// Auth type tag (pat, platformIdentity, interactive)
    #[serde(default, alias = "authType", skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    /// Tenant for platform identity tokens
    #[serde(default, alias = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Client or managed identity id for platform identity tokens
    #[serde(default, alias = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Process-wide credential configuration.
///
/// Loaded once at startup and passed by value into the connection provider.
/// Every optional field is `None` when absent from all sources; empty strings
/// never survive the merge.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialConfig {
    /// Default organization endpoint used when a caller omits one.
    pub organization_url: Option<String>,
    /// Default project name.
    pub project: Option<String>,
    /// Personal access token secret.
    pub pat: Option<String>,
    /// Raw auth type tag, matched case-insensitively on first connection.
    pub auth_type: String,
    /// Tenant scope for platform identity tokens.
    pub tenant_id: Option<String>,
    /// Client or managed identity id for platform identity tokens.
    pub client_id: Option<String>,
    /// Federated token file; with a tenant and client id it selects
    /// workload identity over managed identity.
    pub federated_token_file: Option<PathBuf>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            organization_url: None,
            project: None,
            pat: None,
            auth_type: DEFAULT_AUTH_TYPE.to_string(),
            tenant_id: None,
            client_id: None,
            federated_token_file: None,
        }
    }
}

impl CredentialConfig {
    /// Config for PAT auth against a default organization.
    pub fn with_pat(organization_url: impl Into<String>, pat: impl Into<String>) -> Self {
        Self {
            organization_url: Some(organization_url.into()),
            pat: Some(pat.into()),
            ..Default::default()
        }
    }

    /// Set the auth type tag.
    pub fn auth_type(mut self, auth_type: impl Into<String>) -> Self {
        self.auth_type = auth_type.into();
        self
    }

    /// Set the default project.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("organization_url", &self.organization_url)
            .field("project", &self.project)
            .field("pat", &self.pat.as_ref().map(|_| "<redacted>"))
            .field("auth_type", &self.auth_type)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("federated_token_file", &self.federated_token_file)
            .finish()
    }
}
