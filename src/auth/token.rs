// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token sources.
//!
//! A [`TokenSource`] mints bearer tokens on demand. Challenge tokens are
//! never cached: every challenge asks the source again. Ambient CLI tokens
//! are wrapped in a [`ReusableTokenSource`] because each acquisition spawns
//! a process.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;

/// Resource id of the backend's service principal.
pub const DEVOPS_RESOURCE_ID: &str = "499b84ac-1321-427f-aa17-267ca6975798";

/// OAuth scope requested for the backend.
pub const DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

/// Default managed identity token endpoint.
pub const MANAGED_IDENTITY_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Default authority host for workload identity federation.
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const MANAGED_IDENTITY_API_VERSION: &str = "2018-02-01";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const TOKEN_TIMEOUT_SECS: u64 = 30;

/// Tokens closer than this to expiry are not reused.
pub const TOKEN_REUSE_MARGIN: Duration = Duration::from_secs(300);

/// A bearer token with optional expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>, expires_on: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// The raw token value.
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// When the token stops being valid, if known.
    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.expires_on
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of bearer tokens for a scope.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Acquire a token for `scope`. Failures propagate unchanged to the caller.
    async fn acquire(&self, scope: &str) -> Result<AccessToken, AuthError>;
}

/// Strip the `/.default` suffix to get a v1 resource id.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Platform identity tokens: workload identity federation or managed identity.
///
/// With a tenant, a client id and a federated token file, a client-credentials
/// exchange is performed against the authority. Otherwise the managed identity
/// endpoint is queried, optionally for a user-assigned client id.
pub struct PlatformIdentityTokenSource {
    client: Client,
    tenant_id: Option<String>,
    client_id: Option<String>,
    managed_identity_endpoint: String,
    authority_host: String,
    federated_token_file: Option<PathBuf>,
}

impl PlatformIdentityTokenSource {
    /// Create a source for the given tenant and client ids.
    pub fn new(tenant_id: Option<String>, client_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TOKEN_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            tenant_id,
            client_id,
            managed_identity_endpoint: MANAGED_IDENTITY_ENDPOINT.to_string(),
            authority_host: AUTHORITY_HOST.to_string(),
            federated_token_file: None,
        }
    }

    /// Override the managed identity endpoint.
    pub fn with_managed_identity_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.managed_identity_endpoint = endpoint.into();
        self
    }

    /// Override the authority host.
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a federated token file for workload identity.
    pub fn with_federated_token_file(mut self, path: Option<PathBuf>) -> Self {
        self.federated_token_file = path;
        self
    }

    fn workload_identity(&self) -> Option<(&str, &str, &PathBuf)> {
        match (&self.tenant_id, &self.client_id, &self.federated_token_file) {
            (Some(tenant), Some(client), Some(file)) => Some((tenant.as_str(), client.as_str(), file)),
            _ => None,
        }
    }

    async fn acquire_workload_identity(
        &self,
        tenant: &str,
        client_id: &str,
        token_file: &PathBuf,
        scope: &str,
    ) -> Result<AccessToken, AuthError> {
        let assertion = tokio::fs::read_to_string(token_file).await.map_err(|e| {
            AuthError::TokenAcquisition(format!(
                "cannot read federated token file {}: {}",
                token_file.display(),
                e
            ))
        })?;

        let url = format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("scope", scope),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.trim()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenAcquisition(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenAcquisition(format!(
                "authority returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenAcquisition(e.to_string()))?;

        // Out-of-range lifetimes leave the expiry unknown
        let expires_on = token
            .expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
        Ok(AccessToken::new(token.access_token, expires_on))
    }

    async fn acquire_managed_identity(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let mut query = vec![
            ("api-version", MANAGED_IDENTITY_API_VERSION),
            ("resource", scope_to_resource(scope)),
        ];
        if let Some(ref client_id) = self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let response = self
            .client
            .get(&self.managed_identity_endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| AuthError::TokenAcquisition(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenAcquisition(format!(
                "managed identity endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: ManagedIdentityTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenAcquisition(e.to_string()))?;

        let expires_on = token
            .expires_on
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        Ok(AccessToken::new(token.access_token, expires_on))
    }
}

#[async_trait]
impl TokenSource for PlatformIdentityTokenSource {
    async fn acquire(&self, scope: &str) -> Result<AccessToken, AuthError> {
        match self.workload_identity() {
            Some((tenant, client_id, file)) => {
                debug!(tenant, client_id, "Acquiring token via workload identity");
                self.acquire_workload_identity(tenant, client_id, file, scope).await
            }
            None => {
                debug!(client_id = ?self.client_id, "Acquiring token via managed identity");
                self.acquire_managed_identity(scope).await
            }
        }
    }
}

impl fmt::Debug for PlatformIdentityTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformIdentityTokenSource")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("managed_identity_endpoint", &self.managed_identity_endpoint)
            .field("authority_host", &self.authority_host)
            .field("federated_token_file", &self.federated_token_file)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

/// Ambient tokens from the locally signed-in platform CLI.
///
/// Runs `az account get-access-token --resource <id> --output json` (or a
/// configured equivalent) and reads `accessToken` from its output.
#[derive(Debug, Clone)]
pub struct CliTokenSource {
    program: String,
    base_args: Vec<String>,
}

impl CliTokenSource {
    /// Use the default `az` CLI.
    pub fn new() -> Self {
        Self::with_command("az", ["account", "get-access-token"])
    }

    /// Use a custom command. `--resource <id> --output json` is appended.
    pub fn with_command<I, S>(program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            base_args: base_args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for CliTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

#[async_trait]
impl TokenSource for CliTokenSource {
    async fn acquire(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.base_args)
            .args(["--resource", scope_to_resource(scope), "--output", "json"])
            .output()
            .await
            .map_err(|e| {
                AuthError::AmbientUnavailable(format!("cannot run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::AmbientUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let parsed: CliTokenResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| AuthError::AmbientUnavailable(format!("unexpected CLI output: {}", e)))?;

        let expires_on = parsed
            .expires_on
            .as_deref()
            .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
            .map(|naive| naive.and_utc());
        Ok(AccessToken::new(parsed.access_token, expires_on))
    }
}

/// Reuses the last token from an inner source until it nears expiry.
///
/// Tokens without a known expiry are never reused. Concurrent callers
/// share one acquisition.
pub struct ReusableTokenSource {
    inner: Arc<dyn TokenSource>,
    margin: chrono::Duration,
    current: tokio::sync::Mutex<Option<(String, AccessToken)>>,
}

impl ReusableTokenSource {
    pub fn new(inner: Arc<dyn TokenSource>) -> Self {
        Self::with_margin(inner, TOKEN_REUSE_MARGIN)
    }

    pub fn with_margin(inner: Arc<dyn TokenSource>, margin: Duration) -> Self {
        Self {
            inner,
            margin: chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero()),
            current: tokio::sync::Mutex::new(None),
        }
    }

    fn still_valid(&self, token: &AccessToken) -> bool {
        match token.expires_on() {
            Some(expires_on) => Utc::now()
                .checked_add_signed(self.margin)
                .map_or(false, |threshold| expires_on > threshold),
            None => false,
        }
    }
}

#[async_trait]
impl TokenSource for ReusableTokenSource {
    async fn acquire(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let mut current = self.current.lock().await;
        if let Some((cached_scope, token)) = current.as_ref() {
            if cached_scope == scope && self.still_valid(token) {
                return Ok(token.clone());
            }
        }

        let token = self.inner.acquire(scope).await?;
        debug!(expires_on = ?token.expires_on(), "Acquired ambient token");
        *current = Some((scope.to_string(), token.clone()));
        Ok(token)
    }
}

impl fmt::Debug for ReusableTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReusableTokenSource")
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}
