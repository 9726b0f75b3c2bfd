// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Organization endpoint normalization.
//!
//! An [`OrganizationEndpoint`] is the cache key for sessions, so two spellings
//! of the same organization must normalize to the same value.

use std::fmt;

use reqwest::Url;

use crate::error::ConfigError;

/// Host used when a bare organization name is supplied.
pub const CLOUD_HOST: &str = "dev.azure.com";

/// Host serving identity APIs for cloud organizations.
pub const CLOUD_IDENTITY_HOST: &str = "vssps.dev.azure.com";

/// A normalized URL identifying one backend organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrganizationEndpoint {
    url: String,
}

impl OrganizationEndpoint {
    /// Parse and normalize an organization URL or bare organization name.
    ///
    /// - `contoso` becomes `https://dev.azure.com/contoso`
    /// - host is lowercased, query and fragment are dropped
    /// - on the cloud host the organization path is lowercased too
    /// - trailing slashes are removed
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingOrganization);
        }

        let candidate = if is_bare_name(trimmed) {
            format!("https://{}/{}", CLOUD_HOST, trimmed)
        } else {
            trimmed.to_string()
        };

        let mut url = Url::parse(&candidate)
            .map_err(|e| ConfigError::invalid("ORG_URL", format!("{}: {}", trimmed, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::invalid(
                "ORG_URL",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::invalid("ORG_URL", format!("{}: missing host", trimmed)));
        }

        url.set_query(None);
        url.set_fragment(None);

        // Cloud organization names are case-insensitive
        if url.host_str() == Some(CLOUD_HOST) {
            let path = url.path().to_lowercase();
            url.set_path(&path);
        }

        let normalized = url.as_str().trim_end_matches('/').to_string();
        Ok(Self { url: normalized })
    }

    /// The normalized URL without a trailing slash.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Build an absolute URL for an API path relative to the organization.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    /// Last path segment, or the host when the organization is the host itself.
    pub fn organization_name(&self) -> &str {
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        without_scheme
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(without_scheme)
    }

    /// Base URL of the identity service for this organization.
    ///
    /// Cloud organizations serve identities from a separate host; on-premises
    /// collections and legacy hosts serve them from the organization URL.
    pub fn identity_base(&self) -> String {
        let cloud_prefix = format!("https://{}/", CLOUD_HOST);
        match self.url.strip_prefix(&cloud_prefix) {
            Some(rest) => format!("https://{}/{}", CLOUD_IDENTITY_HOST, rest),
            None => self.url.clone(),
        }
    }
}

impl fmt::Display for OrganizationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for OrganizationEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_bare_name(input: &str) -> bool {
    !input.contains("://") && !input.contains('/') && !input.contains('.') && !input.contains(':')
}
