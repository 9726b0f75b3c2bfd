// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Best-effort identity resolution for reviewers and assignees.
//!
//! Lookups run in order and stop at the first match:
//!
//! 1. General search, only when the input looks like an email address
//! 2. Display name search
//! 3. A synthesized placeholder marked [`IdentityOrigin::Synthesized`]
//!
//! Lookup failures are logged and fall through to the next step. Only blank
//! input produces `None`.

use std::collections::HashMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConnectionError, IdentityError};
use crate::session::Session;
use crate::telemetry::metrics::{self, Counter};

/// API version sent with identity queries.
pub const IDENTITY_API_VERSION: &str = "7.1";

/// Property holding an identity's email address.
const MAIL_PROPERTY: &str = "Mail";

/// Property holding an identity's account name.
const ACCOUNT_PROPERTY: &str = "Account";

/// Where an [`IdentityReference`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityOrigin {
    /// Matched by the identity service.
    Resolved,
    /// Placeholder built from the raw input; not verified.
    Synthesized,
}

/// A user reference suitable for reviewer and assignee fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityReference {
    pub id: String,
    pub display_name: String,
    /// Email when known, otherwise the raw input.
    pub unique_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub origin: IdentityOrigin,
}

impl IdentityReference {
    /// Placeholder for an input no lookup matched.
    pub fn synthesized(input: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: input.to_string(),
            unique_name: input.to_string(),
            url: None,
            origin: IdentityOrigin::Synthesized,
        }
    }

    /// Whether the identity service matched this reference.
    pub fn is_resolved(&self) -> bool {
        self.origin == IdentityOrigin::Resolved
    }
}

/// Identity service search filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter {
    /// Matches account names, emails and display names.
    General,
    DisplayName,
}

impl SearchFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFilter::General => "General",
            SearchFilter::DisplayName => "DisplayName",
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdentityList {
    #[serde(default)]
    value: Vec<IdentityRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRecord {
    id: String,
    #[serde(default)]
    provider_display_name: Option<String>,
    #[serde(default)]
    custom_display_name: Option<String>,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
struct PropertyValue {
    #[serde(rename = "$value", default)]
    value: serde_json::Value,
}

impl IdentityRecord {
    fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|p| p.value.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// `Mail`, then `Account` if it is an email, then the raw input.
    fn unique_name(&self, input: &str) -> String {
        self.property(MAIL_PROPERTY)
            .or_else(|| self.property(ACCOUNT_PROPERTY).filter(|a| a.contains('@')))
            .unwrap_or(input)
            .to_string()
    }

    fn into_reference(self, input: &str, base: &str) -> IdentityReference {
        let unique_name = self.unique_name(input);
        let display_name = self
            .custom_display_name
            .clone()
            .or_else(|| self.provider_display_name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| input.to_string());
        IdentityReference {
            url: Some(format!("{}/_apis/identities/{}", base, self.id)),
            id: self.id,
            display_name,
            unique_name,
            origin: IdentityOrigin::Resolved,
        }
    }
}

/// Runs the lookup chain against one session.
pub struct IdentityResolver<'a> {
    session: &'a Session,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Resolve `input` to an identity, synthesizing one if nothing matches.
    ///
    /// Returns `None` only for blank input.
    pub async fn resolve(&self, input: &str) -> Option<IdentityReference> {
        let input = input.trim();
        if input.is_empty() {
            warn!("Skipping identity resolution for blank input");
            return None;
        }

        let mut filters = Vec::with_capacity(2);
        if input.contains('@') {
            filters.push(SearchFilter::General);
        }
        filters.push(SearchFilter::DisplayName);

        for filter in filters {
            match self.lookup(filter, input).await {
                Ok(Some(identity)) => {
                    metrics::increment(Counter::IdentityResolved);
                    debug!(filter = filter.as_str(), id = %identity.id, "Identity resolved");
                    return Some(identity);
                }
                Ok(None) => debug!(filter = filter.as_str(), "No identity match"),
                Err(e) => warn!(filter = filter.as_str(), error = %e, "Identity lookup failed"),
            }
        }

        metrics::increment(Counter::IdentitySynthesized);
        warn!(input = %input, "Identity not found; using unverified placeholder");
        Some(IdentityReference::synthesized(input))
    }

    /// One identity service query. `Ok(None)` means no match.
    pub async fn lookup(
        &self,
        filter: SearchFilter,
        value: &str,
    ) -> Result<Option<IdentityReference>, IdentityError> {
        let base = self.session.endpoint().identity_base();
        let mut url = Url::parse(&format!("{}/_apis/identities", base))
            .map_err(|e| IdentityError::InvalidQuery(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("searchFilter", filter.as_str())
            .append_pair("filterValue", value)
            .append_pair("queryMembership", "None")
            .append_pair("api-version", IDENTITY_API_VERSION);

        let list: IdentityList = self
            .session
            .get_json(url.as_str())
            .await
            .map_err(|e| match e {
                ConnectionError::Api { status, .. } => IdentityError::Status(status),
                other => IdentityError::Lookup(other),
            })?;

        Ok(list
            .value
            .into_iter()
            .next()
            .map(|record| record.into_reference(value, &base)))
    }
}

/// Resolve `input` against `session`. See [`IdentityResolver::resolve`].
pub async fn resolve_identity(session: &Session, input: &str) -> Option<IdentityReference> {
    IdentityResolver::new(session).resolve(input).await
}
