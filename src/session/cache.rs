// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-lifetime session cache keyed by organization.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::endpoint::OrganizationEndpoint;
use crate::error::ConnectionError;
use crate::telemetry::metrics::{self, Counter};

use super::factory::SessionFactory;
use super::handle::Session;
use super::once_map::OnceMap;

/// At most one live session per organization.
///
/// Entries are never evicted. Failed constructions are not cached, so the
/// next request for the same organization starts over.
pub struct SessionCache {
    factory: Arc<dyn SessionFactory>,
    sessions: OnceMap<OrganizationEndpoint, Arc<Session>>,
}

impl SessionCache {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            sessions: OnceMap::new(),
        }
    }

    /// Cached session for `endpoint`, constructing and verifying it on first use.
    pub async fn get_or_create(
        &self,
        endpoint: &OrganizationEndpoint,
    ) -> Result<Arc<Session>, ConnectionError> {
        if let Some(session) = self.sessions.get(endpoint) {
            metrics::increment(Counter::CacheHit);
            debug!(endpoint = %endpoint, "Session cache hit");
            return Ok(session);
        }

        let result = self
            .sessions
            .get_or_try_insert_with(endpoint.clone(), || async {
                let start = Instant::now();
                let session = self.factory.create(endpoint).await?;
                metrics::increment(Counter::SessionCreated);
                metrics::record_operation("session.construct", start.elapsed());
                Ok::<_, ConnectionError>(Arc::new(session))
            })
            .await;

        if let Err(e) = &result {
            metrics::increment(Counter::SessionFailed);
            warn!(endpoint = %endpoint, error = %e, "Session construction failed");
        }
        result
    }

    /// Number of established sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, endpoint: &OrganizationEndpoint) -> bool {
        self.sessions.contains(endpoint)
    }

    /// Organizations with an established session, sorted.
    pub fn endpoints(&self) -> Vec<OrganizationEndpoint> {
        let mut endpoints = self.sessions.keys();
        endpoints.sort();
        endpoints
    }
}
