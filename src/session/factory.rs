// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session construction.

use async_trait::async_trait;
use tracing::{debug, info};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::auth::CredentialStrategy;
use crate::endpoint::OrganizationEndpoint;
use crate::error::ConnectionError;
use crate::transport::SharedTransportFactory;

use super::handle::Session;

/// Builds and verifies a session for one organization.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Construct a verified session. Called on cache misses only.
    async fn create(&self, endpoint: &OrganizationEndpoint) -> Result<Session, ConnectionError>;
}

/// Production factory: credential from the selected strategy, transport from
/// the transport factory, one `connectionData` round trip.
pub struct PlatformSessionFactory {
    strategy: CredentialStrategy,
    transports: SharedTransportFactory,
}

impl PlatformSessionFactory {
    pub fn new(strategy: CredentialStrategy, transports: SharedTransportFactory) -> Self {
        Self {
            strategy,
            transports,
        }
    }

    pub fn strategy(&self) -> &CredentialStrategy {
        &self.strategy
    }
}

#[async_trait]
impl SessionFactory for PlatformSessionFactory {
    #[cfg_attr(feature = "telemetry", instrument(skip_all, fields(endpoint = %endpoint)))]
    async fn create(&self, endpoint: &OrganizationEndpoint) -> Result<Session, ConnectionError> {
        let credential = self.strategy.credential(self.transports.clone())?;
        let transport = self.transports.create();
        let mut session = Session::new(
            endpoint.clone(),
            self.strategy.auth_type(),
            credential,
            transport,
        );

        debug!(endpoint = %endpoint, "Verifying session");
        session.verify().await?;
        info!(
            endpoint = %endpoint,
            auth_type = %self.strategy.auth_type(),
            "Session established"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthType;
    use crate::transport::ReqwestTransportFactory;
    use httpmock::prelude::*;
    use std::sync::Arc;

    fn factory(pat: &str) -> PlatformSessionFactory {
        PlatformSessionFactory::new(
            CredentialStrategy::pat(pat).unwrap(),
            Arc::new(ReqwestTransportFactory::default()),
        )
    }

    #[tokio::test]
    async fn test_create_verifies_against_connection_data() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/contoso/_apis/connectionData")
                    .header_exists("authorization");
                then.status(200).json_body(serde_json::json!({
                    "authenticatedUser": {"id": "abc", "providerDisplayName": "Build Agent"}
                }));
            })
            .await;

        let endpoint = OrganizationEndpoint::parse(&server.url("/contoso")).unwrap();
        let session = factory("secret").create(&endpoint).await.unwrap();

        mock.assert_async().await;
        assert_eq!(session.endpoint(), &endpoint);
        assert_eq!(session.auth_type(), AuthType::Pat);
        assert_eq!(session.authenticated_user().unwrap().id, "abc");
    }

    #[tokio::test]
    async fn test_create_surfaces_verification_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/contoso/_apis/connectionData");
                then.status(401).body("expired PAT");
            })
            .await;

        let endpoint = OrganizationEndpoint::parse(&server.url("/contoso")).unwrap();
        let err = factory("expired").create(&endpoint).await.unwrap_err();

        assert!(err.is_auth());
        assert!(matches!(err, ConnectionError::Verification { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_create_surfaces_unreachable_endpoint() {
        let endpoint = OrganizationEndpoint::parse("http://127.0.0.1:1/contoso").unwrap();
        let err = factory("secret").create(&endpoint).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Transport(_)));
    }
}
