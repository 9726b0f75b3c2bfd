// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authenticated session bound to one organization.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthType, ChallengeHandler, Credential};
use crate::endpoint::OrganizationEndpoint;
use crate::error::{AuthError, ConnectionError};
use crate::telemetry::metrics::{self, Counter};
use crate::transport::{HttpResponse, HttpTransport, RequestSnapshot};

/// Relative path of the organization's connection data resource.
pub const CONNECTION_DATA_PATH: &str = "_apis/connectionData";

/// Maximum length of a response body quoted in an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// The user a session authenticated as, from connection data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Identity id.
    #[serde(default)]
    pub id: String,
    /// Display name reported by the identity provider.
    #[serde(default)]
    pub provider_display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionData {
    #[serde(default)]
    authenticated_user: Option<AuthenticatedUser>,
}

/// An authenticated handle to one organization.
///
/// Sessions are owned by the cache and shared as `Arc<Session>`; callers
/// only borrow them.
pub struct Session {
    endpoint: OrganizationEndpoint,
    auth_type: AuthType,
    credential: Credential,
    transport: Arc<dyn HttpTransport>,
    authenticated_user: Option<AuthenticatedUser>,
}

impl Session {
    /// Create an unverified session.
    pub fn new(
        endpoint: OrganizationEndpoint,
        auth_type: AuthType,
        credential: Credential,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            endpoint,
            auth_type,
            credential,
            transport,
            authenticated_user: None,
        }
    }

    /// The organization this session is bound to.
    pub fn endpoint(&self) -> &OrganizationEndpoint {
        &self.endpoint
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// The user reported by the verification round trip.
    pub fn authenticated_user(&self) -> Option<&AuthenticatedUser> {
        self.authenticated_user.as_ref()
    }

    /// Perform the verification round trip and record the authenticated user.
    pub async fn verify(&mut self) -> Result<(), ConnectionError> {
        let request = RequestSnapshot::get(&self.endpoint.api_url(CONNECTION_DATA_PATH))?
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(ConnectionError::Verification {
                endpoint: self.endpoint.to_string(),
                status: response.status.as_u16(),
                message: truncate(&response.text()),
            });
        }

        let data: ConnectionData = response.json()?;
        self.authenticated_user = data.authenticated_user;
        debug!(
            endpoint = %self.endpoint,
            user = ?self.authenticated_user.as_ref().map(|u| &u.id),
            "Session verified"
        );
        Ok(())
    }

    /// Send a request with this session's credential.
    ///
    /// Challenge-capable credentials answer one 401 with a bearer retry; a
    /// second 401 fails with [`AuthError::ChallengeRejected`]. Other
    /// responses are returned whatever their status.
    pub async fn send(&self, request: RequestSnapshot) -> Result<HttpResponse, ConnectionError> {
        let request = self.credential.authorize(request).await?;
        let response = self.transport.send(&request).await?;

        let handler = match self.credential.challenge_handler() {
            Some(handler) if ChallengeHandler::is_challenge(&response) => handler,
            _ => return Ok(response),
        };

        let retried = handler.respond(&request).await?;
        if ChallengeHandler::is_challenge(&retried) {
            metrics::increment(Counter::ChallengeRejected);
            warn!(endpoint = %self.endpoint, url = %request.url, "Challenge retry rejected");
            return Err(AuthError::ChallengeRejected {
                url: request.url.to_string(),
            }
            .into());
        }

        metrics::increment(Counter::ChallengeAnswered);
        Ok(retried)
    }

    /// GET a JSON resource.
    ///
    /// `path` is relative to the organization URL unless it is already an
    /// absolute `http(s)` URL. Non-success statuses become
    /// [`ConnectionError::Api`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConnectionError> {
        let url = if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            self.endpoint.api_url(path)
        };

        let request = RequestSnapshot::get(&url)?
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(ConnectionError::Api {
                url,
                status: response.status.as_u16(),
                message: truncate(&response.text()),
            });
        }
        response.json()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("auth_type", &self.auth_type)
            .field("authenticated_user", &self.authenticated_user)
            .finish_non_exhaustive()
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= ERROR_BODY_LIMIT {
        return text.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, MockTokenSource, DEVOPS_SCOPE};
    use crate::error::TransportError;
    use crate::transport::TransportFactory;
    use async_trait::async_trait;
    use reqwest::header::AUTHORIZATION;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Pops scripted responses and records every request it sees.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<HttpResponse>>,
        seen: Mutex<Vec<RequestSnapshot>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: &RequestSnapshot) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Network("no scripted response".to_string()))
        }
    }

    /// Hands out the same scripted transport for every retry.
    struct SharedFactory(Arc<ScriptedTransport>);

    impl TransportFactory for SharedFactory {
        fn create(&self) -> Arc<dyn HttpTransport> {
            self.0.clone()
        }
    }

    fn endpoint() -> OrganizationEndpoint {
        OrganizationEndpoint::parse("https://dev.azure.com/contoso").unwrap()
    }

    fn pat_session(transport: Arc<ScriptedTransport>) -> Session {
        let credential = crate::auth::CredentialStrategy::pat("secret")
            .unwrap()
            .credential(Arc::new(SharedFactory(transport.clone())))
            .unwrap();
        Session::new(endpoint(), AuthType::Pat, credential, transport)
    }

    fn challenge_session(
        first: Arc<ScriptedTransport>,
        retry: Arc<ScriptedTransport>,
        tokens: usize,
    ) -> Session {
        let mut source = MockTokenSource::new();
        source
            .expect_acquire()
            .withf(|scope| scope == DEVOPS_SCOPE)
            .times(tokens)
            .returning(|_| Ok(AccessToken::new("minted", None)));
        let handler = ChallengeHandler::new(
            Arc::new(source),
            DEVOPS_SCOPE,
            Arc::new(SharedFactory(retry)),
        );
        Session::new(
            endpoint(),
            AuthType::PlatformIdentity,
            Credential::Challenge(handler),
            first,
        )
    }

    #[tokio::test]
    async fn test_verify_records_authenticated_user() {
        let transport = ScriptedTransport::new(vec![HttpResponse::json_body(
            StatusCode::OK,
            &serde_json::json!({
                "authenticatedUser": {"id": "u-1", "providerDisplayName": "Ada Lovelace"},
                "instanceId": "i-1"
            }),
        )]);
        let mut session = pat_session(transport.clone());
        session.verify().await.unwrap();

        let user = session.authenticated_user().unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.provider_display_name.as_deref(), Some("Ada Lovelace"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].url.as_str(),
            "https://dev.azure.com/contoso/_apis/connectionData"
        );
        assert!(seen[0]
            .header(&AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_verify_failure_status() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(
            StatusCode::UNAUTHORIZED,
            "TF400813: not authorized",
        )]);
        let mut session = pat_session(transport);
        let err = session.verify().await.unwrap_err();

        match err {
            ConnectionError::Verification {
                status, message, ..
            } => {
                assert_eq!(status, 401);
                assert!(message.contains("TF400813"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pat_session_does_not_answer_challenges() {
        let transport =
            ScriptedTransport::new(vec![HttpResponse::new(StatusCode::UNAUTHORIZED, "")]);
        let session = pat_session(transport.clone());

        let request = RequestSnapshot::get("https://dev.azure.com/contoso/_apis/projects").unwrap();
        let response = session.send(request).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_challenge_answered_once() {
        let first = ScriptedTransport::new(vec![HttpResponse::new(StatusCode::UNAUTHORIZED, "")]);
        let retry = ScriptedTransport::new(vec![HttpResponse::new(StatusCode::CREATED, "done")]);
        let session = challenge_session(first.clone(), retry.clone(), 1);

        let request = RequestSnapshot::post_json(
            "https://dev.azure.com/contoso/_apis/wit/workitems",
            &serde_json::json!([{"op": "add", "path": "/fields/System.Title", "value": "x"}]),
        )
        .unwrap();
        let response = session.send(request.clone()).await.unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        let first_seen = first.seen.lock().unwrap();
        assert_eq!(first_seen.len(), 1);
        assert!(first_seen[0].header(&AUTHORIZATION).is_none());

        let retry_seen = retry.seen.lock().unwrap();
        assert_eq!(retry_seen.len(), 1);
        assert_eq!(retry_seen[0].body, request.body);
        assert_eq!(
            retry_seen[0].header(&AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer minted"
        );
    }

    #[tokio::test]
    async fn test_second_challenge_is_rejected() {
        let first = ScriptedTransport::new(vec![HttpResponse::new(StatusCode::UNAUTHORIZED, "")]);
        let retry = ScriptedTransport::new(vec![
            HttpResponse::new(StatusCode::UNAUTHORIZED, ""),
            HttpResponse::new(StatusCode::OK, "never sent"),
        ]);
        let session = challenge_session(first, retry.clone(), 1);

        let request = RequestSnapshot::get("https://dev.azure.com/contoso/_apis/projects").unwrap();
        let err = session.send(request).await.unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::Auth(AuthError::ChallengeRejected { .. })
        ));
        assert_eq!(retry.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_challenge_status_skips_token() {
        let first = ScriptedTransport::new(vec![HttpResponse::new(StatusCode::NOT_FOUND, "")]);
        let retry = ScriptedTransport::new(vec![]);
        let session = challenge_session(first, retry.clone(), 0);

        let request = RequestSnapshot::get("https://dev.azure.com/contoso/_apis/missing").unwrap();
        let response = session.send(request).await.unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(retry.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_json_resolves_relative_and_absolute_paths() {
        let transport = ScriptedTransport::new(vec![
            HttpResponse::json_body(StatusCode::OK, &serde_json::json!({"count": 0})),
            HttpResponse::json_body(StatusCode::OK, &serde_json::json!({"count": 1})),
        ]);
        let session = pat_session(transport.clone());

        let relative: serde_json::Value = session.get_json("_apis/projects").await.unwrap();
        let absolute: serde_json::Value = session
            .get_json("https://vssps.dev.azure.com/contoso/_apis/identities")
            .await
            .unwrap();
        assert_eq!(relative["count"], 0);
        assert_eq!(absolute["count"], 1);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url.as_str(), "https://dev.azure.com/contoso/_apis/projects");
        assert_eq!(
            seen[1].url.as_str(),
            "https://vssps.dev.azure.com/contoso/_apis/identities"
        );
    }

    #[tokio::test]
    async fn test_get_json_error_status() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "x".repeat(2048),
        )]);
        let session = pat_session(transport);

        let err = session
            .get_json::<serde_json::Value>("_apis/projects")
            .await
            .unwrap_err();
        match err {
            ConnectionError::Api { status, message, .. } => {
                assert_eq!(status, 500);
                assert!(message.len() <= ERROR_BODY_LIMIT + 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debug_hides_credential() {
        let transport = ScriptedTransport::new(vec![]);
        let session = pat_session(transport);
        let debug = format!("{:?}", session);
        assert!(debug.contains("contoso"));
        assert!(!debug.contains("secret"));
    }
}
