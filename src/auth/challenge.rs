// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authentication challenge handling for token-based credentials.
//!
//! On a 401 the handler mints a token, copies the original request snapshot
//! with `Authorization: Bearer <token>`, and sends the copy on a fresh
//! transport. It answers a challenge once; the caller decides what a second
//! 401 means.

use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use tracing::debug;

use crate::error::ConnectionError;
use crate::transport::{HttpResponse, RequestSnapshot, SharedTransportFactory};

use super::token::TokenSource;

/// Answers 401 challenges with a freshly acquired bearer token.
#[derive(Clone)]
pub struct ChallengeHandler {
    source: Arc<dyn TokenSource>,
    scope: String,
    transports: SharedTransportFactory,
}

impl ChallengeHandler {
    /// Create a handler requesting tokens for `scope`.
    pub fn new(
        source: Arc<dyn TokenSource>,
        scope: impl Into<String>,
        transports: SharedTransportFactory,
    ) -> Self {
        Self {
            source,
            scope: scope.into(),
            transports,
        }
    }

    /// Whether a response is an authentication challenge.
    pub fn is_challenge(response: &HttpResponse) -> bool {
        response.status == StatusCode::UNAUTHORIZED
    }

    /// The scope tokens are requested for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Answer a challenge for `original`.
    ///
    /// Token acquisition errors propagate unchanged. The retry response is
    /// returned whatever its status.
    pub async fn respond(&self, original: &RequestSnapshot) -> Result<HttpResponse, ConnectionError> {
        debug!(url = %original.url, method = %original.method, "Answering authentication challenge");

        let token = self.source.acquire(&self.scope).await?;
        let retry = original.for_retry(token.secret())?;

        let transport = self.transports.create();
        let response = transport.send(&retry).await?;

        debug!(url = %retry.url, status = response.status.as_u16(), "Challenge retry completed");
        Ok(response)
    }
}

impl fmt::Debug for ChallengeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeHandler")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{AccessToken, MockTokenSource, DEVOPS_SCOPE};
    use crate::error::{AuthError, TransportError};
    use crate::transport::{HttpTransport, TransportFactory};
    use async_trait::async_trait;
    use reqwest::header::AUTHORIZATION;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records requests and answers with a fixed status.
    struct RecordingTransport {
        status: StatusCode,
        seen: Arc<Mutex<Vec<RequestSnapshot>>>,
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn send(&self, request: &RequestSnapshot) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse::new(self.status, "retried"))
        }
    }

    struct RecordingFactory {
        status: StatusCode,
        created: AtomicUsize,
        seen: Arc<Mutex<Vec<RequestSnapshot>>>,
    }

    impl RecordingFactory {
        fn new(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                status,
                created: AtomicUsize::new(0),
                seen: Arc::new(Mutex::new(Vec::new())),
            })
        }
    }

    impl TransportFactory for RecordingFactory {
        fn create(&self) -> Arc<dyn HttpTransport> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Arc::new(RecordingTransport {
                status: self.status,
                seen: self.seen.clone(),
            })
        }
    }

    #[test]
    fn test_is_challenge() {
        assert!(ChallengeHandler::is_challenge(&HttpResponse::new(StatusCode::UNAUTHORIZED, "")));
        assert!(!ChallengeHandler::is_challenge(&HttpResponse::new(StatusCode::FORBIDDEN, "")));
        assert!(!ChallengeHandler::is_challenge(&HttpResponse::new(StatusCode::OK, "")));
    }

    #[tokio::test]
    async fn test_respond_sends_bearer_copy_on_fresh_transport() {
        let mut source = MockTokenSource::new();
        source
            .expect_acquire()
            .withf(|scope| scope == DEVOPS_SCOPE)
            .times(1)
            .returning(|_| Ok(AccessToken::new("fresh-token", None)));

        let factory = RecordingFactory::new(StatusCode::OK);
        let handler = ChallengeHandler::new(Arc::new(source), DEVOPS_SCOPE, factory.clone());

        let original = RequestSnapshot::post_json(
            "https://dev.azure.com/contoso/_apis/git/pullrequests",
            &serde_json::json!({"title": "Add retry"}),
        )
        .unwrap();

        let response = handler.respond(&original).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        let seen = factory.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].body, original.body);
        assert_eq!(
            seen[0].header(&AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer fresh-token"
        );
    }

    #[tokio::test]
    async fn test_respond_returns_retry_failure_as_is() {
        let mut source = MockTokenSource::new();
        source
            .expect_acquire()
            .returning(|_| Ok(AccessToken::new("token", None)));

        let factory = RecordingFactory::new(StatusCode::UNAUTHORIZED);
        let handler = ChallengeHandler::new(Arc::new(source), DEVOPS_SCOPE, factory.clone());

        let original = RequestSnapshot::get("https://dev.azure.com/contoso/_apis/projects").unwrap();
        let response = handler.respond(&original).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(factory.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_token_failure_propagates_without_sending() {
        let mut source = MockTokenSource::new();
        source
            .expect_acquire()
            .returning(|_| Err(AuthError::TokenAcquisition("credential chain expired".to_string())));

        let factory = RecordingFactory::new(StatusCode::OK);
        let handler = ChallengeHandler::new(Arc::new(source), DEVOPS_SCOPE, factory.clone());

        let original = RequestSnapshot::get("https://dev.azure.com/contoso/_apis/projects").unwrap();
        let err = handler.respond(&original).await.unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::Auth(AuthError::TokenAcquisition(ref m)) if m.contains("expired")
        ));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }
}
