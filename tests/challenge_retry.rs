// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end 401 challenge handling over a real HTTP transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use devlink::auth::{AccessToken, DEVOPS_SCOPE};
use devlink::error::{AuthError, ConnectionError};
use devlink::session::{PlatformSessionFactory, SessionCache};
use devlink::transport::ReqwestTransportFactory;
use devlink::{CredentialStrategy, OrganizationEndpoint, RequestSnapshot, TokenSource};
use httpmock::prelude::*;

/// Hands out numbered tokens and counts acquisitions.
#[derive(Default)]
struct CountingTokenSource {
    acquired: AtomicUsize,
}

#[async_trait]
impl TokenSource for CountingTokenSource {
    async fn acquire(&self, scope: &str) -> Result<AccessToken, AuthError> {
        assert_eq!(scope, DEVOPS_SCOPE);
        let n = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(format!("token-{}", n), None))
    }
}

fn platform_cache(source: Arc<CountingTokenSource>) -> SessionCache {
    let strategy = CredentialStrategy::PlatformIdentity { source };
    let factory = PlatformSessionFactory::new(strategy, Arc::new(ReqwestTransportFactory::default()));
    SessionCache::new(Arc::new(factory))
}

#[tokio::test]
async fn test_challenge_retry_replays_identical_body() {
    let server = MockServer::start_async().await;

    let verify_challenge = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/contoso/_apis/connectionData")
                .header_missing("authorization");
            then.status(401).header("WWW-Authenticate", "Bearer");
        })
        .await;
    let verify_ok = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/contoso/_apis/connectionData")
                .header("authorization", "Bearer token-1");
            then.status(200)
                .json_body(serde_json::json!({"authenticatedUser": {"id": "mi-1"}}));
        })
        .await;

    let body = serde_json::json!({
        "title": "Retry with bearer",
        "sourceRefName": "refs/heads/feature",
        "targetRefName": "refs/heads/main"
    });
    let create_challenge = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/contoso/_apis/git/pullrequests")
                .header_missing("authorization");
            then.status(401);
        })
        .await;
    let create_ok = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/contoso/_apis/git/pullrequests")
                .header("authorization", "Bearer token-2")
                .header("content-type", "application/json")
                .json_body(body.clone());
            then.status(201).json_body(serde_json::json!({"pullRequestId": 7}));
        })
        .await;

    let source = Arc::new(CountingTokenSource::default());
    let cache = platform_cache(source.clone());
    let endpoint = OrganizationEndpoint::parse(&server.url("/contoso")).unwrap();

    let session = cache.get_or_create(&endpoint).await.unwrap();
    assert_eq!(session.authenticated_user().unwrap().id, "mi-1");

    let request =
        RequestSnapshot::post_json(&endpoint.api_url("_apis/git/pullrequests"), &body).unwrap();
    let response = session.send(request).await.unwrap();

    assert_eq!(response.status.as_u16(), 201);
    let created: serde_json::Value = response.json().unwrap();
    assert_eq!(created["pullRequestId"], 7);

    verify_challenge.assert_async().await;
    verify_ok.assert_async().await;
    create_challenge.assert_async().await;
    create_ok.assert_async().await;
    // One fresh token per challenge
    assert_eq!(source.acquired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_challenge_fails_without_further_retry() {
    let server = MockServer::start_async().await;
    let always_401 = server
        .mock_async(|when, then| {
            when.method(GET).path("/contoso/_apis/connectionData");
            then.status(401);
        })
        .await;

    let source = Arc::new(CountingTokenSource::default());
    let cache = platform_cache(source.clone());
    let endpoint = OrganizationEndpoint::parse(&server.url("/contoso")).unwrap();

    let err = cache.get_or_create(&endpoint).await.unwrap_err();

    assert!(matches!(
        err,
        ConnectionError::Auth(AuthError::ChallengeRejected { .. })
    ));
    always_401.assert_hits_async(2).await;
    assert_eq!(source.acquired.load(Ordering::SeqCst), 1);
    assert!(!cache.contains(&endpoint));
}

#[tokio::test]
async fn test_pat_sessions_never_retry() {
    let server = MockServer::start_async().await;
    let verify = server
        .mock_async(|when, then| {
            when.method(GET).path("/contoso/_apis/connectionData");
            then.status(401).body("TF400813");
        })
        .await;

    let factory = PlatformSessionFactory::new(
        CredentialStrategy::pat("revoked").unwrap(),
        Arc::new(ReqwestTransportFactory::default()),
    );
    let cache = SessionCache::new(Arc::new(factory));
    let endpoint = OrganizationEndpoint::parse(&server.url("/contoso")).unwrap();

    let err = cache.get_or_create(&endpoint).await.unwrap_err();

    assert!(matches!(err, ConnectionError::Verification { status: 401, .. }));
    verify.assert_hits_async(1).await;
}
