// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP transport seam.
//!
//! Sessions talk to the backend through [`HttpTransport`]. The challenge
//! protocol needs a *fresh* transport for its retry, so the challenge handler
//! holds a [`TransportFactory`].

mod request;

pub use request::{HttpResponse, RequestSnapshot};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::TransportError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;

/// Sends request snapshots and buffers the response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request. The snapshot is borrowed and never consumed.
    async fn send(&self, request: &RequestSnapshot) -> Result<HttpResponse, TransportError>;
}

/// Produces transport instances.
pub trait TransportFactory: Send + Sync {
    /// Create a new, independent transport.
    fn create(&self) -> Arc<dyn HttpTransport>;
}

/// Shared transport factory handle.
pub type SharedTransportFactory = Arc<dyn TransportFactory>;

/// Transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestSnapshot) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .version(request.version)
            .headers(request.header_map());

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout.as_millis() as u64)
            } else {
                TransportError::from(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Creates a new `reqwest` transport per call.
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    timeout: Duration,
}

impl ReqwestTransportFactory {
    /// Create a factory whose transports use the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ReqwestTransportFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn create(&self) -> Arc<dyn HttpTransport> {
        match ReqwestTransport::new(self.timeout) {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Arc::new(ReqwestTransport::with_client(Client::new()))
            }
        }
    }
}
