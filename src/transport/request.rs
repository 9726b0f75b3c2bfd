// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Immutable request and response values.
//!
//! A [`RequestSnapshot`] is captured once before the first send. Transports
//! borrow it, so a retry never depends on re-reading a consumed body stream.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url, Version};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AuthError, ConnectionError, TransportError};

/// Snapshot of an outgoing HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URI.
    pub url: Url,
    /// Protocol version.
    pub version: Version,
    /// Header list in insertion order, content headers included.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Fully buffered body bytes.
    pub body: Option<Bytes>,
}

impl RequestSnapshot {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", url, e)))?;
        Ok(Self {
            method,
            url,
            version: Version::HTTP_11,
            headers: Vec::new(),
            body: None,
        })
    }

    /// Create a GET request.
    pub fn get(url: &str) -> Result<Self, TransportError> {
        Self::new(Method::GET, url)
    }

    /// Create a POST request with a JSON body.
    pub fn post_json<T: Serialize + ?Sized>(url: &str, body: &T) -> Result<Self, TransportError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self::new(Method::POST, url)?
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(bytes))
    }

    /// Append a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Replace every value of a header with a single value.
    pub fn set_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value));
        self
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of a header.
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Headers as a `HeaderMap`, preserving repeated names.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            map.append(name.clone(), value.clone());
        }
        map
    }

    /// Replace `Authorization` with a bearer token.
    pub fn with_bearer(self, bearer_token: &str) -> Result<Self, AuthError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", bearer_token))
            .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
        value.set_sensitive(true);
        Ok(self.set_header(AUTHORIZATION, value))
    }

    /// Copy of this request authorized with a bearer token.
    ///
    /// Method, URI, version, headers and body bytes are carried over
    /// unchanged; only `Authorization` is replaced.
    pub fn for_retry(&self, bearer_token: &str) -> Result<Self, AuthError> {
        self.clone().with_bearer(bearer_token)
    }
}

/// Fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response with a status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Create a JSON response.
    pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ConnectionError> {
        serde_json::from_slice(&self.body).map_err(|e| ConnectionError::Parse(e.to_string()))
    }
}
