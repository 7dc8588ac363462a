// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Requests and responses seen by the worker, and the network seam.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};

/// How the page issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Full page load
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

/// A request intercepted by the worker.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: HeaderMap,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url, mode: RequestMode) -> Self {
        Self {
            method,
            url,
            mode,
            headers: HeaderMap::new(),
        }
    }

    /// A subresource GET (script, stylesheet, image...).
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::NoCors)
    }

    /// A top-level page load.
    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Key under which this request is cached.
    pub fn cache_key(&self) -> String {
        canonical_url(&self.url)
    }
}

/// Canonical cache key for a URL: the serialized URL without fragment.
///
/// Every cache write and lookup goes through this, so a resource is stored
/// exactly once per generation.
pub fn canonical_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Response classification, mirroring what a page can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Basic,
    Cors,
    Opaque,
    /// A redirect the worker did not follow; never cached
    OpaqueRedirect,
    /// Produced by the worker itself
    Synthetic,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::OpaqueRedirect => "opaqueredirect",
            ResponseType::Synthetic => "synthetic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(ResponseType::Basic),
            "cors" => Some(ResponseType::Cors),
            "opaque" => Some(ResponseType::Opaque),
            "opaqueredirect" => Some(ResponseType::OpaqueRedirect),
            "synthetic" => Some(ResponseType::Synthetic),
            _ => None,
        }
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub kind: ResponseType,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            kind: ResponseType::Basic,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_kind(mut self, kind: ResponseType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// Only complete, non-redirect responses may enter a cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.kind != ResponseType::OpaqueRedirect
    }

    /// Placeholder returned when neither the network nor any cache can
    /// answer.
    pub fn service_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable: this page is not available offline",
        )
        .with_kind(ResponseType::Synthetic)
        .with_content_type("text/plain; charset=utf-8")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network failures. Any of these sends the worker to its caches.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Network request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),
}

/// Something that can perform a real request.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Race a network attempt against a deadline.
pub async fn fetch_with_deadline(
    network: &dyn Network,
    request: &FetchRequest,
    deadline: Duration,
) -> Result<FetchResponse, FetchError> {
    match tokio::time::timeout(deadline, network.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(deadline)),
    }
}

/// Network backed by `reqwest`.
///
/// Subresource requests follow redirects. Navigations do not, so a
/// redirected navigation surfaces as an [`ResponseType::OpaqueRedirect`]
/// response and is never cached.
#[derive(Clone)]
pub struct HttpNetwork {
    http: reqwest::Client,
    navigations: reqwest::Client,
}

impl HttpNetwork {
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let navigations = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { http, navigations })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let client = if request.is_navigation() {
            &self.navigations
        } else {
            &self.http
        };
        let response = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let kind = if status.is_redirection() {
            ResponseType::OpaqueRedirect
        } else {
            ResponseType::Basic
        };
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(FetchResponse {
            status,
            kind,
            headers,
            body,
        })
    }
}
