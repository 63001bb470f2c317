//! Resilient request executor.
//!
//! [`Transport`] performs exactly one HTTP exchange and classifies its
//! outcome; [`Executor`] wraps a transport with the retry policy. Everything
//! that talks to a cluster goes through an `Executor`, which keeps the
//! pipeline testable with an in-memory transport.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::retry::{with_retry, Attempt, RetryConfig};

/// Connect timeout for the HTTP client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP methods used against the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// JSON document (`application/json`).
    Json(Value),
    /// Newline-delimited JSON (`application/x-ndjson`), used by `_bulk`.
    NdJson(String),
    /// Raw text, used by the legacy scroll dialect.
    Text(String),
}

/// A single request against a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, query string included.
    pub url: String,
    /// Optional body.
    pub body: Option<Body>,
}

impl Request {
    /// Creates a request without body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// `METHOD url`, for logs.
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// One HTTP exchange, classified.
///
/// Implementations must map "resource not found" to [`Attempt::Absent`] and
/// every other failure to [`Attempt::Retry`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the request once.
    async fn execute(&self, request: &Request) -> Attempt<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn execute(&self, request: &Request) -> Attempt<Value> {
        (**self).execute(request).await
    }
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport. Requests have no timeout unless one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend).
    pub fn new(request_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    fn build(&self, request: &Request) -> reqwest::RequestBuilder {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        match &request.body {
            None => builder,
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::NdJson(text)) => builder
                .header("Content-Type", "application/x-ndjson")
                .body(text.clone()),
            Some(Body::Text(text)) => builder
                .header("Content-Type", "text/plain")
                .body(text.clone()),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Attempt<Value> {
        let response = match self.build(request).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(Error::Http(e)),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Attempt::Absent;
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Attempt::Retry(Error::Http(e)),
        };

        if !status.is_success() {
            return Attempt::Retry(Error::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_body(&text)
    }
}

/// Parses a success body; an empty body is `null`.
pub(crate) fn parse_body(text: &str) -> Attempt<Value> {
    if text.trim().is_empty() {
        return Attempt::Success(Value::Null);
    }
    match serde_json::from_str(text) {
        Ok(value) => Attempt::Success(value),
        Err(e) => Attempt::Retry(Error::Json(e)),
    }
}

/// Retrying front-end over a [`Transport`].
pub struct Executor<T: Transport> {
    transport: T,
    retry: RetryConfig,
}

impl<T: Transport> Executor<T> {
    /// Creates an executor with the given retry policy.
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Performs a request, retrying transient failures.
    ///
    /// Returns `Ok(None)` when the server reports the resource as missing.
    ///
    /// # Errors
    ///
    /// Only when the retry policy gives up or a failure is not transient.
    pub async fn request(&self, request: &Request) -> Result<Option<Value>> {
        let operation = request.describe();
        debug!("{}", operation);
        with_retry(&self.retry, &operation, || self.transport.execute(request)).await
    }

    /// Performs a request exactly once, without retrying.
    pub async fn try_once(&self, request: &Request) -> Attempt<Value> {
        self.transport.execute(request).await
    }

    /// `GET url`.
    ///
    /// # Errors
    ///
    /// See [`Executor::request`].
    pub async fn get(&self, url: impl Into<String>) -> Result<Option<Value>> {
        self.request(&Request::new(Method::Get, url)).await
    }

    /// `PUT url` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Executor::request`].
    pub async fn put_json(&self, url: impl Into<String>, body: Value) -> Result<Option<Value>> {
        self.request(&Request::new(Method::Put, url).with_body(Body::Json(body)))
            .await
    }

    /// `POST url` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Executor::request`].
    pub async fn post_json(&self, url: impl Into<String>, body: Value) -> Result<Option<Value>> {
        self.request(&Request::new(Method::Post, url).with_body(Body::Json(body)))
            .await
    }

    /// `POST url` with an ndjson body.
    ///
    /// # Errors
    ///
    /// See [`Executor::request`].
    pub async fn post_ndjson(&self, url: impl Into<String>, body: String) -> Result<Option<Value>> {
        self.request(&Request::new(Method::Post, url).with_body(Body::NdJson(body)))
            .await
    }

    /// `DELETE url`.
    ///
    /// # Errors
    ///
    /// See [`Executor::request`].
    pub async fn delete(&self, url: impl Into<String>) -> Result<Option<Value>> {
        self.request(&Request::new(Method::Delete, url)).await
    }
}
