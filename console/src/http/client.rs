//! HTTP client implementation

use std::time::Duration;

use http::StatusCode;
use reqwest::{header, Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use updater_api::ErrorBody;

use crate::errors::ConsoleError;

/// Connection settings for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Root of the update service, e.g. `http://127.0.0.1:8080`
    pub base_url: String,

    /// Name of the session cookie
    pub session_cookie: String,

    /// Session token sent as the cookie value
    pub session_token: Option<SecretString>,

    pub connect_timeout: Duration,

    /// Size of the pieces a package body is streamed in
    pub upload_chunk_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            session_cookie: "updater_session".to_string(),
            session_token: None,
            connect_timeout: Duration::from_secs(10),
            upload_chunk_size: 64 * 1024,
        }
    }
}

/// Status and raw body of a completed request
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: String,
}

impl ApiReply {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body, mapping malformed JSON to a parse error
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ConsoleError> {
        serde_json::from_str(&self.body).map_err(|e| {
            ConsoleError::ParseError(format!("invalid response body ({}): {}", self.status, e))
        })
    }

    /// The body's non-blank `error` field, if there is one
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_str::<ErrorBody>(&self.body)
            .ok()
            .and_then(|body| body.error)
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
    }
}

/// HTTP client for the update service
pub struct HttpClient {
    client: Client,
    base_url: Url,
    session_cookie: String,
    session_token: Option<SecretString>,
    upload_chunk_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client.
    ///
    /// Only the connect phase is bounded: uploads and event streams may run
    /// for as long as the server keeps them open.
    pub fn new(options: &ClientOptions) -> Result<Self, ConsoleError> {
        let base_url = Url::parse(options.base_url.trim()).map_err(|e| {
            ConsoleError::ConfigError(format!("invalid base url {}: {}", options.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConsoleError::ConfigError(format!(
                "base url cannot carry a path: {}",
                options.base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            session_cookie: options.session_cookie.clone(),
            session_token: options.session_token.clone(),
            upload_chunk_size: options.upload_chunk_size.max(1),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn upload_chunk_size(&self) -> usize {
        self.upload_chunk_size
    }

    /// Build an endpoint URL; each segment is percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ConsoleError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConsoleError::ConfigError(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `Cookie` header value for the session, when there is a token
    pub(crate) fn session_cookie(&self) -> Option<String> {
        self.session_token
            .as_ref()
            .map(|token| format!("{}={}", self.session_cookie, token.expose_secret()))
    }

    /// Start a request carrying the session cookie
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        let request = self.client.request(method, url);
        match self.session_cookie() {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        }
    }

    /// Send a request and read the full body.
    ///
    /// Any status is a reply; only a missing response is an error.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<ApiReply, ConsoleError> {
        let response = request.send().await.map_err(|e| {
            warn!("Request failed: {}", e);
            ConsoleError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConsoleError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            debug!("HTTP {} - {}", status, body);
        }
        Ok(ApiReply::new(status, body))
    }

    pub(crate) async fn get(&self, segments: &[&str]) -> Result<ApiReply, ConsoleError> {
        let url = self.endpoint(segments)?;
        self.send(self.request(Method::GET, url)).await
    }
}
