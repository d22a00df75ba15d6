//! HTTP plumbing shared by the remote collaborators
//!
//! Wraps a `reqwest::Client` so that every request:
//!
//! - races the caller's [`CancellationToken`] and aborts immediately on cancellation
//! - maps transport failures onto [`AuthError`] categories
//! - optionally carries a bearer token from an [`AccessTokenProvider`]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AuthError, Result};

/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies OAuth2 bearer tokens for authorized platform calls
#[async_trait]
pub trait AccessTokenProvider: Send + Sync + std::fmt::Debug {
    /// Return a currently valid access token
    async fn access_token(&self, cancel: &CancellationToken) -> Result<SecretString>;
}

/// Access token provider that always returns the same token
///
/// Used with externally managed credentials and with the emulator, which
/// accepts the literal token `owner`.
#[derive(Clone)]
pub struct StaticAccessToken {
    token: SecretString,
}

impl StaticAccessToken {
    /// Wrap a fixed token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }
}

impl std::fmt::Debug for StaticAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAccessToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self, _cancel: &CancellationToken) -> Result<SecretString> {
        Ok(SecretString::new(self.token.expose_secret().clone()))
    }
}

/// Buffered HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as (lossy) text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client used for certificates, signBlob, metadata and account lookups
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    token_provider: Option<Arc<dyn AccessTokenProvider>>,
}

impl HttpClient {
    /// Create a client with the given per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::unknown(format!("failed to create http client: {e}")))?;

        Ok(Self::from_client(inner))
    }

    /// Wrap an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            inner: client,
            token_provider: None,
        }
    }

    /// Authorize `post_json` requests with bearer tokens from `provider`
    pub fn with_token_provider(mut self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Issue an unauthenticated GET
    ///
    /// # Errors
    ///
    /// Fails on cancellation or transport errors. Non-success statuses are
    /// returned as responses, not errors.
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let mut request = self.inner.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(cancel, url, request).await
    }

    /// Issue a POST with a JSON body, authorized when a token provider is set
    ///
    /// # Errors
    ///
    /// Fails on cancellation, token acquisition or transport errors.
    /// Non-success statuses are returned as responses, not errors.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: &B,
    ) -> Result<HttpResponse> {
        let mut request = self.inner.post(url).json(body);
        if let Some(provider) = &self.token_provider {
            let token = provider.access_token(cancel).await?;
            request = request.bearer_auth(token.expose_secret());
        }
        self.execute(cancel, url, request).await
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<HttpResponse> {
        let call = async {
            let response = request
                .send()
                .await
                .map_err(|e| AuthError::from_transport(&e))?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| AuthError::from_transport(&e))?;

            Ok(HttpResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        };

        let response = with_cancellation(cancel, call).await??;
        debug!(url = %url, status = response.status, "HTTP call completed");
        Ok(response)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("inner", &"<reqwest::Client>")
            .field("token_provider", &self.token_provider)
            .finish()
    }
}

/// Run `future` unless `cancel` fires first
///
/// # Errors
///
/// Returns [`AuthError::cancelled`] if the token is (or becomes) cancelled
/// before the future completes.
pub(crate) async fn with_cancellation<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AuthError::cancelled()),
        output = future => Ok(output),
    }
}
