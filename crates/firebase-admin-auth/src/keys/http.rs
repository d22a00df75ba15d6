//! HTTP-backed key source with `Cache-Control` driven expiry

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{KeySnapshot, KeySource, certificate_error, parse_max_age, parse_public_keys};
use crate::clock::{Clock, SystemClock};
use crate::error::{ErrorCode, Result};
use crate::http::{HttpClient, with_cancellation};

/// Certificates used to sign Firebase ID tokens
pub const ID_TOKEN_CERT_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Certificates used to sign Firebase session cookies
pub const SESSION_COOKIE_CERT_URL: &str =
    "https://www.googleapis.com/identitytoolkit/v3/relyingparty/publicKeys";

/// Fetches `{kid: "<PEM certificate>"}` from a URL and caches it until the
/// response's `max-age` elapses
///
/// The snapshot is guarded by a single async mutex which is held across the
/// refresh, so callers that arrive while the snapshot is expired all wait for
/// the same network round-trip. When a refresh fails and a non-empty
/// snapshot is already cached, the stale snapshot is served.
///
/// # Example
///
/// ```rust,no_run
/// use firebase_admin_auth::http::{HttpClient, DEFAULT_HTTP_TIMEOUT};
/// use firebase_admin_auth::keys::{HttpKeySource, KeySource, ID_TOKEN_CERT_URL};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let source = HttpKeySource::new(ID_TOKEN_CERT_URL, HttpClient::new(DEFAULT_HTTP_TIMEOUT)?);
/// let snapshot = source.keys(&CancellationToken::new()).await?;
/// println!("{} keys, refresh at {}", snapshot.len(), snapshot.expires_at());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct HttpKeySource {
    url: String,
    http: HttpClient,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<Arc<KeySnapshot>>>,
}

impl HttpKeySource {
    /// Create a source for `url` using the system clock
    pub fn new(url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            url: url.into(),
            http,
            clock: Arc::new(SystemClock),
            cached: Mutex::new(None),
        }
    }

    /// Replace the clock used to compute and check expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Certificate URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Currently cached snapshot, without refreshing
    pub async fn cached(&self) -> Option<Arc<KeySnapshot>> {
        self.cached.lock().await.clone()
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<KeySnapshot> {
        info!(url = %self.url, "Fetching public key certificates");

        let response = self
            .http
            .get(cancel, &self.url, &[])
            .await
            .map_err(|e| e.with_code(ErrorCode::CertificateFetchFailed))?;

        if !response.is_success() {
            error!(
                url = %self.url,
                status = response.status,
                "Certificate endpoint returned error status"
            );
            return Err(certificate_error(format!(
                "invalid response ({}) while retrieving public keys: {}",
                response.status,
                response.text()
            )));
        }

        let keys = parse_public_keys(&response.body)?;
        let max_age = parse_max_age(response.header("cache-control"))?;
        let expires_at = self
            .clock
            .now()
            .saturating_add(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));

        info!(
            url = %self.url,
            key_count = keys.len(),
            expires_at,
            "Refreshed public key certificates"
        );

        Ok(KeySnapshot::new(keys, expires_at))
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn keys(&self, cancel: &CancellationToken) -> Result<Arc<KeySnapshot>> {
        let mut cached = with_cancellation(cancel, self.cached.lock()).await?;

        if let Some(snapshot) = cached.as_ref()
            && !snapshot.is_empty()
            && !snapshot.is_expired(self.clock.now())
        {
            debug!(url = %self.url, "Using cached public keys");
            return Ok(Arc::clone(snapshot));
        }

        match self.fetch(cancel).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *cached = Some(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Err(err) => match cached.as_ref() {
                Some(stale) if !stale.is_empty() => {
                    warn!(
                        url = %self.url,
                        error = %err,
                        "Public key refresh failed, serving stale keys"
                    );
                    Ok(Arc::clone(stale))
                }
                _ => Err(err),
            },
        }
    }
}
