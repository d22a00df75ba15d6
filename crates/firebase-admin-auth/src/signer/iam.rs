//! Signing through the IAM credentials `signBlob` API

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::Signer;
use crate::error::{AuthError, ErrorCategory, ErrorCode, Result};
use crate::http::HttpClient;
use crate::jwt::ALGORITHM_RS256;

/// Default IAM API host
pub const DEFAULT_IAM_HOST: &str = "https://iam.googleapis.com";

/// Default GCE metadata server host
pub const DEFAULT_METADATA_HOST: &str = "http://metadata.google.internal";

const METADATA_EMAIL_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/email";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignBlobRequest {
    bytes_to_sign: String,
}

#[derive(Deserialize)]
struct SignBlobResponse {
    signature: String,
}

/// Signs remotely as a service account the caller is allowed to impersonate
///
/// When no service account is configured, the default account of the
/// compute instance is looked up from the metadata server on first use and
/// remembered for the lifetime of the signer.
///
/// The [`HttpClient`] must carry an access token provider; `signBlob`
/// requires an OAuth2 bearer token with the `iam.serviceAccounts.signBlob`
/// permission.
#[derive(Debug)]
pub struct IamSigner {
    http: HttpClient,
    iam_host: String,
    metadata_host: String,
    service_account: OnceCell<String>,
}

impl IamSigner {
    /// Create a signer that discovers its service account from the metadata server
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            iam_host: DEFAULT_IAM_HOST.to_string(),
            metadata_host: DEFAULT_METADATA_HOST.to_string(),
            service_account: OnceCell::new(),
        }
    }

    /// Sign as `email` instead of discovering the account
    pub fn with_service_account(self, email: impl Into<String>) -> Self {
        Self {
            service_account: OnceCell::new_with(Some(email.into())),
            ..self
        }
    }

    /// Override the IAM API host
    pub fn with_iam_host(mut self, host: impl Into<String>) -> Self {
        self.iam_host = host.into();
        self
    }

    /// Override the metadata server host
    pub fn with_metadata_host(mut self, host: impl Into<String>) -> Self {
        self.metadata_host = host.into();
        self
    }

    async fn discover(&self, cancel: &CancellationToken) -> Result<String> {
        let url = format!("{}{METADATA_EMAIL_PATH}", self.metadata_host);
        let response = self
            .http
            .get(cancel, &url, &[("Metadata-Flavor", "Google")])
            .await?;

        if !response.is_success() {
            return Err(AuthError::from_platform_response(
                response.status,
                &response.body,
            ));
        }

        let email = response.text().trim().to_string();
        if email.is_empty() {
            return Err(AuthError::unknown("metadata server returned an empty email"));
        }

        info!(service_account = %email, "Discovered service account from metadata server");
        Ok(email)
    }
}

#[async_trait]
impl Signer for IamSigner {
    fn algorithm(&self) -> &str {
        ALGORITHM_RS256
    }

    async fn email(&self, cancel: &CancellationToken) -> Result<String> {
        let email = self
            .service_account
            .get_or_try_init(|| self.discover(cancel))
            .await
            .map_err(|err| {
                if err.category() == ErrorCategory::Cancelled {
                    return err;
                }
                error!(error = %err, "Service account discovery failed");
                AuthError::new(
                    err.category(),
                    err.code(),
                    format!(
                        "failed to determine service account: {err}; initialize the SDK with \
                         service account credentials or specify a service account with \
                         iam.serviceAccounts.signBlob permission; refer to \
                         https://firebase.google.com/docs/auth/admin/create-custom-tokens for \
                         more details on creating custom tokens"
                    ),
                )
            })?;
        Ok(email.clone())
    }

    async fn sign(&self, cancel: &CancellationToken, bytes: &[u8]) -> Result<Vec<u8>> {
        let email = self.email(cancel).await?;
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{email}:signBlob",
            self.iam_host
        );
        let request = SignBlobRequest {
            bytes_to_sign: STANDARD.encode(bytes),
        };

        let response = self.http.post_json(cancel, &url, &request).await?;
        if !response.is_success() {
            let err = AuthError::from_platform_response(response.status, &response.body);
            error!(
                service_account = %email,
                status = response.status,
                error = %err,
                "signBlob request failed"
            );
            return Err(if err.category() == ErrorCategory::PermissionDenied {
                err.with_code(ErrorCode::InsufficientPermission)
            } else {
                err
            });
        }

        let body: SignBlobResponse = response
            .json()
            .map_err(|e| AuthError::unknown(format!("failed to parse signBlob response: {e}")))?;
        STANDARD
            .decode(body.signature)
            .map_err(|e| AuthError::unknown(format!("failed to decode signBlob signature: {e}")))
    }
}
