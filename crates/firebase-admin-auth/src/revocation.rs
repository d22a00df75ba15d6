//! Revocation and disabled-user checks for verified tokens

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{AuthError, ErrorCategory, ErrorCode, Result};
use crate::http::HttpClient;
use crate::token::IdToken;
use crate::verifier::VerifierKind;

/// Default Identity Toolkit API host
pub const DEFAULT_IDENTITY_TOOLKIT_HOST: &str = "https://identitytoolkit.googleapis.com";

/// What the revocation check needs to know about a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Whether the account is disabled
    pub disabled: bool,
    /// Tokens issued before this instant (Unix milliseconds) are revoked
    pub tokens_valid_after_millis: i64,
}

/// Looks up user state by UID
#[async_trait]
pub trait UserStateProvider: Send + Sync + std::fmt::Debug {
    /// Fetch the state of `uid`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::UserNotFound`] for unknown users and transport
    /// or API errors otherwise.
    async fn user_state(&self, cancel: &CancellationToken, uid: &str) -> Result<UserState>;
}

/// Rejects tokens of disabled users and tokens issued before the user's
/// refresh tokens were revoked
#[derive(Debug, Clone)]
pub struct RevocationChecker {
    users: Arc<dyn UserStateProvider>,
}

impl RevocationChecker {
    /// Create a checker backed by `users`
    pub fn new(users: Arc<dyn UserStateProvider>) -> Self {
        Self { users }
    }

    /// Check an already verified token
    ///
    /// Errors from the user lookup are returned unchanged.
    ///
    /// # Errors
    ///
    /// - `...Invalid` wrapping [`ErrorCode::UserDisabled`] for disabled users
    /// - `...Invalid` wrapping `...Revoked` when `iat` predates the revocation
    pub async fn check(
        &self,
        cancel: &CancellationToken,
        kind: VerifierKind,
        token: &IdToken,
    ) -> Result<()> {
        let state = self.users.user_state(cancel, &token.uid).await?;

        if state.disabled {
            warn!(kind = %kind, uid = %token.uid, "Token belongs to a disabled user");
            return Err(AuthError::invalid_argument(
                ErrorCode::UserDisabled,
                "user has been disabled",
            )
            .with_parent(kind.invalid_code()));
        }

        if token.issued_at.saturating_mul(1000) < state.tokens_valid_after_millis {
            warn!(kind = %kind, uid = %token.uid, "Token has been revoked");
            return Err(AuthError::invalid_argument(
                kind.revoked_code(),
                format!("{kind} has been revoked"),
            )
            .with_parent(kind.invalid_code()));
        }

        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    local_id: [&'a str; 1],
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    valid_since: Option<String>,
}

/// [`UserStateProvider`] backed by the Identity Toolkit `accounts:lookup` API
///
/// The [`HttpClient`] must carry an access token provider. Against the
/// emulator, use [`IdentityToolkitUserLookup::for_emulator`] with a client
/// authorized by the literal token `owner`.
#[derive(Debug, Clone)]
pub struct IdentityToolkitUserLookup {
    http: HttpClient,
    project_url: String,
    endpoint: String,
}

impl IdentityToolkitUserLookup {
    /// Look up users of `project_id` on the production API
    pub fn new(http: HttpClient, project_id: &str) -> Self {
        Self::with_host(http, DEFAULT_IDENTITY_TOOLKIT_HOST, project_id)
    }

    /// Look up users of `project_id` on an alternative API host
    pub fn with_host(http: HttpClient, host: &str, project_id: &str) -> Self {
        let project_url = format!("{}/v1/projects/{project_id}", host.trim_end_matches('/'));
        Self {
            http,
            endpoint: format!("{project_url}/accounts:lookup"),
            project_url,
        }
    }

    /// Look up users of `tenant_id` within the same project
    pub fn for_tenant(&self, tenant_id: &str) -> Self {
        Self {
            http: self.http.clone(),
            project_url: self.project_url.clone(),
            endpoint: format!("{}/tenants/{tenant_id}/accounts:lookup", self.project_url),
        }
    }

    /// Look up users on the Auth emulator at `emulator_host` (`host:port`)
    pub fn for_emulator(http: HttpClient, emulator_host: &str, project_id: &str) -> Self {
        Self::with_host(
            http,
            &format!("http://{emulator_host}/identitytoolkit.googleapis.com"),
            project_id,
        )
    }

    /// Full `accounts:lookup` URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UserStateProvider for IdentityToolkitUserLookup {
    async fn user_state(&self, cancel: &CancellationToken, uid: &str) -> Result<UserState> {
        let request = LookupRequest { local_id: [uid] };
        let response = self.http.post_json(cancel, &self.endpoint, &request).await?;

        if !response.is_success() {
            let err = AuthError::from_platform_response(response.status, &response.body);
            error!(uid, status = response.status, error = %err, "User lookup failed");
            return Err(err);
        }

        let body: LookupResponse = response
            .json()
            .map_err(|e| AuthError::unknown(format!("failed to parse user lookup response: {e}")))?;
        let Some(user) = body.users.into_iter().next() else {
            return Err(AuthError::new(
                ErrorCategory::NotFound,
                ErrorCode::UserNotFound,
                format!("no user exists with the uid: {uid:?}"),
            ));
        };

        let valid_since = match user.valid_since.as_deref() {
            None | Some("") => 0,
            Some(secs) => secs.parse::<i64>().map_err(|e| {
                AuthError::unknown(format!("invalid validSince value {secs:?}: {e}"))
            })?,
        };

        Ok(UserState {
            disabled: user.disabled,
            tokens_valid_after_millis: valid_since.saturating_mul(1000),
        })
    }
}
