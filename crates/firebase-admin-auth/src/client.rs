//! Client façade tying signers, verifiers and revocation checks together

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::{AuthError, ErrorCode, Result};
use crate::http::{AccessTokenProvider, HttpClient, StaticAccessToken};
use crate::keys::{HttpKeySource, KeySource};
use crate::minter::TokenMinter;
use crate::revocation::{IdentityToolkitUserLookup, RevocationChecker, UserStateProvider};
use crate::signer::{EmulatedSigner, IamSigner, ServiceAccountSigner, Signer};
use crate::token::IdToken;
use crate::verifier::{TokenVerifier, VerifierKind};

/// Bearer token the Auth emulator accepts for admin calls
const EMULATOR_ACCESS_TOKEN: &str = "owner";

/// Firebase Authentication admin client
///
/// Cheap to clone; clones share key caches and the discovered signer
/// identity.
///
/// # Example
///
/// ```rust,no_run
/// use firebase_admin_auth::{AuthClient, AuthConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let client = AuthClient::new(AuthConfig::from_env()?)?;
/// let cancel = CancellationToken::new();
///
/// let custom_token = client.custom_token(&cancel, "alice").await?;
/// let verified = client.verify_id_token_and_check_revoked(&cancel, "eyJ...").await?;
/// println!("{custom_token} {}", verified.uid);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct AuthClient {
    project_id: String,
    emulator: bool,
    minter: TokenMinter,
    id_token_verifier: TokenVerifier,
    session_cookie_verifier: TokenVerifier,
    users: Arc<dyn UserStateProvider>,
    lookup: Option<IdentityToolkitUserLookup>,
}

impl AuthClient {
    /// Build a client from `config` with the default collaborators
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be created or the configured
    /// credentials hold an unusable private key.
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a client with custom collaborators
    pub fn builder(config: AuthConfig) -> AuthClientBuilder {
        AuthClientBuilder {
            config,
            token_provider: None,
            clock: None,
            signer: None,
            id_token_keys: None,
            session_cookie_keys: None,
            users: None,
        }
    }

    /// Project tokens are verified against; empty when unknown
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Whether the client talks to the Auth emulator
    pub fn is_emulator(&self) -> bool {
        self.emulator
    }

    /// Client scoped to a tenant
    ///
    /// # Errors
    ///
    /// Fails if `tenant_id` is empty.
    pub fn tenant(&self, tenant_id: &str) -> Result<TenantClient> {
        TenantClient::new(self, tenant_id)
    }

    /// Mint a custom token for `uid`
    ///
    /// # Errors
    ///
    /// See [`TokenMinter::mint`].
    pub async fn custom_token(&self, cancel: &CancellationToken, uid: &str) -> Result<String> {
        self.minter.mint(cancel, uid, None).await
    }

    /// Mint a custom token for `uid` carrying developer claims
    ///
    /// # Errors
    ///
    /// See [`TokenMinter::mint`].
    pub async fn custom_token_with_claims(
        &self,
        cancel: &CancellationToken,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> Result<String> {
        self.minter.mint(cancel, uid, Some(claims)).await
    }

    /// Verify an ID token
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify`].
    pub async fn verify_id_token(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<IdToken> {
        self.verify(cancel, VerifierKind::IdToken, token, None, false).await
    }

    /// Verify an ID token and reject disabled users and revoked tokens
    ///
    /// # Errors
    ///
    /// Verification errors, then [`RevocationChecker::check`] errors.
    pub async fn verify_id_token_and_check_revoked(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<IdToken> {
        self.verify(cancel, VerifierKind::IdToken, token, None, true).await
    }

    /// Verify a session cookie
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify`].
    pub async fn verify_session_cookie(
        &self,
        cancel: &CancellationToken,
        cookie: &str,
    ) -> Result<IdToken> {
        self.verify(cancel, VerifierKind::SessionCookie, cookie, None, false).await
    }

    /// Verify a session cookie and reject disabled users and revoked cookies
    ///
    /// # Errors
    ///
    /// Verification errors, then [`RevocationChecker::check`] errors.
    pub async fn verify_session_cookie_and_check_revoked(
        &self,
        cancel: &CancellationToken,
        cookie: &str,
    ) -> Result<IdToken> {
        self.verify(cancel, VerifierKind::SessionCookie, cookie, None, true).await
    }

    async fn verify(
        &self,
        cancel: &CancellationToken,
        kind: VerifierKind,
        token: &str,
        tenant_id: Option<&str>,
        check_revoked: bool,
    ) -> Result<IdToken> {
        let verifier = match kind {
            VerifierKind::IdToken => &self.id_token_verifier,
            VerifierKind::SessionCookie => &self.session_cookie_verifier,
        };
        let verified = verifier.verify(cancel, token).await?;

        if let Some(expected) = tenant_id
            && verified.tenant_id() != Some(expected)
        {
            return Err(AuthError::invalid_argument(
                ErrorCode::TenantIdMismatch,
                format!(
                    "invalid tenant id: {:?}",
                    verified.tenant_id().unwrap_or_default()
                ),
            )
            .with_parent(kind.invalid_code()));
        }

        if check_revoked {
            RevocationChecker::new(Arc::clone(&self.users))
                .check(cancel, kind, &verified)
                .await?;
        }
        Ok(verified)
    }
}

/// Builder for [`AuthClient`]
///
/// Every collaborator left unset is derived from the [`AuthConfig`].
#[must_use]
pub struct AuthClientBuilder {
    config: AuthConfig,
    token_provider: Option<Arc<dyn AccessTokenProvider>>,
    clock: Option<Arc<dyn Clock>>,
    signer: Option<Arc<dyn Signer>>,
    id_token_keys: Option<Arc<dyn KeySource>>,
    session_cookie_keys: Option<Arc<dyn KeySource>>,
    users: Option<Arc<dyn UserStateProvider>>,
}

impl AuthClientBuilder {
    /// Authorize signBlob and user lookups with `provider`
    pub fn token_provider(mut self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Use `clock` for minting, verification and key expiry
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sign custom tokens with `signer`
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Verify ID tokens against `keys`
    pub fn id_token_keys(mut self, keys: Arc<dyn KeySource>) -> Self {
        self.id_token_keys = Some(keys);
        self
    }

    /// Verify session cookies against `keys`
    pub fn session_cookie_keys(mut self, keys: Arc<dyn KeySource>) -> Self {
        self.session_cookie_keys = Some(keys);
        self
    }

    /// Look up user state with `users`
    pub fn user_state_provider(mut self, users: Arc<dyn UserStateProvider>) -> Self {
        self.users = Some(users);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be created or the configured
    /// credentials hold an unusable private key.
    pub fn build(self) -> Result<AuthClient> {
        let config = self.config;
        let emulator = config.is_emulator();
        let project_id = config.resolved_project_id().unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let plain_http = HttpClient::new(config.http_timeout)?;
        let token_provider = if emulator {
            let owner: Arc<dyn AccessTokenProvider> =
                Arc::new(StaticAccessToken::new(EMULATOR_ACCESS_TOKEN));
            Some(owner)
        } else {
            self.token_provider
        };
        let authorized_http = match token_provider {
            Some(provider) => plain_http.clone().with_token_provider(provider),
            None => plain_http.clone(),
        };

        let signer: Arc<dyn Signer> = match self.signer {
            Some(signer) => signer,
            None if emulator => Arc::new(EmulatedSigner),
            None => match config.credentials.as_ref() {
                Some(credentials) if credentials.has_private_key() => {
                    Arc::new(ServiceAccountSigner::from_credentials(credentials)?)
                }
                _ => {
                    let signer = IamSigner::new(authorized_http.clone())
                        .with_iam_host(config.iam_host.clone())
                        .with_metadata_host(config.metadata_host.clone());
                    let service_account = config
                        .service_account_id
                        .clone()
                        .filter(|id| !id.is_empty())
                        .or_else(|| {
                            config
                                .credentials
                                .as_ref()
                                .map(|c| c.client_email.clone())
                                .filter(|email| !email.is_empty())
                        });
                    Arc::new(match service_account {
                        Some(email) => signer.with_service_account(email),
                        None => signer,
                    })
                }
            },
        };

        let keys_for = |url: &str| -> Arc<dyn KeySource> {
            Arc::new(HttpKeySource::new(url, plain_http.clone()).with_clock(Arc::clone(&clock)))
        };
        let id_token_keys = self
            .id_token_keys
            .unwrap_or_else(|| keys_for(&config.id_token_cert_url));
        let session_cookie_keys = self
            .session_cookie_keys
            .unwrap_or_else(|| keys_for(&config.session_cookie_cert_url));

        let (users, lookup) = match self.users {
            Some(users) => (users, None),
            None => {
                let lookup = match config.emulator_host.as_deref() {
                    Some(host) if emulator => {
                        IdentityToolkitUserLookup::for_emulator(authorized_http, host, &project_id)
                    }
                    _ => IdentityToolkitUserLookup::with_host(
                        authorized_http,
                        &config.identity_toolkit_host,
                        &project_id,
                    ),
                };
                let users: Arc<dyn UserStateProvider> = Arc::new(lookup.clone());
                (users, Some(lookup))
            }
        };

        let verifier = |kind, keys| {
            TokenVerifier::new(kind, project_id.clone(), keys)
                .with_clock(Arc::clone(&clock))
                .with_emulator(emulator)
        };

        info!(
            project_id = %project_id,
            emulator,
            signer = ?signer,
            "Created auth client"
        );

        Ok(AuthClient {
            minter: TokenMinter::new(signer).with_clock(Arc::clone(&clock)),
            id_token_verifier: verifier(VerifierKind::IdToken, id_token_keys),
            session_cookie_verifier: verifier(VerifierKind::SessionCookie, session_cookie_keys),
            project_id,
            emulator,
            users,
            lookup,
        })
    }
}

impl std::fmt::Debug for AuthClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClientBuilder")
            .field("config", &self.config)
            .field("token_provider", &self.token_provider.is_some())
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

/// Client whose tokens belong to one tenant
///
/// Minted custom tokens carry `tenant_id`; verified ID tokens must carry the
/// same tenant in `firebase.tenant`.
#[derive(Debug, Clone)]
pub struct TenantClient {
    tenant_id: String,
    base: AuthClient,
}

impl TenantClient {
    fn new(client: &AuthClient, tenant_id: &str) -> Result<Self> {
        let mut base = client.clone();
        base.minter = base.minter.with_tenant(tenant_id)?;
        if let Some(lookup) = &client.lookup {
            let scoped = lookup.for_tenant(tenant_id);
            base.users = Arc::new(scoped.clone());
            base.lookup = Some(scoped);
        }

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            base,
        })
    }

    /// Tenant this client is scoped to
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Mint a tenant-scoped custom token for `uid`
    ///
    /// # Errors
    ///
    /// See [`TokenMinter::mint`].
    pub async fn custom_token(&self, cancel: &CancellationToken, uid: &str) -> Result<String> {
        self.base.custom_token(cancel, uid).await
    }

    /// Mint a tenant-scoped custom token carrying developer claims
    ///
    /// # Errors
    ///
    /// See [`TokenMinter::mint`].
    pub async fn custom_token_with_claims(
        &self,
        cancel: &CancellationToken,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> Result<String> {
        self.base.custom_token_with_claims(cancel, uid, claims).await
    }

    /// Verify an ID token issued to this tenant
    ///
    /// # Errors
    ///
    /// Verification errors, or [`ErrorCode::TenantIdMismatch`] (reported as
    /// ID-token-invalid) when the token belongs to another tenant.
    pub async fn verify_id_token(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<IdToken> {
        self.base
            .verify(cancel, VerifierKind::IdToken, token, Some(&self.tenant_id), false)
            .await
    }

    /// Verify an ID token issued to this tenant and check revocation
    ///
    /// # Errors
    ///
    /// As [`TenantClient::verify_id_token`], then revocation errors.
    pub async fn verify_id_token_and_check_revoked(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<IdToken> {
        self.base
            .verify(cancel, VerifierKind::IdToken, token, Some(&self.tenant_id), true)
            .await
    }
}
