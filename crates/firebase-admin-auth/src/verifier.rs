//! ID token and session cookie verification
//!
//! Verification runs in three phases, cheapest first:
//!
//! 1. structure and claims: segment count, header, `aud`, `iss`, `sub`
//! 2. timestamps, with 300 seconds of clock skew tolerated in both directions
//! 3. RS256 signature against the keys of the configured [`KeySource`]
//!
//! Only the last phase may touch the network. In emulator mode it is skipped
//! entirely and unsigned (`alg: none`) tokens are accepted.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, ErrorCode, Result};
use crate::jwt::{ALGORITHM_NONE, ALGORITHM_RS256, JwtHeader, Segments};
use crate::keys::{ID_TOKEN_CERT_URL, KeySource, SESSION_COOKIE_CERT_URL};
use crate::minter::{FIREBASE_AUDIENCE, MAX_UID_LEN};
use crate::token::IdToken;

/// Tolerated clock skew in seconds
pub const CLOCK_SKEW_SECS: i64 = 300;

/// Which kind of token a verifier accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifierKind {
    /// Firebase ID tokens issued to client SDKs
    IdToken,
    /// Session cookies minted from ID tokens
    SessionCookie,
}

impl VerifierKind {
    /// Name used in diagnostics
    pub fn short_name(self) -> &'static str {
        match self {
            Self::IdToken => "ID token",
            Self::SessionCookie => "session cookie",
        }
    }

    /// Name with its indefinite article
    pub fn articled_name(self) -> &'static str {
        match self {
            Self::IdToken => "an ID token",
            Self::SessionCookie => "a session cookie",
        }
    }

    /// Documentation on obtaining a valid token of this kind
    pub fn doc_url(self) -> &'static str {
        match self {
            Self::IdToken => "https://firebase.google.com/docs/auth/admin/verify-id-tokens",
            Self::SessionCookie => "https://firebase.google.com/docs/auth/admin/manage-cookies",
        }
    }

    /// Issuer prefix; the project id is appended
    pub fn issuer_prefix(self) -> &'static str {
        match self {
            Self::IdToken => "https://securetoken.google.com/",
            Self::SessionCookie => "https://session.firebase.google.com/",
        }
    }

    /// Default public certificate URL
    pub fn cert_url(self) -> &'static str {
        match self {
            Self::IdToken => ID_TOKEN_CERT_URL,
            Self::SessionCookie => SESSION_COOKIE_CERT_URL,
        }
    }

    /// Code for malformed or untrusted tokens
    pub fn invalid_code(self) -> ErrorCode {
        match self {
            Self::IdToken => ErrorCode::IdTokenInvalid,
            Self::SessionCookie => ErrorCode::SessionCookieInvalid,
        }
    }

    /// Code for expired tokens
    pub fn expired_code(self) -> ErrorCode {
        match self {
            Self::IdToken => ErrorCode::IdTokenExpired,
            Self::SessionCookie => ErrorCode::SessionCookieExpired,
        }
    }

    /// Code for revoked tokens
    pub fn revoked_code(self) -> ErrorCode {
        match self {
            Self::IdToken => ErrorCode::IdTokenRevoked,
            Self::SessionCookie => ErrorCode::SessionCookieRevoked,
        }
    }

    fn project_match_msg(self) -> String {
        format!(
            "make sure the {} comes from the same Firebase project as the credential used to \
             authenticate this SDK",
            self.short_name()
        )
    }

    fn verify_token_msg(self) -> String {
        format!(
            "see {} for details on how to retrieve a valid {}",
            self.doc_url(),
            self.short_name()
        )
    }
}

impl fmt::Display for VerifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Verifies one kind of Firebase token for one project
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use firebase_admin_auth::http::{HttpClient, DEFAULT_HTTP_TIMEOUT};
/// use firebase_admin_auth::keys::{HttpKeySource, ID_TOKEN_CERT_URL};
/// use firebase_admin_auth::verifier::{TokenVerifier, VerifierKind};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let keys = HttpKeySource::new(ID_TOKEN_CERT_URL, HttpClient::new(DEFAULT_HTTP_TIMEOUT)?);
/// let verifier = TokenVerifier::new(VerifierKind::IdToken, "my-project", Arc::new(keys));
///
/// let token = verifier.verify(&CancellationToken::new(), "eyJ...").await?;
/// println!("signed in as {}", token.uid);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    kind: VerifierKind,
    project_id: String,
    keys: Arc<dyn KeySource>,
    clock: Arc<dyn Clock>,
    emulator: bool,
}

impl TokenVerifier {
    /// Create a verifier checking signatures against `keys`
    pub fn new(
        kind: VerifierKind,
        project_id: impl Into<String>,
        keys: Arc<dyn KeySource>,
    ) -> Self {
        Self {
            kind,
            project_id: project_id.into(),
            keys,
            clock: Arc::new(SystemClock),
            emulator: false,
        }
    }

    /// Replace the clock used for `iat`/`exp` checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Skip signature checks and accept unsigned tokens
    pub fn with_emulator(mut self, emulator: bool) -> Self {
        self.emulator = emulator;
        self
    }

    /// Kind of token accepted
    pub fn kind(&self) -> VerifierKind {
        self.kind
    }

    /// Project the tokens must belong to
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Whether signature checks are skipped
    pub fn is_emulator(&self) -> bool {
        self.emulator
    }

    /// Verify `token` and decode its claims
    ///
    /// # Errors
    ///
    /// - `...Invalid` for structural, claim, future-`iat` or signature failures
    /// - `...Expired` when `exp` is more than the skew in the past
    /// - [`ErrorCode::CertificateFetchFailed`] when no keys are available
    pub async fn verify(&self, cancel: &CancellationToken, token: &str) -> Result<IdToken> {
        let result = self.verify_token(cancel, token).await;
        match &result {
            Ok(verified) => debug!(kind = %self.kind, uid = %verified.uid, "Token verified"),
            Err(err) => warn!(
                kind = %self.kind,
                code = %err.code(),
                error = %err,
                "Token rejected"
            ),
        }
        result
    }

    async fn verify_token(&self, cancel: &CancellationToken, token: &str) -> Result<IdToken> {
        if self.project_id.is_empty() {
            return Err(self.invalid("project id not available"));
        }

        let (header, verified) = self.verify_content(token).map_err(|msg| self.invalid(msg))?;
        self.verify_timestamps(&verified)?;

        if !self.emulator {
            self.verify_signature(cancel, token, header.key_id()).await?;
        }
        Ok(verified)
    }

    fn verify_content(&self, token: &str) -> std::result::Result<(JwtHeader, IdToken), String> {
        let kind = self.kind;
        if token.is_empty() {
            return Err(format!("{kind} must be a non-empty string"));
        }

        let segments = Segments::split(token).map_err(|e| e.to_string())?;
        let header = segments.header().map_err(|e| e.to_string())?;
        let mut verified: IdToken = segments.payload().map_err(|e| e.to_string())?;
        let mut claims: Map<String, Value> = segments.payload().map_err(|e| e.to_string())?;

        if !self.emulator {
            if header.key_id().is_none() {
                return Err(if verified.audience == FIREBASE_AUDIENCE {
                    format!("expected {} but got a custom token", kind.articled_name())
                } else {
                    format!("{kind} has no 'kid' header")
                });
            }
            if header.algorithm != ALGORITHM_RS256 {
                return Err(format!(
                    "{kind} has invalid algorithm; expected 'RS256' but got {:?}; {}",
                    header.algorithm,
                    kind.project_match_msg()
                ));
            }
        } else if header.algorithm != ALGORITHM_RS256 && header.algorithm != ALGORITHM_NONE {
            return Err(format!(
                "{kind} has invalid algorithm; expected 'RS256' or 'none' but got {:?}",
                header.algorithm
            ));
        }

        if verified.audience != self.project_id {
            return Err(format!(
                "{kind} has invalid 'aud' (audience) claim; expected {:?} but got {:?}; {}; {}",
                self.project_id,
                verified.audience,
                kind.project_match_msg(),
                kind.verify_token_msg()
            ));
        }

        let expected_issuer = format!("{}{}", kind.issuer_prefix(), self.project_id);
        if verified.issuer != expected_issuer {
            return Err(format!(
                "{kind} has invalid 'iss' (issuer) claim; expected {expected_issuer:?} but got {:?}; {}; {}",
                verified.issuer,
                kind.project_match_msg(),
                kind.verify_token_msg()
            ));
        }

        if verified.subject.is_empty() {
            return Err(format!(
                "{kind} has empty 'sub' (subject) claim; {}",
                kind.verify_token_msg()
            ));
        }
        if verified.subject.chars().count() > MAX_UID_LEN {
            return Err(format!(
                "{kind} has a 'sub' (subject) claim longer than 128 characters; {}",
                kind.verify_token_msg()
            ));
        }

        verified.uid = verified.subject.clone();
        for name in IdToken::STANDARD_CLAIMS {
            claims.remove(name);
        }
        verified.claims = claims;

        Ok((header, verified))
    }

    fn verify_timestamps(&self, verified: &IdToken) -> Result<()> {
        let now = self.clock.now();

        if verified.issued_at.saturating_sub(CLOCK_SKEW_SECS) > now {
            return Err(self.invalid(format!(
                "{} issued at future timestamp: {}",
                self.kind, verified.issued_at
            )));
        }

        if verified.expires.saturating_add(CLOCK_SKEW_SECS) < now {
            return Err(AuthError::invalid_argument(
                self.kind.expired_code(),
                format!("{} has expired at: {}", self.kind, verified.expires),
            ));
        }

        Ok(())
    }

    async fn verify_signature(
        &self,
        cancel: &CancellationToken,
        token: &str,
        kid: Option<&str>,
    ) -> Result<()> {
        let snapshot = self
            .keys
            .keys(cancel)
            .await
            .map_err(|e| e.with_code(ErrorCode::CertificateFetchFailed))?;

        let verified = match kid {
            Some(kid) => snapshot.get(kid).is_some_and(|key| key.verify(token)),
            None => snapshot.keys().any(|key| key.verify(token)),
        };

        if verified {
            Ok(())
        } else {
            Err(self.invalid("failed to verify token signature"))
        }
    }

    fn invalid(&self, message: impl Into<String>) -> AuthError {
        AuthError::invalid_argument(self.kind.invalid_code(), message)
    }
}
