//! Custom token minting

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, ErrorCode, Result};
use crate::jwt::{self, JwtHeader};
use crate::signer::Signer;

/// Audience of every custom token
pub const FIREBASE_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Lifetime of a minted custom token in seconds
pub const CUSTOM_TOKEN_TTL_SECS: i64 = 3600;

/// Maximum length of a UID
pub const MAX_UID_LEN: usize = 128;

/// Claim names developers may not set
pub const RESERVED_CLAIMS: [&str; 16] = [
    "acr",
    "amr",
    "at_hash",
    "aud",
    "auth_time",
    "azp",
    "cnf",
    "c_hash",
    "exp",
    "firebase",
    "iat",
    "iss",
    "jti",
    "nbf",
    "nonce",
    "sub",
];

/// Payload of a custom token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTokenPayload {
    /// Issuer, the signer's email
    pub iss: String,
    /// Subject, the signer's email
    pub sub: String,
    /// Always [`FIREBASE_AUDIENCE`]
    pub aud: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
    /// User the token signs in
    pub uid: String,
    /// Developer claims, omitted when empty
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub claims: Map<String, Value>,
    /// Tenant the token is scoped to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Mints custom tokens that client SDKs exchange for ID tokens
#[derive(Debug, Clone)]
pub struct TokenMinter {
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    tenant_id: Option<String>,
}

impl TokenMinter {
    /// Create a minter signing with `signer`
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            clock: Arc::new(SystemClock),
            tenant_id: None,
        }
    }

    /// Replace the clock used for `iat`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Scope every minted token to `tenant_id`
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error if `tenant_id` is empty.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Result<Self> {
        let tenant_id = tenant_id.into();
        if tenant_id.is_empty() {
            return Err(AuthError::invalid_argument(
                ErrorCode::Unknown,
                "tenantID must be a non-empty string",
            ));
        }
        self.tenant_id = Some(tenant_id);
        Ok(self)
    }

    /// Tenant this minter is scoped to
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// The signer in use
    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Mint a custom token for `uid` with optional developer claims
    ///
    /// # Errors
    ///
    /// - whatever the signer returns when its email cannot be determined
    /// - [`ErrorCode::InvalidUid`] if `uid` is empty or longer than 128 characters
    /// - [`ErrorCode::ReservedClaims`] if any developer claim is reserved
    /// - signing failures
    pub async fn mint(
        &self,
        cancel: &CancellationToken,
        uid: &str,
        claims: Option<&Map<String, Value>>,
    ) -> Result<String> {
        let email = self.signer.email(cancel).await?;

        if uid.is_empty() || uid.chars().count() > MAX_UID_LEN {
            return Err(AuthError::invalid_argument(
                ErrorCode::InvalidUid,
                "uid must be non-empty, and not longer than 128 characters",
            ));
        }

        let claims = claims.cloned().unwrap_or_default();
        check_reserved(&claims)?;

        let iat = self.clock.now();
        let payload = CustomTokenPayload {
            iss: email.clone(),
            sub: email,
            aud: FIREBASE_AUDIENCE.to_string(),
            iat,
            exp: iat + CUSTOM_TOKEN_TTL_SECS,
            uid: uid.to_string(),
            claims,
            tenant_id: self.tenant_id.clone(),
        };

        let header = JwtHeader::new(self.signer.algorithm());
        let input = jwt::signing_input(&header, &payload)
            .map_err(|e| AuthError::unknown(format!("failed to encode custom token: {e}")))?;
        let signature = self.signer.sign(cancel, input.as_bytes()).await?;

        debug!(uid, tenant_id = ?self.tenant_id, "Minted custom token");
        Ok(jwt::assemble(&input, &signature))
    }
}

fn check_reserved(claims: &Map<String, Value>) -> Result<()> {
    let disallowed: Vec<&str> = RESERVED_CLAIMS
        .iter()
        .copied()
        .filter(|name| claims.contains_key(*name))
        .collect();

    let message = match disallowed.as_slice() {
        [] => return Ok(()),
        [name] => format!("developer claim {name:?} is reserved and cannot be specified"),
        names => format!(
            "developer claims {:?} are reserved and cannot be specified",
            names.join(", ")
        ),
    };
    Err(AuthError::invalid_argument(ErrorCode::ReservedClaims, message))
}
