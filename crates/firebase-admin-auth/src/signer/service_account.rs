//! Local RS256 signing with a service account private key

use async_trait::async_trait;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tokio_util::sync::CancellationToken;

use super::Signer;
use crate::config::ServiceAccountCredentials;
use crate::error::{AuthError, ErrorCode, Result};
use crate::jwt::ALGORITHM_RS256;

/// Signs with an RSA key held in memory (SHA-256, PKCS#1 v1.5 padding)
pub struct ServiceAccountSigner {
    email: String,
    key: SigningKey<Sha256>,
}

impl ServiceAccountSigner {
    /// Parse a PEM private key (PKCS#8 `PRIVATE KEY` or PKCS#1 `RSA PRIVATE KEY`)
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidCredential`] if the key is missing or
    /// cannot be parsed.
    pub fn new(email: impl Into<String>, private_key_pem: &SecretString) -> Result<Self> {
        let pem = private_key_pem.expose_secret().trim();
        if pem.is_empty() {
            return Err(credential_error("private key is not available"));
        }

        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| credential_error(format!("failed to parse private key: {e}")))?;

        Ok(Self {
            email: email.into(),
            key: SigningKey::<Sha256>::new(key),
        })
    }

    /// Build from a parsed service account key file
    ///
    /// # Errors
    ///
    /// Same as [`ServiceAccountSigner::new`], and also fails when the file
    /// has no `client_email`.
    pub fn from_credentials(credentials: &ServiceAccountCredentials) -> Result<Self> {
        if credentials.client_email.is_empty() {
            return Err(credential_error("service account email is not available"));
        }
        Self::new(credentials.client_email.clone(), &credentials.private_key)
    }
}

impl std::fmt::Debug for ServiceAccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountSigner")
            .field("email", &self.email)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl Signer for ServiceAccountSigner {
    fn algorithm(&self) -> &str {
        ALGORITHM_RS256
    }

    async fn email(&self, _cancel: &CancellationToken) -> Result<String> {
        Ok(self.email.clone())
    }

    async fn sign(&self, _cancel: &CancellationToken, bytes: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .key
            .try_sign(bytes)
            .map_err(|e| AuthError::unknown(format!("failed to sign bytes: {e}")))?;
        Ok(signature.to_vec())
    }
}

fn credential_error(message: impl Into<String>) -> AuthError {
    AuthError::invalid_argument(ErrorCode::InvalidCredential, message)
}
