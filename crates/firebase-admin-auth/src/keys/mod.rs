//! Public key sources for token verification
//!
//! A [`KeySource`] hands out an immutable [`KeySnapshot`]: the set of
//! certificates currently trusted to sign tokens, keyed by key ID, together
//! with the time at which the snapshot should be refreshed.
//!
//! Three sources are provided:
//!
//! - [`HttpKeySource`] - fetches `{kid: "<PEM certificate>"}` documents and
//!   honours the `Cache-Control: max-age` of the response
//! - [`FileKeySource`] - reads the same document from disk once
//! - [`StaticKeySource`] - a fixed snapshot, for tests and host-managed keys

mod file;
mod http;
mod memory;

pub use file::FileKeySource;
pub use http::{HttpKeySource, ID_TOKEN_CERT_URL, SESSION_COOKIE_CERT_URL};
pub use memory::StaticKeySource;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, ErrorCode, Result};

/// Provides the currently trusted verification keys
#[async_trait]
pub trait KeySource: Send + Sync + std::fmt::Debug {
    /// Return the current snapshot, refreshing it first if it has expired
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorCode::CertificateFetchFailed`] error when no usable
    /// snapshot can be produced.
    async fn keys(&self, cancel: &CancellationToken) -> Result<Arc<KeySnapshot>>;
}

/// RS256 signature check only; claim checks happen in the verifier.
static SIGNATURE_ONLY: LazyLock<Validation> = LazyLock::new(|| {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
});

/// A key ID and the RSA public key of its certificate
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    key: Arc<DecodingKey>,
}

impl PublicKey {
    /// Parse a PEM-encoded X.509 certificate (or SPKI public key) holding an RSA key
    ///
    /// # Errors
    ///
    /// Fails if `kid` is empty, the PEM cannot be parsed, or the key is not RSA.
    pub fn from_pem(kid: impl Into<String>, pem: &[u8]) -> Result<Self> {
        let kid = kid.into();
        if kid.is_empty() {
            return Err(certificate_error("public key has an empty key ID"));
        }

        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| {
            if DecodingKey::from_ec_pem(pem).is_ok() || DecodingKey::from_ed_pem(pem).is_ok() {
                certificate_error("certificate is not a RSA key")
            } else {
                certificate_error(format!("failed to parse certificate {kid:?}: {e}"))
            }
        })?;

        Ok(Self {
            kid,
            key: Arc::new(key),
        })
    }

    /// Key ID
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Check the RS256 signature of a compact token against this key
    pub fn verify(&self, token: &str) -> bool {
        jsonwebtoken::decode::<serde_json::Value>(token, &self.key, &SIGNATURE_ONLY).is_ok()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("key", &"<RSA public key>")
            .finish()
    }
}

/// Immutable set of trusted keys with an absolute expiry
#[derive(Debug, Clone)]
pub struct KeySnapshot {
    keys: HashMap<String, PublicKey>,
    expires_at: i64,
}

impl KeySnapshot {
    /// Build a snapshot that expires at `expires_at` (Unix seconds)
    pub fn new(keys: impl IntoIterator<Item = PublicKey>, expires_at: i64) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|key| (key.kid.clone(), key))
                .collect(),
            expires_at,
        }
    }

    /// Build a snapshot that never expires
    pub fn permanent(keys: impl IntoIterator<Item = PublicKey>) -> Self {
        Self::new(keys, i64::MAX)
    }

    /// Look up a key by ID
    pub fn get(&self, kid: &str) -> Option<&PublicKey> {
        self.keys.get(kid)
    }

    /// All keys, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.values()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the snapshot holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Expiry as Unix seconds
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the snapshot is due for refresh at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Parse a `{kid: "<PEM certificate>"}` JSON document
///
/// # Errors
///
/// Fails on malformed JSON or if any certificate is unusable.
pub fn parse_public_keys(body: &[u8]) -> Result<Vec<PublicKey>> {
    let certificates: HashMap<String, String> = serde_json::from_slice(body)
        .map_err(|e| certificate_error(format!("failed to parse public keys: {e}")))?;

    certificates
        .iter()
        .map(|(kid, pem)| PublicKey::from_pem(kid.clone(), pem.as_bytes()))
        .collect()
}

/// Extract the `max-age` directive from a `Cache-Control` header value
///
/// Directives are comma separated; whitespace around commas and around `=`
/// is ignored, as are other directives such as `public` or `must-revalidate`.
///
/// # Errors
///
/// Fails if the header is absent, has no `max-age`, or its value is not a
/// non-negative integer.
pub fn parse_max_age(cache_control: Option<&str>) -> Result<Duration> {
    let header = cache_control.unwrap_or_default();

    for directive in header.split(',') {
        let Some((name, value)) = directive.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("max-age") {
            continue;
        }
        let seconds = value.trim().parse::<u64>().map_err(|e| {
            certificate_error(format!("invalid max-age value {:?}: {e}", value.trim()))
        })?;
        return Ok(Duration::from_secs(seconds));
    }

    Err(certificate_error(
        "could not find expiry time from HTTP headers",
    ))
}

fn certificate_error(message: impl Into<String>) -> AuthError {
    AuthError::unknown(message).with_code(ErrorCode::CertificateFetchFailed)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_parse_max_age_variants() {
        let cases = [
            ("max-age=100", 100),
            ("public, max-age=100", 100),
            ("public,max-age=100", 100),
            ("private, max-age=2000, must-revalidate, no-transform", 2000),
            ("  max-age = 7 ", 7),
            ("MAX-AGE=5", 5),
        ];

        for (header, expected) in cases {
            assert_eq!(
                parse_max_age(Some(header)).unwrap(),
                Duration::from_secs(expected),
                "{header}"
            );
        }
    }

    #[test]
    fn test_parse_max_age_missing() {
        for header in [None, Some(""), Some("public, no-cache"), Some("s-maxage=10")] {
            let err = parse_max_age(header).unwrap_err();
            assert!(err.is_certificate_fetch_failed());
            assert_eq!(err.message(), "could not find expiry time from HTTP headers");
        }
    }

    #[test]
    fn test_parse_max_age_not_a_number() {
        let err = parse_max_age(Some("max-age=soon")).unwrap_err();
        assert!(err.is_certificate_fetch_failed());
    }

    #[test]
    fn test_parse_public_keys() {
        let keys = parse_public_keys(PUBLIC_CERTS.as_bytes()).unwrap();
        let mut kids: Vec<_> = keys.iter().map(PublicKey::kid).collect();
        kids.sort_unstable();
        assert_eq!(kids, vec!["key1", "key2"]);
    }

    #[test]
    fn test_non_rsa_certificate_rejected() {
        let err = PublicKey::from_pem("ec", EC_CERT.as_bytes()).unwrap_err();
        assert!(err.is_certificate_fetch_failed());
        assert_eq!(err.message(), "certificate is not a RSA key");
    }

    #[test]
    fn test_garbage_certificate_rejected() {
        let pem = b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let err = PublicKey::from_pem("bad", pem).unwrap_err();
        assert!(err.is_certificate_fetch_failed());
    }

    #[test]
    fn test_empty_kid_rejected() {
        assert!(PublicKey::from_pem("", CERT_1.as_bytes()).is_err());
    }

    #[test]
    fn test_snapshot_lookup_and_expiry() {
        let snapshot = KeySnapshot::new(
            [
                PublicKey::from_pem("key1", CERT_1.as_bytes()).unwrap(),
                PublicKey::from_pem("key2", CERT_2.as_bytes()).unwrap(),
            ],
            1000,
        );

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("key2").is_some());
        assert!(snapshot.get("key3").is_none());
        assert!(!snapshot.is_expired(999));
        assert!(snapshot.is_expired(1000));
        assert!(!KeySnapshot::permanent([]).is_expired(i64::MAX - 1));
    }
}
