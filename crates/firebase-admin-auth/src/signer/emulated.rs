use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Signer;
use crate::error::Result;
use crate::jwt::ALGORITHM_NONE;

/// Placeholder principal used for emulator tokens
pub const EMULATED_SIGNER_EMAIL: &str = "firebase-auth-emulator@example.com";

/// Signer used against the Auth emulator
///
/// Tokens carry `alg: none` and the literal signature `signature`; only a
/// verifier in emulator mode accepts them.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatedSigner;

#[async_trait]
impl Signer for EmulatedSigner {
    fn algorithm(&self) -> &str {
        ALGORITHM_NONE
    }

    async fn email(&self, _cancel: &CancellationToken) -> Result<String> {
        Ok(EMULATED_SIGNER_EMAIL.to_string())
    }

    async fn sign(&self, _cancel: &CancellationToken, _bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(b"signature".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emulated_signer_is_fixed() {
        let cancel = CancellationToken::new();
        assert_eq!(EmulatedSigner.algorithm(), "none");
        assert_eq!(EmulatedSigner.email(&cancel).await.unwrap(), EMULATED_SIGNER_EMAIL);
        assert_eq!(EmulatedSigner.sign(&cancel, b"anything").await.unwrap(), b"signature");
    }
}
