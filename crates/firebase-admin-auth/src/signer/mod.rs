//! Signers for custom tokens
//!
//! A [`Signer`] signs arbitrary bytes and reports the principal email that
//! ends up in the `iss` and `sub` claims of every minted token.
//!
//! - [`ServiceAccountSigner`] signs locally with a service account's RSA key
//! - [`IamSigner`] delegates to the IAM `signBlob` API, discovering its
//!   service account from the metadata server when none is configured
//! - [`EmulatedSigner`] produces unsigned tokens for the Auth emulator

mod emulated;
mod iam;
mod service_account;

pub use emulated::{EMULATED_SIGNER_EMAIL, EmulatedSigner};
pub use iam::{DEFAULT_IAM_HOST, DEFAULT_METADATA_HOST, IamSigner};
pub use service_account::ServiceAccountSigner;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Signs custom token payloads
#[async_trait]
pub trait Signer: Send + Sync + std::fmt::Debug {
    /// JWT `alg` header value for signatures produced by this signer
    fn algorithm(&self) -> &str;

    /// Principal email of the signing identity
    ///
    /// # Errors
    ///
    /// Fails if the identity cannot be determined.
    async fn email(&self, cancel: &CancellationToken) -> Result<String>;

    /// Sign `bytes`, returning the raw signature
    ///
    /// # Errors
    ///
    /// Fails if the key is unusable or the remote signer rejects the request.
    async fn sign(&self, cancel: &CancellationToken, bytes: &[u8]) -> Result<Vec<u8>>;
}
