//! # Firebase Admin Auth - Token Minting and Verification Core
//!
//! The server-side half of Firebase Authentication: mint custom tokens that
//! client SDKs exchange for ID tokens, and verify the ID tokens and session
//! cookies those clients send back.
//!
//! ## Design Principles
//!
//! - **Async First**: every operation that may touch the network is `async`
//!   and takes a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Stable Errors**: every [`AuthError`] carries a platform category and an
//!   SDK code, and its message is part of the API
//! - **Pluggable Seams**: key sources, signers, user lookups and the clock are
//!   traits, so tests and hosts can substitute their own
//!
//! ## Architecture
//!
//! - [`client`] - [`AuthClient`] and [`TenantClient`], the entry points
//! - [`config`] - [`AuthConfig`] and service account credentials
//! - [`keys`] - public certificate sources (HTTP, file, in-memory)
//! - [`signer`] - custom token signers (service account, IAM, emulator)
//! - [`minter`] - custom token minting
//! - [`verifier`] - ID token and session cookie verification
//! - [`revocation`] - disabled-user and revoked-token checks
//! - [`jwt`] - compact JWT segments
//! - [`token`] - the verified token model
//! - [`error`] - error categories, codes and predicates
//! - [`clock`] - injectable wall clock
//! - [`http`] - shared HTTP plumbing and access token providers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use firebase_admin_auth::{AuthClient, AuthConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let client = AuthClient::new(AuthConfig::from_env()?)?;
//! let cancel = CancellationToken::new();
//!
//! // Hand a custom token to a client SDK ...
//! let custom_token = client.custom_token(&cancel, "alice").await?;
//!
//! // ... and verify the ID token it sends back.
//! match client.verify_id_token_and_check_revoked(&cancel, "eyJ...").await {
//!     Ok(token) => println!("signed in as {}", token.uid),
//!     Err(err) if err.is_id_token_revoked() => println!("session revoked"),
//!     Err(err) => println!("rejected: {err}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Emulator
//!
//! When `FIREBASE_AUTH_EMULATOR_HOST` is set, [`AuthConfig::from_env`] enables
//! emulator mode: custom tokens are unsigned and signature checks are skipped.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod jwt;
pub mod keys;
pub mod minter;
pub mod revocation;
pub mod signer;
pub mod token;
pub mod verifier;

#[doc(inline)]
pub use client::{AuthClient, AuthClientBuilder, TenantClient};

#[doc(inline)]
pub use config::{AuthConfig, ServiceAccountCredentials};

#[doc(inline)]
pub use error::{AuthError, ErrorCategory, ErrorCode, Result};

#[doc(inline)]
pub use token::{FirebaseInfo, IdToken};

#[doc(inline)]
pub use verifier::{TokenVerifier, VerifierKind};
