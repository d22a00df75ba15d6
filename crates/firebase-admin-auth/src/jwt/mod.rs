//! Compact JWT serialization
//!
//! A compact token is `base64url(header) "." base64url(payload) "." base64url(signature)`,
//! using the URL-safe alphabet without padding for every segment.
//!
//! Not a general JWT library: it only knows how to split,
//! encode and decode the three segments. Claim validation lives in
//! [`crate::verifier`] and signature checks in [`crate::keys`].

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RSA with SHA-256, PKCS#1 v1.5 padding
pub const ALGORITHM_RS256: &str = "RS256";

/// Unsigned tokens produced by the emulated signer
pub const ALGORITHM_NONE: &str = "none";

/// Value of the `typ` header for every token this crate produces
pub const TOKEN_TYPE_JWT: &str = "JWT";

/// Errors produced while encoding or decoding compact tokens
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input did not split into exactly three segments
    #[error("incorrect number of segments")]
    Segments,

    /// A segment was not valid unpadded base64url
    #[error("{0}")]
    Base64(#[from] base64::DecodeError),

    /// A segment did not hold the expected JSON document
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// JWT header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// Signing algorithm (`alg`)
    #[serde(rename = "alg", default)]
    pub algorithm: String,

    /// Token type (`typ`)
    #[serde(rename = "typ", default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,

    /// Key ID (`kid`)
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl JwtHeader {
    /// Header for a token signed with `algorithm`, typed as `JWT`, without a key ID
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            token_type: TOKEN_TYPE_JWT.to_string(),
            key_id: None,
        }
    }

    /// Key ID, treating an empty string as absent
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref().filter(|kid| !kid.is_empty())
    }
}

/// The three raw segments of a compact token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments<'a> {
    /// Encoded header
    pub header: &'a str,
    /// Encoded payload
    pub payload: &'a str,
    /// Encoded signature
    pub signature: &'a str,
}

impl<'a> Segments<'a> {
    /// Split a compact token, rejecting anything that is not exactly three segments
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Segments`] when the input has fewer or more than
    /// two `.` separators.
    pub fn split(token: &'a str) -> Result<Self, CodecError> {
        let mut parts = token.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => Ok(Self {
                header,
                payload,
                signature,
            }),
            _ => Err(CodecError::Segments),
        }
    }

    /// Decode the header segment
    ///
    /// # Errors
    ///
    /// Returns the base64 or JSON decoding error verbatim.
    pub fn header(&self) -> Result<JwtHeader, CodecError> {
        decode_segment(self.header)
    }

    /// Decode the payload segment into `T`
    ///
    /// # Errors
    ///
    /// Returns the base64 or JSON decoding error verbatim.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        decode_segment(self.payload)
    }

    /// Decode the raw signature bytes
    ///
    /// # Errors
    ///
    /// Returns the base64 decoding error.
    pub fn signature(&self) -> Result<Vec<u8>, CodecError> {
        Ok(URL_SAFE_NO_PAD.decode(self.signature)?)
    }

    /// The `header.payload` string the signature is computed over
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

/// Serialize `value` as JSON and encode it as one token segment
///
/// # Errors
///
/// Returns [`CodecError::Json`] if `value` cannot be serialized.
pub fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode one token segment and parse it as JSON
///
/// # Errors
///
/// Returns the base64 or JSON decoding error verbatim.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, CodecError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Build the `base64url(header).base64url(payload)` signing input
///
/// # Errors
///
/// Returns [`CodecError::Json`] if either part cannot be serialized.
pub fn signing_input<P: Serialize + ?Sized>(
    header: &JwtHeader,
    payload: &P,
) -> Result<String, CodecError> {
    Ok(format!(
        "{}.{}",
        encode_segment(header)?,
        encode_segment(payload)?
    ))
}

/// Append an encoded signature to a signing input
pub fn assemble(signing_input: &str, signature: &[u8]) -> String {
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}
