//! Error types for the authentication core.
//!
//! Every error carries two classifications:
//!
//! - an [`ErrorCategory`], the coarse platform-wide category (mirrors the
//!   canonical status codes returned by Google APIs), and
//! - an [`ErrorCode`], the fine-grained code specific to this SDK.
//!
//! Some errors are also reported under a wrapping code. A revoked ID token,
//! for example, has code [`ErrorCode::IdTokenRevoked`] and wrapping code
//! [`ErrorCode::IdTokenInvalid`], so both [`AuthError::is_id_token_revoked`]
//! and [`AuthError::is_id_token_invalid`] return `true`.
//!
//! Messages are part of the public contract and are reproduced verbatim by
//! `Display`. Predicates never look at the message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Coarse platform error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Client specified an invalid argument
    InvalidArgument,
    /// System is not in a state required for the operation
    FailedPrecondition,
    /// Request lacks valid authentication credentials
    Unauthenticated,
    /// Caller lacks permission for the operation
    PermissionDenied,
    /// Requested entity was not found
    NotFound,
    /// Concurrency conflict
    Conflict,
    /// Quota or rate limit exhausted
    ResourceExhausted,
    /// Operation was cancelled by the caller
    Cancelled,
    /// Unrecoverable data loss or corruption
    DataLoss,
    /// Unknown error
    Unknown,
    /// Internal server error
    Internal,
    /// Service unavailable
    Unavailable,
    /// Deadline expired before the operation completed
    DeadlineExceeded,
}

impl ErrorCategory {
    /// Map an HTTP status code to a category.
    ///
    /// Statuses without an explicit mapping fall back to [`ErrorCategory::Unknown`].
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::ResourceExhausted,
            500 => Self::Internal,
            503 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    /// Map a platform `error.status` string (e.g. `PERMISSION_DENIED`) to a category
    pub fn from_platform_status(status: &str) -> Option<Self> {
        let category = match status {
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "FAILED_PRECONDITION" => Self::FailedPrecondition,
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "NOT_FOUND" => Self::NotFound,
            "CONFLICT" | "ALREADY_EXISTS" | "ABORTED" => Self::Conflict,
            "RESOURCE_EXHAUSTED" => Self::ResourceExhausted,
            "CANCELLED" => Self::Cancelled,
            "DATA_LOSS" => Self::DataLoss,
            "UNKNOWN" => Self::Unknown,
            "INTERNAL" => Self::Internal,
            "UNAVAILABLE" => Self::Unavailable,
            "DEADLINE_EXCEEDED" => Self::DeadlineExceeded,
            _ => return None,
        };
        Some(category)
    }

    /// Canonical string form
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
            Self::DataLoss => "DATA_LOSS",
            Self::Unknown => "UNKNOWN",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SDK-specific error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// ID token failed structural, claim or signature validation
    IdTokenInvalid,
    /// ID token is past its expiry
    IdTokenExpired,
    /// ID token was issued before the user's tokens-valid-after time
    IdTokenRevoked,
    /// Session cookie failed structural, claim or signature validation
    SessionCookieInvalid,
    /// Session cookie is past its expiry
    SessionCookieExpired,
    /// Session cookie was issued before the user's tokens-valid-after time
    SessionCookieRevoked,
    /// User account is disabled
    UserDisabled,
    /// No user record exists for the given UID
    UserNotFound,
    /// Public certificates could not be fetched or parsed
    CertificateFetchFailed,
    /// Credential is missing or unusable for the requested operation
    InvalidCredential,
    /// Credential lacks the permission required by a remote call
    InsufficientPermission,
    /// Verified token belongs to a different tenant
    TenantIdMismatch,
    /// UID is empty or longer than 128 characters
    InvalidUid,
    /// Developer claims contain reserved claim names
    ReservedClaims,
    /// No specific code applies
    Unknown,
}

impl ErrorCode {
    /// Canonical string form
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdTokenInvalid => "ID_TOKEN_INVALID",
            Self::IdTokenExpired => "ID_TOKEN_EXPIRED",
            Self::IdTokenRevoked => "ID_TOKEN_REVOKED",
            Self::SessionCookieInvalid => "SESSION_COOKIE_INVALID",
            Self::SessionCookieExpired => "SESSION_COOKIE_EXPIRED",
            Self::SessionCookieRevoked => "SESSION_COOKIE_REVOKED",
            Self::UserDisabled => "USER_DISABLED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::CertificateFetchFailed => "CERTIFICATE_FETCH_FAILED",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::InsufficientPermission => "INSUFFICIENT_PERMISSION",
            Self::TenantIdMismatch => "TENANT_ID_MISMATCH",
            Self::InvalidUid => "INVALID_UID",
            Self::ReservedClaims => "RESERVED_CLAIMS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication error
///
/// # Example
///
/// ```rust
/// use firebase_admin_auth::{AuthError, ErrorCategory, ErrorCode};
///
/// let err = AuthError::new(
///     ErrorCategory::InvalidArgument,
///     ErrorCode::IdTokenRevoked,
///     "ID token has been revoked",
/// )
/// .with_parent(ErrorCode::IdTokenInvalid);
///
/// assert!(err.is_id_token_revoked());
/// assert!(err.is_id_token_invalid());
/// assert_eq!(err.to_string(), "ID token has been revoked");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    category: ErrorCategory,
    code: ErrorCode,
    parent: Option<ErrorCode>,
    message: String,
}

impl AuthError {
    /// Create a new error
    pub fn new(category: ErrorCategory, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            parent: None,
            message: message.into(),
        }
    }

    /// Create an `InvalidArgument` error with the given code
    pub fn invalid_argument(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidArgument, code, message)
    }

    /// Create an error with no specific category or code
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, ErrorCode::Unknown, message)
    }

    /// Create the error returned when a caller cancels an operation
    pub fn cancelled() -> Self {
        Self::new(
            ErrorCategory::Cancelled,
            ErrorCode::Unknown,
            "operation cancelled",
        )
    }

    /// Map a transport-level HTTP failure.
    ///
    /// Connection failures become `Unavailable`, timeouts become
    /// `DeadlineExceeded`, everything else is `Unknown`.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            Self::new(
                ErrorCategory::Unavailable,
                ErrorCode::Unknown,
                format!("failed to establish a connection: {err}"),
            )
        } else if err.is_timeout() {
            Self::new(
                ErrorCategory::DeadlineExceeded,
                ErrorCode::Unknown,
                format!("timed out while making an http call: {err}"),
            )
        } else {
            Self::unknown(format!("error while making http call: {err}"))
        }
    }

    /// Build an error from a non-success platform API response.
    ///
    /// The body is expected to look like
    /// `{"error": {"status": "PERMISSION_DENIED", "message": "..."}}`. The
    /// category comes from `error.status` when recognised and from the HTTP
    /// status otherwise; `error.message` becomes the error text, falling back
    /// to a generic message that includes the raw body.
    pub fn from_platform_response(status: u16, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: Option<Detail>,
        }

        #[derive(Deserialize)]
        struct Detail {
            status: Option<String>,
            message: Option<String>,
        }

        let detail = serde_json::from_slice::<Envelope>(body)
            .ok()
            .and_then(|envelope| envelope.error);

        let category = detail
            .as_ref()
            .and_then(|d| d.status.as_deref())
            .and_then(ErrorCategory::from_platform_status)
            .unwrap_or_else(|| ErrorCategory::from_http_status(status));

        let message = match detail.and_then(|d| d.message) {
            Some(message) if !message.is_empty() => message,
            _ => format!(
                "unexpected http response with status: {status}\n{}",
                String::from_utf8_lossy(body)
            ),
        };

        Self::new(category, ErrorCode::Unknown, message)
    }

    /// Replace the SDK code, keeping category and message
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// Report this error under an additional wrapping code
    pub fn with_parent(mut self, parent: ErrorCode) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Platform category
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// SDK-specific code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Wrapping code, if any
    pub fn parent(&self) -> Option<ErrorCode> {
        self.parent
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error carries `code`, either directly or as its wrapping code
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code == code || self.parent == Some(code)
    }

    /// Whether the ID token was rejected as invalid (including revoked and disabled-user cases)
    pub fn is_id_token_invalid(&self) -> bool {
        self.has_code(ErrorCode::IdTokenInvalid)
    }

    /// Whether the ID token has expired
    pub fn is_id_token_expired(&self) -> bool {
        self.has_code(ErrorCode::IdTokenExpired)
    }

    /// Whether the ID token has been revoked
    pub fn is_id_token_revoked(&self) -> bool {
        self.has_code(ErrorCode::IdTokenRevoked)
    }

    /// Whether the session cookie was rejected as invalid
    pub fn is_session_cookie_invalid(&self) -> bool {
        self.has_code(ErrorCode::SessionCookieInvalid)
    }

    /// Whether the session cookie has expired
    pub fn is_session_cookie_expired(&self) -> bool {
        self.has_code(ErrorCode::SessionCookieExpired)
    }

    /// Whether the session cookie has been revoked
    pub fn is_session_cookie_revoked(&self) -> bool {
        self.has_code(ErrorCode::SessionCookieRevoked)
    }

    /// Whether the user account is disabled
    pub fn is_user_disabled(&self) -> bool {
        self.has_code(ErrorCode::UserDisabled)
    }

    /// Whether the user record does not exist
    pub fn is_user_not_found(&self) -> bool {
        self.has_code(ErrorCode::UserNotFound)
    }

    /// Whether public certificates could not be fetched
    pub fn is_certificate_fetch_failed(&self) -> bool {
        self.has_code(ErrorCode::CertificateFetchFailed)
    }

    /// Whether the configured credential is unusable
    pub fn is_invalid_credential(&self) -> bool {
        self.has_code(ErrorCode::InvalidCredential)
    }

    /// Whether a remote call was denied for lack of permission
    pub fn is_insufficient_permission(&self) -> bool {
        self.has_code(ErrorCode::InsufficientPermission)
    }

    /// Whether the token belongs to a different tenant
    pub fn is_tenant_id_mismatch(&self) -> bool {
        self.has_code(ErrorCode::TenantIdMismatch)
    }
}
