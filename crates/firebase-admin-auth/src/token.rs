//! Verified token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Firebase-specific claims nested under `firebase`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirebaseInfo {
    /// Provider used to sign in, e.g. `password` or `google.com`
    #[serde(default)]
    pub sign_in_provider: String,

    /// Tenant the user belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Identifiers linked to the user, keyed by provider
    #[serde(default)]
    pub identities: Map<String, Value>,

    /// Second factor used to sign in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_second_factor: Option<String>,

    /// Identifier of the second factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_factor_identifier: Option<String>,
}

/// A decoded Firebase ID token or session cookie
///
/// Returned by the verifier only after every structural, temporal and
/// signature check passed. `uid` always equals `sub`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdToken {
    /// Time the user authenticated (Unix seconds)
    #[serde(default)]
    pub auth_time: i64,

    /// Issuer
    #[serde(rename = "iss", default)]
    pub issuer: String,

    /// Audience, the project id
    #[serde(rename = "aud", default)]
    pub audience: String,

    /// Expiry (Unix seconds)
    #[serde(rename = "exp", default)]
    pub expires: i64,

    /// Issued at (Unix seconds)
    #[serde(rename = "iat", default)]
    pub issued_at: i64,

    /// Subject, the user's UID
    #[serde(rename = "sub", default)]
    pub subject: String,

    /// Copy of `sub`
    #[serde(default)]
    pub uid: String,

    /// Firebase claims
    #[serde(default)]
    pub firebase: FirebaseInfo,

    /// Every other claim in the payload
    #[serde(skip)]
    pub claims: Map<String, Value>,
}

impl IdToken {
    /// Claims lifted into typed fields and excluded from [`IdToken::claims`]
    pub const STANDARD_CLAIMS: [&'static str; 6] = ["iss", "aud", "exp", "iat", "sub", "uid"];

    /// Tenant of the signed-in user, if any
    pub fn tenant_id(&self) -> Option<&str> {
        self.firebase.tenant.as_deref()
    }

    /// `iat` as a timestamp
    pub fn issued_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }

    /// `exp` as a timestamp
    pub fn expires_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires, 0)
    }

    /// `auth_time` as a timestamp
    pub fn auth_time_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.auth_time, 0)
    }

    /// Look up a custom claim
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_firebase_claims() {
        let token: IdToken = serde_json::from_value(json!({
            "iss": "https://securetoken.google.com/p",
            "aud": "p",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "auth_time": 1_699_999_000,
            "sub": "alice",
            "firebase": {
                "sign_in_provider": "password",
                "tenant": "t1",
                "identities": {"email": ["alice@example.com"]},
                "sign_in_second_factor": "phone",
                "second_factor_identifier": "f1"
            }
        }))
        .unwrap();

        assert_eq!(token.tenant_id(), Some("t1"));
        assert_eq!(token.firebase.sign_in_provider, "password");
        assert_eq!(token.firebase.sign_in_second_factor.as_deref(), Some("phone"));
        assert_eq!(
            token.issued_at_time().unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
        assert!(token.uid.is_empty());
    }
}
