//! Common test utilities for integration tests
//!
//! Provides the RSA fixtures, a token forger standing in for the Firebase
//! token service, and a mock server for every Google endpoint the client
//! talks to.

#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use firebase_admin_auth::clock::MockClock;
use firebase_admin_auth::{AuthClient, AuthConfig, VerifierKind};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_ID: &str = "mock-project-id";
pub const NOW: i64 = 1_700_000_000;

pub const KEY_1: &str = include_str!("../data/key1.pem");
pub const KEY_2: &str = include_str!("../data/key2.pem");
pub const PUBLIC_CERTS: &str = include_str!("../data/public_certs.json");
pub const SERVICE_ACCOUNT: &str = include_str!("../data/service_account.json");

pub const CERTS_PATH: &str = "/certs";
pub const SESSION_CERTS_PATH: &str = "/session-certs";
pub const LOOKUP_PATH: &str = "/v1/projects/mock-project-id/accounts:lookup";

/// Claims of a valid token of `kind` issued at [`NOW`]
pub fn claims(kind: VerifierKind) -> Value {
    json!({
        "iss": format!("{}{PROJECT_ID}", kind.issuer_prefix()),
        "aud": PROJECT_ID,
        "iat": NOW,
        "exp": NOW + 3600,
        "auth_time": NOW,
        "sub": "alice",
        "email": "alice@example.com",
        "firebase": {
            "sign_in_provider": "password",
            "identities": {"email": ["alice@example.com"]}
        }
    })
}

/// Sign `claims` with `pem` under key ID `kid`, the way Firebase issues tokens
pub fn forge(claims: &Value, kid: Option<&str>, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key");
    jsonwebtoken::encode(&header, claims, &key).expect("encode token")
}

/// Valid ID token, with `edit` applied to the claims first
pub fn id_token(edit: impl FnOnce(&mut Value)) -> String {
    let mut claims = claims(VerifierKind::IdToken);
    edit(&mut claims);
    forge(&claims, Some("key1"), KEY_1)
}

/// Valid session cookie, with `edit` applied to the claims first
pub fn session_cookie(edit: impl FnOnce(&mut Value)) -> String {
    let mut claims = claims(VerifierKind::SessionCookie);
    edit(&mut claims);
    forge(&claims, Some("key1"), KEY_1)
}

/// Mock of the certificate, IAM, metadata and Identity Toolkit endpoints
pub struct MockFirebase {
    pub server: MockServer,
}

impl MockFirebase {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Configuration pointing every endpoint at this server
    pub fn config(&self) -> AuthConfig {
        AuthConfig {
            id_token_cert_url: format!("{}{CERTS_PATH}", self.uri()),
            session_cookie_cert_url: format!("{}{SESSION_CERTS_PATH}", self.uri()),
            iam_host: self.uri(),
            metadata_host: self.uri(),
            identity_toolkit_host: self.uri(),
            ..AuthConfig::default()
        }
        .with_project_id(PROJECT_ID)
    }

    /// Client using this server and a clock frozen at [`NOW`]
    pub fn client(&self, config: AuthConfig) -> (AuthClient, MockClock) {
        let clock = MockClock::new(NOW);
        let client = AuthClient::builder(config)
            .clock(Arc::new(clock.clone()))
            .token_provider(Arc::new(
                firebase_admin_auth::http::StaticAccessToken::new("test-token"),
            ))
            .build()
            .expect("build client");
        (client, clock)
    }

    /// Serve the fixture certificates on both certificate endpoints
    pub async fn mock_certs(&self, max_age: u64) {
        for cert_path in [CERTS_PATH, SESSION_CERTS_PATH] {
            Mock::given(method("GET"))
                .and(path(cert_path))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("Cache-Control", format!("public, max-age={max_age}"))
                        .set_body_raw(PUBLIC_CERTS, "application/json"),
                )
                .mount(&self.server)
                .await;
        }
    }

    /// Answer user lookups with a single user record
    pub async fn mock_user(&self, disabled: bool, valid_since_secs: i64) {
        Mock::given(method("POST"))
            .and(path(LOOKUP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "identitytoolkit#GetAccountInfoResponse",
                "users": [{
                    "localId": "alice",
                    "email": "alice@example.com",
                    "disabled": disabled,
                    "validSince": valid_since_secs.to_string()
                }]
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer signBlob for `email` with a fixed signature
    pub async fn mock_sign_blob(&self, email: &str, signature: &[u8]) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1/projects/-/serviceAccounts/{email}:signBlob"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keyId": "key1",
                "signature": STANDARD.encode(signature),
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer metadata service account discovery with `email`
    pub async fn mock_metadata_email(&self, email: &str) {
        Mock::given(method("GET"))
            .and(path(
                "/computeMetadata/v1/instance/service-accounts/default/email",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(email))
            .mount(&self.server)
            .await;
    }
}
