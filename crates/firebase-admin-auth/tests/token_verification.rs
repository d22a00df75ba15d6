//! End-to-end ID token and session cookie verification
//!
//! Tokens are forged with the fixture keys and verified against
//! certificates served by a mock certificate endpoint.

mod common;

use common::{KEY_1, KEY_2, MockFirebase, NOW, forge, id_token, session_cookie};
use firebase_admin_auth::{ErrorCategory, ErrorCode, VerifierKind};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_valid_id_token() {
    // GIVEN: a certificate endpoint serving key1 and key2
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    // WHEN: a token signed with key1 is verified
    let token = client
        .verify_id_token(&CancellationToken::new(), &id_token(|_| {}))
        .await
        .unwrap();

    // THEN: the claims are decoded and uid mirrors sub
    assert_eq!(token.uid, "alice");
    assert_eq!(token.subject, "alice");
    assert_eq!(token.audience, "mock-project-id");
    assert_eq!(token.firebase.sign_in_provider, "password");
    assert_eq!(token.claim("email"), Some(&json!("alice@example.com")));
    assert!(token.claim("sub").is_none());
}

#[tokio::test]
async fn test_bad_audience() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    let token = id_token(|claims| claims["aud"] = json!("bad-audience"));
    let err = client
        .verify_id_token(&CancellationToken::new(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::IdTokenInvalid);
    assert!(err.message().starts_with(
        r#"ID token has invalid 'aud' (audience) claim; expected "mock-project-id" but got "bad-audience""#
    ));
}

#[tokio::test]
async fn test_expired_token() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    let token = id_token(|claims| {
        claims["iat"] = json!(NOW - 1000);
        claims["exp"] = json!(NOW - 301);
    });
    let err = client
        .verify_id_token(&CancellationToken::new(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::IdTokenExpired);
    assert!(err.is_id_token_expired());
    assert!(err.message().starts_with("ID token has expired"));
}

#[tokio::test]
async fn test_future_issued_within_skew() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    let token = id_token(|claims| claims["iat"] = json!(NOW + 299));
    assert!(
        client
            .verify_id_token(&CancellationToken::new(), &token)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_token_expires_as_clock_advances() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(100_000).await;
    let (client, clock) = firebase.client(firebase.config());
    let cancel = CancellationToken::new();
    let token = id_token(|_| {});

    assert!(client.verify_id_token(&cancel, &token).await.is_ok());

    // exp + skew is still acceptable, one second later is not.
    clock.set(NOW + 3600 + 300);
    assert!(client.verify_id_token(&cancel, &token).await.is_ok());
    clock.advance(1);
    let err = client.verify_id_token(&cancel, &token).await.unwrap_err();
    assert!(err.is_id_token_expired());
}

#[tokio::test]
async fn test_session_cookie() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());
    let cancel = CancellationToken::new();

    let cookie = session_cookie(|_| {});
    assert_eq!(
        client.verify_session_cookie(&cancel, &cookie).await.unwrap().uid,
        "alice"
    );

    // Each kind only accepts its own issuer.
    let err = client.verify_id_token(&cancel, &cookie).await.unwrap_err();
    assert!(err.is_id_token_invalid());
    let err = client
        .verify_session_cookie(&cancel, &id_token(|_| {}))
        .await
        .unwrap_err();
    assert!(err.is_session_cookie_invalid());
    assert!(err.message().contains(VerifierKind::SessionCookie.doc_url()));

    let expired = session_cookie(|claims| claims["exp"] = json!(NOW - 301));
    let err = client
        .verify_session_cookie(&cancel, &expired)
        .await
        .unwrap_err();
    assert!(err.is_session_cookie_expired());
}

#[tokio::test]
async fn test_signed_by_untrusted_key() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    // key2's certificate is published, but the token claims key1.
    let claims = common::claims(VerifierKind::IdToken);
    let token = forge(&claims, Some("key1"), KEY_2);
    let err = client
        .verify_id_token(&CancellationToken::new(), &token)
        .await
        .unwrap_err();

    assert!(err.is_id_token_invalid());
    assert_eq!(err.message(), "failed to verify token signature");

    let rotated = forge(&claims, Some("key2"), KEY_2);
    assert!(
        client
            .verify_id_token(&CancellationToken::new(), &rotated)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_tampered_payload() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    let original = id_token(|_| {});
    let forged = id_token(|claims| claims["sub"] = json!("mallory"));
    let mut parts: Vec<&str> = original.split('.').collect();
    let forged_payload = forged.split('.').nth(1).unwrap();
    parts[1] = forged_payload;

    let err = client
        .verify_id_token(&CancellationToken::new(), &parts.join("."))
        .await
        .unwrap_err();
    assert_eq!(err.message(), "failed to verify token signature");
}

#[tokio::test]
async fn test_certificate_endpoint_down() {
    // GIVEN: no certificates mounted, so the endpoint answers 404
    let firebase = MockFirebase::start().await;
    let (client, _clock) = firebase.client(firebase.config());

    let err = client
        .verify_id_token(&CancellationToken::new(), &id_token(|_| {}))
        .await
        .unwrap_err();

    assert!(err.is_certificate_fetch_failed());
    assert!(!err.is_id_token_invalid());
    assert!(err.message().starts_with("invalid response (404)"), "{err}");
}

#[tokio::test]
async fn test_structural_failures_skip_certificate_fetch() {
    // No certificates mounted: any fetch would fail with a different error.
    let firebase = MockFirebase::start().await;
    let (client, _clock) = firebase.client(firebase.config());
    let cancel = CancellationToken::new();

    let no_kid = forge(&common::claims(VerifierKind::IdToken), None, KEY_1);
    let err = client.verify_id_token(&cancel, &no_kid).await.unwrap_err();
    assert_eq!(err.message(), "ID token has no 'kid' header");

    let err = client.verify_id_token(&cancel, "a.b").await.unwrap_err();
    assert_eq!(err.message(), "incorrect number of segments");
    assert_eq!(err.category(), ErrorCategory::InvalidArgument);

    let err = client.verify_id_token(&cancel, "").await.unwrap_err();
    assert_eq!(err.message(), "ID token must be a non-empty string");
}

#[tokio::test]
async fn test_cancelled_verification() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    let (client, _clock) = firebase.client(firebase.config());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .verify_id_token(&cancel, &id_token(|_| {}))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Cancelled);
}
