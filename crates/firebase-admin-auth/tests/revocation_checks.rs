//! Revocation and disabled-user checks against a mock accounts:lookup endpoint

mod common;

use common::{MockFirebase, id_token, session_cookie};
use firebase_admin_auth::ErrorCode;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_revoked_id_token() {
    // GIVEN: a user whose tokens were revoked 1000 seconds after the epoch
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    firebase.mock_user(false, 1000).await;
    let (client, _clock) = firebase.client(firebase.config());

    // WHEN: a token issued at the epoch is checked
    let token = id_token(|claims| claims["iat"] = json!(0));
    let err = client
        .verify_id_token_and_check_revoked(&CancellationToken::new(), &token)
        .await
        .unwrap_err();

    // THEN: it is both invalid and revoked
    assert!(err.is_id_token_invalid());
    assert!(err.is_id_token_revoked());
    assert_eq!(err.code(), ErrorCode::IdTokenRevoked);
    assert_eq!(err.message(), "ID token has been revoked");

    // Plain verification does not look at revocation.
    assert!(
        client
            .verify_id_token(&CancellationToken::new(), &token)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_disabled_user() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    firebase.mock_user(true, 1000).await;
    let (client, _clock) = firebase.client(firebase.config());

    let token = id_token(|claims| claims["iat"] = json!(0));
    let err = client
        .verify_id_token_and_check_revoked(&CancellationToken::new(), &token)
        .await
        .unwrap_err();

    assert!(err.is_user_disabled());
    assert!(!err.is_id_token_revoked());
    assert_eq!(err.message(), "user has been disabled");
}

#[tokio::test]
async fn test_valid_token_for_active_user() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    firebase.mock_user(false, 1000).await;
    let (client, _clock) = firebase.client(firebase.config());
    let cancel = CancellationToken::new();

    let token = client
        .verify_id_token_and_check_revoked(&cancel, &id_token(|_| {}))
        .await
        .unwrap();
    assert_eq!(token.uid, "alice");

    let cookie = client
        .verify_session_cookie_and_check_revoked(&cancel, &session_cookie(|_| {}))
        .await
        .unwrap();
    assert_eq!(cookie.uid, "alice");
}

#[tokio::test]
async fn test_revoked_session_cookie() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    firebase.mock_user(false, 1000).await;
    let (client, _clock) = firebase.client(firebase.config());

    let cookie = session_cookie(|claims| claims["iat"] = json!(999));
    let err = client
        .verify_session_cookie_and_check_revoked(&CancellationToken::new(), &cookie)
        .await
        .unwrap_err();

    assert!(err.is_session_cookie_revoked());
    assert!(err.is_session_cookie_invalid());
    assert_eq!(err.message(), "session cookie has been revoked");
}

#[tokio::test]
async fn test_unknown_user() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(common::LOOKUP_PATH))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
            "kind": "identitytoolkit#GetAccountInfoResponse"
        })))
        .mount(&firebase.server)
        .await;
    let (client, _clock) = firebase.client(firebase.config());

    let err = client
        .verify_id_token_and_check_revoked(&CancellationToken::new(), &id_token(|_| {}))
        .await
        .unwrap_err();

    assert!(err.is_user_not_found());
    assert_eq!(err.message(), r#"no user exists with the uid: "alice""#);
}

#[tokio::test]
async fn test_invalid_token_skips_lookup() {
    let firebase = MockFirebase::start().await;
    firebase.mock_certs(3600).await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(common::LOOKUP_PATH))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .expect(0)
        .mount(&firebase.server)
        .await;
    let (client, _clock) = firebase.client(firebase.config());

    let token = id_token(|claims| claims["aud"] = json!("other-project"));
    let err = client
        .verify_id_token_and_check_revoked(&CancellationToken::new(), &token)
        .await
        .unwrap_err();
    assert!(err.is_id_token_invalid());
}
