//! Mint a custom token and verify an ID token
//!
//! Configuration comes from the environment:
//!
//! - `GOOGLE_APPLICATION_CREDENTIALS` - service account key file
//! - `GOOGLE_CLOUD_PROJECT` - project id, if not in the key file
//! - `FIREBASE_AUTH_EMULATOR_HOST` - use the Auth emulator instead
//!
//! ```text
//! RUST_LOG=firebase_admin_auth=debug cargo run --example mint_and_verify -- alice [ID_TOKEN]
//! ```

use firebase_admin_auth::{AuthClient, AuthConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let uid = args.next().unwrap_or_else(|| "example-user".to_string());
    let id_token = args.next();

    let client = AuthClient::new(AuthConfig::from_env()?)?;
    println!("=== Firebase Admin Auth Example ===\n");
    println!("Project:  {}", client.project_id());
    println!("Emulator: {}\n", client.is_emulator());

    // Cancel everything on Ctrl-C.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    println!("1. Custom token for {uid:?}:");
    let mut claims = serde_json::Map::new();
    claims.insert("role".to_string(), json!("example"));
    let custom_token = client
        .custom_token_with_claims(&cancel, &uid, &claims)
        .await?;
    println!("   {custom_token}\n");

    let Some(id_token) = id_token else {
        println!("2. Pass an ID token as the second argument to verify it.");
        return Ok(());
    };

    println!("2. Verifying ID token:");
    match client
        .verify_id_token_and_check_revoked(&cancel, &id_token)
        .await
    {
        Ok(token) => {
            println!("   uid:      {}", token.uid);
            println!("   provider: {}", token.firebase.sign_in_provider);
            if let Some(expires) = token.expires_at_time() {
                println!("   expires:  {expires}");
            }
        }
        Err(err) if err.is_id_token_revoked() => println!("   revoked: {err}"),
        Err(err) if err.is_user_disabled() => println!("   user disabled: {err}"),
        Err(err) => println!("   rejected ({}): {err}", err.code()),
    }

    Ok(())
}
