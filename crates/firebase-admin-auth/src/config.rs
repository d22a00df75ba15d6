//! Configuration for the authentication client
//!
//! [`AuthConfig`] can be deserialized from any serde format or built from
//! the environment with [`AuthConfig::from_env`].

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{AuthError, ErrorCode, Result};
use crate::http::DEFAULT_HTTP_TIMEOUT;
use crate::keys::{ID_TOKEN_CERT_URL, SESSION_COOKIE_CERT_URL};
use crate::revocation::DEFAULT_IDENTITY_TOOLKIT_HOST;
use crate::signer::{DEFAULT_IAM_HOST, DEFAULT_METADATA_HOST};

/// `host:port` of the Auth emulator; enables emulator mode when set
pub const EMULATOR_HOST_ENV: &str = "FIREBASE_AUTH_EMULATOR_HOST";

/// Project id variables, in order of preference
pub const PROJECT_ID_ENV: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// Path of a service account key file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// A service account key file as downloaded from the Cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    /// Always `service_account`
    #[serde(rename = "type", default)]
    pub account_type: String,
    /// Project the account belongs to
    #[serde(default)]
    pub project_id: String,
    /// ID of the private key
    #[serde(default)]
    pub private_key_id: String,
    /// PEM-encoded RSA private key
    #[serde(default = "empty_secret")]
    pub private_key: SecretString,
    /// Service account email
    #[serde(default)]
    pub client_email: String,
    /// Numeric client id
    #[serde(default)]
    pub client_id: String,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

impl ServiceAccountCredentials {
    /// Parse a service account key file's contents
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidCredential`] for malformed JSON.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        serde_json::from_slice(json).map_err(|e| {
            AuthError::invalid_argument(
                ErrorCode::InvalidCredential,
                format!("failed to parse service account credentials: {e}"),
            )
        })
    }

    /// Read and parse a service account key file
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidCredential`] if the file cannot be read
    /// or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|e| {
            AuthError::invalid_argument(
                ErrorCode::InvalidCredential,
                format!("failed to read credentials file {}: {e}", path.display()),
            )
        })?;
        Self::from_json(&contents)
    }

    /// Whether the file carries a private key usable for local signing
    pub fn has_private_key(&self) -> bool {
        !self.private_key.expose_secret().trim().is_empty()
    }
}

/// Authentication client configuration
///
/// # Example
///
/// ```rust
/// use firebase_admin_auth::config::AuthConfig;
///
/// let config: AuthConfig = serde_json::from_str(r#"{"project_id": "my-project"}"#).unwrap();
/// assert_eq!(config.resolved_project_id().as_deref(), Some("my-project"));
/// assert!(!config.is_emulator());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Project tokens are minted for and verified against
    #[serde(default)]
    pub project_id: Option<String>,

    /// Service account to sign as when no private key is available
    #[serde(default)]
    pub service_account_id: Option<String>,

    /// Service account key for local signing
    #[serde(default)]
    pub credentials: Option<ServiceAccountCredentials>,

    /// Auth emulator `host:port`
    #[serde(default)]
    pub emulator_host: Option<String>,

    /// Certificates for ID tokens
    #[serde(default = "default_id_token_cert_url")]
    pub id_token_cert_url: String,

    /// Certificates for session cookies
    #[serde(default = "default_session_cookie_cert_url")]
    pub session_cookie_cert_url: String,

    /// IAM API host used by the remote signer
    #[serde(default = "default_iam_host")]
    pub iam_host: String,

    /// Metadata server host used for service account discovery
    #[serde(default = "default_metadata_host")]
    pub metadata_host: String,

    /// Identity Toolkit API host used for user lookups
    #[serde(default = "default_identity_toolkit_host")]
    pub identity_toolkit_host: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout")]
    pub http_timeout: Duration,
}

fn default_id_token_cert_url() -> String {
    ID_TOKEN_CERT_URL.to_string()
}

fn default_session_cookie_cert_url() -> String {
    SESSION_COOKIE_CERT_URL.to_string()
}

fn default_iam_host() -> String {
    DEFAULT_IAM_HOST.to_string()
}

fn default_metadata_host() -> String {
    DEFAULT_METADATA_HOST.to_string()
}

fn default_identity_toolkit_host() -> String {
    DEFAULT_IDENTITY_TOOLKIT_HOST.to_string()
}

fn default_http_timeout() -> Duration {
    DEFAULT_HTTP_TIMEOUT
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            service_account_id: None,
            credentials: None,
            emulator_host: None,
            id_token_cert_url: default_id_token_cert_url(),
            session_cookie_cert_url: default_session_cookie_cert_url(),
            iam_host: default_iam_host(),
            metadata_host: default_metadata_host(),
            identity_toolkit_host: default_identity_toolkit_host(),
            http_timeout: default_http_timeout(),
        }
    }
}

impl AuthConfig {
    /// Build a configuration from the process environment
    ///
    /// # Errors
    ///
    /// Fails if `GOOGLE_APPLICATION_CREDENTIALS` names an unreadable or
    /// malformed file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Same as [`AuthConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let credentials = var(CREDENTIALS_ENV)
            .map(ServiceAccountCredentials::from_file)
            .transpose()?;

        Ok(Self {
            project_id: PROJECT_ID_ENV.iter().find_map(|&name| var(name)),
            credentials,
            emulator_host: var(EMULATOR_HOST_ENV),
            ..Self::default()
        })
    }

    /// Use `project_id` explicitly
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sign locally with `credentials`
    pub fn with_credentials(mut self, credentials: ServiceAccountCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sign remotely as `service_account_id`
    pub fn with_service_account_id(mut self, service_account_id: impl Into<String>) -> Self {
        self.service_account_id = Some(service_account_id.into());
        self
    }

    /// Talk to the Auth emulator at `host`
    pub fn with_emulator_host(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    /// Whether emulator mode is enabled
    pub fn is_emulator(&self) -> bool {
        self.emulator_host.as_deref().is_some_and(|host| !host.is_empty())
    }

    /// Project id, falling back to the one in the credentials
    pub fn resolved_project_id(&self) -> Option<String> {
        let explicit = self.project_id.as_deref().filter(|id| !id.is_empty());
        let from_credentials = self
            .credentials
            .as_ref()
            .map(|c| c.project_id.as_str())
            .filter(|id| !id.is_empty());

        explicit.or(from_credentials).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    const SERVICE_ACCOUNT: &str = include_str!("../tests/data/service_account.json");

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.iam_host, "https://iam.googleapis.com");
        assert_eq!(config.metadata_host, "http://metadata.google.internal");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.resolved_project_id().is_none());
    }

    #[test]
    fn test_parse_service_account() {
        let credentials = ServiceAccountCredentials::from_json(SERVICE_ACCOUNT.as_bytes()).unwrap();
        assert_eq!(credentials.project_id, "mock-project-id");
        assert_eq!(
            credentials.client_email,
            "mock-email@mock-project.iam.gserviceaccount.com"
        );
        assert!(credentials.has_private_key());
        assert!(!format!("{credentials:?}").contains("PRIVATE KEY"));
    }

    #[test]
    fn test_malformed_credentials() {
        let err = ServiceAccountCredentials::from_json(b"{not json").unwrap_err();
        assert!(err.is_invalid_credential());

        let err = ServiceAccountCredentials::from_file("/no/such/credentials.json").unwrap_err();
        assert!(err.is_invalid_credential());
    }

    #[test]
    fn test_from_lookup() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), SERVICE_ACCOUNT).unwrap();
        let path = file.path().to_str().unwrap();

        let config = AuthConfig::from_lookup(lookup(&[
            (CREDENTIALS_ENV, path),
            ("GCLOUD_PROJECT", "from-env"),
            (EMULATOR_HOST_ENV, "localhost:9099"),
        ]))
        .unwrap();

        assert!(config.is_emulator());
        assert_eq!(config.project_id.as_deref(), Some("from-env"));
        assert!(config.credentials.is_some());
    }

    #[test]
    fn test_project_id_resolution_order() {
        let credentials = ServiceAccountCredentials::from_json(SERVICE_ACCOUNT.as_bytes()).unwrap();
        let config = AuthConfig::default().with_credentials(credentials);
        assert_eq!(config.resolved_project_id().as_deref(), Some("mock-project-id"));

        let config = config.with_project_id("explicit");
        assert_eq!(config.resolved_project_id().as_deref(), Some("explicit"));

        let config = AuthConfig::from_lookup(lookup(&[
            ("GOOGLE_CLOUD_PROJECT", "first"),
            ("GCLOUD_PROJECT", "second"),
        ]))
        .unwrap();
        assert_eq!(config.resolved_project_id().as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = AuthConfig::from_lookup(lookup(&[(EMULATOR_HOST_ENV, "")])).unwrap();
        assert!(!config.is_emulator());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "project_id": "p",
            "iam_host": "http://localhost:1234",
            "http_timeout": {"secs": 5, "nanos": 0}
        }))
        .unwrap();

        assert_eq!(config.iam_host, "http://localhost:1234");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.id_token_cert_url, ID_TOKEN_CERT_URL);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_emulator_host() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe { std::env::set_var(EMULATOR_HOST_ENV, "127.0.0.1:9099") };
        let config = AuthConfig::from_env();
        unsafe { std::env::remove_var(EMULATOR_HOST_ENV) };

        assert_eq!(
            config.unwrap().emulator_host.as_deref(),
            Some("127.0.0.1:9099")
        );
    }
}
