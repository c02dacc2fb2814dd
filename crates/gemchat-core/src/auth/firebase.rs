//! Identity Toolkit REST client (Firebase Authentication).

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{AuthError, AuthErrorKind, AuthSession, IdentityService, User};
use crate::config::Config;
use crate::providers::shared::{USER_AGENT, resolve_api_key, resolve_base_url};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Redirect URI sent with federated sign-in; the provider only checks that it is a URL.
const IDP_REQUEST_URI: &str = "http://localhost";

/// Identity provider configuration.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Web API key of the project. `None` makes every request fail.
    pub api_key: Option<String>,
    pub base_url: String,
}

impl FirebaseConfig {
    /// Builds the config from `[identity]` and the environment.
    ///
    /// Key: `[identity] api_key`, then `GEMCHAT_IDENTITY_API_KEY`.
    /// `GEMCHAT_IDENTITY_BASE_URL` overrides the configured base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL is malformed.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let identity = &config.identity;
        let api_key = resolve_api_key(
            identity.api_key.as_deref(),
            "GEMCHAT_IDENTITY_API_KEY",
            "identity",
        )
        .inspect_err(|err| debug!("{err}"))
        .ok();
        let base_url = resolve_base_url(
            identity.base_url.as_deref(),
            "GEMCHAT_IDENTITY_BASE_URL",
            DEFAULT_BASE_URL,
            "identity",
        )?;
        Ok(Self { api_key, base_url })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    /// Seconds, sent as a string
    #[serde(default)]
    expires_in: Option<String>,
}

impl AccountResponse {
    fn into_session(self) -> AuthSession {
        let expires_in_secs = self
            .expires_in
            .as_deref()
            .and_then(|secs| secs.parse().ok())
            .unwrap_or(3600);
        AuthSession {
            user: User {
                uid: self.local_id,
                email: self.email,
                display_name: self.display_name.filter(|name| !name.is_empty()),
            },
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in_secs,
        }
    }
}

/// Identity Toolkit client.
pub struct FirebaseAuthClient {
    config: FirebaseConfig,
    http: reqwest::Client,
}

impl FirebaseAuthClient {
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Whether a web API key is available.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn call(&self, method: &str, body: &Value) -> Result<Value, AuthError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(AuthError::new(
                AuthErrorKind::Unknown,
                "identity api key is not configured",
            ));
        };
        let url = format!("{}/accounts:{method}", self.config.base_url);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .header("user-agent", USER_AGENT)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::new(AuthErrorKind::Network, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::new(AuthErrorKind::Network, e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(|e| {
            AuthError::new(
                AuthErrorKind::Unknown,
                format!("failed to parse identity response: {e}"),
            )
        })
    }

    async fn call_account(&self, method: &str, body: &Value) -> Result<AuthSession, AuthError> {
        let value = self.call(method, body).await?;
        let account: AccountResponse = serde_json::from_value(value).map_err(|e| {
            AuthError::new(
                AuthErrorKind::Unknown,
                format!("unexpected {method} response: {e}"),
            )
        })?;
        Ok(account.into_session())
    }
}

impl IdentityService for FirebaseAuthClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession, AuthError> {
        let mut session = self
            .call_account(
                "signUp",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        if let Some(name) = display_name.filter(|name| !name.is_empty()) {
            let update = json!({
                "idToken": session.id_token,
                "displayName": name,
                "returnSecureToken": false,
            });
            // The account exists at this point; a failed profile update is not fatal.
            match self.call("update", &update).await {
                Ok(_) => session.user.display_name = Some(name.to_string()),
                Err(err) => warn!("Failed to set display name: {err}"),
            }
        }
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.call_account(
            "signInWithPassword",
            &json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    async fn sign_in_with_idp(
        &self,
        provider_id: &str,
        id_token: &str,
    ) -> Result<AuthSession, AuthError> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", id_token)
            .append_pair("providerId", provider_id)
            .finish();
        self.call_account(
            "signInWithIdp",
            &json!({
                "postBody": post_body,
                "requestUri": IDP_REQUEST_URI,
                "returnIdpCredential": true,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        self.call(
            "sendOobCode",
            &json!({ "requestType": "PASSWORD_RESET", "email": email }),
        )
        .await
        .map(|_| ())
    }
}

/// Maps an error body such as `{"error":{"message":"WEAK_PASSWORD : Password should be…"}}`.
fn parse_error_body(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let Some(message) = message else {
        return AuthError::new(AuthErrorKind::Unknown, format!("HTTP {status}"));
    };
    let kind = AuthErrorKind::from_code(message.split(':').next().unwrap_or_default());
    AuthError::new(kind, message)
}
