//! Sign-in, sign-up and auth-state tracking.
//!
//! The identity provider does the real work; this module validates form input,
//! maps provider error codes to the fixed set of user-facing messages, keeps
//! the signed-in credentials on disk and publishes auth-state changes.

mod firebase;
mod store;

use std::fmt;
use std::future::Future;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

pub use firebase::{FirebaseAuthClient, FirebaseConfig};
pub use store::{CredentialStore, StoredCredentials};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

const MIN_PASSWORD_LEN: usize = 6;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl User {
    /// Display name, or the local part of the email when none was set.
    pub fn name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// A signed-in user plus the tokens the provider issued.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in_secs: u64,
}

/// Error categories reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    UserNotFound,
    WrongPassword,
    InvalidCredentials,
    EmailInUse,
    WeakPassword,
    InvalidEmail,
    TooManyRequests,
    PopupClosed,
    Cancelled,
    Network,
    Unknown,
}

impl AuthErrorKind {
    /// Maps an SDK-style (`auth/user-not-found`) or REST-style
    /// (`EMAIL_NOT_FOUND`) error code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "auth/user-not-found" | "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "auth/wrong-password" | "INVALID_PASSWORD" => Self::WrongPassword,
            "auth/invalid-credential" | "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredentials,
            "auth/email-already-in-use" | "EMAIL_EXISTS" => Self::EmailInUse,
            "auth/weak-password" | "WEAK_PASSWORD" => Self::WeakPassword,
            "auth/invalid-email" | "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "auth/too-many-requests" | "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "auth/popup-closed-by-user" => Self::PopupClosed,
            "auth/cancelled-popup-request" => Self::Cancelled,
            "auth/network-request-failed" => Self::Network,
            _ => Self::Unknown,
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::UserNotFound => "No account found with this email address.",
            Self::WrongPassword => "Incorrect password. Please try again.",
            Self::InvalidCredentials => "Invalid email or password. Please try again.",
            Self::EmailInUse => "An account with this email already exists.",
            Self::WeakPassword => "Password should be at least 6 characters long.",
            Self::InvalidEmail => "Please enter a valid email address.",
            Self::TooManyRequests => "Too many failed attempts. Please try again later.",
            Self::PopupClosed => "Sign-in popup was closed. Please try again.",
            Self::Cancelled => "Sign-in was cancelled.",
            Self::Network => "Network error. Please check your internet connection.",
            Self::Unknown => "An error occurred. Please try again.",
        }
    }
}

/// Failure reported by an [`IdentityService`].
#[derive(Debug, Clone)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    /// Raw provider message, for logs only.
    pub detail: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for AuthError {}

/// Remote identity provider.
pub trait IdentityService {
    /// Creates an account and signs it in. Sets the display name when given.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> impl Future<Output = Result<AuthSession, AuthError>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthSession, AuthError>> + Send;

    /// Federated sign-in with an id token issued by `provider_id` (e.g. `google.com`).
    fn sign_in_with_idp(
        &self,
        provider_id: &str,
        id_token: &str,
    ) -> impl Future<Output = Result<AuthSession, AuthError>> + Send;

    /// Sends a password reset email.
    fn reset_password(&self, email: &str) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Result of an auth action: a success flag and the message to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub user: Option<User>,
    pub message: String,
}

impl AuthOutcome {
    fn ok(user: Option<User>, message: &str) -> Self {
        Self {
            success: true,
            user,
            message: message.to_string(),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            user: None,
            message: message.to_string(),
        }
    }
}

/// Registration form input.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    /// Client-side checks run before contacting the provider.
    pub fn validate(&self) -> Result<(), &'static str> {
        if [&self.name, &self.email, &self.password, &self.confirm_password]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err("Please fill in all fields");
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err("Password must be at least 6 characters long");
        }
        if !EMAIL.is_match(&self.email) {
            return Err("Please enter a valid email address");
        }
        Ok(())
    }
}

/// Client-side checks for the sign-in form.
pub fn validate_sign_in(email: &str, password: &str) -> Result<(), &'static str> {
    if email.is_empty() || password.is_empty() {
        return Err("Please fill in all fields");
    }
    Ok(())
}

/// Auth state holder: wraps an [`IdentityService`], persists credentials and
/// notifies subscribers when the signed-in user changes.
pub struct Auth<S> {
    service: S,
    store: CredentialStore,
    state: watch::Sender<Option<User>>,
}

impl<S: IdentityService> Auth<S> {
    /// Restores the previously signed-in user from the store, if any.
    pub fn new(service: S, store: CredentialStore) -> Self {
        let user = match store.load() {
            Ok(creds) => creds.map(|creds| creds.user),
            Err(err) => {
                warn!("Ignoring unreadable credentials: {err:#}");
                None
            }
        };
        let (state, _) = watch::channel(user);
        Self {
            service,
            store,
            state,
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    /// Receives the current user now and on every sign-in or sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }

    pub async fn sign_up(&self, form: &Registration) -> AuthOutcome {
        if let Err(message) = form.validate() {
            return AuthOutcome::failed(message);
        }
        let result = self
            .service
            .sign_up(&form.email, &form.password, Some(form.name.as_str()))
            .await;
        self.finish_sign_in(result, "Account created successfully!")
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        if let Err(message) = validate_sign_in(email, password) {
            return AuthOutcome::failed(message);
        }
        let result = self.service.sign_in(email, password).await;
        self.finish_sign_in(result, "Signed in successfully!")
    }

    /// Signs in with a Google id token.
    pub async fn sign_in_with_google(&self, id_token: &str) -> AuthOutcome {
        let result = self.service.sign_in_with_idp("google.com", id_token).await;
        self.finish_sign_in(result, "Signed in with Google successfully!")
    }

    pub async fn reset_password(&self, email: &str) -> AuthOutcome {
        match self.service.reset_password(email).await {
            Ok(()) => AuthOutcome::ok(None, "Password reset email sent!"),
            Err(err) => {
                warn!("Password reset failed: {err}");
                AuthOutcome::failed(err.kind.user_message())
            }
        }
    }

    pub fn sign_out(&self) -> AuthOutcome {
        if let Err(err) = self.store.clear() {
            warn!("Sign-out failed: {err:#}");
            return AuthOutcome::failed("Failed to sign out");
        }
        self.state.send_replace(None);
        info!("User signed out");
        AuthOutcome::ok(None, "Signed out successfully!")
    }

    fn finish_sign_in(&self, result: Result<AuthSession, AuthError>, message: &str) -> AuthOutcome {
        let session = match result {
            Ok(session) => session,
            Err(err) => {
                warn!("Authentication failed: {err}");
                return AuthOutcome::failed(err.kind.user_message());
            }
        };

        let creds = StoredCredentials::from_session(&session);
        if let Err(err) = self.store.save(&creds) {
            warn!("Could not persist credentials: {err:#}");
        }
        info!("User signed in: {}", session.user.uid);
        self.state.send_replace(Some(session.user.clone()));
        AuthOutcome::ok(Some(session.user), message)
    }
}
