//! Auth command handlers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use gemchat_core::auth::{
    Auth, AuthOutcome, CredentialStore, FirebaseAuthClient, FirebaseConfig, Registration,
};
use gemchat_core::config::Config;

/// Password source for non-interactive use.
const PASSWORD_ENV: &str = "GEMCHAT_PASSWORD";

/// Builds the auth state holder, failing early when no identity key is configured.
pub fn connect(config: &Config) -> Result<Auth<FirebaseAuthClient>> {
    let client = FirebaseAuthClient::new(FirebaseConfig::from_config(config)?);
    if !client.is_configured() {
        anyhow::bail!(
            "No identity API key available. Set GEMCHAT_IDENTITY_API_KEY or api_key in [identity]."
        );
    }
    Ok(Auth::new(client, CredentialStore::default()))
}

/// Auth state restored from the credential store. Works without an identity key.
pub fn load_state(config: &Config) -> Result<Auth<FirebaseAuthClient>> {
    let client = FirebaseAuthClient::new(FirebaseConfig::from_config(config)?);
    Ok(Auth::new(client, CredentialStore::default()))
}

pub async fn signup(config: &Config, name: Option<String>, email: Option<String>) -> Result<()> {
    let auth = connect(config)?;

    let name = match name {
        Some(name) => name,
        None => prompt_line("Name: ")?,
    };
    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let (password, confirm_password) = match std::env::var(PASSWORD_ENV) {
        Ok(password) => (password.clone(), password),
        Err(_) => (prompt_line("Password: ")?, prompt_line("Confirm password: ")?),
    };

    let form = Registration {
        name,
        email,
        password,
        confirm_password,
    };
    report(auth.sign_up(&form).await)
}

pub async fn signin(config: &Config, email: Option<String>) -> Result<()> {
    let auth = connect(config)?;

    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => prompt_line("Password: ")?,
    };

    report(auth.sign_in(&email, &password).await)
}

pub async fn google(config: &Config, id_token: &str) -> Result<()> {
    let auth = connect(config)?;
    report(auth.sign_in_with_google(id_token.trim()).await)
}

pub fn signout(config: &Config) -> Result<()> {
    let auth = load_state(config)?;
    if auth.current_user().is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    report(auth.sign_out())
}

pub async fn reset(config: &Config, email: Option<String>) -> Result<()> {
    let auth = connect(config)?;
    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    report(auth.reset_password(&email).await)
}

pub fn status(config: &Config) -> Result<()> {
    let auth = load_state(config)?;
    let Some(user) = auth.current_user() else {
        println!("Not signed in.");
        return Ok(());
    };

    println!("Signed in as {} <{}>", user.name(), user.email);
    let store = CredentialStore::default();
    if let Some(creds) = store.load()?
        && creds.is_expired()
    {
        println!("  Session token expired; sign in again to refresh it.");
    }
    println!("  Credentials: {}", store.path().display());
    Ok(())
}

fn report(outcome: AuthOutcome) -> Result<()> {
    if !outcome.success {
        anyhow::bail!(outcome.message);
    }
    println!("✓ {}", outcome.message);
    if let Some(user) = outcome.user {
        println!("  Hello {}", user.name());
    }
    Ok(())
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("read stdin")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
