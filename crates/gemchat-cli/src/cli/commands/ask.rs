//! Ask command handler.

use anyhow::{Context, Result};
use gemchat_core::chat::ChatErrorKind;
use gemchat_core::config::Config;
use gemchat_core::format::format_response;
use gemchat_core::interrupt;
use gemchat_core::providers::gemini::{GeminiClient, GeminiConfig};
use tracing::debug;

pub async fn run(prompt: &str, raw: bool, model: Option<&str>, config: &Config) -> Result<()> {
    let mut config = config.clone();
    if let Some(model) = model {
        config.model = model.to_string();
    }

    let client = GeminiClient::new(GeminiConfig::from_config(&config).context("gemini config")?);

    let result = tokio::select! {
        result = client.generate(&[], prompt) => result,
        () = interrupt::wait_for_interrupt() => {
            return Err(interrupt::InterruptedError.into());
        }
    };

    match result {
        Ok(reply) if raw => println!("{reply}"),
        Ok(reply) => println!("{}", format_response(Some(&reply))),
        Err(err) => {
            debug!("ask failed: {err}");
            anyhow::bail!(ChatErrorKind::from(&err).user_message());
        }
    }
    Ok(())
}
