//! Connection test handler.

use anyhow::{Context, Result};
use gemchat_core::config::Config;
use gemchat_core::providers::gemini::{GeminiClient, GeminiConfig};

pub async fn run(config: &Config) -> Result<()> {
    let client = GeminiClient::new(GeminiConfig::from_config(config).context("gemini config")?);
    report(&client).await
}

/// Runs the two-step key check and prints the result.
pub async fn report(client: &GeminiClient) -> Result<()> {
    if client.test_connection().await {
        println!("API connection successful! You can now send messages.");
        Ok(())
    } else {
        anyhow::bail!("API connection failed. Set RUST_LOG=debug for details.")
    }
}
