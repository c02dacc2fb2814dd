//! Gemini API key provider (Generative Language API).

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::sse::{GeminiSseParser, StreamEvent};
use crate::config::Config;
use crate::providers::shared::{
    ChatTurn, ProviderError, ProviderResult, USER_AGENT, classify_reqwest_error, resolve_api_key,
    resolve_base_url,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Keys shorter than this are almost certainly truncated.
const MIN_API_KEY_LEN: usize = 30;

pub(crate) const SAFETY_BLOCK_MESSAGE: &str = "response blocked by safety filters";

const NOT_INITIALIZED_MESSAGE: &str =
    "Model not initialized. Please check your API key configuration.";

/// Boxed stream of reply events.
pub type TextStream = BoxStream<'static, ProviderResult<StreamEvent>>;

/// Gemini API configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` leaves the client uninitialized; every call fails with a
    /// "not initialized" error instead of reaching the network.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub fallback_model: Option<String>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GeminiConfig {
    /// Builds the config from the loaded [`Config`] and environment.
    ///
    /// Authentication resolution order:
    /// 1. `[providers.gemini] api_key`
    /// 2. `GEMINI_API_KEY` environment variable
    ///
    /// `GEMINI_BASE_URL` overrides the configured base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL is malformed. A missing key is not an
    /// error here.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let gemini = &config.providers.gemini;
        let api_key = match resolve_api_key(
            gemini.api_key.as_deref(),
            "GEMINI_API_KEY",
            "providers.gemini",
        ) {
            Ok(key) => {
                if key.len() < MIN_API_KEY_LEN {
                    warn!(
                        "Gemini API key looks invalid: expected at least {MIN_API_KEY_LEN} characters"
                    );
                }
                Some(key)
            }
            Err(err) => {
                warn!("{err}");
                None
            }
        };
        let base_url = resolve_base_url(
            gemini.base_url.as_deref(),
            "GEMINI_BASE_URL",
            DEFAULT_BASE_URL,
            "Gemini",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }
}

/// Gemini client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Whether an API key is available.
    pub fn is_initialized(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Sends the conversation and returns the full reply text.
    ///
    /// Retries once on the fallback model when the primary model is not found.
    pub async fn generate(&self, history: &[ChatTurn], prompt: &str) -> ProviderResult<String> {
        let request = self.build_request(history, prompt);
        let result = self.generate_with_model(&self.config.model, &request).await;
        match (result, self.fallback_model()) {
            (Err(err), Some(fallback)) if err.status == Some(404) => {
                warn!(
                    "Model {} not found, retrying with {fallback}",
                    self.config.model
                );
                self.generate_with_model(fallback, &request).await
            }
            (result, _) => result,
        }
    }

    /// Sends the conversation and streams the reply.
    pub async fn stream(&self, history: &[ChatTurn], prompt: &str) -> ProviderResult<TextStream> {
        let request = self.build_request(history, prompt);
        let response = match (
            self.post(&self.config.model, "streamGenerateContent?alt=sse", &request)
                .await,
            self.fallback_model(),
        ) {
            (Err(err), Some(fallback)) if err.status == Some(404) => {
                warn!(
                    "Model {} not found, retrying with {fallback}",
                    self.config.model
                );
                self.post(fallback, "streamGenerateContent?alt=sse", &request)
                    .await?
            }
            (result, _) => result?,
        };

        let byte_stream = Box::pin(response.bytes_stream());
        Ok(GeminiSseParser::new(byte_stream).boxed())
    }

    /// Checks that the key is accepted with a minimal generation.
    pub async fn validate_api_key(&self) -> ProviderResult<()> {
        self.generate(&[], "test").await.map(|_| ())
    }

    /// Validates the key, then sends a short greeting. True when both succeed.
    pub async fn test_connection(&self) -> bool {
        if let Err(err) = self.validate_api_key().await {
            warn!("API key validation failed: {err}");
            return false;
        }
        match self.generate(&[], "Hello, this is a test message.").await {
            Ok(reply) => {
                debug!("Connection test reply: {}", preview(&reply));
                true
            }
            Err(err) => {
                warn!("Connection test failed: {err}");
                false
            }
        }
    }

    fn fallback_model(&self) -> Option<&str> {
        self.config
            .fallback_model
            .as_deref()
            .filter(|model| !model.is_empty() && *model != self.config.model)
    }

    fn build_request(&self, history: &[ChatTurn], prompt: &str) -> Value {
        let contents: Vec<Value> = history
            .iter()
            .map(|turn| (turn.role.as_str(), turn.text.as_str()))
            .chain(std::iter::once(("user", prompt)))
            .map(|(role, text)| json!({ "role": role, "parts": [{ "text": text }] }))
            .collect();

        json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.config.max_output_tokens,
                "temperature": self.config.temperature,
            },
        })
    }

    async fn generate_with_model(&self, model: &str, request: &Value) -> ProviderResult<String> {
        let response = self.post(model, "generateContent", request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let value: Value = serde_json::from_str(&body).map_err(|e| {
            ProviderError::parse(format!("Failed to parse Gemini response JSON: {e}"))
        })?;
        let text = parse_generate_response(&value)?;
        debug!("Received reply: {}", preview(&text));
        Ok(text)
    }

    async fn post(
        &self,
        model: &str,
        method: &str,
        request: &Value,
    ) -> ProviderResult<reqwest::Response> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(ProviderError::not_configured(NOT_INITIALIZED_MESSAGE));
        };
        let url = format!("{}/models/{model}:{method}", self.config.base_url);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .headers(build_headers(api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body));
        }
        Ok(response)
    }
}

/// Returns the prompt block reason, if the prompt itself was refused.
pub(crate) fn block_reason(value: &Value) -> Option<&str> {
    value
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
}

/// Concatenates the text parts of one candidate.
pub(crate) fn candidate_text(candidate: &Value) -> String {
    candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_generate_response(value: &Value) -> ProviderResult<String> {
    if let Some(reason) = block_reason(value) {
        return Err(ProviderError::api_error(format!(
            "{SAFETY_BLOCK_MESSAGE} ({reason})"
        )));
    }

    let candidate = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| ProviderError::parse("Gemini response contained no candidates"))?;

    let text = candidate_text(candidate);
    if text.is_empty() && candidate.get("finishReason").and_then(Value::as_str) == Some("SAFETY")
    {
        return Err(ProviderError::api_error(format!(
            "{SAFETY_BLOCK_MESSAGE} (SAFETY)"
        )));
    }
    Ok(text)
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers
}

fn preview(text: &str) -> String {
    let mut short: String = text.chars().take(100).collect();
    if short.len() < text.len() {
        short.push_str("...");
    }
    short
}
