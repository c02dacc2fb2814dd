//! Sending chat messages and turning failures into user-facing text.

use tracing::{error, info};

use crate::providers::gemini::{GeminiClient, TextStream};
use crate::providers::{ChatTurn, ProviderError, ProviderResult};
use crate::session::ChatSession;

/// Failure categories shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    ApiKey,
    Quota,
    Network,
    Model,
    Safety,
    Unknown,
}

impl ChatErrorKind {
    /// Classifies an error message. First match wins, tests are case-sensitive.
    pub fn classify(message: &str) -> Self {
        let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));
        if has(&["API_KEY", "key", "authentication"]) {
            Self::ApiKey
        } else if has(&["quota", "limit"]) {
            Self::Quota
        } else if has(&["network", "fetch"]) {
            Self::Network
        } else if has(&["model", "not initialized"]) {
            Self::Model
        } else if has(&["safety"]) {
            Self::Safety
        } else {
            Self::Unknown
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::ApiKey => "API key error. Please check your Gemini API configuration.",
            Self::Quota => "API quota exceeded. Please try again later.",
            Self::Network => "Network error. Please check your internet connection.",
            Self::Model => "Model error. Please try again.",
            Self::Safety => "Content blocked by safety filters. Please rephrase your question.",
            Self::Unknown => {
                "I apologize, but I encountered an error processing your request. Please try again."
            }
        }
    }
}

impl From<&ProviderError> for ChatErrorKind {
    fn from(err: &ProviderError) -> Self {
        Self::classify(&err.message)
    }
}

/// Result of sending one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    /// Reply text, or the user-facing error message.
    pub response: String,
    pub error: Option<ChatErrorKind>,
}

/// Sends messages on behalf of a [`ChatSession`].
pub struct ChatService {
    client: GeminiClient,
    include_history: bool,
}

impl ChatService {
    pub fn new(client: GeminiClient, include_history: bool) -> Self {
        Self {
            client,
            include_history,
        }
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }

    /// Records `text` in the session, asks the model and records the reply
    /// or the classified error.
    pub async fn send_message(&self, session: &mut ChatSession, text: &str) -> SendOutcome {
        session.push_user(text);
        let result = self.client.generate(self.context(session), text).await;
        Self::record(session, text, result)
    }

    /// Records `text` in the session and starts streaming the reply.
    ///
    /// The caller collects the deltas and hands the outcome to [`Self::record`].
    pub async fn stream_message(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> ProviderResult<TextStream> {
        session.push_user(text);
        self.client.stream(self.context(session), text).await
    }

    /// Stores a finished exchange in the session.
    ///
    /// Replies extend the model history; errors are shown in place of the reply.
    pub fn record(
        session: &mut ChatSession,
        prompt: &str,
        result: ProviderResult<String>,
    ) -> SendOutcome {
        match result {
            Ok(reply) => {
                info!("Reply received ({} chars)", reply.chars().count());
                session.push_assistant(prompt, &reply);
                SendOutcome {
                    success: true,
                    response: reply,
                    error: None,
                }
            }
            Err(err) => {
                error!("Chat request failed: {err}");
                let kind = ChatErrorKind::from(&err);
                session.push_error(kind.user_message());
                SendOutcome {
                    success: false,
                    response: kind.user_message().to_string(),
                    error: Some(kind),
                }
            }
        }
    }

    fn context<'a>(&self, session: &'a ChatSession) -> &'a [ChatTurn] {
        if self.include_history {
            session.history()
        } else {
            &[]
        }
    }
}
