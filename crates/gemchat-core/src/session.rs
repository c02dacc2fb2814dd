//! Per-user chat session state.
//!
//! A `ChatSession` is created when a user signs in and dropped when they sign
//! out. It owns everything the conversation needs: the displayed messages,
//! the history sent to the model, and the recent-search list. Nothing here is
//! shared between sessions.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::auth::User;
use crate::config::ChatConfig;
use crate::providers::ChatTurn;

/// Who wrote a displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A message shown in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Set for assistant messages that carry an error explanation instead of a reply.
    pub is_error: bool,
    pub timestamp: DateTime<Local>,
}

impl Message {
    fn new(role: Role, content: String, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            is_error,
            timestamp: Local::now(),
        }
    }

    /// Local time of day, as shown next to the message.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Why an input line was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRejection {
    Empty,
    TooLong { limit: usize },
}

impl std::fmt::Display for InputRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputRejection::Empty => write!(f, "Message is empty"),
            InputRejection::TooLong { limit } => {
                write!(f, "Message is longer than {limit} characters")
            }
        }
    }
}

/// Conversation state of one signed-in user.
#[derive(Debug, Clone)]
pub struct ChatSession {
    user: User,
    messages: Vec<Message>,
    history: Vec<ChatTurn>,
    recent_searches: VecDeque<String>,
    recent_limit: usize,
    max_input_chars: usize,
}

impl ChatSession {
    pub fn new(user: User, config: &ChatConfig) -> Self {
        Self {
            user,
            messages: Vec::new(),
            history: Vec::new(),
            recent_searches: VecDeque::new(),
            recent_limit: config.recent_searches_limit,
            max_input_chars: config.max_input_chars,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Turns sent to the model as context.
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Most recent first.
    pub fn recent_searches(&self) -> impl Iterator<Item = &str> {
        self.recent_searches.iter().map(String::as_str)
    }

    /// Checks an input line before it is sent.
    ///
    /// Whitespace-only input is ignored; the length limit counts characters.
    pub fn check_input(&self, input: &str) -> Result<(), InputRejection> {
        if input.trim().is_empty() {
            return Err(InputRejection::Empty);
        }
        if input.chars().count() > self.max_input_chars {
            return Err(InputRejection::TooLong {
                limit: self.max_input_chars,
            });
        }
        Ok(())
    }

    /// Records a user message and remembers it as a recent search.
    pub fn push_user(&mut self, content: &str) -> &Message {
        self.remember_search(content);
        self.push(Message::new(Role::User, content.to_string(), false))
    }

    /// Records a successful reply and extends the model history with the exchange.
    pub fn push_assistant(&mut self, prompt: &str, reply: &str) -> &Message {
        self.history.push(ChatTurn::user(prompt));
        self.history.push(ChatTurn::model(reply));
        self.push(Message::new(Role::Assistant, reply.to_string(), false))
    }

    /// Records a user-facing error in place of a reply. History is untouched.
    pub fn push_error(&mut self, message: &str) -> &Message {
        self.push(Message::new(Role::Assistant, message.to_string(), true))
    }

    /// Drops the conversation and model history. Recent searches stay.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.history.clear();
    }

    pub fn clear_recent_searches(&mut self) {
        self.recent_searches.clear();
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    fn remember_search(&mut self, query: &str) {
        self.recent_searches.retain(|existing| existing != query);
        self.recent_searches.push_front(query.to_string());
        self.recent_searches.truncate(self.recent_limit);
    }
}
