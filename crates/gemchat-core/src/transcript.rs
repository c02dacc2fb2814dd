//! HTML export of a chat session.
//!
//! User text is escaped by the template engine. Assistant replies go through
//! [`format_response`] and are inserted with `|safe`, the only place where
//! unescaped markup reaches the page.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::format::format_response;
use crate::session::{ChatSession, Role};

const TEMPLATE_NAME: &str = "transcript.html";
const TEMPLATE: &str = include_str!("../templates/transcript.html");

#[derive(Serialize)]
struct TranscriptVars<'a> {
    title: &'a str,
    user_name: &'a str,
    exported_at: String,
    messages: Vec<MessageVars<'a>>,
}

#[derive(Serialize)]
struct MessageVars<'a> {
    role: &'static str,
    content: &'a str,
    /// Formatter output for assistant replies; empty otherwise.
    markup: String,
    is_error: bool,
    time: String,
}

/// Renders the session as a standalone HTML page.
///
/// # Errors
/// Returns an error if the template fails to render.
pub fn render(session: &ChatSession, title: &str) -> Result<String> {
    let messages = session
        .messages()
        .iter()
        .map(|message| {
            let (role, markup) = match message.role {
                Role::User => ("user", String::new()),
                Role::Assistant if message.is_error => ("assistant", String::new()),
                Role::Assistant => (
                    "assistant",
                    format_response(Some(&message.content)).into_string(),
                ),
            };
            MessageVars {
                role,
                content: &message.content,
                markup,
                is_error: message.is_error,
                time: message.time_label(),
            }
        })
        .collect();

    let vars = TranscriptVars {
        title,
        user_name: session.user().name(),
        exported_at: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        messages,
    };

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template(TEMPLATE_NAME, TEMPLATE)
        .context("Invalid transcript template")?;
    env.get_template(TEMPLATE_NAME)
        .and_then(|template| template.render(&vars))
        .context("Failed to render transcript")
}

/// Renders the session and writes it to `path`.
///
/// # Errors
/// Returns an error if rendering or writing fails.
pub fn write(session: &ChatSession, title: &str, path: &Path) -> Result<()> {
    let html = render(session, title)?;
    fs::write(path, html)
        .with_context(|| format!("Failed to write transcript to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::config::ChatConfig;

    fn session() -> ChatSession {
        ChatSession::new(
            User {
                uid: "uid-1".to_string(),
                email: "ada@example.com".to_string(),
                display_name: Some("Ada <3".to_string()),
            },
            &ChatConfig::default(),
        )
    }

    #[test]
    fn test_user_text_is_escaped_and_replies_are_markup() {
        let mut session = session();
        session.push_user("<b>plan</b> a trip");
        session.push_assistant("<b>plan</b> a trip", "* **Day 1:** drive");

        let html = render(&session, "Chat").unwrap();
        assert!(html.contains("&lt;b&gt;plan&lt;&#x2f;b&gt; a trip") || html.contains("&lt;b&gt;plan&lt;/b&gt; a trip"));
        assert!(!html.contains("<b>plan</b>"));
        assert!(html.contains(r#"<ul class="list-disc list-inside mb-3">"#));
        assert!(html.contains(r#"<strong class="text-white font-semibold">Day 1:</strong>"#));
        assert!(html.contains("Ada &lt;3"));
    }

    #[test]
    fn test_error_messages_are_escaped_text() {
        let mut session = session();
        session.push_user("hi");
        session.push_error("Model error. Please try again.");

        let html = render(&session, "Chat").unwrap();
        assert!(html.contains("bg-red-900"));
        assert!(html.contains("Model error. Please try again."));
        assert!(!html.contains(r#"<p class="text-sm text-gray-300 mb-2">Model error"#));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chat.html");
        write(&session(), "Empty", &path).unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Empty</title>"));
    }
}
