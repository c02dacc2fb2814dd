//! Core gemchat library (reply formatting, Gemini client, identity, sessions).

pub mod auth;
pub mod chat;
pub mod config;
pub mod format;
pub mod interrupt;
pub mod logging;
pub mod providers;
pub mod session;
pub mod transcript;
