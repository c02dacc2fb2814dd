//! Gemini provider client.

pub mod api;
mod sse;

pub use api::{GeminiClient, GeminiConfig, TextStream};
pub use sse::{StreamEvent, map_finish_reason};
