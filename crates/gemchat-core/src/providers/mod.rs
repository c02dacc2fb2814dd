//! HTTP backends: the Gemini language model and shared request plumbing.

pub mod gemini;
pub mod shared;

pub use shared::{
    ChatTurn, ProviderError, ProviderErrorKind, ProviderResult, TurnRole, resolve_api_key,
    resolve_base_url,
};
