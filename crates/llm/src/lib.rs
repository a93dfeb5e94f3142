//! LLM integration: chat providers and the model-backed capability set.
//!
//! The engine stays model-agnostic; this crate supplies the judgment. One
//! [`LlmCapabilities`] drives all four capability seams over whichever
//! [`ChatProvider`] the config names (OpenAI-compatible APIs or a local
//! Ollama). The `schedule-worker` binary wires the whole thing together.

pub mod capabilities;
pub mod provider;
pub mod providers;

pub use capabilities::LlmCapabilities;
pub use provider::{ChatProvider, LlmError, Message, Role};
pub use providers::create_provider;
