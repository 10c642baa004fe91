//! Storyteller — remote text-generation client.
//!
//! Implements [`storyteller_core::generation::GenerationClient`] against an
//! OpenAI-compatible chat completions endpoint.

pub mod client;
pub mod config;
pub mod reply;

pub use client::OpenAiGenerationClient;
pub use config::{ConfigError, GenerationConfig};
