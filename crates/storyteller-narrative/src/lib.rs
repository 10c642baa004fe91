//! Storyteller — Narrative Orchestration Engine.
//!
//! Builds the bounded conversation sent to the generation service, keeps at
//! most one request in flight per phase, paces the word-by-word reveal of
//! generated text, and detects story termination.

pub mod application;
pub mod domain;
