//! Storyteller Core — shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the narrative
//! engine, the generation client and the HTTP adapter depend on. It contains
//! no infrastructure code.

pub mod clock;
pub mod error;
pub mod event;
pub mod generation;
pub mod message;
pub mod phase;
