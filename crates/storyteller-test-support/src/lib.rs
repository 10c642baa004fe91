//! Shared test doubles and utilities for the Storyteller narrative engine.

mod clock;
mod generation;

pub use clock::FixedClock;
pub use generation::{
    Capability, FailingGenerationClient, Gate, RecordedCall, ScriptedGenerationClient,
};
