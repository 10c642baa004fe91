//! Storyteller API — HTTP view layer over the narrative engine.

pub mod error;
pub mod routes;
pub mod state;
