//! Async driver and read models for the story session.

pub mod config;
pub mod engine;
pub mod query_handlers;
