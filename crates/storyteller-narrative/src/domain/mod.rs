//! Pure session logic. Nothing in here performs I/O or awaits.

pub mod aggregates;
pub mod context;
pub mod effects;
pub mod events;
pub mod lifecycle;
pub mod reveal;
