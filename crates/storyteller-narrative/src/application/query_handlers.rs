//! Read models for the story session.

use serde::Serialize;
use storyteller_core::error::TurnError;
use storyteller_core::phase::Phase;
use uuid::Uuid;

use crate::domain::aggregates::{Session, SessionState};

/// Read-only snapshot of a story session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    /// The session identifier. Changes on reset.
    pub session_id: Uuid,
    /// Current state.
    pub state: SessionState,
    /// Whether the play-through has been started.
    pub initialized: bool,
    /// The committed genre.
    pub genre: Option<String>,
    /// Genre options awaiting a pick.
    pub genre_options: Vec<String>,
    /// The story log, oldest first.
    pub paragraphs: Vec<String>,
    /// Suggestions awaiting a pick.
    pub suggestions: Vec<String>,
    /// The chosen suggestion whose paragraph is pending.
    pub selection: Option<String>,
    /// Text revealed so far.
    pub revealed_text: String,
    /// Whether the reveal timer is running.
    pub revealing: bool,
    /// Whether the story has ended.
    pub story_complete: bool,
    /// Whether the reader must pick an option.
    pub awaiting_input: bool,
    /// The pending failure, if any.
    pub last_error: Option<TurnError>,
    /// The phase with a request in flight.
    pub in_flight: Option<Phase>,
}

impl SessionView {
    /// Projects `session` into a view.
    #[must_use]
    pub fn of(session: &Session) -> Self {
        Self {
            session_id: session.id,
            state: session.state(),
            initialized: session.is_initialized(),
            genre: session.genre().map(str::to_owned),
            genre_options: session.genre_options().to_vec(),
            paragraphs: session.paragraphs().to_vec(),
            suggestions: session.suggestions().to_vec(),
            selection: session.selection().map(str::to_owned),
            revealed_text: session.revealed_text().to_owned(),
            revealing: session.is_revealing(),
            story_complete: session.is_story_complete(),
            awaiting_input: session.is_awaiting_input(),
            last_error: session.last_error().cloned(),
            in_flight: session.in_flight(),
        }
    }
}
