//! Domain events recorded by the story session.

use serde::Serialize;
use storyteller_core::error::TurnError;
use storyteller_core::event::{DomainEvent, EventMetadata};
use uuid::Uuid;

use super::reveal::RevealToken;

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEventKind {
    /// The play-through started and genre options were requested.
    Started,
    /// Genre options arrived.
    GenresOffered {
        /// The offered labels, in order.
        genres: Vec<String>,
    },
    /// The reader committed a genre.
    GenreSelected {
        /// The committed genre.
        genre: String,
    },
    /// A paragraph was appended to the story log.
    ParagraphAppended {
        /// Position in the log.
        index: usize,
        /// Paragraph text.
        text: String,
    },
    /// One reveal token became visible.
    FragmentRevealed {
        /// The token.
        token: RevealToken,
    },
    /// The reveal sequence finished.
    RevealCompleted,
    /// Continuation suggestions arrived.
    SuggestionsOffered {
        /// The suggestions, in order.
        suggestions: Vec<String>,
    },
    /// The reader picked a suggestion.
    OptionSelected {
        /// The chosen text.
        text: String,
    },
    /// The story reached its terminal sentinel.
    StoryCompleted,
    /// A live request failed.
    RequestFailed {
        /// What failed and how.
        error: TurnError,
    },
    /// This session replaced a previous one.
    SessionReset {
        /// The discarded session.
        previous_session_id: Uuid,
    },
}

impl SessionEventKind {
    /// Event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEventKind::Started => "story.started",
            SessionEventKind::GenresOffered { .. } => "story.genres_offered",
            SessionEventKind::GenreSelected { .. } => "story.genre_selected",
            SessionEventKind::ParagraphAppended { .. } => "story.paragraph_appended",
            SessionEventKind::FragmentRevealed { .. } => "story.fragment_revealed",
            SessionEventKind::RevealCompleted => "story.reveal_completed",
            SessionEventKind::SuggestionsOffered { .. } => "story.suggestions_offered",
            SessionEventKind::OptionSelected { .. } => "story.option_selected",
            SessionEventKind::StoryCompleted => "story.completed",
            SessionEventKind::RequestFailed { .. } => "story.request_failed",
            SessionEventKind::SessionReset { .. } => "story.reset",
        }
    }
}

/// Domain event envelope for the story session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SessionEventKind,
}

impl DomainEvent for SessionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Strings, integers and unit variants only; serialization cannot fail.
        serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
