//! Requests the session asks its driver to perform, and the responses that
//! come back.

use std::time::Duration;

use storyteller_core::error::GenerationError;
use storyteller_core::message::Message;

use super::lifecycle::{RequestTicket, TicketId};

/// Outbound work produced by a session transition.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Fetch genre options seeded with the scenario facts.
    FetchGenres {
        /// Ticket the response must carry.
        ticket: RequestTicket,
        /// Scenario fact messages.
        facts: Vec<Message>,
        /// Number of genres to ask for.
        count: usize,
    },
    /// Fetch the next paragraph.
    FetchParagraph {
        /// Ticket the response must carry.
        ticket: RequestTicket,
        /// Bounded conversation context.
        context: Vec<Message>,
    },
    /// Fetch continuation suggestions once `delay` has elapsed.
    FetchSuggestions {
        /// Ticket the response must carry.
        ticket: RequestTicket,
        /// Bounded conversation context.
        context: Vec<Message>,
        /// Number of suggestions to ask for.
        count: usize,
        /// Settle delay before the request is issued.
        delay: Duration,
    },
}

impl Effect {
    /// The ticket the eventual response must present.
    #[must_use]
    pub fn ticket(&self) -> &RequestTicket {
        match self {
            Effect::FetchGenres { ticket, .. }
            | Effect::FetchParagraph { ticket, .. }
            | Effect::FetchSuggestions { ticket, .. } => ticket,
        }
    }
}

/// Typed result of one capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reply to [`Effect::FetchGenres`].
    Genres(Result<Vec<String>, GenerationError>),
    /// Reply to [`Effect::FetchParagraph`].
    Paragraph(Result<String, GenerationError>),
    /// Reply to [`Effect::FetchSuggestions`].
    Suggestions(Result<Vec<String>, GenerationError>),
}

/// A response routed back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The ticket the request was issued under.
    pub ticket: TicketId,
    /// What the service produced.
    pub outcome: Outcome,
}

impl Response {
    /// Pairs `outcome` with the ticket it answers.
    #[must_use]
    pub fn new(ticket: TicketId, outcome: Outcome) -> Self {
        Self { ticket, outcome }
    }
}
