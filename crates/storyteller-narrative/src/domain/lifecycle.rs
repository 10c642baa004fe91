//! Request lifecycle: one live cancellation token per phase.
//!
//! Issuing a request for a phase cancels whatever was outstanding for that
//! phase first. A response is accepted only if it carries the ticket that is
//! still live for its phase; everything else is stale and must be dropped
//! without touching session state.

use std::collections::HashMap;

use storyteller_core::phase::Phase;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Identifies one issued request. Travels with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketId {
    /// Unique request identifier.
    pub request_id: Uuid,
    /// Phase the request belongs to.
    pub phase: Phase,
}

/// A request's identity plus the token its task observes.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: TicketId,
    token: CancellationToken,
}

impl RequestTicket {
    /// The identity carried by the response.
    #[must_use]
    pub fn id(&self) -> TicketId {
        self.id
    }

    /// The phase this request belongs to.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.id.phase
    }

    /// Token cancelled when the request is superseded or the session resets.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Tracks the live ticket of each phase.
#[derive(Debug, Default)]
pub struct RequestLifecycle {
    live: HashMap<Phase, RequestTicket>,
}

impl RequestLifecycle {
    /// Creates a lifecycle with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any outstanding request for `phase`, then issues a fresh ticket.
    pub fn begin(&mut self, phase: Phase) -> RequestTicket {
        self.cancel(phase);
        let ticket = RequestTicket {
            id: TicketId {
                request_id: Uuid::new_v4(),
                phase,
            },
            token: CancellationToken::new(),
        };
        self.live.insert(phase, ticket.clone());
        ticket
    }

    /// Whether `id` is the live, uncancelled request for its phase.
    #[must_use]
    pub fn is_live(&self, id: TicketId) -> bool {
        self.live
            .get(&id.phase)
            .is_some_and(|t| t.id == id && !t.is_cancelled())
    }

    /// Accepts the response for `id` if it is live, retiring the ticket.
    /// Returns `false` for a stale response.
    pub fn settle(&mut self, id: TicketId) -> bool {
        if !self.is_live(id) {
            debug!(phase = %id.phase, request_id = %id.request_id, "discarding stale response");
            return false;
        }
        self.live.remove(&id.phase);
        true
    }

    /// Cancels the outstanding request for `phase`, if any.
    pub fn cancel(&mut self, phase: Phase) {
        if let Some(previous) = self.live.remove(&phase) {
            debug!(%phase, request_id = %previous.id.request_id, "cancelling outstanding request");
            previous.token.cancel();
        }
    }

    /// Cancels every outstanding request.
    pub fn cancel_all(&mut self) {
        for phase in Phase::ALL {
            self.cancel(phase);
        }
    }

    /// Whether a request for `phase` is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, phase: Phase) -> bool {
        self.live.contains_key(&phase)
    }

    /// The phase with an outstanding request, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| self.is_in_flight(*p))
    }
}

impl Drop for RequestLifecycle {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
