//! The story session aggregate.
//!
//! `Session` is the whole state of one play-through. Every view action and
//! every response is an explicit transition guarded by the current
//! [`SessionState`]. Transitions never perform I/O: they return the
//! [`Effect`]s the driver must carry out and record [`SessionEvent`]s for
//! subscribers.

use std::time::Duration;

use serde::Serialize;
use storyteller_core::clock::Clock;
use storyteller_core::error::{GenerationError, StoryError, TurnError};
use storyteller_core::event::EventMetadata;
pub use storyteller_core::generation::SUGGESTION_RANGE;
use storyteller_core::phase::Phase;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::{self, ScenarioFacts};
use super::effects::{Effect, Outcome, Response};
use super::events::{SessionEvent, SessionEventKind};
use super::lifecycle::RequestLifecycle;
use super::reveal::{RevealQueue, RevealStep};

/// Where the play-through currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing started; no network activity.
    Idle,
    /// Genre options requested or offered; waiting for a pick.
    AwaitingGenre,
    /// First paragraph requested.
    GeneratingOpening,
    /// Next paragraph requested while the chosen suggestion is revealed.
    GeneratingContinuation,
    /// A paragraph is being revealed.
    Revealing,
    /// Suggestions requested or offered; waiting for a pick.
    AwaitingSuggestions,
    /// The story ended. Terminal until reset.
    Completed,
}

impl SessionState {
    /// Stable name used in errors and snapshots.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingGenre => "awaiting_genre",
            SessionState::GeneratingOpening => "generating_opening",
            SessionState::GeneratingContinuation => "generating_continuation",
            SessionState::Revealing => "revealing",
            SessionState::AwaitingSuggestions => "awaiting_suggestions",
            SessionState::Completed => "completed",
        }
    }
}

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Scenario facts prepended to every context.
    pub facts: ScenarioFacts,
    /// Genre options to request.
    pub genre_count: usize,
    /// Suggestions to request per turn.
    pub suggestion_count: usize,
    /// Pause between the end of a reveal and the suggestion request.
    pub settle_delay: Duration,
}

impl SessionSettings {
    /// Sets the suggestion count, clamped to [`SUGGESTION_RANGE`].
    #[must_use]
    pub fn with_suggestion_count(mut self, count: usize) -> Self {
        self.suggestion_count = count.clamp(SUGGESTION_RANGE.0, SUGGESTION_RANGE.1);
        self
    }

    /// Sets the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            facts: ScenarioFacts::default(),
            genre_count: 5,
            suggestion_count: 3,
            settle_delay: Duration::from_millis(600),
        }
    }
}

/// What happened to a response handed to [`Session::apply`].
#[derive(Debug)]
pub enum Disposition {
    /// The response was live and its effects (possibly none) follow.
    Applied(Vec<Effect>),
    /// The response's ticket was cancelled or superseded. State untouched.
    Discarded,
}

/// The aggregate root for one play-through.
#[derive(Debug)]
pub struct Session {
    /// Session identifier. A reset produces a new one.
    pub id: Uuid,
    settings: SessionSettings,
    state: SessionState,
    initialized: bool,
    genre: Option<String>,
    genre_options: Vec<String>,
    /// Append-only story log.
    paragraphs: Vec<String>,
    suggestions: Vec<String>,
    selection: Option<String>,
    reveal: RevealQueue,
    story_complete: bool,
    last_error: Option<TurnError>,
    lifecycle: RequestLifecycle,
    next_sequence: u64,
    uncommitted_events: Vec<SessionEvent>,
}

impl Session {
    /// Creates an idle session.
    #[must_use]
    pub fn new(id: Uuid, settings: SessionSettings) -> Self {
        Self {
            id,
            settings,
            state: SessionState::Idle,
            initialized: false,
            genre: None,
            genre_options: Vec::new(),
            paragraphs: Vec::new(),
            suggestions: Vec::new(),
            selection: None,
            reveal: RevealQueue::new(),
            story_complete: false,
            last_error: None,
            lifecycle: RequestLifecycle::new(),
            next_sequence: 1,
            uncommitted_events: Vec::new(),
        }
    }

    fn record(&mut self, kind: SessionEventKind, clock: &dyn Clock) {
        let event = SessionEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                session_id: self.id,
                sequence_number: self.next_sequence,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.next_sequence += 1;
        self.uncommitted_events.push(event);
    }

    fn invalid(&self, action: &'static str) -> StoryError {
        StoryError::InvalidTransition {
            action,
            state: self.state.as_str(),
        }
    }

    fn clear_error_for(&mut self, phase: Phase) {
        if self.last_error.as_ref().is_some_and(|e| e.phase == phase) {
            self.last_error = None;
        }
    }

    fn request_genres(&mut self) -> Effect {
        self.clear_error_for(Phase::Genre);
        Effect::FetchGenres {
            ticket: self.lifecycle.begin(Phase::Genre),
            facts: self.settings.facts.messages(),
            count: self.settings.genre_count,
        }
    }

    fn request_opening(&mut self) -> Effect {
        self.clear_error_for(Phase::Paragraph);
        let context = context::opening_context(&self.settings.facts, self.genre.as_deref());
        Effect::FetchParagraph {
            ticket: self.lifecycle.begin(Phase::Paragraph),
            context,
        }
    }

    fn request_continuation(&mut self, choice: &str) -> Effect {
        self.clear_error_for(Phase::Paragraph);
        let context = context::continuation_context(
            &self.settings.facts,
            self.genre.as_deref(),
            &self.paragraphs,
            choice,
        );
        Effect::FetchParagraph {
            ticket: self.lifecycle.begin(Phase::Paragraph),
            context,
        }
    }

    fn request_suggestions(&mut self, delay: Duration) -> Option<Effect> {
        if self.story_complete {
            return None;
        }
        self.clear_error_for(Phase::Suggestions);
        let context = context::suggestion_context(
            &self.settings.facts,
            self.genre.as_deref(),
            &self.paragraphs,
        );
        Some(Effect::FetchSuggestions {
            ticket: self.lifecycle.begin(Phase::Suggestions),
            context,
            count: self.settings.suggestion_count,
            delay,
        })
    }

    /// `Idle → AwaitingGenre`: requests genre options.
    ///
    /// Calling it again while awaiting a genre, with no options offered and
    /// nothing in flight, re-requests the options.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::InvalidTransition` from any other state.
    pub fn start(&mut self, clock: &dyn Clock) -> Result<Vec<Effect>, StoryError> {
        match self.state {
            SessionState::Idle => {
                self.initialized = true;
                self.state = SessionState::AwaitingGenre;
                self.record(SessionEventKind::Started, clock);
                info!(session_id = %self.id, "story started");
                Ok(vec![self.request_genres()])
            }
            SessionState::AwaitingGenre
                if self.genre_options.is_empty() && !self.lifecycle.is_in_flight(Phase::Genre) =>
            {
                Ok(vec![self.request_genres()])
            }
            _ => Err(self.invalid("start")),
        }
    }

    /// Commits the genre at `index` and requests the opening paragraph.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::InvalidTransition` unless awaiting a genre, and
    /// `StoryError::IndexOutOfRange` if `index` is not an offered option.
    pub fn select_genre(
        &mut self,
        index: usize,
        clock: &dyn Clock,
    ) -> Result<Vec<Effect>, StoryError> {
        if self.state != SessionState::AwaitingGenre || self.genre.is_some() {
            return Err(self.invalid("select a genre"));
        }
        let Some(genre) = self.genre_options.get(index).cloned() else {
            return Err(StoryError::IndexOutOfRange {
                index,
                len: self.genre_options.len(),
            });
        };

        info!(session_id = %self.id, %genre, "genre selected");
        self.genre = Some(genre.clone());
        self.genre_options.clear();
        self.state = SessionState::GeneratingOpening;
        self.record(SessionEventKind::GenreSelected { genre }, clock);
        Ok(vec![self.request_opening()])
    }

    /// Picks the suggestion at `index`: clears the set, starts revealing the
    /// chosen text, and requests the next paragraph.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::InvalidTransition` unless suggestions are being
    /// awaited, and `StoryError::IndexOutOfRange` if `index` is not offered.
    pub fn select_option(
        &mut self,
        index: usize,
        clock: &dyn Clock,
    ) -> Result<Vec<Effect>, StoryError> {
        if self.state != SessionState::AwaitingSuggestions {
            return Err(self.invalid("select an option"));
        }
        let Some(choice) = self.suggestions.get(index).cloned() else {
            return Err(StoryError::IndexOutOfRange {
                index,
                len: self.suggestions.len(),
            });
        };

        debug!(session_id = %self.id, index, "option selected");
        self.suggestions.clear();
        self.reveal.enqueue_preface(&choice);
        self.state = SessionState::GeneratingContinuation;
        let effect = self.request_continuation(&choice);
        self.selection = Some(choice.clone());
        self.record(SessionEventKind::OptionSelected { text: choice }, clock);
        Ok(vec![effect])
    }

    /// Re-issues the request whose failure is recorded in `last_error`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::NothingToRetry` if no failure is pending for the
    /// current state.
    pub fn retry(&mut self) -> Result<Vec<Effect>, StoryError> {
        let Some(phase) = self.last_error.as_ref().map(|e| e.phase) else {
            return Err(StoryError::NothingToRetry);
        };
        if self.lifecycle.is_in_flight(phase) {
            return Err(StoryError::NothingToRetry);
        }

        let effect = match (phase, self.state) {
            (Phase::Genre, SessionState::AwaitingGenre) => Some(self.request_genres()),
            (Phase::Paragraph, SessionState::GeneratingOpening) => Some(self.request_opening()),
            (Phase::Paragraph, SessionState::GeneratingContinuation) => {
                let Some(choice) = self.selection.clone() else {
                    return Err(StoryError::NothingToRetry);
                };
                Some(self.request_continuation(&choice))
            }
            (Phase::Suggestions, SessionState::AwaitingSuggestions) => {
                self.request_suggestions(Duration::ZERO)
            }
            _ => None,
        };

        effect
            .map(|e| vec![e])
            .ok_or(StoryError::NothingToRetry)
    }

    /// Discards this play-through: cancels every outstanding request and
    /// replaces the session with a fresh, idle one under a new id.
    pub fn reset(&mut self, clock: &dyn Clock) {
        let previous_session_id = self.id;
        self.lifecycle.cancel_all();
        self.reveal.cancel();
        *self = Session::new(Uuid::new_v4(), self.settings.clone());
        info!(%previous_session_id, session_id = %self.id, "session reset");
        self.record(SessionEventKind::SessionReset { previous_session_id }, clock);
    }

    /// Applies a response. Stale responses are discarded before any state
    /// is read or written.
    pub fn apply(&mut self, response: Response, clock: &dyn Clock) -> Disposition {
        if !self.lifecycle.settle(response.ticket) {
            return Disposition::Discarded;
        }
        let phase = response.ticket.phase;

        let effects = match response.outcome {
            Outcome::Genres(Ok(genres)) => {
                if self.state == SessionState::AwaitingGenre && self.genre.is_none() {
                    self.genre_options.clone_from(&genres);
                    self.record(SessionEventKind::GenresOffered { genres }, clock);
                }
                Vec::new()
            }
            Outcome::Paragraph(Ok(text)) => {
                if matches!(
                    self.state,
                    SessionState::GeneratingOpening | SessionState::GeneratingContinuation
                ) {
                    self.append_paragraph(text, clock);
                }
                Vec::new()
            }
            Outcome::Suggestions(Ok(suggestions)) => {
                if self.state == SessionState::AwaitingSuggestions
                    && !self.story_complete
                    && self.selection.is_none()
                {
                    self.suggestions.clone_from(&suggestions);
                    self.record(SessionEventKind::SuggestionsOffered { suggestions }, clock);
                }
                Vec::new()
            }
            Outcome::Genres(Err(error))
            | Outcome::Paragraph(Err(error))
            | Outcome::Suggestions(Err(error)) => {
                self.fail(phase, &error, clock);
                Vec::new()
            }
        };

        Disposition::Applied(effects)
    }

    fn append_paragraph(&mut self, text: String, clock: &dyn Clock) {
        let index = self.paragraphs.len();
        self.reveal.enqueue(&text);
        self.paragraphs.push(text.clone());
        self.selection = None;
        self.state = SessionState::Revealing;
        debug!(session_id = %self.id, index, "paragraph appended");
        self.record(SessionEventKind::ParagraphAppended { index, text }, clock);
    }

    fn fail(&mut self, phase: Phase, error: &GenerationError, clock: &dyn Clock) {
        warn!(session_id = %self.id, %phase, %error, "generation request failed");
        let error = TurnError::new(phase, error);
        self.last_error = Some(error.clone());
        self.record(SessionEventKind::RequestFailed { error }, clock);
    }

    /// Advances the reveal by one token. When the reveal completes, either
    /// ends the story or requests suggestions after the settle delay.
    pub fn tick(&mut self, clock: &dyn Clock) -> Vec<Effect> {
        match self.reveal.tick() {
            RevealStep::Idle => Vec::new(),
            RevealStep::Revealed(token) => {
                self.record(SessionEventKind::FragmentRevealed { token }, clock);
                Vec::new()
            }
            RevealStep::Completed(last) => {
                if let Some(token) = last {
                    self.record(SessionEventKind::FragmentRevealed { token }, clock);
                }
                self.record(SessionEventKind::RevealCompleted, clock);
                self.on_reveal_complete(clock)
            }
        }
    }

    fn on_reveal_complete(&mut self, clock: &dyn Clock) -> Vec<Effect> {
        if self.state != SessionState::Revealing {
            return Vec::new();
        }

        if self.paragraphs.last().is_some_and(|p| context::is_terminal(p)) {
            info!(session_id = %self.id, paragraphs = self.paragraphs.len(), "story completed");
            self.story_complete = true;
            self.state = SessionState::Completed;
            self.record(SessionEventKind::StoryCompleted, clock);
            return Vec::new();
        }

        self.state = SessionState::AwaitingSuggestions;
        self.request_suggestions(self.settings.settle_delay)
            .into_iter()
            .collect()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether `start` has been called on this session.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The committed genre, once selected.
    #[must_use]
    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    /// Genre options awaiting a pick.
    #[must_use]
    pub fn genre_options(&self) -> &[String] {
        &self.genre_options
    }

    /// The story so far, oldest first.
    #[must_use]
    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    /// Suggestions awaiting a pick.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// The chosen suggestion whose follow-up paragraph is pending.
    #[must_use]
    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Text revealed so far across the whole play-through.
    #[must_use]
    pub fn revealed_text(&self) -> &str {
        self.reveal.visible()
    }

    /// Whether a reveal is in progress and the timer should tick. False
    /// while an echoed choice has been fully shown and its paragraph is
    /// still pending.
    #[must_use]
    pub fn is_revealing(&self) -> bool {
        self.reveal.needs_tick()
    }

    /// Whether the story reached its terminal sentinel.
    #[must_use]
    pub fn is_story_complete(&self) -> bool {
        self.story_complete
    }

    /// Whether options are on offer and the reader must pick one.
    #[must_use]
    pub fn is_awaiting_input(&self) -> bool {
        match self.state {
            SessionState::AwaitingGenre => !self.genre_options.is_empty(),
            SessionState::AwaitingSuggestions => !self.suggestions.is_empty(),
            _ => false,
        }
    }

    /// The most recent failure of a live request, if not yet retried.
    #[must_use]
    pub fn last_error(&self) -> Option<&TurnError> {
        self.last_error.as_ref()
    }

    /// The phase with a request in flight, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<Phase> {
        self.lifecycle.in_flight()
    }

    /// The story log as plain text, paragraphs separated by blank lines.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Events recorded since the last drain.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[SessionEvent] {
        &self.uncommitted_events
    }

    /// Removes and returns the recorded events.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use storyteller_core::message::{Message, Role};
    use storyteller_test_support::FixedClock;

    use crate::domain::context::TERMINAL_SENTINEL;
    use crate::domain::lifecycle::TicketId;
    use crate::domain::reveal::tokenize;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn new_session() -> Session {
        Session::new(Uuid::new_v4(), SessionSettings::default())
    }

    fn only(effects: Vec<Effect>) -> Effect {
        assert_eq!(effects.len(), 1, "expected exactly one effect");
        effects.into_iter().next().unwrap()
    }

    fn ticket_of(effect: &Effect) -> TicketId {
        effect.ticket().id()
    }

    fn applied(disposition: Disposition) -> Vec<Effect> {
        match disposition {
            Disposition::Applied(effects) => effects,
            Disposition::Discarded => panic!("expected response to be applied"),
        }
    }

    /// Ticks until the reveal stops; returns the ticks taken and the effects
    /// produced along the way.
    fn run_reveal(session: &mut Session, clock: &FixedClock) -> (usize, Vec<Effect>) {
        let mut ticks = 0;
        let mut effects = Vec::new();
        while session.is_revealing() {
            ticks += 1;
            effects.extend(session.tick(clock));
            assert!(ticks < 10_000, "reveal never finished");
        }
        (ticks, effects)
    }

    /// Drives a fresh session through genre selection and the opening
    /// paragraph; returns the pending suggestion effect.
    fn open_story(session: &mut Session, clock: &FixedClock, opening: &str) -> Effect {
        let genres = only(session.start(clock).unwrap());
        applied(session.apply(
            Response::new(
                ticket_of(&genres),
                Outcome::Genres(Ok(vec!["Mystery".into(), "Comedy".into()])),
            ),
            clock,
        ));
        let paragraph = only(session.select_genre(0, clock).unwrap());
        applied(session.apply(
            Response::new(ticket_of(&paragraph), Outcome::Paragraph(Ok(opening.into()))),
            clock,
        ));
        let (_, effects) = run_reveal(session, clock);
        only(effects)
    }

    fn offer(session: &mut Session, clock: &FixedClock, effect: &Effect, options: &[&str]) {
        applied(session.apply(
            Response::new(
                ticket_of(effect),
                Outcome::Suggestions(Ok(options.iter().map(|s| (*s).to_owned()).collect())),
            ),
            clock,
        ));
    }

    #[test]
    fn test_start_requests_genres_with_scenario_facts() {
        // Arrange
        let clock = clock();
        let mut session = new_session();

        // Act
        let effect = only(session.start(&clock).unwrap());

        // Assert
        assert_eq!(session.state(), SessionState::AwaitingGenre);
        assert!(session.is_initialized());
        match effect {
            Effect::FetchGenres { facts, count, .. } => {
                assert_eq!(facts, ScenarioFacts::default().messages());
                assert_eq!(count, 5);
            }
            other => panic!("expected FetchGenres, got {other:?}"),
        }
        assert_eq!(session.in_flight(), Some(Phase::Genre));
    }

    #[test]
    fn test_start_twice_is_rejected_while_genres_in_flight() {
        let clock = clock();
        let mut session = new_session();
        session.start(&clock).unwrap();

        let result = session.start(&clock);

        assert!(matches!(
            result,
            Err(StoryError::InvalidTransition { action: "start", .. })
        ));
    }

    #[test]
    fn test_select_genre_commits_genre_and_requests_opening() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let genres = only(session.start(&clock).unwrap());
        applied(session.apply(
            Response::new(
                ticket_of(&genres),
                Outcome::Genres(Ok(vec!["Mystery".into(), "Comedy".into()])),
            ),
            &clock,
        ));
        assert!(session.is_awaiting_input());

        // Act
        let effect = only(session.select_genre(0, &clock).unwrap());

        // Assert
        assert_eq!(session.genre(), Some("Mystery"));
        assert_eq!(session.state(), SessionState::GeneratingOpening);
        assert!(session.genre_options().is_empty());
        let Effect::FetchParagraph { context, .. } = effect else {
            panic!("expected FetchParagraph");
        };
        let mut expected = ScenarioFacts::default().messages();
        expected.push(Message::system(
            "the story should be written in the genre of Mystery",
        ));
        expected.push(Message::system("Write one or two sentences and then stop"));
        assert_eq!(context, expected);
    }

    #[test]
    fn test_select_genre_out_of_range_leaves_state_untouched() {
        let clock = clock();
        let mut session = new_session();
        let genres = only(session.start(&clock).unwrap());
        applied(session.apply(
            Response::new(ticket_of(&genres), Outcome::Genres(Ok(vec!["Noir".into()]))),
            &clock,
        ));

        let result = session.select_genre(3, &clock);

        assert!(matches!(
            result,
            Err(StoryError::IndexOutOfRange { index: 3, len: 1 })
        ));
        assert_eq!(session.state(), SessionState::AwaitingGenre);
        assert_eq!(session.genre(), None);
    }

    #[test]
    fn test_genre_can_only_be_selected_once() {
        let clock = clock();
        let mut session = new_session();
        let genres = only(session.start(&clock).unwrap());
        applied(session.apply(
            Response::new(
                ticket_of(&genres),
                Outcome::Genres(Ok(vec!["Mystery".into(), "Comedy".into()])),
            ),
            &clock,
        ));
        session.select_genre(0, &clock).unwrap();

        let result = session.select_genre(1, &clock);

        assert!(result.is_err());
        assert_eq!(session.genre(), Some("Mystery"));
    }

    #[test]
    fn test_terminal_paragraph_completes_story_without_suggestions() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let text = "The train rumbled on.\nThe End.";
        let genres = only(session.start(&clock).unwrap());
        applied(session.apply(
            Response::new(ticket_of(&genres), Outcome::Genres(Ok(vec!["Mystery".into()]))),
            &clock,
        ));
        let paragraph = only(session.select_genre(0, &clock).unwrap());

        // Act
        applied(session.apply(
            Response::new(ticket_of(&paragraph), Outcome::Paragraph(Ok(text.into()))),
            &clock,
        ));
        let (ticks, effects) = run_reveal(&mut session, &clock);

        // Assert
        assert_eq!(ticks, tokenize(text).len());
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::Completed);
        assert!(session.is_story_complete());
        assert_eq!(session.in_flight(), None);
        assert!(session.tick(&clock).is_empty());
        assert!(session.retry().is_err());
        assert!(session.select_option(0, &clock).is_err());
    }

    #[test]
    fn test_reveal_completion_schedules_suggestions_after_settle_delay() {
        let clock = clock();
        let mut session = new_session();

        let effect = open_story(&mut session, &clock, "The whistle blew.");

        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
        match effect {
            Effect::FetchSuggestions {
                context,
                count,
                delay,
                ..
            } => {
                assert_eq!(count, 3);
                assert_eq!(delay, SessionSettings::default().settle_delay);
                assert_eq!(
                    context.last().unwrap(),
                    &Message::assistant("The whistle blew.")
                );
            }
            other => panic!("expected FetchSuggestions, got {other:?}"),
        }
    }

    #[test]
    fn test_select_option_reveals_choice_before_paragraph_arrives() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let suggestions = open_story(&mut session, &clock, "The whistle blew.");
        offer(&mut session, &clock, &suggestions, &["a bell rings", "the lights die"]);
        session.drain_events();

        // Act
        let effect = only(session.select_option(1, &clock).unwrap());
        for _ in 0..3 {
            assert!(session.tick(&clock).is_empty());
        }
        let echoed = session.revealed_text().to_owned();
        // Drained, but the follow-up paragraph has not arrived yet.
        assert!(!session.is_revealing());
        assert!(session.tick(&clock).is_empty());
        assert!(session.tick(&clock).is_empty());
        applied(session.apply(
            Response::new(
                ticket_of(&effect),
                Outcome::Paragraph(Ok("Darkness swallowed the carriage.".into())),
            ),
            &clock,
        ));
        let (ticks, next) = run_reveal(&mut session, &clock);

        // Assert
        assert!(session.suggestions().is_empty());
        assert_eq!(session.selection(), None);
        assert!(echoed.ends_with("the lights die"));
        assert_eq!(ticks, 4);
        assert!(
            session
                .revealed_text()
                .ends_with("the lights die Darkness swallowed the carriage.")
        );
        let completions = session
            .uncommitted_events()
            .iter()
            .filter(|e| e.kind == SessionEventKind::RevealCompleted)
            .count();
        assert_eq!(completions, 1);
        assert_eq!(session.paragraphs().len(), 2);
        assert!(matches!(only(next), Effect::FetchSuggestions { .. }));
    }

    #[test]
    fn test_continuation_context_carries_choice_verbatim() {
        let clock = clock();
        let mut session = new_session();
        let suggestions = open_story(&mut session, &clock, "The whistle blew.");
        offer(&mut session, &clock, &suggestions, &["a bell rings", "the lights die"]);

        let effect = only(session.select_option(0, &clock).unwrap());

        let Effect::FetchParagraph { context, .. } = effect else {
            panic!("expected FetchParagraph");
        };
        assert_eq!(
            context.last().unwrap(),
            &Message::user("start the next sentence with: a bell rings")
        );
        assert_eq!(session.state(), SessionState::GeneratingContinuation);
    }

    #[test]
    fn test_long_story_context_stays_bounded_and_allows_conclusion() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let mut pending = open_story(&mut session, &clock, "Paragraph 1.");
        let mut contexts = Vec::new();

        // Act
        for turn in 2..=8 {
            offer(&mut session, &clock, &pending, &["go on", "stop", "wait"]);
            let effect = only(session.select_option(0, &clock).unwrap());
            let Effect::FetchParagraph { context, .. } = &effect else {
                panic!("expected FetchParagraph");
            };
            contexts.push((session.paragraphs().len(), context.clone()));
            let before = session.paragraphs().len();
            applied(session.apply(
                Response::new(
                    ticket_of(&effect),
                    Outcome::Paragraph(Ok(format!("Paragraph {turn}."))),
                ),
                &clock,
            ));
            assert_eq!(session.paragraphs().len(), before + 1);
            let (_, effects) = run_reveal(&mut session, &clock);
            pending = only(effects);
        }

        // Assert
        for (log_len, context) in &contexts {
            let content = context.iter().filter(|m| m.role == Role::Assistant).count();
            assert!(content <= 3);
            let may_conclude = context.iter().any(|m| m.content.contains(TERMINAL_SENTINEL));
            assert_eq!(may_conclude, *log_len > 5);
        }
        assert_eq!(session.paragraphs().len(), 8);
    }

    #[test]
    fn test_reset_discards_pending_suggestion_response() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let pending = open_story(&mut session, &clock, "The whistle blew.");
        let old_id = session.id;
        assert!(!pending.ticket().is_cancelled());

        // Act
        session.reset(&clock);
        let disposition = session.apply(
            Response::new(
                ticket_of(&pending),
                Outcome::Suggestions(Ok(vec!["late".into(), "too late".into(), "never".into()])),
            ),
            &clock,
        );

        // Assert
        assert!(matches!(disposition, Disposition::Discarded));
        assert!(pending.ticket().is_cancelled());
        assert_ne!(session.id, old_id);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.suggestions().is_empty());
        assert!(session.paragraphs().is_empty());
        assert_eq!(session.revealed_text(), "");
        assert!(!session.is_initialized());
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let clock = clock();
        let mut session = new_session();
        let mut pending = open_story(&mut session, &clock, "The whistle blew.");
        applied(session.apply(
            Response::new(
                ticket_of(&pending),
                Outcome::Suggestions(Err(GenerationError::NetworkFailure("timeout".into()))),
            ),
            &clock,
        ));
        let stale = pending.clone();
        pending = only(session.retry().unwrap());

        let disposition = session.apply(
            Response::new(ticket_of(&stale), Outcome::Suggestions(Ok(vec!["old".into()]))),
            &clock,
        );

        assert!(matches!(disposition, Disposition::Discarded));
        assert!(session.suggestions().is_empty());
        assert!(!pending.ticket().is_cancelled());
    }

    #[test]
    fn test_failed_opening_keeps_state_and_log_then_retries() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let genres = only(session.start(&clock).unwrap());
        applied(session.apply(
            Response::new(ticket_of(&genres), Outcome::Genres(Ok(vec!["Western".into()]))),
            &clock,
        ));
        let paragraph = only(session.select_genre(0, &clock).unwrap());

        // Act
        applied(session.apply(
            Response::new(
                ticket_of(&paragraph),
                Outcome::Paragraph(Err(GenerationError::NetworkFailure(
                    "connection reset".into(),
                ))),
            ),
            &clock,
        ));

        // Assert
        assert_eq!(session.state(), SessionState::GeneratingOpening);
        assert!(session.paragraphs().is_empty());
        let error = session.last_error().unwrap();
        assert_eq!(error.phase, Phase::Paragraph);
        assert_eq!(error.kind, "network_failure");

        let retried = only(session.retry().unwrap());
        assert!(matches!(retried, Effect::FetchParagraph { .. }));
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_failed_continuation_stops_reveal_and_retries_same_choice() {
        // Arrange
        let clock = clock();
        let mut session = new_session();
        let suggestions = open_story(&mut session, &clock, "The whistle blew.");
        offer(&mut session, &clock, &suggestions, &["a bell rings", "the lights die", "wait"]);
        let effect = only(session.select_option(0, &clock).unwrap());
        run_reveal(&mut session, &clock);

        // Act
        applied(session.apply(
            Response::new(
                ticket_of(&effect),
                Outcome::Paragraph(Err(GenerationError::NetworkFailure("timeout".into()))),
            ),
            &clock,
        ));
        let retried = only(session.retry().unwrap());

        // Assert
        assert_eq!(session.state(), SessionState::GeneratingContinuation);
        assert!(!session.is_revealing());
        assert!(session.revealed_text().ends_with("a bell rings"));
        let Effect::FetchParagraph { context, .. } = retried else {
            panic!("expected FetchParagraph");
        };
        assert_eq!(
            context.last().unwrap(),
            &Message::user("start the next sentence with: a bell rings")
        );
    }

    #[test]
    fn test_malformed_suggestions_surface_distinct_kind() {
        let clock = clock();
        let mut session = new_session();
        let pending = open_story(&mut session, &clock, "The whistle blew.");

        applied(session.apply(
            Response::new(
                ticket_of(&pending),
                Outcome::Suggestions(Err(GenerationError::MalformedResponse(
                    "no JSON array".into(),
                ))),
            ),
            &clock,
        ));

        assert_eq!(session.state(), SessionState::AwaitingSuggestions);
        assert!(session.suggestions().is_empty());
        assert_eq!(session.last_error().unwrap().kind, "malformed_response");
        match only(session.retry().unwrap()) {
            Effect::FetchSuggestions { delay, .. } => assert_eq!(delay, Duration::ZERO),
            other => panic!("expected FetchSuggestions, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_genre_fetch_can_be_restarted() {
        let clock = clock();
        let mut session = new_session();
        let genres = only(session.start(&clock).unwrap());
        applied(session.apply(
            Response::new(
                ticket_of(&genres),
                Outcome::Genres(Err(GenerationError::CredentialMissing)),
            ),
            &clock,
        ));

        let again = only(session.start(&clock).unwrap());

        assert!(matches!(again, Effect::FetchGenres { .. }));
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_events_carry_increasing_sequence_numbers() {
        let clock = clock();
        let mut session = new_session();
        open_story(&mut session, &clock, "One two.");

        let events = session.drain_events();

        assert_eq!(events[0].kind, SessionEventKind::Started);
        assert!(
            events
                .windows(2)
                .all(|w| w[1].metadata.sequence_number == w[0].metadata.sequence_number + 1)
        );
        assert!(events.iter().all(|e| e.metadata.session_id == session.id));
        assert!(session.uncommitted_events().is_empty());
    }

    #[test]
    fn test_transcript_joins_paragraphs_with_blank_lines() {
        let clock = clock();
        let mut session = new_session();
        let pending = open_story(&mut session, &clock, "First.");
        offer(&mut session, &clock, &pending, &["x", "y", "z"]);
        let effect = only(session.select_option(2, &clock).unwrap());
        applied(session.apply(
            Response::new(ticket_of(&effect), Outcome::Paragraph(Ok("Second.\n".into()))),
            &clock,
        ));

        assert_eq!(session.transcript(), "First.\n\nSecond.");
    }

    #[test]
    fn test_suggestion_count_is_clamped() {
        assert_eq!(
            SessionSettings::default().with_suggestion_count(1).suggestion_count,
            3
        );
        assert_eq!(
            SessionSettings::default().with_suggestion_count(25).suggestion_count,
            10
        );
    }
}
