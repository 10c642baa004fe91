//! The story engine: a single event-loop task that owns one [`Session`].
//!
//! View commands, generation responses and reveal ticks are the only inputs,
//! and they are handled one at a time, so session transitions never
//! interleave. Outbound requests run in their own tasks and report back
//! through a channel tagged with their ticket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use storyteller_core::clock::Clock;
use storyteller_core::error::StoryError;
use storyteller_core::generation::GenerationClient;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::config::EngineConfig;
use crate::application::query_handlers::SessionView;
use crate::domain::aggregates::{Disposition, Session};
use crate::domain::effects::{Effect, Outcome, Response};
use crate::domain::events::SessionEvent;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, StoryError>>;

#[derive(Debug)]
enum Command {
    Start(Reply<SessionView>),
    SelectGenre(usize, Reply<SessionView>),
    SelectOption(usize, Reply<SessionView>),
    Retry(Reply<SessionView>),
    Reset(Reply<SessionView>),
    Transcript(Reply<String>),
}

/// Counters shared between the event loop and its handles.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    stale_discards: Arc<AtomicU64>,
}

impl EngineStats {
    /// Responses dropped because their request had been cancelled or
    /// superseded.
    #[must_use]
    pub fn stale_discards(&self) -> u64 {
        self.stale_discards.load(Ordering::Relaxed)
    }

    fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable handle to a running engine.
///
/// The loop stops when every handle is dropped or [`EngineHandle::shutdown`]
/// is called; outstanding requests are cancelled either way.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionView>,
    events: broadcast::Sender<SessionEvent>,
    stats: EngineStats,
    shutdown: CancellationToken,
}

impl EngineHandle {
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, StoryError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| StoryError::EngineStopped)?;
        rx.await.map_err(|_| StoryError::EngineStopped)?
    }

    /// Starts the play-through, or re-requests genres after a failed fetch.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::InvalidTransition` if already started, or
    /// `StoryError::EngineStopped` if the loop has exited.
    pub async fn start(&self) -> Result<SessionView, StoryError> {
        self.call(Command::Start).await
    }

    /// Commits the genre at `index`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::IndexOutOfRange` or `StoryError::InvalidTransition`
    /// without changing the session, or `StoryError::EngineStopped`.
    pub async fn select_genre(&self, index: usize) -> Result<SessionView, StoryError> {
        self.call(|reply| Command::SelectGenre(index, reply)).await
    }

    /// Picks the suggestion at `index`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::IndexOutOfRange` or `StoryError::InvalidTransition`
    /// without changing the session, or `StoryError::EngineStopped`.
    pub async fn select_option(&self, index: usize) -> Result<SessionView, StoryError> {
        self.call(|reply| Command::SelectOption(index, reply)).await
    }

    /// Re-issues the most recent failed request.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::NothingToRetry` if nothing failed, or
    /// `StoryError::EngineStopped`.
    pub async fn retry(&self) -> Result<SessionView, StoryError> {
        self.call(Command::Retry).await
    }

    /// Replaces the session with a fresh one; in-flight responses for the
    /// old session are discarded when they arrive.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::EngineStopped` if the loop has exited.
    pub async fn reset(&self) -> Result<SessionView, StoryError> {
        self.call(Command::Reset).await
    }

    /// The story log as plain text.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::EngineStopped` if the loop has exited.
    pub async fn transcript(&self) -> Result<String, StoryError> {
        self.call(Command::Transcript).await
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionView {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.snapshots.clone()
    }

    /// A receiver for domain events recorded from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Engine counters.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Stops the event loop. Later commands fail with
    /// `StoryError::EngineStopped`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether the event loop is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.commands.is_closed()
    }
}

/// The event loop that owns a session.
pub struct StoryEngine {
    session: Session,
    client: Arc<dyn GenerationClient>,
    clock: Arc<dyn Clock>,
    responses: mpsc::UnboundedSender<Response>,
    snapshots: watch::Sender<SessionView>,
    events: broadcast::Sender<SessionEvent>,
    stats: EngineStats,
}

impl StoryEngine {
    /// Spawns an engine with a fresh idle session on the current runtime.
    #[must_use]
    pub fn spawn(
        client: Arc<dyn GenerationClient>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> EngineHandle {
        let session = Session::new(Uuid::new_v4(), config.session);
        info!(session_id = %session.id, "story engine started");

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionView::of(&session));
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let stats = EngineStats::default();
        let shutdown = CancellationToken::new();

        let engine = Self {
            session,
            client,
            clock,
            responses: response_tx,
            snapshots: snapshot_tx,
            events: event_tx.clone(),
            stats: stats.clone(),
        };
        tokio::spawn(engine.run(
            command_rx,
            response_rx,
            config.reveal_tick.max(Duration::from_millis(1)),
            shutdown.clone(),
        ));

        EngineHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx,
            stats,
            shutdown,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut responses: mpsc::UnboundedReceiver<Response>,
        reveal_tick: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(reveal_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut was_revealing = false;

        loop {
            let revealing = self.session.is_revealing();
            if revealing && !was_revealing {
                // First token lands one full tick after the reveal begins.
                ticker.reset();
            }
            was_revealing = revealing;

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(response) = responses.recv() => self.on_response(response),
                _ = ticker.tick(), if revealing => self.on_tick(),
            }
        }

        info!(session_id = %self.session.id, "story engine stopped");
        // Dropping the session cancels every outstanding request.
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self.session.start(self.clock.as_ref());
                self.finish(result, reply);
            }
            Command::SelectGenre(index, reply) => {
                let result = self.session.select_genre(index, self.clock.as_ref());
                self.finish(result, reply);
            }
            Command::SelectOption(index, reply) => {
                let result = self.session.select_option(index, self.clock.as_ref());
                self.finish(result, reply);
            }
            Command::Retry(reply) => {
                let result = self.session.retry();
                self.finish(result, reply);
            }
            Command::Reset(reply) => {
                self.session.reset(self.clock.as_ref());
                self.finish(Ok(Vec::new()), reply);
            }
            Command::Transcript(reply) => {
                let _ = reply.send(Ok(self.session.transcript()));
            }
        }
    }

    fn finish(&mut self, result: Result<Vec<Effect>, StoryError>, reply: Reply<SessionView>) {
        let result = result.map(|effects| {
            self.dispatch(effects);
            self.publish()
        });
        let _ = reply.send(result);
    }

    fn on_response(&mut self, response: Response) {
        match self.session.apply(response, self.clock.as_ref()) {
            Disposition::Applied(effects) => {
                self.dispatch(effects);
                self.publish();
            }
            Disposition::Discarded => self.stats.record_stale_discard(),
        }
    }

    fn on_tick(&mut self) {
        let effects = self.session.tick(self.clock.as_ref());
        self.dispatch(effects);
        self.publish();
    }

    fn publish(&mut self) -> SessionView {
        for event in self.session.drain_events() {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        let view = SessionView::of(&self.session);
        self.snapshots.send_replace(view.clone());
        view
    }

    fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            let client = Arc::clone(&self.client);
            let responses = self.responses.clone();
            tokio::spawn(perform(client, effect, responses));
        }
    }
}

/// Carries out one effect. A settle delay is raced against cancellation so
/// a cancelled request is never issued; once issued, the call runs to
/// completion and its result is always reported.
async fn perform(
    client: Arc<dyn GenerationClient>,
    effect: Effect,
    responses: mpsc::UnboundedSender<Response>,
) {
    let ticket = effect.ticket().clone();
    let delay = match &effect {
        Effect::FetchSuggestions { delay, .. } => *delay,
        Effect::FetchGenres { .. } | Effect::FetchParagraph { .. } => Duration::ZERO,
    };

    if !delay.is_zero() {
        tokio::select! {
            () = ticket.token().cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }
    if ticket.is_cancelled() {
        debug!(phase = %ticket.phase(), request_id = %ticket.id().request_id, "request cancelled before issue");
        return;
    }

    let outcome = match effect {
        Effect::FetchGenres { facts, count, .. } => {
            Outcome::Genres(client.generate_genres(&facts, count).await)
        }
        Effect::FetchParagraph { context, .. } => {
            Outcome::Paragraph(client.generate_paragraph(&context).await)
        }
        Effect::FetchSuggestions { context, count, .. } => {
            Outcome::Suggestions(client.generate_suggestions(&context, count).await)
        }
    };

    // The loop may already have exited.
    let _ = responses.send(Response::new(ticket.id(), outcome));
}
