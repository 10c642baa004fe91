//! Test generation clients — scripted and failing `GenerationClient`
//! implementations.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use storyteller_core::error::GenerationError;
use storyteller_core::generation::GenerationClient;
use storyteller_core::message::Message;
use tokio::sync::oneshot;

/// Which capability a call targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// `generate_genres`.
    Genres,
    /// `generate_suggestions`.
    Suggestions,
    /// `generate_paragraph`.
    Paragraph,
}

/// One call observed by [`ScriptedGenerationClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Which capability was invoked.
    pub capability: Capability,
    /// The messages it was given.
    pub messages: Vec<Message>,
    /// The requested count, for list capabilities.
    pub count: Option<usize>,
}

/// Releases a gated reply when the test decides it should arrive.
#[derive(Debug)]
pub struct Gate<T>(oneshot::Sender<Result<T, GenerationError>>);

impl<T> Gate<T> {
    /// Delivers `reply` to the waiting call. A call that was dropped in the
    /// meantime is ignored.
    pub fn release(self, reply: Result<T, GenerationError>) {
        let _ = self.0.send(reply);
    }
}

#[derive(Debug)]
enum Reply<T> {
    Ready(Result<T, GenerationError>),
    Gated(oneshot::Receiver<Result<T, GenerationError>>),
}

#[derive(Debug)]
struct Script<T>(Mutex<VecDeque<Reply<T>>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T> Script<T> {
    fn push(&self, reply: Result<T, GenerationError>) {
        self.0.lock().unwrap().push_back(Reply::Ready(reply));
    }

    fn gate(&self) -> Gate<T> {
        let (tx, rx) = oneshot::channel();
        self.0.lock().unwrap().push_back(Reply::Gated(rx));
        Gate(tx)
    }

    async fn next(&self) -> Result<T, GenerationError> {
        let reply = self.0.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(GenerationError::NetworkFailure("gate dropped".into()))),
            None => Err(GenerationError::NetworkFailure("no scripted reply".into())),
        }
    }
}

/// A generation client that replays scripted replies in order, per
/// capability, and records every call. Replies are either ready immediately
/// or held behind a [`Gate`] until the test releases them. An exhausted
/// script yields `NetworkFailure`.
#[derive(Debug, Default)]
pub struct ScriptedGenerationClient {
    genres: Script<Vec<String>>,
    suggestions: Script<Vec<String>>,
    paragraphs: Script<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl ScriptedGenerationClient {
    /// Creates a client with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an immediate genre reply.
    pub fn push_genres(&self, genres: &[&str]) {
        self.genres.push(Ok(strings(genres)));
    }

    /// Queues an immediate genre failure.
    pub fn push_genres_error(&self, error: GenerationError) {
        self.genres.push(Err(error));
    }

    /// Queues a genre reply released later through the returned gate.
    pub fn gate_genres(&self) -> Gate<Vec<String>> {
        self.genres.gate()
    }

    /// Queues an immediate suggestion reply.
    pub fn push_suggestions(&self, suggestions: &[&str]) {
        self.suggestions.push(Ok(strings(suggestions)));
    }

    /// Queues an immediate suggestion failure.
    pub fn push_suggestions_error(&self, error: GenerationError) {
        self.suggestions.push(Err(error));
    }

    /// Queues a suggestion reply released later through the returned gate.
    pub fn gate_suggestions(&self) -> Gate<Vec<String>> {
        self.suggestions.gate()
    }

    /// Queues an immediate paragraph reply.
    pub fn push_paragraph(&self, text: &str) {
        self.paragraphs.push(Ok(text.to_owned()));
    }

    /// Queues an immediate paragraph failure.
    pub fn push_paragraph_error(&self, error: GenerationError) {
        self.paragraphs.push(Err(error));
    }

    /// Queues a paragraph reply released later through the returned gate.
    pub fn gate_paragraph(&self) -> Gate<String> {
        self.paragraphs.gate()
    }

    /// Returns a snapshot of every call made so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the calls made to one capability.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls_to(&self, capability: Capability) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.capability == capability)
            .collect()
    }

    fn record(&self, capability: Capability, messages: &[Message], count: Option<usize>) {
        self.calls.lock().unwrap().push(RecordedCall {
            capability,
            messages: messages.to_vec(),
            count,
        });
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate_genres(
        &self,
        facts: &[Message],
        count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        self.record(Capability::Genres, facts, Some(count));
        self.genres.next().await
    }

    async fn generate_suggestions(
        &self,
        context: &[Message],
        count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        self.record(Capability::Suggestions, context, Some(count));
        self.suggestions.next().await
    }

    async fn generate_paragraph(&self, context: &[Message]) -> Result<String, GenerationError> {
        self.record(Capability::Paragraph, context, None);
        self.paragraphs.next().await
    }
}

/// A generation client that fails every call with the same error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingGenerationClient(pub GenerationError);

#[async_trait]
impl GenerationClient for FailingGenerationClient {
    async fn generate_genres(
        &self,
        _facts: &[Message],
        _count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        Err(self.0.clone())
    }

    async fn generate_suggestions(
        &self,
        _context: &[Message],
        _count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        Err(self.0.clone())
    }

    async fn generate_paragraph(&self, _context: &[Message]) -> Result<String, GenerationError> {
        Err(self.0.clone())
    }
}
