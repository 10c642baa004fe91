//! Message context builder.
//!
//! Every request gets a freshly built, bounded message sequence. The order of
//! the sections is fixed: scenario facts, genre, system directives, prior
//! story content, user directive. The generation service relies on that
//! order for coherent output.

use storyteller_core::message::Message;

/// Number of most recent paragraphs echoed back as story context. Older
/// paragraphs stay in the log but are never sent.
pub const CONTEXT_WINDOW: usize = 3;

/// Once the log holds more than this many paragraphs, the generator is
/// allowed to close the story.
pub const CONCLUSION_THRESHOLD: usize = 5;

/// Literal marker the generator writes to end the story.
pub const TERMINAL_SENTINEL: &str = "The End.";

const BREVITY_DIRECTIVE: &str = "Write one or two sentences and then stop";

/// The fixed scenario facts every request starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFacts(Vec<String>);

impl ScenarioFacts {
    /// Creates a custom scenario.
    #[must_use]
    pub fn new<I, S>(facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(facts.into_iter().map(Into::into).collect())
    }

    /// The facts as `system` messages, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.0.iter().map(Message::system).collect()
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the scenario has no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ScenarioFacts {
    fn default() -> Self {
        Self::new([
            "you will assist me in creating a story",
            "the story should take place on a train",
            "the main character of the story is a train conductor",
        ])
    }
}

/// Extra instructions appended to a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Keep the paragraph short.
    Brevity,
    /// The story may end now, marked by [`TERMINAL_SENTINEL`].
    MayConclude,
    /// The next sentence must start with the reader's chosen text.
    ContinueWith(String),
}

impl Directive {
    fn is_user(&self) -> bool {
        matches!(self, Directive::ContinueWith(_))
    }

    fn to_message(&self) -> Message {
        match self {
            Directive::Brevity => Message::system(BREVITY_DIRECTIVE),
            Directive::MayConclude => Message::system(format!(
                "if the story has reached a natural ending, finish it with the words: {TERMINAL_SENTINEL}"
            )),
            Directive::ContinueWith(choice) => {
                Message::user(format!("start the next sentence with: {choice}"))
            }
        }
    }
}

/// Builds the message sequence for one request.
///
/// `paragraphs` is the full story log; only the last [`CONTEXT_WINDOW`]
/// entries are included, one `assistant` message each.
#[must_use]
pub fn build_context(
    facts: &ScenarioFacts,
    genre: Option<&str>,
    paragraphs: &[String],
    directives: &[Directive],
) -> Vec<Message> {
    let mut messages = facts.messages();

    if let Some(genre) = genre {
        messages.push(Message::system(format!(
            "the story should be written in the genre of {genre}"
        )));
    }

    messages.extend(
        directives
            .iter()
            .filter(|d| !d.is_user())
            .map(Directive::to_message),
    );

    let start = paragraphs.len().saturating_sub(CONTEXT_WINDOW);
    messages.extend(paragraphs[start..].iter().map(Message::assistant));

    messages.extend(
        directives
            .iter()
            .filter(|d| d.is_user())
            .map(Directive::to_message),
    );

    messages
}

/// Context for the first paragraph: system content only.
#[must_use]
pub fn opening_context(facts: &ScenarioFacts, genre: Option<&str>) -> Vec<Message> {
    build_context(facts, genre, &[], &[Directive::Brevity])
}

/// Context for a continuation turn after the reader picked `choice`.
#[must_use]
pub fn continuation_context(
    facts: &ScenarioFacts,
    genre: Option<&str>,
    paragraphs: &[String],
    choice: &str,
) -> Vec<Message> {
    let mut directives = vec![Directive::Brevity];
    if paragraphs.len() > CONCLUSION_THRESHOLD {
        directives.push(Directive::MayConclude);
    }
    directives.push(Directive::ContinueWith(choice.to_owned()));
    build_context(facts, genre, paragraphs, &directives)
}

/// Context for a suggestion request. The client appends its own
/// instruction after this.
#[must_use]
pub fn suggestion_context(
    facts: &ScenarioFacts,
    genre: Option<&str>,
    paragraphs: &[String],
) -> Vec<Message> {
    build_context(facts, genre, paragraphs, &[])
}

/// Literal suffix match against [`TERMINAL_SENTINEL`], ignoring trailing
/// whitespace only.
#[must_use]
pub fn is_terminal(paragraph: &str) -> bool {
    paragraph.trim_end().ends_with(TERMINAL_SENTINEL)
}
