//! Progressive ("typewriter") reveal of generated text.
//!
//! A block of text is split into word tokens and explicit paragraph breaks.
//! Each timer tick moves exactly one token from the queue into the visible
//! accumulator. The owner drives the ticks; this type never sleeps.

use std::collections::VecDeque;

use serde::Serialize;

/// One unit of reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum RevealToken {
    /// A whitespace-delimited word, punctuation included.
    Word(String),
    /// A literal newline in the source text.
    Break,
}

/// Splits `text` into reveal tokens. Each `\n` becomes one [`RevealToken::Break`].
#[must_use]
pub fn tokenize(text: &str) -> Vec<RevealToken> {
    let mut tokens = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            tokens.push(RevealToken::Break);
        }
        tokens.extend(line.split_whitespace().map(|w| RevealToken::Word(w.to_owned())));
    }
    tokens
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    /// A token became visible and the sequence continues.
    Revealed(RevealToken),
    /// The sequence finished on this tick. Carries the final token, or
    /// `None` when the follow-up block that released a hold was empty.
    Completed(Option<RevealToken>),
    /// Nothing to reveal: either idle, or drained while a follow-up block
    /// is still expected.
    Idle,
}

/// Queue of pending tokens plus the text revealed so far.
#[derive(Debug)]
pub struct RevealQueue {
    queue: VecDeque<RevealToken>,
    visible: String,
    /// A sequence has started and its completion has not been signalled.
    active: bool,
    /// More text is expected for the current sequence; draining the queue
    /// must not complete it.
    held: bool,
    at_line_start: bool,
}

impl RevealQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            visible: String::new(),
            active: false,
            held: false,
            at_line_start: true,
        }
    }

    /// Appends `text` to the current sequence, or starts a new one. Releases
    /// any hold placed by [`RevealQueue::enqueue_preface`].
    pub fn enqueue(&mut self, text: &str) {
        self.push_block(text);
        self.held = false;
    }

    /// Appends `text` and holds the sequence open until the next
    /// [`RevealQueue::enqueue`], so the reveal does not complete between a
    /// preface and its follow-up block.
    pub fn enqueue_preface(&mut self, text: &str) {
        self.push_block(text);
        self.held = true;
    }

    fn push_block(&mut self, text: &str) {
        if !self.active && !self.visible.is_empty() {
            // New sequence: separate it from what is already on screen.
            self.visible.push_str("\n\n");
            self.at_line_start = true;
        }
        self.queue.extend(tokenize(text));
        self.active = true;
    }

    /// Advances the reveal by one token.
    pub fn tick(&mut self) -> RevealStep {
        if !self.active {
            return RevealStep::Idle;
        }

        let Some(token) = self.queue.pop_front() else {
            if self.held {
                return RevealStep::Idle;
            }
            self.active = false;
            return RevealStep::Completed(None);
        };

        self.show(&token);

        if self.queue.is_empty() && !self.held {
            self.active = false;
            RevealStep::Completed(Some(token))
        } else {
            RevealStep::Revealed(token)
        }
    }

    fn show(&mut self, token: &RevealToken) {
        match token {
            RevealToken::Word(word) => {
                if !self.at_line_start {
                    self.visible.push(' ');
                }
                self.visible.push_str(word);
                self.at_line_start = false;
            }
            RevealToken::Break => {
                self.visible.push('\n');
                self.at_line_start = true;
            }
        }
    }

    /// Drops all pending tokens without signalling completion.
    pub fn cancel(&mut self) {
        self.queue.clear();
        self.active = false;
        self.held = false;
    }

    /// Whether a sequence has started and not yet completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the timer should keep ticking: tokens are queued, or a
    /// completion is still to be signalled. A held, drained sequence has
    /// nothing to tick until its follow-up block arrives.
    #[must_use]
    pub fn needs_tick(&self) -> bool {
        self.active && !(self.held && self.queue.is_empty())
    }

    /// Whether the current sequence is waiting for a follow-up block.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Number of tokens still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Text revealed so far.
    #[must_use]
    pub fn visible(&self) -> &str {
        &self.visible
    }
}

impl Default for RevealQueue {
    fn default() -> Self {
        Self::new()
    }
}
