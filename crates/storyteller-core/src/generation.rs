//! Text-generation capability.
//!
//! The remote service is a black box: given an ordered list of role-tagged
//! messages it returns text. Implementations parse that text into the typed
//! result of each capability and keep no state between calls.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::message::Message;

/// Smallest and largest suggestion set a turn may offer.
pub const SUGGESTION_RANGE: (usize, usize) = (3, 10);

/// The three request/response capabilities the narrative engine needs.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produces exactly `count` short genre labels, seeded only with the
    /// scenario system facts.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failure, an unparseable reply,
    /// or a reply with fewer than `count` usable labels.
    async fn generate_genres(
        &self,
        facts: &[Message],
        count: usize,
    ) -> Result<Vec<String>, GenerationError>;

    /// Produces up to `count` short continuation suggestions for `context`,
    /// never fewer than the lower bound of [`SUGGESTION_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failure, an unparseable reply,
    /// or a reply with too few usable suggestions.
    async fn generate_suggestions(
        &self,
        context: &[Message],
        count: usize,
    ) -> Result<Vec<String>, GenerationError>;

    /// Produces the next story paragraph for `context`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failure or an empty reply.
    async fn generate_paragraph(&self, context: &[Message]) -> Result<String, GenerationError>;
}
