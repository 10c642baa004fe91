//! Logical request phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three request categories, each with independent single-flight
/// semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fetching the list of genre options.
    Genre,
    /// Fetching the next story paragraph.
    Paragraph,
    /// Fetching continuation suggestions.
    Suggestions,
}

impl Phase {
    /// All phases, in a fixed order.
    pub const ALL: [Phase; 3] = [Phase::Genre, Phase::Paragraph, Phase::Suggestions];

    /// Stable lowercase name, used in logs and error payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Genre => "genre",
            Phase::Paragraph => "paragraph",
            Phase::Suggestions => "suggestions",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
