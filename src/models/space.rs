//! Space governance modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Write protocol of a space.
///
/// Selected once per target space; every batch of a run uses the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceMode {
    /// Ungoverned personal space: batches are published directly.
    Personal,
    /// DAO space: batches go through propose, vote and execute.
    #[default]
    Governed,
}

impl GovernanceMode {
    /// Parses a mode string. Unknown values fall back to `Governed`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "personal" | "direct" | "ungoverned" => Self::Personal,
            _ => Self::Governed,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Governed => "governed",
        }
    }
}

impl fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
