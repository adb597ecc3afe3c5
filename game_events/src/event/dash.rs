//! Dash event definitions.

use serde::Serialize;

pub const DEFAULT_CHARACTER: &str = "Player";

/// A dash performed by a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashEvent {
    pub character: String,
}

impl DashEvent {
    pub fn new(character: impl Into<String>) -> Self {
        Self {
            character: character.into(),
        }
    }
}

impl Default for DashEvent {
    fn default() -> Self {
        Self::new(DEFAULT_CHARACTER)
    }
}
