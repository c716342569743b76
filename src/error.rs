// Typed errors with thiserror. Surfaced to JS as strings at the wasm boundary only.

use thiserror::Error;

use crate::types::{PlayerId, SectionId};

/// Site error types.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Page has no sections")]
    EmptySectionList,

    #[error("Duplicate section id: {0}")]
    DuplicateSection(SectionId),

    #[error("Unknown section: {0}")]
    UnknownSection(SectionId),

    #[error("Unknown video player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("Playback rejected for {player}: {reason}")]
    Playback { player: PlayerId, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Browser call failed: {0}")]
    Js(String),
}

impl From<serde_json::Error> for SiteError {
    fn from(err: serde_json::Error) -> Self {
        SiteError::Serialization(err.to_string())
    }
}

/// Why a transition request was refused. State is untouched in every case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("a transition is already in flight")]
    Busy,

    #[error("no section at index {0}")]
    UnknownTarget(usize),

    #[error("section at index {0} is already current")]
    AlreadyCurrent(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SiteError::UnknownSection(SectionId::new("about"));
        assert!(err.to_string().contains("about"));

        let err = SiteError::Playback {
            player: PlayerId::new(2),
            reason: "NotAllowedError".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Playback rejected for player-2: NotAllowedError"
        );
    }
}
