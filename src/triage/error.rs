use thiserror::Error;

use crate::triage::model::Judgment;

/// Failures the triage pipeline distinguishes between.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("mailbox search failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("could not clean message body: {0:#}")]
    Clean(anyhow::Error),

    #[error("{judgment} judgment failed: {cause:#}")]
    Judgment {
        judgment: Judgment,
        cause: anyhow::Error,
    },

    #[error("email is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("draft creation failed: {0:#}")]
    Draft(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TriageError>;
