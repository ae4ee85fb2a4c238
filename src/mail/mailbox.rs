use anyhow::Result;

use crate::triage::model::{DraftRequest, RawMessage};

/// Acknowledgement that a draft now exists in the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftAck {
    pub mailbox: String,
}

/// The two mailbox primitives the triage pipeline relies on.
pub trait Mailbox {
    /// Messages matching a provider search query, newest first, at most
    /// `max_results` of them.
    fn search(&self, query: &str, max_results: u32) -> Result<Vec<RawMessage>>;

    fn create_draft(&self, draft: &DraftRequest) -> Result<DraftAck>;
}
