pub mod chat;

use anyhow::Result;

pub use chat::ChatClient;

/// A stateless text-completion backend: one request, one response.
pub trait LanguageModel {
    fn complete(&self, system: &str, user: &str) -> Result<String>;
}
