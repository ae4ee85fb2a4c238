pub mod client_secret;
pub mod oauth;
pub mod session;
pub mod token_store;
pub mod tokens_file;

use anyhow::Result;

pub use session::{Authenticator, Session, SessionOutcome, UserAction};

/// Supplies a bearer token for the mailbox connection.
pub trait TokenSource {
    fn access_token(&self) -> Result<String>;
}
