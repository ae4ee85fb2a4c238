pub mod decoders;
pub mod imap_client;
pub mod mailbox;

pub use imap_client::GmailImap;
pub use mailbox::{DraftAck, Mailbox};
