pub mod auth;
pub mod config;
pub mod llm;
pub mod mail;
pub mod terminal;
pub mod triage;
