use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;

/// Seconds of validity we refuse to rely on before the recorded expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Access token cache stored at a fixed location:
/// `~/.config/mail_triage/token.json`. The refresh token lives in the keyring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensFile {
    pub access_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

impl TokensFile {
    /// The cached access token, if it is still valid at `now`.
    pub fn valid_access_token(&self, now: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now + EXPIRY_SKEW_SECS < exp => Some(at.as_str()),
            _ => None,
        }
    }
}

pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("token.json"))
}

pub fn save_tokens(access_token: Option<&str>, expires_at_epoch: Option<i64>) -> Result<()> {
    save_tokens_at(&tokens_path()?, access_token, expires_at_epoch)
}

pub fn load_tokens() -> Result<Option<TokensFile>> {
    load_tokens_at(&tokens_path()?)
}

/// Remove the cache so the next session starts clean.
pub fn clear_tokens() -> Result<()> {
    clear_tokens_at(&tokens_path()?)
}

fn save_tokens_at(p: &Path, access_token: Option<&str>, expires_at_epoch: Option<i64>) -> Result<()> {
    let tf = TokensFile {
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    let s = serde_json::to_string_pretty(&tf)?;
    fs::write(p, s)?;
    Ok(())
}

fn load_tokens_at(p: &Path) -> Result<Option<TokensFile>> {
    if !p.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(p)?;
    // an unreadable cache is as good as none
    match serde_json::from_str(&s) {
        Ok(tf) => Ok(Some(tf)),
        Err(e) => {
            log::warn!("ignoring unreadable token cache {}: {e}", p.display());
            Ok(None)
        }
    }
}

fn clear_tokens_at(p: &Path) -> Result<()> {
    if p.exists() {
        fs::remove_file(p)?;
    }
    Ok(())
}
