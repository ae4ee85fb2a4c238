use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::token_store;
use crate::config::{Config, config_dir};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const PLACEHOLDER_SUFFIX: &str = "YOUR_CLIENT_ID.apps.googleusercontent.com";

/// OAuth client registration used to talk to Google.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

/// Shape of the client-secret JSON downloaded from the Google console.
#[derive(Debug, Deserialize)]
struct SecretFile {
    installed: Option<SecretSection>,
    web: Option<SecretSection>,
}

#[derive(Debug, Deserialize)]
struct SecretSection {
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientCredentials {
    pub fn parse_secret_file(json: &str) -> Result<Self> {
        let file: SecretFile =
            serde_json::from_str(json).context("client secret file is not valid JSON")?;
        let section = file
            .installed
            .or(file.web)
            .ok_or_else(|| anyhow!("client secret file has neither an `installed` nor a `web` section"))?;
        if section.client_id.trim().is_empty() {
            return Err(anyhow!("client secret file has an empty client_id"));
        }
        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret.filter(|s| !s.is_empty()),
            auth_uri: section.auth_uri.unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
            token_uri: section.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
        })
    }

    fn from_config(cfg: &Config) -> Result<Option<Self>> {
        let client_id = cfg.client_id.trim();
        if client_id.is_empty() || client_id.ends_with(PLACEHOLDER_SUFFIX) {
            return Ok(None);
        }
        let client_secret = token_store::load_client_secret(client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());
        Ok(Some(Self {
            client_id: client_id.to_string(),
            client_secret,
            auth_uri: GOOGLE_AUTH_URL.to_string(),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
        }))
    }
}

pub fn secret_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("credentials.json"))
}

/// Find client credentials: the imported secret file wins over the config.
pub fn resolve(cfg: &Config) -> Result<Option<ClientCredentials>> {
    match read_secret_file(&secret_file_path()?)? {
        Some(creds) => Ok(Some(creds)),
        None => ClientCredentials::from_config(cfg),
    }
}

fn read_secret_file(path: &Path) -> Result<Option<ClientCredentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    ClientCredentials::parse_secret_file(&s)
        .map(Some)
        .with_context(|| {
            format!(
                "{} is not a usable client secret file; download it again from the Google \
                 Cloud console and run `mail_triage import-credentials <file>`",
                path.display()
            )
        })
}

/// Validate a downloaded secret file and copy it into the config dir.
pub fn import(source: &Path) -> Result<ClientCredentials> {
    let s = fs::read_to_string(source)
        .with_context(|| format!("cannot read {}", source.display()))?;
    let creds = ClientCredentials::parse_secret_file(&s)?;
    fs::write(secret_file_path()?, s)?;
    Ok(creds)
}
