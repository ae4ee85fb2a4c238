use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::triage::query::{SearchSettings, TimeRange};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_IMAP_SERVER: &str = "imap.gmail.com";
pub const DEFAULT_DRAFTS_MAILBOX: &str = "[Gmail]/Drafts";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub user_email: Option<String>,
    pub redirect_uri: Option<String>,
    pub imap_server: Option<String>,
    pub drafts_mailbox: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub triage: TriageConfig,
}

/// Settings for the OpenAI-compatible chat completions endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TriageConfig {
    /// Pause after each processed message, in milliseconds.
    pub pacing_ms: u64,
    pub time_range: TimeRange,
    pub max_results: u32,
    pub filter: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        let s = SearchSettings::default();
        Self {
            pacing_ms: 200,
            time_range: s.time_range,
            max_results: s.max_results,
            filter: s.filter,
        }
    }
}

impl TriageConfig {
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings::new(self.time_range, self.max_results, &self.filter)
    }
}

impl Config {
    pub fn user_email(&self) -> Result<String> {
        self.user_email
            .clone()
            .ok_or_else(|| anyhow::anyhow!("user_email not set in config"))
    }

    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
    }

    pub fn imap_server(&self) -> String {
        self.imap_server
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAP_SERVER.to_string())
    }

    pub fn drafts_mailbox(&self) -> String {
        self.drafts_mailbox
            .clone()
            .unwrap_or_else(|| DEFAULT_DRAFTS_MAILBOX.to_string())
    }

    fn template() -> Self {
        Self {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            user_email: Some("you@example.com".to_string()),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            imap_server: Some(DEFAULT_IMAP_SERVER.to_string()),
            drafts_mailbox: Some(DEFAULT_DRAFTS_MAILBOX.to_string()),
            llm: LlmConfig::default(),
            triage: TriageConfig::default(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("mail_triage");
    fs::create_dir_all(&p)?;
    Ok(p)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let tom = toml::to_string_pretty(&Config::template())?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} - edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s)?;
    Ok(cfg)
}
