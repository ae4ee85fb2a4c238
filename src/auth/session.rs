use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::client_secret::{self, ClientCredentials};
use crate::auth::{TokenSource, oauth, token_store, tokens_file};
use crate::config::Config;

/// Assumed lifetime when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3500;

/// Something only the user can resolve before the mailbox is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// No OAuth client registration is available.
    ProvideCredentials,
    /// No token yet; the user must grant consent in a browser.
    Consent,
    /// The stored token was rejected and has been discarded.
    Reauthenticate { reason: String },
}

impl UserAction {
    pub fn remediation(&self) -> String {
        match self {
            Self::ProvideCredentials => "No OAuth client credentials found. Download the client \
                 secret JSON from the Google Cloud console and run \
                 `mail_triage import-credentials <file>`, or set client_id in the config."
                .to_string(),
            Self::Consent => {
                "Mailbox access has not been granted yet. Run `mail_triage auth`.".to_string()
            }
            Self::Reauthenticate { reason } => format!(
                "Authentication token expired or was revoked ({reason}). \
                 Run `mail_triage auth` to authenticate again."
            ),
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.remediation())
    }
}

pub enum SessionOutcome {
    Ready(Session),
    NeedsUserAction(UserAction),
}

/// What `obtain_session` should do given what is stored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    UseCached,
    Refresh,
    Consent,
    AskForConsent,
}

fn plan(cached_valid: bool, has_refresh: bool, interactive: bool) -> Step {
    match (cached_valid, has_refresh, interactive) {
        (true, ..) => Step::UseCached,
        (false, true, _) => Step::Refresh,
        (false, false, true) => Step::Consent,
        (false, false, false) => Step::AskForConsent,
    }
}

fn now_epoch() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

fn store_tokens(user_email: &str, t: &oauth::Tokens) -> Result<()> {
    if let Some(rt) = &t.refresh_token
        && let Err(e) = token_store::save_refresh_token(user_email, rt)
    {
        log::warn!("could not store refresh token in keyring: {e}");
    }
    let now = now_epoch()?;
    let exp = t
        .expires_in
        .map(|s| now + s as i64)
        .unwrap_or(now + DEFAULT_TOKEN_LIFETIME_SECS);
    tokens_file::save_tokens(Some(&t.access_token), Some(exp))
}

/// Drop every stored token for the user.
fn invalidate(user_email: &str) -> Result<()> {
    token_store::forget_refresh_token(user_email)?;
    tokens_file::clear_tokens()
}

pub struct Authenticator {
    credentials: Option<ClientCredentials>,
    redirect_uri: String,
    user_email: String,
}

impl Authenticator {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self {
            credentials: client_secret::resolve(cfg)?,
            redirect_uri: cfg.redirect_uri(),
            user_email: cfg.user_email()?,
        })
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// Produce a usable session, or say what the user has to do first.
    ///
    /// With `interactive` set, missing or rejected tokens start the browser
    /// consent flow instead of returning [`UserAction::Consent`].
    pub fn obtain_session(&self, interactive: bool) -> Result<SessionOutcome> {
        let Some(creds) = self.credentials.as_ref() else {
            return Ok(SessionOutcome::NeedsUserAction(UserAction::ProvideCredentials));
        };

        let now = now_epoch()?;
        let cached_valid = tokens_file::load_tokens()?
            .is_some_and(|tf| tf.valid_access_token(now).is_some());
        let refresh_token = token_store::load_refresh_token(&self.user_email)?;

        let step = plan(cached_valid, refresh_token.is_some(), interactive);
        log::debug!("session step: {step:?}");

        match step {
            Step::UseCached => Ok(SessionOutcome::Ready(self.session(creds))),
            Step::AskForConsent => Ok(SessionOutcome::NeedsUserAction(UserAction::Consent)),
            Step::Consent => self.consent(creds),
            Step::Refresh => {
                let rt = refresh_token.unwrap_or_default();
                match oauth::refresh_access_token(creds, &rt) {
                    Ok(t) => {
                        store_tokens(&self.user_email, &t)?;
                        Ok(SessionOutcome::Ready(self.session(creds)))
                    }
                    Err(e) => {
                        log::warn!("refresh failed, discarding stored tokens: {e:#}");
                        invalidate(&self.user_email)?;
                        if interactive {
                            self.consent(creds)
                        } else {
                            Ok(SessionOutcome::NeedsUserAction(UserAction::Reauthenticate {
                                reason: format!("{e:#}"),
                            }))
                        }
                    }
                }
            }
        }
    }

    fn consent(&self, creds: &ClientCredentials) -> Result<SessionOutcome> {
        let t = oauth::perform_pkce_flow(creds, &self.redirect_uri)
            .context("authentication failed; run `mail_triage auth` to try again")?;
        if t.refresh_token.is_none() {
            log::warn!("provider returned no refresh token; consent will be needed again");
        }
        store_tokens(&self.user_email, &t)?;
        log::info!("authenticated {}", self.user_email);
        Ok(SessionOutcome::Ready(self.session(creds)))
    }

    fn session(&self, creds: &ClientCredentials) -> Session {
        Session {
            credentials: creds.clone(),
            user_email: self.user_email.clone(),
        }
    }

    pub fn logout(&self) -> Result<()> {
        invalidate(&self.user_email)
    }
}

/// An authenticated mailbox user. Hands out fresh access tokens on demand.
#[derive(Clone)]
pub struct Session {
    credentials: ClientCredentials,
    user_email: String,
}

impl Session {
    pub fn user_email(&self) -> &str {
        &self.user_email
    }
}

impl TokenSource for Session {
    fn access_token(&self) -> Result<String> {
        let now = now_epoch()?;
        if let Some(tf) = tokens_file::load_tokens()?
            && let Some(at) = tf.valid_access_token(now)
        {
            return Ok(at.to_string());
        }

        let rt = token_store::load_refresh_token(&self.user_email)?.ok_or_else(|| {
            anyhow!("{}", UserAction::Consent.remediation())
        })?;
        match oauth::refresh_access_token(&self.credentials, &rt) {
            Ok(t) => {
                store_tokens(&self.user_email, &t)?;
                Ok(t.access_token)
            }
            Err(e) => {
                invalidate(&self.user_email)?;
                let action = UserAction::Reauthenticate {
                    reason: format!("{e:#}"),
                };
                Err(anyhow!("{}", action.remediation()))
            }
        }
    }
}
