use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use imap::types::Flag;
use mailparse::MailHeaderMap;
use native_tls::TlsConnector;

use crate::auth::TokenSource;
use crate::mail::decoders::decode_mime_words;
use crate::mail::mailbox::{DraftAck, Mailbox};
use crate::triage::model::{DraftRequest, RawMessage};

type ImapSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

/// Build canonical auth string as bytes.
fn build_xoauth2_bytes(user: &str, access_token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {access_token}\x01\x01").into_bytes()
}

struct OAuth2Authenticator {
    response: Vec<u8>,
}

impl imap::Authenticator for OAuth2Authenticator {
    type Response = Vec<u8>;
    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}

/// Gmail reached over IMAP with XOAUTH2. Searches use Gmail's own query
/// syntax through the `X-GM-RAW` extension.
pub struct GmailImap<T> {
    server: String,
    user: String,
    drafts_mailbox: String,
    tokens: T,
}

impl<T: TokenSource> GmailImap<T> {
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        drafts_mailbox: impl Into<String>,
        tokens: T,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            drafts_mailbox: drafts_mailbox.into(),
            tokens,
        }
    }

    fn connect_and_auth(&self) -> Result<ImapSession> {
        let access_token = self.tokens.access_token()?;
        let tls = TlsConnector::builder().build()?;
        let mut client = imap::connect((self.server.as_str(), 993), self.server.as_str(), &tls)
            .with_context(|| format!("cannot connect to {}:993", self.server))?;

        let raw_payload = build_xoauth2_bytes(&self.user, &access_token);

        // Try RAW first
        let auth_raw = OAuth2Authenticator {
            response: raw_payload.clone(),
        };
        match client.authenticate("XOAUTH2", &auth_raw) {
            Ok(session) => return Ok(session),
            Err((e, returned_client)) => {
                log::debug!("XOAUTH2 with raw payload rejected: {e}");
                client = returned_client;
            }
        }

        // Fallback BASE64
        let auth_b64 = OAuth2Authenticator {
            response: general_purpose::STANDARD.encode(&raw_payload).into_bytes(),
        };
        match client.authenticate("XOAUTH2", &auth_b64) {
            Ok(session) => Ok(session),
            Err((e, _)) => Err(anyhow!("XOAUTH2 failed (raw+base64): {e}")),
        }
    }

    fn fetch_message(session: &mut ImapSession, uid: u32) -> Result<Option<RawMessage>> {
        // PEEK keeps the message unread
        let fetches = session.uid_fetch(uid.to_string(), "(UID ENVELOPE BODY.PEEK[])")?;
        let Some(f) = fetches.iter().next() else {
            log::warn!("UID {uid} vanished between search and fetch");
            return Ok(None);
        };

        let envelope = f.envelope();
        let envelope_subject = envelope
            .and_then(|env| env.subject)
            .map(|s| String::from_utf8_lossy(s).into_owned());
        let envelope_sender = envelope
            .and_then(|env| env.from.as_ref())
            .and_then(|froms| froms.first())
            .map(|addr| {
                format_address(
                    addr.name.as_deref().map(decode_mime_words),
                    addr.mailbox.as_deref().map(|m| String::from_utf8_lossy(m).into_owned()),
                    addr.host.as_deref().map(|h| String::from_utf8_lossy(h).into_owned()),
                )
            });

        let parts = f.body().map(split_rfc822).unwrap_or_default();

        Ok(Some(RawMessage {
            subject: envelope_subject.or(parts.subject).unwrap_or_default(),
            sender: parts.from.or(envelope_sender).unwrap_or_default(),
            body: parts.body,
        }))
    }
}

impl<T: TokenSource> Mailbox for GmailImap<T> {
    fn search(&self, query: &str, max_results: u32) -> Result<Vec<RawMessage>> {
        let mut session = self.connect_and_auth()?;
        session.examine("INBOX")?;

        let mut uids: Vec<u32> = session
            .uid_search(format!("X-GM-RAW {}", quote_imap(query)))
            .with_context(|| format!("search `{query}` failed"))?
            .into_iter()
            .collect();
        // UIDs grow with arrival, so newest first
        uids.sort_unstable_by(|a, b| b.cmp(a));
        uids.truncate(max_results as usize);
        log::info!("search `{query}` matched {} message(s)", uids.len());

        let mut out = Vec::with_capacity(uids.len());
        for uid in uids {
            if let Some(msg) = Self::fetch_message(&mut session, uid)? {
                out.push(msg);
            }
        }

        session.logout()?;
        Ok(out)
    }

    fn create_draft(&self, draft: &DraftRequest) -> Result<DraftAck> {
        let message = draft.to_rfc822(&chrono::Local::now().to_rfc2822());
        let mut session = self.connect_and_auth()?;
        session
            .append_with_flags(&self.drafts_mailbox, message.as_bytes(), &[Flag::Draft])
            .with_context(|| format!("APPEND to {} failed", self.drafts_mailbox))?;
        session.logout()?;
        log::info!("draft to {} stored in {}", draft.to, self.drafts_mailbox);
        Ok(DraftAck {
            mailbox: self.drafts_mailbox.clone(),
        })
    }
}

/// IMAP quoted string.
fn quote_imap(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        if c != '\r' && c != '\n' {
            out.push(c);
        }
    }
    out.push('"');
    out
}

fn format_address(name: Option<String>, mailbox: Option<String>, host: Option<String>) -> String {
    let addr = match (mailbox, host) {
        (Some(m), Some(h)) => Some(format!("{m}@{h}")),
        (Some(m), None) => Some(m),
        _ => None,
    };
    let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    match (name, addr) {
        (Some(n), Some(a)) => format!("{n} <{a}>"),
        (Some(n), None) => n,
        (None, Some(a)) => a,
        (None, None) => String::new(),
    }
}

#[derive(Debug, Default)]
struct Rfc822Parts {
    /// Subject header as transmitted, encoded-words intact.
    subject: Option<String>,
    from: Option<String>,
    body: String,
}

fn split_rfc822(raw: &[u8]) -> Rfc822Parts {
    let Ok(parsed) = mailparse::parse_mail(raw) else {
        return Rfc822Parts {
            body: String::from_utf8_lossy(raw).into_owned(),
            ..Rfc822Parts::default()
        };
    };

    let subject = parsed
        .headers
        .get_first_header("Subject")
        .map(|h| String::from_utf8_lossy(h.get_value_raw()).trim().to_string());
    let from = parsed
        .headers
        .get_first_value("From")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let body = best_text_part(&parsed)
        .or_else(|| parsed.get_body().ok())
        .unwrap_or_default();

    Rfc822Parts {
        subject,
        from,
        body,
    }
}

/// text/plain anywhere in the tree wins; otherwise the first text/html part,
/// left as HTML for the cleaner.
fn best_text_part(p: &mailparse::ParsedMail) -> Option<String> {
    find_part(p, "text/plain").or_else(|| find_part(p, "text/html"))
}

fn find_part(p: &mailparse::ParsedMail, mimetype: &str) -> Option<String> {
    if p.ctype.mimetype.eq_ignore_ascii_case(mimetype) && !is_attachment(p) {
        return p.get_body().ok();
    }
    p.subparts.iter().find_map(|sp| find_part(sp, mimetype))
}

fn is_attachment(p: &mailparse::ParsedMail) -> bool {
    matches!(
        p.get_content_disposition().disposition,
        mailparse::DispositionType::Attachment
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xoauth2_payload_layout() {
        assert_eq!(
            build_xoauth2_bytes("me@gmail.com", "tok"),
            b"user=me@gmail.com\x01auth=Bearer tok\x01\x01".to_vec()
        );
    }

    #[test]
    fn gmail_query_is_quoted() {
        assert_eq!(
            quote_imap(r#"is:unread subject:"q3 plan""#),
            r#""is:unread subject:\"q3 plan\"""#
        );
        assert_eq!(quote_imap("a\\b\r\n"), r#""a\\b""#);
    }

    #[test]
    fn address_formatting() {
        assert_eq!(
            format_address(Some("Ann".into()), Some("ann".into()), Some("x.org".into())),
            "Ann <ann@x.org>"
        );
        assert_eq!(
            format_address(None, Some("ann".into()), Some("x.org".into())),
            "ann@x.org"
        );
        assert_eq!(format_address(Some(" ".into()), None, None), "");
    }

    #[test]
    fn multipart_prefers_plain_text() {
        let raw = concat!(
            "From: Ann <ann@example.com>\r\n",
            "Subject: =?UTF-8?B?SGVsbG8=?=\r\n",
            "Content-Type: multipart/alternative; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n\r\n",
            "<p>html</p>\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "plain text\r\n",
            "--b--\r\n",
        );
        let parts = split_rfc822(raw.as_bytes());
        assert_eq!(parts.subject.as_deref(), Some("=?UTF-8?B?SGVsbG8=?="));
        assert_eq!(parts.from.as_deref(), Some("Ann <ann@example.com>"));
        assert_eq!(parts.body.trim(), "plain text");
    }

    #[test]
    fn html_only_message_keeps_markup_for_cleaning() {
        let raw = concat!(
            "From: shop@example.com\r\n",
            "Subject: Sale\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<html><body><h1>50% off</h1></body></html>\r\n",
        );
        let parts = split_rfc822(raw.as_bytes());
        assert!(parts.body.contains("<h1>50% off</h1>"));
    }

    #[test]
    fn attachments_are_skipped() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Subject: Report\r\n",
            "Content-Type: multipart/mixed; boundary=\"m\"\r\n",
            "\r\n",
            "--m\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n\r\n",
            "attached notes\r\n",
            "--m\r\n",
            "Content-Type: text/html\r\n\r\n",
            "<p>see attached</p>\r\n",
            "--m--\r\n",
        );
        let parts = split_rfc822(raw.as_bytes());
        assert!(parts.body.contains("see attached"));
        assert!(!parts.body.contains("attached notes"));
    }
}
