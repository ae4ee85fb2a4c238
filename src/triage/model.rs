//! Records flowing through the triage pipeline.

use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;
use std::fmt;

use crate::triage::error::{Result, TriageError};

/// A message as returned by the mailbox search, before any cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Subject header, possibly RFC 2047 encoded.
    pub subject: String,
    pub sender: String,
    /// Best text part of the message, possibly HTML.
    pub body: String,
}

impl RawMessage {
    pub fn new(
        subject: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            sender: sender.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Work,
    Personal,
    Promotional,
    Spam,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Work, Self::Personal, Self::Promotional, Self::Spam];

    /// Map raw model output onto a category.
    ///
    /// The output is capitalized (first letter upper, the rest lower) and
    /// compared against the canonical names. Anything else is `Spam`.
    pub fn coerce(raw: &str) -> Self {
        let normalized = capitalize(raw);
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .unwrap_or(Self::Spam)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Personal => "Personal",
            Self::Promotional => "Promotional",
            Self::Spam => "Spam",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UrgencyLevel {
    Urgent,
    High,
    Medium,
    Low,
}

/// Urgency text exactly as the model produced it (trimmed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Urgency(String);

impl Urgency {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Best-effort reading of the level, tolerating `[HIGH]` or
    /// `Urgent: reply today` style answers. The stored text is untouched.
    pub fn level(&self) -> Option<UrgencyLevel> {
        let head = self.0.split(':').next().unwrap_or_default();
        let word = head
            .trim()
            .trim_matches(|c: char| c == '[' || c == ']' || c == '*' || c == '.')
            .trim()
            .to_lowercase();
        match word.as_str() {
            "urgent" => Some(UrgencyLevel::Urgent),
            "high" => Some(UrgencyLevel::High),
            "medium" => Some(UrgencyLevel::Medium),
            "low" => Some(UrgencyLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedEmail {
    pub subject: String,
    pub sender: String,
    pub category: Category,
    pub urgency: Urgency,
    pub summary: String,
    /// Full cleaned body; never truncated.
    pub body: String,
}

impl EnrichedEmail {
    pub fn new(
        subject: String,
        sender: String,
        raw_category: &str,
        raw_urgency: &str,
        summary: &str,
        body: String,
    ) -> Self {
        Self {
            subject,
            sender,
            category: Category::coerce(raw_category),
            urgency: Urgency::new(raw_urgency),
            summary: summary.trim().to_string(),
            body,
        }
    }

    /// Fails on the first required field that is blank.
    pub fn check_required(&self) -> Result<()> {
        if self.sender.trim().is_empty() {
            return Err(TriageError::MissingField("sender"));
        }
        if self.subject.trim().is_empty() {
            return Err(TriageError::MissingField("subject"));
        }
        Ok(())
    }
}

/// The four independent model calls made by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Category,
    Urgency,
    Summary,
    Reply,
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Category => "category",
            Self::Urgency => "urgency",
            Self::Summary => "summary",
            Self::Reply => "reply",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl DraftRequest {
    pub fn reply_to(email: &EnrichedEmail, reply_text: &str) -> Result<Self> {
        email.check_required()?;
        let body = reply_text.trim();
        if body.is_empty() {
            return Err(TriageError::MissingField("body"));
        }
        Ok(Self {
            to: email.sender.trim().to_string(),
            subject: format!("Re: {}", email.subject.trim()),
            body: body.to_string(),
        })
    }

    /// Render as an RFC 5322 message suitable for IMAP `APPEND`.
    pub fn to_rfc822(&self, date: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("Date: {}\r\n", single_line(date)));
        out.push_str(&format!("To: {}\r\n", encode_address(&self.to)));
        out.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");
        out.push_str("\r\n");
        for line in self.body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn encode_header(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        value
    } else {
        format!(
            "=?utf-8?B?{}?=",
            general_purpose::STANDARD.encode(value.as_bytes())
        )
    }
}

/// Encode a non-ASCII display name, leaving the `<addr>` part as is.
fn encode_address(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        return value;
    }
    match value.rfind('<') {
        Some(idx) if value.trim_end().ends_with('>') => {
            let name = value[..idx].trim().trim_matches('"');
            let addr = value[idx..].trim_end();
            if name.is_empty() {
                addr.to_string()
            } else {
                format!("{} {addr}", encode_header(name))
            }
        }
        _ => value,
    }
}

/// One message the pipeline had to drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFailure {
    /// Zero-based position in the search results.
    pub position: usize,
    pub subject: String,
    pub error: String,
}

/// Outcome of one `process` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub emails: Vec<EnrichedEmail>,
    pub failures: Vec<MessageFailure>,
    pub fetch_error: Option<String>,
}

impl Batch {
    pub fn fetch_failed(error: String) -> Self {
        Self {
            fetch_error: Some(error),
            ..Self::default()
        }
    }

    pub fn emails(&self) -> &[EnrichedEmail] {
        &self.emails
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn count(&self, category: Category) -> usize {
        self.emails.iter().filter(|e| e.category == category).count()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &EnrichedEmail> {
        self.emails.iter().filter(move |e| e.category == category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftOutcome {
    Created { message: String },
    Failed { message: String },
}

impl DraftOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Created { message } | Self::Failed { message } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn email(sender: &str, subject: &str) -> EnrichedEmail {
        EnrichedEmail::new(
            subject.to_string(),
            sender.to_string(),
            "Work",
            "High",
            "Reply to Bob",
            "Hi there".to_string(),
        )
    }

    #[test]
    fn category_accepts_any_case() {
        assert_eq!(Category::coerce("work"), Category::Work);
        assert_eq!(Category::coerce("PERSONAL"), Category::Personal);
        assert_eq!(Category::coerce("pRoMoTiOnAl"), Category::Promotional);
        assert_eq!(Category::coerce("Spam"), Category::Spam);
    }

    #[test]
    fn unknown_category_becomes_spam() {
        assert_eq!(Category::coerce("Newsletter"), Category::Spam);
        assert_eq!(Category::coerce(""), Category::Spam);
        assert_eq!(Category::coerce("work "), Category::Spam);
        assert_eq!(Category::coerce("Work\n"), Category::Spam);
        assert_eq!(Category::coerce("Work."), Category::Spam);
    }

    proptest! {
        #[test]
        fn coerced_category_is_canonical(raw in ".*") {
            let c = Category::coerce(&raw);
            prop_assert!(c == Category::Spam || capitalize(&raw) == c.as_str());
        }

        #[test]
        fn case_variants_map_to_canonical(idx in 0usize..4, mask in proptest::collection::vec(any::<bool>(), 11)) {
            let canonical = Category::ALL[idx];
            let raw: String = canonical
                .as_str()
                .chars()
                .zip(mask.iter().cycle())
                .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
                .collect();
            prop_assert_eq!(Category::coerce(&raw), canonical);
        }
    }

    #[test]
    fn urgency_is_kept_verbatim_but_readable() {
        let u = Urgency::new("  [HIGH] \n");
        assert_eq!(u.as_str(), "[HIGH]");
        assert_eq!(u.level(), Some(UrgencyLevel::High));

        assert_eq!(
            Urgency::new("Urgent: contract expires today").level(),
            Some(UrgencyLevel::Urgent)
        );
        assert_eq!(Urgency::new("Somewhat important").level(), None);
    }

    #[test]
    fn enriched_email_trims_summary_and_keeps_body() {
        let long_body = "x".repeat(5000);
        let e = EnrichedEmail::new(
            "s".into(),
            "a@b.c".into(),
            "promotional",
            " Low ",
            "  Sale ends Friday\n",
            long_body.clone(),
        );
        assert_eq!(e.category, Category::Promotional);
        assert_eq!(e.urgency.as_str(), "Low");
        assert_eq!(e.summary, "Sale ends Friday");
        assert_eq!(e.body, long_body);
    }

    #[test]
    fn reply_request_prefixes_subject() {
        let req = DraftRequest::reply_to(&email("Bob <bob@example.com>", "Lunch"), " Sure!\n")
            .unwrap();
        assert_eq!(req.to, "Bob <bob@example.com>");
        assert_eq!(req.subject, "Re: Lunch");
        assert_eq!(req.body, "Sure!");
    }

    #[test]
    fn reply_request_requires_sender_and_subject() {
        let err = DraftRequest::reply_to(&email("", "Lunch"), "ok").unwrap_err();
        assert!(matches!(err, TriageError::MissingField("sender")));

        let err = DraftRequest::reply_to(&email("bob@example.com", "  "), "ok").unwrap_err();
        assert!(matches!(err, TriageError::MissingField("subject")));

        let err = DraftRequest::reply_to(&email("bob@example.com", "Lunch"), "\n").unwrap_err();
        assert!(matches!(err, TriageError::MissingField("body")));
    }

    #[test]
    fn rfc822_rendering_encodes_non_ascii_subject() {
        let req = DraftRequest {
            to: "bob@example.com\r\nBcc: evil@example.com".into(),
            subject: "Re: Café".into(),
            body: "Hello\nBye".into(),
        };
        let msg = req.to_rfc822("Mon, 5 Oct 2026 10:00:00 +0000");
        assert!(msg.contains("To: bob@example.com  Bcc: evil@example.com\r\n"));
        assert!(msg.contains("Subject: =?utf-8?B?UmU6IENhZsOp?=\r\n"));
        assert!(msg.ends_with("\r\n\r\nHello\r\nBye\r\n"));

        let parsed = mailparse::parse_mail(msg.as_bytes()).unwrap();
        use mailparse::MailHeaderMap;
        assert_eq!(
            parsed.headers.get_first_value("Subject").as_deref(),
            Some("Re: Café")
        );
    }

    #[test]
    fn rfc822_rendering_encodes_non_ascii_display_name() {
        let render = |to: &str| {
            DraftRequest {
                to: to.into(),
                subject: "Re: Lunch".into(),
                body: "ok".into(),
            }
            .to_rfc822("Mon, 5 Oct 2026 10:00:00 +0000")
        };

        let msg = render("René <rene@example.com>");
        assert!(msg.contains("To: =?utf-8?B?UmVuw6k=?= <rene@example.com>\r\n"));
        let parsed = mailparse::parse_mail(msg.as_bytes()).unwrap();
        use mailparse::MailHeaderMap;
        assert_eq!(
            parsed.headers.get_first_value("To").as_deref(),
            Some("René <rene@example.com>")
        );

        let msg = render("\"René Dupont\" <rene@example.com>");
        assert!(msg.contains("To: =?utf-8?B?UmVuw6kgRHVwb250?= <rene@example.com>\r\n"));

        let msg = render("Ann <ann@example.com>");
        assert!(msg.contains("To: Ann <ann@example.com>\r\n"));
    }

    #[test]
    fn batch_counts_by_category() {
        let mut b = Batch::default();
        b.emails.push(email("a@x", "1"));
        let mut spam = email("b@x", "2");
        spam.category = Category::Spam;
        b.emails.push(spam);
        assert_eq!(b.count(Category::Work), 1);
        assert_eq!(b.count(Category::Spam), 1);
        assert_eq!(b.count(Category::Personal), 0);
        assert_eq!(b.in_category(Category::Spam).count(), 1);
    }
}
