//! Turns a mailbox search into enriched emails, and an enriched email into a
//! draft reply.
//!
//! Every message is handled on its own: a failing judgment drops that message
//! and the batch carries on. Nothing here returns an error to the caller;
//! failures are reported in the returned [`Batch`] or [`DraftOutcome`] and
//! logged.

use std::thread;
use std::time::Duration;

use crate::llm::LanguageModel;
use crate::mail::decoders::{MAX_PROMPT_CHARS, clean_body, decode_subject, prompt_excerpt};
use crate::mail::mailbox::{DraftAck, Mailbox};
use crate::triage::error::{Result, TriageError};
use crate::triage::model::{
    Batch, DraftOutcome, DraftRequest, EnrichedEmail, Judgment, MessageFailure, RawMessage,
};
use crate::triage::prompts;

/// Fixed pause after each processed message. Not adaptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min_interval: Duration,
}

impl Pacing {
    pub const fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub const fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.min_interval
    }

    pub fn pause(&self) {
        if !self.min_interval.is_zero() {
            thread::sleep(self.min_interval);
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_millis(200)
    }
}

pub struct Pipeline<M, L> {
    mailbox: M,
    model: L,
    pacing: Pacing,
}

impl<M: Mailbox, L: LanguageModel> Pipeline<M, L> {
    pub fn new(mailbox: M, model: L) -> Self {
        Self {
            mailbox,
            model,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn model(&self) -> &L {
        &self.model
    }

    /// Fetch messages matching `query` and enrich each of them.
    ///
    /// The query must already carry constraints such as `is:unread`; it is
    /// passed through untouched. The result holds at most `max_results`
    /// emails, in search order.
    pub fn process(&self, query: &str, max_results: u32) -> Batch {
        if max_results == 0 {
            return Batch::default();
        }

        let mut raw = match self.mailbox.search(query, max_results) {
            Ok(r) => r,
            Err(e) => {
                let err = TriageError::Fetch(e);
                log::error!("Error fetching emails: {err}");
                return Batch::fetch_failed(err.to_string());
            }
        };
        raw.truncate(max_results as usize);

        let mut batch = Batch::default();
        for (position, msg) in raw.iter().enumerate() {
            match self.enrich(msg) {
                Ok(email) => batch.emails.push(email),
                Err(err) => {
                    log::error!("Error processing email #{}: {err}", position + 1);
                    batch.failures.push(MessageFailure {
                        position,
                        subject: decode_subject(&msg.subject),
                        error: err.to_string(),
                    });
                }
            }
            self.pacing.pause();
        }

        log::info!(
            "processed {} of {} message(s), {} failed",
            batch.emails.len(),
            raw.len(),
            batch.failures.len()
        );
        batch
    }

    /// Clean one raw message and run the three judgments on it.
    pub fn enrich(&self, msg: &RawMessage) -> Result<EnrichedEmail> {
        let body = clean_body(&msg.body).map_err(TriageError::Clean)?;
        let subject = decode_subject(&msg.subject);
        let excerpt = prompt_excerpt(&body, MAX_PROMPT_CHARS);

        let category = self.judge(Judgment::Category, prompts::CATEGORY, excerpt)?;
        let urgency = self.judge(Judgment::Urgency, prompts::URGENCY, excerpt)?;
        let summary = self.judge(Judgment::Summary, prompts::SUMMARY, excerpt)?;

        Ok(EnrichedEmail::new(
            subject,
            msg.sender.clone(),
            &category,
            &urgency,
            &summary,
            body,
        ))
    }

    fn judge(&self, judgment: Judgment, system: &str, input: &str) -> Result<String> {
        self.model
            .complete(system, input)
            .map_err(|cause| TriageError::Judgment { judgment, cause })
    }

    /// Compose a reply to `email` and store it as a draft.
    pub fn draft_reply(&self, email: &EnrichedEmail) -> DraftOutcome {
        match self.try_draft_reply(email) {
            Ok(ack) => {
                log::info!("reply to `{}` saved in {}", email.subject, ack.mailbox);
                DraftOutcome::Created {
                    message: "Draft created successfully".to_string(),
                }
            }
            Err(err) => {
                log::error!("Error creating draft: {err}");
                DraftOutcome::Failed {
                    message: format!("Error creating draft: {err}"),
                }
            }
        }
    }

    fn try_draft_reply(&self, email: &EnrichedEmail) -> Result<DraftAck> {
        email.check_required()?;

        let input = prompts::reply_input(
            prompt_excerpt(&email.body, MAX_PROMPT_CHARS),
            email.category.as_str(),
            email.urgency.as_str(),
        );
        let reply = self.judge(Judgment::Reply, prompts::REPLY, &input)?;
        let request = DraftRequest::reply_to(email, &reply)?;

        self.mailbox
            .create_draft(&request)
            .map_err(TriageError::Draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::model::Category;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeMailbox {
        messages: Vec<RawMessage>,
        fail_search: bool,
        fail_draft: bool,
        searches: RefCell<Vec<(String, u32)>>,
        drafts: RefCell<Vec<DraftRequest>>,
    }

    impl Mailbox for FakeMailbox {
        fn search(&self, query: &str, max_results: u32) -> anyhow::Result<Vec<RawMessage>> {
            self.searches
                .borrow_mut()
                .push((query.to_string(), max_results));
            if self.fail_search {
                return Err(anyhow!("connection reset"));
            }
            Ok(self.messages.clone())
        }

        fn create_draft(&self, draft: &DraftRequest) -> anyhow::Result<DraftAck> {
            if self.fail_draft {
                return Err(anyhow!("APPEND rejected"));
            }
            self.drafts.borrow_mut().push(draft.clone());
            Ok(DraftAck {
                mailbox: "Drafts".into(),
            })
        }
    }

    /// Answers calls in order from a script; `Err` entries fail that call.
    #[derive(Default)]
    struct ScriptedModel {
        replies: RefCell<VecDeque<std::result::Result<String, String>>>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedModel {
        fn new(replies: &[std::result::Result<&str, &str>]) -> Self {
            Self {
                replies: RefCell::new(
                    replies
                        .iter()
                        .copied()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: RefCell::default(),
            }
        }
    }

    impl LanguageModel for ScriptedModel {
        fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
            self.calls
                .borrow_mut()
                .push((system.to_string(), user.to_string()));
            match self.replies.borrow_mut().pop_front() {
                Some(Ok(s)) => Ok(s),
                Some(Err(e)) => Err(anyhow!(e)),
                None => Err(anyhow!("script exhausted")),
            }
        }
    }

    fn msg(n: usize) -> RawMessage {
        RawMessage::new(
            format!("Subject {n}"),
            format!("sender{n}@example.com"),
            format!("Body of message {n}"),
        )
    }

    fn pipeline(mailbox: FakeMailbox, model: ScriptedModel) -> Pipeline<FakeMailbox, ScriptedModel> {
        Pipeline::new(mailbox, model).with_pacing(Pacing::none())
    }

    fn enriched() -> EnrichedEmail {
        EnrichedEmail::new(
            "Lunch?".into(),
            "Bob <bob@example.com>".into(),
            "Personal",
            "Low",
            "Bob asks about lunch",
            "Want to grab lunch Friday?".into(),
        )
    }

    #[test]
    fn enriches_messages_in_search_order() {
        let mailbox = FakeMailbox {
            messages: vec![msg(1), msg(2)],
            ..FakeMailbox::default()
        };
        let model = ScriptedModel::new(&[
            Ok("work"),
            Ok(" High \n"),
            Ok("Reply needed "),
            Ok("Newsletter"),
            Ok("Low"),
            Ok("Weekly digest"),
        ]);
        let p = pipeline(mailbox, model);

        let batch = p.process("is:unread newer_than:2d", 10);

        assert!(batch.failures.is_empty());
        assert_eq!(batch.fetch_error, None);
        let emails = batch.emails();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].subject, "Subject 1");
        assert_eq!(emails[0].sender, "sender1@example.com");
        assert_eq!(emails[0].category, Category::Work);
        assert_eq!(emails[0].urgency.as_str(), "High");
        assert_eq!(emails[0].summary, "Reply needed");
        assert_eq!(emails[1].category, Category::Spam);
        assert_eq!(
            p.mailbox().searches.borrow().as_slice(),
            &[("is:unread newer_than:2d".to_string(), 10)]
        );
    }

    #[test]
    fn failing_category_call_drops_only_that_message() {
        let mailbox = FakeMailbox {
            messages: vec![msg(1), msg(2), msg(3)],
            ..FakeMailbox::default()
        };
        let model = ScriptedModel::new(&[
            Ok("Work"),
            Ok("Low"),
            Ok("one"),
            Err("rate limited"),
            Ok("Personal"),
            Ok("Medium"),
            Ok("three"),
        ]);
        let p = pipeline(mailbox, model);

        let batch = p.process("q", 10);

        let subjects: Vec<_> = batch.emails().iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, ["Subject 1", "Subject 3"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].position, 1);
        assert_eq!(batch.failures[0].subject, "Subject 2");
        assert!(batch.failures[0].error.contains("category judgment failed"));
        assert!(batch.failures[0].error.contains("rate limited"));
    }

    #[test]
    fn failing_summary_call_is_attributed() {
        let mailbox = FakeMailbox {
            messages: vec![msg(1)],
            ..FakeMailbox::default()
        };
        let model = ScriptedModel::new(&[Ok("Work"), Ok("Low"), Err("timeout")]);
        let batch = pipeline(mailbox, model).process("q", 5);
        assert!(batch.is_empty());
        assert!(batch.failures[0].error.starts_with("summary judgment failed"));
    }

    #[test]
    fn search_failure_yields_empty_batch() {
        let mailbox = FakeMailbox {
            messages: vec![msg(1)],
            fail_search: true,
            ..FakeMailbox::default()
        };
        let p = pipeline(mailbox, ScriptedModel::default());

        let batch = p.process("q", 10);

        assert!(batch.emails().is_empty());
        assert!(batch.failures.is_empty());
        assert!(batch.fetch_error.unwrap().contains("connection reset"));
        assert!(p.model().calls.borrow().is_empty());
    }

    #[test]
    fn never_returns_more_than_requested() {
        let mailbox = FakeMailbox {
            messages: (1..=4).map(msg).collect(),
            ..FakeMailbox::default()
        };
        let replies: Vec<std::result::Result<&str, &str>> = vec![Ok("Work"); 12];
        let p = pipeline(mailbox, ScriptedModel::new(&replies));

        let batch = p.process("q", 2);
        assert_eq!(batch.emails().len(), 2);
        assert_eq!(p.model().calls.borrow().len(), 6);

        assert!(p.process("q", 0).emails().is_empty());
        assert_eq!(p.mailbox().searches.borrow().len(), 1);
    }

    #[test]
    fn prompts_are_truncated_but_body_is_kept() {
        let long = "word ".repeat(1000);
        let mailbox = FakeMailbox {
            messages: vec![RawMessage::new("=?UTF-8?B?SGVsbG8=?=", "a@b.c", long.clone())],
            ..FakeMailbox::default()
        };
        let p = pipeline(mailbox, ScriptedModel::new(&[Ok("Work"), Ok("Low"), Ok("s")]));

        let batch = p.process("q", 5);

        let email = &batch.emails()[0];
        assert_eq!(email.subject, "Hello");
        assert_eq!(email.body, long.trim_end());
        assert!(email.body.chars().count() > MAX_PROMPT_CHARS);
        let calls = p.model().calls.borrow();
        assert_eq!(calls.len(), 3);
        for (_, user) in calls.iter() {
            assert!(user.chars().count() <= MAX_PROMPT_CHARS);
        }
        assert_eq!(calls[0].0, prompts::CATEGORY);
        assert_eq!(calls[1].0, prompts::URGENCY);
        assert_eq!(calls[2].0, prompts::SUMMARY);
    }

    #[test]
    fn html_bodies_are_cleaned_before_judgment() {
        let mailbox = FakeMailbox {
            messages: vec![RawMessage::new(
                "Sale",
                "shop@example.com",
                "<html><body><p>Everything <b>50% off</b></p></body></html>",
            )],
            ..FakeMailbox::default()
        };
        let p = pipeline(
            mailbox,
            ScriptedModel::new(&[Ok("promotional"), Ok("Low"), Ok("Sale")]),
        );
        let batch = p.process("q", 5);
        let email = &batch.emails()[0];
        assert_eq!(email.category, Category::Promotional);
        assert!(!email.body.contains("<p>"));
        assert!(email.body.contains("50% off"));
        assert!(!p.model().calls.borrow()[0].1.contains("<html>"));
    }

    #[test]
    fn draft_reply_creates_draft() {
        let p = pipeline(
            FakeMailbox::default(),
            ScriptedModel::new(&[Ok("Hi Bob,\n\nFriday works.\n\nAnn")]),
        );

        let outcome = p.draft_reply(&enriched());

        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "Draft created successfully");
        let drafts = p.mailbox().drafts.borrow();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].to, "Bob <bob@example.com>");
        assert_eq!(drafts[0].subject, "Re: Lunch?");
        assert_eq!(drafts[0].body, "Hi Bob,\n\nFriday works.\n\nAnn");

        let calls = p.model().calls.borrow();
        assert_eq!(calls[0].0, prompts::REPLY);
        assert!(calls[0].1.contains("Want to grab lunch Friday?"));
        assert!(calls[0].1.contains("Category: Personal"));
        assert!(calls[0].1.contains("Urgency: Low"));
    }

    #[test]
    fn draft_reply_without_sender_touches_nothing() {
        let p = pipeline(FakeMailbox::default(), ScriptedModel::new(&[Ok("reply")]));
        let mut email = enriched();
        email.sender = String::new();

        let outcome = p.draft_reply(&email);

        assert!(!outcome.is_success());
        assert!(outcome.message().contains("sender"));
        assert!(p.mailbox().drafts.borrow().is_empty());
        assert!(p.model().calls.borrow().is_empty());
    }

    #[test]
    fn draft_reply_reports_mailbox_failure() {
        let mailbox = FakeMailbox {
            fail_draft: true,
            ..FakeMailbox::default()
        };
        let p = pipeline(mailbox, ScriptedModel::new(&[Ok("reply")]));

        let outcome = p.draft_reply(&enriched());

        assert_eq!(
            outcome,
            DraftOutcome::Failed {
                message: "Error creating draft: draft creation failed: APPEND rejected"
                    .to_string()
            }
        );
    }

    #[test]
    fn draft_reply_reports_model_failure() {
        let p = pipeline(FakeMailbox::default(), ScriptedModel::new(&[Err("503")]));
        let outcome = p.draft_reply(&enriched());
        assert!(!outcome.is_success());
        assert!(outcome.message().contains("reply judgment failed"));
        assert!(p.mailbox().drafts.borrow().is_empty());
    }

    #[test]
    fn pacing_defaults_to_a_short_pause() {
        assert_eq!(Pacing::default().interval(), Duration::from_millis(200));
        assert!(Pacing::none().interval().is_zero());
    }
}
