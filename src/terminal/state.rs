use chrono::{DateTime, Local};
use ratatui::widgets::ListState;

use crate::triage::model::{Batch, Category, DraftOutcome, EnrichedEmail};
use crate::triage::query::SearchSettings;

/// Category tab; `None` shows every email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tab(pub Option<Category>);

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab(None),
        Tab(Some(Category::Work)),
        Tab(Some(Category::Personal)),
        Tab(Some(Category::Promotional)),
        Tab(Some(Category::Spam)),
    ];

    pub fn title(&self) -> &'static str {
        match self.0 {
            None => "All",
            Some(c) => c.as_str(),
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Editing the search filter; `buffer` replaces it on Enter.
    EditingFilter { buffer: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

pub struct AppState {
    pub settings: SearchSettings,
    pub batch: Batch,
    pub tab: Tab,
    pub list_state: ListState,
    pub body_scroll: u16,
    pub last_refresh: Option<DateTime<Local>>,
    pub status: Option<Status>,
    pub input: InputMode,
}

impl AppState {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            batch: Batch::default(),
            tab: Tab::default(),
            list_state: ListState::default(),
            body_scroll: 0,
            last_refresh: None,
            status: None,
            input: InputMode::Normal,
        }
    }

    /// Emails shown under the current tab, in batch order.
    pub fn visible(&self) -> Vec<&EnrichedEmail> {
        match self.tab.0 {
            Some(category) => self.batch.in_category(category).collect(),
            None => self.batch.emails().iter().collect(),
        }
    }

    pub fn selected_email(&self) -> Option<&EnrichedEmail> {
        let idx = self.list_state.selected()?;
        self.visible().get(idx).copied()
    }

    pub fn move_selection(&mut self, delta: i32) {
        let len = self.visible().len() as i32;
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let cur = self.list_state.selected().unwrap_or(0) as i32;
        let next = (cur + delta).clamp(0, len - 1) as usize;
        if Some(next) != self.list_state.selected() {
            self.body_scroll = 0;
        }
        self.list_state.select(Some(next));
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.reset_selection();
    }

    pub fn scroll_body(&mut self, delta: i32) {
        if delta < 0 {
            self.body_scroll = self.body_scroll.saturating_sub(delta.unsigned_abs() as u16);
        } else {
            self.body_scroll = self.body_scroll.saturating_add(delta as u16);
        }
    }

    fn reset_selection(&mut self) {
        self.body_scroll = 0;
        let first = (!self.visible().is_empty()).then_some(0);
        self.list_state.select(first);
    }

    /// Replace the displayed batch and describe how it went.
    pub fn apply_batch(&mut self, batch: Batch, now: DateTime<Local>) {
        self.status = Some(batch_status(&batch));
        self.batch = batch;
        self.last_refresh = Some(now);
        self.reset_selection();
    }

    pub fn record_draft(&mut self, outcome: &DraftOutcome) {
        let kind = if outcome.is_success() {
            StatusKind::Success
        } else {
            StatusKind::Error
        };
        self.set_status(kind, outcome.message());
    }

    pub fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(Status {
            kind,
            text: text.into(),
        });
    }

    pub fn cycle_time_range(&mut self) {
        self.settings.time_range = self.settings.time_range.next();
    }

    pub fn begin_filter_edit(&mut self) {
        self.input = InputMode::EditingFilter {
            buffer: self.settings.filter.clone(),
        };
    }

    pub fn filter_input(&mut self, c: char) {
        if let InputMode::EditingFilter { buffer } = &mut self.input {
            buffer.push(c);
        }
    }

    pub fn filter_backspace(&mut self) {
        if let InputMode::EditingFilter { buffer } = &mut self.input {
            buffer.pop();
        }
    }

    pub fn commit_filter(&mut self) {
        if let InputMode::EditingFilter { buffer } =
            std::mem::replace(&mut self.input, InputMode::Normal)
        {
            self.settings.filter = buffer.trim().to_string();
        }
    }

    pub fn cancel_filter(&mut self) {
        self.input = InputMode::Normal;
    }

    pub fn last_updated(&self, now: DateTime<Local>) -> String {
        format_time_ago(self.last_refresh, now)
    }
}

fn batch_status(batch: &Batch) -> Status {
    if let Some(err) = &batch.fetch_error {
        return Status {
            kind: StatusKind::Error,
            text: format!("Error fetching emails: {err}"),
        };
    }
    let processed = batch.emails().len();
    if batch.failures.is_empty() {
        let text = if processed == 0 {
            "No unread emails matched the search".to_string()
        } else {
            format!("Processed {processed} email(s)")
        };
        return Status {
            kind: StatusKind::Success,
            text,
        };
    }
    let first = &batch.failures[0];
    Status {
        kind: StatusKind::Error,
        text: format!(
            "Processed {processed} email(s), {} failed (first: #{} {}: {})",
            batch.failures.len(),
            first.position + 1,
            first.subject,
            first.error
        ),
    }
}

/// Relative label for the last refresh: "Never", "Just now", "N minutes ago"
/// or "N hours ago".
pub fn format_time_ago(last: Option<DateTime<Local>>, now: DateTime<Local>) -> String {
    let Some(last) = last else {
        return "Never".to_string();
    };
    let minutes = (now - last).num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minutes ago")
    } else {
        format!("{} hours ago", minutes / 60)
    }
}
