use ratatui::crossterm::event::{KeyCode, KeyEvent};

use crate::terminal::state::{AppState, InputMode, StatusKind, Tab};

/// Work the run loop has to do against the pipeline after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Process,
    Draft,
}

pub fn handle_key(key: KeyEvent, state: &mut AppState) -> Action {
    if matches!(state.input, InputMode::EditingFilter { .. }) {
        handle_filter_keys(key, state);
        return Action::None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
        KeyCode::Char('p') => return Action::Process,
        KeyCode::Char('d') => return Action::Draft,

        KeyCode::Tab => state.set_tab(state.tab.next()),
        KeyCode::BackTab => state.set_tab(state.tab.previous()),
        KeyCode::Char(c @ '1'..='5') => {
            let idx = c as usize - '1' as usize;
            state.set_tab(Tab::ALL[idx]);
        }

        KeyCode::Down | KeyCode::Char('j') => state.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => state.move_selection(-1),
        KeyCode::PageDown => state.scroll_body(10),
        KeyCode::PageUp => state.scroll_body(-10),

        KeyCode::Char('t') => {
            state.cycle_time_range();
            settings_changed(state);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            state.settings.more_results();
            settings_changed(state);
        }
        KeyCode::Char('-') => {
            state.settings.fewer_results();
            settings_changed(state);
        }
        KeyCode::Char('/') => state.begin_filter_edit(),
        _ => {}
    }
    Action::None
}

fn handle_filter_keys(key: KeyEvent, state: &mut AppState) {
    match key.code {
        KeyCode::Enter => {
            state.commit_filter();
            settings_changed(state);
        }
        KeyCode::Esc => state.cancel_filter(),
        KeyCode::Backspace => state.filter_backspace(),
        KeyCode::Char(c) => state.filter_input(c),
        _ => {}
    }
}

fn settings_changed(state: &mut AppState) {
    let text = format!(
        "{}, up to {} emails. Press p to process.",
        state.settings.time_range.label(),
        state.settings.max_results
    );
    state.set_status(StatusKind::Info, text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::model::Category;
    use crate::triage::query::{SearchSettings, TimeRange};

    fn press(state: &mut AppState, code: KeyCode) -> Action {
        handle_key(KeyEvent::from(code), state)
    }

    #[test]
    fn pipeline_keys_become_actions() {
        let mut s = AppState::new(SearchSettings::default());
        assert_eq!(press(&mut s, KeyCode::Char('p')), Action::Process);
        assert_eq!(press(&mut s, KeyCode::Char('d')), Action::Draft);
        assert_eq!(press(&mut s, KeyCode::Char('q')), Action::Quit);
        assert_eq!(press(&mut s, KeyCode::Esc), Action::Quit);
    }

    #[test]
    fn number_keys_pick_tabs() {
        let mut s = AppState::new(SearchSettings::default());
        press(&mut s, KeyCode::Char('4'));
        assert_eq!(s.tab, Tab(Some(Category::Promotional)));
        press(&mut s, KeyCode::Char('1'));
        assert_eq!(s.tab, Tab(None));
        press(&mut s, KeyCode::Tab);
        assert_eq!(s.tab, Tab(Some(Category::Work)));
    }

    #[test]
    fn settings_keys_adjust_search() {
        let mut s = AppState::new(SearchSettings::default());
        press(&mut s, KeyCode::Char('t'));
        assert_eq!(s.settings.time_range, TimeRange::ThreeDays);
        press(&mut s, KeyCode::Char('+'));
        assert_eq!(s.settings.max_results, 15);
        press(&mut s, KeyCode::Char('-'));
        press(&mut s, KeyCode::Char('-'));
        assert_eq!(s.settings.max_results, 5);
    }

    #[test]
    fn filter_mode_swallows_keys() {
        let mut s = AppState::new(SearchSettings::new(TimeRange::Day, 10, ""));
        press(&mut s, KeyCode::Char('/'));
        assert_eq!(press(&mut s, KeyCode::Char('q')), Action::None);
        assert_eq!(press(&mut s, KeyCode::Char('p')), Action::None);
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.settings.filter, "qp");
        assert_eq!(s.settings.query(), "is:unread newer_than:1d qp");

        press(&mut s, KeyCode::Char('/'));
        press(&mut s, KeyCode::Backspace);
        assert_eq!(press(&mut s, KeyCode::Esc), Action::None);
        assert_eq!(s.settings.filter, "qp");
    }
}
