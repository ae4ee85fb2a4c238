use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
};

use crate::terminal::state::{AppState, InputMode, StatusKind, Tab};
use crate::triage::model::{Category, Urgency, UrgencyLevel};

pub fn render(f: &mut Frame, state: &AppState) {
    let [header, tiles, tabs, main, status, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(5),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .margin(1)
    .areas(f.area());

    render_header(f, header, state);
    render_tiles(f, tiles, state);
    render_tabs(f, tabs, state);

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(main);
    render_list(f, left, state);
    render_body(f, right, state);

    render_status(f, status, state);
    render_footer(f, footer, state);
}

fn render_header(f: &mut Frame, area: Rect, state: &AppState) {
    let filter = match &state.input {
        InputMode::EditingFilter { buffer } => Span::styled(
            format!("{buffer}_"),
            Style::default().fg(Color::Yellow),
        ),
        InputMode::Normal if state.settings.filter.is_empty() => {
            Span::styled("(none)", Style::default().fg(Color::DarkGray))
        }
        InputMode::Normal => Span::raw(state.settings.filter.clone()),
    };
    let line = Line::from(vec![
        bold("Range: "),
        Span::raw(state.settings.time_range.label()),
        Span::raw("   "),
        bold("Max: "),
        Span::raw(state.settings.max_results.to_string()),
        Span::raw("   "),
        bold("Filter: "),
        filter,
        Span::raw("   "),
        Span::styled(
            format!("Last updated: {}", state.last_updated(Local::now())),
            Style::default().fg(Color::Gray),
        ),
    ]);
    let p = Paragraph::new(line).block(
        Block::default()
            .title(" Email Triage ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(p, area);
}

fn render_tiles(f: &mut Frame, area: Rect, state: &AppState) {
    let areas = Layout::horizontal([Constraint::Ratio(1, 5); 5]).split(area);
    let total = state.batch.emails().len();
    let mut tiles = vec![("Total", total, Color::White)];
    tiles.extend(
        Category::ALL
            .iter()
            .map(|c| (c.as_str(), state.batch.count(*c), category_color(*c))),
    );

    for ((label, count, color), area) in tiles.into_iter().zip(areas.iter()) {
        let p = Paragraph::new(Line::from(Span::styled(
            count.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .centered()
        .block(Block::default().title(format!(" {label} ")).borders(Borders::ALL));
        f.render_widget(p, *area);
    }
}

fn render_tabs(f: &mut Frame, area: Rect, state: &AppState) {
    let titles = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} {}", i + 1, t.title()));
    let tabs = Tabs::new(titles)
        .select(state.tab.index())
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn render_list(f: &mut Frame, area: Rect, state: &AppState) {
    let visible = state.visible();
    let block = Block::default()
        .title(format!(" {} ({}) ", state.tab.title(), visible.len()))
        .borders(Borders::ALL);

    let items: Vec<ListItem> = visible
        .iter()
        .map(|e| {
            let head = Line::from(vec![
                Span::styled(
                    format!("[{}] ", e.urgency),
                    Style::default().fg(urgency_color(&e.urgency)),
                ),
                Span::styled(
                    e.subject.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]);
            let from = Line::from(vec![
                Span::styled(e.sender.clone(), Style::default().fg(Color::Gray)),
                Span::raw("  "),
                Span::styled(
                    e.category.as_str(),
                    Style::default().fg(category_color(e.category)),
                ),
            ]);
            let summary = Line::from(Span::styled(
                e.summary.clone(),
                Style::default().fg(Color::DarkGray),
            ));
            ListItem::new(Text::from(vec![head, from, summary]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_symbol("➜ ")
        .highlight_style(Style::default().fg(Color::Green));

    f.render_stateful_widget(list, area, &mut state.list_state.clone());
}

fn render_body(f: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title(" Email ").borders(Borders::ALL);
    let text = match state.selected_email() {
        Some(e) => {
            let mut lines = vec![
                Line::from(vec![bold("From: "), Span::raw(e.sender.clone())]),
                Line::from(vec![bold("Subject: "), Span::raw(e.subject.clone())]),
                Line::from(vec![
                    bold("Urgency: "),
                    Span::styled(
                        e.urgency.to_string(),
                        Style::default().fg(urgency_color(&e.urgency)),
                    ),
                ]),
                Line::from(vec![bold("Summary: "), Span::raw(e.summary.clone())]),
                Line::default(),
            ];
            lines.extend(e.body.lines().map(|l| Line::from(l.to_string())));
            Text::from(lines)
        }
        None if state.last_refresh.is_none() => {
            Text::from("Press p to fetch and process unread emails.")
        }
        None if state.visible().is_empty() => Text::from("No emails in this category."),
        None => Text::from("No email selected."),
    };
    let p = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((state.body_scroll, 0));
    f.render_widget(p, area);
}

fn render_status(f: &mut Frame, area: Rect, state: &AppState) {
    let Some(status) = &state.status else {
        return;
    };
    let color = match status.kind {
        StatusKind::Info => Color::Cyan,
        StatusKind::Success => Color::Green,
        StatusKind::Error => Color::Red,
    };
    f.render_widget(
        Paragraph::new(Span::styled(status.text.clone(), Style::default().fg(color))),
        area,
    );
}

fn render_footer(f: &mut Frame, area: Rect, state: &AppState) {
    let keys: &[(&str, &str)] = match state.input {
        InputMode::EditingFilter { .. } => &[("Enter", " apply  "), ("Esc", " cancel")],
        InputMode::Normal => &[
            ("p", " process  "),
            ("d", " draft reply  "),
            ("Tab/1-5", " category  "),
            ("j/k", " move  "),
            ("t", " range  "),
            ("+/-", " count  "),
            ("/", " filter  "),
            ("q", " quit"),
        ],
    };
    let spans: Vec<Span> = keys
        .iter()
        .flat_map(|(k, label)| [bold(k), Span::raw(*label)])
        .collect();
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn bold(s: &str) -> Span<'static> {
    Span::styled(s.to_string(), Style::default().add_modifier(Modifier::BOLD))
}

fn category_color(c: Category) -> Color {
    match c {
        Category::Work => Color::Blue,
        Category::Personal => Color::Green,
        Category::Promotional => Color::Magenta,
        Category::Spam => Color::DarkGray,
    }
}

fn urgency_color(u: &Urgency) -> Color {
    match u.level() {
        Some(UrgencyLevel::Urgent) => Color::Red,
        Some(UrgencyLevel::High) => Color::LightRed,
        Some(UrgencyLevel::Medium) => Color::Yellow,
        Some(UrgencyLevel::Low) => Color::Green,
        None => Color::Gray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::model::{Batch, EnrichedEmail};
    use crate::triage::query::SearchSettings;
    use ratatui::{Terminal, backend::TestBackend};

    fn screen(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| render(f, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn empty_state_invites_processing() {
        let s = AppState::new(SearchSettings::default());
        let out = screen(&s);
        assert!(out.contains("Last updated: Never"));
        assert!(out.contains("Press p to fetch"));
        assert!(out.contains("Promotional"));
    }

    #[test]
    fn selected_email_is_shown() {
        let mut s = AppState::new(SearchSettings::default());
        s.apply_batch(
            Batch {
                emails: vec![EnrichedEmail::new(
                    "Quarterly numbers".into(),
                    "cfo@example.com".into(),
                    "Work",
                    "Urgent",
                    "Send numbers today",
                    "Please send the Q3 numbers.".into(),
                )],
                ..Batch::default()
            },
            Local::now(),
        );
        let out = screen(&s);
        assert!(out.contains("Quarterly numbers"));
        assert!(out.contains("Please send the Q3 numbers."));
        assert!(out.contains("Last updated: Just now"));
        assert!(out.contains("Processed 1 email(s)"));
    }

    #[test]
    fn empty_tab_says_so() {
        let mut s = AppState::new(SearchSettings::default());
        s.apply_batch(
            Batch {
                emails: vec![EnrichedEmail::new(
                    "Lunch?".into(),
                    "bob@example.com".into(),
                    "Personal",
                    "Low",
                    "Lunch on Friday",
                    "Want to grab lunch?".into(),
                )],
                ..Batch::default()
            },
            Local::now(),
        );
        s.set_tab(Tab(Some(Category::Work)));
        let out = screen(&s);
        assert!(out.contains("No emails in this category."));
        assert!(!out.contains("Want to grab lunch?"));
    }

    #[test]
    fn urgency_colours() {
        assert_eq!(urgency_color(&Urgency::new("Urgent")), Color::Red);
        assert_eq!(urgency_color(&Urgency::new("[LOW]")), Color::Green);
        assert_eq!(urgency_color(&Urgency::new("soonish")), Color::Gray);
    }
}
