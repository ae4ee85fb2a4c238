pub mod events;
pub mod state;
pub mod ui;

use chrono::Local;
use color_eyre::eyre::Result;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{self, Event, KeyEventKind};

use crate::llm::LanguageModel;
use crate::mail::Mailbox;
use crate::terminal::events::{Action, handle_key};
use crate::terminal::state::{AppState, StatusKind};
use crate::triage::pipeline::Pipeline;
use crate::triage::query::SearchSettings;

pub fn run_tui<M: Mailbox, L: LanguageModel>(
    pipeline: &Pipeline<M, L>,
    settings: SearchSettings,
) -> Result<()> {
    color_eyre::install()?;

    let mut state = AppState::new(settings);
    let terminal = ratatui::init();
    let result = run(terminal, pipeline, &mut state);
    ratatui::restore();

    result
}

fn run<M: Mailbox, L: LanguageModel>(
    mut terminal: DefaultTerminal,
    pipeline: &Pipeline<M, L>,
    state: &mut AppState,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, state))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_key(key, state) {
            Action::None => {}
            Action::Quit => break,
            Action::Process => {
                state.set_status(StatusKind::Info, "Processing emails...");
                terminal.draw(|f| ui::render(f, state))?;

                let batch = pipeline.process(&state.settings.query(), state.settings.max_results);
                state.apply_batch(batch, Local::now());
            }
            Action::Draft => {
                let Some(email) = state.selected_email().cloned() else {
                    state.set_status(StatusKind::Error, "No email selected");
                    continue;
                };
                state.set_status(StatusKind::Info, "Creating draft...");
                terminal.draw(|f| ui::render(f, state))?;

                let outcome = pipeline.draft_reply(&email);
                state.record_draft(&outcome);
            }
        }
    }
    Ok(())
}
