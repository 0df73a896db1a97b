//! Keyboard input handling.
//!
//! Maps terminal key events to [`App`] mutations.  Keys that need the
//! running datasources (refresh, reload) come back as an [`Action`] for the
//! main loop to carry out.
//!
//! ## For contributors
//!
//! To add a new keybinding:
//!
//! 1. Add a method on [`App`] for the action, or an [`Action`] variant if it
//!    needs the datasource handles.
//! 2. Add a `KeyCode` match arm in [`handle_key_event`].
//! 3. Update the help text in the status bar (`ui.rs`).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::app::App;

/// Work the main loop performs on behalf of a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fetch the selected datasource now.
    RefreshSelected,
    /// Re-read the config file and push new settings to every datasource.
    ReloadConfig,
}

/// Process a single key event.
///
/// Only reacts to key-press events (ignoring release / repeat) so that each
/// physical keypress triggers exactly one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit = true,
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        KeyCode::Tab => app.next_source(),
        KeyCode::BackTab => app.previous_source(),
        KeyCode::Char('r') => return Some(Action::RefreshSelected),
        KeyCode::Char('R') => return Some(Action::ReloadConfig),
        _ => {}
    }
    None
}
