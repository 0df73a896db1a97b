//! Dashboard state.
//!
//! Holds the most recent [`ResultSet`] published by each datasource, which
//! datasource tab is selected, and the list scroll position.  Rendering
//! lives in [`crate::ui`]; key handling in [`crate::input`].

use std::sync::Arc;

use chrono::{DateTime, Local};
use ratatui::widgets::ListState;

use crate::poll::Update;
use crate::source::ResultSet;

/// What the dashboard knows about one datasource.
#[derive(Debug, Clone)]
pub struct SourceView {
    pub name: String,
    pub type_name: String,
    /// Last published result set; `None` until the first successful cycle.
    pub results: Option<Arc<ResultSet>>,
    pub updated: Option<DateTime<Local>>,
}

impl SourceView {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            results: None,
            updated: None,
        }
    }

    pub fn len(&self) -> usize {
        self.results.as_ref().map_or(0, |r| r.len())
    }
}

pub struct App {
    pub sources: Vec<SourceView>,
    /// Index into `sources` of the visible tab.
    pub selected: usize,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    pub status: String,
}

impl App {
    pub fn new(sources: Vec<SourceView>) -> Self {
        let status = if sources.is_empty() {
            "No datasources configured".to_string()
        } else {
            "Waiting for first refresh…".to_string()
        };
        Self {
            sources,
            selected: 0,
            list_state: ListState::default(),
            quit: false,
            status,
        }
    }

    pub fn current(&self) -> Option<&SourceView> {
        self.sources.get(self.selected)
    }

    /// Replace a datasource's results with a freshly published set.
    ///
    /// Updates for unknown sources are ignored.
    pub fn apply_update(&mut self, update: Update) {
        let now = Local::now();
        let Some(view) = self.sources.iter_mut().find(|s| s.name == update.source) else {
            return;
        };
        let count = update.results.len();
        view.results = Some(update.results);
        view.updated = Some(now);
        self.status = format!("{} refreshed at {}: {count} records", view.name, now.format("%H:%M:%S"));
        self.clamp_selection();
    }

    // -- tabs ----------------------------------------------------------------

    pub fn next_source(&mut self) {
        if self.sources.is_empty() {
            return;
        }
        self.selected = (self.selected + 1) % self.sources.len();
        self.list_state.select(None);
    }

    pub fn previous_source(&mut self) {
        if self.sources.is_empty() {
            return;
        }
        self.selected = (self.selected + self.sources.len() - 1) % self.sources.len();
        self.list_state.select(None);
    }

    // -- navigation ----------------------------------------------------------

    fn row_count(&self) -> usize {
        self.current().map_or(0, SourceView::len)
    }

    /// Keep the selection inside the list after it shrinks.
    fn clamp_selection(&mut self) {
        let rows = self.row_count();
        match self.list_state.selected() {
            Some(_) if rows == 0 => self.list_state.select(None),
            Some(i) if i >= rows => self.list_state.select(Some(rows - 1)),
            _ => {}
        }
    }

    pub fn select_next(&mut self) {
        let rows = self.row_count();
        if rows == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(rows - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.row_count() == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if self.row_count() > 0 {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let rows = self.row_count();
        if rows > 0 {
            self.list_state.select(Some(rows - 1));
        }
    }
}
