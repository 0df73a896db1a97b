//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! ## For contributors
//!
//! * The layout is three rows: datasource tabs, the selected datasource's
//!   records, and a one-line status bar.
//! * Each [`ResultSet`] variant gets its own row format in [`record_lines`].

use chrono::NaiveDate;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs},
    Frame,
};

use crate::app::App;
use crate::source::ResultSet;
use crate::widgets::scheduled_for;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [tabs_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_tabs(app, frame, tabs_area);
    draw_records(app, frame, main_area);
    draw_status_bar(app, frame, status_area);
}

fn draw_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles: Vec<Line> = app
        .sources
        .iter()
        .map(|s| Line::from(format!(" {} ", s.name)))
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

/// Render the selected datasource's records.
fn draw_records(app: &mut App, frame: &mut Frame, area: Rect) {
    let today = chrono::Local::now().date_naive();
    let (title, items) = match app.current() {
        Some(view) => {
            let updated = view
                .updated
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".into());
            let items = view
                .results
                .as_deref()
                .map(|r| record_lines(r, today))
                .unwrap_or_default()
                .into_iter()
                .map(ListItem::new)
                .collect::<Vec<_>>();
            (format!(" {} [{}] updated {updated} ", view.name, view.type_name), items)
        }
        None => (" asana-board ".to_string(), Vec::new()),
    };

    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// One display line per record.
pub fn record_lines(results: &ResultSet, today: NaiveDate) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    match results {
        ResultSet::Workspaces(workspaces) => workspaces
            .iter()
            .map(|w| {
                Line::from(vec![
                    Span::styled(format!("{:<18}", w.gid), dim),
                    Span::raw(" "),
                    Span::raw(w.name.clone()),
                ])
            })
            .collect(),
        ResultSet::Users(users) => users
            .iter()
            .map(|u| {
                Line::from(vec![
                    Span::raw(format!("{:<24}", u.name)),
                    Span::raw(" "),
                    Span::styled(
                        u.email.clone().unwrap_or_else(|| "-".into()),
                        Style::default().fg(Color::Cyan),
                    ),
                ])
            })
            .collect(),
        ResultSet::Tasks(tasks) => tasks
            .iter()
            .map(|t| {
                let due = t
                    .due_on
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "no date".into());
                let mark = if t.completed { "✓" } else { " " };
                let due_style = match t.due_on {
                    Some(d) if !t.completed && d < today => Style::default().fg(Color::Red),
                    Some(d) if !t.completed && d == today => Style::default().fg(Color::Yellow),
                    _ => dim,
                };
                Line::from(vec![
                    Span::raw(format!("[{mark}] ")),
                    Span::styled(format!("{due:<10}"), due_style),
                    Span::raw(" "),
                    Span::raw(t.name.clone()),
                ])
            })
            .collect(),
        ResultSet::UsersWithTasks(entries) => entries
            .iter()
            .map(|e| {
                let today_count = scheduled_for(&e.tasks, today).count();
                let open = e.tasks.iter().filter(|t| !t.completed).count();
                Line::from(vec![
                    Span::raw(format!("{:<24}", e.user.name)),
                    Span::raw(" "),
                    Span::styled(format!("{today_count} today"), Style::default().fg(Color::Yellow)),
                    Span::raw("  "),
                    Span::styled(format!("{open} open"), Style::default().fg(Color::Green)),
                ])
            })
            .collect(),
    }
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let count = app.current().map_or(0, |v| v.len());
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(format!("{count} records"), Style::default().fg(Color::Green)),
        Span::raw("  q: quit  ↑/↓: scroll  Tab: source  r: refresh  R: reload"),
    ]));
    frame.render_widget(status, area);
}
