//! asana-board: Asana polling datasources and a live terminal dashboard.
//!
//! ## Architecture overview
//!
//! ```text
//!                 Update      ┌──────────┐  draw()  ┌──────────┐
//! ┌──────────┐  (callback)    │  app.rs  │ ───────► │  ui.rs   │
//! │ poll.rs  │ ─────────────► │ (state)  │          │ (render) │
//! │ (tokio)  │                └──────────┘          └──────────┘
//! └──────────┘                     ▲
//!      │ fetch()                   │ handle_key_event()
//!      ▼                      ┌──────────┐
//! ┌──────────┐                │ input.rs │
//! │ source/  │ ──► asana/     └──────────┘
//! └──────────┘   (HTTP API)
//! ```
//!
//! * **`asana`**: the [`AsanaApi`](asana::AsanaApi) seam, its `reqwest`
//!   client and the API record types.
//! * **`source`**: the [`DataSource`](source::DataSource) trait and one
//!   settings struct per datasource type.
//! * **`poll`**: timer, fetch cycles, settings snapshots and disposal.
//! * **`registry`**: plugin metadata and construction from raw settings.
//! * **`config`**: the TOML dashboard file.
//! * **`widgets`**: HTML fragments rendered from published results.
//! * **`app`**, **`ui`**, **`input`**: the terminal dashboard.

pub mod app;
pub mod asana;
pub mod config;
pub mod error;
pub mod input;
pub mod poll;
pub mod registry;
pub mod source;
pub mod ui;
pub mod widgets;

#[cfg(test)]
mod testing;
