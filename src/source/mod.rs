//! Datasource variants.
//!
//! This module defines the [`DataSource`] trait and the [`ResultSet`] every
//! fetch cycle produces.  Each variant is a typed settings struct that knows
//! how to run one fetch cycle against an [`AsanaApi`]:
//!
//! | type name                 | struct                   | publishes          |
//! |---------------------------|--------------------------|--------------------|
//! | `asana_workspaces`        | [`WorkspacesSource`]     | workspaces         |
//! | `asana_users`             | [`UsersSource`]          | user profiles      |
//! | `asana_user_tasks`        | [`UserTasksSource`]      | one user's tasks   |
//! | `asana_users_with_tasks`  | [`UsersWithTasksSource`] | profiles + tasks   |
//!
//! ## For contributors: adding a new variant
//!
//! 1. Create a new file in this directory with a `Deserialize` settings
//!    struct and implement [`DataSource`] for it.
//! 2. Add a [`ResultSet`] variant if it publishes a new record type.
//! 3. Register it in [`crate::registry`].
//!
//! The polling loop, settings updates, and disposal are variant-agnostic.

mod result;
mod tasks;
mod users;
mod workspaces;

pub use result::ResultSet;
pub use tasks::UserTasksSource;
pub use users::{UsersSource, UsersWithTasksSource};
pub use workspaces::WorkspacesSource;

use std::time::Duration;

use async_trait::async_trait;

use crate::asana::{ApiKey, AsanaApi};
use crate::error::{AsanaError, ConfigError};

/// Refresh interval used when a datasource entry does not set one.
pub const DEFAULT_REFRESH_SECS: u64 = 60;

pub(crate) fn default_refresh() -> u64 {
    DEFAULT_REFRESH_SECS
}

pub(crate) fn default_true() -> bool {
    true
}

/// Settings plus fetch logic for one datasource kind.
///
/// A value of this trait is an immutable settings snapshot: a settings
/// change replaces the whole value, and a fetch cycle keeps using the
/// snapshot it started with.
#[async_trait]
pub trait DataSource: Send + Sync + std::fmt::Debug {
    /// Registry type name (e.g. `asana_workspaces`).
    fn type_name(&self) -> &'static str;

    /// Time between scheduled fetch cycles.
    fn refresh_interval(&self) -> Duration;

    /// Reject settings that cannot produce a fetch cycle.
    fn validate(&self, source_name: &str) -> Result<(), ConfigError>;

    /// Run one fetch cycle.
    ///
    /// Any adapter failure aborts the whole cycle; partial results are
    /// never returned.
    async fn fetch(&self, api: &dyn AsanaApi) -> Result<ResultSet, AsanaError>;
}

pub(crate) fn require_key(source_name: &str, key: &ApiKey) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::MissingField {
            source_name: source_name.to_string(),
            field: "api_key",
        });
    }
    Ok(())
}

pub(crate) fn require_id(
    source_name: &str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            source_name: source_name.to_string(),
            field,
        });
    }
    Ok(())
}

pub(crate) fn require_refresh(source_name: &str, refresh_time: u64) -> Result<(), ConfigError> {
    if refresh_time == 0 {
        return Err(ConfigError::Invalid {
            source_name: source_name.to_string(),
            message: "refresh_time must be a positive number of seconds".into(),
        });
    }
    Ok(())
}
