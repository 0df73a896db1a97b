//! Asana API adapter.
//!
//! [`AsanaApi`] is the seam between the polling datasources and the network.
//! Every operation takes the caller's [`ApiKey`] explicitly so an adapter
//! never carries credentials from one call to the next; the datasource
//! passes whatever key its current settings hold.
//!
//! [`AsanaClient`] is the `reqwest` implementation.  Tests substitute their
//! own implementations to control timing and failures.

mod client;
mod types;

pub use client::{AsanaClient, AuthScheme, API_BASE_URL};
pub use types::{Photo, ProjectRef, Task, UserDetail, UserRef, UserWithTasks, Workspace};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::AsanaError;

/// An Asana API key (personal access token).
///
/// Only checked for presence; the API itself decides whether it is valid.
/// `Debug` output is redacted.
#[derive(Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// The raw key, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Default for ApiKey {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Read-only Asana operations used by the datasources.
#[async_trait]
pub trait AsanaApi: Send + Sync {
    /// Workspaces visible to the key's owner.
    async fn list_workspaces(&self, key: &ApiKey) -> Result<Vec<Workspace>, AsanaError>;

    /// Compact user records for a workspace.
    async fn list_users(&self, key: &ApiKey, workspace_id: &str) -> Result<Vec<UserRef>, AsanaError>;

    /// Full profile for a single user.
    ///
    /// Callers that need details for every user in a workspace issue one of
    /// these per id returned by [`list_users`](AsanaApi::list_users).
    async fn get_user(&self, key: &ApiKey, user_id: &str) -> Result<UserDetail, AsanaError>;

    /// Tasks assigned to `user_id` within `workspace_id`.
    async fn list_user_tasks(
        &self,
        key: &ApiKey,
        user_id: &str,
        workspace_id: &str,
    ) -> Result<Vec<Task>, AsanaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let key = ApiKey::new("0/super-secret");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn whitespace_key_counts_as_empty() {
        assert!(ApiKey::new("   ").is_empty());
        assert!(!ApiKey::new("k").is_empty());
    }
}
