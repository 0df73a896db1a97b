//! Workspace user listings with per-user detail fan-out.
//!
//! Both variants list the workspace's users, then issue one detail request
//! per user concurrently.  Results accumulate in completion order and are
//! returned only once every request has finished, so a cycle either yields
//! the complete list or fails as a whole.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, TryStreamExt};
use serde::Deserialize;
use tracing::debug;

use super::{
    default_refresh, default_true, require_id, require_key, require_refresh, DataSource, ResultSet,
};
use crate::asana::{ApiKey, AsanaApi, UserRef, UserWithTasks};
use crate::error::{AsanaError, ConfigError};

/// Full profiles for every user in a workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersSource {
    #[serde(default)]
    pub api_key: ApiKey,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default = "default_refresh")]
    pub refresh_time: u64,
    /// Sort by display name; otherwise records keep completion order.
    #[serde(default = "default_true")]
    pub sort_by_name: bool,
}

/// Full profiles plus assigned tasks for every user in a workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersWithTasksSource {
    #[serde(default)]
    pub api_key: ApiKey,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default = "default_refresh")]
    pub refresh_time: u64,
    #[serde(default = "default_true")]
    pub sort_by_name: bool,
}

/// List the workspace's users, dropping repeated ids.
async fn distinct_users(
    api: &dyn AsanaApi,
    key: &ApiKey,
    workspace_id: &str,
) -> Result<Vec<UserRef>, AsanaError> {
    let mut seen = HashSet::new();
    let users: Vec<UserRef> = api
        .list_users(key, workspace_id)
        .await?
        .into_iter()
        .filter(|u| seen.insert(u.gid.clone()))
        .collect();
    debug!(workspace_id, count = users.len(), "fanning out user lookups");
    Ok(users)
}

#[async_trait]
impl DataSource for UsersSource {
    fn type_name(&self) -> &'static str {
        "asana_users"
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_time)
    }

    fn validate(&self, source_name: &str) -> Result<(), ConfigError> {
        require_key(source_name, &self.api_key)?;
        require_id(source_name, "workspace_id", &self.workspace_id)?;
        require_refresh(source_name, self.refresh_time)
    }

    async fn fetch(&self, api: &dyn AsanaApi) -> Result<ResultSet, AsanaError> {
        let key = &self.api_key;
        let refs = distinct_users(api, key, &self.workspace_id).await?;

        let mut pending: FuturesUnordered<_> =
            refs.iter().map(|u| api.get_user(key, &u.gid)).collect();

        let mut users = Vec::with_capacity(refs.len());
        while let Some(user) = pending.try_next().await? {
            users.push(user);
        }

        if self.sort_by_name {
            users.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(ResultSet::Users(users))
    }
}

#[async_trait]
impl DataSource for UsersWithTasksSource {
    fn type_name(&self) -> &'static str {
        "asana_users_with_tasks"
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_time)
    }

    fn validate(&self, source_name: &str) -> Result<(), ConfigError> {
        require_key(source_name, &self.api_key)?;
        require_id(source_name, "workspace_id", &self.workspace_id)?;
        require_refresh(source_name, self.refresh_time)
    }

    async fn fetch(&self, api: &dyn AsanaApi) -> Result<ResultSet, AsanaError> {
        let key = &self.api_key;
        let workspace_id = self.workspace_id.as_str();
        let refs = distinct_users(api, key, workspace_id).await?;

        let mut pending: FuturesUnordered<_> = refs
            .iter()
            .map(|u| async move {
                let (user, tasks) = futures::try_join!(
                    api.get_user(key, &u.gid),
                    api.list_user_tasks(key, &u.gid, workspace_id),
                )?;
                Ok::<_, AsanaError>(UserWithTasks { user, tasks })
            })
            .collect();

        let mut entries = Vec::with_capacity(refs.len());
        while let Some(entry) = pending.try_next().await? {
            entries.push(entry);
        }

        if self.sort_by_name {
            entries.sort_by(|a, b| a.user.name.cmp(&b.user.name));
        }
        Ok(ResultSet::UsersWithTasks(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asana::Task;
    use crate::testing::MockApi;

    fn users_source(sort_by_name: bool) -> UsersSource {
        UsersSource {
            api_key: ApiKey::new("k"),
            workspace_id: "w".into(),
            refresh_time: 60,
            sort_by_name,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_completion_yields_every_user_once() {
        // "2" resolves before "1".
        let api = MockApi::with_users(&[("1", "Zed", 50), ("2", "Amy", 10)]);

        let results = users_source(false).fetch(&api).await.unwrap();

        let mut ids = results.ids();
        assert_eq!(ids, vec!["2", "1"], "completion order is kept when unsorted");
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sorts_by_name_when_asked() {
        let api = MockApi::with_users(&[("1", "Zed", 10), ("2", "Amy", 50), ("3", "Kim", 30)]);

        let results = users_source(true).fetch(&api).await.unwrap();

        match results {
            ResultSet::Users(users) => {
                let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
                assert_eq!(names, vec!["Amy", "Kim", "Zed"]);
            }
            other => panic!("expected users, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_refs_are_looked_up_once() {
        let mut api = MockApi::with_users(&[("1", "Ada", 0)]);
        api.users.push(UserRef::new("1", "Ada"));

        let results = users_source(true).fetch(&api).await.unwrap();

        assert_eq!(results.ids(), vec!["1"]);
        // list_users + one get_user
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_lookup_fails_the_cycle() {
        let mut api = MockApi::with_users(&[("1", "Ada", 0)]);
        api.users.push(UserRef::new("404", "Ghost"));

        let err = users_source(true).fetch(&api).await.unwrap_err();
        assert!(matches!(err, AsanaError::Status { status: 404, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn users_with_tasks_pairs_profiles_and_tasks() {
        let mut api = MockApi::with_users(&[("1", "Ada", 20), ("2", "Bob", 5)]);
        api.tasks.insert("1".into(), vec![Task::new("t1", "Review")]);

        let src = UsersWithTasksSource {
            api_key: ApiKey::new("k"),
            workspace_id: "w".into(),
            refresh_time: 60,
            sort_by_name: true,
        };

        match src.fetch(&api).await.unwrap() {
            ResultSet::UsersWithTasks(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].user.name, "Ada");
                assert_eq!(entries[0].tasks.len(), 1);
                assert!(entries[1].tasks.is_empty());
            }
            other => panic!("expected users with tasks, got {other:?}"),
        }
    }

    #[test]
    fn workspace_is_required() {
        let src = UsersSource {
            workspace_id: " ".into(),
            ..users_source(true)
        };
        let err = src.validate("users").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "workspace_id", .. }));
    }
}
