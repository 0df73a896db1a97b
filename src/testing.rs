//! In-memory [`AsanaApi`] used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::asana::{ApiKey, AsanaApi, Task, UserDetail, UserRef, Workspace};
use crate::error::AsanaError;

#[derive(Default)]
pub struct MockApi {
    pub workspaces: Vec<Workspace>,
    pub users: Vec<UserRef>,
    /// Profile and response delay per user id.
    pub details: HashMap<String, (UserDetail, Duration)>,
    pub tasks: HashMap<String, Vec<Task>>,
    /// Delay applied to every list call.
    pub list_delay: Duration,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub keys_seen: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn with_workspaces(workspaces: Vec<Workspace>) -> Self {
        Self {
            workspaces,
            ..Self::default()
        }
    }

    /// Users whose `get_user` calls resolve after the given delays.
    pub fn with_users(users: &[(&str, &str, u64)]) -> Self {
        let mut api = Self::default();
        for (gid, name, delay_ms) in users {
            api.users.push(UserRef::new(*gid, *name));
            api.details.insert(
                gid.to_string(),
                (UserDetail::new(*gid, *name), Duration::from_millis(*delay_ms)),
            );
        }
        api
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn last_key(&self) -> Option<String> {
        self.keys_seen.lock().unwrap().last().cloned()
    }

    async fn enter(&self, key: &ApiKey, delay: Duration) -> Result<(), AsanaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen.lock().unwrap().push(key.expose().to_string());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AsanaError::Status {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AsanaApi for MockApi {
    async fn list_workspaces(&self, key: &ApiKey) -> Result<Vec<Workspace>, AsanaError> {
        self.enter(key, self.list_delay).await?;
        Ok(self.workspaces.clone())
    }

    async fn list_users(&self, key: &ApiKey, _workspace_id: &str) -> Result<Vec<UserRef>, AsanaError> {
        self.enter(key, self.list_delay).await?;
        Ok(self.users.clone())
    }

    async fn get_user(&self, key: &ApiKey, user_id: &str) -> Result<UserDetail, AsanaError> {
        let (user, delay) = self
            .details
            .get(user_id)
            .cloned()
            .ok_or_else(|| AsanaError::Status {
                status: 404,
                message: format!("no user {user_id}"),
            })?;
        self.enter(key, delay).await?;
        Ok(user)
    }

    async fn list_user_tasks(
        &self,
        key: &ApiKey,
        user_id: &str,
        _workspace_id: &str,
    ) -> Result<Vec<Task>, AsanaError> {
        self.enter(key, self.list_delay).await?;
        Ok(self.tasks.get(user_id).cloned().unwrap_or_default())
    }
}
