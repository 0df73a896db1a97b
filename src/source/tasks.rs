use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{default_refresh, require_id, require_key, require_refresh, DataSource, ResultSet};
use crate::asana::{ApiKey, AsanaApi};
use crate::error::{AsanaError, ConfigError};

/// Tasks assigned to one user within one workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct UserTasksSource {
    #[serde(default)]
    pub api_key: ApiKey,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_refresh")]
    pub refresh_time: u64,
}

#[async_trait]
impl DataSource for UserTasksSource {
    fn type_name(&self) -> &'static str {
        "asana_user_tasks"
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_time)
    }

    fn validate(&self, source_name: &str) -> Result<(), ConfigError> {
        require_key(source_name, &self.api_key)?;
        require_id(source_name, "workspace_id", &self.workspace_id)?;
        require_id(source_name, "user_id", &self.user_id)?;
        require_refresh(source_name, self.refresh_time)
    }

    async fn fetch(&self, api: &dyn AsanaApi) -> Result<ResultSet, AsanaError> {
        debug!(user_id = %self.user_id, workspace_id = %self.workspace_id, "fetching user tasks");
        let tasks = api
            .list_user_tasks(&self.api_key, &self.user_id, &self.workspace_id)
            .await?;
        Ok(ResultSet::Tasks(tasks))
    }
}
