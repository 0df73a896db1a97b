use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{default_refresh, require_key, require_refresh, DataSource, ResultSet};
use crate::asana::{ApiKey, AsanaApi};
use crate::error::{AsanaError, ConfigError};

/// Workspaces visible to the API key's owner, republished verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspacesSource {
    #[serde(default)]
    pub api_key: ApiKey,
    /// Seconds between scheduled fetches.
    #[serde(default = "default_refresh")]
    pub refresh_time: u64,
}

#[async_trait]
impl DataSource for WorkspacesSource {
    fn type_name(&self) -> &'static str {
        "asana_workspaces"
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_time)
    }

    fn validate(&self, source_name: &str) -> Result<(), ConfigError> {
        require_key(source_name, &self.api_key)?;
        require_refresh(source_name, self.refresh_time)
    }

    async fn fetch(&self, api: &dyn AsanaApi) -> Result<ResultSet, AsanaError> {
        let workspaces = api.list_workspaces(&self.api_key).await?;
        Ok(ResultSet::Workspaces(workspaces))
    }
}
