//! `reqwest`-backed [`AsanaApi`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ApiKey, AsanaApi, Task, UserDetail, UserRef, Workspace};
use crate::error::AsanaError;

/// Base URL for the Asana REST API.
pub const API_BASE_URL: &str = "https://app.asana.com/api/1.0";

/// Fields requested for task listings.
const TASK_FIELDS: &str = "gid,name,assignee_status,completed,due_on,projects,projects.name";

/// How the API key is presented to Asana.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>` (personal access tokens).
    #[default]
    Bearer,
    /// HTTP basic auth with the key as user name and an empty password.
    Basic,
}

/// Every successful Asana response wraps its payload in `data`.
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    message: String,
}

/// HTTP client for the Asana API.
///
/// Holds a pooled connection and the auth scheme, but no credentials:
/// the key arrives with each call.
#[derive(Debug, Clone)]
pub struct AsanaClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthScheme,
}

impl AsanaClient {
    pub fn new(auth: AuthScheme) -> Result<Self, AsanaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
            auth,
        })
    }

    /// Point the client at a different API root (self-hosted proxy, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// API root plus `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AsanaError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AsanaError::BaseUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| AsanaError::BaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        key: &ApiKey,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, AsanaError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");

        let request = self.client.get(url).query(query);
        let request = match self.auth {
            AuthScheme::Bearer => request.bearer_auth(key.expose()),
            AuthScheme::Basic => request.basic_auth(key.expose(), Some("")),
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            });
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AsanaError::Auth(message),
                _ => AsanaError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| AsanaError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

/// First message from an Asana error body, if the body is one.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()?
        .errors
        .into_iter()
        .next()
        .map(|e| e.message)
}

#[async_trait]
impl AsanaApi for AsanaClient {
    async fn list_workspaces(&self, key: &ApiKey) -> Result<Vec<Workspace>, AsanaError> {
        self.get(key, &["workspaces"], &[]).await
    }

    async fn list_users(&self, key: &ApiKey, workspace_id: &str) -> Result<Vec<UserRef>, AsanaError> {
        self.get(key, &["workspaces", workspace_id, "users"], &[])
            .await
    }

    async fn get_user(&self, key: &ApiKey, user_id: &str) -> Result<UserDetail, AsanaError> {
        self.get(key, &["users", user_id], &[]).await
    }

    async fn list_user_tasks(
        &self,
        key: &ApiKey,
        user_id: &str,
        workspace_id: &str,
    ) -> Result<Vec<Task>, AsanaError> {
        self.get(
            key,
            &["tasks"],
            &[
                ("assignee", user_id),
                ("workspace", workspace_id),
                ("opt_fields", TASK_FIELDS),
            ],
        )
        .await
    }
}
