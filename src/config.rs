//! Dashboard configuration file.
//!
//! ```toml
//! api_key = "0/123..."          # optional default for every datasource
//! auth = "bearer"               # or "basic"
//!
//! [[datasource]]
//! name = "people"
//! type = "asana_users"
//! workspace_id = "1200000000000"
//! refresh_time = 300            # seconds
//! ```
//!
//! Everything in a `[[datasource]]` entry other than `name` and `type` is
//! handed to the registry untouched as that datasource's raw settings.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::asana::{ApiKey, AuthScheme};
use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Key used by entries that do not set their own `api_key`.
    pub api_key: Option<ApiKey>,
    #[serde(default)]
    pub auth: AuthScheme,
    /// Overrides the Asana API root.
    pub base_url: Option<String>,
    #[serde(default, rename = "datasource")]
    pub datasources: Vec<DatasourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub settings: toml::Table,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.check_names()?;
        Ok(config)
    }

    /// Fill in `api_key` for entries that lack one.
    ///
    /// `override_key` (from the command line or environment) takes
    /// precedence over the file's top-level key.  Keys set on an entry are
    /// never replaced.
    pub fn apply_default_key(&mut self, override_key: Option<&str>) {
        let default = override_key
            .map(str::to_string)
            .or_else(|| self.api_key.as_ref().map(|k| k.expose().to_string()))
            .filter(|k| !k.trim().is_empty());

        let Some(default) = default else {
            return;
        };

        for entry in &mut self.datasources {
            let missing = entry
                .settings
                .get("api_key")
                .and_then(toml::Value::as_str)
                .map_or(true, |k| k.trim().is_empty());
            if missing {
                entry
                    .settings
                    .insert("api_key".into(), toml::Value::String(default.clone()));
            }
        }
    }

    fn check_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.datasources {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    source_name: entry.type_name.clone(),
                    field: "name",
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid {
                    source_name: entry.name.clone(),
                    message: "datasource names must be unique".into(),
                });
            }
        }
        Ok(())
    }
}
