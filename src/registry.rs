//! Datasource plugin registry.
//!
//! Hosts know datasources only by type name and a raw settings table.  The
//! registry turns that pair into a typed, validated [`Settings`] value and a
//! running [`PollingDatasource`], and [`DatasourceHandle`] forwards the
//! host's lifecycle calls to it.
//!
//! ## For contributors
//!
//! Registering a new datasource kind means adding one [`PluginDefinition`]
//! to [`BUILTIN_PLUGINS`] that points at the variant's settings struct via
//! [`parse_as`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::asana::AsanaApi;
use crate::config::DatasourceEntry;
use crate::error::ConfigError;
use crate::poll::{DatasourceState, PollingDatasource, Settings, UpdateCallback};
use crate::source::{
    DataSource, UserTasksSource, UsersSource, UsersWithTasksSource, WorkspacesSource,
};

/// One user-editable setting, as shown by a host's settings form.
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Parses a raw settings table into a typed settings value.
pub type ParseFn = fn(toml::Table) -> Result<Settings, toml::de::Error>;

/// Metadata and constructor for one datasource type.
#[derive(Debug, Clone, Copy)]
pub struct PluginDefinition {
    pub type_name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub settings: &'static [SettingDef],
    pub parse: ParseFn,
}

/// [`ParseFn`] for any deserializable [`DataSource`].
pub fn parse_as<T>(raw: toml::Table) -> Result<Settings, toml::de::Error>
where
    T: DataSource + DeserializeOwned + 'static,
{
    let settings: T = toml::Value::Table(raw).try_into()?;
    Ok(Arc::new(settings))
}

const API_KEY: SettingDef = SettingDef {
    name: "api_key",
    display_name: "API Key",
    description: "Asana personal access token",
    required: true,
};

const WORKSPACE_ID: SettingDef = SettingDef {
    name: "workspace_id",
    display_name: "Workspace ID",
    description: "Workspace to read users or tasks from",
    required: true,
};

const USER_ID: SettingDef = SettingDef {
    name: "user_id",
    display_name: "User ID",
    description: "Assignee whose tasks are listed",
    required: true,
};

const REFRESH_TIME: SettingDef = SettingDef {
    name: "refresh_time",
    display_name: "Refresh Time",
    description: "Seconds between refreshes",
    required: false,
};

const SORT_BY_NAME: SettingDef = SettingDef {
    name: "sort_by_name",
    display_name: "Sort by Name",
    description: "Order users by name instead of arrival order",
    required: false,
};

pub const BUILTIN_PLUGINS: &[PluginDefinition] = &[
    PluginDefinition {
        type_name: "asana_workspaces",
        display_name: "Asana Workspaces",
        description: "Get workspaces from your Asana profile.",
        settings: &[API_KEY, REFRESH_TIME],
        parse: parse_as::<WorkspacesSource>,
    },
    PluginDefinition {
        type_name: "asana_users",
        display_name: "Asana Users",
        description: "Get users from a workspace in your Asana profile.",
        settings: &[API_KEY, WORKSPACE_ID, REFRESH_TIME, SORT_BY_NAME],
        parse: parse_as::<UsersSource>,
    },
    PluginDefinition {
        type_name: "asana_user_tasks",
        display_name: "Asana User Tasks",
        description: "Get the tasks assigned to a user in a workspace.",
        settings: &[API_KEY, WORKSPACE_ID, USER_ID, REFRESH_TIME],
        parse: parse_as::<UserTasksSource>,
    },
    PluginDefinition {
        type_name: "asana_users_with_tasks",
        display_name: "Asana Users with Tasks",
        description: "Get every user in a workspace together with their tasks.",
        settings: &[API_KEY, WORKSPACE_ID, REFRESH_TIME, SORT_BY_NAME],
        parse: parse_as::<UsersWithTasksSource>,
    },
];

impl PluginDefinition {
    /// Parse and validate a raw settings table for this plugin.
    pub fn parse_settings(
        &self,
        source_name: &str,
        raw: toml::Table,
    ) -> Result<Settings, ConfigError> {
        let settings = (self.parse)(raw).map_err(|e| ConfigError::Invalid {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        settings.validate(source_name)?;
        Ok(settings)
    }
}

/// Known datasource plugins, keyed by type name.
#[derive(Debug, Clone)]
pub struct Registry {
    plugins: BTreeMap<&'static str, PluginDefinition>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self {
            plugins: BTreeMap::new(),
        };
        for plugin in BUILTIN_PLUGINS {
            registry.register(*plugin);
        }
        registry
    }
}

impl Registry {
    /// Add or replace a plugin definition.
    pub fn register(&mut self, plugin: PluginDefinition) {
        if self.plugins.insert(plugin.type_name, plugin).is_some() {
            warn!(type_name = plugin.type_name, "replaced existing datasource plugin");
        }
    }

    pub fn get(&self, type_name: &str) -> Option<&PluginDefinition> {
        self.plugins.get(type_name)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.plugins.values()
    }

    /// Construct a datasource instance from raw host settings.
    ///
    /// The returned handle is already scheduled.  Must be called inside a
    /// tokio runtime.
    pub fn new_instance(
        &self,
        name: &str,
        type_name: &str,
        raw: toml::Table,
        api: Arc<dyn AsanaApi>,
        on_update: UpdateCallback,
    ) -> Result<DatasourceHandle, ConfigError> {
        let plugin = *self
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownType(type_name.to_string()))?;
        let settings = plugin.parse_settings(name, raw)?;

        info!(
            source = name,
            type_name,
            refresh_secs = settings.refresh_interval().as_secs(),
            "datasource created"
        );
        Ok(DatasourceHandle {
            plugin,
            datasource: PollingDatasource::new(name, settings, api, on_update)?,
        })
    }
}

/// Host-side handle to a running datasource.
#[derive(Debug)]
pub struct DatasourceHandle {
    plugin: PluginDefinition,
    datasource: PollingDatasource,
}

impl DatasourceHandle {
    pub fn name(&self) -> &str {
        self.datasource.name()
    }

    pub fn plugin(&self) -> &PluginDefinition {
        &self.plugin
    }

    pub fn state(&self) -> DatasourceState {
        self.datasource.state()
    }

    /// Validate and apply new raw settings.
    ///
    /// On error the current settings stay in place.
    pub fn on_settings_changed(&self, raw: toml::Table) -> Result<(), ConfigError> {
        let settings = self.plugin.parse_settings(self.name(), raw)?;
        self.datasource.on_settings_changed(settings)
    }

    /// Swap in validated settings, re-arming the timer only when the
    /// refresh interval differs from the current one.
    fn apply(&mut self, settings: Settings) -> Result<(), ConfigError> {
        let previous = self.datasource.settings().refresh_interval();
        let next = settings.refresh_interval();
        self.datasource.on_settings_changed(settings)?;
        if next != previous {
            self.datasource.reschedule();
        }
        Ok(())
    }

    /// Re-arm the timer so a changed `refresh_time` takes effect.
    pub fn reschedule(&mut self) {
        self.datasource.reschedule();
    }

    pub fn update_now(&self) {
        self.datasource.update_now();
    }

    pub fn on_dispose(&mut self) {
        self.datasource.dispose();
    }
}

/// Push reloaded config entries to the running datasources of the same
/// name.
///
/// Every matching entry is parsed and validated before any is applied, so
/// on error no datasource changes.  Entries without a running datasource
/// are skipped; so are datasources missing from `entries`.  Returns the
/// number of datasources updated.
pub fn reload_all(
    handles: &mut [DatasourceHandle],
    entries: Vec<DatasourceEntry>,
) -> Result<usize, ConfigError> {
    let mut entries: BTreeMap<String, DatasourceEntry> =
        entries.into_iter().map(|e| (e.name.clone(), e)).collect();

    let mut staged = Vec::with_capacity(handles.len());
    for (index, handle) in handles.iter().enumerate() {
        let Some(entry) = entries.remove(handle.name()) else {
            warn!(source = handle.name(), "datasource missing from reloaded config; keeping current settings");
            continue;
        };
        if entry.type_name != handle.plugin.type_name {
            return Err(ConfigError::Invalid {
                source_name: entry.name,
                message: format!(
                    "type changed from `{}` to `{}`; restart to apply",
                    handle.plugin.type_name, entry.type_name
                ),
            });
        }
        let settings = handle.plugin.parse_settings(&entry.name, entry.settings)?;
        staged.push((index, settings));
    }

    for name in entries.keys() {
        warn!(source = %name, "new datasource ignored until restart");
    }

    let updated = staged.len();
    for (index, settings) in staged {
        handles[index].apply(settings)?;
    }
    info!(updated, "config reloaded");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asana::Workspace;
    use crate::config::Config;
    use crate::poll::Update;
    use crate::testing::MockApi;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn table(src: &str) -> toml::Table {
        src.parse().unwrap()
    }

    fn callback() -> (UpdateCallback, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(move |u| {
                let _ = tx.send(u);
            }),
            rx,
        )
    }

    fn api() -> Arc<MockApi> {
        Arc::new(MockApi::with_workspaces(vec![Workspace::new("1", "A")]))
    }

    #[test]
    fn builtin_plugins_are_registered() {
        let registry = Registry::default();
        let names: Vec<_> = registry.plugins().map(|p| p.type_name).collect();

        assert_eq!(
            names,
            vec![
                "asana_user_tasks",
                "asana_users",
                "asana_users_with_tasks",
                "asana_workspaces"
            ]
        );
    }

    #[test]
    fn every_plugin_requires_an_api_key() {
        for plugin in BUILTIN_PLUGINS {
            assert!(
                plugin.settings.iter().any(|s| s.name == "api_key" && s.required),
                "{} should require api_key",
                plugin.type_name
            );
        }
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let (cb, _rx) = callback();
        let err = Registry::default()
            .new_instance("x", "asana_projects", table("api_key = 'k'"), api(), cb)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType(t) if t == "asana_projects"));
    }

    #[tokio::test]
    async fn missing_workspace_is_rejected() {
        let (cb, _rx) = callback();
        let err = Registry::default()
            .new_instance("people", "asana_users", table("api_key = 'k'"), api(), cb)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "workspace_id", .. }
        ));
    }

    #[tokio::test]
    async fn wrongly_typed_setting_is_invalid() {
        let (cb, _rx) = callback();
        let err = Registry::default()
            .new_instance(
                "ws",
                "asana_workspaces",
                table("api_key = 'k'\nrefresh_time = 'soon'"),
                api(),
                cb,
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn handle_forwards_update_now() {
        let (cb, mut rx) = callback();
        let handle = Registry::default()
            .new_instance("ws", "asana_workspaces", table("api_key = 'k'"), api(), cb)
            .unwrap();

        assert_eq!(handle.state(), DatasourceState::Scheduled);
        handle.update_now();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let update = rx.try_recv().unwrap();
        assert_eq!(update.source, "ws");
        assert_eq!(update.results.ids(), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_settings_change_keeps_current_settings() {
        let api = api();
        let (cb, mut rx) = callback();
        let handle = Registry::default()
            .new_instance("ws", "asana_workspaces", table("api_key = 'first'"), api.clone(), cb)
            .unwrap();

        let err = handle.on_settings_changed(table("api_key = ''")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "api_key", .. }));

        handle.update_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_ok());
        assert_eq!(api.last_key().as_deref(), Some("first"));

        handle.on_settings_changed(table("api_key = 'second'")).unwrap();
        handle.update_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.last_key().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn on_dispose_goes_idle() {
        let (cb, _rx) = callback();
        let mut handle = Registry::default()
            .new_instance("ws", "asana_workspaces", table("api_key = 'k'"), api(), cb)
            .unwrap();

        handle.on_dispose();
        assert_eq!(handle.state(), DatasourceState::Idle);
    }

    // -- reload --------------------------------------------------------------

    fn start(config: &str, api: Arc<MockApi>) -> (Vec<DatasourceHandle>, mpsc::UnboundedReceiver<Update>) {
        let (cb, rx) = callback();
        let registry = Registry::default();
        let handles = Config::parse(config)
            .unwrap()
            .datasources
            .into_iter()
            .map(|e| {
                registry
                    .new_instance(&e.name, &e.type_name, e.settings, api.clone(), cb.clone())
                    .unwrap()
            })
            .collect();
        (handles, rx)
    }

    const TWO_SOURCES: &str = r#"
[[datasource]]
name = "a"
type = "asana_workspaces"
api_key = "first"
refresh_time = 10

[[datasource]]
name = "b"
type = "asana_workspaces"
api_key = "first"
refresh_time = 10
"#;

    fn entries(config: &str) -> Vec<DatasourceEntry> {
        Config::parse(config).unwrap().datasources
    }

    fn count_for(rx: &mut mpsc::UnboundedReceiver<Update>, source: &str) -> usize {
        let mut n = 0;
        while let Ok(update) = rx.try_recv() {
            if update.source == source {
                n += 1;
            }
        }
        n
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_reload_changes_nothing() {
        let api = api();
        let (mut handles, mut rx) = start(TWO_SOURCES, api.clone());

        let err = reload_all(
            &mut handles,
            entries(
                r#"
[[datasource]]
name = "a"
type = "asana_workspaces"
api_key = "second"

[[datasource]]
name = "b"
type = "asana_workspaces"
api_key = "second"
refresh_time = 0
"#,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref source_name, .. } if source_name == "b"));

        handles[0].update_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count_for(&mut rx, "a"), 1);
        assert_eq!(api.last_key().as_deref(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn type_change_is_rejected_before_anything_applies() {
        let api = api();
        let (mut handles, _rx) = start(TWO_SOURCES, api.clone());

        let err = reload_all(
            &mut handles,
            entries(
                r#"
[[datasource]]
name = "a"
type = "asana_workspaces"
api_key = "second"

[[datasource]]
name = "b"
type = "asana_users"
api_key = "second"
workspace_id = "1"
"#,
            ),
        )
        .unwrap_err();
        assert!(err.to_string().contains("restart"));

        handles[0].update_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.last_key().as_deref(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn reload_reschedules_only_changed_intervals() {
        let api = api();
        let (mut handles, mut rx) = start(TWO_SOURCES, api.clone());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let updated = reload_all(
            &mut handles,
            entries(
                r#"
[[datasource]]
name = "a"
type = "asana_workspaces"
api_key = "second"
refresh_time = 10

[[datasource]]
name = "b"
type = "asana_workspaces"
api_key = "second"
refresh_time = 5

[[datasource]]
name = "c"
type = "asana_workspaces"
api_key = "second"
"#,
            ),
        )
        .unwrap();
        assert_eq!(updated, 2);

        // a keeps its phase (tick at 10s); b re-arms at 4s + 5s.
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(count_for(&mut rx, "b"), 1);
        assert_eq!(api.last_key().as_deref(), Some("second"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut a = 0;
        let mut b = 0;
        while let Ok(update) = rx.try_recv() {
            match update.source.as_str() {
                "a" => a += 1,
                "b" => b += 1,
                _ => {}
            }
        }
        assert_eq!((a, b), (1, 0));
    }
}
