//! asana-board: a live-updating Asana dashboard for the terminal.
//!
//! `watch` (the default) runs every configured datasource on its timer and
//! shows the latest results.  `snapshot` refreshes each datasource once and
//! prints the results as JSON or widget HTML.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use asana_board::app::{App, SourceView};
use asana_board::asana::{AsanaApi, AsanaClient};
use asana_board::config::Config;
use asana_board::input::{self, Action};
use asana_board::poll::{Update, UpdateCallback};
use asana_board::registry::{reload_all, DatasourceHandle, Registry};
use asana_board::source::ResultSet;
use asana_board::ui;
use asana_board::widgets::WidgetRenderer;

#[derive(Debug, Parser)]
#[command(name = "asana-board", version, about = "Live Asana dashboard for the terminal")]
struct Cli {
    /// Dashboard config file
    #[arg(long, default_value = "asana-board.toml")]
    config: PathBuf,

    /// Asana personal access token for datasources without their own key
    #[arg(long, env = "ASANA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Where log output goes (the terminal belongs to the dashboard)
    #[arg(long, default_value = "asana-board.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the live dashboard
    Watch,
    /// Refresh every datasource once and print the results
    Snapshot {
        /// Print widget HTML instead of JSON
        #[arg(long)]
        html: bool,
        /// Seconds to wait for all datasources to publish
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen.  When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before printing a panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("asana_board=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    // Datasource timers are spawned from the synchronous event loop.
    let _runtime_guard = runtime.enter();

    let config = load_config(&cli)?;
    let mut client = AsanaClient::new(config.auth).context("failed to build HTTP client")?;
    if let Some(url) = &config.base_url {
        client = client.with_base_url(url.clone());
    }
    let api: Arc<dyn AsanaApi> = Arc::new(client);

    match cli.command {
        None | Some(Command::Watch) => watch(&cli, config, api),
        Some(Command::Snapshot { html, timeout }) => runtime.block_on(snapshot(
            config,
            api,
            html,
            Duration::from_secs(timeout),
        )),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.apply_default_key(cli.api_key.as_deref());
    Ok(config)
}

/// Construct one handle per configured datasource.
fn start_datasources(
    registry: &Registry,
    config: Config,
    api: &Arc<dyn AsanaApi>,
    on_update: &UpdateCallback,
) -> Result<Vec<DatasourceHandle>> {
    config
        .datasources
        .into_iter()
        .map(|entry| {
            registry
                .new_instance(
                    &entry.name,
                    &entry.type_name,
                    entry.settings,
                    Arc::clone(api),
                    Arc::clone(on_update),
                )
                .with_context(|| format!("datasource {:?}", entry.name))
        })
        .collect()
}

fn channel_callback() -> (UpdateCallback, mpsc::UnboundedReceiver<Update>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: UpdateCallback = Arc::new(move |update| {
        // Receiver gone means the host is shutting down.
        let _ = tx.send(update);
    });
    (callback, rx)
}

// ---------------------------------------------------------------------------
// watch
// ---------------------------------------------------------------------------

fn watch(cli: &Cli, config: Config, api: Arc<dyn AsanaApi>) -> Result<()> {
    install_panic_hook();

    let registry = Registry::default();
    let (on_update, mut rx) = channel_callback();
    let views = config
        .datasources
        .iter()
        .map(|e| SourceView::new(&e.name, &e.type_name))
        .collect();
    let mut handles = start_datasources(&registry, config, &api, &on_update)?;
    info!(count = handles.len(), "dashboard started");

    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(views);

    // ~10 fps.  Each iteration drains published updates, renders, then
    // waits up to one tick for a key.
    let tick_rate = Duration::from_millis(100);

    while !app.quit {
        while let Ok(update) = rx.try_recv() {
            app.apply_update(update);
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                match input::handle_key_event(&mut app, key) {
                    Some(Action::RefreshSelected) => {
                        if let Some(handle) = handles.get(app.selected) {
                            handle.update_now();
                            app.status = format!("Refreshing {}…", handle.name());
                        }
                    }
                    Some(Action::ReloadConfig) => {
                        app.status = match reload(cli, &mut handles) {
                            Ok(updated) => format!("Config reloaded: {updated} datasources updated"),
                            Err(e) => {
                                warn!(error = %format!("{e:#}"), "config reload failed");
                                format!("Reload failed: {e:#}")
                            }
                        };
                    }
                    None => {}
                }
            }
        }
    }

    for handle in &mut handles {
        handle.on_dispose();
    }
    info!("dashboard stopped");
    Ok(())
}

/// Re-read the config file and push its settings to the running
/// datasources.  On error every datasource keeps its current settings.
fn reload(cli: &Cli, handles: &mut [DatasourceHandle]) -> Result<usize> {
    let config = load_config(cli)?;
    let updated = reload_all(handles, config.datasources)?;
    Ok(updated)
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

async fn snapshot(config: Config, api: Arc<dyn AsanaApi>, html: bool, timeout: Duration) -> Result<()> {
    let registry = Registry::default();
    let (on_update, mut rx) = channel_callback();
    let mut handles = start_datasources(&registry, config, &api, &on_update)?;
    drop(on_update);

    for handle in &handles {
        handle.update_now();
    }

    let mut results: BTreeMap<String, Arc<ResultSet>> = BTreeMap::new();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    while results.len() < handles.len() {
        tokio::select! {
            Some(update) = rx.recv() => {
                results.entry(update.source).or_insert(update.results);
            }
            _ = &mut deadline => break,
        }
    }

    for handle in &mut handles {
        handle.on_dispose();
    }

    for handle in &handles {
        if !results.contains_key(handle.name()) {
            warn!(source = handle.name(), "no results before timeout");
            eprintln!("{}: no results within {}s (see log)", handle.name(), timeout.as_secs());
        }
    }

    if html {
        let renderer = WidgetRenderer::new().context("failed to load widget templates")?;
        let today = chrono::Local::now().date_naive();
        for (name, set) in &results {
            let markup = renderer
                .render(set, today)
                .with_context(|| format!("failed to render {name:?}"))?;
            println!("<!-- {name} -->\n{markup}");
        }
    } else {
        let view: BTreeMap<&str, &ResultSet> =
            results.iter().map(|(k, v)| (k.as_str(), v.as_ref())).collect();
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}
