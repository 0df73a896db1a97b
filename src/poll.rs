//! Polling datasource lifecycle.
//!
//! A [`PollingDatasource`] owns one recurring timer, the current settings
//! snapshot, and the update callback.  Every timer tick (and every
//! [`update_now`](PollingDatasource::update_now)) spawns an independent
//! fetch cycle task that reads the settings snapshot, runs the variant's
//! fetch, and publishes the resulting [`ResultSet`].
//!
//! ```text
//!            construct                     dispose
//!   ─────────────────────► Scheduled ───────────────────► Idle
//!                           │     ▲
//!          tick / update_now│     │cycle finished
//!                           ▼     │
//!                           Fetching
//! ```
//!
//! ## Behaviour worth knowing
//!
//! * Nothing is fetched on construction; the first tick fires one full
//!   refresh interval later.
//! * Settings are validated on construction and on every change, so the
//!   timer never sees a zero interval.
//! * [`on_settings_changed`](PollingDatasource::on_settings_changed) swaps
//!   the settings but keeps the timer's period.  Call
//!   [`reschedule`](PollingDatasource::reschedule) to apply a new interval.
//! * Manual and scheduled cycles may overlap; each publishes its own
//!   complete result set.
//! * A failed cycle is logged and dropped.  The host keeps whatever was
//!   published last and the timer keeps ticking.
//! * After [`dispose`](PollingDatasource::dispose) nothing is published,
//!   including by cycles that were already in flight.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::asana::AsanaApi;
use crate::error::ConfigError;
use crate::source::{DataSource, ResultSet};

/// One publication from a datasource to the host.
#[derive(Debug, Clone)]
pub struct Update {
    /// Name of the datasource instance that produced it.
    pub source: String,
    pub results: Arc<ResultSet>,
}

/// Host callback invoked with every successfully fetched result set.
pub type UpdateCallback = Arc<dyn Fn(Update) + Send + Sync>;

/// Shared settings snapshot.
pub type Settings = Arc<dyn DataSource>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasourceState {
    /// No timer. Terminal once disposed.
    Idle,
    /// Timer armed, no fetch in flight.
    Scheduled,
    /// At least one fetch cycle in flight.
    Fetching,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Timer,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => f.write_str("timer"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// State shared between the handle, the timer task, and cycle tasks.
struct Shared {
    name: String,
    api: Arc<dyn AsanaApi>,
    on_update: UpdateCallback,
    cancel: CancellationToken,
    in_flight: AtomicUsize,
    cycles: AtomicU64,
}

/// Decrements the in-flight count when a cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A datasource instance: settings, timer, and update callback.
///
/// Must be constructed inside a tokio runtime.  Dropping the value disposes
/// it.
pub struct PollingDatasource {
    shared: Arc<Shared>,
    settings: watch::Sender<Settings>,
    timer: Option<JoinHandle<()>>,
}

impl PollingDatasource {
    /// Create the datasource and arm its timer at the settings' interval.
    pub fn new(
        name: impl Into<String>,
        settings: Settings,
        api: Arc<dyn AsanaApi>,
        on_update: UpdateCallback,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        check_settings(&name, settings.as_ref())?;
        let period = settings.refresh_interval();
        let (tx, _) = watch::channel(settings);

        let mut datasource = Self {
            shared: Arc::new(Shared {
                name,
                api,
                on_update,
                cancel: CancellationToken::new(),
                in_flight: AtomicUsize::new(0),
                cycles: AtomicU64::new(0),
            }),
            settings: tx,
            timer: None,
        };
        datasource.arm_timer(period);
        Ok(datasource)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The settings snapshot the next fetch cycle will use.
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn state(&self) -> DatasourceState {
        if self.timer.is_none() || self.shared.cancel.is_cancelled() {
            DatasourceState::Idle
        } else if self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            DatasourceState::Fetching
        } else {
            DatasourceState::Scheduled
        }
    }

    /// Replace the settings used by subsequent fetch cycles.
    ///
    /// The timer keeps its original period.  Invalid settings are rejected
    /// and the current ones stay in place.
    pub fn on_settings_changed(&self, settings: Settings) -> Result<(), ConfigError> {
        check_settings(&self.shared.name, settings.as_ref())?;
        let current = settings.refresh_interval();
        let previous = self.settings.send_replace(settings);
        if previous.refresh_interval() == current {
            debug!(source = %self.shared.name, "settings updated");
        } else {
            debug!(
                source = %self.shared.name,
                interval_secs = current.as_secs(),
                "settings updated; new refresh interval takes effect on reschedule"
            );
        }
        Ok(())
    }

    /// Re-arm the timer at the current settings' refresh interval.
    pub fn reschedule(&mut self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        let period = self.settings.borrow().refresh_interval();
        self.arm_timer(period);
    }

    /// Run one fetch cycle now, outside the timer schedule.
    pub fn update_now(&self) {
        if self.shared.cancel.is_cancelled() {
            debug!(source = %self.shared.name, "update requested after dispose; ignoring");
            return;
        }
        spawn_cycle(self.shared.clone(), self.settings(), Trigger::Manual);
    }

    /// Stop the timer and suppress any further publication.
    ///
    /// Idempotent.
    pub fn dispose(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!(source = %self.shared.name, "datasource disposed");
        }
        self.shared.cancel.cancel();
    }

    fn arm_timer(&mut self, period: Duration) {
        if let Some(old) = self.timer.take() {
            old.abort();
        }

        let shared = self.shared.clone();
        let settings = self.settings.subscribe();
        let first_tick = Instant::now() + period;
        debug!(source = %shared.name, period_secs = period.as_secs(), "arming refresh timer");

        self.timer = Some(tokio::spawn(async move {
            let mut ticks = time::interval_at(first_tick, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shared.cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        let snapshot = settings.borrow().clone();
                        spawn_cycle(shared.clone(), snapshot, Trigger::Timer);
                    }
                }
            }
        }));
    }
}

impl Drop for PollingDatasource {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PollingDatasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingDatasource")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn check_settings(name: &str, settings: &dyn DataSource) -> Result<(), ConfigError> {
    settings.validate(name)?;
    if settings.refresh_interval().is_zero() {
        return Err(ConfigError::Invalid {
            source_name: name.to_string(),
            message: "refresh interval must be positive".into(),
        });
    }
    Ok(())
}

fn spawn_cycle(shared: Arc<Shared>, settings: Settings, trigger: Trigger) {
    tokio::spawn(async move { run_cycle(&shared, settings.as_ref(), trigger).await });
}

async fn run_cycle(shared: &Shared, settings: &dyn DataSource, trigger: Trigger) {
    let _guard = InFlight::enter(&shared.in_flight);
    let cycle = shared.cycles.fetch_add(1, Ordering::SeqCst) + 1;
    let started = Instant::now();
    debug!(source = %shared.name, cycle, %trigger, "fetch cycle started");

    let result = tokio::select! {
        () = shared.cancel.cancelled() => {
            debug!(source = %shared.name, cycle, "fetch cycle abandoned after dispose");
            return;
        }
        result = settings.fetch(shared.api.as_ref()) => result,
    };

    match result {
        Ok(results) => {
            if shared.cancel.is_cancelled() {
                return;
            }
            info!(
                source = %shared.name,
                cycle,
                %trigger,
                records = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "published"
            );
            (shared.on_update)(Update {
                source: shared.name.clone(),
                results: Arc::new(results),
            });
        }
        Err(e) => {
            warn!(
                source = %shared.name,
                cycle,
                %trigger,
                error = %e,
                "fetch cycle failed; keeping previous results"
            );
        }
    }
}
