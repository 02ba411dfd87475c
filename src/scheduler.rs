// src/scheduler.rs
//! # Event Scheduler
//! Wall-clock driven release watcher.
//!
//! A single worker task owns the catalog view, the trigger history and the
//! subscriber lists. Callers talk to it only through [`EventScheduler`],
//! which forwards subscribe/start/stop as commands over a channel.
//!
//! Per event: "upcoming" fires once when time-until-release is within
//! [4m30s, 5m30s]; "released" fires once within [-30s, +30s]. Both windows
//! are closed intervals. Release is terminal for the event.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::catalog::{EconomicEvent, EventCatalog, EventKey};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::release::{ActualSource, JitterActualSource, ReleasedEvent, UpcomingEvent};

const UPCOMING_MIN_SECS: i64 = 270;
const UPCOMING_MAX_SECS: i64 = 330;
const RELEASE_HALF_WIDTH_SECS: i64 = 30;

pub type UpcomingHandler = Box<dyn Fn(&UpcomingEvent) -> anyhow::Result<()> + Send + Sync>;
pub type ReleasedHandler = Box<dyn Fn(&ReleasedEvent) -> anyhow::Result<()> + Send + Sync>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scheduler_polls_total", "Catalog check passes.");
        describe_counter!("scheduler_upcoming_total", "Upcoming notifications fired.");
        describe_counter!("scheduler_released_total", "Release notifications fired.");
        describe_counter!(
            "scheduler_handler_errors_total",
            "Subscriber handlers that returned an error or panicked."
        );
        describe_gauge!("scheduler_last_poll_ts", "Unix ts of the last check pass.");
    });
}

/// Source of "now" for the check loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Externally advanced clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut g = self.now.lock();
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A notification produced by one check pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Firing {
    Upcoming(UpcomingEvent),
    Released(ReleasedEvent),
}

/// Catalog plus trigger history. Owned by exactly one worker.
pub struct SchedulerState {
    catalog: Arc<EventCatalog>,
    upcoming_fired: HashSet<EventKey>,
    released: HashSet<EventKey>,
    actuals: Box<dyn ActualSource>,
}

impl SchedulerState {
    pub fn new(catalog: Arc<EventCatalog>, actuals: Box<dyn ActualSource>) -> Self {
        Self {
            catalog,
            upcoming_fired: HashSet::new(),
            released: HashSet::new(),
            actuals,
        }
    }

    /// One deterministic pass over the catalog at `now`.
    ///
    /// Trigger history is updated before the firings are returned, so a
    /// repeated pass inside the same window yields nothing.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Firing> {
        let mut out = Vec::new();
        let catalog = Arc::clone(&self.catalog);
        let upcoming_window = chrono::Duration::seconds(UPCOMING_MIN_SECS)
            ..=chrono::Duration::seconds(UPCOMING_MAX_SECS);
        let half_width = chrono::Duration::seconds(RELEASE_HALF_WIDTH_SECS);
        let release_window = -half_width..=half_width;

        for ev in catalog.events() {
            let key = ev.key();
            if self.released.contains(&key) {
                continue;
            }
            // compared at full precision
            let until = ev.timestamp - now;

            if upcoming_window.contains(&until) && self.upcoming_fired.insert(key) {
                out.push(Firing::Upcoming(UpcomingEvent {
                    event: ev.clone(),
                    // truncated toward zero
                    minutes_until: until.num_seconds() / 60,
                }));
            }

            if release_window.contains(&until) {
                self.released.insert(key);
                let actual = self.actuals.actual_for(ev);
                out.push(Firing::Released(ReleasedEvent::new(ev.clone(), actual, now)));
            }
        }
        out
    }

    pub fn has_released(&self, key: &EventKey) -> bool {
        self.released.contains(key)
    }

    pub fn released_count(&self) -> usize {
        self.released.len()
    }
}

/// Ordered handler lists. Failures are isolated per handler.
#[derive(Default)]
pub struct Subscribers {
    upcoming: Vec<UpcomingHandler>,
    released: Vec<ReleasedHandler>,
}

impl Subscribers {
    pub fn on_upcoming(&mut self, h: UpcomingHandler) {
        self.upcoming.push(h);
    }

    pub fn on_released(&mut self, h: ReleasedHandler) {
        self.released.push(h);
    }

    pub fn dispatch(&self, firing: &Firing) {
        match firing {
            Firing::Upcoming(ev) => {
                counter!("scheduler_upcoming_total").increment(1);
                tracing::info!(
                    target: "scheduler",
                    indicator = %ev.event.indicator,
                    event = %ev.event.name,
                    minutes_until = ev.minutes_until,
                    "event upcoming"
                );
                for (i, h) in self.upcoming.iter().enumerate() {
                    report_handler("upcoming", i, catch_unwind(AssertUnwindSafe(|| h(ev))));
                }
            }
            Firing::Released(ev) => {
                counter!("scheduler_released_total").increment(1);
                tracing::info!(
                    target: "scheduler",
                    indicator = %ev.event.indicator,
                    event = %ev.event.name,
                    actual = ?ev.actual,
                    forecast = ?ev.event.forecast,
                    surprise = ev.surprise,
                    "event released"
                );
                for (i, h) in self.released.iter().enumerate() {
                    report_handler("released", i, catch_unwind(AssertUnwindSafe(|| h(ev))));
                }
            }
        }
    }
}

fn report_handler(
    kind: &'static str,
    index: usize,
    res: std::thread::Result<anyhow::Result<()>>,
) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            counter!("scheduler_handler_errors_total").increment(1);
            tracing::warn!(target: "scheduler", kind, handler = index, error = %format!("{e:#}"), "handler failed");
        }
        Err(_) => {
            counter!("scheduler_handler_errors_total").increment(1);
            tracing::warn!(target: "scheduler", kind, handler = index, "handler panicked");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub released: usize,
}

enum Command {
    SubscribeUpcoming(UpcomingHandler),
    SubscribeReleased(ReleasedHandler),
    Start,
    Stop(oneshot::Sender<()>),
    Status(oneshot::Sender<SchedulerStatus>),
}

struct Worker {
    state: SchedulerState,
    subs: Subscribers,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    running: bool,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    None => break,
                    Some(cmd) => self.handle(cmd, &mut ticker),
                },
                _ = ticker.tick(), if self.running => self.check(),
            }
        }
        tracing::debug!(target: "scheduler", "worker exited");
    }

    fn handle(&mut self, cmd: Command, ticker: &mut tokio::time::Interval) {
        match cmd {
            Command::SubscribeUpcoming(h) => self.subs.on_upcoming(h),
            Command::SubscribeReleased(h) => self.subs.on_released(h),
            Command::Start => {
                if !self.running {
                    self.running = true;
                    ticker.reset_immediately();
                    tracing::info!(
                        target: "scheduler",
                        events = self.state.catalog.len(),
                        interval_ms = self.poll_interval.as_millis() as u64,
                        "event scheduler active"
                    );
                }
            }
            Command::Stop(ack) => {
                if self.running {
                    self.running = false;
                    tracing::info!(target: "scheduler", "event scheduler stopped");
                }
                let _ = ack.send(());
            }
            Command::Status(reply) => {
                let _ = reply.send(SchedulerStatus {
                    running: self.running,
                    released: self.state.released_count(),
                });
            }
        }
    }

    fn check(&mut self) {
        let now = self.clock.now();
        let firings = self.state.poll(now);
        counter!("scheduler_polls_total").increment(1);
        gauge!("scheduler_last_poll_ts").set(now.timestamp() as f64);
        tracing::trace!(target: "scheduler", fired = firings.len(), "check pass");
        for f in &firings {
            self.subs.dispatch(f);
        }
    }
}

/// Builder for [`EventScheduler`] with injectable clock and actual source.
pub struct SchedulerBuilder {
    catalog: Arc<EventCatalog>,
    clock: Arc<dyn Clock>,
    actuals: Box<dyn ActualSource>,
    poll_interval: Duration,
    stop_timeout: Duration,
}

impl SchedulerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn actuals(mut self, actuals: Box<dyn ActualSource>) -> Self {
        self.actuals = actuals;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn stop_timeout(mut self, d: Duration) -> Self {
        self.stop_timeout = d;
        self
    }

    pub fn config(self, cfg: &SchedulerConfig) -> Self {
        self.poll_interval(Duration::from_secs(cfg.poll_interval_secs.max(1)))
            .stop_timeout(Duration::from_millis(cfg.stop_timeout_ms))
            .actuals(Box::new(JitterActualSource::new(cfg.seed)))
    }

    /// Spawn the worker on the current tokio runtime. Polling starts on [`EventScheduler::start`].
    pub fn spawn(self) -> EventScheduler {
        ensure_metrics_described();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            state: SchedulerState::new(Arc::clone(&self.catalog), self.actuals),
            subs: Subscribers::default(),
            clock: self.clock,
            poll_interval: self.poll_interval,
            running: false,
        };
        let handle = tokio::spawn(worker.run(rx));
        EventScheduler {
            catalog: self.catalog,
            tx,
            worker: parking_lot::Mutex::new(Some(handle)),
            stop_timeout: self.stop_timeout,
        }
    }
}

/// Handle to the scheduler worker. Cheap queries run against the shared,
/// read-only catalog; everything stateful goes through the worker.
pub struct EventScheduler {
    catalog: Arc<EventCatalog>,
    tx: mpsc::UnboundedSender<Command>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    stop_timeout: Duration,
}

impl EventScheduler {
    pub fn builder(catalog: Arc<EventCatalog>) -> SchedulerBuilder {
        let defaults = SchedulerConfig::default();
        SchedulerBuilder {
            catalog,
            clock: Arc::new(SystemClock),
            actuals: Box::new(JitterActualSource::new(defaults.seed)),
            poll_interval: Duration::from_secs(defaults.poll_interval_secs),
            stop_timeout: Duration::from_millis(defaults.stop_timeout_ms),
        }
    }

    pub fn subscribe_upcoming<F>(&self, f: F) -> Result<(), SchedulerError>
    where
        F: Fn(&UpcomingEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.send(Command::SubscribeUpcoming(Box::new(f)))
    }

    pub fn subscribe_released<F>(&self, f: F) -> Result<(), SchedulerError>
    where
        F: Fn(&ReleasedEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.send(Command::SubscribeReleased(Box::new(f)))
    }

    /// Begin polling. No-op when already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.send(Command::Start)
    }

    /// Stop polling and wait (bounded) until no check pass is in flight.
    /// No-op when already stopped.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Stop(ack_tx)).is_err() {
            return Ok(());
        }
        match tokio::time::timeout(self.stop_timeout, ack_rx).await {
            Ok(_) => Ok(()),
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "stop timed out"
                );
                Err(SchedulerError::StopTimeout(self.stop_timeout.as_millis() as u64))
            }
        }
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx))?;
        rx.await.map_err(|_| SchedulerError::WorkerGone)
    }

    /// Stop polling and end the worker task. Waits at most the stop timeout.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        self.stop().await?;
        let EventScheduler {
            tx,
            worker,
            stop_timeout,
            ..
        } = self;
        drop(tx);
        let handle = worker.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(stop_timeout, handle).await.is_err() {
                return Err(SchedulerError::StopTimeout(stop_timeout.as_millis() as u64));
            }
        }
        Ok(())
    }

    /// Catalog events strictly after `now`, ascending. Ignores trigger history.
    pub fn list_upcoming(&self, now: DateTime<Utc>) -> Vec<EconomicEvent> {
        self.catalog.upcoming(now)
    }

    pub fn list_for_date(&self, date: NaiveDate) -> Vec<EconomicEvent> {
        self.catalog.for_date(date)
    }

    pub fn catalog(&self) -> &Arc<EventCatalog> {
        &self.catalog
    }

    fn send(&self, cmd: Command) -> Result<(), SchedulerError> {
        self.tx.send(cmd).map_err(|_| SchedulerError::WorkerGone)
    }
}
