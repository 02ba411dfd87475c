//! # Impact Tracker
//! Follows each released event for an hour: snapshot at release, impact
//! report at every horizon, then archive into a capped in-memory history.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::impact::{
    analyze_historical, HistoricalStats, ImpactAnalyzer, ImpactReport, HISTORICAL_HORIZON,
};
use crate::indicator::Indicator;
use crate::market::{PriceSnapshot, SnapshotProvider};
use crate::release::ReleasedEvent;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_reports_total", "Impact reports computed.");
        describe_counter!("tracker_archived_total", "Tracked events moved to history.");
        describe_gauge!("tracker_active_events", "Events currently being tracked.");
    });
}

/// A released event together with its horizon reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEvent {
    pub id: String,
    pub event: ReleasedEvent,
    pub released_at: DateTime<Utc>,
    pub market_state_at_release: PriceSnapshot,
    /// Horizon label (e.g. `"5m"`) to report.
    pub impacts: BTreeMap<String, ImpactReport>,
    pub tracking: bool,
}

/// Measurement point after release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Horizon {
    pub label: String,
    pub after: Duration,
}

impl Horizon {
    pub fn minutes(m: u64) -> Self {
        Self {
            label: format!("{m}m"),
            after: Duration::from_secs(m * 60),
        }
    }
}

pub struct ImpactTracker {
    provider: Arc<dyn SnapshotProvider>,
    analyzer: Arc<ImpactAnalyzer>,
    horizons: Vec<Horizon>,
    active: RwLock<BTreeMap<String, TrackedEvent>>,
    history: RwLock<VecDeque<TrackedEvent>>,
    history_cap: usize,
}

impl ImpactTracker {
    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        analyzer: Arc<ImpactAnalyzer>,
        cfg: &TrackerConfig,
    ) -> Self {
        let horizons = cfg
            .horizons_minutes
            .iter()
            .copied()
            .map(Horizon::minutes)
            .collect();
        Self::with_horizons(provider, analyzer, horizons, cfg.history_capacity)
    }

    pub fn with_horizons(
        provider: Arc<dyn SnapshotProvider>,
        analyzer: Arc<ImpactAnalyzer>,
        mut horizons: Vec<Horizon>,
        history_cap: usize,
    ) -> Self {
        ensure_metrics_described();
        horizons.sort_by_key(|h| h.after);
        horizons.dedup_by(|a, b| a.after == b.after);
        if !horizons.iter().any(|h| h.label == HISTORICAL_HORIZON) {
            tracing::warn!(
                target: "tracker",
                horizon = HISTORICAL_HORIZON,
                "historical horizon not configured; history stats will stay empty"
            );
        }
        let history_cap = history_cap.clamp(1, 10_000);
        Self {
            provider,
            analyzer,
            horizons,
            active: RwLock::new(BTreeMap::new()),
            history: RwLock::new(VecDeque::with_capacity(history_cap.min(1_000))),
            history_cap,
        }
    }

    /// Capture the release snapshot and register the event as active.
    pub async fn begin(&self, event: ReleasedEvent) -> String {
        let snapshot = self.provider.snapshot().await;
        let released_at = event.released_at;
        let id = format!("{}-{}", event.event.indicator, released_at.timestamp_millis());

        let tracked = TrackedEvent {
            id: id.clone(),
            event,
            released_at,
            market_state_at_release: snapshot,
            impacts: BTreeMap::new(),
            tracking: true,
        };
        let mut active = self.active.write();
        active.insert(id.clone(), tracked);
        gauge!("tracker_active_events").set(active.len() as f64);
        id
    }

    /// Compute and store the report for `label` against the current market.
    /// Returns `None` when `id` is no longer active.
    pub async fn capture(&self, id: &str, label: &str) -> Option<ImpactReport> {
        let (before, event) = {
            let active = self.active.read();
            let t = active.get(id)?;
            (t.market_state_at_release.clone(), t.event.clone())
        };
        let after = self.provider.snapshot().await;
        let report = self.analyzer.compute_impact(&before, &after, &event);

        let mut active = self.active.write();
        let t = active.get_mut(id)?;
        t.impacts.insert(label.to_string(), report.clone());
        counter!("tracker_reports_total").increment(1);
        tracing::info!(
            target: "tracker",
            id,
            horizon = label,
            stress = ?report.overall_stress,
            alignment = ?report.alignment.verdict,
            summary = %report.summary,
            "impact update"
        );
        Some(report)
    }

    /// Move an active event into history.
    pub fn archive(&self, id: &str) -> bool {
        let removed = {
            let mut active = self.active.write();
            let r = active.remove(id);
            gauge!("tracker_active_events").set(active.len() as f64);
            r
        };
        let Some(mut t) = removed else {
            return false;
        };
        t.tracking = false;

        let mut h = self.history.write();
        h.push_back(t);
        while h.len() > self.history_cap {
            h.pop_front();
        }
        counter!("tracker_archived_total").increment(1);
        tracing::info!(target: "tracker", id, "event archived");
        true
    }

    /// Full follow-up for one release: begin, one capture per horizon, archive.
    pub async fn run(self: Arc<Self>, event: ReleasedEvent) {
        let id = self.begin(event).await;
        let start = tokio::time::Instant::now();
        for h in &self.horizons {
            tokio::time::sleep_until(start + h.after).await;
            if self.capture(&id, &h.label).await.is_none() {
                return;
            }
        }
        self.archive(&id);
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn track(self: &Arc<Self>, event: ReleasedEvent) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(event))
    }

    pub fn active(&self) -> Vec<TrackedEvent> {
        self.active.read().values().cloned().collect()
    }

    /// Active first, then archived.
    pub fn get(&self, id: &str) -> Option<TrackedEvent> {
        if let Some(t) = self.active.read().get(id) {
            return Some(t.clone());
        }
        self.history.read().iter().find(|t| t.id == id).cloned()
    }

    /// Last `limit` archived events, optionally filtered by indicator, oldest first.
    pub fn history(&self, indicator: Option<Indicator>, limit: usize) -> Vec<TrackedEvent> {
        let h = self.history.read();
        let filtered: Vec<&TrackedEvent> = h
            .iter()
            .filter(|t| indicator.map_or(true, |i| t.event.event.indicator == i))
            .collect();
        let start = filtered.len().saturating_sub(limit);
        filtered[start..].iter().map(|t| (*t).clone()).collect()
    }

    pub fn stats(&self) -> HistoricalStats {
        let h = self.history.read();
        analyze_historical(h.iter())
    }

    pub fn horizons(&self) -> &[Horizon] {
        &self.horizons
    }
}
