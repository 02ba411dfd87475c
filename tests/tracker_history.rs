// tests/tracker_history.rs
//
// Release follow-up under paused tokio time: horizon captures, archiving,
// history queries and the historical aggregate.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use macro_impact_tracker::catalog::EconomicEvent;
use macro_impact_tracker::impact::ImpactAnalyzer;
use macro_impact_tracker::indicator::{Importance, Indicator};
use macro_impact_tracker::market::{AssetType, PricePoint, PriceSnapshot, SnapshotProvider};
use macro_impact_tracker::release::ReleasedEvent;
use macro_impact_tracker::tracker::{Horizon, ImpactTracker};

/// Hands out queued snapshots in order, then repeats the last one.
#[derive(Default)]
struct ScriptedProvider {
    frames: Mutex<VecDeque<PriceSnapshot>>,
    last: Mutex<PriceSnapshot>,
}

impl ScriptedProvider {
    fn push(&self, snap: PriceSnapshot) {
        self.frames.lock().push_back(snap);
    }
}

#[async_trait::async_trait]
impl SnapshotProvider for ScriptedProvider {
    async fn snapshot(&self) -> PriceSnapshot {
        match self.frames.lock().pop_front() {
            Some(s) => {
                *self.last.lock() = s.clone();
                s
            }
            None => self.last.lock().clone(),
        }
    }

    async fn history(&self, _symbol: &str, _points: usize) -> Vec<PricePoint> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn spy(price: f64) -> PriceSnapshot {
    PriceSnapshot::new().with_price("SPY", "S&P 500 ETF", AssetType::Equity, price)
}

fn released(indicator: Indicator, at: DateTime<Utc>) -> ReleasedEvent {
    ReleasedEvent::new(
        EconomicEvent {
            indicator,
            name: format!("{indicator} release"),
            timestamp: at,
            forecast: Some(2.5),
            previous: None,
            importance: Importance::High,
        },
        Some(2.7),
        at,
    )
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, d, 8, 30, 0).unwrap()
}

fn tracker(
    provider: Arc<ScriptedProvider>,
    horizons: &[u64],
    cap: usize,
) -> Arc<ImpactTracker> {
    Arc::new(ImpactTracker::with_horizons(
        provider,
        Arc::new(ImpactAnalyzer::default()),
        horizons.iter().copied().map(Horizon::minutes).collect(),
        cap,
    ))
}

#[tokio::test(start_paused = true)]
async fn captures_each_horizon_then_archives() {
    let provider = Arc::new(ScriptedProvider::default());
    provider.push(spy(500.0));
    provider.push(spy(495.0));
    provider.push(spy(490.0));
    let t = tracker(Arc::clone(&provider), &[5, 1], 10);
    assert_eq!(t.horizons()[0].label, "1m", "horizons sorted ascending");

    let handle = t.track(released(Indicator::Cpi, day(13)));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let live = t.active();
    assert_eq!(live.len(), 1);
    assert!(live[0].tracking);
    assert!(live[0].impacts.is_empty());
    let id = live[0].id.clone();
    assert_eq!(id, format!("CPI-{}", day(13).timestamp_millis()));

    tokio::time::sleep(Duration::from_secs(60)).await;
    let one = t.get(&id).expect("still active");
    assert_eq!(one.impacts["1m"].asset_impacts["SPY"].percent_change, -1.0);
    assert!(!one.impacts.contains_key("5m"));

    handle.await.unwrap();
    assert!(t.active().is_empty());
    let done = t.get(&id).expect("archived");
    assert!(!done.tracking);
    assert_eq!(done.impacts["5m"].asset_impacts["SPY"].percent_change, -2.0);
    assert_eq!(done.market_state_at_release.get("SPY").unwrap().price, 500.0);
}

#[tokio::test(start_paused = true)]
async fn history_filter_limit_and_capacity() {
    let provider = Arc::new(ScriptedProvider::default());
    let t = tracker(Arc::clone(&provider), &[1], 3);

    for (ind, d) in [
        (Indicator::Cpi, 13),
        (Indicator::Nfp, 9),
        (Indicator::Cpi, 14),
        (Indicator::Pmi, 5),
    ] {
        provider.push(spy(100.0));
        provider.push(spy(100.0));
        Arc::clone(&t).run(released(ind, day(d))).await;
    }

    let all = t.history(None, 50);
    assert_eq!(all.len(), 3, "oldest dropped at capacity");
    assert_eq!(all[0].event.event.indicator, Indicator::Nfp);
    assert_eq!(all[2].event.event.indicator, Indicator::Pmi);

    let cpi = t.history(Some(Indicator::Cpi), 50);
    assert_eq!(cpi.len(), 1);
    assert_eq!(cpi[0].released_at, day(14));

    let last = t.history(None, 1);
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].event.event.indicator, Indicator::Pmi);

    assert!(t.get("CPI-1").is_none());
    assert!(!t.archive("CPI-1"));
    assert!(t.capture("CPI-1", "1m").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn stats_average_the_sixty_minute_reports() {
    let provider = Arc::new(ScriptedProvider::default());
    let t = tracker(Arc::clone(&provider), &[1, 60], 10);
    assert_eq!(t.stats().events_considered, 0);
    assert_eq!(t.stats().avg_equity_move, 0.0);

    // begin, 1m, 60m
    for (d, at_1m, at_60m) in [(13, 100.5, 101.0), (14, 99.0, 98.0)] {
        provider.push(spy(100.0));
        provider.push(spy(at_1m));
        provider.push(spy(at_60m));
        Arc::clone(&t).run(released(Indicator::Cpi, day(d))).await;
    }

    let stats = t.stats();
    assert_eq!(stats.events_considered, 2);
    assert_eq!(stats.avg_equity_move, -0.5);
    assert_eq!(stats.avg_bond_move, 0.0);
    assert_eq!(stats.avg_fx_move, 0.0);
}

#[tokio::test(start_paused = true)]
async fn events_without_final_horizon_are_not_considered() {
    let provider = Arc::new(ScriptedProvider::default());
    let t = tracker(Arc::clone(&provider), &[1, 5], 10);
    provider.push(spy(100.0));
    provider.push(spy(101.0));
    Arc::clone(&t).run(released(Indicator::Gdp, day(29))).await;

    assert_eq!(t.history(None, 10).len(), 1);
    assert_eq!(t.stats().events_considered, 0);
}

#[tokio::test(start_paused = true)]
async fn empty_sixty_minute_reports_are_not_considered() {
    let provider = Arc::new(ScriptedProvider::default());
    let t = tracker(Arc::clone(&provider), &[60], 10);
    provider.push(PriceSnapshot::new());
    provider.push(PriceSnapshot::new());
    Arc::clone(&t).run(released(Indicator::Ppi, day(14))).await;

    provider.push(spy(100.0));
    provider.push(spy(102.0));
    Arc::clone(&t).run(released(Indicator::Cpi, day(15))).await;

    let archived = t.history(None, 10);
    assert_eq!(archived.len(), 2);
    assert!(archived.iter().all(|ev| ev.impacts.contains_key("60m")));

    let stats = t.stats();
    assert_eq!(stats.events_considered, 1);
    assert_eq!(stats.avg_equity_move, 2.0);
}
