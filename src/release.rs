// src/release.rs
//! Notification payloads and the release-time actual value synthesis.
//!
//! The actual value comes from an injectable [`ActualSource`] so that tests
//! (and a future real data feed) can replace the random jitter.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::{EconomicEvent, EventKey};
use crate::market::round_to;

/// Fired once when a release is about five minutes out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingEvent {
    #[serde(flatten)]
    pub event: EconomicEvent,
    pub minutes_until: i64,
}

/// Fired once at release time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasedEvent {
    #[serde(flatten)]
    pub event: EconomicEvent,
    /// `None` only when the forecast was absent.
    pub actual: Option<f64>,
    /// Percent deviation of actual from forecast, rounded to 2 decimals.
    pub surprise: f64,
    pub released_at: DateTime<Utc>,
}

impl ReleasedEvent {
    /// Build the payload for `event` with a given actual value.
    pub fn new(event: EconomicEvent, actual: Option<f64>, released_at: DateTime<Utc>) -> Self {
        let surprise = surprise_pct(actual, event.forecast);
        Self {
            event,
            actual,
            surprise,
            released_at,
        }
    }

    pub fn key(&self) -> EventKey {
        self.event.key()
    }
}

/// `((actual - forecast) / |forecast|) * 100`, or 0 when forecast is 0 or absent.
pub fn surprise_pct(actual: Option<f64>, forecast: Option<f64>) -> f64 {
    match (actual, forecast) {
        (Some(a), Some(f)) if f != 0.0 => round_to((a - f) / f.abs() * 100.0, 2),
        _ => 0.0,
    }
}

/// Supplies the "actual" value of a release.
pub trait ActualSource: Send {
    fn actual_for(&mut self, event: &EconomicEvent) -> Option<f64>;
}

/// Forecast × (1 + U), U ~ Uniform(−0.15, 0.15), rounded to 2 decimals.
pub struct JitterActualSource {
    rng: StdRng,
    spread: f64,
}

impl JitterActualSource {
    pub const DEFAULT_SPREAD: f64 = 0.15;

    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            spread: Self::DEFAULT_SPREAD,
        }
    }
}

impl ActualSource for JitterActualSource {
    fn actual_for(&mut self, event: &EconomicEvent) -> Option<f64> {
        let forecast = event.forecast?;
        let u: f64 = self.rng.random_range(-self.spread..=self.spread);
        Some(round_to(forecast * (1.0 + u), 2))
    }
}

/// Deterministic source: explicit per-event values, otherwise the forecast itself.
#[derive(Debug, Clone, Default)]
pub struct FixedActualSource {
    values: HashMap<EventKey, f64>,
}

impl FixedActualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: EventKey, actual: f64) -> Self {
        self.values.insert(key, actual);
        self
    }
}

impl ActualSource for FixedActualSource {
    fn actual_for(&mut self, event: &EconomicEvent) -> Option<f64> {
        self.values.get(&event.key()).copied().or(event.forecast)
    }
}
