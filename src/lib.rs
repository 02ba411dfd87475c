// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod impact;
pub mod indicator;
pub mod market;
pub mod metrics;
pub mod release;
pub mod scheduler;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::catalog::{EconomicEvent, EventCatalog, EventKey};
pub use crate::impact::{ImpactAnalyzer, ImpactReport};
pub use crate::indicator::{Importance, Indicator};
pub use crate::market::{PriceSnapshot, SimulatedMarket, SnapshotProvider};
pub use crate::release::{ReleasedEvent, UpcomingEvent};
pub use crate::scheduler::EventScheduler;
pub use crate::tracker::ImpactTracker;
