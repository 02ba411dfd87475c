// src/impact/mod.rs
//! Cross-asset impact analysis: classification, category aggregation,
//! rule-based expectations, alignment scoring and historical aggregates.

pub mod analyzer;
pub mod category;
pub mod expectation;
pub mod historical;
pub mod magnitude;

pub use analyzer::{
    Alignment, AlignmentDetail, AnalyzerConfig, AssetImpact, CategoryImpact, EventSummary,
    ExpectedReactionView, ImpactAnalyzer, ImpactReport, StressLevel, Verdict,
};
pub use category::CategoryMap;
pub use expectation::{expected_reaction, Expected, ExpectedReaction};
pub use historical::{analyze_historical, HistoricalStats, HISTORICAL_HORIZON};
pub use magnitude::{Direction, Magnitude, MagnitudeThresholds};
