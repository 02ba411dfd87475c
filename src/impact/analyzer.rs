// src/impact/analyzer.rs
//! Market reaction report for a single release.
//!
//! Pure computation over two borrowed snapshots: per-asset moves, category
//! means, VIX-driven stress level, expectation lookup and alignment scoring.
//! Missing symbols or empty categories degrade the report, never fail it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::impact::category::CategoryMap;
use crate::impact::expectation::{self, Expected, ExpectedReaction};
use crate::impact::magnitude::{Direction, Magnitude, MagnitudeThresholds};
use crate::indicator::Indicator;
use crate::market::{round_to, AssetType, PriceSnapshot};
use crate::release::ReleasedEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetImpact {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub before_price: f64,
    pub after_price: f64,
    pub price_change: f64,
    pub percent_change: f64,
    pub magnitude: Magnitude,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryImpact {
    pub category: AssetType,
    pub avg_percent_change: f64,
    pub magnitude: Magnitude,
    pub direction: Direction,
    pub assets: Vec<AssetImpact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Extreme,
    High,
    Elevated,
    Mild,
    Calm,
    VeryCalm,
    Unknown,
}

impl StressLevel {
    /// Bucket the representative volatility instrument's percent change.
    pub fn from_vol_change(pct: f64) -> Self {
        if pct > 15.0 {
            StressLevel::Extreme
        } else if pct > 10.0 {
            StressLevel::High
        } else if pct > 5.0 {
            StressLevel::Elevated
        } else if pct > 0.0 {
            StressLevel::Mild
        } else if pct > -5.0 {
            StressLevel::Calm
        } else {
            StressLevel::VeryCalm
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    Partial,
    No,
    Unknown,
}

impl Verdict {
    pub fn from_score(score: u32) -> Self {
        if score >= 75 {
            Verdict::Yes
        } else if score >= 50 {
            Verdict::Partial
        } else {
            Verdict::No
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentDetail {
    pub expected: Expected,
    pub actual: Direction,
    pub aligned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub verdict: Verdict,
    pub score: u32,
    #[serde(default)]
    pub details: BTreeMap<AssetType, AlignmentDetail>,
    #[serde(default)]
    pub reasoning: String,
}

impl Alignment {
    fn unknown() -> Self {
        Self {
            verdict: Verdict::Unknown,
            score: 0,
            details: BTreeMap::new(),
            reasoning: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub indicator: Indicator,
    pub name: String,
    pub actual: Option<f64>,
    pub forecast: Option<f64>,
    pub surprise: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub timestamp: DateTime<Utc>,
    pub event: EventSummary,
    pub asset_impacts: BTreeMap<String, AssetImpact>,
    pub category_impacts: BTreeMap<AssetType, CategoryImpact>,
    pub overall_stress: StressLevel,
    pub expected_impact: Option<ExpectedReactionView>,
    pub alignment: Alignment,
    pub summary: String,
}

/// Owned, serializable form of [`ExpectedReaction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedReactionView {
    pub equity: Expected,
    pub fx: Expected,
    pub bond: Expected,
    pub volatility: Expected,
    pub reasoning: String,
}

impl From<ExpectedReaction> for ExpectedReactionView {
    fn from(r: ExpectedReaction) -> Self {
        Self {
            equity: r.equity,
            fx: r.fx,
            bond: r.bond,
            volatility: r.volatility,
            reasoning: r.reasoning.to_string(),
        }
    }
}

/// Fixed configuration loaded once at construction.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub thresholds: MagnitudeThresholds,
    pub categories: CategoryMap,
    /// Instrument whose move alone determines overall stress.
    pub stress_symbol: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            thresholds: MagnitudeThresholds::default(),
            categories: CategoryMap::default(),
            stress_symbol: "VIX".to_string(),
        }
    }
}

const SUMMARY_SEPARATOR: &str = " | ";

/// Stateless apart from its fixed configuration; safe to share across tasks.
#[derive(Debug, Clone, Default)]
pub struct ImpactAnalyzer {
    cfg: AnalyzerConfig,
}

impl ImpactAnalyzer {
    pub fn new(cfg: AnalyzerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.cfg
    }

    pub fn classify(&self, percent_change: f64) -> Magnitude {
        self.cfg.thresholds.classify(percent_change)
    }

    pub fn compute_impact(
        &self,
        before: &PriceSnapshot,
        after: &PriceSnapshot,
        event: &ReleasedEvent,
    ) -> ImpactReport {
        self.compute_impact_at(before, after, event, Utc::now())
    }

    /// Same as [`compute_impact`](Self::compute_impact) with an explicit report timestamp.
    pub fn compute_impact_at(
        &self,
        before: &PriceSnapshot,
        after: &PriceSnapshot,
        event: &ReleasedEvent,
        now: DateTime<Utc>,
    ) -> ImpactReport {
        let asset_impacts = self.asset_impacts(before, after);
        let category_impacts = self.category_impacts(&asset_impacts);
        let overall_stress = self.market_stress(&asset_impacts);

        let expected = expectation::expected_reaction(event.event.indicator, event.surprise);
        let alignment = check_alignment(&category_impacts, expected.as_ref());
        let summary = summarize(&category_impacts);

        ImpactReport {
            timestamp: now,
            event: EventSummary {
                indicator: event.event.indicator,
                name: event.event.name.clone(),
                actual: event.actual,
                forecast: event.event.forecast,
                surprise: event.surprise,
            },
            asset_impacts,
            category_impacts,
            overall_stress,
            expected_impact: expected.map(Into::into),
            alignment,
            summary,
        }
    }

    fn asset_impacts(
        &self,
        before: &PriceSnapshot,
        after: &PriceSnapshot,
    ) -> BTreeMap<String, AssetImpact> {
        let mut out = BTreeMap::new();
        for (symbol, post) in after.iter() {
            let Some(pre) = before.get(symbol) else {
                continue;
            };
            let price_change = post.price - pre.price;
            let percent_change = if pre.price != 0.0 {
                price_change / pre.price * 100.0
            } else {
                0.0
            };
            out.insert(
                symbol.clone(),
                AssetImpact {
                    symbol: symbol.clone(),
                    name: post.name.clone(),
                    asset_type: post.asset_type,
                    before_price: pre.price,
                    after_price: post.price,
                    price_change: round_to(price_change, 4),
                    percent_change: round_to(percent_change, 2),
                    magnitude: self.classify(percent_change),
                    direction: Direction::of(percent_change),
                },
            );
        }
        out
    }

    fn category_impacts(
        &self,
        impacts: &BTreeMap<String, AssetImpact>,
    ) -> BTreeMap<AssetType, CategoryImpact> {
        let mut out = BTreeMap::new();
        for category in AssetType::ALL {
            let assets: Vec<AssetImpact> = self
                .cfg
                .categories
                .members(category)
                .iter()
                .filter_map(|s| impacts.get(s).cloned())
                .collect();
            if assets.is_empty() {
                continue;
            }
            let avg = assets.iter().map(|a| a.percent_change).sum::<f64>() / assets.len() as f64;
            out.insert(
                category,
                CategoryImpact {
                    category,
                    avg_percent_change: round_to(avg, 2),
                    magnitude: self.classify(avg),
                    direction: Direction::of(avg),
                    assets,
                },
            );
        }
        out
    }

    fn market_stress(&self, impacts: &BTreeMap<String, AssetImpact>) -> StressLevel {
        impacts
            .get(&self.cfg.stress_symbol)
            .map(|vix| StressLevel::from_vol_change(vix.percent_change))
            .unwrap_or(StressLevel::Unknown)
    }
}

fn check_alignment(
    categories: &BTreeMap<AssetType, CategoryImpact>,
    expected: Option<&ExpectedReaction>,
) -> Alignment {
    let Some(expected) = expected else {
        return Alignment::unknown();
    };

    let mut details = BTreeMap::new();
    let mut aligned = 0u32;
    for (category, want) in expected.entries() {
        let Some(observed) = categories.get(&category) else {
            continue;
        };
        let ok = want.agrees_with(observed.direction);
        if ok {
            aligned += 1;
        }
        details.insert(
            category,
            AlignmentDetail {
                expected: want,
                actual: observed.direction,
                aligned: ok,
            },
        );
    }

    let compared = details.len() as u32;
    if compared == 0 {
        return Alignment {
            reasoning: expected.reasoning.to_string(),
            ..Alignment::unknown()
        };
    }

    let score = (f64::from(aligned) / f64::from(compared) * 100.0).round() as u32;
    Alignment {
        verdict: Verdict::from_score(score),
        score,
        details,
        reasoning: expected.reasoning.to_string(),
    }
}

fn summarize(categories: &BTreeMap<AssetType, CategoryImpact>) -> String {
    let mut parts = Vec::new();

    if let Some(eq) = categories.get(&AssetType::Equity) {
        parts.push(format!(
            "Equities {} {:.2}%",
            eq.direction.as_str(),
            eq.avg_percent_change.abs()
        ));
    }
    if let Some(fx) = categories.get(&AssetType::Fx) {
        let verb = if fx.direction == Direction::Up {
            "strengthened"
        } else {
            "weakened"
        };
        parts.push(format!(
            "USD {verb} (DXY {} {:.2}%)",
            fx.direction.as_str(),
            fx.avg_percent_change.abs()
        ));
    }
    if let Some(bond) = categories.get(&AssetType::Bond) {
        parts.push(format!(
            "Treasuries {} {:.2}%",
            bond.direction.as_str(),
            bond.avg_percent_change.abs()
        ));
    }
    if let Some(vol) = categories.get(&AssetType::Volatility) {
        let verb = if vol.direction == Direction::Up {
            "spiked"
        } else {
            "dropped"
        };
        parts.push(format!("VIX {verb} {:.2}%", vol.avg_percent_change.abs()));
    }

    parts.join(SUMMARY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EconomicEvent;
    use crate::indicator::Importance;
    use chrono::TimeZone;

    fn released(indicator: Indicator, forecast: f64, actual: f64) -> ReleasedEvent {
        let ev = EconomicEvent {
            indicator,
            name: format!("{indicator} test"),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 13, 8, 30, 0).unwrap(),
            forecast: Some(forecast),
            previous: None,
            importance: Importance::High,
        };
        ReleasedEvent::new(ev, Some(actual), Utc::now())
    }

    fn snap(prices: &[(&str, AssetType, f64)]) -> PriceSnapshot {
        prices
            .iter()
            .fold(PriceSnapshot::new(), |s, (sym, t, p)| s.with_price(sym, sym, *t, *p))
    }

    fn cat(direction: Direction) -> CategoryImpact {
        CategoryImpact {
            category: AssetType::Equity,
            avg_percent_change: 0.0,
            magnitude: Magnitude::Negligible,
            direction,
            assets: Vec::new(),
        }
    }

    #[test]
    fn zero_before_price_gives_zero_percent() {
        let a = ImpactAnalyzer::default();
        let before = snap(&[("SPY", AssetType::Equity, 0.0)]);
        let after = snap(&[("SPY", AssetType::Equity, 10.0)]);
        let r = a.compute_impact(&before, &after, &released(Indicator::Cpi, 2.5, 2.7));
        let spy = &r.asset_impacts["SPY"];
        assert_eq!(spy.percent_change, 0.0);
        assert_eq!(spy.direction, Direction::Unchanged);
        assert_eq!(spy.price_change, 10.0);
    }

    #[test]
    fn one_sided_symbols_are_skipped() {
        let a = ImpactAnalyzer::default();
        let before = snap(&[("SPY", AssetType::Equity, 500.0), ("TLT", AssetType::Bond, 90.0)]);
        let after = snap(&[("SPY", AssetType::Equity, 505.0), ("GLD", AssetType::Commodity, 270.0)]);
        let r = a.compute_impact(&before, &after, &released(Indicator::Cpi, 2.5, 2.7));
        assert_eq!(r.asset_impacts.len(), 1);
        assert!(r.category_impacts.contains_key(&AssetType::Equity));
        assert!(!r.category_impacts.contains_key(&AssetType::Bond));
        assert!(!r.category_impacts.contains_key(&AssetType::Commodity));
        assert_eq!(r.overall_stress, StressLevel::Unknown);
    }

    #[test]
    fn category_mean_of_members() {
        let a = ImpactAnalyzer::default();
        let before = snap(&[("SPY", AssetType::Equity, 100.0), ("QQQ", AssetType::Equity, 200.0)]);
        let after = snap(&[("SPY", AssetType::Equity, 101.0), ("QQQ", AssetType::Equity, 200.0)]);
        let r = a.compute_impact(&before, &after, &released(Indicator::Cpi, 2.5, 2.7));
        let eq = &r.category_impacts[&AssetType::Equity];
        assert_eq!(eq.avg_percent_change, 0.5);
        assert_eq!(eq.magnitude, Magnitude::Significant);
        assert_eq!(eq.direction, Direction::Up);
        assert_eq!(eq.assets.len(), 2);
    }

    #[test]
    fn stress_buckets() {
        assert_eq!(StressLevel::from_vol_change(15.01), StressLevel::Extreme);
        assert_eq!(StressLevel::from_vol_change(15.0), StressLevel::High);
        assert_eq!(StressLevel::from_vol_change(10.0), StressLevel::Elevated);
        assert_eq!(StressLevel::from_vol_change(5.0), StressLevel::Mild);
        assert_eq!(StressLevel::from_vol_change(0.0), StressLevel::Calm);
        assert_eq!(StressLevel::from_vol_change(-4.99), StressLevel::Calm);
        assert_eq!(StressLevel::from_vol_change(-5.0), StressLevel::VeryCalm);
    }

    #[test]
    fn stress_uses_vix_not_category_mean() {
        let a = ImpactAnalyzer::default();
        let before = snap(&[("VIX", AssetType::Volatility, 20.0), ("VVIX", AssetType::Volatility, 100.0)]);
        let after = snap(&[("VIX", AssetType::Volatility, 22.2), ("VVIX", AssetType::Volatility, 90.0)]);
        let r = a.compute_impact(&before, &after, &released(Indicator::Cpi, 2.5, 2.7));
        // VIX +11% => high, although the category mean is +0.5%
        assert_eq!(r.overall_stress, StressLevel::High);
        assert_eq!(r.category_impacts[&AssetType::Volatility].avg_percent_change, 0.5);
    }

    #[test]
    fn alignment_example_scores_75() {
        let expected = ExpectedReaction {
            equity: Expected::Up,
            fx: Expected::Up,
            bond: Expected::Down,
            volatility: Expected::Up,
            reasoning: "test",
        };
        let mut observed = BTreeMap::new();
        observed.insert(AssetType::Equity, cat(Direction::Up));
        observed.insert(AssetType::Fx, cat(Direction::Down));
        observed.insert(AssetType::Bond, cat(Direction::Down));
        observed.insert(AssetType::Volatility, cat(Direction::Unchanged));

        let al = check_alignment(&observed, Some(&expected));
        assert_eq!(al.score, 75);
        assert_eq!(al.verdict, Verdict::Yes);
        assert!(!al.details[&AssetType::Fx].aligned);
        assert!(al.details[&AssetType::Volatility].aligned);
    }

    #[test]
    fn alignment_without_overlap_is_unknown() {
        let expected = expectation::expected_reaction(Indicator::Gdp, 1.0).unwrap();
        let mut observed = BTreeMap::new();
        observed.insert(AssetType::Crypto, cat(Direction::Up));
        let al = check_alignment(&observed, Some(&expected));
        assert_eq!(al.verdict, Verdict::Unknown);
        assert_eq!(al.score, 0);

        let none = check_alignment(&observed, None);
        assert_eq!(none.verdict, Verdict::Unknown);
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(Verdict::from_score(100), Verdict::Yes);
        assert_eq!(Verdict::from_score(75), Verdict::Yes);
        assert_eq!(Verdict::from_score(67), Verdict::Partial);
        assert_eq!(Verdict::from_score(50), Verdict::Partial);
        assert_eq!(Verdict::from_score(33), Verdict::No);
    }

    #[test]
    fn summary_phrasing() {
        let mut cats = BTreeMap::new();
        let mut eq = cat(Direction::Down);
        eq.avg_percent_change = -1.0;
        cats.insert(AssetType::Equity, eq);
        let mut fx = cat(Direction::Up);
        fx.avg_percent_change = 0.123;
        cats.insert(AssetType::Fx, fx);
        let mut vol = cat(Direction::Unchanged);
        vol.avg_percent_change = 0.0;
        cats.insert(AssetType::Volatility, vol);
        assert_eq!(
            summarize(&cats),
            "Equities down 1.00% | USD strengthened (DXY up 0.12%) | VIX dropped 0.00%"
        );
        assert_eq!(summarize(&BTreeMap::new()), "");
    }

    #[test]
    fn report_serializes_to_plain_tree() {
        let a = ImpactAnalyzer::default();
        let before = snap(&[("SPY", AssetType::Equity, 500.0)]);
        let after = snap(&[("SPY", AssetType::Equity, 495.0)]);
        let r = a.compute_impact(&before, &after, &released(Indicator::Pce, 2.6, 2.6));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["category_impacts"]["equity"]["direction"], "down");
        assert_eq!(v["overall_stress"], "unknown");
        assert!(v["expected_impact"].is_null());
        assert_eq!(v["alignment"]["verdict"], "unknown");
    }
}
