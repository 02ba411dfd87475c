// src/impact/expectation.rs
//! Rule-based expected market reaction per indicator and surprise sign.
//!
//! This is a fixed table, not a model. Positive surprise selects the `hot`
//! branch; zero and negative surprise select the `cold` branch.

use serde::{Deserialize, Serialize};

use crate::impact::magnitude::Direction;
use crate::indicator::Indicator;
use crate::market::AssetType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expected {
    Up,
    Down,
    Neutral,
}

impl Expected {
    /// Whether an observed category direction counts as agreeing with this expectation.
    pub fn agrees_with(self, observed: Direction) -> bool {
        match (self, observed) {
            (Expected::Neutral, _) | (_, Direction::Unchanged) => true,
            (Expected::Up, Direction::Up) | (Expected::Down, Direction::Down) => true,
            _ => false,
        }
    }
}

/// Expected direction for the four rate-sensitive categories plus rationale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedReaction {
    pub equity: Expected,
    pub fx: Expected,
    pub bond: Expected,
    pub volatility: Expected,
    pub reasoning: &'static str,
}

impl ExpectedReaction {
    /// `(category, expectation)` pairs in report order.
    pub fn entries(&self) -> [(AssetType, Expected); 4] {
        [
            (AssetType::Equity, self.equity),
            (AssetType::Fx, self.fx),
            (AssetType::Bond, self.bond),
            (AssetType::Volatility, self.volatility),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReactionRule {
    pub hot: ExpectedReaction,
    pub cold: ExpectedReaction,
}

impl ReactionRule {
    pub fn select(&self, surprise: f64) -> ExpectedReaction {
        if surprise > 0.0 {
            self.hot
        } else {
            self.cold
        }
    }
}

const fn r(
    equity: Expected,
    fx: Expected,
    bond: Expected,
    volatility: Expected,
    reasoning: &'static str,
) -> ExpectedReaction {
    ExpectedReaction {
        equity,
        fx,
        bond,
        volatility,
        reasoning,
    }
}

use Expected::{Down, Neutral, Up};

static CPI: ReactionRule = ReactionRule {
    hot: r(Down, Up, Down, Up, "Hot CPI suggests Fed stays hawkish, pressuring risk assets"),
    cold: r(Up, Down, Up, Down, "Cool CPI suggests Fed can ease, supporting risk assets"),
};

static NFP: ReactionRule = ReactionRule {
    hot: r(Neutral, Up, Down, Neutral, "Strong jobs support growth but keep Fed hawkish"),
    cold: r(Down, Down, Up, Neutral, "Weak jobs raise recession concerns"),
};

static PMI: ReactionRule = ReactionRule {
    hot: r(Up, Up, Down, Down, "Expanding manufacturing supports growth outlook"),
    cold: r(Down, Down, Up, Down, "Contracting manufacturing signals economic weakness"),
};

static FOMC: ReactionRule = ReactionRule {
    hot: r(Down, Up, Down, Up, "Hawkish Fed pressures valuations"),
    cold: r(Up, Down, Up, Up, "Dovish Fed supports risk assets"),
};

static GDP: ReactionRule = ReactionRule {
    hot: r(Up, Up, Down, Down, "Stronger growth supports corporate earnings"),
    cold: r(Down, Down, Up, Up, "Weaker growth raises recession concerns"),
};

/// Rule for `indicator`, if one is defined.
pub fn rule_for(indicator: Indicator) -> Option<&'static ReactionRule> {
    match indicator {
        Indicator::Cpi => Some(&CPI),
        Indicator::Nfp => Some(&NFP),
        Indicator::Pmi => Some(&PMI),
        Indicator::Fomc => Some(&FOMC),
        Indicator::Gdp => Some(&GDP),
        Indicator::Claims | Indicator::Retail | Indicator::Pce | Indicator::Ppi => None,
    }
}

pub fn expected_reaction(indicator: Indicator, surprise: f64) -> Option<ExpectedReaction> {
    rule_for(indicator).map(|rule| rule.select(surprise))
}
