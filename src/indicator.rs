//! # Indicators
//! Closed set of economic releases the tracker knows about, with static
//! reference metadata used by the API and the expectation rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Economic release category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Indicator {
    Cpi,
    Nfp,
    Pmi,
    Fomc,
    Gdp,
    Claims,
    Retail,
    Pce,
    Ppi,
}

/// Importance tier of a scheduled release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
    Variable,
}

/// Reference data for one indicator.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorInfo {
    pub indicator: Indicator,
    pub name: &'static str,
    pub full_name: &'static str,
    pub frequency: Frequency,
    pub importance: Importance,
    pub affected_assets: &'static [&'static str],
    pub description: &'static str,
}

impl Indicator {
    pub const ALL: [Indicator; 9] = [
        Indicator::Cpi,
        Indicator::Nfp,
        Indicator::Pmi,
        Indicator::Fomc,
        Indicator::Gdp,
        Indicator::Claims,
        Indicator::Retail,
        Indicator::Pce,
        Indicator::Ppi,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Indicator::Cpi => "CPI",
            Indicator::Nfp => "NFP",
            Indicator::Pmi => "PMI",
            Indicator::Fomc => "FOMC",
            Indicator::Gdp => "GDP",
            Indicator::Claims => "CLAIMS",
            Indicator::Retail => "RETAIL",
            Indicator::Pce => "PCE",
            Indicator::Ppi => "PPI",
        }
    }

    pub fn info(self) -> IndicatorInfo {
        use Frequency::*;
        use Importance::*;
        let row = |name, full_name, frequency, importance, affected_assets: &'static [&'static str], description| {
            IndicatorInfo {
                indicator: self,
                name,
                full_name,
                frequency,
                importance,
                affected_assets,
                description,
            }
        };
        match self {
            Indicator::Cpi => row(
                "Consumer Price Index",
                "CPI YoY",
                Monthly,
                High,
                &["SPY", "QQQ", "TLT", "DXY", "GLD", "VIX"],
                "Measures inflation by tracking price changes of consumer goods",
            ),
            Indicator::Nfp => row(
                "Non-Farm Payrolls",
                "Non-Farm Payrolls",
                Monthly,
                High,
                &["SPY", "DXY", "TLT", "EUR/USD", "VIX"],
                "Measures employment changes excluding farm workers",
            ),
            Indicator::Pmi => row(
                "PMI Manufacturing",
                "ISM Manufacturing PMI",
                Monthly,
                Medium,
                &["SPY", "IWM", "DXY", "USO"],
                "Measures manufacturing sector health",
            ),
            Indicator::Fomc => row(
                "Fed Rate Decision",
                "FOMC Interest Rate Decision",
                Variable,
                Critical,
                &["SPY", "QQQ", "TLT", "DXY", "GLD", "VIX", "EUR/USD"],
                "Federal Reserve interest rate decisions",
            ),
            Indicator::Gdp => row(
                "GDP Growth Rate",
                "GDP QoQ Annualized",
                Quarterly,
                High,
                &["SPY", "DXY", "TLT"],
                "Measures overall economic growth",
            ),
            Indicator::Claims => row(
                "Jobless Claims",
                "Initial Jobless Claims",
                Weekly,
                Medium,
                &["SPY", "TLT", "DXY"],
                "Weekly unemployment insurance claims",
            ),
            Indicator::Retail => row(
                "Retail Sales",
                "Retail Sales MoM",
                Monthly,
                Medium,
                &["SPY", "XRT", "DXY"],
                "Measures consumer spending",
            ),
            Indicator::Pce => row(
                "PCE Price Index",
                "Core PCE Price Index YoY",
                Monthly,
                High,
                &["SPY", "TLT", "DXY", "GLD"],
                "Fed's preferred inflation measure",
            ),
            Indicator::Ppi => row(
                "Producer Price Index",
                "PPI MoM",
                Monthly,
                Medium,
                &["SPY", "TLT", "DXY"],
                "Measures wholesale price changes",
            ),
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Indicator {
    type Err = String;

    /// Case-insensitive match on the indicator code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Indicator::ALL
            .into_iter()
            .find(|i| i.code() == upper)
            .ok_or_else(|| format!("unknown indicator `{s}`"))
    }
}

impl FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Importance::Low),
            "medium" => Ok(Importance::Medium),
            "high" => Ok(Importance::High),
            "critical" => Ok(Importance::Critical),
            _ => Err(format!("unknown importance `{s}`")),
        }
    }
}
