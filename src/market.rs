//! # Market data
//! Price snapshots consumed by the impact analyzer, the provider contract the
//! tracker reads them from, and a simulated in-memory provider.
//!
//! A snapshot is an immutable value: providers hand out copies, the analyzer
//! only ever borrows them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use crate::error::SnapshotError;

/// Maximum history points retained per symbol.
pub const HISTORY_CAP: usize = 200;

/// Instrument grouping; doubles as the asset category id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Equity,
    Fx,
    Bond,
    Volatility,
    Commodity,
    Crypto,
}

impl AssetType {
    pub const ALL: [AssetType; 6] = [
        AssetType::Equity,
        AssetType::Fx,
        AssetType::Bond,
        AssetType::Volatility,
        AssetType::Commodity,
        AssetType::Crypto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Equity => "equity",
            AssetType::Fx => "fx",
            AssetType::Bond => "bond",
            AssetType::Volatility => "volatility",
            AssetType::Commodity => "commodity",
            AssetType::Crypto => "crypto",
        }
    }

    /// Per-step standard deviation used by the simulator.
    fn sim_volatility(self) -> f64 {
        match self {
            AssetType::Equity => 0.0015,
            AssetType::Fx => 0.0003,
            AssetType::Bond => 0.0008,
            AssetType::Volatility => 0.02,
            AssetType::Commodity => 0.001,
            AssetType::Crypto => 0.003,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a tradable instrument.
#[derive(Debug, Clone, Copy)]
pub struct Instrument {
    pub symbol: &'static str,
    pub name: &'static str,
    pub asset_type: AssetType,
    pub base_price: f64,
}

const fn inst(symbol: &'static str, name: &'static str, asset_type: AssetType, base_price: f64) -> Instrument {
    Instrument {
        symbol,
        name,
        asset_type,
        base_price,
    }
}

/// Default instrument universe.
pub const INSTRUMENTS: &[Instrument] = &[
    inst("SPY", "S&P 500 ETF", AssetType::Equity, 596.50),
    inst("QQQ", "Nasdaq 100 ETF", AssetType::Equity, 525.80),
    inst("IWM", "Russell 2000 ETF", AssetType::Equity, 225.40),
    inst("DIA", "Dow Jones ETF", AssetType::Equity, 437.20),
    inst("EUR/USD", "Euro/Dollar", AssetType::Fx, 1.0285),
    inst("GBP/USD", "Pound/Dollar", AssetType::Fx, 1.2180),
    inst("USD/JPY", "Dollar/Yen", AssetType::Fx, 156.50),
    inst("DXY", "Dollar Index", AssetType::Fx, 109.35),
    inst("TLT", "20+ Year Treasury ETF", AssetType::Bond, 87.45),
    inst("IEF", "7-10 Year Treasury ETF", AssetType::Bond, 91.20),
    inst("HYG", "High Yield Bond ETF", AssetType::Bond, 78.65),
    inst("VIX", "CBOE Volatility Index", AssetType::Volatility, 15.80),
    inst("VVIX", "VIX of VIX", AssetType::Volatility, 92.50),
    inst("GLD", "Gold ETF", AssetType::Commodity, 266.80),
    inst("USO", "Oil Fund", AssetType::Commodity, 74.20),
    inst("BTC", "Bitcoin", AssetType::Crypto, 105_000.0),
    inst("ETH", "Ethereum", AssetType::Crypto, 3_300.0),
    inst("SOL", "Solana", AssetType::Crypto, 260.0),
    inst("XRP", "Ripple", AssetType::Crypto, 3.15),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub price: f64,
    #[serde(default)]
    pub change_percent: f64,
    pub last_update: DateTime<Utc>,
}

/// Point-in-time mapping of symbol to quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot {
    quotes: BTreeMap<String, PriceQuote>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quote: PriceQuote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Builder-style insert of a bare price, mostly for tests and shocks.
    pub fn with_price(
        mut self,
        symbol: &str,
        name: &str,
        asset_type: AssetType,
        price: f64,
    ) -> Self {
        self.insert(PriceQuote {
            symbol: symbol.to_string(),
            name: name.to_string(),
            asset_type,
            price,
            change_percent: 0.0,
            last_update: Utc::now(),
        });
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceQuote> {
        self.quotes.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PriceQuote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Parse an untyped snapshot (e.g. from a transport layer).
    ///
    /// The root must be an object of objects, each with a numeric `price`.
    /// Missing `name`/`type` fall back to the symbol and the default universe.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SnapshotError> {
        let map = value
            .as_object()
            .ok_or_else(|| SnapshotError::NotAMapping(json_kind(value)))?;

        let mut snap = PriceSnapshot::new();
        for (symbol, entry) in map {
            let obj = entry
                .as_object()
                .ok_or_else(|| SnapshotError::EntryNotAMapping(symbol.clone()))?;
            let price = obj
                .get("price")
                .and_then(|p| p.as_f64())
                .ok_or_else(|| SnapshotError::MissingPrice(symbol.clone()))?;

            let known = instrument(symbol);
            let name = obj
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .or_else(|| known.map(|k| k.name.to_string()))
                .unwrap_or_else(|| symbol.clone());
            let asset_type = obj
                .get("type")
                .and_then(|t| serde_json::from_value::<AssetType>(t.clone()).ok())
                .or_else(|| known.map(|k| k.asset_type))
                .unwrap_or(AssetType::Equity);
            let change_percent = obj
                .get("change_percent")
                .and_then(|c| c.as_f64())
                .unwrap_or(0.0);
            let last_update = obj
                .get("last_update")
                .and_then(|t| t.as_str())
                .and_then(|t| t.parse::<DateTime<Utc>>().ok())
                .unwrap_or_else(Utc::now);

            snap.insert(PriceQuote {
                symbol: symbol.clone(),
                name,
                asset_type,
                price,
                change_percent,
                last_update,
            });
        }
        Ok(snap)
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub fn instrument(symbol: &str) -> Option<&'static Instrument> {
    INSTRUMENTS.iter().find(|i| i.symbol == symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Epoch milliseconds.
    pub time: i64,
    pub price: f64,
}

/// External price feed contract.
#[async_trait::async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> PriceSnapshot;

    /// Most recent `points` observations for `symbol`, oldest first.
    async fn history(&self, symbol: &str, points: usize) -> Vec<PricePoint>;

    fn name(&self) -> &'static str;
}

/// Random-walk market used when no live feed is wired in.
pub struct SimulatedMarket {
    inner: RwLock<SimState>,
}

struct SimState {
    quotes: PriceSnapshot,
    history: HashMap<String, VecDeque<PricePoint>>,
    rng: StdRng,
}

impl SimulatedMarket {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        let now = Utc::now();
        let mut quotes = PriceSnapshot::new();
        let mut history = HashMap::new();
        for ins in INSTRUMENTS {
            quotes.insert(PriceQuote {
                symbol: ins.symbol.to_string(),
                name: ins.name.to_string(),
                asset_type: ins.asset_type,
                price: ins.base_price,
                change_percent: 0.0,
                last_update: now,
            });
            let mut h = VecDeque::with_capacity(HISTORY_CAP);
            h.push_back(PricePoint {
                time: now.timestamp_millis(),
                price: ins.base_price,
            });
            history.insert(ins.symbol.to_string(), h);
        }
        Self {
            inner: RwLock::new(SimState {
                quotes,
                history,
                rng,
            }),
        }
    }

    /// Advance every instrument by one Gaussian step with mild mean reversion.
    pub fn step(&self) {
        let now = Utc::now();
        let mut st = self.inner.write();
        let SimState {
            quotes,
            history,
            rng,
        } = &mut *st;

        for ins in INSTRUMENTS {
            let Some(q) = quotes.quotes.get_mut(ins.symbol) else {
                continue;
            };
            let Ok(dist) = Normal::new(0.0, ins.asset_type.sim_volatility()) else {
                continue;
            };
            let current = q.price;
            let mut next = current * (1.0 + dist.sample(rng));
            next += (ins.base_price - next) * 0.001;

            let change_pct = if current != 0.0 {
                (next - current) / current * 100.0
            } else {
                0.0
            };
            let decimals = if ins.asset_type == AssetType::Fx { 4 } else { 2 };
            q.price = round_to(next, decimals);
            q.change_percent = round_to(change_pct, 2);
            q.last_update = now;
            let price = q.price;

            push_point(history, ins.symbol, now.timestamp_millis(), price);
        }
    }

    /// Move `symbol` by `magnitude_pct` percent immediately.
    pub fn apply_shock(&self, symbol: &str, magnitude_pct: f64) -> bool {
        let now = Utc::now();
        let mut st = self.inner.write();
        let SimState { quotes, history, .. } = &mut *st;
        let Some(q) = quotes.quotes.get_mut(symbol) else {
            return false;
        };
        if q.price <= 0.0 {
            return false;
        }
        q.price *= 1.0 + magnitude_pct / 100.0;
        q.change_percent += magnitude_pct;
        q.last_update = now;
        let price = q.price;
        push_point(history, symbol, now.timestamp_millis(), price);
        true
    }

    pub fn quote(&self, symbol: &str) -> Option<PriceQuote> {
        self.inner.read().quotes.get(symbol).cloned()
    }

    /// Spawn the background tick loop.
    pub fn spawn_ticker(
        self: std::sync::Arc<Self>,
        tick: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                ticker.tick().await;
                self.step();
                tracing::trace!(target: "market", "simulated market tick");
            }
        })
    }
}

fn push_point(
    history: &mut HashMap<String, VecDeque<PricePoint>>,
    symbol: &str,
    time: i64,
    price: f64,
) {
    let h = history.entry(symbol.to_string()).or_default();
    h.push_back(PricePoint { time, price });
    while h.len() > HISTORY_CAP {
        h.pop_front();
    }
}

#[async_trait::async_trait]
impl SnapshotProvider for SimulatedMarket {
    async fn snapshot(&self) -> PriceSnapshot {
        self.inner.read().quotes.clone()
    }

    async fn history(&self, symbol: &str, points: usize) -> Vec<PricePoint> {
        let st = self.inner.read();
        match st.history.get(symbol) {
            Some(h) => {
                let start = h.len().saturating_sub(points);
                h.iter().skip(start).copied().collect()
            }
            None => Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

pub(crate) fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_rejects_non_mapping() {
        let err = PriceSnapshot::from_value(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, SnapshotError::NotAMapping("array"));

        let err = PriceSnapshot::from_value(&json!({"SPY": 500})).unwrap_err();
        assert_eq!(err, SnapshotError::EntryNotAMapping("SPY".into()));

        let err = PriceSnapshot::from_value(&json!({"SPY": {"price": "x"}})).unwrap_err();
        assert_eq!(err, SnapshotError::MissingPrice("SPY".into()));
    }

    #[test]
    fn from_value_fills_known_metadata() {
        let snap = PriceSnapshot::from_value(&json!({"VIX": {"price": 16.2}})).unwrap();
        let q = snap.get("VIX").unwrap();
        assert_eq!(q.asset_type, AssetType::Volatility);
        assert_eq!(q.name, "CBOE Volatility Index");
        assert_eq!(q.price, 16.2);
    }

    #[tokio::test]
    async fn simulated_history_is_bounded() {
        let m = SimulatedMarket::new(Some(7));
        for _ in 0..(HISTORY_CAP + 50) {
            m.step();
        }
        let h = m.history("SPY", 10_000).await;
        assert_eq!(h.len(), HISTORY_CAP);
        let last5 = m.history("SPY", 5).await;
        assert_eq!(last5.len(), 5);
        assert_eq!(last5.last(), h.last());
        assert!(m.history("NOPE", 5).await.is_empty());
    }

    #[tokio::test]
    async fn history_tracks_the_quoted_price() {
        let m = SimulatedMarket::new(Some(11));
        for _ in 0..20 {
            m.step();
            for sym in ["SPY", "EUR/USD", "VIX"] {
                let quoted = m.quote(sym).unwrap().price;
                let last = m.history(sym, 1).await;
                assert_eq!(last.last().map(|p| p.price), Some(quoted), "{sym}");
            }
        }
    }

    #[tokio::test]
    async fn shock_moves_price_by_percent() {
        let m = SimulatedMarket::new(Some(1));
        let before = m.quote("SPY").unwrap().price;
        assert!(m.apply_shock("SPY", -1.0));
        let after = m.snapshot().await.get("SPY").unwrap().price;
        assert!((after - before * 0.99).abs() < 1e-9);
        assert!(!m.apply_shock("NOPE", 1.0));
    }
}
