// src/catalog.rs
//! Static economic release calendar.
//!
//! The catalog is loaded once at startup (TOML `[[events]]` tables or a JSON
//! array of the same records), fully validated, and read-only afterwards.
//! Any malformed record fails the whole load.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::CatalogError;
use crate::indicator::{Importance, Indicator};

pub const DEFAULT_CATALOG_PATH: &str = "config/calendar.toml";

/// Accepted on-disk timestamp layout (UTC wall clock, no offset suffix).
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Identity of a catalog event; unique within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub indicator: Indicator,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.indicator,
            self.timestamp.format(DATE_FORMAT)
        )
    }
}

/// One scheduled release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub indicator: Indicator,
    pub name: String,
    #[serde(rename = "date", with = "catalog_date")]
    pub timestamp: DateTime<Utc>,
    pub forecast: Option<f64>,
    pub previous: Option<f64>,
    pub importance: Importance,
}

impl EconomicEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            indicator: self.indicator,
            timestamp: self.timestamp,
        }
    }

    pub fn release_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Record as written in the calendar file, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRecord {
    pub indicator: String,
    pub name: String,
    pub date: String,
    #[serde(default)]
    pub forecast: Option<f64>,
    #[serde(default)]
    pub previous: Option<f64>,
    pub importance: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    events: Vec<CatalogRecord>,
}

/// Immutable, validated list of releases in load order.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: Vec<EconomicEvent>,
}

impl EventCatalog {
    /// Validate raw records. Fails on the first malformed record or duplicate key.
    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut events = Vec::with_capacity(records.len());

        for (index, rec) in records.into_iter().enumerate() {
            let indicator: Indicator =
                rec.indicator
                    .parse()
                    .map_err(|_| CatalogError::UnknownIndicator {
                        index,
                        name: rec.name.clone(),
                        value: rec.indicator.clone(),
                    })?;
            let importance: Importance =
                rec.importance
                    .parse()
                    .map_err(|_| CatalogError::UnknownImportance {
                        index,
                        name: rec.name.clone(),
                        value: rec.importance.clone(),
                    })?;
            let timestamp =
                parse_catalog_date(&rec.date).ok_or_else(|| CatalogError::MalformedTimestamp {
                    index,
                    name: rec.name.clone(),
                    value: rec.date.clone(),
                })?;

            let ev = EconomicEvent {
                indicator,
                name: rec.name,
                timestamp,
                forecast: rec.forecast,
                previous: rec.previous,
                importance,
            };
            if !seen.insert(ev.key()) {
                return Err(CatalogError::DuplicateKey(ev.key().to_string()));
            }
            events.push(ev);
        }

        Ok(Self { events })
    }

    pub fn from_events(events: Vec<EconomicEvent>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(events.len());
        for ev in &events {
            if !seen.insert(ev.key()) {
                return Err(CatalogError::DuplicateKey(ev.key().to_string()));
            }
        }
        Ok(Self { events })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(s).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_records(file.events)
    }

    pub fn from_json_str(s: &str) -> Result<Self, CatalogError> {
        let records: Vec<CatalogRecord> =
            serde_json::from_str(s).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_records(records)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn events(&self) -> &[EconomicEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events strictly after `now`, ascending by timestamp.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<EconomicEvent> {
        let mut out: Vec<EconomicEvent> = self
            .events
            .iter()
            .filter(|e| e.timestamp > now)
            .cloned()
            .collect();
        // stable: same-instant releases keep catalog order
        out.sort_by_key(|e| e.timestamp);
        out
    }

    /// Events whose release falls on calendar day `date` (UTC), in catalog order.
    pub fn for_date(&self, date: NaiveDate) -> Vec<EconomicEvent> {
        self.events
            .iter()
            .filter(|e| e.release_date() == date)
            .cloned()
            .collect()
    }
}

pub fn parse_catalog_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), DATE_FORMAT)
        .ok()
        .map(|n| n.and_utc())
}

mod catalog_date {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(super::DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_catalog_date(&raw)
            .ok_or_else(|| D::Error::custom(format!("malformed timestamp `{raw}`")))
    }
}
