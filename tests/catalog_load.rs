// tests/catalog_load.rs
//
// Loading the shipped calendar and rejecting malformed catalogs.

use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, TimeZone, Utc};
use macro_impact_tracker::catalog::EventCatalog;
use macro_impact_tracker::error::CatalogError;
use macro_impact_tracker::indicator::{Importance, Indicator};

fn shipped_calendar() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/calendar.toml")
}

#[test]
fn shipped_calendar_loads_every_release() {
    let cat = EventCatalog::load_from(&shipped_calendar()).expect("load calendar");
    assert_eq!(cat.len(), 105);

    let cpi = cat
        .events()
        .iter()
        .find(|e| e.key().to_string() == "CPI@2026-01-13T08:30:00")
        .expect("january CPI present");
    assert_eq!(cpi.indicator, Indicator::Cpi);
    assert_eq!(cpi.forecast, Some(2.5));
    assert_eq!(cpi.previous, Some(2.7));
    assert_eq!(cpi.importance, Importance::High);
}

#[test]
fn shipped_calendar_date_and_upcoming_queries() {
    let cat = EventCatalog::load_from(&shipped_calendar()).expect("load calendar");

    let day = cat.for_date(NaiveDate::from_ymd_opt(2026, 1, 29).unwrap());
    let inds: Vec<Indicator> = day.iter().map(|e| e.indicator).collect();
    assert_eq!(inds.len(), 3);
    assert!(inds.contains(&Indicator::Pce));
    assert!(inds.contains(&Indicator::Claims));

    let now = Utc.with_ymd_and_hms(2026, 12, 22, 8, 30, 0).unwrap();
    let upcoming = cat.upcoming(now);
    assert_eq!(upcoming.len(), 1, "release at `now` itself is excluded");
    assert!(upcoming[0].timestamp > now);

    let all = cat.upcoming(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(all.len(), 105);
    assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn json_catalog_is_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("calendar.json");
    fs::write(
        &p,
        r#"[
  {"indicator":"fomc","name":"FOMC Rate Decision","date":"2026-01-28T14:00:00",
   "forecast":4.25,"previous":4.5,"importance":"critical"},
  {"indicator":"GDP","name":"GDP QoQ (Q4 Adv)","date":"2026-01-29T08:30:00",
   "importance":"high"}
]"#,
    )
    .unwrap();

    let cat = EventCatalog::load_from(&p).expect("load json");
    assert_eq!(cat.len(), 2);
    assert_eq!(cat.events()[0].indicator, Indicator::Fomc);
    assert_eq!(cat.events()[1].forecast, None);
}

#[test]
fn duplicate_identity_fails_whole_load() {
    let toml = r#"
[[events]]
indicator = "NFP"
name = "Non-Farm Payrolls"
date = "2026-02-06T08:30:00"
forecast = 150.0
importance = "high"

[[events]]
indicator = "NFP"
name = "Non-Farm Payrolls (dup)"
date = "2026-02-06T08:30:00"
forecast = 160.0
importance = "high"
"#;
    match EventCatalog::from_toml_str(toml) {
        Err(CatalogError::DuplicateKey(k)) => assert_eq!(k, "NFP@2026-02-06T08:30:00"),
        other => panic!("expected duplicate error, got {other:?}"),
    }
}

#[test]
fn malformed_records_are_rejected() {
    let bad_date = r#"
[[events]]
indicator = "CPI"
name = "CPI"
date = "2026-13-40 08:30"
importance = "high"
"#;
    assert!(matches!(
        EventCatalog::from_toml_str(bad_date),
        Err(CatalogError::MalformedTimestamp { index: 0, .. })
    ));

    let bad_indicator = r#"
[[events]]
indicator = "ISM"
name = "Unknown"
date = "2026-01-05T10:00:00"
importance = "medium"
"#;
    assert!(matches!(
        EventCatalog::from_toml_str(bad_indicator),
        Err(CatalogError::UnknownIndicator { .. })
    ));

    let missing = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/nope.toml");
    assert!(matches!(
        EventCatalog::load_from(&missing),
        Err(CatalogError::Io { .. })
    ));
}
