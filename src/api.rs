use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::catalog::EconomicEvent;
use crate::impact::HistoricalStats;
use crate::indicator::{Indicator, IndicatorInfo};
use crate::market::{PricePoint, PriceSnapshot, SnapshotProvider, HISTORY_CAP};
use crate::scheduler::EventScheduler;
use crate::tracker::{ImpactTracker, TrackedEvent};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const DEFAULT_PRICE_POINTS: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<EventScheduler>,
    pub tracker: Arc<ImpactTracker>,
    pub market: Arc<dyn SnapshotProvider>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/calendar", get(calendar_upcoming))
        .route("/api/calendar/{date}", get(calendar_for_date))
        .route("/api/indicators", get(indicators))
        .route("/api/indicators/{indicator}", get(indicator_detail))
        .route("/api/market", get(market_snapshot))
        .route("/api/market/{symbol}/history", get(market_history))
        .route("/api/events/live", get(live_events))
        .route("/api/history", get(history))
        .route("/api/history/stats", get(history_stats))
        .route("/api/impact/{id}", get(impact_by_id))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
        };
        tracing::debug!(target: "api", status = status.as_u16(), error = %msg, "request rejected");
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

fn parse_indicator(raw: &str) -> Result<Indicator, ApiError> {
    raw.parse::<Indicator>().map_err(ApiError::BadRequest)
}

async fn calendar_upcoming(State(state): State<AppState>) -> Json<Vec<EconomicEvent>> {
    Json(state.scheduler.list_upcoming(Utc::now()))
}

async fn calendar_for_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<EconomicEvent>>, ApiError> {
    let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date '{date}', expected YYYY-MM-DD")))?;
    Ok(Json(state.scheduler.list_for_date(day)))
}

async fn indicators() -> Json<Vec<IndicatorInfo>> {
    Json(Indicator::ALL.iter().map(|i| i.info()).collect())
}

async fn indicator_detail(Path(raw): Path<String>) -> Result<Json<IndicatorInfo>, ApiError> {
    Ok(Json(parse_indicator(&raw)?.info()))
}

async fn market_snapshot(State(state): State<AppState>) -> Json<PriceSnapshot> {
    Json(state.market.snapshot().await)
}

#[derive(Serialize)]
struct HistoryOut {
    symbol: String,
    points: Vec<PricePoint>,
}

async fn market_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<HistoryOut>, ApiError> {
    let points = match q.get("points") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("invalid points '{v}'")))?,
        None => DEFAULT_PRICE_POINTS,
    }
    .min(HISTORY_CAP);

    let history = state.market.history(&symbol, points).await;
    if history.is_empty() && state.market.snapshot().await.get(&symbol).is_none() {
        return Err(ApiError::NotFound(format!("unknown symbol '{symbol}'")));
    }
    Ok(Json(HistoryOut {
        symbol,
        points: history,
    }))
}

async fn live_events(State(state): State<AppState>) -> Json<Vec<TrackedEvent>> {
    Json(state.tracker.active())
}

async fn history(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Vec<TrackedEvent>>, ApiError> {
    let indicator = match q.get("indicator").filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_indicator(raw)?),
        None => None,
    };
    let limit = match q.get("limit") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("invalid limit '{v}'")))?,
        None => DEFAULT_HISTORY_LIMIT,
    };
    Ok(Json(state.tracker.history(indicator, limit)))
}

async fn history_stats(State(state): State<AppState>) -> Json<HistoricalStats> {
    Json(state.tracker.stats())
}

async fn impact_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrackedEvent>, ApiError> {
    state
        .tracker
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no tracked event '{id}'")))
}
