//! Macro Impact Tracker: binary entrypoint
//! Loads config and the release calendar, starts the scheduler, the
//! simulated market and the impact tracker, then serves the HTTP API.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use macro_impact_tracker::api::{self, AppState};
use macro_impact_tracker::catalog::EventCatalog;
use macro_impact_tracker::config::AppConfig;
use macro_impact_tracker::impact::{AnalyzerConfig, ImpactAnalyzer};
use macro_impact_tracker::market::{SimulatedMarket, SnapshotProvider};
use macro_impact_tracker::metrics::Metrics;
use macro_impact_tracker::scheduler::EventScheduler;
use macro_impact_tracker::tracker::ImpactTracker;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("macro_impact_tracker=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl_c handler failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading app config")?;
    let catalog = EventCatalog::load_from(&cfg.catalog_path)
        .with_context(|| format!("loading calendar from {}", cfg.catalog_path.display()))?;
    tracing::info!(events = catalog.len(), path = %cfg.catalog_path.display(), "calendar loaded");
    let catalog = Arc::new(catalog);

    let metrics = Metrics::init()?;

    let market = Arc::new(SimulatedMarket::new(cfg.market.seed));
    let _ticker = Arc::clone(&market).spawn_ticker(Duration::from_secs(cfg.market.tick_secs.max(1)));
    let provider: Arc<dyn SnapshotProvider> = market;

    let analyzer = Arc::new(ImpactAnalyzer::new(AnalyzerConfig::default()));
    let tracker = Arc::new(ImpactTracker::new(
        Arc::clone(&provider),
        analyzer,
        &cfg.tracker,
    ));

    let scheduler = Arc::new(
        EventScheduler::builder(Arc::clone(&catalog))
            .config(&cfg.scheduler)
            .spawn(),
    );
    scheduler.subscribe_upcoming(|ev| {
        tracing::info!(
            indicator = %ev.event.indicator,
            event = %ev.event.name,
            minutes_until = ev.minutes_until,
            "release approaching"
        );
        Ok(())
    })?;
    {
        let tracker = Arc::clone(&tracker);
        scheduler.subscribe_released(move |ev| {
            tracker.track(ev.clone());
            Ok(())
        })?;
    }
    scheduler.start()?;

    let state = AppState {
        scheduler: Arc::clone(&scheduler),
        tracker,
        market: provider,
    };
    let router = api::create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(bind = %cfg.server.bind, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    scheduler.stop().await?;
    tracing::info!("shutdown complete");
    Ok(())
}
