use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traffic_db::catalog::ReferenceCatalog;
use traffic_db::common::{AppState, ReferenceData};
use traffic_db::config::Config;
use traffic_db::datex::DatexClient;
use traffic_db::influx::InfluxClient;
use traffic_db::query::{QueryScope, QueryService};
use traffic_db::routes;
use traffic_db::services::cache::QueryCache;
use traffic_db::sync::{self, IngestionCycle, IngestionScheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,traffic_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting traffic-db...");

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        deployment = ?config.deployment,
        feed_mode = ?config.feed_mode,
        host = %config.api_host,
        port = config.api_port,
        "Configuration loaded"
    );

    // Reference files must exist before anything is parsed
    let catalog = ReferenceCatalog::load(&config.mst_locations_path, &config.detector_names_path)?;
    tracing::info!("Reference catalog loaded");

    let feed = Arc::new(DatexClient::new(&config)?);
    let store = Arc::new(InfluxClient::new(&config)?);

    let stations = sync::worker::initial_stations(&config, feed.as_ref(), &catalog).await?;
    let reference = Arc::new(ReferenceData::new(catalog, stations));
    tracing::info!(
        stations = reference.stations.len(),
        cantons = reference.regions().len(),
        "Station list ready"
    );

    let cache = QueryCache::new(Duration::from_secs(config.query_cache_ttl_seconds));
    let queries = QueryService::new(
        store.clone(),
        reference.clone(),
        QueryScope {
            bucket: config.influxdb_bucket.clone(),
            measurement: config.influxdb_measurement.clone(),
        },
        cache.clone(),
        config.default_time_range.clone(),
    );

    let cycle = IngestionCycle::new(
        feed,
        store,
        reference.clone(),
        config.influxdb_measurement.clone(),
    )
    .with_cache(cache);
    let scheduler = Arc::new(IngestionScheduler::new(
        cycle,
        Duration::from_secs(config.ingest_interval_seconds),
    ));

    if config.ingest_enabled {
        scheduler.start();
    } else {
        tracing::warn!("Ingestion DISABLED");
    }

    let addr = config.bind_address();
    let state = AppState::new(config, reference, queries, scheduler.clone());

    // Build router
    let app = routes::build_router(state);

    // Start server with graceful shutdown
    tracing::info!(address = %addr, "Starting server");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
