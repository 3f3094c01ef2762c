use std::sync::Arc;

use tracing::{error, info};
use warp::Filter;

mod agents;
mod api;
mod config;
mod error;
mod metrics;
mod middleware;
mod models;
mod pipeline;
mod shell;
mod startup;
mod transcript;

use api::{AppState, EngineStatus};
use startup::{AzurePipelineFactory, Startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .json()
        .init();

    info!("Starting AI Finance Analyst");

    let config = config::Config::from_env();

    // Build clients once; a failure here halts the engine but the screen
    // stays up to show why.
    let (engine, settings) = match startup::initialize(config, Arc::new(AzurePipelineFactory)).await {
        Startup::Ready { engine, pipeline } => {
            (EngineStatus::Ready(pipeline), engine.config().settings.clone())
        }
        Startup::Halted(err) => {
            let settings = config::Settings::from_lookup(|name| std::env::var(name).ok())
                .unwrap_or_else(|err| {
                    error!("{}; serving with default settings", err);
                    config::Settings::default()
                });
            (EngineStatus::Halted(err), settings)
        }
    };

    let metrics = metrics::Metrics::new()?;
    let state = AppState {
        engine,
        sessions: Arc::new(shell::SessionStore::new(
            settings.max_sessions,
            settings.transcript_max_turns,
        )),
        metrics: metrics.clone(),
        limiter: Arc::new(middleware::rate_limiter(settings.query_rate_per_minute)),
        session_limiter: Arc::new(middleware::rate_limiter(settings.session_rate_per_minute)),
    };

    let app_routes = api::routes(state)
        .with(warp::log("api"))
        .with(middleware::cors());

    // Health check route
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    // Metrics route
    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .map(move || {
            let (body, content_type) = metrics.render();
            warp::reply::with_header(body, "Content-Type", content_type)
        });

    let routes = health
        .or(metrics_route)
        .or(app_routes);

    // Start server
    let addr = ([0, 0, 0, 0], settings.port);
    info!("Server listening on {}", addr.1);

    warp::serve(routes)
        .run(addr)
        .await;

    Ok(())
}
