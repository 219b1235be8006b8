//! Agora server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use agora_api::middleware::AppState;
use agora_common::Config;
use agora_core::{CapabilityService, PollService, UserService};
use agora_db::repositories::{PollRepository, PollVoteRepository, UserRepository};
use agora_weather::WeatherService;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

const DEFAULT_LOG_FILTER: &str =
    "agora=debug,agora_api=debug,agora_core=debug,agora_db=debug,agora_weather=debug,tower_http=debug";

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    info!("Starting agora server...");

    let config = Config::load()?;
    let public_url = Url::parse(&config.server.url)?;

    let db = Arc::new(agora_db::init(&config.database).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    agora_db::migrate(&db).await?;
    info!("Migrations completed");

    // Repositories
    let user_repo = UserRepository::new(db.clone());
    let poll_repo = PollRepository::new(db.clone());
    let vote_repo = PollVoteRepository::new(db);

    // Services
    let capability_service = CapabilityService::new(&config.auth)?;
    let user_service = UserService::new(user_repo, capability_service.clone(), &config);
    let poll_service = PollService::new(poll_repo, vote_repo, capability_service.clone());
    let weather_service = WeatherService::new(config.weather.clone())?;

    let state = AppState {
        user_service,
        poll_service,
        weather_service,
        capability_service,
    };
    let app = agora_api::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, url = %public_url, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
