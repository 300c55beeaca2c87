//! # Voice Relay - Main Application Entry Point
//!
//! Starts the HTTP server that relays voice turns between a client, a
//! transcription service, and a language model.
//!
//! ## Startup:
//! 1. Load `.env`, then layered configuration (`config.toml` + environment)
//! 2. Set up `tracing` with an `EnvFilter`
//! 3. Build the shared state around the real service clients
//! 4. Serve until SIGINT/SIGTERM, then drain in-flight requests
//!
//! Missing service credentials are logged but do not stop startup; `/health`
//! reports the relay as degraded instead.

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_relay::config::AppConfig;
use voice_relay::handlers::{configure_routes, not_found};
use voice_relay::middleware::{MetricsMiddleware, RequestLogging};
use voice_relay::state::AppState;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;

    info!("Starting voice-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    for name in config.missing_credentials() {
        warn!(credential = name, "Credential not configured, requests will use fallbacks");
    }

    std::fs::create_dir_all(&config.upload.upload_dir).with_context(|| {
        format!("Failed to create upload directory {}", config.upload.upload_dir.display())
    })?;
    std::fs::create_dir_all(&config.streaming.recordings_dir).with_context(|| {
        format!(
            "Failed to create recordings directory {}",
            config.streaming.recordings_dir.display()
        )
    })?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::from_config(config)?;

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["x-session-id", "x-request-id"])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(MetricsMiddleware)
            .wrap(RequestLogging)
            .configure(configure_routes)
            .default_service(web::to(not_found))
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        signal = shutdown_signal() => {
            signal?;
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` wins; otherwise `voice_relay=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_relay=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Resolves on the first SIGTERM or SIGINT.
#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C");
    Ok(())
}
