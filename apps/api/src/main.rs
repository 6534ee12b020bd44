use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentState, ProposeWritePath};
use messaging_cell::Notifier;
use reminder_cell::{ReminderState, ReminderSweepService, ReminderWorker, WorkerConfig};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dental clinic API server");

    let config = Arc::new(AppConfig::from_env());

    // The proposal write path is fixed for the life of the process.
    let write_path = match ProposeWritePath::detect(&config).await {
        Ok(path) => path,
        Err(e) => {
            warn!("Could not determine appointment request schema ({}); assuming current", e);
            ProposeWritePath::default()
        }
    };

    let notifier = Arc::new(Notifier::from_config(&config));
    info!("Notification audience: {:?}", notifier.audience());

    let sweep = Arc::new(ReminderSweepService::new(&config, notifier.clone()));
    let worker = if config.reminder_worker_enabled {
        let worker = Arc::new(ReminderWorker::new(
            WorkerConfig::from_seconds(config.reminder_sweep_interval_seconds),
            sweep.clone(),
        ));
        let running = worker.clone();
        Some((worker, tokio::spawn(async move { running.start().await })))
    } else {
        info!("Reminder worker disabled; sweeps run only through /reminders/sweep");
        None
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let appointments = Arc::new(AppointmentState::new(config.clone(), notifier, write_path));
    let reminders = Arc::new(ReminderState { config: config.clone(), sweep });

    // Build the application router
    let app = router::create_router(appointments, reminders)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    if let Some((worker, handle)) = worker {
        worker.shutdown().await;
        if let Err(e) = handle.await {
            warn!("Reminder worker ended abnormally: {}", e);
        }
    }

    Ok(())
}
