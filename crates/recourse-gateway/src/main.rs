//! Recourse gateway — entry point.
//!
//! Reads configuration from environment variables and starts the
//! axum-based HTTP service. See [`settings`](recourse_gateway::settings)
//! for the full variable table.

use recourse_gateway::{ReviewServer, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("recourse_gateway=info".parse().expect("static directive")),
        )
        .init();

    let settings = Settings::from_env();

    if settings.backlog.is_none() {
        tracing::warn!(
            "BACKLOG_EMAIL / BACKLOG_API_TOKEN / BACKLOG_SERVER_URL are not all set — \
             story sync is disabled until they are."
        );
    }

    info!(
        port = settings.port,
        environment = %settings.environment,
        snapshot_dir = %settings.snapshot_dir.display(),
        "recourse gateway configuration loaded"
    );

    if let Err(e) = ReviewServer::new(settings).start().await {
        eprintln!("Gateway error: {e}");
        std::process::exit(1);
    }
}
