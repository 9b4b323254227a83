use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use service_tracker::db;
use service_tracker::server::config::ServerConfig;
use service_tracker::services::backup_service::BackupService;
use service_tracker::services::health_check_service::HealthCheckService;
use service_tracker::services::icon_resolver::IconResolver;
use service_tracker::services::widget_refresh_service::WidgetRefreshService;
use service_tracker::web::{AppState, create_axum_router};
use service_tracker::widgets::default_registry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) -> WorkerGuard {
    // Log to a file: JSON format, daily rotation
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, "server.log"));
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Logging needs `log_dir`, so configuration errors go to stderr.
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };
    let _log_guard = init_logging(&server_config.log_dir);
    info!("Starting service tracker, version: {}", env!("CARGO_PKG_VERSION"));
    if server_config.uses_default_token() {
        warn!("API_TOKEN is not set; using the built-in default token. Set API_TOKEN before exposing this server.");
    }

    // --- Database Setup ---
    let db_pool = db::connect(&server_config.database_url).await?;
    db::ensure_schema(&db_pool).await?;

    // --- Shared Services ---
    let icon_resolver = Arc::new(IconResolver::new(
        &server_config.image_dir,
        server_config.icon_sources.clone(),
        chrono::Duration::minutes(server_config.icon_retry_minutes),
    )?);
    let widget_registry = Arc::new(default_registry()?);
    let backup_service = Arc::new(BackupService::new(
        db_pool.clone(),
        &server_config.backup_path,
        server_config.backup_retention_days,
    ));
    let health_check_service = Arc::new(HealthCheckService::new(
        db_pool.clone(),
        Duration::from_secs(server_config.health_check_timeout),
    )?);
    let widget_refresh_service = Arc::new(WidgetRefreshService::new(
        db_pool.clone(),
        widget_registry.clone(),
    ));

    // --- Background Tasks ---
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let health_handle = tokio::spawn(health_check_service.start_periodic(
        Duration::from_secs(server_config.health_check_interval),
        shutdown_rx.clone(),
    ));
    let widget_handle = tokio::spawn(widget_refresh_service.start_periodic(
        Duration::from_secs(server_config.widget_refresh_interval),
        shutdown_rx.clone(),
    ));
    let backup_handle = tokio::spawn(
        backup_service
            .clone()
            .start_nightly(server_config.backup_hour, shutdown_rx),
    );

    // --- HTTP Server ---
    let app_state = Arc::new(AppState {
        db_pool,
        config: server_config.clone(),
        icon_resolver,
        backup_service,
        widget_registry,
    });
    let app = create_axum_router(app_state);

    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal.");
            }
            info!("Shutdown signal received.");
        })
        .await;

    let _ = shutdown_tx.send(());
    for handle in [health_handle, widget_handle, backup_handle] {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task ended abnormally.");
        }
    }

    if let Err(e) = serve_result {
        error!(error = %e, "HTTP server error.");
        return Err(e.into());
    }
    info!("Service tracker stopped.");
    Ok(())
}
