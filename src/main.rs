use anyhow::{Context as _, Result};
use clap::Parser;
use std::sync::Arc;
use taskd::{config::ServerConfig, http, store::Database, AppContext};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "taskd",
    about = "Task/user REST API with coordinated denormalized links",
    version
)]
struct Args {
    /// HTTP server port
    #[arg(long, env = "TASKD_PORT")]
    port: Option<u16>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TASKD_BIND")]
    bind_address: Option<String>,

    /// SQLite connection string, e.g. sqlite://taskd.db?mode=rwc.
    /// When unset the server still starts, but store-backed routes
    /// answer 500 until one is configured.
    #[arg(long, env = "TASKD_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TASKD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Path to a TOML config file (default: taskd.toml)
    #[arg(long, env = "TASKD_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging must come up before the config layer so parse failures in the
    // TOML file are visible.
    let log_level = args.log.clone().unwrap_or_else(|| "info".to_string());
    let log_format = std::env::var("TASKD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "taskd starting");

    let config = Arc::new(ServerConfig::new(
        args.port,
        args.bind_address,
        args.database_url,
        args.log,
        args.config,
    ));
    info!(
        port = config.port,
        bind = %config.bind_address,
        store = config.database_url.is_some(),
        "config loaded"
    );

    // ── Storage ──────────────────────────────────────────────────────────────
    let db = match &config.database_url {
        Some(url) => match Database::connect(url, config.slow_query_threshold_ms).await {
            Ok(db) => {
                info!("store connected");
                db
            }
            Err(e) => {
                warn!(err = %e, "store connection failed; store-backed routes will answer 500");
                Database::unconfigured()
            }
        },
        None => {
            warn!("TASKD_DATABASE_URL not set or empty; store-backed routes will answer 500");
            Database::unconfigured()
        }
    };

    // ── HTTP server ──────────────────────────────────────────────────────────
    let ctx = Arc::new(AppContext::new(config.clone(), db));
    let router = http::build_router(ctx);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("REST API listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("taskd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("taskd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
