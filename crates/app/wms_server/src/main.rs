//! WMS training backend server binary.
//!
//! Reads configuration from flags, the environment and `.env`, builds the
//! connection pool and serves the API until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use wms_api::config::{ApiConfig, DEVELOPMENT_ENV, TokenFormat, parse_flag};
use wms_core::auth::blacklist;
use wms_core::auth::jwt::resolve_jwt_secret;
use wms_core::db::{ConnectionPool, ConnectionSettings, PgConnector};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "wms_server", about = "WMS training backend server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost:5432/wms")]
    database_url: String,

    /// Runtime environment; `development` enables dev-fallback tokens,
    /// degraded database handles and error diagnostics.
    #[arg(long, env = "APP_ENV", default_value = "production")]
    app_env: String,

    /// Reject tokens that were revoked at logout (`1`, `true`, `yes`, `on`).
    #[arg(
        long,
        env = "ENFORCE_TOKEN_BLACKLIST",
        default_value = "false",
        value_parser = flag_value
    )]
    enforce_token_blacklist: bool,

    /// Format of tokens minted at login: `jwt` or `simplified`.
    #[arg(long, env = "TOKEN_FORMAT", default_value = "jwt")]
    token_format: TokenFormat,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between sweeps of expired revocation entries.
    #[arg(long, default_value_t = 3600)]
    purge_interval_secs: u64,
}

fn flag_value(value: &str) -> Result<bool, String> {
    Ok(parse_flag(value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,wms_api=debug,wms_core=debug")),
        )
        .init();

    let args = Args::parse();
    let development = args.app_env.eq_ignore_ascii_case(DEVELOPMENT_ENV);

    let config = ApiConfig {
        bind_addr: args.bind_addr,
        database_url: args.database_url,
        jwt_secret: resolve_jwt_secret(),
        development,
        enforce_blacklist: args.enforce_token_blacklist,
        token_format: args.token_format,
    };
    info!(?config, "starting wms_server");

    if !config.enforce_blacklist {
        warn!("token blacklist not enforced: tokens revoked at logout stay valid until they expire");
    }

    let mut settings = ConnectionSettings::new(config.database_url.clone());
    settings.max_connections = args.max_connections;
    let pool = Arc::new(ConnectionPool::new(
        Arc::new(PgConnector),
        settings,
        development,
    ));

    match pool.acquire().await {
        Ok(handle) if handle.is_degraded() => {
            warn!("database unreachable, serving degraded responses")
        }
        Ok(_) => info!("database ready"),
        Err(e) => warn!(error = %e, "database unreachable at startup, will retry per request"),
    }

    tokio::spawn(purge_revocations(
        pool.clone(),
        Duration::from_secs(args.purge_interval_secs.max(1)),
    ));

    let state = wms_api::AppState::new(pool.clone(), config.clone());
    let app = wms_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("shut down");
    Ok(())
}

/// Periodically delete revocation entries past their expiry.
async fn purge_revocations(pool: Arc<ConnectionPool>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let handle = match pool.acquire().await {
            Ok(handle) if !handle.is_degraded() => handle,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "skipping revocation purge");
                continue;
            }
        };
        match blacklist::purge_expired(handle.store()).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "purged expired revocations"),
            Err(e) => warn!(error = %e, "revocation purge failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("interrupt received, draining connections");
}
