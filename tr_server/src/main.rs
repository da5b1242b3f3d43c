//! Tournament bracket server.
//!
//! Serves the bracket HTTP API over PostgreSQL, or over an in-memory store
//! when started with `--memory`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use tr_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging,
};
use tracing::info;
use transcendence::{
    BracketStore, MemoryBracketStore, TournamentService,
    db::Database,
};

const HELP: &str = "\
Run the tournament bracket server

USAGE:
  tr_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:3000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/transcendence]

FLAGS:
  --memory                 Keep tournaments in memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND                       Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL                      PostgreSQL connection string
  TOURNAMENT_DEFAULT_MAX_PLAYERS    Capacity when a create request names none [default: 8]
  SEEDING                           random | registration | fixed:<seed> [default: random]
  RUST_LOG                          Log filter [default: info,sqlx=warn,hyper=warn]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let memory = pargs.contains("--memory");
    let bind: Option<SocketAddr> = pargs
        .opt_value_from_str("--bind")
        .context("Invalid --bind address")?;
    let database_url: Option<String> = pargs
        .opt_value_from_str("--db-url")
        .context("Invalid --db-url")?;

    let config = ServerConfig::from_env(bind, database_url, memory)?;
    config.validate()?;

    logging::init();
    info!("Starting tournament bracket server at {}", config.bind);

    let (store, database): (Arc<dyn BracketStore>, Option<Database>) = if config.memory {
        info!("Using in-memory bracket store; state is lost on shutdown");
        (Arc::new(MemoryBracketStore::new()), None)
    } else {
        info!("Connecting to database");
        let db = Database::new(&config.database)
            .await
            .context("Failed to connect to database")?;
        info!("Database connected successfully");
        (Arc::new(db.bracket_store()), Some(db))
    };

    let service = TournamentService::new(store, config.tournament_defaults.seeding);
    let state = AppState::new(
        service,
        database.clone(),
        config.tournament_defaults.max_players,
    );
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
