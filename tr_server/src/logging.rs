//! Structured logging configuration.
//!
//! Log records emitted by the bracket library through the `log` facade are
//! picked up by the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use tr_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a bracket-changing request outcome with structured fields
pub fn log_bracket_event(
    request_id: &str,
    event_type: &str,
    tournament_id: Option<i64>,
    match_id: Option<i64>,
    message: &str,
) {
    tracing::info!(
        request_id = request_id,
        event_type = event_type,
        tournament_id = tournament_id,
        match_id = match_id,
        "BRACKET: {}",
        message
    );
}
