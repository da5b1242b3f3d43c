//! HTTP API for tournament brackets.
//!
//! # Endpoints Overview
//!
//! ## Tournaments
//! - `POST /api/v1/tournaments` - Create a tournament
//! - `GET /api/v1/tournaments/{id}` - Get tournament details
//! - `POST /api/v1/tournaments/{id}/entrants` - Register an entrant
//! - `POST /api/v1/tournaments/{id}/bracket` - Generate the bracket
//! - `GET /api/v1/tournaments/{id}/bracket` - View the bracket
//! - `POST /api/v1/tournaments/{id}/cancel` - Cancel the tournament
//!
//! ## Matches
//! - `POST /api/v1/matches/{id}/result` - Report the winner of a match
//! - `POST /api/v1/matches/{id}/game` - Report the score of the game played for a match
//!
//! ## Health Check
//! - `GET /health` - Server health status
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tr_server::api::{AppState, create_router};
//! use transcendence::{MemoryBracketStore, SeedingPolicy, TournamentService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TournamentService::new(Arc::new(MemoryBracketStore::new()), SeedingPolicy::Random);
//! let state = AppState::new(service, None, 8);
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod request_id;
pub mod tournaments;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use transcendence::{TournamentService, db::Database};

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TournamentService>,
    /// `None` when running on the in-memory store
    pub database: Option<Database>,
    /// Capacity for tournaments created without an explicit `max_players`
    pub default_max_players: u32,
}

impl AppState {
    pub fn new(service: TournamentService, database: Option<Database>, default_max_players: u32) -> Self {
        Self {
            service: Arc::new(service),
            database,
            default_max_players,
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET  /health                                   - Health check
/// POST /api/v1/tournaments                       - Create tournament
/// GET  /api/v1/tournaments/{id}                  - Get tournament
/// POST /api/v1/tournaments/{id}/entrants         - Register entrant
/// POST /api/v1/tournaments/{id}/bracket          - Generate bracket
/// GET  /api/v1/tournaments/{id}/bracket          - View bracket
/// POST /api/v1/tournaments/{id}/cancel           - Cancel tournament
/// POST /api/v1/matches/{id}/result               - Report match winner
/// POST /api/v1/matches/{id}/game                 - Report game score
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id::request_id_middleware))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API v1 routes
fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/tournaments", post(tournaments::create_tournament))
        .route("/tournaments/{tournament_id}", get(tournaments::get_tournament))
        .route(
            "/tournaments/{tournament_id}/entrants",
            post(tournaments::register_entrant),
        )
        .route(
            "/tournaments/{tournament_id}/bracket",
            post(tournaments::generate_bracket).get(tournaments::get_bracket),
        )
        .route(
            "/tournaments/{tournament_id}/cancel",
            post(tournaments::cancel_tournament),
        )
        .route("/matches/{match_id}/result", post(tournaments::report_match_result))
        .route("/matches/{match_id}/game", post(tournaments::report_game_result))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store is reachable, `503 Service Unavailable`
/// otherwise. The in-memory store is always healthy.
///
/// ```bash
/// curl http://localhost:3000/health
/// # {"status":"healthy","database":"in_memory","timestamp":"2026-10-18T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (healthy, database) = match &state.database {
        Some(db) => {
            let ok = db.health_check().await.is_ok();
            (ok, if ok { "connected" } else { "unreachable" })
        }
        None => (true, "in_memory"),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
