//! Tournament and match API handlers.
//!
//! Mutating endpoints log a bracket event tagged with the request ID. Errors
//! from the bracket core are mapped to status codes by [`ApiError`].
//!
//! # Examples
//!
//! Create a tournament and register an entrant:
//! ```bash
//! curl -X POST http://localhost:3000/api/v1/tournaments \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Friday Cup", "max_players": 8}'
//!
//! curl -X POST http://localhost:3000/api/v1/tournaments/1/entrants \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": 42, "alias": "marvin"}'
//! ```
//!
//! Report a game score:
//! ```bash
//! curl -X POST http://localhost:3000/api/v1/matches/3/game \
//!   -H "Content-Type: application/json" \
//!   -d '{"game_id": 900, "score_a": 11, "score_b": 7}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use transcendence::bracket::{
    BracketError, BracketView, Entrant, Match, Tournament,
    models::{EntrantId, GameId, MatchId, TournamentId},
};

use super::{AppState, request_id::RequestId};
use crate::logging::log_bracket_event;

/// Longest accepted tournament name
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted entrant alias
pub const MAX_ALIAS_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub max_players: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterEntrantRequest {
    pub user_id: i64,
    pub alias: String,
}

#[derive(Debug, Deserialize)]
pub struct MatchResultRequest {
    pub winner_id: Option<EntrantId>,
}

#[derive(Debug, Deserialize)]
pub struct GameResultRequest {
    pub game_id: GameId,
    pub score_a: i32,
    pub score_b: i32,
}

/// Outcome of a reported result
#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    /// The next-round match as it stands after the winner moved in
    pub next_match: Option<Match>,
    /// Set when the reported match was the final
    pub champion: Option<EntrantId>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by every handler in this module
#[derive(Debug)]
pub enum ApiError {
    /// Request body failed validation before reaching the bracket core
    BadRequest(String),
    Bracket(BracketError),
}

impl From<BracketError> for ApiError {
    fn from(err: BracketError) -> Self {
        ApiError::Bracket(err)
    }
}

/// Status code for a bracket error
pub fn status_for(err: &BracketError) -> StatusCode {
    match err {
        BracketError::MatchNotFound(_) | BracketError::TournamentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        BracketError::WinnerAlreadySet(_)
        | BracketError::BracketExists(_)
        | BracketError::RegistrationClosed(_)
        | BracketError::TournamentFull(_)
        | BracketError::DuplicateEntrant(_)
        | BracketError::SlotConflict(_) => StatusCode::CONFLICT,
        BracketError::InvalidWinner(_)
        | BracketError::MatchNotReady(_)
        | BracketError::InsufficientEntrants { .. }
        | BracketError::InvalidStatus { .. }
        | BracketError::UndecidedResult(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BracketError::InvalidMaxPlayers(_) => StatusCode::BAD_REQUEST,
        BracketError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            ApiError::Bracket(err) => {
                if err.is_retryable() {
                    tracing::error!("Bracket store failure: {}", err);
                }
                (status_for(&err), err.client_message())
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Create a tournament open for registration.
///
/// `max_players` defaults to the server's configured capacity.
///
/// # Errors
///
/// - `400 Bad Request`: Empty or overlong name, or `max_players` below 2
pub async fn create_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<Tournament>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "Tournament name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }

    let max_players = request.max_players.unwrap_or(state.default_max_players);
    let tournament = state.service.create_tournament(name, max_players).await?;

    log_bracket_event(
        request_id.as_str(),
        "tournament_created",
        Some(tournament.id),
        None,
        &tournament.name,
    );
    Ok((StatusCode::CREATED, Json(tournament)))
}

/// Get tournament details.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<Tournament>, ApiError> {
    Ok(Json(state.service.get_tournament(tournament_id).await?))
}

/// Register an entrant under an alias.
///
/// # Errors
///
/// - `400 Bad Request`: Empty or overlong alias
/// - `404 Not Found`: Tournament doesn't exist
/// - `409 Conflict`: Registration closed, tournament full, or user/alias taken
pub async fn register_entrant(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(tournament_id): Path<TournamentId>,
    Json(request): Json<RegisterEntrantRequest>,
) -> Result<(StatusCode, Json<Entrant>), ApiError> {
    let alias = request.alias.trim();
    if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
        return Err(ApiError::BadRequest(format!(
            "Alias must be 1 to {MAX_ALIAS_LEN} characters"
        )));
    }

    let entrant = state
        .service
        .register_entrant(tournament_id, request.user_id, alias)
        .await?;

    log_bracket_event(
        request_id.as_str(),
        "entrant_registered",
        Some(tournament_id),
        None,
        &entrant.alias,
    );
    Ok((StatusCode::CREATED, Json(entrant)))
}

/// Close registration and generate the bracket.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
/// - `409 Conflict`: Bracket already generated
/// - `422 Unprocessable Entity`: Fewer than two entrants, or tournament cancelled
pub async fn generate_bracket(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(tournament_id): Path<TournamentId>,
) -> Result<(StatusCode, Json<BracketView>), ApiError> {
    let matches = state.service.generate_bracket(tournament_id).await?;
    log_bracket_event(
        request_id.as_str(),
        "bracket_generated",
        Some(tournament_id),
        None,
        &format!("{} matches", matches.len()),
    );

    let view = state.service.get_bracket_view(tournament_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// View the bracket, round by round.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
pub async fn get_bracket(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<BracketView>, ApiError> {
    Ok(Json(state.service.get_bracket_view(tournament_id).await?))
}

/// Cancel a tournament that has not completed.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
/// - `422 Unprocessable Entity`: Tournament already completed or cancelled
pub async fn cancel_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<Tournament>, ApiError> {
    let tournament = state.service.cancel_tournament(tournament_id).await?;
    log_bracket_event(
        request_id.as_str(),
        "tournament_cancelled",
        Some(tournament_id),
        None,
        &tournament.name,
    );
    Ok(Json(tournament))
}

/// Report the winner of a match.
///
/// # Errors
///
/// - `404 Not Found`: Match doesn't exist
/// - `409 Conflict`: Result already recorded
/// - `422 Unprocessable Entity`: Winner missing or not in the match, or the
///   match is still waiting for an opponent
pub async fn report_match_result(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(match_id): Path<MatchId>,
    Json(request): Json<MatchResultRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let next_match = state
        .service
        .report_match_result(match_id, request.winner_id)
        .await?;
    Ok(Json(advanced(&request_id, match_id, request.winner_id, next_match)))
}

/// Report the score of the game played for a match.
///
/// The higher score wins; a draw is linked to the match but leaves it undecided.
///
/// # Errors
///
/// - `404 Not Found`: Match doesn't exist
/// - `409 Conflict`: Result already recorded
/// - `422 Unprocessable Entity`: Draw, or the match is still waiting for an opponent
pub async fn report_game_result(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(match_id): Path<MatchId>,
    Json(request): Json<GameResultRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let next_match = state
        .service
        .report_game_result(match_id, request.game_id, request.score_a, request.score_b)
        .await?;

    let decided = state.service.get_match(match_id).await?.winner;
    Ok(Json(advanced(&request_id, match_id, decided, next_match)))
}

fn advanced(
    request_id: &RequestId,
    match_id: MatchId,
    winner: Option<EntrantId>,
    next_match: Option<Match>,
) -> AdvanceResponse {
    let champion = if next_match.is_none() { winner } else { None };
    log_bracket_event(
        request_id.as_str(),
        if champion.is_some() {
            "champion_decided"
        } else {
            "result_recorded"
        },
        next_match.as_ref().map(|m| m.tournament_id),
        Some(match_id),
        &format!("winner {}", winner.map_or_else(|| "-".to_string(), |w| w.to_string())),
    );

    AdvanceResponse {
        next_match,
        champion,
    }
}
