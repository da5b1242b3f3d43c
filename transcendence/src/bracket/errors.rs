//! Bracket error types.

use super::models::{MatchId, TournamentId, TournamentStatus};
use crate::db::timeouts::TimeoutError;
use thiserror::Error;

/// Bracket errors
#[derive(Debug, Error)]
pub enum BracketError {
    /// Fewer than two entrants registered
    #[error("Insufficient entrants: need {needed}, have {current}")]
    InsufficientEntrants { needed: usize, current: usize },

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Results are never overwritten
    #[error("Winner already set for match {0}")]
    WinnerAlreadySet(MatchId),

    /// Winner missing or not one of the match's occupants
    #[error("Invalid winner for match {0}")]
    InvalidWinner(MatchId),

    /// Match is still waiting for its second occupant
    #[error("Match {0} is not ready: both slots must be filled")]
    MatchNotReady(MatchId),

    /// Tournaments need room for at least two entrants
    #[error("Invalid max players: {0}")]
    InvalidMaxPlayers(u32),

    #[error("Bracket already exists for tournament {0}")]
    BracketExists(TournamentId),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Registration is closed for tournament {0}")]
    RegistrationClosed(TournamentId),

    #[error("Tournament {0} is full")]
    TournamentFull(TournamentId),

    /// User or alias already registered in this tournament
    #[error("Entrant already registered: {0}")]
    DuplicateEntrant(String),

    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidStatus {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    /// Destination slot already holds a different entrant
    #[error("Slot conflict in match {0}")]
    SlotConflict(MatchId),

    /// Game ended in a draw; the bracket cannot advance
    #[error("Game result for match {0} is undecided")]
    UndecidedResult(MatchId),

    /// Any persistence failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BracketError {
    /// Only persistence failures are worth retrying; everything else is a
    /// domain decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BracketError::StoreUnavailable(_))
    }

    /// Get a client-safe error message that doesn't leak store internals
    pub fn client_message(&self) -> String {
        match self {
            BracketError::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for BracketError {
    fn from(err: sqlx::Error) -> Self {
        BracketError::StoreUnavailable(err.to_string())
    }
}

impl From<TimeoutError> for BracketError {
    fn from(err: TimeoutError) -> Self {
        BracketError::StoreUnavailable(err.to_string())
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_only_store_errors_are_retryable() {
        assert!(BracketError::StoreUnavailable("down".to_string()).is_retryable());
        assert!(!BracketError::WinnerAlreadySet(1).is_retryable());
        assert!(!BracketError::InvalidWinner(1).is_retryable());
        assert!(
            !BracketError::InsufficientEntrants {
                needed: 2,
                current: 1
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_client_message_hides_store_details() {
        let err = BracketError::StoreUnavailable("connection refused at 10.0.0.3".to_string());
        assert!(!err.client_message().contains("10.0.0.3"));

        let err = BracketError::MatchNotFound(42);
        assert_eq!(err.client_message(), "Match not found: 42");
    }

    #[test]
    fn test_timeout_maps_to_store_unavailable() {
        let err: BracketError = TimeoutError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, BracketError::StoreUnavailable(_)));
    }
}
