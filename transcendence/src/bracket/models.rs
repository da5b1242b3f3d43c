//! Bracket data models: entrants, matches, tournaments and read-only views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tournament ID type
pub type TournamentId = i64;

/// Entrant ID type (a registration, not a user account)
pub type EntrantId = i64;

/// Match ID type
pub type MatchId = i64;

/// External game record ID type
pub type GameId = i64;

/// A player registered for one tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    /// Entrant ID
    pub id: EntrantId,
    /// Owning tournament
    pub tournament_id: TournamentId,
    /// Underlying user account
    pub user_id: i64,
    /// Display alias, unique per tournament
    pub alias: String,
}

/// One of the two entrant positions of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// Destination slot in the next round for a match at `order`.
    ///
    /// Odd orders feed slot A, even orders feed slot B.
    pub fn for_order(order: u32) -> Self {
        if order % 2 == 1 { Slot::A } else { Slot::B }
    }

    /// Column backing this slot in the `tournament_matches` table
    pub fn column(self) -> &'static str {
        match self {
            Slot::A => "player1_id",
            Slot::B => "player2_id",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::A => write!(f, "A"),
            Slot::B => write!(f, "B"),
        }
    }
}

/// Lifecycle of a single match. No transition is reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Both slots unset
    Empty,
    /// One slot set, waiting on the other predecessor
    Pending,
    /// Both slots set
    Ready,
    /// Winner recorded
    Decided,
}

/// A persisted bracket match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    /// 1 = first round
    pub round: u32,
    /// 1-based position within the round
    pub order: u32,
    pub slot_a: Option<EntrantId>,
    pub slot_b: Option<EntrantId>,
    pub winner: Option<EntrantId>,
    pub game_id: Option<GameId>,
}

impl Match {
    /// Entrant occupying `slot`, if any
    pub fn occupant(&self, slot: Slot) -> Option<EntrantId> {
        match slot {
            Slot::A => self.slot_a,
            Slot::B => self.slot_b,
        }
    }

    /// Occupants of both slots, skipping unset ones
    pub fn occupants(&self) -> impl Iterator<Item = EntrantId> {
        self.slot_a.into_iter().chain(self.slot_b)
    }

    /// Whether `entrant` sits in either slot
    pub fn is_occupant(&self, entrant: EntrantId) -> bool {
        self.occupants().any(|e| e == entrant)
    }

    pub fn state(&self) -> MatchState {
        if self.winner.is_some() {
            return MatchState::Decided;
        }
        match (self.slot_a, self.slot_b) {
            (None, None) => MatchState::Empty,
            (Some(_), Some(_)) => MatchState::Ready,
            _ => MatchState::Pending,
        }
    }

    /// Where this match's winner goes: `(round, order, slot)` of the next round
    pub fn destination(&self) -> (u32, u32, Slot) {
        (self.round + 1, self.order.div_ceil(2), Slot::for_order(self.order))
    }
}

/// A match before the store has assigned it an ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub round: u32,
    pub order: u32,
    pub slot_a: Option<EntrantId>,
    pub slot_b: Option<EntrantId>,
    pub winner: Option<EntrantId>,
}

impl NewMatch {
    /// Placeholder match with both slots unset
    pub fn placeholder(round: u32, order: u32) -> Self {
        Self {
            round,
            order,
            slot_a: None,
            slot_b: None,
            winner: None,
        }
    }

    pub(crate) fn set_slot(&mut self, slot: Slot, entrant: EntrantId) {
        match slot {
            Slot::A => self.slot_a = Some(entrant),
            Slot::B => self.slot_b = Some(entrant),
        }
    }
}

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Accepting entrants
    Registration,
    /// Bracket generated, matches being played
    Active,
    /// Champion decided
    Completed,
    /// Cancelled before completion
    Cancelled,
}

impl TournamentStatus {
    /// Persisted representation
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Registration => "registration",
            TournamentStatus::Active => "active",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(TournamentStatus::Registration),
            "active" => Ok(TournamentStatus::Active),
            "completed" => Ok(TournamentStatus::Completed),
            "cancelled" => Ok(TournamentStatus::Cancelled),
            other => Err(format!("unknown tournament status: {other}")),
        }
    }
}

/// Tournament record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    pub max_players: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of an externally played game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// The occupant of this slot won
    Winner(Slot),
    /// Equal scores; no winner
    Draw,
}

impl GameOutcome {
    /// Higher score wins, equal scores is a draw
    pub fn from_scores(score_a: i32, score_b: i32) -> Self {
        match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => GameOutcome::Winner(Slot::A),
            std::cmp::Ordering::Less => GameOutcome::Winner(Slot::B),
            std::cmp::Ordering::Equal => GameOutcome::Draw,
        }
    }
}

/// Entrant as shown in a bracket view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrantView {
    pub id: EntrantId,
    pub alias: String,
}

/// Match as shown in a bracket view
#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub id: MatchId,
    pub order: u32,
    pub slot_a: Option<EntrantView>,
    pub slot_b: Option<EntrantView>,
    pub winner: Option<EntrantView>,
    pub game_id: Option<GameId>,
    pub state: MatchState,
}

/// All matches of one round
#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub round: u32,
    pub matches: Vec<MatchView>,
}

/// Read-only projection of a whole bracket
#[derive(Debug, Clone, Serialize)]
pub struct BracketView {
    pub tournament_id: TournamentId,
    pub status: TournamentStatus,
    pub total_rounds: u32,
    pub rounds: Vec<RoundView>,
    pub champion: Option<EntrantView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(order: u32) -> Match {
        Match {
            id: 1,
            tournament_id: 7,
            round: 1,
            order,
            slot_a: None,
            slot_b: None,
            winner: None,
            game_id: None,
        }
    }

    #[test]
    fn test_slot_for_order_parity() {
        assert_eq!(Slot::for_order(1), Slot::A);
        assert_eq!(Slot::for_order(2), Slot::B);
        assert_eq!(Slot::for_order(3), Slot::A);
        assert_eq!(Slot::for_order(8), Slot::B);
    }

    #[test]
    fn test_match_destination() {
        let mut m = sample_match(3);
        m.round = 2;
        assert_eq!(m.destination(), (3, 2, Slot::A));

        let m = sample_match(4);
        assert_eq!(m.destination(), (2, 2, Slot::B));
    }

    #[test]
    fn test_match_state_transitions() {
        let mut m = sample_match(1);
        assert_eq!(m.state(), MatchState::Empty);

        m.slot_b = Some(10);
        assert_eq!(m.state(), MatchState::Pending);

        m.slot_a = Some(11);
        assert_eq!(m.state(), MatchState::Ready);

        m.winner = Some(11);
        assert_eq!(m.state(), MatchState::Decided);
    }

    #[test]
    fn test_tournament_status_round_trip() {
        for status in [
            TournamentStatus::Registration,
            TournamentStatus::Active,
            TournamentStatus::Completed,
            TournamentStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TournamentStatus>(), Ok(status));
        }
        assert!("pending".parse::<TournamentStatus>().is_err());
    }

    #[test]
    fn test_game_outcome_from_scores() {
        assert_eq!(GameOutcome::from_scores(11, 4), GameOutcome::Winner(Slot::A));
        assert_eq!(GameOutcome::from_scores(2, 11), GameOutcome::Winner(Slot::B));
        assert_eq!(GameOutcome::from_scores(5, 5), GameOutcome::Draw);
    }

    #[test]
    fn test_match_state_serializes_snake_case() {
        let json = serde_json::to_string(&MatchState::Decided).unwrap();
        assert_eq!(json, "\"decided\"");
    }
}
