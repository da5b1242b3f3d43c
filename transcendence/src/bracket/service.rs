//! Tournament service: registration, bracket generation and result reporting
//! over an injected bracket store.

use super::{
    builder::{BracketBuilder, MIN_ENTRANTS},
    engine::AdvancementEngine,
    errors::{BracketError, BracketResult},
    models::{
        BracketView, Entrant, EntrantId, EntrantView, GameId, GameOutcome, Match, MatchId,
        MatchView, RoundView, Tournament, TournamentId, TournamentStatus,
    },
    seeding::SeedingPolicy,
};
use crate::db::{BracketStore, WriteOutcome};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Tournament service
#[derive(Clone)]
pub struct TournamentService {
    store: Arc<dyn BracketStore>,
    engine: AdvancementEngine,
    seeding: SeedingPolicy,
}

impl TournamentService {
    pub fn new(store: Arc<dyn BracketStore>, seeding: SeedingPolicy) -> Self {
        Self {
            engine: AdvancementEngine::new(store.clone()),
            store,
            seeding,
        }
    }

    /// Create a tournament open for registration
    pub async fn create_tournament(&self, name: &str, max_players: u32) -> BracketResult<Tournament> {
        if (max_players as usize) < MIN_ENTRANTS {
            return Err(BracketError::InvalidMaxPlayers(max_players));
        }

        let tournament = self.store.create_tournament(name, max_players).await?;
        info!(
            "Created tournament {} '{}' (max {} players)",
            tournament.id, tournament.name, max_players
        );
        Ok(tournament)
    }

    pub async fn get_tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament> {
        self.store
            .get_tournament(tournament_id)
            .await?
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }

    pub async fn get_match(&self, match_id: MatchId) -> BracketResult<Match> {
        self.store
            .get_match_by_id(match_id)
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))
    }

    /// Register a user under `alias`
    ///
    /// # Errors
    ///
    /// * `BracketError::TournamentNotFound` - unknown tournament
    /// * `BracketError::RegistrationClosed` - bracket already generated or tournament over
    /// * `BracketError::TournamentFull` - `max_players` reached
    /// * `BracketError::DuplicateEntrant` - user or alias already registered
    pub async fn register_entrant(
        &self,
        tournament_id: TournamentId,
        user_id: i64,
        alias: &str,
    ) -> BracketResult<Entrant> {
        let entrant = self.store.add_entrant(tournament_id, user_id, alias).await?;
        info!(
            "Registered '{}' (user {}) for tournament {}",
            entrant.alias, user_id, tournament_id
        );
        Ok(entrant)
    }

    /// Close registration and generate the bracket from the final roster.
    ///
    /// Registration is closed before the roster is read, so nobody can join
    /// a tournament whose bracket is being laid out. A tournament left active
    /// without matches by an earlier failed attempt is generated again.
    ///
    /// # Errors
    ///
    /// * `BracketError::TournamentNotFound` - unknown tournament
    /// * `BracketError::BracketExists` - matches already exist
    /// * `BracketError::InvalidStatus` - tournament is completed or cancelled
    /// * `BracketError::InsufficientEntrants` - fewer than two entrants
    pub async fn generate_bracket(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let tournament = self.get_tournament(tournament_id).await?;

        if !self.store.list_matches(tournament_id).await?.is_empty() {
            return Err(BracketError::BracketExists(tournament_id));
        }

        match tournament.status {
            TournamentStatus::Registration => {
                let registered = self.store.list_entrants(tournament_id).await?.len();
                if registered < MIN_ENTRANTS {
                    return Err(BracketError::InsufficientEntrants {
                        needed: MIN_ENTRANTS,
                        current: registered,
                    });
                }

                if self.store.close_registration(tournament_id).await? == WriteOutcome::AlreadySet {
                    let current = self.get_tournament(tournament_id).await?;
                    if current.status != TournamentStatus::Active {
                        return Err(BracketError::InvalidStatus {
                            expected: TournamentStatus::Registration,
                            actual: current.status,
                        });
                    }
                }
            }
            TournamentStatus::Active => {
                info!(
                    "Tournament {} is active without a bracket; generating again",
                    tournament_id
                );
            }
            status => {
                return Err(BracketError::InvalidStatus {
                    expected: TournamentStatus::Registration,
                    actual: status,
                });
            }
        }

        let entrants = self.store.list_entrants(tournament_id).await?;
        let mut seeding = self.seeding.seeding();
        BracketBuilder::new(self.store.clone(), move |entrants: Vec<Entrant>| {
            (*seeding).permute(entrants)
        })
        .build(tournament_id, entrants)
        .await
    }

    /// Record the winner of a match and advance them.
    ///
    /// Returns the next-round match, or `None` when the final was decided.
    /// Repeating the recorded result is refused with `WinnerAlreadySet`, but
    /// first finishes any advancement an earlier attempt left undone.
    pub async fn report_match_result(
        &self,
        match_id: MatchId,
        winner: Option<EntrantId>,
    ) -> BracketResult<Option<Match>> {
        self.active_match(match_id).await?;

        let result = match self.engine.record_winner(match_id, winner).await {
            Err(BracketError::WinnerAlreadySet(_)) => {
                let current = self.get_match(match_id).await?;
                Err(self.refuse_repeat(&current, winner).await)
            }
            result => result,
        };
        result.inspect_err(|e| warn!("Refused result for match {}: {}", match_id, e))
    }

    /// Record the outcome of the game played for a match.
    ///
    /// The game is linked to the match first; a draw leaves the match
    /// undecided and fails with `BracketError::UndecidedResult`.
    pub async fn report_game_result(
        &self,
        match_id: MatchId,
        game_id: GameId,
        score_a: i32,
        score_b: i32,
    ) -> BracketResult<Option<Match>> {
        let current = self.active_match(match_id).await?;
        let outcome = GameOutcome::from_scores(score_a, score_b);

        if current.winner.is_some() {
            let winner = match outcome {
                GameOutcome::Winner(slot) => current.occupant(slot),
                GameOutcome::Draw => None,
            };
            return Err(self.refuse_repeat(&current, winner).await);
        }

        self.store.link_game(match_id, game_id).await?;

        match outcome {
            GameOutcome::Draw => {
                warn!(
                    "Game {} for match {} ended {}-{}; match stays undecided",
                    game_id, match_id, score_a, score_b
                );
                Err(BracketError::UndecidedResult(match_id))
            }
            GameOutcome::Winner(slot) => {
                self.report_match_result(match_id, current.occupant(slot))
                    .await
            }
        }
    }

    /// Read-only projection of the bracket with entrant aliases
    pub async fn get_bracket_view(&self, tournament_id: TournamentId) -> BracketResult<BracketView> {
        let tournament = self.get_tournament(tournament_id).await?;
        let entrants = self.store.list_entrants(tournament_id).await?;
        let matches = self.store.list_matches(tournament_id).await?;

        let aliases: HashMap<EntrantId, &str> =
            entrants.iter().map(|e| (e.id, e.alias.as_str())).collect();
        let view = |id: Option<EntrantId>| {
            id.map(|id| EntrantView {
                id,
                alias: aliases.get(&id).copied().unwrap_or_default().to_string(),
            })
        };

        let mut rounds: Vec<RoundView> = Vec::new();
        for m in &matches {
            if rounds.last().is_none_or(|r| r.round != m.round) {
                rounds.push(RoundView {
                    round: m.round,
                    matches: Vec::new(),
                });
            }
            if let Some(round) = rounds.last_mut() {
                round.matches.push(MatchView {
                    id: m.id,
                    order: m.order,
                    slot_a: view(m.slot_a),
                    slot_b: view(m.slot_b),
                    winner: view(m.winner),
                    game_id: m.game_id,
                    state: m.state(),
                });
            }
        }

        Ok(BracketView {
            tournament_id,
            status: tournament.status,
            total_rounds: rounds.len() as u32,
            champion: view(final_winner(&matches)),
            rounds,
        })
    }

    /// The winner of the final, once decided
    pub async fn champion(&self, tournament_id: TournamentId) -> BracketResult<Option<Entrant>> {
        self.get_tournament(tournament_id).await?;
        let matches = self.store.list_matches(tournament_id).await?;

        let Some(champion) = final_winner(&matches) else {
            return Ok(None);
        };
        Ok(self
            .store
            .list_entrants(tournament_id)
            .await?
            .into_iter()
            .find(|e| e.id == champion))
    }

    /// Cancel a tournament that has not completed
    pub async fn cancel_tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament> {
        let tournament = self.get_tournament(tournament_id).await?;
        if matches!(
            tournament.status,
            TournamentStatus::Completed | TournamentStatus::Cancelled
        ) {
            return Err(BracketError::InvalidStatus {
                expected: TournamentStatus::Active,
                actual: tournament.status,
            });
        }

        self.store
            .set_tournament_status(tournament_id, TournamentStatus::Cancelled)
            .await?;
        info!("Cancelled tournament {}", tournament_id);
        self.get_tournament(tournament_id).await
    }

    /// Error for a result reported against a decided match.
    ///
    /// When the report repeats the recorded winner, the winner is carried
    /// forward again in case the previous attempt failed after deciding the
    /// match but before filling the next slot.
    async fn refuse_repeat(&self, decided: &Match, winner: Option<EntrantId>) -> BracketError {
        if decided.winner.is_some() && decided.winner == winner {
            match self.engine.ensure_propagated(decided.id).await {
                Ok(_) => debug!("Re-applied advancement from match {}", decided.id),
                Err(e) => warn!("Could not finish advancing match {}: {}", decided.id, e),
            }
        }
        BracketError::WinnerAlreadySet(decided.id)
    }

    /// Load a match whose tournament is still being played
    async fn active_match(&self, match_id: MatchId) -> BracketResult<Match> {
        let current = self.get_match(match_id).await?;

        let tournament = self.get_tournament(current.tournament_id).await?;
        if tournament.status != TournamentStatus::Active {
            if tournament.status == TournamentStatus::Completed {
                return Err(BracketError::WinnerAlreadySet(match_id));
            }
            return Err(BracketError::InvalidStatus {
                expected: TournamentStatus::Active,
                actual: tournament.status,
            });
        }
        Ok(current)
    }
}

/// Winner of the last round's only match
fn final_winner(matches: &[Match]) -> Option<EntrantId> {
    let last_round = matches.iter().map(|m| m.round).max()?;
    matches
        .iter()
        .find(|m| m.round == last_round && m.order == 1)
        .and_then(|m| m.winner)
}
