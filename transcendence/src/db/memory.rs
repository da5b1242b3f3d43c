//! In-memory bracket store.
//!
//! Mirrors the conditional-write semantics of [`PgBracketStore`](super::PgBracketStore)
//! under a single mutex. Used by tests and by the server when started without
//! a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::repository::{BracketStore, WriteOutcome};
use crate::bracket::{
    BracketError, BracketResult,
    models::{
        Entrant, EntrantId, GameId, Match, MatchId, NewMatch, Slot, Tournament, TournamentId,
        TournamentStatus,
    },
};

#[derive(Default)]
struct Inner {
    tournaments: BTreeMap<TournamentId, Tournament>,
    entrants: Vec<Entrant>,
    matches: BTreeMap<MatchId, Match>,
    last_tournament_id: i64,
    last_entrant_id: i64,
    last_match_id: i64,
}

impl Inner {
    fn tournament_mut(&mut self, tournament_id: TournamentId) -> BracketResult<&mut Tournament> {
        self.tournaments
            .get_mut(&tournament_id)
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }
}

/// Mutex-guarded in-memory implementation of `BracketStore`
#[derive(Default)]
pub struct MemoryBracketStore {
    inner: Mutex<Inner>,
}

impl MemoryBracketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_status(tournament: &mut Tournament, status: TournamentStatus) {
    tournament.status = status;
    match status {
        TournamentStatus::Active => {
            tournament.started_at.get_or_insert_with(Utc::now);
        }
        TournamentStatus::Completed | TournamentStatus::Cancelled => {
            tournament.completed_at = Some(Utc::now())
        }
        TournamentStatus::Registration => {}
    }
}

#[async_trait]
impl BracketStore for MemoryBracketStore {
    async fn create_tournament(&self, name: &str, max_players: u32) -> BracketResult<Tournament> {
        let mut inner = self.lock();
        inner.last_tournament_id += 1;
        let tournament = Tournament {
            id: inner.last_tournament_id,
            name: name.to_string(),
            status: TournamentStatus::Registration,
            max_players,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        inner.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Option<Tournament>> {
        Ok(self.lock().tournaments.get(&tournament_id).cloned())
    }

    async fn set_tournament_status(
        &self,
        tournament_id: TournamentId,
        status: TournamentStatus,
    ) -> BracketResult<()> {
        let mut inner = self.lock();
        apply_status(inner.tournament_mut(tournament_id)?, status);
        Ok(())
    }

    async fn close_registration(&self, tournament_id: TournamentId) -> BracketResult<WriteOutcome> {
        let mut inner = self.lock();
        let tournament = inner.tournament_mut(tournament_id)?;
        if tournament.status != TournamentStatus::Registration {
            return Ok(WriteOutcome::AlreadySet);
        }
        apply_status(tournament, TournamentStatus::Active);
        Ok(WriteOutcome::Written)
    }

    async fn add_entrant(
        &self,
        tournament_id: TournamentId,
        user_id: i64,
        alias: &str,
    ) -> BracketResult<Entrant> {
        let mut inner = self.lock();
        let tournament = inner.tournament_mut(tournament_id)?;
        if tournament.status != TournamentStatus::Registration {
            return Err(BracketError::RegistrationClosed(tournament_id));
        }
        let max_players = tournament.max_players as usize;

        let registered: Vec<&Entrant> = inner
            .entrants
            .iter()
            .filter(|e| e.tournament_id == tournament_id)
            .collect();

        if registered.len() >= max_players {
            return Err(BracketError::TournamentFull(tournament_id));
        }
        if registered
            .iter()
            .any(|e| e.user_id == user_id || e.alias == alias)
        {
            return Err(BracketError::DuplicateEntrant(alias.to_string()));
        }

        inner.last_entrant_id += 1;
        let entrant = Entrant {
            id: inner.last_entrant_id,
            tournament_id,
            user_id,
            alias: alias.to_string(),
        };
        inner.entrants.push(entrant.clone());
        Ok(entrant)
    }

    async fn list_entrants(&self, tournament_id: TournamentId) -> BracketResult<Vec<Entrant>> {
        Ok(self
            .lock()
            .entrants
            .iter()
            .filter(|e| e.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn insert_matches(
        &self,
        tournament_id: TournamentId,
        matches: &[NewMatch],
    ) -> BracketResult<Vec<Match>> {
        let mut inner = self.lock();
        inner.tournament_mut(tournament_id)?;

        if inner
            .matches
            .values()
            .any(|m| m.tournament_id == tournament_id)
        {
            return Err(BracketError::BracketExists(tournament_id));
        }

        let mut inserted = Vec::with_capacity(matches.len());
        for m in matches {
            inner.last_match_id += 1;
            let stored = Match {
                id: inner.last_match_id,
                tournament_id,
                round: m.round,
                order: m.order,
                slot_a: m.slot_a,
                slot_b: m.slot_b,
                winner: m.winner,
                game_id: None,
            };
            inner.matches.insert(stored.id, stored.clone());
            inserted.push(stored);
        }

        apply_status(inner.tournament_mut(tournament_id)?, TournamentStatus::Active);
        Ok(inserted)
    }

    async fn get_match(
        &self,
        tournament_id: TournamentId,
        round: u32,
        order: u32,
    ) -> BracketResult<Option<Match>> {
        Ok(self
            .lock()
            .matches
            .values()
            .find(|m| m.tournament_id == tournament_id && m.round == round && m.order == order)
            .cloned())
    }

    async fn get_match_by_id(&self, match_id: MatchId) -> BracketResult<Option<Match>> {
        Ok(self.lock().matches.get(&match_id).cloned())
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let mut matches: Vec<Match> = self
            .lock()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.round, m.order));
        Ok(matches)
    }

    async fn update_match_winner(
        &self,
        match_id: MatchId,
        winner: EntrantId,
    ) -> BracketResult<WriteOutcome> {
        let mut inner = self.lock();
        let m = inner
            .matches
            .get_mut(&match_id)
            .ok_or(BracketError::MatchNotFound(match_id))?;

        if m.winner.is_some() {
            return Ok(WriteOutcome::AlreadySet);
        }
        m.winner = Some(winner);
        Ok(WriteOutcome::Written)
    }

    async fn update_match_slot(
        &self,
        match_id: MatchId,
        slot: Slot,
        entrant: EntrantId,
    ) -> BracketResult<WriteOutcome> {
        let mut inner = self.lock();
        let m = inner
            .matches
            .get_mut(&match_id)
            .ok_or(BracketError::MatchNotFound(match_id))?;

        let target = match slot {
            Slot::A => &mut m.slot_a,
            Slot::B => &mut m.slot_b,
        };
        if target.is_some() {
            return Ok(WriteOutcome::AlreadySet);
        }
        *target = Some(entrant);
        Ok(WriteOutcome::Written)
    }

    async fn link_game(&self, match_id: MatchId, game_id: GameId) -> BracketResult<()> {
        let mut inner = self.lock();
        let m = inner
            .matches
            .get_mut(&match_id)
            .ok_or(BracketError::MatchNotFound(match_id))?;
        m.game_id = Some(game_id);
        Ok(())
    }
}
