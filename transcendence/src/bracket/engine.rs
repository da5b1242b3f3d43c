//! Winner recording and propagation into later rounds.

use super::{
    errors::{BracketError, BracketResult},
    models::{EntrantId, Match, MatchId, MatchState, Slot, TournamentStatus},
};
use crate::db::{BracketStore, WriteOutcome};
use log::{debug, info};
use std::sync::Arc;

/// Records match results and advances winners through the bracket
#[derive(Clone)]
pub struct AdvancementEngine {
    store: Arc<dyn BracketStore>,
}

impl AdvancementEngine {
    pub fn new(store: Arc<dyn BracketStore>) -> Self {
        Self { store }
    }

    /// Record the winner of a match and place them in the next round.
    ///
    /// Returns the next-round match as it stands after the write, or `None`
    /// when this was the final and the winner is champion. In that case the
    /// tournament is marked completed.
    ///
    /// # Errors
    ///
    /// * `BracketError::MatchNotFound` - unknown match
    /// * `BracketError::WinnerAlreadySet` - result already recorded, including
    ///   when a concurrent call won the race
    /// * `BracketError::InvalidWinner` - `winner` is `None` or not an occupant
    /// * `BracketError::MatchNotReady` - the opponent slot is still empty
    pub async fn record_winner(
        &self,
        match_id: MatchId,
        winner: Option<EntrantId>,
    ) -> BracketResult<Option<Match>> {
        let current = self
            .store
            .get_match_by_id(match_id)
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))?;

        if current.winner.is_some() {
            return Err(BracketError::WinnerAlreadySet(match_id));
        }

        let winner = winner
            .filter(|&w| current.is_occupant(w))
            .ok_or(BracketError::InvalidWinner(match_id))?;

        if current.state() != MatchState::Ready {
            return Err(BracketError::MatchNotReady(match_id));
        }

        if self.store.update_match_winner(match_id, winner).await? == WriteOutcome::AlreadySet {
            return Err(BracketError::WinnerAlreadySet(match_id));
        }
        debug!(
            "Match {} (round {}, order {}) won by entrant {}",
            match_id, current.round, current.order, winner
        );

        self.advance_from(current, winner).await
    }

    /// Re-apply a decided match's winner to its destination slot.
    ///
    /// Safe to call any number of times. Repairs the state where the winner
    /// was recorded but the next-round slot write never landed.
    ///
    /// # Errors
    ///
    /// * `BracketError::MatchNotFound` - unknown match
    /// * `BracketError::MatchNotReady` - the match has no winner yet
    /// * `BracketError::SlotConflict` - destination holds someone else
    pub async fn ensure_propagated(&self, match_id: MatchId) -> BracketResult<Option<Match>> {
        let decided = self
            .store
            .get_match_by_id(match_id)
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))?;

        let winner = decided
            .winner
            .ok_or(BracketError::MatchNotReady(match_id))?;

        self.advance_from(decided, winner).await
    }

    /// Carry `winner` forward from `decided`, auto-resolving any single-feeder
    /// match it lands in.
    async fn advance_from(
        &self,
        mut decided: Match,
        winner: EntrantId,
    ) -> BracketResult<Option<Match>> {
        let mut first: Option<Match> = None;

        loop {
            let (round, order, slot) = decided.destination();
            let Some(next) = self
                .store
                .get_match(decided.tournament_id, round, order)
                .await?
            else {
                if first.is_none() {
                    self.crown(&decided, winner).await?;
                }
                return Ok(first);
            };

            let mut next = self.fill_slot(next, slot, winner).await?;

            if next.winner.is_none() && self.is_single_feeder(&next).await? {
                if self.store.update_match_winner(next.id, winner).await? == WriteOutcome::Written {
                    debug!(
                        "Match {} (round {}) auto-resolved for lone entrant {}",
                        next.id, next.round, winner
                    );
                }
                next.winner = Some(winner);
                let done = next.clone();
                first.get_or_insert(next);
                decided = done;
                continue;
            }

            return Ok(Some(first.unwrap_or(next)));
        }
    }

    /// Write `winner` into `slot` of `next` and return the fresh row.
    async fn fill_slot(&self, next: Match, slot: Slot, winner: EntrantId) -> BracketResult<Match> {
        let outcome = self.store.update_match_slot(next.id, slot, winner).await?;

        let refreshed = self
            .store
            .get_match_by_id(next.id)
            .await?
            .ok_or(BracketError::MatchNotFound(next.id))?;

        if outcome == WriteOutcome::AlreadySet && refreshed.occupant(slot) != Some(winner) {
            return Err(BracketError::SlotConflict(next.id));
        }

        debug!(
            "Entrant {} placed in slot {} of match {} (round {}, order {})",
            winner, slot, refreshed.id, refreshed.round, refreshed.order
        );
        Ok(refreshed)
    }

    /// A later-round match whose second feeder does not exist
    async fn is_single_feeder(&self, m: &Match) -> BracketResult<bool> {
        if m.round <= 1 {
            return Ok(false);
        }
        let sibling = self
            .store
            .get_match(m.tournament_id, m.round - 1, m.order * 2)
            .await?;
        Ok(sibling.is_none())
    }

    async fn crown(&self, final_match: &Match, champion: EntrantId) -> BracketResult<()> {
        info!(
            "Tournament {} completed: entrant {} is champion (match {})",
            final_match.tournament_id, champion, final_match.id
        );
        self.store
            .set_tournament_status(final_match.tournament_id, TournamentStatus::Completed)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{builder::BracketBuilder, seeding::RegistrationOrder};
    use crate::db::MemoryBracketStore;

    async fn setup(n: i64) -> (Arc<MemoryBracketStore>, AdvancementEngine, Vec<Match>) {
        let store = Arc::new(MemoryBracketStore::new());
        let t = store.create_tournament("Engine", 32).await.unwrap();
        let mut entrants = Vec::new();
        for i in 1..=n {
            entrants.push(store.add_entrant(t.id, i, &format!("p{i}")).await.unwrap());
        }
        let matches = BracketBuilder::new(store.clone(), RegistrationOrder)
            .build(t.id, entrants)
            .await
            .unwrap();
        (store.clone(), AdvancementEngine::new(store), matches)
    }

    fn at(matches: &[Match], round: u32, order: u32) -> &Match {
        matches
            .iter()
            .find(|m| m.round == round && m.order == order)
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_match() {
        let (_, engine, _) = setup(4).await;
        let err = engine.record_winner(999, Some(1)).await.unwrap_err();
        assert!(matches!(err, BracketError::MatchNotFound(999)));
    }

    #[tokio::test]
    async fn test_winner_goes_to_slot_by_parity() {
        let (_, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1);
        let m2 = at(&matches, 1, 2);

        let next = engine.record_winner(m1.id, m1.slot_b).await.unwrap().unwrap();
        assert_eq!((next.round, next.order), (2, 1));
        assert_eq!(next.slot_a, m1.slot_b);
        assert_eq!(next.slot_b, None);

        let next = engine.record_winner(m2.id, m2.slot_a).await.unwrap().unwrap();
        assert_eq!(next.slot_b, m2.slot_a);
        assert_eq!(next.state(), MatchState::Ready);
    }

    #[tokio::test]
    async fn test_second_result_rejected() {
        let (_, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1);

        engine.record_winner(m1.id, m1.slot_a).await.unwrap();
        for retry in [m1.slot_a, m1.slot_b] {
            let err = engine.record_winner(m1.id, retry).await.unwrap_err();
            assert!(matches!(err, BracketError::WinnerAlreadySet(_)));
        }
    }

    #[tokio::test]
    async fn test_invalid_winner() {
        let (_, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1);
        let outsider = at(&matches, 1, 2).slot_a;

        for bad in [None, outsider, Some(12345)] {
            let err = engine.record_winner(m1.id, bad).await.unwrap_err();
            assert!(matches!(err, BracketError::InvalidWinner(_)));
        }
    }

    #[tokio::test]
    async fn test_match_not_ready() {
        let (_, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1);
        let final_match = at(&matches, 2, 1);

        // Empty final: nobody is an occupant yet
        let err = engine.record_winner(final_match.id, m1.slot_a).await.unwrap_err();
        assert!(matches!(err, BracketError::InvalidWinner(_)));

        engine.record_winner(m1.id, m1.slot_a).await.unwrap();
        let err = engine.record_winner(final_match.id, m1.slot_a).await.unwrap_err();
        assert!(matches!(err, BracketError::MatchNotReady(_)));
    }

    #[tokio::test]
    async fn test_final_crowns_champion() {
        let (store, engine, matches) = setup(2).await;
        let only = &matches[0];

        let next = engine.record_winner(only.id, only.slot_b).await.unwrap();
        assert!(next.is_none());

        let t = store.get_tournament(only.tournament_id).await.unwrap().unwrap();
        assert_eq!(t.status, TournamentStatus::Completed);
        assert!(t.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_bye_is_already_decided() {
        let (_, engine, matches) = setup(3).await;
        let bye = at(&matches, 1, 2);
        assert_eq!(bye.winner, bye.slot_a);

        let err = engine.record_winner(bye.id, bye.slot_a).await.unwrap_err();
        assert!(matches!(err, BracketError::WinnerAlreadySet(_)));
    }

    #[tokio::test]
    async fn test_structural_bye_resolves_on_arrival() {
        // 6 entrants: (2,2) is fed only by (1,3)
        let (store, engine, matches) = setup(6).await;
        let m3 = at(&matches, 1, 3);

        let next = engine.record_winner(m3.id, m3.slot_a).await.unwrap().unwrap();
        assert_eq!((next.round, next.order), (2, 2));
        assert_eq!(next.winner, m3.slot_a);

        let final_match = store
            .get_match(m3.tournament_id, 3, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(final_match.slot_b, m3.slot_a);
        assert_eq!(final_match.slot_a, None);
    }

    #[tokio::test]
    async fn test_ensure_propagated_repairs_missing_slot() {
        let (store, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1);
        let winner = m1.slot_a.unwrap();

        // Winner recorded but propagation never happened
        store.update_match_winner(m1.id, winner).await.unwrap();
        let next = engine.ensure_propagated(m1.id).await.unwrap().unwrap();
        assert_eq!(next.slot_a, Some(winner));

        // Idempotent
        let again = engine.ensure_propagated(m1.id).await.unwrap().unwrap();
        assert_eq!(again, next);
    }

    #[tokio::test]
    async fn test_ensure_propagated_requires_winner() {
        let (_, engine, matches) = setup(4).await;
        let err = engine.ensure_propagated(matches[0].id).await.unwrap_err();
        assert!(matches!(err, BracketError::MatchNotReady(_)));
    }

    #[tokio::test]
    async fn test_slot_conflict_detected() {
        let (store, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1);
        let final_match = at(&matches, 2, 1);

        store
            .update_match_slot(final_match.id, Slot::A, m1.slot_b.unwrap())
            .await
            .unwrap();
        store.update_match_winner(m1.id, m1.slot_a.unwrap()).await.unwrap();

        let err = engine.ensure_propagated(m1.id).await.unwrap_err();
        assert!(matches!(err, BracketError::SlotConflict(_)));
    }

    #[tokio::test]
    async fn test_concurrent_siblings_fill_both_slots() {
        let (store, engine, matches) = setup(4).await;
        let m1 = at(&matches, 1, 1).clone();
        let m2 = at(&matches, 1, 2).clone();

        let e1 = engine.clone();
        let e2 = engine.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { e1.record_winner(m1.id, m1.slot_a).await }),
            tokio::spawn(async move { e2.record_winner(m2.id, m2.slot_b).await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();

        let final_match = store
            .get_match(m1.tournament_id, 2, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(final_match.slot_a, m1.slot_a);
        assert_eq!(final_match.slot_b, m2.slot_b);
    }
}
