//! Bracket construction: round layout, first-round seeding and bye resolution.

use super::{
    errors::{BracketError, BracketResult},
    models::{Entrant, Match, NewMatch, Slot, TournamentId},
    seeding::Seeding,
};
use crate::db::BracketStore;
use log::info;
use std::sync::Arc;

/// Minimum entrants for a bracket
pub const MIN_ENTRANTS: usize = 2;

/// Match count per round for `entrants` players, first round first.
///
/// Each round halves the previous one, rounding up, until a single final
/// remains. Empty for fewer than two entrants.
pub fn layout(entrants: usize) -> Vec<u32> {
    if entrants < MIN_ENTRANTS {
        return Vec::new();
    }

    let mut rounds = Vec::new();
    let mut matches = entrants.div_ceil(2);
    loop {
        rounds.push(matches as u32);
        if matches == 1 {
            break;
        }
        matches = matches.div_ceil(2);
    }
    rounds
}

/// ceil(log2(entrants)); 0 for fewer than two entrants
pub fn total_rounds(entrants: usize) -> u32 {
    layout(entrants).len() as u32
}

/// Number of matches in `round` (1-based); 0 past the final
pub fn matches_in_round(entrants: usize, round: u32) -> u32 {
    layout(entrants)
        .get(round.wrapping_sub(1) as usize)
        .copied()
        .unwrap_or(0)
}

/// Whether the match at `(round, order)` can only ever receive one occupant.
///
/// True for a later-round match whose second feeder `(round - 1, 2 * order)`
/// does not exist. First-round byes are recognized by their empty slot B
/// instead, so this is always false for round 1.
pub fn has_single_feeder(layout: &[u32], round: u32, order: u32) -> bool {
    if round <= 1 {
        return false;
    }
    layout
        .get(round as usize - 2)
        .is_some_and(|&previous| 2 * order > previous)
}

/// Builds and persists the initial match set of a tournament
pub struct BracketBuilder<S> {
    store: Arc<dyn BracketStore>,
    seeding: S,
}

impl<S: Seeding> BracketBuilder<S> {
    pub fn new(store: Arc<dyn BracketStore>, seeding: S) -> Self {
        Self { store, seeding }
    }

    /// Lay out the complete bracket without touching the store.
    ///
    /// Matches come back round-major, then order-major. First-round byes are
    /// decided here and their winner is carried forward through any chain of
    /// single-feeder matches, so no later match waits on a bye.
    ///
    /// # Errors
    ///
    /// * `BracketError::InsufficientEntrants` - fewer than two entrants
    pub fn plan(&mut self, entrants: Vec<Entrant>) -> BracketResult<Vec<NewMatch>> {
        if entrants.len() < MIN_ENTRANTS {
            return Err(BracketError::InsufficientEntrants {
                needed: MIN_ENTRANTS,
                current: entrants.len(),
            });
        }

        let layout = layout(entrants.len());
        let seeded = self.seeding.permute(entrants);

        let mut rounds: Vec<Vec<NewMatch>> = Vec::with_capacity(layout.len());
        rounds.push(
            seeded
                .chunks(2)
                .enumerate()
                .map(|(i, pair)| NewMatch {
                    round: 1,
                    order: i as u32 + 1,
                    slot_a: pair.first().map(|e| e.id),
                    slot_b: pair.get(1).map(|e| e.id),
                    winner: None,
                })
                .collect(),
        );
        for (index, &count) in layout.iter().enumerate().skip(1) {
            let round = index as u32 + 1;
            rounds.push(
                (1..=count)
                    .map(|order| NewMatch::placeholder(round, order))
                    .collect(),
            );
        }

        for r in 0..rounds.len() {
            for k in 0..rounds[r].len() {
                let m = &rounds[r][k];
                let lone = match (m.slot_a, m.slot_b) {
                    (Some(a), None) if m.round == 1 || has_single_feeder(&layout, m.round, m.order) => a,
                    _ => continue,
                };

                rounds[r][k].winner = Some(lone);
                let order = rounds[r][k].order;
                if let Some(next) = rounds.get_mut(r + 1) {
                    next[order.div_ceil(2) as usize - 1].set_slot(Slot::for_order(order), lone);
                }
            }
        }

        Ok(rounds.into_iter().flatten().collect())
    }

    /// Plan the bracket and persist it as one atomic unit.
    ///
    /// # Errors
    ///
    /// * `BracketError::InsufficientEntrants` - fewer than two entrants
    /// * `BracketError::BracketExists` - the tournament already has matches
    /// * `BracketError::StoreUnavailable` - persistence failure; nothing was written
    pub async fn build(
        &mut self,
        tournament_id: TournamentId,
        entrants: Vec<Entrant>,
    ) -> BracketResult<Vec<Match>> {
        let entrant_count = entrants.len();
        let plan = self.plan(entrants)?;
        let matches = self.store.insert_matches(tournament_id, &plan).await?;

        info!(
            "Generated bracket for tournament {}: {} entrants, {} rounds, {} matches",
            tournament_id,
            entrant_count,
            total_rounds(entrant_count),
            matches.len()
        );

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::seeding::RegistrationOrder;
    use crate::db::MemoryBracketStore;

    fn roster(n: i64) -> Vec<Entrant> {
        (1..=n)
            .map(|id| Entrant {
                id,
                tournament_id: 1,
                user_id: id,
                alias: format!("p{id}"),
            })
            .collect()
    }

    fn planner() -> BracketBuilder<RegistrationOrder> {
        BracketBuilder::new(Arc::new(MemoryBracketStore::new()), RegistrationOrder)
    }

    fn find(plan: &[NewMatch], round: u32, order: u32) -> &NewMatch {
        plan.iter()
            .find(|m| m.round == round && m.order == order)
            .expect("match should exist")
    }

    #[test]
    fn test_layout() {
        assert_eq!(layout(0), Vec::<u32>::new());
        assert_eq!(layout(1), Vec::<u32>::new());
        assert_eq!(layout(2), vec![1]);
        assert_eq!(layout(3), vec![2, 1]);
        assert_eq!(layout(5), vec![3, 2, 1]);
        assert_eq!(layout(8), vec![4, 2, 1]);
        assert_eq!(layout(9), vec![5, 3, 2, 1]);
    }

    #[test]
    fn test_total_rounds_is_ceil_log2() {
        assert_eq!(total_rounds(2), 1);
        assert_eq!(total_rounds(3), 2);
        assert_eq!(total_rounds(4), 2);
        assert_eq!(total_rounds(5), 3);
        assert_eq!(total_rounds(16), 4);
        assert_eq!(total_rounds(17), 5);
    }

    #[test]
    fn test_matches_in_round() {
        assert_eq!(matches_in_round(6, 1), 3);
        assert_eq!(matches_in_round(6, 2), 2);
        assert_eq!(matches_in_round(6, 3), 1);
        assert_eq!(matches_in_round(6, 4), 0);
        assert_eq!(matches_in_round(6, 0), 0);
    }

    #[test]
    fn test_single_feeder() {
        let l = layout(5); // [3, 2, 1]
        assert!(!has_single_feeder(&l, 1, 3));
        assert!(!has_single_feeder(&l, 2, 1));
        assert!(has_single_feeder(&l, 2, 2));
        assert!(!has_single_feeder(&l, 3, 1));
    }

    #[test]
    fn test_plan_rejects_fewer_than_two() {
        let err = planner().plan(roster(1)).unwrap_err();
        assert!(matches!(
            err,
            BracketError::InsufficientEntrants {
                needed: 2,
                current: 1
            }
        ));
    }

    #[test]
    fn test_plan_four_entrants() {
        let plan = planner().plan(roster(4)).unwrap();
        assert_eq!(plan.len(), 3);

        assert_eq!(
            (plan[0].round, plan[0].order, plan[0].slot_a, plan[0].slot_b),
            (1, 1, Some(1), Some(2))
        );
        assert_eq!(
            (plan[1].round, plan[1].order, plan[1].slot_a, plan[1].slot_b),
            (1, 2, Some(3), Some(4))
        );
        assert_eq!(plan[2], NewMatch::placeholder(2, 1));
    }

    #[test]
    fn test_plan_two_entrants_is_single_final() {
        let plan = planner().plan(roster(2)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!((plan[0].slot_a, plan[0].slot_b), (Some(1), Some(2)));
        assert_eq!(plan[0].winner, None);
    }

    #[test]
    fn test_plan_three_entrants_resolves_bye() {
        let plan = planner().plan(roster(3)).unwrap();

        let bye = find(&plan, 1, 2);
        assert_eq!((bye.slot_a, bye.slot_b, bye.winner), (Some(3), None, Some(3)));

        let final_match = find(&plan, 2, 1);
        assert_eq!(final_match.slot_a, None);
        assert_eq!(final_match.slot_b, Some(3));
        assert_eq!(final_match.winner, None);
    }

    #[test]
    fn test_plan_five_entrants_chains_bye() {
        // r1: (1,2) (3,4) (5,-); r2: (_,_) (5,-); r3: (_,_)
        let plan = planner().plan(roster(5)).unwrap();
        assert_eq!(plan.len(), 6);

        assert_eq!(find(&plan, 1, 3).winner, Some(5));

        let carried = find(&plan, 2, 2);
        assert_eq!((carried.slot_a, carried.winner), (Some(5), Some(5)));

        let final_match = find(&plan, 3, 1);
        assert_eq!((final_match.slot_a, final_match.slot_b), (None, Some(5)));
    }

    #[test]
    fn test_plan_six_entrants_leaves_structural_bye_open() {
        // r2 order 2 has a single feeder, but that feeder is a real match
        let plan = planner().plan(roster(6)).unwrap();
        let waiting = find(&plan, 2, 2);
        assert_eq!(*waiting, NewMatch::placeholder(2, 2));
        assert!(plan.iter().all(|m| m.winner.is_none()));
    }

    #[test]
    fn test_plan_is_round_major() {
        let plan = planner().plan(roster(11)).unwrap();
        let keys: Vec<(u32, u32)> = plan.iter().map(|m| (m.round, m.order)).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[tokio::test]
    async fn test_build_persists_plan() {
        let store = Arc::new(MemoryBracketStore::new());
        let t = store.create_tournament("Build", 8).await.unwrap();

        let mut builder = BracketBuilder::new(store.clone(), RegistrationOrder);
        let matches = builder.build(t.id, roster(4)).await.unwrap();

        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.tournament_id == t.id));
        assert_eq!(store.list_matches(t.id).await.unwrap(), matches);
    }

    #[tokio::test]
    async fn test_build_twice_fails() {
        let store = Arc::new(MemoryBracketStore::new());
        let t = store.create_tournament("Twice", 8).await.unwrap();

        let mut builder = BracketBuilder::new(store.clone(), RegistrationOrder);
        builder.build(t.id, roster(4)).await.unwrap();
        let err = builder.build(t.id, roster(4)).await.unwrap_err();

        assert!(matches!(err, BracketError::BracketExists(_)));
        assert_eq!(store.list_matches(t.id).await.unwrap().len(), 3);
    }
}
