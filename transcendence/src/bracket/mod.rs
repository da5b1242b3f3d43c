//! Single-elimination brackets.
//!
//! [`BracketBuilder`] lays out every round of a tournament up front and
//! resolves first-round byes. [`AdvancementEngine`] records match winners and
//! moves them into the next round until the final crowns a champion. Both
//! work against an injected [`BracketStore`](crate::db::BracketStore), which
//! performs the conditional writes that keep concurrent reports safe.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use transcendence::bracket::{SeedingPolicy, TournamentService};
//! use transcendence::db::MemoryBracketStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), transcendence::BracketError> {
//! let service = TournamentService::new(
//!     Arc::new(MemoryBracketStore::new()),
//!     SeedingPolicy::RegistrationOrder,
//! );
//! let cup = service.create_tournament("Friday Cup", 4).await?;
//! for (user, alias) in [(1, "alice"), (2, "bob")] {
//!     service.register_entrant(cup.id, user, alias).await?;
//! }
//!
//! let matches = service.generate_bracket(cup.id).await?;
//! service.report_match_result(matches[0].id, matches[0].slot_a).await?;
//!
//! let champion = service.champion(cup.id).await?;
//! assert_eq!(champion.map(|e| e.alias), Some("alice".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod engine;
pub mod errors;
pub mod models;
pub mod seeding;
pub mod service;

pub use builder::{BracketBuilder, MIN_ENTRANTS, layout, matches_in_round, total_rounds};
pub use engine::AdvancementEngine;
pub use errors::{BracketError, BracketResult};
pub use models::{
    BracketView, Entrant, EntrantId, GameId, GameOutcome, Match, MatchId, MatchState, NewMatch,
    Slot, Tournament, TournamentId, TournamentStatus,
};
pub use seeding::{RandomSeeding, RegistrationOrder, Seeding, SeedingPolicy};
pub use service::TournamentService;
