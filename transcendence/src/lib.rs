//! # Transcendence
//!
//! Single-elimination tournament brackets for the Transcendence game server.
//!
//! ## Core Modules
//!
//! - [`bracket`]: bracket layout, seeding, winner advancement and the
//!   tournament service facade
//! - [`db`]: the bracket store interface with PostgreSQL and in-memory
//!   implementations, pool configuration and query timeouts

/// Bracket construction, advancement and the tournament service.
pub mod bracket;
pub use bracket::{
    AdvancementEngine, BracketBuilder, BracketError, BracketResult, SeedingPolicy,
    TournamentService,
};

/// Persistence: bracket stores and connection pooling.
pub mod db;
pub use db::{BracketStore, MemoryBracketStore, PgBracketStore};
