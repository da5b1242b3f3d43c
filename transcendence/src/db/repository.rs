//! Bracket store trait and its PostgreSQL implementation.
//!
//! The bracket core never talks to the database directly: it is handed an
//! `Arc<dyn BracketStore>` at construction time. Slot and winner writes are
//! conditional column updates (`... WHERE <column> IS NULL`) so two sibling
//! matches finishing at the same moment can never overwrite each other.

use async_trait::async_trait;
use log::debug;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::timeouts::{with_default_timeout, with_transaction_timeout};
use crate::bracket::{
    BracketError, BracketResult,
    models::{
        Entrant, EntrantId, GameId, Match, MatchId, NewMatch, Slot, Tournament, TournamentId,
        TournamentStatus,
    },
};

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The precondition held and the new value is stored
    Written,
    /// The column already held a value (or the status had moved on); nothing
    /// was changed
    AlreadySet,
}

/// Persistence interface consumed by the bracket core
#[async_trait]
pub trait BracketStore: Send + Sync {
    /// Create a tournament in `registration` status
    async fn create_tournament(&self, name: &str, max_players: u32) -> BracketResult<Tournament>;

    async fn get_tournament(&self, tournament_id: TournamentId)
    -> BracketResult<Option<Tournament>>;

    /// Move a tournament to `status`, stamping `started_at`/`completed_at`
    async fn set_tournament_status(
        &self,
        tournament_id: TournamentId,
        status: TournamentStatus,
    ) -> BracketResult<()>;

    /// Move a tournament from `registration` to `active` only if it is still
    /// in registration.
    ///
    /// Serialized against `add_entrant`: once this returns, the roster is final.
    async fn close_registration(&self, tournament_id: TournamentId) -> BracketResult<WriteOutcome>;

    /// Register an entrant.
    ///
    /// Fails with `RegistrationClosed`, `TournamentFull` or `DuplicateEntrant`;
    /// the checks and the insert happen atomically.
    async fn add_entrant(
        &self,
        tournament_id: TournamentId,
        user_id: i64,
        alias: &str,
    ) -> BracketResult<Entrant>;

    /// Entrants in registration order
    async fn list_entrants(&self, tournament_id: TournamentId) -> BracketResult<Vec<Entrant>>;

    /// Persist a whole bracket and mark the tournament active, all or nothing.
    ///
    /// Fails with `BracketExists` if the tournament already has matches.
    async fn insert_matches(
        &self,
        tournament_id: TournamentId,
        matches: &[NewMatch],
    ) -> BracketResult<Vec<Match>>;

    async fn get_match(
        &self,
        tournament_id: TournamentId,
        round: u32,
        order: u32,
    ) -> BracketResult<Option<Match>>;

    async fn get_match_by_id(&self, match_id: MatchId) -> BracketResult<Option<Match>>;

    /// All matches, round-major then order-major
    async fn list_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>>;

    /// Set the winner only if it is currently unset
    async fn update_match_winner(
        &self,
        match_id: MatchId,
        winner: EntrantId,
    ) -> BracketResult<WriteOutcome>;

    /// Set one slot only if it is currently unset
    async fn update_match_slot(
        &self,
        match_id: MatchId,
        slot: Slot,
        entrant: EntrantId,
    ) -> BracketResult<WriteOutcome>;

    /// Attach an external game record to a match
    async fn link_game(&self, match_id: MatchId, game_id: GameId) -> BracketResult<()>;
}

const MATCH_COLUMNS: &str =
    "id, tournament_id, round, match_order, player1_id, player2_id, winner_id, game_id";

const TOURNAMENT_COLUMNS: &str =
    "id, name, status, max_players, created_at, started_at, completed_at";

fn match_from_row(row: &PgRow) -> Match {
    Match {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        round: row.get::<i32, _>("round") as u32,
        order: row.get::<i32, _>("match_order") as u32,
        slot_a: row.get("player1_id"),
        slot_b: row.get("player2_id"),
        winner: row.get("winner_id"),
        game_id: row.get("game_id"),
    }
}

fn tournament_from_row(row: &PgRow) -> BracketResult<Tournament> {
    let status: String = row.get("status");
    let status = status.parse().map_err(BracketError::StoreUnavailable)?;

    Ok(Tournament {
        id: row.get("id"),
        name: row.get("name"),
        status,
        max_players: row.get::<i32, _>("max_players") as u32,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        started_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("started_at")
            .map(|dt| dt.and_utc()),
        completed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("completed_at")
            .map(|dt| dt.and_utc()),
    })
}

fn entrant_from_row(row: &PgRow) -> Entrant {
    Entrant {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        user_id: row.get("user_id"),
        alias: row.get("alias"),
    }
}

/// PostgreSQL implementation of `BracketStore`
#[derive(Clone)]
pub struct PgBracketStore {
    pool: PgPool,
}

impl PgBracketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A conditional update that touched no row either hit a set column or a
    /// missing match; tell the two apart.
    async fn outcome(&self, match_id: MatchId, rows_affected: u64) -> BracketResult<WriteOutcome> {
        if rows_affected == 1 {
            return Ok(WriteOutcome::Written);
        }

        let exists: bool = with_default_timeout(
            sqlx::query("SELECT EXISTS(SELECT 1 FROM tournament_matches WHERE id = $1) AS present")
                .bind(match_id)
                .fetch_one(&self.pool),
        )
        .await?
        .get("present");

        if exists {
            Ok(WriteOutcome::AlreadySet)
        } else {
            Err(BracketError::MatchNotFound(match_id))
        }
    }
}

#[async_trait]
impl BracketStore for PgBracketStore {
    async fn create_tournament(&self, name: &str, max_players: u32) -> BracketResult<Tournament> {
        let sql = format!(
            "INSERT INTO tournaments (name, status, max_players) VALUES ($1, $2, $3) RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(name)
                .bind(TournamentStatus::Registration.as_str())
                .bind(max_players as i32)
                .fetch_one(&self.pool),
        )
        .await?;

        tournament_from_row(&row)
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Option<Tournament>> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(tournament_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn set_tournament_status(
        &self,
        tournament_id: TournamentId,
        status: TournamentStatus,
    ) -> BracketResult<()> {
        let result = with_default_timeout(
            sqlx::query(
                r#"
                UPDATE tournaments
                SET status = $1,
                    started_at = CASE WHEN $1 = 'active' THEN NOW() ELSE started_at END,
                    completed_at = CASE WHEN $1 IN ('completed', 'cancelled') THEN NOW() ELSE completed_at END
                WHERE id = $2
                "#,
            )
            .bind(status.as_str())
            .bind(tournament_id)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::TournamentNotFound(tournament_id));
        }
        Ok(())
    }

    async fn close_registration(&self, tournament_id: TournamentId) -> BracketResult<WriteOutcome> {
        // Row lock taken by the update waits out any registration in flight
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE tournaments SET status = $1, started_at = NOW() WHERE id = $2 AND status = $3",
            )
            .bind(TournamentStatus::Active.as_str())
            .bind(tournament_id)
            .bind(TournamentStatus::Registration.as_str())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 1 {
            return Ok(WriteOutcome::Written);
        }
        match self.get_tournament(tournament_id).await? {
            Some(_) => Ok(WriteOutcome::AlreadySet),
            None => Err(BracketError::TournamentNotFound(tournament_id)),
        }
    }

    async fn add_entrant(
        &self,
        tournament_id: TournamentId,
        user_id: i64,
        alias: &str,
    ) -> BracketResult<Entrant> {
        let mut tx = with_default_timeout(self.pool.begin()).await?;

        // Row lock serializes registrations against the capacity check
        let row = with_default_timeout(
            sqlx::query("SELECT status, max_players FROM tournaments WHERE id = $1 FOR UPDATE")
                .bind(tournament_id)
                .fetch_optional(&mut *tx),
        )
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;

        let status: String = row.get("status");
        if status != TournamentStatus::Registration.as_str() {
            return Err(BracketError::RegistrationClosed(tournament_id));
        }
        let max_players: i32 = row.get("max_players");

        let count: i64 = with_default_timeout(
            sqlx::query("SELECT COUNT(*) AS count FROM tournament_players WHERE tournament_id = $1")
                .bind(tournament_id)
                .fetch_one(&mut *tx),
        )
        .await?
        .get("count");

        if count >= i64::from(max_players) {
            return Err(BracketError::TournamentFull(tournament_id));
        }

        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO tournament_players (tournament_id, user_id, alias)
                VALUES ($1, $2, $3)
                RETURNING id, tournament_id, user_id, alias
                "#,
            )
            .bind(tournament_id)
            .bind(user_id)
            .bind(alias)
            .fetch_one(&mut *tx),
        )
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                BracketError::DuplicateEntrant(alias.to_string())
            } else {
                e.into()
            }
        })?;

        with_transaction_timeout(tx.commit()).await?;

        Ok(entrant_from_row(&row))
    }

    async fn list_entrants(&self, tournament_id: TournamentId) -> BracketResult<Vec<Entrant>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, tournament_id, user_id, alias
                FROM tournament_players
                WHERE tournament_id = $1
                ORDER BY joined_at, id
                "#,
            )
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(entrant_from_row).collect())
    }

    async fn insert_matches(
        &self,
        tournament_id: TournamentId,
        matches: &[NewMatch],
    ) -> BracketResult<Vec<Match>> {
        let mut tx = with_default_timeout(self.pool.begin()).await?;

        with_default_timeout(
            sqlx::query("SELECT id FROM tournaments WHERE id = $1 FOR UPDATE")
                .bind(tournament_id)
                .fetch_optional(&mut *tx),
        )
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;

        let exists: bool = with_default_timeout(
            sqlx::query(
                "SELECT EXISTS(SELECT 1 FROM tournament_matches WHERE tournament_id = $1) AS present",
            )
            .bind(tournament_id)
            .fetch_one(&mut *tx),
        )
        .await?
        .get("present");

        if exists {
            return Err(BracketError::BracketExists(tournament_id));
        }

        let sql = format!(
            r#"
            INSERT INTO tournament_matches (tournament_id, round, match_order, player1_id, player2_id, winner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MATCH_COLUMNS}
            "#
        );

        let mut inserted = Vec::with_capacity(matches.len());
        for m in matches {
            let row = with_default_timeout(
                sqlx::query(&sql)
                    .bind(tournament_id)
                    .bind(m.round as i32)
                    .bind(m.order as i32)
                    .bind(m.slot_a)
                    .bind(m.slot_b)
                    .bind(m.winner)
                    .fetch_one(&mut *tx),
            )
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    BracketError::BracketExists(tournament_id)
                } else {
                    e.into()
                }
            })?;
            inserted.push(match_from_row(&row));
        }

        with_default_timeout(
            sqlx::query(
                "UPDATE tournaments SET status = $1, started_at = COALESCE(started_at, NOW()) WHERE id = $2",
            )
            .bind(TournamentStatus::Active.as_str())
            .bind(tournament_id)
            .execute(&mut *tx),
        )
        .await?;

        with_transaction_timeout(tx.commit()).await?;
        debug!(
            "Inserted {} matches for tournament {}",
            inserted.len(),
            tournament_id
        );

        Ok(inserted)
    }

    async fn get_match(
        &self,
        tournament_id: TournamentId,
        round: u32,
        order: u32,
    ) -> BracketResult<Option<Match>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM tournament_matches WHERE tournament_id = $1 AND round = $2 AND match_order = $3"
        );
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(tournament_id)
                .bind(round as i32)
                .bind(order as i32)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(match_from_row))
    }

    async fn get_match_by_id(&self, match_id: MatchId) -> BracketResult<Option<Match>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM tournament_matches WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&sql)
                .bind(match_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(match_from_row))
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM tournament_matches WHERE tournament_id = $1 ORDER BY round, match_order"
        );
        let rows = with_default_timeout(
            sqlx::query(&sql)
                .bind(tournament_id)
                .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(match_from_row).collect())
    }

    async fn update_match_winner(
        &self,
        match_id: MatchId,
        winner: EntrantId,
    ) -> BracketResult<WriteOutcome> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE tournament_matches SET winner_id = $1 WHERE id = $2 AND winner_id IS NULL",
            )
            .bind(winner)
            .bind(match_id)
            .execute(&self.pool),
        )
        .await?;

        self.outcome(match_id, result.rows_affected()).await
    }

    async fn update_match_slot(
        &self,
        match_id: MatchId,
        slot: Slot,
        entrant: EntrantId,
    ) -> BracketResult<WriteOutcome> {
        let column = slot.column();
        let sql = format!(
            "UPDATE tournament_matches SET {column} = $1 WHERE id = $2 AND {column} IS NULL"
        );
        let result = with_default_timeout(
            sqlx::query(&sql)
                .bind(entrant)
                .bind(match_id)
                .execute(&self.pool),
        )
        .await?;

        self.outcome(match_id, result.rows_affected()).await
    }

    async fn link_game(&self, match_id: MatchId, game_id: GameId) -> BracketResult<()> {
        let result = with_default_timeout(
            sqlx::query("UPDATE tournament_matches SET game_id = $1 WHERE id = $2")
                .bind(game_id)
                .bind(match_id)
                .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::MatchNotFound(match_id));
        }
        Ok(())
    }
}
