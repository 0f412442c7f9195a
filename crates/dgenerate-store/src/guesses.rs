//! Append-only guess ledger rows.

use rusqlite::params;
use uuid::Uuid;

use dgenerate_shared::types::{ChallengeId, WalletId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Guess;
use crate::row::{fmt_ts, parse_ts, parse_uuid, parse_wallet};

const GUESS_COLUMNS: &str =
    "id, challenge_id, wallet_id, guess_text, is_correct, similarity_score, tokens_earned, created_at";

impl Database {
    /// Append a guess. Fails with [`StoreError::Constraint`] if the
    /// challenge or the user row does not exist.
    pub fn insert_guess(&self, guess: &Guess) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO guesses (id, challenge_id, wallet_id, guess_text, is_correct, similarity_score, tokens_earned, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    guess.id.to_string(),
                    guess.challenge_id.to_string(),
                    guess.wallet_id.as_str(),
                    guess.guess_text,
                    guess.is_correct as i32,
                    guess.similarity_score,
                    guess.tokens_earned as i64,
                    fmt_ts(&guess.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    pub fn get_guess(&self, id: Uuid) -> Result<Guess> {
        self.conn()
            .query_row(
                &format!("SELECT {GUESS_COLUMNS} FROM guesses WHERE id = ?1"),
                params![id.to_string()],
                row_to_guess,
            )
            .map_err(StoreError::from_lookup)
    }

    /// Most recent guesses of one wallet, newest first.
    pub fn list_guesses_for_wallet(&self, wallet: &WalletId, limit: u32) -> Result<Vec<Guess>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GUESS_COLUMNS}
             FROM guesses
             WHERE wallet_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![wallet.as_str(), limit], row_to_guess)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_guess(row: &rusqlite::Row<'_>) -> rusqlite::Result<Guess> {
    let id_str: String = row.get(0)?;
    let challenge_str: String = row.get(1)?;
    let wallet_str: String = row.get(2)?;
    let guess_text: String = row.get(3)?;
    let is_correct: i32 = row.get(4)?;
    let similarity_score: f64 = row.get(5)?;
    let tokens_earned: i64 = row.get(6)?;
    let created_str: String = row.get(7)?;

    Ok(Guess {
        id: parse_uuid(0, &id_str)?,
        challenge_id: ChallengeId(parse_uuid(1, &challenge_str)?),
        wallet_id: parse_wallet(2, &wallet_str)?,
        guess_text,
        is_correct: is_correct != 0,
        similarity_score,
        tokens_earned: tokens_earned.max(0) as u64,
        created_at: parse_ts(7, &created_str)?,
    })
}
