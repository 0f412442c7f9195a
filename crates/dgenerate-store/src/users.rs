//! User rows and the statistics aggregated from the guess ledger.
//!
//! The `users` row only records that a wallet exists and when it was first
//! seen. Counters are computed from `guesses` on every read so there is a
//! single source of truth.

use chrono::Utc;
use rusqlite::params;

use dgenerate_shared::similarity::round2;
use dgenerate_shared::types::WalletId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{LeaderboardEntry, User};
use crate::row::{fmt_ts, parse_ts, parse_wallet};

impl Database {
    /// Insert a zeroed user row for `wallet` unless one already exists.
    /// Existing rows are never touched. Returns `true` if a row was created.
    pub fn ensure_user(&self, wallet: &WalletId) -> Result<bool> {
        let now = fmt_ts(&Utc::now());
        let affected = self
            .conn()
            .execute(
                "INSERT INTO users (wallet_id, total_guesses, correct_guesses, total_tokens_earned, created_at, updated_at)
                 VALUES (?1, 0, 0, 0, ?2, ?2)
                 ON CONFLICT(wallet_id) DO NOTHING",
                params![wallet.as_str(), now],
            )
            .map_err(StoreError::from_write)?;
        Ok(affected > 0)
    }

    /// Fetch a user with counters aggregated from their guesses.
    pub fn get_user(&self, wallet: &WalletId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT u.wallet_id,
                        COUNT(g.id),
                        COALESCE(SUM(g.is_correct), 0),
                        COALESCE(SUM(CASE WHEN g.is_correct = 1 THEN g.tokens_earned ELSE 0 END), 0),
                        u.created_at,
                        COALESCE(MAX(g.created_at), u.updated_at)
                 FROM users u
                 LEFT JOIN guesses g ON g.wallet_id = u.wallet_id
                 WHERE u.wallet_id = ?1
                 GROUP BY u.wallet_id",
                params![wallet.as_str()],
                |row| {
                    let wallet_str: String = row.get(0)?;
                    let total: i64 = row.get(1)?;
                    let correct: i64 = row.get(2)?;
                    let tokens: i64 = row.get(3)?;
                    let created_str: String = row.get(4)?;
                    let updated_str: String = row.get(5)?;
                    Ok(User {
                        wallet_id: parse_wallet(0, &wallet_str)?,
                        total_guesses: total.max(0) as u64,
                        correct_guesses: correct.max(0) as u64,
                        total_tokens_earned: tokens.max(0) as u64,
                        created_at: parse_ts(4, &created_str)?,
                        updated_at: parse_ts(5, &updated_str)?,
                    })
                },
            )
            .map_err(StoreError::from_lookup)
    }

    /// Top wallets by tokens earned, then by correct guesses.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT wallet_id,
                    COUNT(*) AS total,
                    SUM(is_correct) AS correct,
                    SUM(CASE WHEN is_correct = 1 THEN tokens_earned ELSE 0 END) AS tokens
             FROM guesses
             GROUP BY wallet_id
             ORDER BY tokens DESC, correct DESC, wallet_id ASC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let wallet_str: String = row.get(0)?;
            let total: i64 = row.get(1)?;
            let correct: i64 = row.get(2)?;
            let tokens: i64 = row.get(3)?;
            Ok((parse_wallet(0, &wallet_str)?, total, correct, tokens))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (wallet_id, total, correct, tokens) = row?;
            let accuracy = if total > 0 {
                round2(correct as f64 / total as f64 * 100.0)
            } else {
                0.0
            };
            entries.push(LeaderboardEntry {
                wallet_id,
                total_guesses: total as u64,
                correct_guesses: correct as u64,
                total_tokens_earned: tokens as u64,
                accuracy,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(s: &str) -> WalletId {
        WalletId::parse(s).unwrap()
    }

    fn user_rows(db: &Database) -> i64 {
        db.conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn ensure_user_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let w = wallet("So1anaWa11et");

        assert!(db.ensure_user(&w).unwrap());
        let first = db.get_user(&w).unwrap();
        assert!(!db.ensure_user(&w).unwrap());
        let second = db.get_user(&w).unwrap();

        assert_eq!(user_rows(&db), 1);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.total_guesses, 0);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_user(&wallet("nobody")),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn empty_leaderboard() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(&wallet("idle")).unwrap();
        assert!(db.leaderboard(10).unwrap().is_empty());
    }
}
