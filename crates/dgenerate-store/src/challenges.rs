//! CRUD operations for [`Challenge`] records.

use rusqlite::params;

use dgenerate_shared::types::{ChallengeId, Difficulty, MediaType};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Challenge, ChallengeFilter};
use crate::row::{fmt_ts, parse_enum, parse_json, parse_ts, parse_uuid};

const CHALLENGE_COLUMNS: &str =
    "id, media_url, media_type, prompt, difficulty, metadata, is_active, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new challenge.
    pub fn insert_challenge(&self, challenge: &Challenge) -> Result<()> {
        let metadata = challenge
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn()
            .execute(
                "INSERT INTO challenges (id, media_url, media_type, prompt, difficulty, metadata, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    challenge.id.to_string(),
                    challenge.media_url,
                    challenge.media_type.as_str(),
                    challenge.prompt,
                    challenge.difficulty.as_str(),
                    metadata,
                    challenge.is_active as i32,
                    fmt_ts(&challenge.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single challenge by id, active or not.
    pub fn get_challenge(&self, id: ChallengeId) -> Result<Challenge> {
        self.conn()
            .query_row(
                &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
                params![id.to_string()],
                row_to_challenge,
            )
            .map_err(StoreError::from_lookup)
    }

    /// List active challenges newest first, applying the optional equality
    /// filters.
    pub fn list_challenges(&self, filter: &ChallengeFilter) -> Result<Vec<Challenge>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHALLENGE_COLUMNS}
             FROM challenges
             WHERE is_active = 1
               AND (?1 IS NULL OR media_type = ?1)
               AND (?2 IS NULL OR difficulty = ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3"
        ))?;

        let rows = stmt.query_map(
            params![
                filter.media_type.map(|m| m.as_str()),
                filter.difficulty.map(|d| d.as_str()),
                filter.limit,
            ],
            row_to_challenge,
        )?;

        let mut challenges = Vec::new();
        for row in rows {
            challenges.push(row?);
        }
        Ok(challenges)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Hide a challenge from the feed. Returns `true` if it was active.
    pub fn retire_challenge(&self, id: ChallengeId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE challenges SET is_active = 0 WHERE id = ?1 AND is_active = 1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_challenge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    let id_str: String = row.get(0)?;
    let media_url: String = row.get(1)?;
    let media_type_str: String = row.get(2)?;
    let prompt: String = row.get(3)?;
    let difficulty_str: String = row.get(4)?;
    let metadata_str: Option<String> = row.get(5)?;
    let is_active: i32 = row.get(6)?;
    let created_str: String = row.get(7)?;

    Ok(Challenge {
        id: ChallengeId(parse_uuid(0, &id_str)?),
        media_url,
        media_type: parse_enum::<MediaType>(2, &media_type_str)?,
        prompt,
        difficulty: parse_enum::<Difficulty>(4, &difficulty_str)?,
        metadata: metadata_str.map(|s| parse_json(5, &s)).transpose()?,
        is_active: is_active != 0,
        created_at: parse_ts(7, &created_str)?,
    })
}
