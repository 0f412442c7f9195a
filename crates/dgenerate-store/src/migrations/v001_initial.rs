//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `challenges` and `guesses`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (created lazily on first guess)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    wallet_id           TEXT PRIMARY KEY NOT NULL,   -- ledger wallet address
    total_guesses       INTEGER NOT NULL DEFAULT 0,  -- reserved, stats are aggregated from guesses
    correct_guesses     INTEGER NOT NULL DEFAULT 0,
    total_tokens_earned INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,               -- RFC-3339, microsecond precision
    updated_at          TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Challenges (media + secret prompt)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS challenges (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    media_url  TEXT NOT NULL,
    media_type TEXT NOT NULL CHECK (media_type IN ('image', 'video')),
    prompt     TEXT NOT NULL,
    difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
    metadata   TEXT,                        -- JSON object, nullable
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_challenges_created ON challenges(created_at DESC);

-- ----------------------------------------------------------------
-- Guesses (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS guesses (
    id               TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    challenge_id     TEXT NOT NULL,              -- FK -> challenges(id)
    wallet_id        TEXT NOT NULL,              -- FK -> users(wallet_id)
    guess_text       TEXT NOT NULL,
    is_correct       INTEGER NOT NULL,           -- boolean 0/1
    similarity_score REAL NOT NULL,              -- 0..100, two decimals
    tokens_earned    INTEGER NOT NULL CHECK (tokens_earned >= 0),
    created_at       TEXT NOT NULL,

    FOREIGN KEY (challenge_id) REFERENCES challenges(id),
    FOREIGN KEY (wallet_id) REFERENCES users(wallet_id)
);

CREATE INDEX IF NOT EXISTS idx_guesses_wallet ON guesses(wallet_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_guesses_challenge ON guesses(challenge_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
