use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Retired challenges drop out of the feed but keep their guesses
ALTER TABLE challenges ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1;

CREATE INDEX IF NOT EXISTS idx_challenges_active_created
    ON challenges(is_active, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
