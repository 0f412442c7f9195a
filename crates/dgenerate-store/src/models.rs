//! Domain model structs persisted in the game database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer; field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dgenerate_shared::types::{ChallengeId, Difficulty, MediaType, WalletId};

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// A generated media item together with the prompt that produced it.
/// Immutable once inserted, apart from being retired from the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: ChallengeId,
    /// Public URL of the image or video.
    pub media_url: String,
    pub media_type: MediaType,
    /// The secret answer.
    pub prompt: String,
    pub difficulty: Difficulty,
    /// Free-form generation details (model, aspect ratio, duration, ...).
    pub metadata: Option<serde_json::Value>,
    /// Retired challenges are hidden from the feed.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    pub fn new(
        media_url: impl Into<String>,
        media_type: MediaType,
        prompt: impl Into<String>,
        difficulty: Difficulty,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: ChallengeId::new(),
            media_url: media_url.into(),
            media_type,
            prompt: prompt.into(),
            difficulty,
            metadata,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Equality filters for the challenge feed. `None` means "any".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChallengeFilter {
    pub limit: u32,
    pub media_type: Option<MediaType>,
    pub difficulty: Option<Difficulty>,
}

// ---------------------------------------------------------------------------
// Guess
// ---------------------------------------------------------------------------

/// One scored attempt at a challenge's prompt. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub id: uuid::Uuid,
    pub challenge_id: ChallengeId,
    pub wallet_id: WalletId,
    pub guess_text: String,
    pub is_correct: bool,
    /// 0..=100 with two decimals.
    pub similarity_score: f64,
    /// Advisory token amount computed at scoring time.
    pub tokens_earned: u64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A player, keyed by wallet. The counters are aggregated from the guess
/// table at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub wallet_id: WalletId,
    pub total_guesses: u64,
    pub correct_guesses: u64,
    /// Sum of `tokens_earned` over the wallet's correct guesses.
    pub total_tokens_earned: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub wallet_id: WalletId,
    pub total_guesses: u64,
    pub correct_guesses: u64,
    pub total_tokens_earned: u64,
    /// Percentage of correct guesses, two decimals.
    pub accuracy: f64,
}
