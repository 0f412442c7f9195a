//! Guess ledger: validates a submission, scores it and appends it to the
//! store.
//!
//! The ledger never maintains running counters. A user row is upserted with
//! zeroed counters the first time a wallet guesses; everything else is
//! aggregated from the guess table when stats are read.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use dgenerate_shared::constants::{MAX_GUESS_LEN, MAX_PROMPT_LEN};
use dgenerate_shared::types::{ChallengeId, WalletId};
use dgenerate_shared::{evaluate, score, DgenError};
use dgenerate_store::{Database, Guess, StoreError, User};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Rejected before anything was written.
    #[error(transparent)]
    Validation(#[from] DgenError),

    /// The store refused or could not perform the write; nothing usable was
    /// recorded and the caller may resubmit.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

pub struct GuessLedger {
    db: Arc<Mutex<Database>>,
}

impl GuessLedger {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Score `guess_text` against `reference_prompt` and append the result.
    ///
    /// Steps: validate, upsert the user row (insert-or-ignore), score,
    /// insert the guess. The upsert and the insert are separate statements;
    /// a failure between them leaves an empty user row, which the next
    /// submission reuses.
    pub async fn record_guess(
        &self,
        challenge_id: &str,
        wallet_id: &str,
        guess_text: &str,
        reference_prompt: &str,
    ) -> Result<Guess, LedgerError> {
        let challenge_id = ChallengeId::parse(challenge_id)?;
        let wallet_id = WalletId::parse(wallet_id)?;
        let guess_text = required("guessText", guess_text, MAX_GUESS_LEN)?;
        let reference_prompt = required("referencePrompt", reference_prompt, MAX_PROMPT_LEN)?;

        let similarity_score = score(guess_text, reference_prompt);
        let verdict = evaluate(similarity_score);

        let guess = Guess {
            id: Uuid::new_v4(),
            challenge_id,
            wallet_id,
            guess_text: guess_text.to_string(),
            is_correct: verdict.is_correct,
            similarity_score,
            tokens_earned: verdict.tokens_earned,
            created_at: Utc::now(),
        };

        {
            let db = self.db.lock().await;
            if db.ensure_user(&guess.wallet_id)? {
                info!(wallet = %guess.wallet_id, "New player registered");
            }
            db.insert_guess(&guess)?;
        }

        debug!(
            guess = %guess.id,
            wallet = %guess.wallet_id.short(),
            challenge = %guess.challenge_id,
            score = guess.similarity_score,
            correct = guess.is_correct,
            "Guess recorded"
        );

        Ok(guess)
    }

    /// Stats for a wallet, or `None` if it has never guessed.
    pub async fn user_stats(&self, wallet: &WalletId) -> Result<Option<User>, LedgerError> {
        let db = self.db.lock().await;
        match db.get_user(wallet) {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn required<'a>(field: &'static str, value: &'a str, max: usize) -> Result<&'a str, DgenError> {
    if value.trim().is_empty() {
        return Err(DgenError::MissingField(field));
    }
    if value.len() > max {
        return Err(DgenError::TooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(value)
}
