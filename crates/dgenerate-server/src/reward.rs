//! Reward dispatch for correct guesses.
//!
//! A correct guess is already persisted when the dispatcher runs. Minting is
//! a best-effort side effect: [`RewardDispatcher::dispatch_reward`] never
//! returns an error, it reports the outcome as a [`MintOutcome`] that the
//! caller merges into its response.
//!
//! The minted amount is whatever the reward program's state says at mint
//! time. The token hint computed at scoring time is reported next to it but
//! never sent to the ledger, so the two may differ if the program state
//! changed in between.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use dgenerate_shared::types::WalletId;

// ---------------------------------------------------------------------------
// Ledger seam
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("ledger unreachable: {0}")]
    Transport(String),

    #[error("ledger rejected the call: {message}")]
    Rejected {
        code: i64,
        message: String,
        logs: Vec<String>,
    },

    #[error("malformed ledger response: {0}")]
    Malformed(String),

    #[error("reward dispatch timed out after {0:?}")]
    Timeout(Duration),
}

/// The external reward program, as seen by the dispatcher.
///
/// Two reads and one state-mutating call. The mint call deliberately has no
/// amount parameter: the program mints its current reward.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// Authoritative reward amount in token base units.
    async fn current_reward(&self) -> Result<u64, DispatchError>;

    async fn recipient_account_exists(&self, wallet: &WalletId) -> Result<bool, DispatchError>;

    async fn create_recipient_account(&self, wallet: &WalletId) -> Result<(), DispatchError>;

    /// Submit the mint instruction; returns the transaction signature.
    async fn reward_user(&self, wallet: &WalletId) -> Result<String, DispatchError>;

    /// Explorer link for a transaction, if the ledger has one.
    fn explorer_url(&self, _signature: &str) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub success: bool,
    pub signature: String,
    /// Amount actually minted, read from program state.
    pub amount: u64,
    /// Hint computed at scoring time.
    pub requested_amount: u64,
    pub recipient: WalletId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MintFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MintOutcome {
    Minted(MintReceipt),
    Failed(MintFailure),
}

#[cfg(test)]
impl MintOutcome {
    pub fn is_minted(&self) -> bool {
        matches!(self, MintOutcome::Minted(_))
    }
}

impl From<&DispatchError> for MintFailure {
    fn from(e: &DispatchError) -> Self {
        let details = match e {
            DispatchError::Rejected {
                code,
                message,
                logs,
            } => {
                let mut details = serde_json::json!({
                    "message": message,
                    "code": code,
                    "logs": logs,
                });
                if message.contains("Assertion failed") || message.contains("0x1") {
                    details["hint"] = serde_json::Value::String(
                        "A program constraint failed; check that all accounts are correct and have the right permissions."
                            .to_string(),
                    );
                }
                Some(details)
            }
            other => Some(serde_json::json!({ "message": other.to_string() })),
        };

        let error = match e {
            DispatchError::Timeout(_) => "reward dispatch timed out",
            _ => "Minting failed",
        };

        MintFailure {
            error: error.to_string(),
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RewardDispatcher {
    ledger: Arc<dyn RewardLedger>,
    timeout: Duration,
}

impl RewardDispatcher {
    pub fn new(ledger: Arc<dyn RewardLedger>, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    /// Mint the current reward to `wallet`. Never fails: errors and timeouts
    /// come back as [`MintOutcome::Failed`]. No retries.
    pub async fn dispatch_reward(&self, wallet: &WalletId, tokens_earned_hint: u64) -> MintOutcome {
        info!(
            wallet = %wallet,
            hint = tokens_earned_hint,
            "Dispatching reward"
        );

        let result = match tokio::time::timeout(self.timeout, self.mint(wallet, tokens_earned_hint))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        };

        match result {
            Ok(receipt) => {
                info!(
                    wallet = %wallet,
                    signature = %receipt.signature,
                    amount = receipt.amount,
                    "Reward minted"
                );
                if receipt.amount != tokens_earned_hint {
                    debug!(
                        hint = tokens_earned_hint,
                        amount = receipt.amount,
                        "Minted amount differs from scoring hint"
                    );
                }
                MintOutcome::Minted(receipt)
            }
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "Reward dispatch failed");
                MintOutcome::Failed(MintFailure::from(&e))
            }
        }
    }

    async fn mint(&self, wallet: &WalletId, hint: u64) -> Result<MintReceipt, DispatchError> {
        let amount = self.ledger.current_reward().await?;

        // Account resolution problems are not fatal here: the mint call
        // itself fails if the account is really missing.
        match self.ledger.recipient_account_exists(wallet).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(wallet = %wallet, "Creating recipient token account");
                if let Err(e) = self.ledger.create_recipient_account(wallet).await {
                    warn!(wallet = %wallet, error = %e, "Could not create recipient token account");
                }
            }
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "Could not resolve recipient token account");
            }
        }

        let signature = self.ledger.reward_user(wallet).await?;

        Ok(MintReceipt {
            success: true,
            explorer_url: self.ledger.explorer_url(&signature),
            signature,
            amount,
            requested_amount: hint,
            recipient: wallet.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------
