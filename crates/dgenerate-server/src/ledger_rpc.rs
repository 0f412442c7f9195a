//! JSON-RPC client for the ledger gateway that fronts the reward program.
//!
//! The gateway holds the backend signing key and speaks to the chain; this
//! client only names accounts. Every call is a JSON-RPC 2.0 POST:
//!
//! | method               | params                                          | result                              |
//! |----------------------|-------------------------------------------------|-------------------------------------|
//! | `getRewardState`     | `{gameState}`                                   | `{currentReward, totalMinted, ...}` |
//! | `getTokenAccount`    | `{owner, mint}`                                 | `{exists, address?}`                |
//! | `createTokenAccount` | `{owner, mint, payer}`                          | `{address}`                         |
//! | `rewardUser`         | `{programId, gameState, tokenMint, recipient}`  | `{signature}`                       |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use dgenerate_shared::types::WalletId;

use crate::config::LedgerIdentity;
use crate::reward::{DispatchError, RewardLedger};

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewardState {
    current_reward: u64,
}

#[derive(Debug, Deserialize)]
struct TokenAccount {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct RewardTx {
    signature: String,
}

pub struct RpcLedgerClient {
    http: reqwest::Client,
    endpoint: String,
    identity: LedgerIdentity,
    explorer_cluster: Option<String>,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(
        endpoint: impl Into<String>,
        identity: LedgerIdentity,
        explorer_cluster: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            identity,
            explorer_cluster,
            next_id: AtomicU64::new(1),
        })
    }

    async fn reward_state(&self) -> Result<RewardState, DispatchError> {
        self.call(
            "getRewardState",
            serde_json::json!({ "gameState": self.identity.game_state }),
        )
        .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, DispatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "Ledger RPC call");

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let parsed: RpcResponse<T> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(DispatchError::Malformed(format!("{method}: {e}")))
            }
            Err(_) => return Err(DispatchError::Transport(format!("{method}: HTTP {status}"))),
        };

        if let Some(err) = parsed.error {
            return Err(DispatchError::Rejected {
                code: err.code,
                message: err.message,
                logs: program_logs(err.data.as_ref()),
            });
        }

        parsed
            .result
            .ok_or_else(|| DispatchError::Malformed(format!("{method}: missing result")))
    }
}

fn program_logs(data: Option<&serde_json::Value>) -> Vec<String> {
    data.and_then(|d| d.get("logs"))
        .and_then(|logs| logs.as_array())
        .map(|logs| {
            logs.iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl RewardLedger for RpcLedgerClient {
    async fn current_reward(&self) -> Result<u64, DispatchError> {
        Ok(self.reward_state().await?.current_reward)
    }

    async fn recipient_account_exists(&self, wallet: &WalletId) -> Result<bool, DispatchError> {
        let account: TokenAccount = self
            .call(
                "getTokenAccount",
                serde_json::json!({
                    "owner": wallet.as_str(),
                    "mint": self.identity.token_mint,
                }),
            )
            .await?;
        Ok(account.exists)
    }

    async fn create_recipient_account(&self, wallet: &WalletId) -> Result<(), DispatchError> {
        let _: serde_json::Value = self
            .call(
                "createTokenAccount",
                serde_json::json!({
                    "owner": wallet.as_str(),
                    "mint": self.identity.token_mint,
                    "payer": self.identity.payer,
                }),
            )
            .await?;
        Ok(())
    }

    async fn reward_user(&self, wallet: &WalletId) -> Result<String, DispatchError> {
        let tx: RewardTx = self
            .call(
                "rewardUser",
                serde_json::json!({
                    "programId": self.identity.program_id,
                    "gameState": self.identity.game_state,
                    "tokenMint": self.identity.token_mint,
                    "recipient": wallet.as_str(),
                }),
            )
            .await?;
        Ok(tx.signature)
    }

    fn explorer_url(&self, signature: &str) -> Option<String> {
        Some(match &self.explorer_cluster {
            Some(cluster) => format!("https://explorer.solana.com/tx/{signature}?cluster={cluster}"),
            None => format!("https://explorer.solana.com/tx/{signature}"),
        })
    }
}
