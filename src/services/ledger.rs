//! Balance Ledger Client
//!
//! User balances and exposure live in the main balance service;
//! settlement reaches it over HTTP. The ledger acknowledges calls with
//! a JSON body carrying a `success` flag, and a 2xx response with the
//! flag unset still counts as a failure.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Ledger call errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Ledger returned status {0}")]
    Rejected(reqwest::StatusCode),

    #[error("Ledger declined the call: {0}")]
    Declined(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBalanceBody {
    user_id: Uuid,
    prize_amount: Decimal,
    market_id: Uuid,
    lottery_price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfitLossBody<'a> {
    user_id: Uuid,
    user_name: &'a str,
    market_id: Uuid,
    market_name: &'a str,
    ticket_number: &'a str,
    price: Decimal,
    sem: i32,
    profit_loss: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveExposureBody<'a> {
    user_id: Uuid,
    market_id: Uuid,
    market_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct LedgerAck {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the balance ledger service.
pub struct LedgerClient {
    client: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Credit a winner's balance.
    pub async fn update_balance(
        &self,
        user_id: Uuid,
        prize_amount: Decimal,
        market_id: Uuid,
        lottery_price: Decimal,
    ) -> Result<(), LedgerError> {
        self.post(
            "/api/users/update-balance",
            &UpdateBalanceBody {
                user_id,
                prize_amount,
                market_id,
                lottery_price,
            },
        )
        .await
    }

    /// Record a winner's profit/loss entry.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_profit_loss(
        &self,
        user_id: Uuid,
        user_name: &str,
        market_id: Uuid,
        market_name: &str,
        ticket_number: &str,
        price: Decimal,
        sem: i32,
        profit_loss: Decimal,
    ) -> Result<(), LedgerError> {
        self.post(
            "/api/lottery-profit-loss",
            &ProfitLossBody {
                user_id,
                user_name,
                market_id,
                market_name,
                ticket_number,
                price,
                sem,
                profit_loss,
            },
        )
        .await
    }

    /// Release a user's exposure on a market that paid no winners.
    pub async fn remove_exposure(
        &self,
        user_id: Uuid,
        market_id: Uuid,
        market_name: &str,
    ) -> Result<(), LedgerError> {
        // The ledger registers this route under this exact spelling.
        self.post(
            "/api/users/remove-exposer",
            &RemoveExposureBody {
                user_id,
                market_id,
                market_name,
            },
        )
        .await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), LedgerError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(LedgerError::Rejected(response.status()));
        }

        let ack: LedgerAck = response.json().await?;
        if !ack.success {
            return Err(LedgerError::Declined(
                ack.message.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        Ok(())
    }

    /// Queue a failed ledger call for out-of-band retry.
    pub async fn record_retry(
        pool: &PgPool,
        user_id: Uuid,
        market_id: Uuid,
        call: &str,
        amount: Decimal,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payout_retries (retry_id, user_id, market_id, call, amount, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(market_id)
        .bind(call)
        .bind(amount)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodies_serialize_in_camel_case() {
        let body = UpdateBalanceBody {
            user_id: Uuid::nil(),
            prize_amount: Decimal::new(5000, 2),
            market_id: Uuid::nil(),
            lottery_price: Decimal::new(600, 2),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("prizeAmount").is_some());
        assert!(json.get("lotteryPrice").is_some());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_ack_defaults_to_failure() {
        let ack: LedgerAck = serde_json::from_str("{}").unwrap();
        assert!(!ack.success);
        assert!(ack.message.is_none());

        let ack: LedgerAck =
            serde_json::from_str(r#"{"success": true, "message": "ok"}"#).unwrap();
        assert!(ack.success);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = LedgerClient::new("http://ledger.local/", 5).unwrap();
        assert_eq!(client.base_url, "http://ledger.local");
    }
}
