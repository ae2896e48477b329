#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recorded ticket purchase. The seed (group, series, number, sem) is
/// stored as bought; the full ticket list is re-expanded on demand.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub purchase_id: Uuid,
    pub generate_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub group: i32,
    pub series: String,
    pub number: String,
    pub sem: i32,
    pub market_id: Uuid,
    pub market_name: String,
    pub lottery_price: Decimal,
    pub price: Decimal,
    pub result_announcement: bool,
    pub hide_purchase: bool,
    pub settle_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn series_char(&self) -> Option<char> {
        self.series.chars().next()
    }
}

/// A staged ticket quote, produced by search and redeemed by purchase.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRange {
    pub generate_id: Uuid,
    pub group: i32,
    pub series: String,
    pub number: String,
    pub sem: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub generate_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub lottery_price: Decimal,
}
