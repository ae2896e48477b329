//! Purchase Handlers
//!
//! Records ticket purchases against staged quotes and serves per-user
//! purchase history with the ticket lists re-expanded.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::market::ErrorResponse;
use crate::models::market::MarketRange;
use crate::models::purchase::{Purchase, PurchaseRequest, UserRange};
use crate::services::tickets::TicketService;
use crate::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub purchase_id: Uuid,
    pub market_id: Uuid,
    pub group: i32,
    pub series: String,
    pub number: String,
    pub sem: i32,
    pub lottery_price: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PurchaseHistoryEntry {
    pub purchase_id: Uuid,
    pub market_id: Uuid,
    pub market_name: String,
    pub sem: i32,
    pub lottery_price: Decimal,
    pub tickets: Vec<String>,
    pub result_announcement: bool,
    pub settle_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Record a ticket purchase from a staged quote
/// POST /markets/:market_id/purchase
pub async fn purchase_tickets(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), (StatusCode, Json<ErrorResponse>)> {
    let staged: Option<UserRange> = sqlx::query_as(
        r#"
        SELECT generate_id, "group", series, number, sem, created_at
        FROM user_ranges
        WHERE generate_id = $1
        "#,
    )
    .bind(req.generate_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to look up staged quote: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to look up staged quote".to_string(),
                code: "PURCHASE_LOOKUP_FAILED".to_string(),
            }),
        )
    })?;

    let staged = staged.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Generate id not found".to_string(),
                code: "GENERATE_ID_NOT_FOUND".to_string(),
            }),
        )
    })?;

    let market: Option<MarketRange> = sqlx::query_as(
        r#"
        SELECT market_id, market_name, group_start, group_end, series_start, series_end,
               number_start, number_end, price, start_time, end_time, is_active, is_win,
               is_void, win_reference, hide_market_user, game_name, created_at, updated_at
        FROM ticket_ranges
        WHERE market_id = $1
        "#,
    )
    .bind(market_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch market: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to fetch market".to_string(),
                code: "MARKET_FETCH_FAILED".to_string(),
            }),
        )
    })?;

    let market = market.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Market not found".to_string(),
                code: "MARKET_NOT_FOUND".to_string(),
            }),
        )
    })?;

    if !market.is_open_for_purchase(Utc::now()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Market is not open for purchase".to_string(),
                code: "MARKET_CLOSED".to_string(),
            }),
        ));
    }

    let purchase_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO purchases (
            purchase_id, generate_id, user_id, user_name, "group", series, number,
            sem, market_id, market_name, lottery_price, price
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(purchase_id)
    .bind(staged.generate_id)
    .bind(req.user_id)
    .bind(&req.user_name)
    .bind(staged.group)
    .bind(&staged.series)
    .bind(&staged.number)
    .bind(staged.sem)
    .bind(market_id)
    .bind(&market.market_name)
    .bind(req.lottery_price)
    .bind(market.price)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record purchase: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to record purchase".to_string(),
                code: "PURCHASE_CREATE_FAILED".to_string(),
            }),
        )
    })?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            purchase_id,
            market_id,
            group: staged.group,
            series: staged.series,
            number: staged.number,
            sem: staged.sem,
            lottery_price: req.lottery_price,
            price: market.price,
        }),
    ))
}

/// Purchase history for a user, tickets expanded per purchase
/// GET /purchases/history
pub async fn purchase_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PurchaseHistoryEntry>>, (StatusCode, Json<ErrorResponse>)> {
    let purchases: Vec<Purchase> = sqlx::query_as(
        r#"
        SELECT purchase_id, generate_id, user_id, user_name, "group", series,
               number, sem, market_id, market_name, lottery_price, price,
               result_announcement, hide_purchase, settle_time, created_at
        FROM purchases
        WHERE user_id = $1 AND hide_purchase = FALSE
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.user_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch purchase history: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to fetch purchase history".to_string(),
                code: "HISTORY_FETCH_FAILED".to_string(),
            }),
        )
    })?;

    // One range fetch per market, reused across the user's purchases.
    let mut ranges: HashMap<Uuid, MarketRange> = HashMap::new();
    let mut entries = Vec::with_capacity(purchases.len());

    for purchase in purchases {
        if !ranges.contains_key(&purchase.market_id) {
            let range: Option<MarketRange> = sqlx::query_as(
                r#"
                SELECT market_id, market_name, group_start, group_end, series_start, series_end,
                       number_start, number_end, price, start_time, end_time, is_active, is_win,
                       is_void, win_reference, hide_market_user, game_name, created_at, updated_at
                FROM ticket_ranges
                WHERE market_id = $1
                "#,
            )
            .bind(purchase.market_id)
            .fetch_optional(&state.db.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch market range: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Failed to fetch market range".to_string(),
                        code: "MARKET_FETCH_FAILED".to_string(),
                    }),
                )
            })?;

            if let Some(range) = range {
                ranges.insert(purchase.market_id, range);
            }
        }

        let tickets = match ranges.get(&purchase.market_id) {
            Some(range) => TicketService::expand_purchase(range, &purchase)
                .map(|list| list.iter().map(ToString::to_string).collect())
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        purchase_id = %purchase.purchase_id,
                        "Ticket expansion failed: {}",
                        e
                    );
                    Vec::new()
                }),
            None => Vec::new(),
        };

        entries.push(PurchaseHistoryEntry {
            purchase_id: purchase.purchase_id,
            market_id: purchase.market_id,
            market_name: purchase.market_name,
            sem: purchase.sem,
            lottery_price: purchase.lottery_price,
            tickets,
            result_announcement: purchase.result_announcement,
            settle_time: purchase.settle_time,
            created_at: purchase.created_at,
        });
    }

    Ok(Json(entries))
}
