//! Ticket Search Handlers
//!
//! Expands a prospective purchase into its ticket list, quotes the
//! price and stages the seed under a generate id that the purchase
//! endpoint later redeems.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::market::ErrorResponse;
use crate::models::market::MarketRange;
use crate::services::tickets::{TicketError, TicketService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchTicketsQuery {
    pub group: i32,
    pub series: String,
    pub number: String,
    pub sem: i32,
}

#[derive(Debug, Serialize)]
pub struct SearchTicketsResponse {
    pub generate_id: Uuid,
    pub tickets: Vec<String>,
    pub price: Decimal,
    pub sem: i32,
}

/// Search tickets for a market and stage the quoted seed
/// GET /markets/:market_id/tickets
pub async fn search_tickets(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<SearchTicketsQuery>,
) -> Result<Json<SearchTicketsResponse>, (StatusCode, Json<ErrorResponse>)> {
    refresh_market_windows(&state).await;

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

    if query.sem <= 0 {
        return Err(bad_request("sem must be positive", "INVALID_SEM"));
    }

    let series = query
        .series
        .trim()
        .to_uppercase()
        .chars()
        .next()
        .ok_or_else(|| bad_request("series must be a letter", "INVALID_RANGE"))?;

    // The seed itself must sit inside the market's range; the walk may
    // still leave it later.
    if query.group < market.group_start || query.group > market.group_end {
        return Err(bad_request(
            "group is outside the market's range",
            "INVALID_RANGE",
        ));
    }
    let number: i64 = query
        .number
        .trim()
        .parse()
        .map_err(|_| bad_request("number must be numeric", "INVALID_NUMBER"))?;
    let number_ok = market
        .number_start
        .trim()
        .parse::<i64>()
        .ok()
        .zip(market.number_end.trim().parse::<i64>().ok())
        .map(|(low, high)| number >= low && number <= high)
        .unwrap_or(false);
    if !number_ok {
        return Err(bad_request(
            "number is outside the market's range",
            "INVALID_RANGE",
        ));
    }

    let tickets = TicketService::expand(&market, query.group, series, &query.number, query.sem)
        .map_err(|e| match e {
            TicketError::InvalidRange(msg) => bad_request(&msg, "INVALID_RANGE"),
            TicketError::InvalidNumber(_) => bad_request("number must be numeric", "INVALID_NUMBER"),
            other => {
                tracing::error!("Ticket expansion failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Ticket expansion failed".to_string(),
                        code: "TICKET_EXPANSION_FAILED".to_string(),
                    }),
                )
            }
        })?;

    let price = TicketService::calculate_price(&state.db.pool, market_id, query.sem)
        .await
        .map_err(|e| {
            tracing::error!("Failed to price tickets: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to price tickets".to_string(),
                    code: "PRICE_CALCULATION_FAILED".to_string(),
                }),
            )
        })?;

    let generate_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO user_ranges (generate_id, "group", series, number, sem)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(generate_id)
    .bind(query.group)
    .bind(series.to_string())
    .bind(query.number.trim())
    .bind(query.sem)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to stage ticket quote: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to stage ticket quote".to_string(),
                code: "QUOTE_STAGE_FAILED".to_string(),
            }),
        )
    })?;

    Ok(Json(SearchTicketsResponse {
        generate_id,
        tickets: tickets.iter().map(ToString::to_string).collect(),
        price,
        sem: query.sem,
    }))
}

fn bad_request(message: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Time-window sweep: markets inside their sale window come up, markets
/// outside it go down. A market already won or voided stays down.
async fn refresh_market_windows(state: &AppState) {
    let now = Utc::now();

    if let Err(e) = sqlx::query(
        r#"
        UPDATE ticket_ranges
        SET is_active = TRUE, updated_at = NOW()
        WHERE start_time <= $1 AND end_time >= $1
          AND is_active = FALSE AND is_win = FALSE AND is_void = FALSE
        "#,
    )
    .bind(now)
    .execute(&state.db.pool)
    .await
    {
        tracing::warn!("Market activation sweep failed: {}", e);
    }

    if let Err(e) = sqlx::query(
        r#"
        UPDATE ticket_ranges
        SET is_active = FALSE, updated_at = NOW()
        WHERE (start_time > $1 OR end_time < $1) AND is_active = TRUE
        "#,
    )
    .bind(now)
    .execute(&state.db.pool)
    .await
    {
        tracing::warn!("Market deactivation sweep failed: {}", e);
    }
}
