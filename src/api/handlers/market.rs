//! Market API Handlers
//!
//! Provides endpoints for creating lottery markets, listing them and
//! flipping their sale status.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::market::{CreateMarketRequest, MarketRange, UpdateMarketStatusRequest};
use crate::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CreateMarketResponse {
    pub market_id: Uuid,
    pub market_name: String,
}

#[derive(Debug, Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<MarketRange>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct MarketsQuery {
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MarketStatusResponse {
    pub market_id: Uuid,
    pub is_active: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a lottery market with its ticket range
/// POST /markets
pub async fn create_market(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMarketRequest>,
) -> Result<(StatusCode, Json<CreateMarketResponse>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(reason) = req.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: reason,
                code: "INVALID_RANGE".to_string(),
            }),
        ));
    }

    let market_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO ticket_ranges (
            market_id, market_name, group_start, group_end, series_start, series_end,
            number_start, number_end, price, start_time, end_time
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(market_id)
    .bind(&req.market_name)
    .bind(req.group_start)
    .bind(req.group_end)
    .bind(req.series_start.trim())
    .bind(req.series_end.trim())
    .bind(req.number_start.trim())
    .bind(req.number_end.trim())
    .bind(req.price)
    .bind(req.start_time)
    .bind(req.end_time)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create market: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to create market".to_string(),
                code: "MARKET_CREATE_FAILED".to_string(),
            }),
        )
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateMarketResponse {
            market_id,
            market_name: req.market_name,
        }),
    ))
}

/// List markets, optionally filtered by sale status
/// GET /markets
pub async fn list_markets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketsQuery>,
) -> Result<Json<MarketsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let markets: Vec<MarketRange> = sqlx::query_as(
        r#"
        SELECT market_id, market_name, group_start, group_end, series_start, series_end,
               number_start, number_end, price, start_time, end_time, is_active, is_win,
               is_void, win_reference, hide_market_user, game_name, created_at, updated_at
        FROM ticket_ranges
        WHERE ($1::bool IS NULL OR is_active = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.active)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch markets: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to fetch markets".to_string(),
                code: "MARKET_FETCH_FAILED".to_string(),
            }),
        )
    })?;

    let total = markets.len();
    Ok(Json(MarketsResponse { markets, total }))
}

/// Get a market's ticket range
/// GET /markets/:market_id/range
pub async fn get_market_range(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<MarketRange>, (StatusCode, Json<ErrorResponse>)> {
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

    Ok(Json(market))
}

/// Suspend or resume ticket sales for a market
/// POST /markets/:market_id/status
pub async fn update_market_status(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(req): Json<UpdateMarketStatusRequest>,
) -> Result<Json<MarketStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let result = sqlx::query(
        "UPDATE ticket_ranges SET is_active = $1, updated_at = NOW() WHERE market_id = $2",
    )
    .bind(req.is_active)
    .bind(market_id)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update market status: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to update market status".to_string(),
                code: "MARKET_UPDATE_FAILED".to_string(),
            }),
        )
    })?;

    if result.rows_affected() == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Market not found".to_string(),
                code: "MARKET_NOT_FOUND".to_string(),
            }),
        ));
    }

    Ok(Json(MarketStatusResponse {
        market_id,
        is_active: req.is_active,
    }))
}
