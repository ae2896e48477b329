//! Result Declaration Handlers
//!
//! The declare endpoint drives validation, persistence and settlement
//! in one call; the read endpoints serve persisted result rows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::result::{LotteryResult, PrizeSubmission};
use crate::services::results::{
    settlement_day_bounds, DeclarationError, DeclarationSummary, ResultDeclarationService,
};
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
pub struct MarketResults {
    pub market_id: Uuid,
    pub market_name: String,
    pub results: Vec<LotteryResult>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Declare the five prize tiers for a market and settle the winners
/// POST /markets/:market_id/results
pub async fn declare_results(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(submissions): Json<Vec<PrizeSubmission>>,
) -> Result<Json<DeclarationSummary>, (StatusCode, Json<ErrorResponse>)> {
    ResultDeclarationService::declare(
        &state.db.pool,
        &state.ledger,
        &state.market_locks,
        market_id,
        submissions,
    )
    .await
    .map(Json)
    .map_err(declaration_error_response)
}

fn declaration_error_response(err: DeclarationError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        DeclarationError::MarketNotFound(_) => (StatusCode::NOT_FOUND, "MARKET_NOT_FOUND"),
        DeclarationError::MissingCategories(_) => (StatusCode::BAD_REQUEST, "MISSING_CATEGORIES"),
        DeclarationError::InvalidCategory(_) => (StatusCode::BAD_REQUEST, "INVALID_CATEGORY"),
        DeclarationError::WrongTicketCount { .. } => {
            (StatusCode::BAD_REQUEST, "WRONG_TICKET_COUNT")
        }
        DeclarationError::DuplicateAcrossDeclaration(_) => {
            (StatusCode::BAD_REQUEST, "DUPLICATE_TICKET")
        }
        DeclarationError::TierAlreadyComplete(_) => {
            (StatusCode::CONFLICT, "TIER_ALREADY_COMPLETE")
        }
        DeclarationError::NonUniqueTicketSuffix { .. } => {
            (StatusCode::BAD_REQUEST, "NON_UNIQUE_SUFFIX")
        }
        DeclarationError::BalanceUpdateFailed { .. } => {
            (StatusCode::BAD_GATEWAY, "BALANCE_UPDATE_FAILED")
        }
        DeclarationError::Ticket(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "TICKET_EXPANSION_FAILED")
        }
        DeclarationError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
    };

    if status.is_server_error() {
        tracing::error!("Prize declaration failed: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Result rows declared for a market
/// GET /markets/:market_id/results
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<Vec<LotteryResult>>, (StatusCode, Json<ErrorResponse>)> {
    let results: Vec<LotteryResult> = sqlx::query_as(
        r#"
        SELECT result_id, market_id, market_name, prize_category, prize_amount,
               complementary_prize, ticket_number, is_revoke, created_at
        FROM lottery_results
        WHERE market_id = $1 AND is_revoke = FALSE
        ORDER BY created_at
        "#,
    )
    .bind(market_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch results: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to fetch results".to_string(),
                code: "RESULT_FETCH_FAILED".to_string(),
            }),
        )
    })?;

    Ok(Json(results))
}

/// Today's results grouped per market
/// GET /results/today
pub async fn todays_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MarketResults>>, (StatusCode, Json<ErrorResponse>)> {
    let (day_start, day_end) = settlement_day_bounds(Utc::now());

    let rows: Vec<LotteryResult> = sqlx::query_as(
        r#"
        SELECT result_id, market_id, market_name, prize_category, prize_amount,
               complementary_prize, ticket_number, is_revoke, created_at
        FROM lottery_results
        WHERE created_at >= $1 AND created_at < $2 AND is_revoke = FALSE
        ORDER BY market_name, created_at
        "#,
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch today's results: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to fetch today's results".to_string(),
                code: "RESULT_FETCH_FAILED".to_string(),
            }),
        )
    })?;

    let mut grouped: BTreeMap<String, MarketResults> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.market_name.clone())
            .or_insert_with(|| MarketResults {
                market_id: row.market_id,
                market_name: row.market_name.clone(),
                results: Vec::new(),
            })
            .results
            .push(row);
    }

    Ok(Json(grouped.into_values().collect()))
}
