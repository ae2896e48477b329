use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        // Markets
        .route(
            "/markets",
            get(handlers::market::list_markets).post(handlers::market::create_market),
        )
        .route(
            "/markets/:market_id/range",
            get(handlers::market::get_market_range),
        )
        .route(
            "/markets/:market_id/status",
            post(handlers::market::update_market_status),
        )
        // Tickets & purchases
        .route(
            "/markets/:market_id/tickets",
            get(handlers::ticket::search_tickets),
        )
        .route(
            "/markets/:market_id/purchase",
            post(handlers::purchase::purchase_tickets),
        )
        .route(
            "/purchases/history",
            get(handlers::purchase::purchase_history),
        )
        // Results
        .route(
            "/markets/:market_id/results",
            get(handlers::result::get_results).post(handlers::result::declare_results),
        )
        .route("/results/today", get(handlers::result::todays_results))
}
