//! Prize declaration types

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::result::PrizeCategory;
use crate::services::ledger::LedgerError;
use crate::services::tickets::TicketError;

/// Prize declaration errors
#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    #[error("Market not found: {0}")]
    MarketNotFound(Uuid),

    #[error("Declaration is missing prize categories: {}", format_categories(.0))]
    MissingCategories(Vec<PrizeCategory>),

    #[error("Unknown prize category: {0}")]
    InvalidCategory(String),

    #[error("{category} requires {expected} ticket numbers, got {actual}")]
    WrongTicketCount {
        category: PrizeCategory,
        expected: usize,
        actual: usize,
    },

    #[error("Ticket '{0}' is already declared for this market")]
    DuplicateAcrossDeclaration(String),

    #[error("{0} is already fully declared for this market")]
    TierAlreadyComplete(PrizeCategory),

    #[error("Ticket '{ticket}' repeats suffix '{suffix}' claimed by an earlier prize tier")]
    NonUniqueTicketSuffix { ticket: String, suffix: String },

    #[error("Balance update failed for user {user_id}")]
    BalanceUpdateFailed {
        user_id: Uuid,
        #[source]
        source: LedgerError,
    },

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn format_categories(categories: &[PrizeCategory]) -> String {
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A submission that passed every declaration check, in call order.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub category: PrizeCategory,
    pub prize_amount: Decimal,
    pub complementary_prize: Option<Decimal>,
    pub tickets: Vec<String>,
}

/// One ledger payout, aggregated per user within a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutInstruction {
    pub user_id: Uuid,
    pub user_name: String,

    /// Sum of the user's per-purchase entitlements for the tier.
    pub total_prize: Decimal,

    /// Sum of lottery_price over the user's matched purchases.
    pub total_stake: Decimal,

    /// Seed number of the user's first matched purchase, carried into
    /// the profit/loss record.
    pub ticket_number: String,

    /// Sem of the user's first matched purchase.
    pub sem: i32,
}

/// Outcome of a declare call.
#[derive(Debug, Clone, Serialize)]
pub struct DeclarationSummary {
    pub market_id: Uuid,
    pub declared: Vec<PrizeCategory>,
    pub all_prizes_declared: bool,
    pub winners_paid: usize,
    pub purchases_settled: u64,
}

/// UTC day window containing `now`: midnight up to the next midnight.
pub fn settlement_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (day_start, day_start + Duration::days(1))
}

/// Last `len` characters of a declared ticket string.
///
/// Declared tickets end in the five digit number, so five characters is
/// the number itself and four its tail.
pub fn ticket_suffix(ticket: &str, len: usize) -> String {
    let chars: Vec<char> = ticket.chars().collect();
    let start = chars.len().saturating_sub(len);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_suffix_takes_the_tail() {
        assert_eq!(ticket_suffix("82 L 73470", 5), "73470");
        assert_eq!(ticket_suffix("82 L 73470", 4), "3470");
    }

    #[test]
    fn test_ticket_suffix_short_input() {
        assert_eq!(ticket_suffix("470", 5), "470");
        assert_eq!(ticket_suffix("", 4), "");
    }

    #[test]
    fn test_settlement_day_bounds() {
        let now = "2024-03-15T17:45:30Z".parse::<DateTime<Utc>>().unwrap();
        let (start, end) = settlement_day_bounds(now);

        assert_eq!(start, "2024-03-15T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(end, "2024-03-16T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_missing_categories_message_uses_labels() {
        let err = DeclarationError::MissingCategories(vec![
            PrizeCategory::Second,
            PrizeCategory::Fifth,
        ]);
        assert_eq!(
            err.to_string(),
            "Declaration is missing prize categories: Second Prize, Fifth Prize"
        );
    }
}
