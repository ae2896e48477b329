//! Tier Settlement
//!
//! For each declared tier: pick the winning purchases, fold them into
//! one payout per user and dispatch the payouts to the ledger. Ledger
//! calls that fail after money has moved are queued in payout_retries
//! rather than rolled back.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::market::MarketRange;
use crate::models::purchase::Purchase;
use crate::models::result::PrizeCategory;
use crate::services::ledger::LedgerClient;
use crate::services::tickets::{TicketError, TicketService};

use super::types::*;

/// Select the purchases a declared tier pays out on.
///
/// First Prize requires a declared ticket to appear in the purchase's
/// full expansion. The remaining tiers compare number suffixes: the
/// last five digits for Second Prize, the last four for the rest.
pub fn match_purchases<'a>(
    range: &MarketRange,
    category: PrizeCategory,
    tickets: &[String],
    candidates: &'a [Purchase],
) -> Result<Vec<&'a Purchase>, TicketError> {
    let mut matched = Vec::new();

    match category.match_suffix_len() {
        None => {
            for purchase in candidates {
                let expansion: Vec<String> = TicketService::expand_purchase(range, purchase)?
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                if tickets.iter().any(|declared| expansion.contains(declared)) {
                    matched.push(purchase);
                }
            }
        }
        Some(len) => {
            let suffixes: Vec<String> =
                tickets.iter().map(|t| ticket_suffix(t, len)).collect();
            for purchase in candidates {
                let number = purchase
                    .number
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| TicketError::InvalidNumber(purchase.number.clone()))?;
                let padded = format!("{:05}", number);
                if suffixes.iter().any(|s| padded.ends_with(s.as_str())) {
                    matched.push(purchase);
                }
            }
        }
    }

    Ok(matched)
}

/// Fold matched purchases into one payout per user, keeping first-seen
/// order. First Prize pays the flat tier amount per matched purchase;
/// every other tier pays sem times the tier amount per matched
/// purchase. The stake is the sum of lottery_price over the user's
/// matched purchases.
pub fn plan_payouts(
    category: PrizeCategory,
    prize_amount: Decimal,
    matched: &[&Purchase],
) -> Vec<PayoutInstruction> {
    let mut plans: Vec<PayoutInstruction> = Vec::new();

    for purchase in matched {
        let entitlement = match category {
            PrizeCategory::First => prize_amount,
            _ => Decimal::from(purchase.sem) * prize_amount,
        };

        match plans.iter_mut().find(|p| p.user_id == purchase.user_id) {
            Some(plan) => {
                plan.total_prize += entitlement;
                plan.total_stake += purchase.lottery_price;
            }
            None => plans.push(PayoutInstruction {
                user_id: purchase.user_id,
                user_name: purchase.user_name.clone(),
                total_prize: entitlement,
                total_stake: purchase.lottery_price,
                ticket_number: purchase.number.clone(),
                sem: purchase.sem,
            }),
        }
    }

    plans
}

/// Dispatch one tier's payout plan to the ledger.
///
/// Exactly one balance update goes out per user. A failed balance
/// update stops the tier after recording a retry row; users already
/// credited stay credited. A failed profit/loss record is queued and
/// the tier carries on.
pub async fn settle_tier(
    pool: &PgPool,
    ledger: &LedgerClient,
    market: &MarketRange,
    category: PrizeCategory,
    plans: &[PayoutInstruction],
) -> Result<(), DeclarationError> {
    for plan in plans {
        if let Err(e) = ledger
            .update_balance(
                plan.user_id,
                plan.total_prize,
                market.market_id,
                plan.total_stake,
            )
            .await
        {
            metrics::counter!("payout_failures_total").increment(1);
            error!(
                user_id = %plan.user_id,
                market_id = %market.market_id,
                category = %category,
                "Balance update failed: {}",
                e
            );
            if let Err(db_err) = LedgerClient::record_retry(
                pool,
                plan.user_id,
                market.market_id,
                "update-balance",
                plan.total_prize,
                &e.to_string(),
            )
            .await
            {
                error!("Failed to record payout retry: {}", db_err);
            }
            return Err(DeclarationError::BalanceUpdateFailed {
                user_id: plan.user_id,
                source: e,
            });
        }

        if let Err(e) = ledger
            .record_profit_loss(
                plan.user_id,
                &plan.user_name,
                market.market_id,
                &market.market_name,
                &plan.ticket_number,
                plan.total_stake,
                plan.sem,
                plan.total_prize,
            )
            .await
        {
            // The credit already went through; queue the bookkeeping
            // call instead of failing the tier.
            warn!(
                user_id = %plan.user_id,
                market_id = %market.market_id,
                "Profit/loss record failed: {}",
                e
            );
            if let Err(db_err) = LedgerClient::record_retry(
                pool,
                plan.user_id,
                market.market_id,
                "profit-loss",
                plan.total_prize,
                &e.to_string(),
            )
            .await
            {
                error!("Failed to record payout retry: {}", db_err);
            }
        }

        info!(
            user_id = %plan.user_id,
            category = %category,
            prize = %plan.total_prize,
            "Winner paid"
        );
    }

    Ok(())
}

/// Release exposure for every purchaser of the market. Runs when a
/// declaration matched no purchases in any tier.
pub async fn remove_exposure_for_market(
    pool: &PgPool,
    ledger: &LedgerClient,
    market: &MarketRange,
) -> Result<(), DeclarationError> {
    let user_ids: Vec<(Uuid,)> =
        sqlx::query_as("SELECT DISTINCT user_id FROM purchases WHERE market_id = $1")
            .bind(market.market_id)
            .fetch_all(pool)
            .await?;

    for (user_id,) in user_ids {
        if let Err(e) = ledger
            .remove_exposure(user_id, market.market_id, &market.market_name)
            .await
        {
            warn!(
                user_id = %user_id,
                market_id = %market.market_id,
                "Exposure removal failed: {}",
                e
            );
            if let Err(db_err) = LedgerClient::record_retry(
                pool,
                user_id,
                market.market_id,
                "remove-exposer",
                Decimal::ZERO,
                &e.to_string(),
            )
            .await
            {
                error!("Failed to record payout retry: {}", db_err);
            }
        }
    }

    Ok(())
}

/// Flag every purchase of the market as announced and stamp the
/// settlement time.
pub async fn mark_purchases_settled(
    pool: &PgPool,
    market_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE purchases SET result_announcement = TRUE, settle_time = NOW() WHERE market_id = $1",
    )
    .bind(market_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn test_market() -> MarketRange {
        let now = Utc::now();
        MarketRange {
            market_id: Uuid::new_v4(),
            market_name: "Evening Draw".to_string(),
            group_start: 1,
            group_end: 99,
            series_start: "A".to_string(),
            series_end: "L".to_string(),
            number_start: "00000".to_string(),
            number_end: "99999".to_string(),
            price: dec!(6),
            start_time: now,
            end_time: now,
            is_active: true,
            is_win: false,
            is_void: false,
            win_reference: false,
            hide_market_user: false,
            game_name: "Lottery".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn test_purchase(
        market: &MarketRange,
        user_id: Uuid,
        group: i32,
        series: &str,
        number: &str,
        sem: i32,
    ) -> Purchase {
        let now = Utc::now();
        Purchase {
            purchase_id: Uuid::new_v4(),
            generate_id: Uuid::new_v4(),
            user_id,
            user_name: "player".to_string(),
            group,
            series: series.to_string(),
            number: number.to_string(),
            sem,
            market_id: market.market_id,
            market_name: market.market_name.clone(),
            lottery_price: dec!(30),
            price: dec!(6),
            result_announcement: false,
            hide_purchase: false,
            settle_time: None,
            created_at: now,
        }
    }

    #[test]
    fn test_first_prize_matches_inside_expansion() {
        let market = test_market();
        let user = Uuid::new_v4();
        // Expands to 01 A..E 00042.
        let candidates = vec![test_purchase(&market, user, 1, "A", "00042", 5)];

        let declared = vec!["01 C 00042".to_string()];
        let matched =
            match_purchases(&market, PrizeCategory::First, &declared, &candidates).unwrap();
        assert_eq!(matched.len(), 1);

        let declared = vec!["02 A 00042".to_string()];
        let matched =
            match_purchases(&market, PrizeCategory::First, &declared, &candidates).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn test_second_prize_matches_last_five_digits() {
        let market = test_market();
        let user = Uuid::new_v4();
        let candidates = vec![
            test_purchase(&market, user, 1, "A", "73470", 10),
            test_purchase(&market, user, 1, "A", "13470", 10),
        ];

        let declared = vec!["82 L 73470".to_string()];
        let matched =
            match_purchases(&market, PrizeCategory::Second, &declared, &candidates).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].number, "73470");
    }

    #[test]
    fn test_third_prize_matches_last_four_digits() {
        let market = test_market();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let candidates = vec![
            test_purchase(&market, user_a, 1, "A", "73470", 10),
            test_purchase(&market, user_b, 2, "B", "13470", 10),
            test_purchase(&market, user_b, 2, "B", "13471", 10),
        ];

        let declared = vec!["82 L 73470".to_string()];
        let matched =
            match_purchases(&market, PrizeCategory::Third, &declared, &candidates).unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_short_purchase_number_is_padded_before_matching() {
        let market = test_market();
        let user = Uuid::new_v4();
        // Stored as "470"; padded to "00470" for suffix comparison.
        let candidates = vec![test_purchase(&market, user, 1, "A", "470", 10)];

        let declared = vec!["11 B 10470".to_string()];
        let matched =
            match_purchases(&market, PrizeCategory::Third, &declared, &candidates).unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_malformed_purchase_number_fails_matching() {
        let market = test_market();
        let candidates = vec![test_purchase(&market, Uuid::new_v4(), 1, "A", "12x45", 10)];

        let declared = vec!["82 L 73470".to_string()];
        let result = match_purchases(&market, PrizeCategory::Second, &declared, &candidates);
        assert!(matches!(result, Err(TicketError::InvalidNumber(_))));
    }

    #[test]
    fn test_plan_payouts_one_instruction_per_user() {
        let market = test_market();
        let user = Uuid::new_v4();
        let first = test_purchase(&market, user, 1, "A", "11111", 5);
        let second = test_purchase(&market, user, 2, "B", "22222", 10);
        let matched = vec![&first, &second];

        let plans = plan_payouts(PrizeCategory::Second, dec!(50), &matched);
        assert_eq!(plans.len(), 1);
        // 5 * 50 + 10 * 50
        assert_eq!(plans[0].total_prize, dec!(750));
        assert_eq!(plans[0].total_stake, dec!(60));
        assert_eq!(plans[0].ticket_number, "11111");
        assert_eq!(plans[0].sem, 5);
    }

    #[test]
    fn test_plan_payouts_first_prize_pays_flat_amount() {
        let market = test_market();
        let user = Uuid::new_v4();
        let purchase = test_purchase(&market, user, 1, "A", "11111", 25);
        let matched = vec![&purchase];

        let plans = plan_payouts(PrizeCategory::First, dec!(10000), &matched);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].total_prize, dec!(10000));
    }

    #[test]
    fn test_plan_payouts_preserves_first_seen_order() {
        let market = test_market();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let p1 = test_purchase(&market, user_a, 1, "A", "11111", 5);
        let p2 = test_purchase(&market, user_b, 1, "A", "22222", 5);
        let p3 = test_purchase(&market, user_a, 1, "A", "33333", 5);
        let matched = vec![&p1, &p2, &p3];

        let plans = plan_payouts(PrizeCategory::Fifth, dec!(10), &matched);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].user_id, user_a);
        assert_eq!(plans[1].user_id, user_b);
        assert_eq!(plans[0].total_prize, dec!(100));
        assert_eq!(plans[1].total_prize, dec!(50));
    }

    #[test]
    fn test_plan_payouts_empty_match() {
        assert!(plan_payouts(PrizeCategory::Fifth, dec!(10), &[]).is_empty());
    }

    #[test]
    fn test_declared_first_prize_pays_the_holder_once() {
        let market = test_market();
        let winner = Uuid::new_v4();
        let candidates = vec![
            test_purchase(&market, winner, 1, "A", "00042", 5),
            test_purchase(&market, Uuid::new_v4(), 2, "B", "00777", 5),
        ];

        // "01 C 00042" sits inside the winner's expansion.
        let declared = vec!["01 C 00042".to_string()];
        let matched =
            match_purchases(&market, PrizeCategory::First, &declared, &candidates).unwrap();
        let plans = plan_payouts(PrizeCategory::First, dec!(10000), &matched);

        assert_eq!(
            plans,
            vec![PayoutInstruction {
                user_id: winner,
                user_name: "player".to_string(),
                total_prize: dec!(10000),
                total_stake: dec!(30),
                ticket_number: "00042".to_string(),
                sem: 5,
            }]
        );
    }
}
