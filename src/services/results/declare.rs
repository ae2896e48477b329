//! Prize Declaration Pipeline
//!
//! Validates a five-tier declaration, persists the result rows and the
//! market flags in one transaction, then settles each tier against the
//! day's purchases. The result rows are authoritative once committed;
//! a ledger failure during settlement never rolls them back.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::market::MarketRange;
use crate::models::purchase::Purchase;
use crate::models::result::{LotteryResult, PrizeCategory, PrizeSubmission};
use crate::services::ledger::LedgerClient;
use crate::services::locks::MarketLocks;

use super::settle;
use super::types::*;

/// Validate a declaration against the market's persisted results.
///
/// The five-category presence check runs first on the raw labels; the
/// remaining checks run per submission in call order, and the first
/// failure aborts the whole declaration before anything is persisted.
/// The duplicate scan sees only rows persisted within `now`'s
/// settlement day; tier completeness counts every persisted row.
pub fn validate_declaration(
    submissions: &[PrizeSubmission],
    existing: &[LotteryResult],
    now: DateTime<Utc>,
) -> Result<Vec<ValidatedSubmission>, DeclarationError> {
    let missing: Vec<PrizeCategory> = PrizeCategory::ALL
        .iter()
        .filter(|category| {
            !submissions
                .iter()
                .any(|s| s.prize_category == category.as_str())
        })
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(DeclarationError::MissingCategories(missing));
    }

    // A ticket may not win twice in the same settlement day. Older
    // rows still count toward tier completeness below.
    let (day_start, day_end) = settlement_day_bounds(now);
    let todays_rows: Vec<&LotteryResult> = existing
        .iter()
        .filter(|row| row.created_at >= day_start && row.created_at < day_end)
        .collect();

    let mut claimed_suffixes: HashSet<String> = HashSet::new();
    let mut validated = Vec::with_capacity(submissions.len());

    for submission in submissions {
        let category: PrizeCategory = submission
            .prize_category
            .parse()
            .map_err(|_| DeclarationError::InvalidCategory(submission.prize_category.clone()))?;

        let expected = category.required_ticket_count();
        if submission.ticket_number.len() != expected {
            return Err(DeclarationError::WrongTicketCount {
                category,
                expected,
                actual: submission.ticket_number.len(),
            });
        }

        for ticket in &submission.ticket_number {
            if todays_rows
                .iter()
                .any(|row| row.ticket_number.contains(ticket))
            {
                return Err(DeclarationError::DuplicateAcrossDeclaration(ticket.clone()));
            }
        }

        let already_declared: usize = existing
            .iter()
            .filter(|row| row.prize_category == category)
            .map(|row| row.ticket_number.len())
            .sum();
        if already_declared >= expected {
            return Err(DeclarationError::TierAlreadyComplete(category));
        }

        // Suffix integrity: a tier's qualifying suffixes must not have
        // been claimed by a tier earlier in this call. A tier never
        // collides with its own tickets.
        let qualifying: Vec<(String, String)> = match category {
            PrizeCategory::First => submission
                .ticket_number
                .iter()
                .flat_map(|t| {
                    [
                        (t.clone(), ticket_suffix(t, 5)),
                        (t.clone(), ticket_suffix(t, 4)),
                    ]
                })
                .collect(),
            PrizeCategory::Second => submission
                .ticket_number
                .iter()
                .map(|t| (t.clone(), ticket_suffix(t, 5)))
                .collect(),
            _ => submission
                .ticket_number
                .iter()
                .map(|t| (t.clone(), ticket_suffix(t, 4)))
                .collect(),
        };

        for (ticket, suffix) in &qualifying {
            if claimed_suffixes.contains(suffix) {
                return Err(DeclarationError::NonUniqueTicketSuffix {
                    ticket: ticket.clone(),
                    suffix: suffix.clone(),
                });
            }
        }
        claimed_suffixes.extend(qualifying.into_iter().map(|(_, suffix)| suffix));

        validated.push(ValidatedSubmission {
            category,
            prize_amount: submission.prize_amount,
            complementary_prize: submission.complementary_prize,
            tickets: submission.ticket_number.clone(),
        });
    }

    Ok(validated)
}

/// Runs prize declarations start to finish.
pub struct ResultDeclarationService;

impl ResultDeclarationService {
    /// Declare prize tiers for a market and settle the winners.
    ///
    /// One declaration runs per market at a time; a concurrent call for
    /// the same market waits on the market lock. Settlement considers
    /// the market's unsettled purchases from the current UTC day.
    pub async fn declare(
        pool: &PgPool,
        ledger: &LedgerClient,
        locks: &MarketLocks,
        market_id: Uuid,
        submissions: Vec<PrizeSubmission>,
    ) -> Result<DeclarationSummary, DeclarationError> {
        let _guard = locks.acquire(market_id).await;

        let market = Self::fetch_market(pool, market_id)
            .await?
            .ok_or(DeclarationError::MarketNotFound(market_id))?;

        let existing = Self::fetch_results(pool, market_id).await?;
        let validated = validate_declaration(&submissions, &existing, Utc::now())?;

        let mut tx = pool.begin().await?;
        for submission in &validated {
            sqlx::query(
                r#"
                INSERT INTO lottery_results (
                    result_id, market_id, market_name, prize_category,
                    prize_amount, complementary_prize, ticket_number
                )
                VALUES ($1, $2, $3, $4::prize_category, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(market_id)
            .bind(&market.market_name)
            .bind(submission.category.as_str())
            .bind(submission.prize_amount)
            .bind(submission.complementary_prize)
            .bind(&submission.tickets)
            .execute(&mut *tx)
            .await?;
        }

        let mut declared_categories: HashSet<PrizeCategory> =
            existing.iter().map(|r| r.prize_category).collect();
        declared_categories.extend(validated.iter().map(|v| v.category));
        let all_prizes_declared = PrizeCategory::ALL
            .iter()
            .all(|c| declared_categories.contains(c));

        if all_prizes_declared {
            sqlx::query(
                r#"
                UPDATE ticket_ranges
                SET is_win = TRUE, is_active = FALSE, win_reference = TRUE, updated_at = NOW()
                WHERE market_id = $1
                "#,
            )
            .bind(market_id)
            .execute(&mut *tx)
            .await?;
        } else {
            // win_reference flips on any declaration, complete or not.
            sqlx::query(
                "UPDATE ticket_ranges SET win_reference = TRUE, updated_at = NOW() WHERE market_id = $1",
            )
            .bind(market_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("prize_declarations_total").increment(1);

        let candidates = Self::fetch_candidates(pool, market_id).await?;
        info!(
            market_id = %market_id,
            tiers = validated.len(),
            candidates = candidates.len(),
            "Prize declaration stored, settling tiers"
        );

        let mut any_matched = false;
        let mut winners_paid = 0;
        for submission in &validated {
            let matched = settle::match_purchases(
                &market,
                submission.category,
                &submission.tickets,
                &candidates,
            )?;
            if matched.is_empty() {
                info!(category = %submission.category, "No winning purchases for tier");
                continue;
            }
            any_matched = true;

            let plans =
                settle::plan_payouts(submission.category, submission.prize_amount, &matched);
            winners_paid += plans.len();
            settle::settle_tier(pool, ledger, &market, submission.category, &plans).await?;
        }

        if !any_matched {
            settle::remove_exposure_for_market(pool, ledger, &market).await?;
        }

        let purchases_settled = settle::mark_purchases_settled(pool, market_id).await?;

        info!(
            market_id = %market_id,
            winners_paid,
            purchases_settled,
            all_prizes_declared,
            "Prize declaration settled"
        );

        Ok(DeclarationSummary {
            market_id,
            declared: validated.iter().map(|v| v.category).collect(),
            all_prizes_declared,
            winners_paid,
            purchases_settled,
        })
    }

    async fn fetch_market(
        pool: &PgPool,
        market_id: Uuid,
    ) -> Result<Option<MarketRange>, sqlx::Error> {
        sqlx::query_as::<_, MarketRange>(
            r#"
            SELECT market_id, market_name, group_start, group_end, series_start, series_end,
                   number_start, number_end, price, start_time, end_time, is_active, is_win,
                   is_void, win_reference, hide_market_user, game_name, created_at, updated_at
            FROM ticket_ranges
            WHERE market_id = $1
            "#,
        )
        .bind(market_id)
        .fetch_optional(pool)
        .await
    }

    async fn fetch_results(
        pool: &PgPool,
        market_id: Uuid,
    ) -> Result<Vec<LotteryResult>, sqlx::Error> {
        sqlx::query_as::<_, LotteryResult>(
            r#"
            SELECT result_id, market_id, market_name, prize_category, prize_amount,
                   complementary_prize, ticket_number, is_revoke, created_at
            FROM lottery_results
            WHERE market_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(market_id)
        .fetch_all(pool)
        .await
    }

    /// The market's unsettled purchases from the current UTC day. One
    /// market runs one draw, so the day window and the market filter
    /// select the same rows in practice.
    async fn fetch_candidates(
        pool: &PgPool,
        market_id: Uuid,
    ) -> Result<Vec<Purchase>, sqlx::Error> {
        let (day_start, day_end) = settlement_day_bounds(Utc::now());
        sqlx::query_as::<_, Purchase>(
            r#"
            SELECT purchase_id, generate_id, user_id, user_name, "group", series,
                   number, sem, market_id, market_name, lottery_price, price,
                   result_announcement, hide_purchase, settle_time, created_at
            FROM purchases
            WHERE market_id = $1
              AND result_announcement = FALSE
              AND created_at >= $2
              AND created_at < $3
            ORDER BY created_at
            "#,
        )
        .bind(market_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(pool)
        .await
    }
}
