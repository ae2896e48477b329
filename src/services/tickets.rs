//! Ticket Expansion Service
//!
//! A purchase is stored as a seed (group, series, number, sem) and the
//! sem tickets it stands for are derived on demand. Expansion walks the
//! market's series alphabet from the seed, stepping the group at a
//! fixed cadence, and keeps every ticket that lands inside the market's
//! group and number ranges. The walk is deterministic, so search,
//! history and settlement all see the same ticket list.

use std::fmt;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::market::{MarketRange, EXCLUDED_SERIES_LETTERS};
use crate::models::purchase::Purchase;

/// Ticket expansion and pricing errors
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Market not found: {0}")]
    MarketNotFound(Uuid),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid ticket number: {0}")]
    InvalidNumber(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A single expanded ticket.
///
/// Renders as `"<group> <series> <number>"` with the group zero-padded
/// to two digits and the number to five, e.g. `"03 B 00042"`. Declared
/// winning tickets are compared against this exact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketIdentifier {
    pub group: i32,
    pub series: char,
    pub number: i64,
}

impl fmt::Display for TicketIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02} {} {:05}", self.group, self.series, self.number)
    }
}

/// Stateless expansion and pricing over a market's ticket range.
pub struct TicketService;

impl TicketService {
    /// Series alphabet for a letter range, skipping the restricted
    /// letters. `A..=K` yields `A B C D E G H J K`.
    pub fn series_alphabet(series_start: char, series_end: char) -> Vec<char> {
        (series_start..=series_end)
            .filter(|c| !EXCLUDED_SERIES_LETTERS.contains(c))
            .collect()
    }

    /// Expand a seed into its ticket list.
    ///
    /// The walk runs for exactly `sem` iterations. Each iteration emits
    /// a ticket when the current group and the seed number sit inside
    /// the market's ranges, then advances the series by one letter,
    /// wrapping within the alphabet. Every `increment_threshold`
    /// iterations (5 when sem is 5 or 25, otherwise 10) the group steps
    /// by one, wrapping from `group_end` back to `group_start`, and the
    /// series restarts from the seed letter.
    ///
    /// A walk that leaves the market's ranges emits fewer than `sem`
    /// tickets. That is a valid outcome, not an error.
    pub fn expand(
        range: &MarketRange,
        group: i32,
        series: char,
        number: &str,
        sem: i32,
    ) -> Result<Vec<TicketIdentifier>, TicketError> {
        let (series_start, series_end) = range
            .series_bounds()
            .ok_or_else(|| TicketError::InvalidRange("market series bounds are empty".to_string()))?;

        let alphabet = Self::series_alphabet(series_start, series_end);
        if alphabet.is_empty() {
            return Err(TicketError::InvalidRange(format!(
                "series range {}..{} contains no usable letters",
                series_start, series_end
            )));
        }

        let origin_index = alphabet.iter().position(|&c| c == series).ok_or_else(|| {
            TicketError::InvalidRange(format!(
                "series '{}' is outside the market's series range",
                series
            ))
        })?;

        let number_value = parse_number(number)?;
        let number_low = parse_number(&range.number_start).map_err(|_| {
            TicketError::InvalidRange(format!(
                "market number_start '{}' is not numeric",
                range.number_start
            ))
        })?;
        let number_high = parse_number(&range.number_end).map_err(|_| {
            TicketError::InvalidRange(format!(
                "market number_end '{}' is not numeric",
                range.number_end
            ))
        })?;

        let increment_threshold = if sem == 5 || sem == 25 { 5 } else { 10 };
        let number_in_range = number_value >= number_low && number_value <= number_high;

        let mut tickets = Vec::with_capacity(sem.max(0) as usize);
        let mut current_group = group;
        let mut series_index = origin_index;

        for i in 0..sem {
            if number_in_range
                && current_group >= range.group_start
                && current_group <= range.group_end
            {
                tickets.push(TicketIdentifier {
                    group: current_group,
                    series: alphabet[series_index],
                    number: number_value,
                });
            }

            // The series advances every iteration; the group steps once
            // per threshold and the series restarts from the seed.
            series_index = (series_index + 1) % alphabet.len();
            if (i + 1) % increment_threshold == 0 {
                current_group += 1;
                if current_group > range.group_end {
                    current_group = range.group_start;
                }
                series_index = origin_index;
            }
        }

        if (tickets.len() as i32) < sem {
            warn!(
                market_id = %range.market_id,
                group,
                sem,
                produced = tickets.len(),
                "ticket expansion produced fewer tickets than sem"
            );
            metrics::counter!("ticket_expansion_short_total").increment(1);
        }

        Ok(tickets)
    }

    /// Expand a stored purchase using its market's range.
    pub fn expand_purchase(
        range: &MarketRange,
        purchase: &Purchase,
    ) -> Result<Vec<TicketIdentifier>, TicketError> {
        let series = purchase
            .series_char()
            .ok_or_else(|| TicketError::InvalidRange("purchase series is empty".to_string()))?;
        Self::expand(range, purchase.group, series, &purchase.number, purchase.sem)
    }

    /// Quote a seed: the market's unit price times sem.
    pub async fn calculate_price(
        pool: &PgPool,
        market_id: Uuid,
        sem: i32,
    ) -> Result<Decimal, TicketError> {
        let row: Option<(Decimal,)> =
            sqlx::query_as("SELECT price FROM ticket_ranges WHERE market_id = $1")
                .bind(market_id)
                .fetch_optional(pool)
                .await?;

        let (price,) = row.ok_or(TicketError::MarketNotFound(market_id))?;
        Ok(price * Decimal::from(sem))
    }
}

fn parse_number(raw: &str) -> Result<i64, TicketError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| TicketError::InvalidNumber(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn test_range(
        group: (i32, i32),
        series: (char, char),
        number: (&str, &str),
    ) -> MarketRange {
        let now = Utc::now();
        MarketRange {
            market_id: Uuid::new_v4(),
            market_name: "Test Draw".to_string(),
            group_start: group.0,
            group_end: group.1,
            series_start: series.0.to_string(),
            series_end: series.1.to_string(),
            number_start: number.0.to_string(),
            number_end: number.1.to_string(),
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

    fn rendered(tickets: &[TicketIdentifier]) -> Vec<String> {
        tickets.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_series_alphabet_skips_restricted_letters() {
        let alphabet = TicketService::series_alphabet('A', 'K');
        assert_eq!(alphabet, vec!['A', 'B', 'C', 'D', 'E', 'G', 'H', 'J', 'K']);
    }

    #[test]
    fn test_single_letter_alphabet() {
        assert_eq!(TicketService::series_alphabet('B', 'B'), vec!['B']);
    }

    #[test]
    fn test_expansion_walks_the_series() {
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 1, 'A', "00042", 5).unwrap();

        assert_eq!(
            rendered(&tickets),
            vec![
                "01 A 00042",
                "01 B 00042",
                "01 C 00042",
                "01 D 00042",
                "01 E 00042"
            ]
        );
    }

    #[test]
    fn test_format_pads_group_and_number() {
        let ticket = TicketIdentifier {
            group: 3,
            series: 'B',
            number: 42,
        };
        assert_eq!(ticket.to_string(), "03 B 00042");

        let wide = TicketIdentifier {
            group: 100,
            series: 'Z',
            number: 123456,
        };
        assert_eq!(wide.to_string(), "100 Z 123456");
    }

    #[test]
    fn test_sem_25_steps_group_every_five() {
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 1, 'A', "7", 25).unwrap();

        assert_eq!(tickets.len(), 25);
        for (i, ticket) in tickets.iter().enumerate() {
            assert_eq!(ticket.group, 1 + (i as i32) / 5);
        }
        // Each block restarts the series from the seed letter.
        assert_eq!(tickets[5].to_string(), "02 A 00007");
        assert_eq!(tickets[24].to_string(), "05 E 00007");
    }

    #[test]
    fn test_sem_10_keeps_one_group() {
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 4, 'A', "00042", 10).unwrap();

        assert_eq!(tickets.len(), 10);
        assert!(tickets.iter().all(|t| t.group == 4));
    }

    #[test]
    fn test_series_wraps_within_alphabet() {
        let range = test_range((1, 99), ('A', 'C'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 1, 'B', "00001", 4).unwrap();

        let series: Vec<char> = tickets.iter().map(|t| t.series).collect();
        assert_eq!(series, vec!['B', 'C', 'A', 'B']);
    }

    #[test]
    fn test_group_step_resets_series_to_seed() {
        let range = test_range((1, 99), ('A', 'E'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 7, 'C', "00123", 12).unwrap();

        assert_eq!(tickets.len(), 12);
        let series: Vec<char> = tickets.iter().map(|t| t.series).collect();
        assert_eq!(
            series,
            vec!['C', 'D', 'E', 'A', 'B', 'C', 'D', 'E', 'A', 'B', 'C', 'D']
        );
        assert!(tickets[..10].iter().all(|t| t.group == 7));
        assert!(tickets[10..].iter().all(|t| t.group == 8));
    }

    #[test]
    fn test_group_wraps_to_range_start() {
        let range = test_range((10, 11), ('A', 'L'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 11, 'A', "00042", 20).unwrap();

        assert_eq!(tickets.len(), 20);
        assert!(tickets[..10].iter().all(|t| t.group == 11));
        assert!(tickets[10..].iter().all(|t| t.group == 10));
    }

    #[test]
    fn test_seed_group_outside_range_emits_nothing() {
        let range = test_range((5, 9), ('A', 'L'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 2, 'A', "00042", 10).unwrap();
        assert!(tickets.is_empty());
    }

    #[test]
    fn test_number_outside_range_emits_nothing() {
        let range = test_range((1, 99), ('A', 'L'), ("00100", "00200"));
        let tickets = TicketService::expand(&range, 1, 'A', "99", 10).unwrap();
        assert!(tickets.is_empty());
    }

    #[test]
    fn test_series_outside_range_rejected() {
        let range = test_range((1, 99), ('A', 'E'), ("00000", "99999"));
        let result = TicketService::expand(&range, 1, 'G', "00042", 5);
        assert!(matches!(result, Err(TicketError::InvalidRange(_))));
    }

    #[test]
    fn test_excluded_letter_seed_rejected() {
        // 'F' sits inside A..L but never enters the alphabet.
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let result = TicketService::expand(&range, 1, 'F', "00042", 5);
        assert!(matches!(result, Err(TicketError::InvalidRange(_))));
    }

    #[test]
    fn test_malformed_number_rejected() {
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let result = TicketService::expand(&range, 1, 'A', "12x45", 5);
        assert!(matches!(result, Err(TicketError::InvalidNumber(_))));
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let first = TicketService::expand(&range, 3, 'B', "01234", 25).unwrap();
        let second = TicketService::expand(&range, 3, 'B', "01234", 25).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_leading_zeros_preserved_through_parse() {
        let range = test_range((1, 99), ('A', 'L'), ("00000", "99999"));
        let tickets = TicketService::expand(&range, 1, 'A', "00007", 1).unwrap();
        assert_eq!(rendered(&tickets), vec!["01 A 00007"]);
    }
}
