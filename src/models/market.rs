//! 彩票市场与票档范围模型
//!
//! 定义一期开奖市场的核心数据结构：票档范围、状态标记与创建请求。

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 票面系列跳过的字母
///
/// 系列字母表由区间内的大写字母构成，I、F、O 从不出现在票面上。
pub const EXCLUDED_SERIES_LETTERS: [char; 3] = ['I', 'F', 'O'];

/// 票档范围（一个市场一行）
///
/// 一个市场即一期开奖，由分组区间、系列区间、号码区间与
/// 售票时间窗共同定义。市场只做标记，从不删除。
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketRange {
    /// 市场唯一 ID
    pub market_id: Uuid,

    /// 市场名称
    pub market_name: String,

    /// 分组下界
    pub group_start: i32,

    /// 分组上界
    pub group_end: i32,

    /// 系列起始字母
    pub series_start: String,

    /// 系列结束字母
    pub series_end: String,

    /// 号码下界（保留前导零的字符串形式）
    pub number_start: String,

    /// 号码上界
    pub number_end: String,

    /// 单张票价
    pub price: Decimal,

    /// 开售时间
    pub start_time: DateTime<Utc>,

    /// 停售时间
    pub end_time: DateTime<Utc>,

    /// 是否在售
    pub is_active: bool,

    /// 五个奖级是否已全部开出
    pub is_win: bool,

    /// 是否作废
    pub is_void: bool,

    /// 任意一次开奖后置位，不要求奖级齐全
    pub win_reference: bool,

    /// 对用户隐藏
    pub hide_market_user: bool,

    /// 游戏类型
    pub game_name: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl MarketRange {
    /// 当前时刻是否可购票
    pub fn is_open_for_purchase(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_void && now >= self.start_time && now <= self.end_time
    }

    /// 系列区间的起止字符
    pub fn series_bounds(&self) -> Option<(char, char)> {
        let start = self.series_start.chars().next()?;
        let end = self.series_end.chars().next()?;
        Some((start, end))
    }
}

/// 创建市场请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMarketRequest {
    /// 市场名称
    pub market_name: String,

    /// 分组下界
    pub group_start: i32,

    /// 分组上界
    pub group_end: i32,

    /// 系列起始字母
    pub series_start: String,

    /// 系列结束字母
    pub series_end: String,

    /// 号码下界
    pub number_start: String,

    /// 号码上界
    pub number_end: String,

    /// 单张票价
    pub price: Decimal,

    /// 开售时间
    pub start_time: DateTime<Utc>,

    /// 停售时间
    pub end_time: DateTime<Utc>,
}

impl CreateMarketRequest {
    /// 校验范围定义
    ///
    /// 分组与号码区间按数值比较，系列端点必须是未被跳过的大写字母。
    pub fn validate(&self) -> Result<(), String> {
        if self.market_name.trim().is_empty() {
            return Err("market_name must not be empty".to_string());
        }

        if self.group_start > self.group_end {
            return Err("group_start must not exceed group_end".to_string());
        }

        let series_start = single_letter(&self.series_start, "series_start")?;
        let series_end = single_letter(&self.series_end, "series_end")?;
        if series_start > series_end {
            return Err("series_start must not exceed series_end".to_string());
        }

        let number_start = numeric_bound(&self.number_start, "number_start")?;
        let number_end = numeric_bound(&self.number_end, "number_end")?;
        if number_start > number_end {
            return Err("number_start must not exceed number_end".to_string());
        }

        if self.start_time >= self.end_time {
            return Err("start_time must precede end_time".to_string());
        }

        Ok(())
    }
}

fn single_letter(raw: &str, field: &str) -> Result<char, String> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(format!("{} must be a single letter", field)),
    };

    if !letter.is_ascii_uppercase() {
        return Err(format!("{} must be an uppercase letter", field));
    }
    if EXCLUDED_SERIES_LETTERS.contains(&letter) {
        return Err(format!("{} must not be one of I, F, O", field));
    }

    Ok(letter)
}

fn numeric_bound(raw: &str, field: &str) -> Result<i64, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{} must be numeric", field))?;
    if value < 0 {
        return Err(format!("{} must not be negative", field));
    }
    Ok(value)
}

/// 市场状态更新请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMarketStatusRequest {
    /// 是否在售
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn valid_request() -> CreateMarketRequest {
        let now = Utc::now();
        CreateMarketRequest {
            market_name: "Evening Draw".to_string(),
            group_start: 1,
            group_end: 99,
            series_start: "A".to_string(),
            series_end: "L".to_string(),
            number_start: "00000".to_string(),
            number_end: "99999".to_string(),
            price: dec!(6),
            start_time: now,
            end_time: now + Duration::hours(8),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_reversed_group_bounds_rejected() {
        let mut req = valid_request();
        req.group_start = 50;
        req.group_end = 10;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_excluded_series_letters_rejected() {
        for letter in ["I", "F", "O"] {
            let mut req = valid_request();
            req.series_end = letter.to_string();
            assert!(req.validate().is_err(), "letter {} should be rejected", letter);
        }
    }

    #[test]
    fn test_lowercase_series_rejected() {
        let mut req = valid_request();
        req.series_start = "a".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_number_bounds_compared_numerically() {
        let mut req = valid_request();
        req.number_start = "00100".to_string();
        req.number_end = "00099".to_string();
        assert!(req.validate().is_err());

        // 与字符串比较不同，"99" 在数值上小于 "00100"
        req.number_start = "99".to_string();
        req.number_end = "00100".to_string();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_non_numeric_bound_rejected() {
        let mut req = valid_request();
        req.number_end = "9x999".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_purchase_window() {
        let now = Utc::now();
        let market = MarketRange {
            market_id: Uuid::new_v4(),
            market_name: "Evening Draw".to_string(),
            group_start: 1,
            group_end: 99,
            series_start: "A".to_string(),
            series_end: "L".to_string(),
            number_start: "00000".to_string(),
            number_end: "99999".to_string(),
            price: dec!(6),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            is_active: true,
            is_win: false,
            is_void: false,
            win_reference: false,
            hide_market_user: false,
            game_name: "Lottery".to_string(),
            created_at: now,
            updated_at: now,
        };

        assert!(market.is_open_for_purchase(now));
        assert!(!market.is_open_for_purchase(now + Duration::hours(2)));

        let mut suspended = market.clone();
        suspended.is_active = false;
        assert!(!suspended.is_open_for_purchase(now));

        let mut voided = market;
        voided.is_void = true;
        assert!(!voided.is_open_for_purchase(now));
    }
}
