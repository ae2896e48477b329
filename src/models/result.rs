//! 开奖结果与奖级模型
//!
//! 定义五个奖级、持久化的开奖结果行以及奖级申报请求。

#![allow(dead_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 奖级
///
/// 一期开奖共五个奖级，各申报一行，票数固定为 1/10/10/10/50。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "prize_category")]
pub enum PrizeCategory {
    /// 一等奖
    #[sqlx(rename = "First Prize")]
    #[serde(rename = "First Prize")]
    First,
    /// 二等奖
    #[sqlx(rename = "Second Prize")]
    #[serde(rename = "Second Prize")]
    Second,
    /// 三等奖
    #[sqlx(rename = "Third Prize")]
    #[serde(rename = "Third Prize")]
    Third,
    /// 四等奖
    #[sqlx(rename = "Fourth Prize")]
    #[serde(rename = "Fourth Prize")]
    Fourth,
    /// 五等奖
    #[sqlx(rename = "Fifth Prize")]
    #[serde(rename = "Fifth Prize")]
    Fifth,
}

impl PrizeCategory {
    /// 按申报顺序排列的全部奖级
    pub const ALL: [PrizeCategory; 5] = [
        PrizeCategory::First,
        PrizeCategory::Second,
        PrizeCategory::Third,
        PrizeCategory::Fourth,
        PrizeCategory::Fifth,
    ];

    /// 该奖级一期要求申报的票数
    pub fn required_ticket_count(&self) -> usize {
        match self {
            PrizeCategory::First => 1,
            PrizeCategory::Second => 10,
            PrizeCategory::Third => 10,
            PrizeCategory::Fourth => 10,
            PrizeCategory::Fifth => 50,
        }
    }

    /// 匹配购票时比较的尾号长度
    ///
    /// 一等奖按完整票号匹配，不走尾号比较。
    pub fn match_suffix_len(&self) -> Option<usize> {
        match self {
            PrizeCategory::First => None,
            PrizeCategory::Second => Some(5),
            _ => Some(4),
        }
    }

    /// 数据库枚举标签
    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeCategory::First => "First Prize",
            PrizeCategory::Second => "Second Prize",
            PrizeCategory::Third => "Third Prize",
            PrizeCategory::Fourth => "Fourth Prize",
            PrizeCategory::Fifth => "Fifth Prize",
        }
    }
}

impl fmt::Display for PrizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrizeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "First Prize" => Ok(PrizeCategory::First),
            "Second Prize" => Ok(PrizeCategory::Second),
            "Third Prize" => Ok(PrizeCategory::Third),
            "Fourth Prize" => Ok(PrizeCategory::Fourth),
            "Fifth Prize" => Ok(PrizeCategory::Fifth),
            _ => Err(format!("Invalid prize category: {}", s)),
        }
    }
}

/// 开奖结果行（一行一个奖级）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LotteryResult {
    /// 结果行 ID
    pub result_id: Uuid,

    /// 市场 ID
    pub market_id: Uuid,

    /// 市场名称
    pub market_name: String,

    /// 奖级
    pub prize_category: PrizeCategory,

    /// 单注奖金
    pub prize_amount: Decimal,

    /// 附加奖金（仅一等奖携带）
    pub complementary_prize: Option<Decimal>,

    /// 中奖票号列表
    pub ticket_number: Vec<String>,

    /// 是否已撤销
    pub is_revoke: bool,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 单个奖级的申报请求
///
/// prize_category 以原始字符串提交，申报流程先做完整性检查再解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeSubmission {
    /// 奖级标签，如 "First Prize"
    pub prize_category: String,

    /// 单注奖金
    pub prize_amount: Decimal,

    /// 中奖票号列表
    pub ticket_number: Vec<String>,

    /// 附加奖金
    #[serde(default)]
    pub complementary_prize: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip() {
        for category in PrizeCategory::ALL {
            let parsed: PrizeCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!("Sixth Prize".parse::<PrizeCategory>().is_err());
        assert!("first prize".parse::<PrizeCategory>().is_err());
        assert!("".parse::<PrizeCategory>().is_err());
    }

    #[test]
    fn test_required_ticket_counts() {
        assert_eq!(PrizeCategory::First.required_ticket_count(), 1);
        assert_eq!(PrizeCategory::Second.required_ticket_count(), 10);
        assert_eq!(PrizeCategory::Third.required_ticket_count(), 10);
        assert_eq!(PrizeCategory::Fourth.required_ticket_count(), 10);
        assert_eq!(PrizeCategory::Fifth.required_ticket_count(), 50);
    }

    #[test]
    fn test_match_suffix_lengths() {
        assert_eq!(PrizeCategory::First.match_suffix_len(), None);
        assert_eq!(PrizeCategory::Second.match_suffix_len(), Some(5));
        assert_eq!(PrizeCategory::Third.match_suffix_len(), Some(4));
        assert_eq!(PrizeCategory::Fourth.match_suffix_len(), Some(4));
        assert_eq!(PrizeCategory::Fifth.match_suffix_len(), Some(4));
    }

    #[test]
    fn test_declaration_order() {
        let labels: Vec<&str> = PrizeCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "First Prize",
                "Second Prize",
                "Third Prize",
                "Fourth Prize",
                "Fifth Prize"
            ]
        );
    }

    #[test]
    fn test_serde_uses_database_labels() {
        let json = serde_json::to_string(&PrizeCategory::First).unwrap();
        assert_eq!(json, "\"First Prize\"");

        let parsed: PrizeCategory = serde_json::from_str("\"Fifth Prize\"").unwrap();
        assert_eq!(parsed, PrizeCategory::Fifth);
    }
}
