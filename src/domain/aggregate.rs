// ==========================================
// 物料损耗分析引擎 - 聚合结果类型
// ==========================================
// 职责: 分组键、分组聚合结果、全局 KPI、订单汇总
// ==========================================

use crate::domain::record::{IsoDate, Record};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ===== 缺失值的分组占位 =====
pub const NO_LINE: &str = "(sin línea)";
pub const NO_ORDER: &str = "(sin orden)";
pub const NO_DATE: &str = "(sin fecha)";
pub const NO_SUBCATEGORY: &str = "(sin subcategoría)";

// ==========================================
// GroupBy - 分组维度
// ==========================================

/// 分组维度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Material,
    Line,
    OrderCode,
    Day,
    Month,
    Category,
    Subcategory,
}

impl GroupBy {
    /// 提取记录的分组键
    pub fn key_of<'a>(&self, record: &'a Record) -> Cow<'a, str> {
        match self {
            GroupBy::Material => Cow::Borrowed(record.material_label()),
            GroupBy::Line => non_empty_or(&record.line, NO_LINE),
            GroupBy::OrderCode => non_empty_or(&record.order_code, NO_ORDER),
            GroupBy::Day => date_key(&record.date, |d| Some(d.to_string())),
            GroupBy::Month => date_key(&record.date, |d| d.month_key()),
            GroupBy::Category => Cow::Borrowed(record.category.as_str()),
            GroupBy::Subcategory => non_empty_or(&record.subcategory, NO_SUBCATEGORY),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Material => "material",
            GroupBy::Line => "line",
            GroupBy::OrderCode => "order_code",
            GroupBy::Day => "day",
            GroupBy::Month => "month",
            GroupBy::Category => "category",
            GroupBy::Subcategory => "subcategory",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty_or<'a>(value: &'a str, placeholder: &'static str) -> Cow<'a, str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Cow::Borrowed(placeholder)
    } else {
        Cow::Borrowed(trimmed)
    }
}

fn date_key<'a>(date: &IsoDate, f: impl Fn(&IsoDate) -> Option<String>) -> Cow<'a, str> {
    match f(date) {
        Some(key) if !date.is_empty() => Cow::Owned(key),
        _ => Cow::Borrowed(NO_DATE),
    }
}

// ==========================================
// RankMetric - 排名指标
// ==========================================

/// 帕累托排名指标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    /// 绝对损耗量
    #[default]
    Waste,
    /// 损耗率
    WastePct,
    /// 损耗成本
    Cost,
}

impl RankMetric {
    pub fn value_of(&self, group: &AggregateGroup) -> f64 {
        match self {
            RankMetric::Waste => group.waste,
            RankMetric::WastePct => group.waste_pct,
            RankMetric::Cost => group.cost,
        }
    }
}

// ==========================================
// AggregateGroup / Kpis
// ==========================================

/// 单个分组的聚合结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateGroup {
    pub key: String,
    pub record_count: usize,
    pub theoretical: f64,
    pub actual: f64,
    pub waste: f64,
    pub cost: f64,
    /// 分组损耗率 = waste / actual × 100
    pub waste_pct: f64,
    /// 占总损耗的比例（%）
    pub share_pct: f64,
    /// 占总实际用量的比例（%）
    pub actual_share_pct: f64,
}

/// 全局 KPI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_theoretical: f64,
    pub total_actual: f64,
    pub total_waste: f64,
    pub total_cost: f64,
    pub waste_pct: f64,
    pub record_count: usize,
}

/// 订单（OPE）汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_code: String,
    /// 出现次数最多的产线（并列取最先出现者）
    pub line: String,
    pub first_date: IsoDate,
    pub last_date: IsoDate,
    pub actual: f64,
    pub waste: f64,
    pub waste_pct: f64,
    pub units_produced: f64,
    pub record_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_placeholders() {
        let r = Record::default();
        assert_eq!(GroupBy::Line.key_of(&r), NO_LINE);
        assert_eq!(GroupBy::OrderCode.key_of(&r), NO_ORDER);
        assert_eq!(GroupBy::Day.key_of(&r), NO_DATE);
        assert_eq!(GroupBy::Month.key_of(&r), NO_DATE);
        assert_eq!(GroupBy::Subcategory.key_of(&r), NO_SUBCATEGORY);
    }

    #[test]
    fn test_group_key_dates() {
        let r = Record {
            date: IsoDate::from_ymd(2024, 5, 7),
            ..Default::default()
        };
        assert_eq!(GroupBy::Day.key_of(&r), "2024-05-07");
        assert_eq!(GroupBy::Month.key_of(&r), "2024-05");
    }

    #[test]
    fn test_rank_metric_value() {
        let g = AggregateGroup {
            waste: 3.0,
            waste_pct: 1.5,
            cost: 99.0,
            ..Default::default()
        };
        assert_eq!(RankMetric::Waste.value_of(&g), 3.0);
        assert_eq!(RankMetric::WastePct.value_of(&g), 1.5);
        assert_eq!(RankMetric::Cost.value_of(&g), 99.0);
    }
}
