// ==========================================
// 物料损耗分析引擎 - 筛选条件
// ==========================================
// 职责: 定义一次筛选交互的完整条件（FilterSpec）
// 说明: FilterSpec 为临时对象，每次交互整体替换
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 产线选择
///
/// `Only` 为空集合时表示"未选任何产线"，筛选结果为空。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "lines", rename_all = "snake_case")]
pub enum LineSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

/// 分类选择
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "category", rename_all = "snake_case")]
pub enum CategorySelection {
    #[default]
    All,
    /// 精确匹配单一分类（忽略大小写与重音）
    Exact(String),
    /// 组合虚拟分类（成员由配置声明）
    Combined,
}

/// 期间筛选
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PeriodFilter {
    #[default]
    All,
    /// 月份桶，`yyyy-mm`
    Month { month: String },
    /// 自定义区间（闭区间，任一端可缺省）
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl PeriodFilter {
    /// 是否带有日期约束
    pub fn is_bounded(&self) -> bool {
        match self {
            PeriodFilter::All => false,
            PeriodFilter::Month { .. } => true,
            PeriodFilter::Range { start, end } => start.is_some() || end.is_some(),
        }
    }
}

/// 筛选条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub lines: LineSelection,
    pub category: CategorySelection,
    pub subcategory: Option<String>,
    pub material: Option<String>,
    /// 仅保留可比产线（剔除配置中的排除产线）
    #[serde(default)]
    pub comparable_lines_only: bool,
    pub period: PeriodFilter,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = LineSelection::Only(lines.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = CategorySelection::Exact(category.into());
        self
    }

    pub fn with_combined_category(mut self) -> Self {
        self.category = CategorySelection::Combined;
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_month(mut self, month: impl Into<String>) -> Self {
        self.period = PeriodFilter::Month {
            month: month.into(),
        };
        self
    }

    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.period = PeriodFilter::Range { start, end };
        self
    }

    pub fn comparable_only(mut self, enabled: bool) -> Self {
        self.comparable_lines_only = enabled;
        self
    }

    /// 组合分类是否生效（决定是否进行单位换算）
    pub fn is_combined(&self) -> bool {
        matches!(self.category, CategorySelection::Combined)
    }
}
