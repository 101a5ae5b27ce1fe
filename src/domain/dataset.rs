// ==========================================
// 物料损耗分析引擎 - 数据集实体
// ==========================================
// 职责: 定义已发布数据集（Dataset）、筛选视图与持久化快照形态
// 红线: Dataset 只能整体替换（Arc 交换），不允许原地修改
// ==========================================

use crate::domain::record::Record;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ==========================================
// Dataset - 已构建数据集
// ==========================================

/// 已构建的数据集
///
/// 记录按日期稳定升序排列；派生索引在构建时一次性计算。
/// 仅由 `DatasetBuilder` 构造。
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub(crate) version: u64,
    pub(crate) records: Vec<Record>,
    pub(crate) lines: Vec<String>,
    pub(crate) categories: Vec<String>,
    pub(crate) order_codes: Vec<String>,
    pub(crate) units_by_order: BTreeMap<String, f64>,
    pub(crate) filename: String,
    pub(crate) built_at: DateTime<Utc>,
    pub(crate) batch_id: Option<String>,
}

impl Dataset {
    /// 空数据集（版本 0，引擎初始状态）
    pub fn empty() -> Self {
        Self {
            version: 0,
            records: Vec::new(),
            lines: Vec::new(),
            categories: Vec::new(),
            order_codes: Vec::new(),
            units_by_order: BTreeMap::new(),
            filename: String::new(),
            built_at: DateTime::<Utc>::UNIX_EPOCH,
            batch_id: None,
        }
    }

    /// 构建版本号（单调递增）
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 去重后的产线（排序）
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 去重后的分类（排序）
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// 去重后的订单号（首次出现顺序）
    pub fn order_codes(&self) -> &[String] {
        &self.order_codes
    }

    /// 订单产出箱数（同一订单取最大值）
    pub fn units_for_order(&self, order_code: &str) -> Option<f64> {
        self.units_by_order.get(order_code).copied()
    }

    pub fn units_by_order(&self) -> &BTreeMap<String, f64> {
        &self.units_by_order
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref()
    }

    /// 出现过的月份键（升序，不含空日期）
    pub fn months(&self) -> Vec<String> {
        let mut months: Vec<String> = self
            .records
            .iter()
            .filter_map(|r| r.date.month_key())
            .collect();
        months.sort();
        months.dedup();
        months
    }

    /// 日期上下界（忽略空日期）
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.date.date());
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// 指定分类下出现过的子分类（排序，不含空值）
    pub fn subcategories_of(&self, category: &str) -> Vec<String> {
        let mut subs: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.category == category && !r.subcategory.is_empty())
            .map(|r| r.subcategory.clone())
            .collect();
        subs.sort();
        subs.dedup();
        subs
    }

    /// 默认月份：当月存在数据则取当月，否则取最近月份
    pub fn default_month(&self, today: NaiveDate) -> Option<String> {
        let months = self.months();
        let current = today.format("%Y-%m").to_string();
        if months.iter().any(|m| *m == current) {
            Some(current)
        } else {
            months.last().cloned()
        }
    }
}

// ==========================================
// FilteredRecords - 筛选视图
// ==========================================

/// 数据集上的只读筛选视图（不复制 Record）
#[derive(Debug, Clone)]
pub struct FilteredRecords {
    dataset: Arc<Dataset>,
    indices: Arc<[usize]>,
}

impl FilteredRecords {
    pub(crate) fn new(dataset: Arc<Dataset>, indices: Vec<usize>) -> Self {
        Self {
            dataset,
            indices: indices.into(),
        }
    }

    /// 覆盖整个数据集的视图
    pub fn all(dataset: Arc<Dataset>) -> Self {
        let indices: Vec<usize> = (0..dataset.len()).collect();
        Self::new(dataset, indices)
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn get(&self, position: usize) -> Option<&Record> {
        self.indices
            .get(position)
            .and_then(|&idx| self.dataset.records.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.indices
            .iter()
            .filter_map(move |&idx| self.dataset.records.get(idx))
    }

    /// 复制为独立的 Record 列表（仅用于导出 / 展示层）
    pub fn to_vec(&self) -> Vec<Record> {
        self.iter().cloned().collect()
    }
}

// ==========================================
// PersistedDataset - 持久化快照
// ==========================================

/// 订单产出箱数条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUnits {
    pub order_code: String,
    pub units: f64,
}

/// 持久化快照形态（camelCase JSON）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDataset {
    #[serde(default, alias = "rows")]
    pub records: Vec<Record>,
    #[serde(default)]
    pub per_order_units_produced: Vec<OrderUnits>,
    #[serde(default)]
    pub distinct_order_codes: Vec<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default = "epoch")]
    pub built_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl From<&Dataset> for PersistedDataset {
    fn from(dataset: &Dataset) -> Self {
        Self {
            records: dataset.records.clone(),
            per_order_units_produced: dataset
                .units_by_order
                .iter()
                .map(|(order_code, units)| OrderUnits {
                    order_code: order_code.clone(),
                    units: *units,
                })
                .collect(),
            distinct_order_codes: dataset.order_codes.clone(),
            filename: dataset.filename.clone(),
            built_at: dataset.built_at,
            batch_id: dataset.batch_id.clone(),
        }
    }
}
