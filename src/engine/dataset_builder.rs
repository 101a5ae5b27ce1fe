// ==========================================
// 物料损耗分析引擎 - 数据集构建器
// ==========================================
// 职责: Record 列表 → 带派生索引的 Dataset
// 规则:
// - 按日期稳定升序排序（空日期在前，同日保持源顺序）
// - 订单产出箱数取最大值（不求和）
// - 每次构建分配单调递增的版本号（构建器自持计数器）
// ==========================================

use crate::domain::dataset::{Dataset, PersistedDataset};
use crate::domain::record::Record;
use crate::taxonomy::MaterialClassifier;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// 构建元信息
#[derive(Debug, Clone, Default)]
pub struct BuildMeta {
    pub filename: String,
    pub built_at: Option<DateTime<Utc>>,
    pub batch_id: Option<String>,
}

// ==========================================
// DatasetBuilder
// ==========================================
pub struct DatasetBuilder {
    next_version: AtomicU64,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self {
            next_version: AtomicU64::new(1),
        }
    }

    /// 最近一次分配的版本号（尚未构建时为 0）
    pub fn last_version(&self) -> u64 {
        self.next_version.load(Ordering::SeqCst).saturating_sub(1)
    }

    /// 构建数据集
    ///
    /// # 参数
    /// - records: 已归一化、已分类的记录
    /// - meta: 文件名 / 构建时间 / 批次号
    pub fn build(&self, mut records: Vec<Record>, meta: BuildMeta) -> Dataset {
        // sort_by_key 为稳定排序
        records.sort_by_key(|r| r.date);

        let lines: BTreeSet<String> = records
            .iter()
            .map(|r| r.line.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let categories: BTreeSet<String> = records.iter().map(|r| r.category.clone()).collect();

        let mut seen = HashSet::new();
        let mut order_codes = Vec::new();
        let mut units_by_order: BTreeMap<String, f64> = BTreeMap::new();
        for record in &records {
            if record.order_code.is_empty() {
                continue;
            }
            if seen.insert(record.order_code.as_str()) {
                order_codes.push(record.order_code.clone());
            }
            if record.units_produced > 0.0 {
                let entry = units_by_order.entry(record.order_code.clone()).or_insert(0.0);
                *entry = entry.max(record.units_produced);
            }
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        debug!(
            version,
            records = records.len(),
            lines = lines.len(),
            categories = categories.len(),
            orders = order_codes.len(),
            "数据集构建完成"
        );

        Dataset {
            version,
            records,
            lines: lines.into_iter().collect(),
            categories: categories.into_iter().collect(),
            order_codes,
            units_by_order,
            filename: meta.filename,
            built_at: meta.built_at.unwrap_or_else(Utc::now),
            batch_id: meta.batch_id,
        }
    }

    /// 从持久化快照恢复
    ///
    /// 旧版快照中分类为空的记录会重新分类；派生索引重新计算，
    /// 快照中的订单产出箱数与记录中的值取最大。
    pub fn restore(&self, persisted: PersistedDataset, classifier: &dyn MaterialClassifier) -> Dataset {
        let mut reclassified = 0usize;
        let mut records = persisted.records;
        for record in &mut records {
            if record.category.trim().is_empty() {
                let c = classifier.classify(record.classification_text());
                record.category = c.category;
                record.subcategory = c.subcategory;
                reclassified += 1;
            }
        }

        let stored_units: BTreeMap<String, f64> = persisted
            .per_order_units_produced
            .into_iter()
            .map(|u| (u.order_code, u.units))
            .collect();
        for record in &mut records {
            if let Some(units) = stored_units.get(&record.order_code) {
                record.units_produced = record.units_produced.max(*units);
            }
        }

        if reclassified > 0 {
            info!(reclassified, "旧版快照记录已重新分类");
        }

        self.build(
            records,
            BuildMeta {
                filename: persisted.filename,
                built_at: Some(persisted.built_at),
                batch_id: persisted.batch_id,
            },
        )
    }
}
