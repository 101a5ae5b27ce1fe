// ==========================================
// 物料损耗分析引擎 - 发布快照
// ==========================================
// 职责: 每次变更后原子发布的不可变结果包
// ==========================================

use crate::domain::aggregate::{AggregateGroup, GroupBy, Kpis};
use crate::domain::dataset::FilteredRecords;
use crate::domain::filter::FilterSpec;

/// 不可变快照：{数据集版本, 筛选条件, 分组维度, 筛选记录, 聚合结果, KPI}
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset_version: u64,
    pub filter: FilterSpec,
    pub group_by: GroupBy,
    pub filtered: FilteredRecords,
    pub aggregates: Vec<AggregateGroup>,
    pub kpis: Kpis,
}

impl Snapshot {
    /// 按分组键查找聚合结果
    pub fn group(&self, key: &str) -> Option<&AggregateGroup> {
        self.aggregates.iter().find(|g| g.key == key)
    }
}
