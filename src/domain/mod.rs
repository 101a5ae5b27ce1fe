// ==========================================
// 物料损耗分析引擎 - 领域层
// ==========================================
// 职责: 实体、值对象与结果类型（不含业务规则）
// ==========================================

pub mod aggregate;
pub mod dataset;
pub mod filter;
pub mod record;
pub mod snapshot;

pub use aggregate::{AggregateGroup, GroupBy, Kpis, OrderSummary, RankMetric};
pub use dataset::{Dataset, FilteredRecords, OrderUnits, PersistedDataset};
pub use filter::{CategorySelection, FilterSpec, LineSelection, PeriodFilter};
pub use record::{guarded_pct, IsoDate, Record};
pub use snapshot::Snapshot;
