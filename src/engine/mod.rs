// ==========================================
// 物料损耗分析引擎 - 引擎层
// ==========================================
// 职责: 数据集构建 / 筛选 / 聚合 / 排名 / 趋势 / 快照发布
// 红线: Engine 不访问存储，不解析文件
// ==========================================

pub mod aggregation;
pub mod analytics_engine;
pub mod dataset_builder;
pub mod events;
pub mod filter;
pub mod pareto;
pub mod trend;

// 重导出核心引擎
pub use aggregation::{critical_group, order_summaries, AggregationEngine};
pub use analytics_engine::{AnalyticsEngine, FilterOptions};
pub use dataset_builder::{BuildMeta, DatasetBuilder};
pub use events::{
    ListenerId, SnapshotEvent, SnapshotListener, SnapshotPublisher, Subscription, UpdateReason,
};
pub use filter::FilterEngine;
pub use pareto::{nice_ceil, nice_ceil_magnitude, nice_floor, ParetoEngine, ParetoSeries};
pub use trend::{BucketScale, CostSeries, TrendChart, TrendEngine, TrendSeries};
