// ==========================================
// 物料损耗分析引擎 - 分析引擎（编排器）
// ==========================================
// 职责: 持有当前数据集 / 筛选条件 / 分组维度，协调
//       筛选 → 聚合 → 快照发布
// 规则:
// - 数据集替换为整体原子替换（Arc 交换），持有旧 Arc 的读者不受影响
// - 每次变更只构建一个 Arc<Snapshot> 并同步广播
// - 广播时不持有状态锁，监听者可回调读取引擎
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::aggregate::{AggregateGroup, GroupBy, OrderSummary, RankMetric};
use crate::domain::dataset::{Dataset, FilteredRecords};
use crate::domain::filter::{CategorySelection, FilterSpec};
use crate::domain::snapshot::Snapshot;
use crate::engine::aggregation::{critical_group, order_summaries, AggregationEngine};
use crate::engine::dataset_builder::DatasetBuilder;
use crate::engine::events::{
    ListenerId, SnapshotEvent, SnapshotListener, SnapshotPublisher, Subscription, UpdateReason,
};
use crate::engine::filter::FilterEngine;
use crate::engine::pareto::{ParetoEngine, ParetoSeries};
use crate::engine::trend::{CostSeries, TrendChart, TrendEngine};
use crate::perf::PerfGuard;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// 筛选控件可选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub lines: Vec<String>,
    pub categories: Vec<String>,
    /// 组合分类的显示名
    pub combined_category_label: String,
    /// 当前分类选择下的子分类
    pub subcategories: Vec<String>,
    pub months: Vec<String>,
    pub default_month: Option<String>,
}

struct EngineState {
    dataset: Arc<Dataset>,
    filter: FilterSpec,
    group_by: GroupBy,
    snapshot: Arc<Snapshot>,
}

// ==========================================
// AnalyticsEngine
// ==========================================
pub struct AnalyticsEngine {
    config: EngineConfig,
    builder: DatasetBuilder,
    filter_engine: FilterEngine,
    aggregation: AggregationEngine,
    pareto: ParetoEngine,
    trend: TrendEngine,
    publisher: SnapshotPublisher,
    state: RwLock<EngineState>,
}

impl AnalyticsEngine {
    /// 创建引擎（初始为空数据集、无筛选、按物料分组）
    pub fn new(config: EngineConfig) -> Self {
        let filter_engine = FilterEngine::new(&config);
        let aggregation = AggregationEngine::new(&config);
        let dataset = Arc::new(Dataset::empty());
        let filter = FilterSpec::new();
        let group_by = GroupBy::default();
        let snapshot = Arc::new(build_snapshot(&filter_engine, &aggregation, &dataset, &filter, group_by));

        Self {
            pareto: ParetoEngine::new(&config),
            trend: TrendEngine::new(&config),
            builder: DatasetBuilder::new(),
            publisher: SnapshotPublisher::new(),
            state: RwLock::new(EngineState {
                dataset,
                filter,
                group_by,
                snapshot,
            }),
            filter_engine,
            aggregation,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 数据集构建器（版本号由引擎统一分配）
    pub fn builder(&self) -> &DatasetBuilder {
        &self.builder
    }

    pub fn filter_engine(&self) -> &FilterEngine {
        &self.filter_engine
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== 状态读取 =====

    pub fn dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.read_state().dataset)
    }

    pub fn filter(&self) -> FilterSpec {
        self.read_state().filter.clone()
    }

    pub fn group_by(&self) -> GroupBy {
        self.read_state().group_by
    }

    /// 最近一次发布的快照
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.read_state().snapshot)
    }

    // ===== 状态变更 =====

    /// 替换当前数据集（筛选条件与分组维度保留）
    pub fn replace_dataset(&self, dataset: Dataset) -> Arc<Snapshot> {
        self.replace_dataset_with_reason(dataset, UpdateReason::DatasetReplaced)
    }

    pub(crate) fn replace_dataset_with_reason(&self, dataset: Dataset, reason: UpdateReason) -> Arc<Snapshot> {
        let dataset = Arc::new(dataset);
        info!(
            version = dataset.version(),
            rows = dataset.len(),
            filename = %dataset.filename(),
            reason = reason.as_str(),
            "数据集已替换"
        );
        self.update(reason, |state| state.dataset = dataset)
    }

    pub fn set_filter(&self, filter: FilterSpec) -> Arc<Snapshot> {
        self.update(UpdateReason::FilterChanged, |state| state.filter = filter)
    }

    pub fn set_group_by(&self, group_by: GroupBy) -> Arc<Snapshot> {
        self.update(UpdateReason::GroupByChanged, |state| state.group_by = group_by)
    }

    /// 修改状态 → 重算快照 → 释放锁 → 广播
    fn update(&self, reason: UpdateReason, mutate: impl FnOnce(&mut EngineState)) -> Arc<Snapshot> {
        let snapshot = {
            let mut state = self.write_state();
            mutate(&mut *state);
            let snapshot = Arc::new(build_snapshot(
                &self.filter_engine,
                &self.aggregation,
                &state.dataset,
                &state.filter,
                state.group_by,
            ));
            state.snapshot = Arc::clone(&snapshot);
            snapshot
        };

        self.publisher.publish(&SnapshotEvent {
            reason,
            snapshot: Arc::clone(&snapshot),
        });
        snapshot
    }

    // ===== 订阅 =====

    pub fn subscribe(&self, listener: Arc<dyn SnapshotListener>) -> Subscription {
        self.publisher.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.publisher.unsubscribe(id)
    }

    pub fn publisher(&self) -> &SnapshotPublisher {
        &self.publisher
    }

    // ===== 派生视图（基于当前快照，不改变状态） =====

    /// 按任意维度聚合当前筛选结果
    pub fn aggregate_by(&self, group_by: GroupBy) -> Vec<AggregateGroup> {
        let snapshot = self.snapshot();
        if snapshot.group_by == group_by {
            return snapshot.aggregates.clone();
        }
        self.aggregation
            .aggregate(&snapshot.filtered, group_by, snapshot.filter.is_combined())
    }

    pub fn pareto(&self, metric: RankMetric) -> ParetoSeries {
        let snapshot = self.snapshot();
        self.pareto.rank(&snapshot.aggregates, metric)
    }

    pub fn trend(&self, split_by_line: bool) -> TrendChart {
        let snapshot = self.snapshot();
        self.trend
            .waste_trend(&snapshot.filtered, split_by_line, snapshot.filter.is_combined())
    }

    pub fn daily_cost(&self) -> CostSeries {
        self.trend.daily_cost(&self.snapshot().filtered)
    }

    pub fn order_summaries(&self) -> Vec<OrderSummary> {
        order_summaries(&self.snapshot().filtered)
    }

    /// 当前分组中损耗成本最高者
    pub fn critical_group(&self) -> Option<AggregateGroup> {
        critical_group(&self.snapshot().aggregates).cloned()
    }

    /// 筛选控件可选项
    ///
    /// # 参数
    /// - today: 用于计算默认月份的当前日期
    pub fn filter_options(&self, today: NaiveDate) -> FilterOptions {
        let (dataset, filter) = {
            let state = self.read_state();
            (Arc::clone(&state.dataset), state.filter.clone())
        };

        let subcategories = match &filter.category {
            CategorySelection::All => Vec::new(),
            CategorySelection::Exact(category) => dataset.subcategories_of(category),
            CategorySelection::Combined => self
                .config
                .combined_category
                .members
                .iter()
                .flat_map(|member| dataset.subcategories_of(member))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        FilterOptions {
            lines: dataset.lines().to_vec(),
            categories: dataset.categories().to_vec(),
            combined_category_label: self.config.combined_category.label.clone(),
            subcategories,
            months: dataset.months(),
            default_month: dataset.default_month(today),
        }
    }
}

/// 筛选 + 聚合 → 快照
fn build_snapshot(
    filter_engine: &FilterEngine,
    aggregation: &AggregationEngine,
    dataset: &Arc<Dataset>,
    filter: &FilterSpec,
    group_by: GroupBy,
) -> Snapshot {
    let mut perf = PerfGuard::new("recompute");
    let combined = filter.is_combined();
    let filtered: FilteredRecords = filter_engine.apply(dataset, filter);
    let aggregates = aggregation.aggregate(&filtered, group_by, combined);
    let kpis = aggregation.kpis(&filtered, combined);
    perf.set_items(filtered.len());

    debug!(
        version = dataset.version(),
        filtered = filtered.len(),
        groups = aggregates.len(),
        group_by = %group_by,
        "快照重算完成"
    );

    Snapshot {
        dataset_version: dataset.version(),
        filter: filter.clone(),
        group_by,
        filtered,
        aggregates,
        kpis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{IsoDate, Record};
    use crate::engine::dataset_builder::BuildMeta;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    fn record(line: &str, category: &str, sub: &str, theoretical: f64, actual: f64) -> Record {
        let mut r = Record {
            line: line.to_string(),
            category: category.to_string(),
            subcategory: sub.to_string(),
            material_name: format!("MAT {}", sub),
            order_code: format!("OPE-{}", line),
            date: IsoDate::from_ymd(2024, 3, 15),
            theoretical,
            actual,
            waste_cost: actual - theoretical,
            ..Default::default()
        };
        r.recompute_ratios();
        r
    }

    fn loaded_engine() -> AnalyticsEngine {
        let engine = AnalyticsEngine::new(EngineConfig::default());
        let dataset = engine.builder().build(
            vec![
                record("L1", "Etiquetas", "Fanta", 100.0, 110.0),
                record("L2", "Etiquetas", "Sprite", 100.0, 120.0),
                record("L2", "Preformas PET", "Genérica", 1000.0, 1005.0),
                record("L1", "Resinas PET", "Virgen (MB+912)", 18.5, 20.0),
            ],
            BuildMeta::default(),
        );
        engine.replace_dataset(dataset);
        engine
    }

    #[test]
    fn test_initial_snapshot_is_empty() {
        let engine = AnalyticsEngine::new(EngineConfig::default());
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.dataset_version, 0);
        assert!(snapshot.filtered.is_empty());
        assert_eq!(snapshot.kpis.record_count, 0);
    }

    #[test]
    fn test_replace_dataset_recomputes() {
        let engine = loaded_engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.filtered.len(), 4);
        assert_eq!(snapshot.dataset_version, engine.dataset().version());
        assert_eq!(snapshot.aggregates.len(), 4);
    }

    #[test]
    fn test_set_filter_and_group_by() {
        let engine = loaded_engine();
        let snapshot = engine.set_filter(FilterSpec::new().with_category("Etiquetas"));
        assert_eq!(snapshot.filtered.len(), 2);

        let snapshot = engine.set_group_by(GroupBy::Line);
        assert_eq!(snapshot.group_by, GroupBy::Line);
        assert_eq!(snapshot.aggregates[0].key, "L2");
        assert_eq!(snapshot.aggregates[0].waste, 20.0);
    }

    #[test]
    fn test_every_change_notifies_once() {
        let engine = loaded_engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let last_version = Arc::new(AtomicU64::new(0));
        let (h, v) = (Arc::clone(&hits), Arc::clone(&last_version));
        let sub = engine.subscribe(Arc::new(move |event: &SnapshotEvent| {
            h.fetch_add(1, Ordering::SeqCst);
            v.store(event.snapshot.dataset_version, Ordering::SeqCst);
        }));

        engine.set_filter(FilterSpec::new().with_lines(["L1"]));
        engine.set_group_by(GroupBy::Category);
        let dataset = engine.builder().build(Vec::new(), BuildMeta::default());
        let version = dataset.version();
        engine.replace_dataset(dataset);

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(last_version.load(Ordering::SeqCst), version);
        assert!(sub.dispose());
        engine.set_group_by(GroupBy::Line);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listener_can_read_engine() {
        let engine = Arc::new(loaded_engine());
        let seen = Arc::new(AtomicUsize::new(0));
        let (weak, s) = (Arc::downgrade(&engine), Arc::clone(&seen));
        let _sub = engine.subscribe(Arc::new(move |_: &SnapshotEvent| {
            if let Some(engine) = weak.upgrade() {
                s.store(engine.snapshot().filtered.len(), Ordering::SeqCst);
            }
        }));
        engine.set_filter(FilterSpec::new().with_lines(["L2"]));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_old_dataset_arc_unaffected() {
        let engine = loaded_engine();
        let old = engine.dataset();
        engine.replace_dataset(engine.builder().build(Vec::new(), BuildMeta::default()));
        assert_eq!(old.len(), 4);
        assert!(engine.dataset().is_empty());
    }

    #[test]
    fn test_combined_filter_scales_kpis() {
        let engine = loaded_engine();
        let snapshot = engine.set_filter(FilterSpec::new().with_combined_category());
        assert_eq!(snapshot.filtered.len(), 2);
        // 18.5 kg → 1000 件，20 kg → 1081.08 件
        let expected_actual = 1005.0 + 20.0 * 1000.0 / 18.5;
        assert!((snapshot.kpis.total_actual - expected_actual).abs() < 1e-6);
    }

    #[test]
    fn test_filter_options() {
        let engine = loaded_engine();
        engine.set_filter(FilterSpec::new().with_category("Etiquetas"));
        let options = engine.filter_options(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(options.lines, vec!["L1", "L2"]);
        assert_eq!(options.subcategories, vec!["Fanta", "Sprite"]);
        assert_eq!(options.months, vec!["2024-03"]);
        assert_eq!(options.default_month.as_deref(), Some("2024-03"));
        assert_eq!(options.combined_category_label, "Preforma y Resina PET");

        engine.set_filter(FilterSpec::new().with_combined_category());
        let options = engine.filter_options(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(options.subcategories, vec!["Genérica", "Virgen (MB+912)"]);
    }

    #[test]
    fn test_derived_views() {
        let engine = loaded_engine();
        engine.set_group_by(GroupBy::Line);
        let by_category = engine.aggregate_by(GroupBy::Category);
        assert_eq!(by_category[0].key, "Etiquetas");
        assert_eq!(engine.pareto(RankMetric::Waste).len(), 2);
        assert_eq!(engine.order_summaries().len(), 2);
        assert!(engine.critical_group().is_some());
        assert_eq!(engine.trend(false).buckets, vec!["2024-03-15"]);
        assert_eq!(engine.daily_cost().values.len(), 1);
    }
}
