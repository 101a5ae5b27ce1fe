// ==========================================
// 物料损耗分析引擎 - 分析 API
// ==========================================
// 职责: 对外唯一入口，串联 导入 → 构建 → 持久化 → 发布
// 规则:
// - 结构性输入错误（无表头 / 文件错误）中止导入，当前数据集不变
// - 持久化失败不影响内存数据集；两侧均失败时在导入报告中返回本地化提示
// - 恢复时重新分类旧快照并回写存储
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{default_db_path, EngineConfig, EngineConfigReader};
use crate::domain::aggregate::{AggregateGroup, GroupBy, Kpis, OrderSummary, RankMetric};
use crate::domain::dataset::{Dataset, FilteredRecords};
use crate::domain::filter::FilterSpec;
use crate::domain::record::Record;
use crate::domain::snapshot::Snapshot;
use crate::engine::{
    AnalyticsEngine, BuildMeta, CostSeries, FilterOptions, ListenerId, ParetoSeries, SnapshotListener,
    Subscription, TrendChart, UpdateReason,
};
use crate::export;
use crate::importer::{DatasetImporter, DatasetImporterImpl, IngestOutcome, IngestProgress, RawGrid};
use crate::repository::{
    decode_dataset, encode_dataset, DatasetStore, FallbackDatasetStore, FileDatasetStore, SqliteDatasetStore,
};
use crate::taxonomy::{MaterialClassifier, Taxonomy};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 次存储文件名（与数据库同目录）
pub const FALLBACK_FILE_NAME: &str = "merma_dataset.json";

/// 导入报告
///
/// 两个存储都写入失败时导入仍返回 Ok，此时 `persisted` 为 false，
/// 调用方须检查该字段并向用户展示 `persistence_warning`。
#[must_use = "须检查 persisted，持久化失败不会以 Err 返回"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub batch_id: String,
    pub filename: String,
    pub dataset_version: u64,
    pub records: usize,
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub total_marker_rows: usize,
    pub soft_field_errors: usize,
    pub elapsed_ms: u64,
    /// 是否已写入任一存储
    pub persisted: bool,
    /// 持久化失败时的本地化提示
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
}

// ==========================================
// AnalyticsApi
// ==========================================
pub struct AnalyticsApi {
    engine: AnalyticsEngine,
    importer: DatasetImporterImpl,
    classifier: Arc<dyn MaterialClassifier>,
    store: Arc<dyn DatasetStore>,
}

impl AnalyticsApi {
    /// 创建 API
    ///
    /// # 参数
    /// - config_reader: 配置来源（ConfigManager 或静态 EngineConfig）
    /// - store: 数据集存储
    pub fn new(config_reader: &dyn EngineConfigReader, store: Arc<dyn DatasetStore>) -> ApiResult<Self> {
        let config = config_reader.load_engine_config()?;
        let taxonomy = match config_reader.taxonomy_rules()? {
            Some(specs) => Taxonomy::from_specs(&specs)?,
            None => Taxonomy::standard()?,
        };
        Self::with_classifier(config, Arc::new(taxonomy), store)
    }

    /// 使用指定分类器创建
    pub fn with_classifier(
        config: EngineConfig,
        classifier: Arc<dyn MaterialClassifier>,
        store: Arc<dyn DatasetStore>,
    ) -> ApiResult<Self> {
        let importer =
            DatasetImporterImpl::new(Arc::clone(&classifier))?.with_chunk_size(config.ingest_chunk_size);
        info!(store = store.name(), "分析 API 初始化完成");
        Ok(Self {
            engine: AnalyticsEngine::new(config),
            importer,
            classifier,
            store,
        })
    }

    /// 默认存储布局: SQLite 主存储 + 同目录 JSON 文件次存储
    ///
    /// # 参数
    /// - db_path: 数据库路径（None 时使用 default_db_path）
    pub fn open_default(config_reader: &dyn EngineConfigReader, db_path: Option<&Path>) -> ApiResult<Self> {
        let db_path = db_path.map(Path::to_path_buf).unwrap_or_else(default_db_path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ApiError::InternalError(format!("无法创建数据目录 {}: {}", parent.display(), e)))?;
            }
        }

        let config = config_reader.load_engine_config()?;
        let file_path = db_path.with_file_name(FALLBACK_FILE_NAME);
        let primary = SqliteDatasetStore::new(&db_path.to_string_lossy())?;
        let secondary = FileDatasetStore::new(file_path, config.file_store_capacity_bytes);
        let store = FallbackDatasetStore::new(Arc::new(primary), Arc::new(secondary));
        Self::new(config_reader, Arc::new(store))
    }

    pub fn engine(&self) -> &AnalyticsEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }

    // ==========================================
    // 导入 / 恢复
    // ==========================================

    /// 导入文件并替换当前数据集
    #[instrument(skip(self, on_progress), fields(file = %file_path.display()))]
    pub fn ingest_file(
        &self,
        file_path: &Path,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ApiResult<IngestReport> {
        let outcome = self.importer.ingest_file(file_path, on_progress)?;
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.commit(outcome, filename))
    }

    /// 导入内存网格并替换当前数据集
    pub fn ingest_grid(
        &self,
        grid: &RawGrid,
        filename: &str,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ApiResult<IngestReport> {
        let outcome = self.importer.ingest_grid(grid, on_progress)?;
        Ok(self.commit(outcome, filename.to_string()))
    }

    /// 构建并替换数据集，随后写入存储
    ///
    /// 存储全部失败时内存数据集仍被替换，失败信息写入报告的 `persistence_warning`。
    fn commit(&self, outcome: IngestOutcome, filename: String) -> IngestReport {
        let IngestOutcome {
            batch_id,
            records,
            total_rows,
            skipped_rows,
            total_marker_rows,
            soft_field_errors,
            elapsed_ms,
        } = outcome;

        let dataset = self.engine.builder().build(
            records,
            BuildMeta {
                filename: filename.clone(),
                built_at: None,
                batch_id: Some(batch_id.clone()),
            },
        );
        let dataset_version = dataset.version();
        let record_count = dataset.len();

        let persistence_warning = self.persist(&dataset).err().map(|e| e.user_message());
        self.engine.replace_dataset(dataset);

        IngestReport {
            batch_id,
            filename,
            dataset_version,
            records: record_count,
            total_rows,
            skipped_rows,
            total_marker_rows,
            soft_field_errors,
            elapsed_ms,
            persisted: persistence_warning.is_none(),
            persistence_warning,
        }
    }

    /// 写入存储（失败只告警，由调用方决定是否提示）
    fn persist(&self, dataset: &Dataset) -> ApiResult<()> {
        let blob = encode_dataset(dataset)?;
        match self.store.put(&blob) {
            Ok(()) => {
                info!(
                    store = self.store.name(),
                    version = dataset.version(),
                    bytes = blob.len(),
                    "数据集已持久化"
                );
                Ok(())
            }
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "数据集持久化失败，内存数据集继续可用");
                Err(e.into())
            }
        }
    }

    /// 从存储恢复上次会话
    ///
    /// # 返回
    /// - Ok(Some(snapshot)): 已恢复并发布
    /// - Ok(None): 存储中无数据集
    pub fn restore(&self) -> ApiResult<Option<Arc<Snapshot>>> {
        let blob = match self.store.get()? {
            Some(blob) => blob,
            None => {
                info!(store = self.store.name(), "存储中无数据集，跳过恢复");
                return Ok(None);
            }
        };

        let persisted = decode_dataset(&blob)?;
        let dataset = self.engine.builder().restore(persisted, self.classifier.as_ref());
        info!(version = dataset.version(), records = dataset.len(), "数据集已从存储恢复");

        // 回写（重新分类后的快照）
        if let Err(e) = self.persist(&dataset) {
            warn!(error = %e, "恢复后回写失败");
        }

        Ok(Some(self.engine.replace_dataset_with_reason(dataset, UpdateReason::DatasetRestored)))
    }

    /// 清空存储
    pub fn clear_store(&self) -> ApiResult<()> {
        self.store.clear()?;
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.engine.snapshot()
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        self.engine.dataset()
    }

    /// 当前数据集全部记录
    pub fn all_records(&self) -> Vec<Record> {
        self.engine.dataset().records().to_vec()
    }

    /// 当前筛选条件下的记录
    pub fn filtered_records(&self) -> FilteredRecords {
        self.engine.snapshot().filtered.clone()
    }

    /// 按当前分组维度的聚合结果
    pub fn aggregates(&self) -> Vec<AggregateGroup> {
        self.engine.snapshot().aggregates.clone()
    }

    /// 按指定维度聚合（不改变当前分组维度）
    pub fn aggregates_by(&self, group_by: GroupBy) -> Vec<AggregateGroup> {
        self.engine.aggregate_by(group_by)
    }

    pub fn kpis(&self) -> Kpis {
        self.engine.snapshot().kpis.clone()
    }

    pub fn pareto(&self, metric: RankMetric) -> ParetoSeries {
        self.engine.pareto(metric)
    }

    pub fn trend(&self, split_by_line: bool) -> TrendChart {
        self.engine.trend(split_by_line)
    }

    pub fn daily_cost(&self) -> CostSeries {
        self.engine.daily_cost()
    }

    pub fn order_summaries(&self) -> Vec<OrderSummary> {
        self.engine.order_summaries()
    }

    pub fn critical_group(&self) -> Option<AggregateGroup> {
        self.engine.critical_group()
    }

    /// 筛选控件可选项（默认月份以本地当天为准）
    pub fn filter_options(&self) -> FilterOptions {
        self.filter_options_at(Local::now().date_naive())
    }

    pub fn filter_options_at(&self, today: NaiveDate) -> FilterOptions {
        self.engine.filter_options(today)
    }

    // ==========================================
    // 状态变更 / 订阅
    // ==========================================

    pub fn set_filter(&self, filter: FilterSpec) -> Arc<Snapshot> {
        self.engine.set_filter(filter)
    }

    pub fn set_group_by(&self, group_by: GroupBy) -> Arc<Snapshot> {
        self.engine.set_group_by(group_by)
    }

    pub fn subscribe(&self, listener: Arc<dyn SnapshotListener>) -> Subscription {
        self.engine.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.engine.unsubscribe(id)
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 当前聚合表 → CSV 字符串
    pub fn export_aggregates_csv(&self) -> ApiResult<String> {
        let snapshot = self.engine.snapshot();
        Ok(export::aggregates_to_csv_string(snapshot.group_by, &snapshot.aggregates)?)
    }

    /// 当前聚合表 → CSV 文件
    pub fn export_aggregates_to_file(&self, path: &Path) -> ApiResult<()> {
        let snapshot = self.engine.snapshot();
        export::export_aggregates_to_file(path, snapshot.group_by, &snapshot.aggregates)?;
        info!(path = %path.display(), rows = snapshot.aggregates.len(), "聚合表已导出");
        Ok(())
    }

    /// 当前筛选记录 → CSV 文件
    pub fn export_records_to_file(&self, path: &Path) -> ApiResult<()> {
        let snapshot = self.engine.snapshot();
        export::export_records_to_file(path, snapshot.filtered.iter())?;
        info!(path = %path.display(), rows = snapshot.filtered.len(), "筛选记录已导出");
        Ok(())
    }
}
