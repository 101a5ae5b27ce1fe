// ==========================================
// 物料损耗分析引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine
// 系统定位: 原料损耗（merma）分析，供看板 / 报表调用
// 数据流: 表格文件 → 归一化 + 分类 → 数据集 → 筛选 / 聚合 / 排名 → 快照发布
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "es");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与结果类型
pub mod domain;

// 分类层 - 物料两级分类规则
pub mod taxonomy;

// 导入层 - 外部数据
pub mod importer;

// 引擎层 - 筛选 / 聚合 / 排名 / 发布
pub mod engine;

// 数据仓储层 - 数据集持久化
pub mod repository;

// 配置层 - 引擎参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// 国际化
pub mod i18n;

// CSV 导出
pub mod export;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    AggregateGroup, CategorySelection, Dataset, FilterSpec, FilteredRecords, GroupBy, IsoDate, Kpis,
    OrderSummary, RankMetric, Record, Snapshot,
};

// 分类
pub use taxonomy::{Classification, MaterialClassifier, Taxonomy};

// 引擎
pub use engine::{AnalyticsEngine, FilterOptions, ParetoSeries, SnapshotEvent, Subscription, TrendChart};

// 存储
pub use repository::{DatasetStore, FallbackDatasetStore, FileDatasetStore, SqliteDatasetStore};

// 配置
pub use config::{ConfigManager, EngineConfig};

// API
pub use api::{AnalyticsApi, ApiError, ApiResult, IngestReport};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Análisis de Merma";
