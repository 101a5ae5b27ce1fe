// ==========================================
// 物料损耗分析引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 数据集快照的持久化（主 SQLite + 次文件，带回退）
// 约束: 所有查询使用参数化
// ==========================================

pub mod dataset_store;
pub mod error;
pub mod fallback_store;
pub mod file_store;
pub mod sqlite_store;

// 重导出核心仓储
pub use dataset_store::{decode_dataset, encode_dataset, DatasetStore, MemoryDatasetStore};
pub use error::{RepositoryError, RepositoryResult};
pub use fallback_store::FallbackDatasetStore;
pub use file_store::FileDatasetStore;
pub use sqlite_store::SqliteDatasetStore;
