// ==========================================
// 物料损耗分析引擎 - API 层
// ==========================================
// 职责: 对外业务接口（导入 / 恢复 / 查询 / 订阅 / 导出）
// ==========================================

pub mod analytics_api;
pub mod error;

// 重导出核心类型
pub use analytics_api::{AnalyticsApi, IngestReport, FALLBACK_FILE_NAME};
pub use error::{ApiError, ApiResult};
