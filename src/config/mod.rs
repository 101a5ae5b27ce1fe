// ==========================================
// 物料损耗分析引擎 - 配置层
// ==========================================
// 职责: 引擎参数默认值 + config_kv 覆写 + 存储路径解析
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod config_reader_trait;
pub mod engine_config;
pub mod error;

use std::path::PathBuf;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use config_reader_trait::EngineConfigReader;
pub use engine_config::{CombinedCategoryConfig, EngineConfig, RESIN_KG_TO_PIECES};
pub use error::{ConfigError, ConfigResult};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "MERMA_ENGINE_DB_PATH";

/// 默认数据库路径
///
/// 优先级: 环境变量 `MERMA_ENGINE_DB_PATH` > 系统数据目录 > 当前目录
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join("merma-engine"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("merma_engine.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path_file_name() {
        let path = default_db_path();
        assert!(path.to_string_lossy().ends_with(".db") || std::env::var(DB_PATH_ENV).is_ok());
    }
}
