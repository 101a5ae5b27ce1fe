// ==========================================
// 物料损耗分析引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::config_reader_trait::EngineConfigReader;
use crate::config::engine_config::EngineConfig;
use crate::config::error::{ConfigError, ConfigResult};
use crate::db::open_sqlite_connection;
use crate::taxonomy::CategoryRuleSpec;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// 全局作用域
const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（表不存在时自动创建）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = lock(&conn)?;
            crate::db::configure_sqlite_connection(&guard)?;
            guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_kv (
                    scope_id   TEXT NOT NULL,
                    key        TEXT NOT NULL,
                    value      TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (scope_id, key)
                );
                "#,
            )?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（upsert）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 读取并解析配置；解析失败时告警并回退默认值
    fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> ConfigResult<T> {
        match self.get_global_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    fn get_json_or<T: serde::de::DeserializeOwned>(&self, key: &str, default: T) -> ConfigResult<T> {
        match self.get_global_config_value(key)? {
            Some(raw) => match serde_json::from_str::<T>(&raw) {
                Ok(v) => Ok(v),
                Err(e) => {
                    tracing::warn!(config_key = key, raw_value = %raw, error = %e, "配置 JSON 格式错误，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> ConfigResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ConfigError::LockError(e.to_string()))
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
impl EngineConfigReader for ConfigManager {
    fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        let d = EngineConfig::default();
        let mut combined = d.combined_category.clone();
        combined.label = self.get_parsed_or(config_keys::COMBINED_LABEL, combined.label)?;
        combined.members = self.get_json_or(config_keys::COMBINED_MEMBERS, combined.members)?;
        combined.converted_member =
            self.get_parsed_or(config_keys::COMBINED_CONVERTED_MEMBER, combined.converted_member)?;
        combined.conversion_factor =
            self.get_parsed_or(config_keys::COMBINED_CONVERSION_FACTOR, combined.conversion_factor)?;

        Ok(EngineConfig {
            max_pareto_labels: self.get_parsed_or(config_keys::PARETO_MAX_LABELS, d.max_pareto_labels)?,
            combined_category: combined,
            waste_target_pct: self.get_parsed_or(config_keys::WASTE_TARGET_PCT, d.waste_target_pct)?,
            month_bucket_threshold_days: self
                .get_parsed_or(config_keys::MONTH_BUCKET_THRESHOLD_DAYS, d.month_bucket_threshold_days)?,
            max_trend_series: self.get_parsed_or(config_keys::MAX_TREND_SERIES, d.max_trend_series)?,
            excluded_line_patterns: self
                .get_json_or(config_keys::EXCLUDED_LINE_PATTERNS, d.excluded_line_patterns)?,
            ingest_chunk_size: self.get_parsed_or(config_keys::INGEST_CHUNK_SIZE, d.ingest_chunk_size)?,
            file_store_capacity_bytes: self
                .get_parsed_or(config_keys::FILE_STORE_CAPACITY_BYTES, d.file_store_capacity_bytes)?,
        })
    }

    /// 自定义规则表格式错误时返回错误（不静默回退，避免误分类）
    fn taxonomy_rules(&self) -> ConfigResult<Option<Vec<CategoryRuleSpec>>> {
        match self.get_global_config_value(config_keys::TAXONOMY_RULES)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: config_keys::TAXONOMY_RULES.to_string(),
                    value: raw.chars().take(80).collect(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 帕累托
    pub const PARETO_MAX_LABELS: &str = "pareto_max_labels";

    // 组合分类
    pub const COMBINED_LABEL: &str = "combined_category_label";
    pub const COMBINED_MEMBERS: &str = "combined_category_members"; // JSON 数组
    pub const COMBINED_CONVERTED_MEMBER: &str = "combined_category_converted_member";
    pub const COMBINED_CONVERSION_FACTOR: &str = "combined_category_conversion_factor";

    // 趋势
    pub const WASTE_TARGET_PCT: &str = "waste_target_pct";
    pub const MONTH_BUCKET_THRESHOLD_DAYS: &str = "month_bucket_threshold_days";
    pub const MAX_TREND_SERIES: &str = "max_trend_series";

    // 产线
    pub const EXCLUDED_LINE_PATTERNS: &str = "excluded_line_patterns"; // JSON 数组

    // 导入 / 存储
    pub const INGEST_CHUNK_SIZE: &str = "ingest_chunk_size";
    pub const FILE_STORE_CAPACITY_BYTES: &str = "file_store_capacity_bytes";

    // 分类规则表
    pub const TAXONOMY_RULES: &str = "taxonomy_rules"; // JSON: [{name, pattern, subrules}]
}
