// ==========================================
// 物料损耗分析引擎 - 配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::config::error::ConfigResult;
use crate::taxonomy::CategoryRuleSpec;

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 用途: 引擎 / API 启动时加载配置
// 实现者: ConfigManager（从 config_kv 表读取）、EngineConfig（静态配置）
pub trait EngineConfigReader: Send + Sync {
    /// 加载引擎配置（缺失项使用默认值）
    fn load_engine_config(&self) -> ConfigResult<EngineConfig>;

    /// 自定义分类规则表
    ///
    /// # 返回
    /// - None: 使用标准规则表
    fn taxonomy_rules(&self) -> ConfigResult<Option<Vec<CategoryRuleSpec>>>;
}

impl EngineConfigReader for EngineConfig {
    fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        Ok(self.clone())
    }

    fn taxonomy_rules(&self) -> ConfigResult<Option<Vec<CategoryRuleSpec>>> {
        Ok(None)
    }
}
