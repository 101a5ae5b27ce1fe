// ==========================================
// 物料损耗分析引擎 - 引擎配置
// ==========================================
// 职责: 引擎运行参数（帕累托标签上限、组合分类、目标损耗率等）
// 说明: 默认值可被 config_kv 覆写，见 ConfigManager
// ==========================================

use serde::{Deserialize, Serialize};

/// 树脂 kg → 预型件件数 的换算系数（1 件 ≈ 18.5 g）
pub const RESIN_KG_TO_PIECES: f64 = 1000.0 / 18.5;

/// 组合虚拟分类配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedCategoryConfig {
    /// 展示名称
    pub label: String,
    /// 成员分类
    pub members: Vec<String>,
    /// 需要单位换算的成员分类
    pub converted_member: String,
    /// 换算系数（作用于理论 / 实际用量，不作用于成本）
    pub conversion_factor: f64,
}

impl Default for CombinedCategoryConfig {
    fn default() -> Self {
        Self {
            label: "Preforma y Resina PET".to_string(),
            members: vec!["Preformas PET".to_string(), "Resinas PET".to_string()],
            converted_member: "Resinas PET".to_string(),
            conversion_factor: RESIN_KG_TO_PIECES,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 帕累托图最大标签数
    pub max_pareto_labels: usize,
    pub combined_category: CombinedCategoryConfig,
    /// 目标损耗率（%），趋势图参考线
    pub waste_target_pct: f64,
    /// 跨度超过该天数时趋势按月分桶
    pub month_bucket_threshold_days: i64,
    /// 趋势图按产线拆分时的最大序列数
    pub max_trend_series: usize,
    /// 不可比产线的匹配模式（作用于归一化产线名）
    pub excluded_line_patterns: Vec<String>,
    /// 导入分块大小
    pub ingest_chunk_size: usize,
    /// 文件存储容量上限（字节）
    pub file_store_capacity_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pareto_labels: 40,
            combined_category: CombinedCategoryConfig::default(),
            waste_target_pct: 2.0,
            month_bucket_threshold_days: 93,
            max_trend_series: 10,
            excluded_line_patterns: vec![
                r"co2\b".to_string(),
                "multiempaq".to_string(),
                "maquila.*preforma".to_string(),
                "maquila.*bevi".to_string(),
            ],
            ingest_chunk_size: 5_000,
            file_store_capacity_bytes: 5 * 1024 * 1024,
        }
    }
}
