// ==========================================
// 物料损耗分析引擎 - 分类层
// ==========================================
// 职责: 有序规则表驱动的两级物料分类
// ==========================================

pub mod classifier;
pub mod rules;

pub use classifier::{Classification, MaterialClassifier, Taxonomy, TaxonomyError};
pub use rules::{default_rule_specs, CategoryRuleSpec, SubRuleSpec, FALLBACK_CATEGORY};
