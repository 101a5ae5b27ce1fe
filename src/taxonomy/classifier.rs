// ==========================================
// 物料损耗分析引擎 - 物料分类器
// ==========================================
// 职责: 编译规则表并对物料描述做两级分类
// 红线: classify 为纯函数（相同输入恒得相同输出，无隐藏状态）
// ==========================================

use crate::importer::data_cleaner::normalize_text;
use crate::taxonomy::rules::{default_rule_specs, CategoryRuleSpec, FALLBACK_CATEGORY};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// 规则编译错误
#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("分类规则模式非法 (规则: {rule}): {message}")]
    InvalidPattern { rule: String, message: String },

    #[error("分类规则表为空")]
    EmptyRuleSet,
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Classification {
    pub category: String,
    /// 无子分类规则或未命中时为空字符串
    pub subcategory: String,
}

// ==========================================
// MaterialClassifier Trait
// ==========================================
// 用途: 导入管道与数据恢复使用的分类接口
// 实现者: Taxonomy
pub trait MaterialClassifier: Send + Sync {
    /// 对物料描述分类
    fn classify(&self, text: &str) -> Classification;
}

struct CompiledRule {
    name: String,
    regex: Regex,
}

struct CompiledCategory {
    rule: CompiledRule,
    subrules: Vec<CompiledRule>,
}

/// 已编译的分类规则表
pub struct Taxonomy {
    categories: Vec<CompiledCategory>,
}

impl Taxonomy {
    /// 使用标准规则表
    pub fn standard() -> Result<Self, TaxonomyError> {
        Self::from_specs(&default_rule_specs())
    }

    /// 从规则定义编译
    ///
    /// # 返回
    /// - Err(InvalidPattern): 任一模式无法编译
    /// - Err(EmptyRuleSet): 规则表为空
    pub fn from_specs(specs: &[CategoryRuleSpec]) -> Result<Self, TaxonomyError> {
        if specs.is_empty() {
            return Err(TaxonomyError::EmptyRuleSet);
        }

        let categories = specs
            .iter()
            .map(|spec| {
                let rule = compile(&spec.name, &spec.pattern)?;
                let subrules = spec
                    .subrules
                    .iter()
                    .map(|sub| compile(&sub.name, &sub.pattern))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledCategory { rule, subrules })
            })
            .collect::<Result<Vec<_>, TaxonomyError>>()?;

        tracing::debug!(categories = categories.len(), "分类规则表编译完成");
        Ok(Self { categories })
    }

    /// 分类名称列表（规则顺序，末尾为兜底分类）
    pub fn category_names(&self) -> Vec<&str> {
        self.categories
            .iter()
            .map(|c| c.rule.name.as_str())
            .chain(std::iter::once(FALLBACK_CATEGORY))
            .collect()
    }

    /// 仅返回分类
    pub fn category_of(&self, text: &str) -> &str {
        let normalized = normalize_text(text);
        self.match_category(&normalized)
            .map(|c| c.rule.name.as_str())
            .unwrap_or(FALLBACK_CATEGORY)
    }

    fn match_category(&self, normalized: &str) -> Option<&CompiledCategory> {
        self.categories
            .iter()
            .find(|c| c.rule.regex.is_match(normalized))
    }
}

impl MaterialClassifier for Taxonomy {
    fn classify(&self, text: &str) -> Classification {
        let normalized = normalize_text(text);
        match self.match_category(&normalized) {
            Some(category) => Classification {
                category: category.rule.name.clone(),
                subcategory: category
                    .subrules
                    .iter()
                    .find(|sub| sub.regex.is_match(&normalized))
                    .map(|sub| sub.name.clone())
                    .unwrap_or_default(),
            },
            None => Classification {
                category: FALLBACK_CATEGORY.to_string(),
                subcategory: String::new(),
            },
        }
    }
}

fn compile(name: &str, pattern: &str) -> Result<CompiledRule, TaxonomyError> {
    let regex = Regex::new(pattern).map_err(|e| TaxonomyError::InvalidPattern {
        rule: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(CompiledRule {
        name: name.to_string(),
        regex,
    })
}
