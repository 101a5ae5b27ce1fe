// ==========================================
// 物料损耗分析引擎 - 筛选引擎
// ==========================================
// 职责: Dataset + FilterSpec → 筛选视图（不复制记录）
// 顺序: 产线 → 可比产线 → 分类 → 子分类 / 物料 → 日期
// 红线: 增加任何约束都不会使结果集变大
// ==========================================

use crate::config::engine_config::{CombinedCategoryConfig, EngineConfig};
use crate::domain::dataset::{Dataset, FilteredRecords};
use crate::domain::filter::{CategorySelection, FilterSpec, LineSelection, PeriodFilter};
use crate::domain::record::Record;
use crate::importer::data_cleaner::normalize_text;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

// ==========================================
// FilterEngine
// ==========================================
pub struct FilterEngine {
    combined: CombinedCategoryConfig,
    combined_members: HashSet<String>,
    excluded_lines: Vec<Regex>,
}

impl FilterEngine {
    /// 创建筛选引擎
    ///
    /// 排除产线模式非法时跳过该模式并告警。
    pub fn new(config: &EngineConfig) -> Self {
        let excluded_lines = config
            .excluded_line_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "排除产线模式非法，已忽略");
                    None
                }
            })
            .collect();

        Self {
            combined: config.combined_category.clone(),
            combined_members: config
                .combined_category
                .members
                .iter()
                .map(|m| normalize_text(m))
                .collect(),
            excluded_lines,
        }
    }

    /// 组合分类配置
    pub fn combined(&self) -> &CombinedCategoryConfig {
        &self.combined
    }

    /// 产线是否属于不可比产线
    pub fn is_excluded_line(&self, line: &str) -> bool {
        let normalized = normalize_text(line);
        self.excluded_lines.iter().any(|re| re.is_match(&normalized))
    }

    /// 执行筛选
    pub fn apply(&self, dataset: &Arc<Dataset>, spec: &FilterSpec) -> FilteredRecords {
        let predicate = CompiledFilter::new(self, spec);
        let indices = dataset
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| predicate.matches(r))
            .map(|(idx, _)| idx)
            .collect();
        FilteredRecords::new(Arc::clone(dataset), indices)
    }

    /// 记录是否属于组合分类的成员
    pub fn is_combined_member(&self, record: &Record) -> bool {
        self.combined_members.contains(&normalize_text(&record.category))
    }
}

/// 预先归一化的筛选条件
struct CompiledFilter<'a> {
    engine: &'a FilterEngine,
    lines: Option<HashSet<String>>,
    comparable_only: bool,
    category: CategoryMatch,
    subcategory: Option<String>,
    material: Option<String>,
    period: &'a PeriodFilter,
}

enum CategoryMatch {
    Any,
    Exact(String),
    Combined,
}

impl<'a> CompiledFilter<'a> {
    fn new(engine: &'a FilterEngine, spec: &'a FilterSpec) -> Self {
        Self {
            engine,
            lines: match &spec.lines {
                LineSelection::All => None,
                LineSelection::Only(set) => Some(set.iter().map(|l| normalize_text(l)).collect()),
            },
            comparable_only: spec.comparable_lines_only,
            category: match &spec.category {
                CategorySelection::All => CategoryMatch::Any,
                CategorySelection::Exact(c) => CategoryMatch::Exact(normalize_text(c)),
                CategorySelection::Combined => CategoryMatch::Combined,
            },
            subcategory: spec.subcategory.as_deref().map(normalize_text),
            material: spec.material.as_deref().map(normalize_text),
            period: &spec.period,
        }
    }

    fn matches(&self, record: &Record) -> bool {
        // 1. 产线（空集合 ⇒ 无结果）
        if let Some(lines) = &self.lines {
            if !lines.contains(&normalize_text(&record.line)) {
                return false;
            }
        }

        // 2. 可比产线
        if self.comparable_only && self.engine.is_excluded_line(&record.line) {
            return false;
        }

        // 3. 分类
        match &self.category {
            CategoryMatch::Any => {}
            CategoryMatch::Exact(c) => {
                if normalize_text(&record.category) != *c {
                    return false;
                }
            }
            CategoryMatch::Combined => {
                if !self.engine.is_combined_member(record) {
                    return false;
                }
            }
        }

        // 4. 子分类 / 物料
        if let Some(sub) = &self.subcategory {
            if normalize_text(&record.subcategory) != *sub {
                return false;
            }
        }
        if let Some(material) = &self.material {
            if normalize_text(record.material_label()) != *material {
                return false;
            }
        }

        // 5. 日期
        period_matches(self.period, record)
    }
}

fn period_matches(period: &PeriodFilter, record: &Record) -> bool {
    match period {
        PeriodFilter::All => true,
        PeriodFilter::Month { month } => record.date.month_key().as_deref() == Some(month.as_str()),
        PeriodFilter::Range { start, end } => {
            if start.is_none() && end.is_none() {
                return true;
            }
            let Some(date) = record.date.date() else {
                return false;
            };
            start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
        }
    }
}
