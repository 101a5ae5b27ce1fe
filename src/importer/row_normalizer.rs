// ==========================================
// 物料损耗分析引擎 - 行归一化
// ==========================================
// 阶段 2: 原始行 → 规范化 Record
// 规则:
// - 物料描述为空或为占位符的行丢弃
// - 「合计」行只贡献订单产出箱数（同订单取最大值），不生成记录
// - 损耗一律重新计算: 实际 - 理论（不信任源文件的损耗列）
// - 损耗成本: 显式成本列优先，缺失/为 0 时 = 损耗 × 单位成本
// ==========================================

use crate::domain::record::Record;
use crate::importer::data_cleaner::{is_placeholder, normalize_text, split_code_name};
use crate::importer::field_mapper::{ColumnMap, Field, HeaderLayout};
use crate::importer::file_parser::RawCell;
use crate::importer::importer_trait::IngestProgress;
use crate::importer::scalar_parser::{is_numeric_cell, parse_cell_date, parse_cell_number};
use crate::taxonomy::MaterialClassifier;
use std::collections::HashMap;

/// 默认分块大小
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;

/// 合计行标识前缀（归一化后）
const TOTAL_PREFIX: &str = "total";

/// 归一化统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub total_marker_rows: usize,
    pub soft_field_errors: usize,
}

// ==========================================
// RowNormalizer
// ==========================================
pub struct RowNormalizer<'a> {
    layout: &'a HeaderLayout,
    classifier: &'a dyn MaterialClassifier,
    chunk_size: usize,
}

impl<'a> RowNormalizer<'a> {
    pub fn new(layout: &'a HeaderLayout, classifier: &'a dyn MaterialClassifier) -> Self {
        Self {
            layout,
            classifier,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// 归一化表头之后的全部数据行
    ///
    /// # 参数
    /// - grid: 原始网格（含表头及其之前的行）
    /// - on_progress: 每处理完一个分块回调一次
    ///
    /// # 返回
    /// - (记录列表, 统计)
    pub fn normalize(
        &self,
        grid: &[Vec<RawCell>],
        mut on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> (Vec<Record>, NormalizeStats) {
        let data_rows = grid.get(self.layout.header_row + 1..).unwrap_or(&[]);
        let columns = &self.layout.columns;

        let mut stats = NormalizeStats {
            total_rows: data_rows.len(),
            ..Default::default()
        };
        let mut records: Vec<Record> = Vec::with_capacity(data_rows.len());
        let mut units_cache: HashMap<String, f64> = HashMap::new();
        // 当前订单连续段在 records 中的起点
        let mut run_start = 0usize;
        let mut run_order: Option<String> = None;

        let mut processed = 0usize;
        for chunk in data_rows.chunks(self.chunk_size) {
            for row in chunk {
                if is_total_row(columns, row) {
                    stats.total_marker_rows += 1;
                    let units = parse_cell_number(columns.cell(row, Field::UnitsProduced));
                    // 无法归属订单的合计行不缓存箱数
                    let order_key = if units > 0.0 {
                        total_row_order(columns, row, run_order.as_deref())
                    } else {
                        None
                    };
                    if let Some(order_key) = order_key {
                        let cached = units_cache.entry(order_key.clone()).or_insert(0.0);
                        *cached = cached.max(units);
                        let value = *cached;
                        // 回填合计行之前同订单的连续行
                        if run_order.as_deref() == Some(order_key.as_str()) {
                            for record in &mut records[run_start..] {
                                record.units_produced = record.units_produced.max(value);
                            }
                        }
                    }
                    continue;
                }

                let material_cell = columns.cell(row, Field::Material);
                if material_cell.is_blank() || is_placeholder(&material_cell.as_text()) {
                    stats.skipped_rows += 1;
                    continue;
                }

                let mut record = self.build_record(columns, row, &mut stats);
                if let Some(units) = units_cache.get(&record.order_code) {
                    record.units_produced = record.units_produced.max(*units);
                }
                if record.units_produced > 0.0 && !record.order_code.is_empty() {
                    let cached = units_cache.entry(record.order_code.clone()).or_insert(0.0);
                    *cached = cached.max(record.units_produced);
                }

                if run_order.as_deref() != Some(record.order_code.as_str()) {
                    run_start = records.len();
                    run_order = Some(record.order_code.clone());
                }
                records.push(record);
            }

            processed += chunk.len();
            if let Some(callback) = on_progress.as_deref_mut() {
                callback(IngestProgress {
                    processed,
                    total: stats.total_rows,
                });
            }
        }

        // 最终回填：合计行出现在其订单之后较远位置时仍能生效
        for record in &mut records {
            if let Some(units) = units_cache.get(&record.order_code) {
                record.units_produced = record.units_produced.max(*units);
            }
        }

        (records, stats)
    }

    fn build_record(&self, columns: &ColumnMap, row: &[RawCell], stats: &mut NormalizeStats) -> Record {
        let text = |field: Field| columns.cell(row, field).as_text().trim().to_string();
        let number = |field: Field, stats: &mut NormalizeStats| {
            let cell = columns.cell(row, field);
            if !is_numeric_cell(cell) {
                stats.soft_field_errors += 1;
            }
            parse_cell_number(cell)
        };

        let (material_code, material_name) = split_code_name(&text(Field::Material));
        let (article_code, article_name) = split_code_name(&text(Field::Article));

        let theoretical = number(Field::Theoretical, stats);
        let actual = number(Field::Actual, stats);
        let explicit_cost = number(Field::WasteCost, stats);
        let unit_cost = number(Field::UnitCost, stats);
        let units_produced = number(Field::UnitsProduced, stats);

        let date_cell = columns.cell(row, Field::Date);
        let date = parse_cell_date(date_cell);
        if date.is_empty() && !date_cell.is_blank() {
            stats.soft_field_errors += 1;
        }

        let mut record = Record {
            order_code: text(Field::OrderCode),
            line: text(Field::Line),
            material_code,
            material_name,
            article_code,
            article_name,
            date,
            theoretical,
            actual,
            unit_cost,
            units_produced,
            ..Default::default()
        };
        record.recompute_ratios();
        record.waste_cost = if explicit_cost != 0.0 {
            explicit_cost
        } else {
            record.waste * unit_cost
        };

        let classification = self.classifier.classify(record.classification_text());
        record.category = classification.category;
        record.subcategory = classification.subcategory;
        record
    }
}

/// 判断合计行（任一标识列以 "total" 开头）
fn is_total_row(columns: &ColumnMap, row: &[RawCell]) -> bool {
    [Field::Material, Field::Article, Field::Line, Field::OrderCode]
        .iter()
        .any(|field| normalize_text(&columns.cell(row, *field).as_text()).starts_with(TOTAL_PREFIX))
}

/// 合计行所属订单号
///
/// 订单列去掉 "total" 前缀后仍有内容则取之，否则归属当前连续段的订单；
/// 两者皆无时返回 None。
fn total_row_order(columns: &ColumnMap, row: &[RawCell], current_order: Option<&str>) -> Option<String> {
    let order_text = columns.cell(row, Field::OrderCode).as_text().trim().to_string();
    let stripped = strip_total_prefix(&order_text);
    if !stripped.is_empty() {
        return Some(stripped);
    }
    current_order
        .filter(|order| !order.is_empty())
        .map(str::to_string)
}

fn strip_total_prefix(text: &str) -> String {
    let normalized = normalize_text(text);
    if !normalized.starts_with(TOTAL_PREFIX) {
        return text.trim().to_string();
    }
    // "total" 为 ASCII，可按字节截断原文
    text.trim()
        .get(TOTAL_PREFIX.len()..)
        .unwrap_or_default()
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '.'))
        .trim()
        .to_string()
}
