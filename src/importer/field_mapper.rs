// ==========================================
// 物料损耗分析引擎 - 字段映射器
// ==========================================
// 阶段 1: 定位表头行，并把业务字段解析为列索引
// 规则:
// - 表头行须同时包含「Artículo + Descripción」与「Código de artículo + nombre」
// - 其余列按归一化表头文本做模式匹配（忽略大小写与重音）
// - 更具体的模式先认领列（如「Costo merma」先于「Merma」，「Fecha de producción」先于「Producción」）
// ==========================================

use crate::importer::data_cleaner::normalize_text;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawCell;
use regex::Regex;
use serde::Serialize;

/// 业务字段（按认领顺序排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Material,
    Article,
    WasteCost,
    UnitCost,
    Theoretical,
    Actual,
    UnitsProduced,
    Date,
    OrderCode,
    Line,
    Waste,
}

/// 字段认领顺序及表头模式
const FIELD_PATTERNS: &[(Field, &str)] = &[
    (Field::Material, r"articulo\s*\+\s*descrip"),
    (Field::Article, r"codigo\s*de\s*articulo\s*\+\s*nombre"),
    (Field::WasteCost, r"costo\s*(de\s*)?(la\s*)?merma"),
    (Field::UnitCost, r"costo\s*unitario|costo\s*(x|por)?\s*(kg|pieza)|precio\s*unitario"),
    (Field::Theoretical, r"cantidad\s*teorica|\bteoric"),
    (Field::Actual, r"cantidad\s*real|\breal\b"),
    (Field::UnitsProduced, r"(cajas|unidades|piezas)\s*producidas"),
    (Field::Date, r"fecha"),
    (Field::OrderCode, r"produccion|\bope\b|\borden\b"),
    (Field::Line, r"recurso|\blinea\b"),
    (Field::Waste, r"merma"),
];

/// 列索引映射（未解析的列为 None）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub material: usize,
    pub article: Option<usize>,
    pub waste_cost: Option<usize>,
    pub unit_cost: Option<usize>,
    pub theoretical: Option<usize>,
    pub actual: Option<usize>,
    pub units_produced: Option<usize>,
    pub order_code: Option<usize>,
    pub line: Option<usize>,
    pub date: Option<usize>,
    pub waste: Option<usize>,
}

impl ColumnMap {
    /// 字段对应列
    pub fn column(&self, field: Field) -> Option<usize> {
        match field {
            Field::Material => Some(self.material),
            Field::Article => self.article,
            Field::WasteCost => self.waste_cost,
            Field::UnitCost => self.unit_cost,
            Field::Theoretical => self.theoretical,
            Field::Actual => self.actual,
            Field::UnitsProduced => self.units_produced,
            Field::OrderCode => self.order_code,
            Field::Line => self.line,
            Field::Date => self.date,
            Field::Waste => self.waste,
        }
    }

    /// 取行内单元格（越界视为空）
    pub fn cell<'a>(&self, row: &'a [RawCell], field: Field) -> &'a RawCell {
        const EMPTY: &RawCell = &RawCell::Empty;
        self.column(field)
            .and_then(|idx| row.get(idx))
            .unwrap_or(EMPTY)
    }

    fn set(&mut self, field: Field, idx: usize) {
        match field {
            Field::Material => self.material = idx,
            Field::Article => self.article = Some(idx),
            Field::WasteCost => self.waste_cost = Some(idx),
            Field::UnitCost => self.unit_cost = Some(idx),
            Field::Theoretical => self.theoretical = Some(idx),
            Field::Actual => self.actual = Some(idx),
            Field::UnitsProduced => self.units_produced = Some(idx),
            Field::OrderCode => self.order_code = Some(idx),
            Field::Line => self.line = Some(idx),
            Field::Date => self.date = Some(idx),
            Field::Waste => self.waste = Some(idx),
        }
    }
}

/// 表头定位结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderLayout {
    /// 表头所在行（0 起）
    pub header_row: usize,
    pub columns: ColumnMap,
}

// ==========================================
// FieldMapper - 表头解析
// ==========================================
pub struct FieldMapper {
    patterns: Vec<(Field, Regex)>,
}

impl FieldMapper {
    pub fn new() -> ImportResult<Self> {
        let patterns = FIELD_PATTERNS
            .iter()
            .map(|(field, pattern)| {
                Regex::new(pattern)
                    .map(|re| (*field, re))
                    .map_err(|e| ImportError::InternalError(format!("表头模式非法 {:?}: {}", field, e)))
            })
            .collect::<ImportResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    fn pattern(&self, field: Field) -> Option<&Regex> {
        self.patterns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, re)| re)
    }

    /// 扫描网格定位表头行并解析列映射
    ///
    /// # 返回
    /// - Err(HeaderNotFound): 没有任何一行同时包含两个必需的组合字段
    pub fn locate(&self, grid: &[Vec<RawCell>]) -> ImportResult<HeaderLayout> {
        let material_re = self.pattern(Field::Material);
        let article_re = self.pattern(Field::Article);

        for (row_idx, row) in grid.iter().enumerate() {
            let headers: Vec<String> = row.iter().map(|c| normalize_text(&c.as_text())).collect();
            let has = |re: Option<&Regex>| re.is_some_and(|re| headers.iter().any(|h| re.is_match(h)));

            if has(material_re) && has(article_re) {
                let columns = self.resolve(&headers);
                tracing::debug!(header_row = row_idx, columns = ?columns, "表头定位完成");
                return Ok(HeaderLayout {
                    header_row: row_idx,
                    columns,
                });
            }
        }

        Err(ImportError::HeaderNotFound {
            material: "Artículo + Descripción".to_string(),
            article: "Código de artículo + nombre".to_string(),
        })
    }

    /// 按认领顺序解析列；已认领的列不再参与后续匹配
    fn resolve(&self, headers: &[String]) -> ColumnMap {
        let mut claimed = vec![false; headers.len()];
        let mut columns = ColumnMap::default();

        for (field, re) in &self.patterns {
            let hit = headers
                .iter()
                .enumerate()
                .find(|(idx, h)| !claimed[*idx] && !h.is_empty() && re.is_match(h))
                .map(|(idx, _)| idx);
            if let Some(idx) = hit {
                claimed[idx] = true;
                columns.set(*field, idx);
            }
        }

        columns
    }
}
