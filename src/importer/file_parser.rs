// ==========================================
// 物料损耗分析引擎 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取，输出首个工作表的原始单元格网格
// 支持: Excel (.xlsx/.xlsm/.xls/.ods) / CSV (.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::GridReader;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

// ==========================================
// RawCell - 原始单元格
// ==========================================

/// 原始单元格值（未做任何业务解释）
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

/// 原始网格（行优先）
pub type RawGrid = Vec<Vec<RawCell>>;

impl RawCell {
    /// 文本形式（数值按整数优先格式化）
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawCell::Empty => Cow::Borrowed(""),
            RawCell::Text(s) => Cow::Borrowed(s.trim()),
            RawCell::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    Cow::Owned(format!("{}", *n as i64))
                } else {
                    Cow::Owned(n.to_string())
                }
            }
            RawCell::Bool(b) => Cow::Owned(b.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        RawCell::from(value.as_str())
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::String(s) => RawCell::from(s.as_str()),
            Data::Float(f) => RawCell::Number(*f),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Bool(b) => RawCell::Bool(*b),
            // 日期单元格保留序列号，由日期解析器统一换算
            Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::from(s.as_str()),
            Data::Error(_) => RawCell::Empty,
        }
    }
}

// ==========================================
// CSV Reader 实现
// ==========================================
pub struct CsvGridReader;

impl GridReader for CsvGridReader {
    fn read_grid(&self, file_path: &Path) -> ImportResult<RawGrid> {
        ensure_exists(file_path)?;

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 表头位置不固定，交由字段映射定位
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut grid = Vec::new();
        for result in reader.records() {
            let record = result?;
            grid.push(record.iter().map(RawCell::from).collect());
        }

        Ok(grid)
    }
}

// ==========================================
// Excel Reader 实现
// ==========================================
pub struct WorkbookGridReader;

impl GridReader for WorkbookGridReader {
    fn read_grid(&self, file_path: &Path) -> ImportResult<RawGrid> {
        ensure_exists(file_path)?;

        let mut workbook = open_workbook_auto(file_path)?;

        // 仅读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(ImportError::NoWorksheet)?;
        let range = workbook.worksheet_range(&sheet_name)?;

        Ok(range
            .rows()
            .map(|row| row.iter().map(RawCell::from).collect())
            .collect())
    }
}

// ==========================================
// 按扩展名选择解析器
// ==========================================

/// 根据文件扩展名返回解析器
pub fn reader_for(file_path: &Path) -> ImportResult<Box<dyn GridReader>> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => Ok(Box::new(CsvGridReader)),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Box::new(WorkbookGridReader)),
        other => Err(ImportError::UnsupportedFormat(other.to_string())),
    }
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}
