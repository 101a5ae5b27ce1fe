// ==========================================
// 物料损耗分析引擎 - CSV 导出
// ==========================================
// 职责: 聚合表 / 筛选记录 → CSV（Excel 可直接打开）
// 规则: 数值保留两位小数；列名使用西班牙语（与源表一致）
// ==========================================

use crate::domain::aggregate::{AggregateGroup, GroupBy};
use crate::domain::record::Record;
use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// 导出错误
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("文件写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("导出内容不是有效的 UTF-8: {0}")]
    Encoding(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

// 聚合表表头（首列为分组维度名）
const AGGREGATE_CSV_HEADER: &[&str] = &[
    "Registros",
    "Cantidad Teórica",
    "Cantidad Real",
    "Merma",
    "Costo Merma",
    "% Merma",
    "% Participación",
    "% Real",
];

// 记录表表头
const RECORD_CSV_HEADER: &[&str] = &[
    "Producción",
    "Línea",
    "Código MP",
    "Materia Prima",
    "Código Artículo",
    "Nombre Artículo",
    "Fecha",
    "Cantidad Teórica",
    "Cantidad Real",
    "Merma",
    "Costo Merma",
    "% Rendimiento",
    "% Merma",
    "Categoría MP",
    "Subcategoría MP",
];

fn group_column_name(group_by: GroupBy) -> &'static str {
    match group_by {
        GroupBy::Material => "Materia Prima",
        GroupBy::Line => "Línea",
        GroupBy::OrderCode => "Producción",
        GroupBy::Day => "Fecha",
        GroupBy::Month => "Mes",
        GroupBy::Category => "Categoría MP",
        GroupBy::Subcategory => "Subcategoría MP",
    }
}

fn fixed2(value: f64) -> String {
    format!("{:.2}", value)
}

/// 写出聚合表
pub fn write_aggregates<W: Write>(out: W, group_by: GroupBy, groups: &[AggregateGroup]) -> ExportResult<()> {
    let mut writer = Writer::from_writer(out);

    let mut header = vec![group_column_name(group_by)];
    header.extend_from_slice(AGGREGATE_CSV_HEADER);
    writer.write_record(&header)?;

    for g in groups {
        writer.write_record([
            g.key.clone(),
            g.record_count.to_string(),
            fixed2(g.theoretical),
            fixed2(g.actual),
            fixed2(g.waste),
            fixed2(g.cost),
            fixed2(g.waste_pct),
            fixed2(g.share_pct),
            fixed2(g.actual_share_pct),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// 写出记录表
pub fn write_records<'a, W, I>(out: W, records: I) -> ExportResult<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = Writer::from_writer(out);
    writer.write_record(RECORD_CSV_HEADER)?;

    for r in records {
        writer.write_record([
            r.order_code.clone(),
            r.line.clone(),
            r.material_code.clone(),
            r.material_name.clone(),
            r.article_code.clone(),
            r.article_name.clone(),
            r.date.to_string(),
            fixed2(r.theoretical),
            fixed2(r.actual),
            fixed2(r.waste),
            fixed2(r.waste_cost),
            fixed2(r.yield_pct),
            fixed2(r.waste_pct),
            r.category.clone(),
            r.subcategory.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// 聚合表 → CSV 字符串
pub fn aggregates_to_csv_string(group_by: GroupBy, groups: &[AggregateGroup]) -> ExportResult<String> {
    let mut buf = Vec::new();
    write_aggregates(&mut buf, group_by, groups)?;
    String::from_utf8(buf).map_err(|e| ExportError::Encoding(e.to_string()))
}

/// 聚合表 → CSV 文件
pub fn export_aggregates_to_file(path: &Path, group_by: GroupBy, groups: &[AggregateGroup]) -> ExportResult<()> {
    let file = File::create(path)?;
    write_aggregates(file, group_by, groups)
}

/// 记录表 → CSV 文件
pub fn export_records_to_file<'a, I>(path: &Path, records: I) -> ExportResult<()>
where
    I: IntoIterator<Item = &'a Record>,
{
    let file = File::create(path)?;
    write_records(file, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::IsoDate;

    #[test]
    fn test_aggregates_csv() {
        let groups = vec![AggregateGroup {
            key: "Linea 1".to_string(),
            record_count: 3,
            theoretical: 100.0,
            actual: 110.0,
            waste: 10.0,
            cost: 25.5,
            waste_pct: 9.090909,
            share_pct: 100.0,
            actual_share_pct: 100.0,
        }];
        let csv = aggregates_to_csv_string(GroupBy::Line, &groups).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Línea,Registros,"));
        assert_eq!(
            lines.next().unwrap(),
            "Linea 1,3,100.00,110.00,10.00,25.50,9.09,100.00,100.00"
        );
    }

    #[test]
    fn test_records_csv_quotes_commas() {
        let record = Record {
            order_code: "OPE-1".to_string(),
            material_name: "TAPA 28MM, ROJA".to_string(),
            date: IsoDate::from_ymd(2024, 1, 9),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        export_records_to_file(&path, [&record]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"TAPA 28MM, ROJA\""));
        assert!(content.contains("2024-01-09"));
    }
}
