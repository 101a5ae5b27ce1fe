// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use merma_engine::domain::record::{IsoDate, Record};
use merma_engine::importer::{RawCell, RawGrid};
use std::io::Write;
use std::path::Path;

// ==========================================
// Record 构建器
// ==========================================

pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(material_name: &str) -> Self {
        Self {
            record: Record {
                material_name: material_name.to_string(),
                category: "Otros".to_string(),
                subcategory: "Otros".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn line(mut self, line: &str) -> Self {
        self.record.line = line.to_string();
        self
    }

    pub fn order(mut self, order_code: &str) -> Self {
        self.record.order_code = order_code.to_string();
        self
    }

    pub fn date(mut self, year: i32, month: u32, day: u32) -> Self {
        self.record.date = IsoDate::from_ymd(year, month, day);
        self
    }

    pub fn quantities(mut self, theoretical: f64, actual: f64) -> Self {
        self.record.theoretical = theoretical;
        self.record.actual = actual;
        self
    }

    pub fn cost(mut self, waste_cost: f64) -> Self {
        self.record.waste_cost = waste_cost;
        self
    }

    pub fn units(mut self, units: f64) -> Self {
        self.record.units_produced = units;
        self
    }

    pub fn category(mut self, category: &str, subcategory: &str) -> Self {
        self.record.category = category.to_string();
        self.record.subcategory = subcategory.to_string();
        self
    }

    pub fn build(mut self) -> Record {
        self.record.recompute_ratios();
        self.record
    }
}

// ==========================================
// 原始网格构建器（模拟工作表）
// ==========================================

/// 标准表头（含说明行之后的位置）
pub const STANDARD_HEADER: &[&str] = &[
    "Articulo + Descripción",
    "Recurso",
    "Código de artículo + nombre",
    "Fecha",
    "Producción",
    "Cajas Producidas",
    "Cantidad teórica",
    "Cantidad real",
    "Costo merma",
];

pub struct GridBuilder {
    rows: Vec<Vec<String>>,
}

impl Default for GridBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GridBuilder {
    /// 以一行说明文字 + 标准表头开始
    pub fn new() -> Self {
        Self {
            rows: vec![
                vec!["Consumo de materiales por orden".to_string()],
                STANDARD_HEADER.iter().map(|s| s.to_string()).collect(),
            ],
        }
    }

    /// 追加数据行
    ///
    /// 列顺序与 STANDARD_HEADER 一致
    #[allow(clippy::too_many_arguments)]
    pub fn row(
        mut self,
        material: &str,
        line: &str,
        article: &str,
        date: &str,
        order: &str,
        units: &str,
        theoretical: &str,
        actual: &str,
        cost: &str,
    ) -> Self {
        self.rows.push(
            [material, line, article, date, order, units, theoretical, actual, cost]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        self
    }

    /// 追加任意行（占位符 / 合计行）
    pub fn raw_row(mut self, cells: &[&str]) -> Self {
        self.rows.push(cells.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(&self) -> RawGrid {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| RawCell::from(c.as_str())).collect())
            .collect()
    }

    /// 写出为 CSV 文件
    pub fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = csv_writer(path)?;
        for row in &self.rows {
            let line = row.iter().map(|c| quote(c)).collect::<Vec<_>>().join(",");
            writeln!(writer, "{}", line)?;
        }
        writer.flush()
    }
}

fn csv_writer(path: &Path) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
    Ok(std::io::BufWriter::new(std::fs::File::create(path)?))
}

fn quote(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// 示例工作表：两条产线、三种物料、两个订单、一个占位行、一个合计行
pub fn sample_grid() -> GridBuilder {
    GridBuilder::new()
        .row("100 - AZUCAR REFINADA", "Linea 1", "5 - COCA COLA 600ML", "2024-01-05", "OPE-1", "", "1,000.00", "1,020.00", "")
        .row("200 - PREFORMA 28MM ALPLA", "Linea 1", "5 - COCA COLA 600ML", "2024-01-05", "OPE-1", "", "500", "510", "35.5")
        .row("300 - ETIQUETA COCA COLA", "Linea 2", "7 - SPRITE 2L", "2024-01-20", "OPE-2", "", "200", "190", "")
        .raw_row(&["-", "Linea 2", "", "", "", "", "", "", ""])
        .raw_row(&["Total", "", "", "", "OPE-2", "1200", "", "", ""])
}
