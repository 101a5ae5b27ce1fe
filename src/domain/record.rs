// ==========================================
// 物料损耗分析引擎 - 消耗记录实体
// ==========================================
// 职责: 定义单条物料消耗记录（Record）与 ISO 日期值对象
// 红线: Record 发布后不可变；分类永不为空（兜底 "Otros"）
// ==========================================

use crate::importer::scalar_parser::parse_date;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 物料名为空时的展示占位
pub const UNNAMED_MATERIAL: &str = "(sin nombre)";

// ==========================================
// IsoDate - 规范化日历日期
// ==========================================

/// 规范化日历日期（无时区，UTC 零点语义）
///
/// 空值哨兵表示源数据日期无法解析；序列化为 `"yyyy-mm-dd"` 或 `""`。
/// 排序时空值排在最前。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoDate(Option<NaiveDate>);

impl IsoDate {
    /// 空值哨兵
    pub const EMPTY: IsoDate = IsoDate(None);

    pub fn new(date: NaiveDate) -> Self {
        Self(Some(date))
    }

    /// 由年月日构造；非法日期返回空值
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, month, day))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// 月份键 `yyyy-mm`
    pub fn month_key(&self) -> Option<String> {
        self.0.map(|d| format!("{:04}-{:02}", d.year(), d.month()))
    }
}

impl From<NaiveDate> for IsoDate {
    fn from(date: NaiveDate) -> Self {
        Self::new(date)
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            None => Ok(()),
        }
    }
}

impl Serialize for IsoDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 反序列化兼容旧版会话的 `d/m/yyyy` 与序列号日期
impl<'de> Deserialize<'de> for IsoDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(parse_date(&text))
    }
}

// ==========================================
// Record - 物料消耗记录
// ==========================================

/// 单条物料消耗记录
///
/// 字段在导入时一次性计算完成：
/// - waste = actual - theoretical（带符号，负值表示节约）
/// - yield_pct / waste_pct 在 actual ≤ 0 时为 0
///
/// 反序列化兼容旧版会话中的西语字段名（CodigoMP / MateriaPrima / ...）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Record {
    // ===== 标识 =====
    #[serde(alias = "Produccion")]
    pub order_code: String,        // 生产订单号（OPE）
    #[serde(alias = "Linea")]
    pub line: String,              // 产线 / 资源
    #[serde(alias = "CodigoMP")]
    pub material_code: String,     // 物料编码
    #[serde(alias = "MateriaPrima")]
    pub material_name: String,     // 物料名称
    #[serde(alias = "CodigoArticulo")]
    pub article_code: String,      // 成品编码
    #[serde(alias = "NombreArticulo")]
    pub article_name: String,      // 成品名称
    #[serde(alias = "Fecha")]
    pub date: IsoDate,             // 生产日期

    // ===== 数量与成本 =====
    #[serde(alias = "CantidadTeorica")]
    pub theoretical: f64,          // 理论用量
    #[serde(alias = "CantidadReal")]
    pub actual: f64,               // 实际用量
    #[serde(alias = "Merma")]
    pub waste: f64,                // 损耗 = 实际 - 理论
    #[serde(alias = "CostoMerma")]
    pub waste_cost: f64,           // 损耗成本
    pub unit_cost: f64,            // 单位成本
    pub units_produced: f64,       // 订单产出箱数

    // ===== 分类 =====
    #[serde(alias = "CategoriaMP")]
    pub category: String,
    #[serde(alias = "SubcategoriaMP")]
    pub subcategory: String,

    // ===== 派生比率 =====
    #[serde(alias = "PctRend")]
    pub yield_pct: f64,
    #[serde(alias = "PctMerma")]
    pub waste_pct: f64,
}

impl Record {
    /// 分组与展示使用的物料标签
    pub fn material_label(&self) -> &str {
        let name = self.material_name.trim();
        if name.is_empty() {
            UNNAMED_MATERIAL
        } else {
            name
        }
    }

    /// 分类所用文本：优先物料名，缺失时退回编码部分
    pub fn classification_text(&self) -> &str {
        if self.material_name.trim().is_empty() {
            &self.material_code
        } else {
            &self.material_name
        }
    }

    /// 按数量重新计算损耗及比率
    pub fn recompute_ratios(&mut self) {
        self.waste = self.actual - self.theoretical;
        self.yield_pct = guarded_pct(self.theoretical, self.actual);
        self.waste_pct = guarded_pct(self.waste, self.actual);
    }
}

/// 受保护的百分比：分母 ≤ 0（或非有限值）时返回 0
pub fn guarded_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() && numerator.is_finite() {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}
