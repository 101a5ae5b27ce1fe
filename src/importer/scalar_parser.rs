// ==========================================
// 物料损耗分析引擎 - 标量解析器
// ==========================================
// 职责: 区域格式容错的数值 / 日期解析
// 红线: 永不报错；无法解析的数值为 0，无法解析的日期为空值
// ==========================================

use crate::domain::record::IsoDate;
use crate::importer::file_parser::RawCell;
use chrono::{DateTime, Duration, NaiveDate};

/// 表格日序号的纪元（第 0 天）
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// 合法日序号上限（9999-12-31）
const MAX_SERIAL: i64 = 2_958_465;

/// 兜底日期格式
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y%m%d", "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y"];

// ==========================================
// 数值解析
// ==========================================

/// 解析区域格式数值
///
/// # 规则
/// - 去除货币符号、百分号、空格等非数值字符
/// - `.` 与 `,` 同时出现：最后出现者为小数点
/// - 同一分隔符出现多次：千分位
/// - 仅出现一次：小数点；但 `,` 后恰好 3 位数字视为千分位
///
/// # 示例
/// - "6,042,729.00" → 6042729.00
/// - "1.234,56" → 1234.56
/// - "abc" → 0
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let negative = cleaned.starts_with('-');
    let body: String = cleaned.chars().filter(|c| *c != '-').collect();
    if body.is_empty() {
        return 0.0;
    }

    let normalized = match (body.rfind('.'), body.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            body.replace(thousands, "").replace(decimal, ".")
        }
        (Some(_), None) => single_separator(&body, '.'),
        (None, Some(_)) => single_separator(&body, ','),
        (None, None) => body,
    };

    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v
            } else {
                v
            }
        }
        _ => 0.0,
    }
}

/// 仅含一种分隔符时的判定
fn single_separator(body: &str, sep: char) -> String {
    let count = body.matches(sep).count();
    if count > 1 {
        return body.replace(sep, "");
    }

    let trailing = body
        .rfind(sep)
        .map(|idx| body.len() - idx - 1)
        .unwrap_or(0);
    if sep == ',' && trailing == 3 {
        body.replace(sep, "")
    } else {
        body.replace(sep, ".")
    }
}

/// 解析单元格数值（数值单元格直通，非有限值为 0）
pub fn parse_cell_number(cell: &RawCell) -> f64 {
    match cell {
        RawCell::Number(n) if n.is_finite() => *n,
        RawCell::Number(_) | RawCell::Empty | RawCell::Bool(_) => 0.0,
        RawCell::Text(s) => parse_number(s),
    }
}

/// 单元格是否携带可解析的数值（用于软错误计数）
pub fn is_numeric_cell(cell: &RawCell) -> bool {
    match cell {
        RawCell::Number(n) => n.is_finite(),
        RawCell::Text(s) => s.chars().any(|c| c.is_ascii_digit()),
        RawCell::Empty => true,
        RawCell::Bool(_) => false,
    }
}

// ==========================================
// 日期解析
// ==========================================

/// 日序号 → 日期（小数部分为时刻，截断）
pub fn date_from_serial(serial: f64) -> IsoDate {
    if !serial.is_finite() {
        return IsoDate::EMPTY;
    }
    let days = serial.floor() as i64;
    if !(1..=MAX_SERIAL).contains(&days) {
        return IsoDate::EMPTY;
    }
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(days)))
        .map(IsoDate::new)
        .unwrap_or(IsoDate::EMPTY)
}

/// 解析日期文本
///
/// # 支持格式
/// - 日序号（如 "44927"）
/// - ISO：yyyy-mm-dd / yyyy/mm/dd（可带时刻后缀）
/// - dd/mm/yyyy、dd-mm-yyyy（首段 > 12 必为日；仅次段 > 12 时按月在前处理；两位年份补 20xx）
/// - 兜底：RFC 3339、yyyymmdd、"05 Jan 2024" 等
pub fn parse_date(raw: &str) -> IsoDate {
    let s = raw.trim();
    if s.is_empty() {
        return IsoDate::EMPTY;
    }

    if let Ok(serial) = s.parse::<f64>() {
        let parsed = date_from_serial(serial);
        if !parsed.is_empty() {
            return parsed;
        }
    }

    let date_part = s
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or(s);
    if let Some(date) = parse_delimited(date_part) {
        return IsoDate::new(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return IsoDate::new(dt.date_naive());
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(IsoDate::new)
        .unwrap_or(IsoDate::EMPTY)
}

/// 解析 "a/b/c" 形式的三段日期
fn parse_delimited(text: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = text.split(['/', '-', '.']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let a: u32 = parts[0].parse().ok()?;
    let b: u32 = parts[1].parse().ok()?;
    let c: i32 = parts[2].parse().ok()?;

    if parts[0].len() == 4 {
        // yyyy-mm-dd
        return NaiveDate::from_ymd_opt(a as i32, b, c as u32);
    }

    let year = if parts[2].len() <= 2 { 2000 + c } else { c };
    let (day, month) = if a > 12 {
        (a, b)
    } else if b > 12 {
        (b, a)
    } else {
        (a, b)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 解析单元格日期（数值单元格视为日序号）
pub fn parse_cell_date(cell: &RawCell) -> IsoDate {
    match cell {
        RawCell::Number(n) => date_from_serial(*n),
        RawCell::Text(s) => parse_date(s),
        RawCell::Empty | RawCell::Bool(_) => IsoDate::EMPTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_us_thousands() {
        assert_eq!(parse_number("6,042,729.00"), 6_042_729.00);
    }

    #[test]
    fn test_parse_number_eu_decimal_comma() {
        assert_eq!(parse_number("1.234,56"), 1234.56);
    }

    #[test]
    fn test_parse_number_single_separator() {
        assert_eq!(parse_number("12,5"), 12.5);
        assert_eq!(parse_number("1,234"), 1234.0);
        assert_eq!(parse_number("3.75"), 3.75);
        assert_eq!(parse_number("1.234.567"), 1_234_567.0);
    }

    #[test]
    fn test_parse_number_strips_symbols() {
        assert_eq!(parse_number("$ 1,250.50"), 1250.5);
        assert_eq!(parse_number("-4.5 %"), -4.5);
        assert_eq!(parse_number("  "), 0.0);
        assert_eq!(parse_number("n/a"), 0.0);
        assert_eq!(parse_number("-"), 0.0);
    }

    #[test]
    fn test_parse_cell_number() {
        assert_eq!(parse_cell_number(&RawCell::Number(7.25)), 7.25);
        assert_eq!(parse_cell_number(&RawCell::Number(f64::NAN)), 0.0);
        assert_eq!(parse_cell_number(&RawCell::Empty), 0.0);
        assert_eq!(parse_cell_number(&RawCell::Text("1.234,56".into())), 1234.56);
    }

    #[test]
    fn test_serial_epoch() {
        assert_eq!(date_from_serial(44927.0).to_string(), "2023-01-01");
        assert_eq!(date_from_serial(44927.75).to_string(), "2023-01-01");
        assert!(date_from_serial(0.0).is_empty());
        assert!(date_from_serial(-5.0).is_empty());
        assert!(date_from_serial(3_000_000.0).is_empty());
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("44927").to_string(), "2023-01-01");
        assert_eq!(parse_date("2024-03-15").to_string(), "2024-03-15");
        assert_eq!(parse_date("2024/03/15 00:00:00").to_string(), "2024-03-15");
        assert_eq!(parse_date("15/03/2024").to_string(), "2024-03-15");
        assert_eq!(parse_date("05/03/24").to_string(), "2024-03-05");
        assert_eq!(parse_date("03/15/2024").to_string(), "2024-03-15");
        assert_eq!(parse_date("2024-03-15T10:30:00Z").to_string(), "2024-03-15");
        assert_eq!(parse_date("20240315").to_string(), "2024-03-15");
    }

    #[test]
    fn test_parse_date_invalid_is_empty() {
        assert!(parse_date("").is_empty());
        assert!(parse_date("sin fecha").is_empty());
        assert!(parse_date("31/02/2024").is_empty());
    }

    #[test]
    fn test_parse_cell_date() {
        assert_eq!(parse_cell_date(&RawCell::Number(45292.0)).to_string(), "2024-01-01");
        assert!(parse_cell_date(&RawCell::Bool(true)).is_empty());
    }
}
