// ==========================================
// 物料损耗分析引擎 - 文本清洗
// ==========================================
// 职责: 文本归一化（去重音 / 小写 / TRIM）、"编码 - 名称" 拆分、占位符识别
// 红线: 纯函数，无状态
// ==========================================

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 单独出现时视为空值的占位符
const PLACEHOLDERS: &[&str] = &["-", "—", "–", "--"];

/// 归一化文本：NFD 分解 → 去除组合附加符 → 小写 → TRIM
///
/// # 示例
/// - "  Película TERMOENCOGIBLE " → "pelicula termoencogible"
pub fn normalize_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// 忽略大小写与重音的相等比较
pub fn loose_eq(a: &str, b: &str) -> bool {
    normalize_text(a) == normalize_text(b)
}

/// 是否为空值或占位符
pub fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed)
}

/// 按首个 "-" 拆分 "编码 - 名称"
///
/// # 返回
/// - (编码, 名称)，两侧空白已去除
/// - 无分隔符时编码为空，名称为全文
pub fn split_code_name(text: &str) -> (String, String) {
    let trimmed = text.trim();
    match trimmed.split_once('-') {
        Some((code, name)) => (code.trim().to_string(), name.trim().to_string()),
        None => (String::new(), trimmed.to_string()),
    }
}
