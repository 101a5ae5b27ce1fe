// ==========================================
// 物料损耗分析引擎 - 帕累托排名
// ==========================================
// 职责: 聚合分组 → 降序排名 + 累计占比 + 坐标轴上限
// 规则:
// - 超过最大标签数时只保留前 N 个，累计占比相对于截断后的合计
// - 累计占比封顶 100，保留两位小数；合计 ≤ 0 时为 0
// - 损耗 / 损耗率使用分段取整上限，成本使用 1-2-5 数量级上限
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::aggregate::{AggregateGroup, RankMetric};
use crate::engine::aggregation::desc_by;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 帕累托序列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParetoSeries {
    pub metric: RankMetric,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// 累计占比（%）
    pub cumulative: Vec<f64>,
    pub axis_max: f64,
    /// 截断后（显示部分）的指标合计
    pub displayed_total: f64,
    /// 全部分组的指标合计
    pub grand_total: f64,
    pub truncated: bool,
}

impl ParetoSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ==========================================
// ParetoEngine
// ==========================================
pub struct ParetoEngine {
    max_labels: usize,
}

impl ParetoEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_labels: config.max_pareto_labels,
        }
    }

    /// 最大标签数为 0 时不截断
    pub fn with_max_labels(max_labels: usize) -> Self {
        Self { max_labels }
    }

    /// 生成帕累托序列
    ///
    /// # 参数
    /// - groups: 聚合分组（任意顺序）
    /// - metric: 排名指标
    pub fn rank(&self, groups: &[AggregateGroup], metric: RankMetric) -> ParetoSeries {
        let mut ranked: Vec<(&str, f64)> = groups
            .iter()
            .map(|g| (g.key.as_str(), metric.value_of(g)))
            .collect();
        ranked.sort_by(|a, b| desc_by(a.1, b.1, a.0, b.0));

        let grand_total: f64 = ranked.iter().map(|(_, v)| v).sum();
        let truncated = self.max_labels > 0 && ranked.len() > self.max_labels;
        if truncated {
            ranked.truncate(self.max_labels);
        }
        let displayed_total: f64 = ranked.iter().map(|(_, v)| v).sum();

        let mut running = 0.0;
        let mut labels = Vec::with_capacity(ranked.len());
        let mut values = Vec::with_capacity(ranked.len());
        let mut cumulative = Vec::with_capacity(ranked.len());
        for (label, value) in ranked {
            running += value;
            labels.push(label.to_string());
            values.push(value);
            cumulative.push(if displayed_total > 0.0 {
                round2((running / displayed_total * 100.0).min(100.0))
            } else {
                0.0
            });
        }

        let axis_max = match metric {
            RankMetric::Cost => {
                let max_bar = values.iter().copied().fold(0.0_f64, f64::max);
                nice_ceil_magnitude(max_bar)
            }
            RankMetric::Waste | RankMetric::WastePct => nice_ceil(displayed_total),
        };

        debug!(
            metric = ?metric,
            groups = groups.len(),
            shown = labels.len(),
            truncated,
            "帕累托序列生成完成"
        );

        ParetoSeries {
            metric,
            labels,
            values,
            cumulative,
            axis_max,
            displayed_total,
            grand_total,
            truncated,
        }
    }
}

// ==========================================
// 坐标轴取整
// ==========================================

/// 四舍五入到两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 分段向上取整（<5 步长 0.5，<10 步长 1，<20 步长 2，<50 步长 5，其余步长 10）
///
/// 非正数或非有限值返回 1。
pub fn nice_ceil(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 1.0;
    }
    stepped(value, f64::ceil)
}

/// 分段向下取整（负数按绝对值向上取整后取负）
///
/// 非有限值返回 0。
pub fn nice_floor(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if value < 0.0 {
        return -stepped(value.abs(), f64::ceil);
    }
    stepped(value, f64::floor)
}

fn stepped(value: f64, round: fn(f64) -> f64) -> f64 {
    let step = if value < 5.0 {
        0.5
    } else if value < 10.0 {
        1.0
    } else if value < 20.0 {
        2.0
    } else if value < 50.0 {
        5.0
    } else {
        10.0
    };
    round(value / step) * step
}

/// 1-2-5 数量级向上取整（成本坐标轴）
///
/// 非正数返回 1。
pub fn nice_ceil_magnitude(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 1.0;
    }
    let exponent = value.log10().floor() as i32;
    let base = 10f64.powi((exponent - 1).max(0));
    let scaled = (value / base).ceil();
    let step = [1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]
        .into_iter()
        .find(|s| *s >= scaled)
        .unwrap_or(scaled);
    step * base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: &str, waste: f64, waste_pct: f64, cost: f64) -> AggregateGroup {
        AggregateGroup {
            key: key.to_string(),
            waste,
            waste_pct,
            cost,
            ..Default::default()
        }
    }

    #[test]
    fn test_waste_pct_ranking() {
        let groups = vec![group("A", 0.0, 10.0, 0.0), group("B", 0.0, 30.0, 0.0), group("C", 0.0, 60.0, 0.0)];
        let series = ParetoEngine::with_max_labels(40).rank(&groups, RankMetric::WastePct);
        assert_eq!(series.values, vec![60.0, 30.0, 10.0]);
        assert_eq!(series.labels, vec!["C", "B", "A"]);
        assert_eq!(series.cumulative, vec![60.0, 90.0, 100.0]);
        assert_eq!(series.axis_max, 100.0);
        assert!(!series.truncated);
    }

    #[test]
    fn test_truncation_uses_displayed_total() {
        let groups: Vec<AggregateGroup> = (0..5)
            .map(|i| group(&format!("G{}", i), (i + 1) as f64, 0.0, 0.0))
            .collect();
        let series = ParetoEngine::with_max_labels(2).rank(&groups, RankMetric::Waste);
        assert!(series.truncated);
        assert_eq!(series.values, vec![5.0, 4.0]);
        assert_eq!(series.displayed_total, 9.0);
        assert_eq!(series.grand_total, 15.0);
        assert_eq!(series.cumulative, vec![55.56, 100.0]);
        assert_eq!(series.axis_max, 9.0);
    }

    #[test]
    fn test_non_positive_total() {
        let groups = vec![group("A", -3.0, 0.0, 0.0), group("B", 0.0, 0.0, 0.0)];
        let series = ParetoEngine::with_max_labels(40).rank(&groups, RankMetric::Waste);
        assert_eq!(series.cumulative, vec![0.0, 0.0]);
        assert_eq!(series.axis_max, 1.0);
    }

    #[test]
    fn test_ties_sorted_by_key() {
        let groups = vec![group("Z", 1.0, 0.0, 0.0), group("A", 1.0, 0.0, 0.0)];
        let series = ParetoEngine::with_max_labels(0).rank(&groups, RankMetric::Waste);
        assert_eq!(series.labels, vec!["A", "Z"]);
    }

    #[test]
    fn test_cost_axis_uses_largest_bar() {
        let groups = vec![group("A", 0.0, 0.0, 1234.0), group("B", 0.0, 0.0, 300.0)];
        let series = ParetoEngine::with_max_labels(40).rank(&groups, RankMetric::Cost);
        assert_eq!(series.axis_max, 2000.0);
    }

    #[test]
    fn test_nice_ceil_steps() {
        assert_eq!(nice_ceil(0.0), 1.0);
        assert_eq!(nice_ceil(-4.0), 1.0);
        assert_eq!(nice_ceil(3.2), 3.5);
        assert_eq!(nice_ceil(7.1), 8.0);
        assert_eq!(nice_ceil(13.0), 14.0);
        assert_eq!(nice_ceil(41.0), 45.0);
        assert_eq!(nice_ceil(101.0), 110.0);
    }

    #[test]
    fn test_nice_floor_steps() {
        assert_eq!(nice_floor(3.2), 3.0);
        assert_eq!(nice_floor(1.9), 1.5);
        assert_eq!(nice_floor(13.0), 12.0);
        assert_eq!(nice_floor(-0.3), -0.5);
        assert_eq!(nice_floor(-12.5), -14.0);
        assert_eq!(nice_floor(f64::NAN), 0.0);
    }

    #[test]
    fn test_nice_ceil_magnitude() {
        assert_eq!(nice_ceil_magnitude(0.0), 1.0);
        assert_eq!(nice_ceil_magnitude(7.0), 10.0);
        assert_eq!(nice_ceil_magnitude(45.0), 50.0);
        assert_eq!(nice_ceil_magnitude(1234.0), 2000.0);
        assert_eq!(nice_ceil_magnitude(15_500.0), 20_000.0);
    }
}
