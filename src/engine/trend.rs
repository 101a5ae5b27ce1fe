// ==========================================
// 物料损耗分析引擎 - 趋势序列
// ==========================================
// 职责: 筛选记录 → 按时间桶的损耗率序列 / 每日损耗成本序列
// 规则:
// - 筛选跨度超过阈值天数（默认 93）时按月分桶，否则按日
// - 可按产线拆分，最多 N 条序列（产线排序后截取），全零序列丢弃
// - 纵轴下限 nice_floor(min(值, 目标))，上限 nice_ceil(max(值, 目标))
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::dataset::FilteredRecords;
use crate::domain::record::{guarded_pct, Record};
use crate::engine::aggregation::AggregationEngine;
use crate::engine::pareto::{nice_ceil, nice_ceil_magnitude, nice_floor, round2};
use crate::importer::data_cleaner::normalize_text;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// 合并序列的标签
pub const COMBINED_SERIES_LABEL: &str = "Conjunto";

/// 时间桶粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketScale {
    Day,
    Month,
}

/// 单条损耗率序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeries {
    pub label: String,
    /// 与 buckets 一一对应的损耗率（%，两位小数）
    pub values: Vec<f64>,
    /// 与 buckets 一一对应的订单号
    pub order_codes: Vec<Vec<String>>,
}

/// 损耗率趋势图数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendChart {
    pub scale: BucketScale,
    pub buckets: Vec<String>,
    pub series: Vec<TrendSeries>,
    pub target_pct: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// 每日损耗成本序列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSeries {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    pub axis_max: f64,
}

#[derive(Default)]
struct BucketAcc<'a> {
    theoretical: f64,
    actual: f64,
    orders: BTreeSet<&'a str>,
}

// ==========================================
// TrendEngine
// ==========================================
pub struct TrendEngine {
    aggregation: AggregationEngine,
    month_threshold_days: i64,
    max_series: usize,
    target_pct: f64,
}

impl TrendEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            aggregation: AggregationEngine::new(config),
            month_threshold_days: config.month_bucket_threshold_days,
            max_series: config.max_trend_series,
            target_pct: config.waste_target_pct,
        }
    }

    /// 根据日期跨度选择分桶粒度
    pub fn bucket_scale(&self, filtered: &FilteredRecords) -> BucketScale {
        let mut dates = filtered.iter().filter_map(|r| r.date.date());
        let Some(first) = dates.next() else {
            return BucketScale::Day;
        };
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        if (max - min).num_days() > self.month_threshold_days {
            BucketScale::Month
        } else {
            BucketScale::Day
        }
    }

    /// 损耗率趋势
    ///
    /// # 参数
    /// - filtered: 筛选视图
    /// - split_by_line: 是否按产线拆分序列
    /// - combined_active: 组合分类是否生效（影响数量换算）
    pub fn waste_trend(&self, filtered: &FilteredRecords, split_by_line: bool, combined_active: bool) -> TrendChart {
        let scale = self.bucket_scale(filtered);
        let keyed: Vec<(&Record, String)> = filtered
            .iter()
            .filter_map(|r| bucket_key(scale, r).map(|k| (r, k)))
            .collect();
        let buckets: Vec<String> = keyed
            .iter()
            .map(|(_, k)| k.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let series: Vec<TrendSeries> = if split_by_line {
            let mut lines: Vec<&str> = keyed
                .iter()
                .map(|(r, _)| r.line.trim())
                .filter(|l| !l.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            lines.sort_by_key(|l| (normalize_text(l), l.to_string()));
            lines.truncate(self.max_series);

            lines
                .into_iter()
                .map(|line| self.series_for(line, &keyed, &buckets, combined_active, |r| r.line.trim() == line))
                .filter(|s| s.values.iter().any(|v| v.abs() > 1e-9))
                .collect()
        } else {
            vec![self.series_for(COMBINED_SERIES_LABEL, &keyed, &buckets, combined_active, |_| true)]
        };

        let values = series.iter().flat_map(|s| s.values.iter().copied());
        let (min, max) = values.fold((self.target_pct, self.target_pct), |(lo, hi), v| (lo.min(v), hi.max(v)));

        debug!(
            scale = ?scale,
            buckets = buckets.len(),
            series = series.len(),
            "趋势序列生成完成"
        );

        TrendChart {
            scale,
            buckets,
            series,
            target_pct: self.target_pct,
            y_min: nice_floor(min),
            y_max: nice_ceil(max),
        }
    }

    fn series_for<'a>(
        &self,
        label: &str,
        keyed: &[(&'a Record, String)],
        buckets: &[String],
        combined_active: bool,
        include: impl Fn(&Record) -> bool,
    ) -> TrendSeries {
        let mut accs: HashMap<&str, BucketAcc<'a>> = HashMap::new();
        for (record, key) in keyed {
            let record: &'a Record = record;
            if !include(record) {
                continue;
            }
            let (theoretical, actual, _) = self.aggregation.scaled(record, combined_active);
            let acc = accs.entry(key.as_str()).or_default();
            acc.theoretical += theoretical;
            acc.actual += actual;
            let order = record.order_code.trim();
            if !order.is_empty() {
                acc.orders.insert(order);
            }
        }

        let mut values = Vec::with_capacity(buckets.len());
        let mut order_codes: Vec<Vec<String>> = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            match accs.get(bucket.as_str()) {
                Some(acc) => {
                    values.push(round2(guarded_pct(acc.actual - acc.theoretical, acc.actual)));
                    order_codes.push(acc.orders.iter().map(|o| o.to_string()).collect());
                }
                None => {
                    values.push(0.0);
                    order_codes.push(Vec::new());
                }
            }
        }

        TrendSeries {
            label: label.to_string(),
            values,
            order_codes,
        }
    }

    /// 每日损耗成本（无日期的记录不计入）
    pub fn daily_cost(&self, filtered: &FilteredRecords) -> CostSeries {
        let mut by_day: BTreeMap<String, f64> = BTreeMap::new();
        for record in filtered.iter() {
            if let Some(key) = bucket_key(BucketScale::Day, record) {
                *by_day.entry(key).or_insert(0.0) += record.waste_cost;
            }
        }
        let max = by_day.values().copied().fold(0.0_f64, f64::max);
        let (dates, values): (Vec<String>, Vec<f64>) = by_day.into_iter().unzip();
        CostSeries {
            dates,
            values,
            axis_max: nice_ceil_magnitude(max),
        }
    }
}

fn bucket_key(scale: BucketScale, record: &Record) -> Option<String> {
    if record.date.is_empty() {
        return None;
    }
    match scale {
        BucketScale::Day => Some(record.date.to_string()),
        BucketScale::Month => record.date.month_key(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::Dataset;
    use crate::domain::record::IsoDate;
    use crate::engine::dataset_builder::{BuildMeta, DatasetBuilder};
    use std::sync::Arc;

    fn record(line: &str, order: &str, date: IsoDate, theoretical: f64, actual: f64, cost: f64) -> Record {
        let mut r = Record {
            line: line.to_string(),
            order_code: order.to_string(),
            category: "Etiquetas".to_string(),
            date,
            theoretical,
            actual,
            waste_cost: cost,
            ..Default::default()
        };
        r.recompute_ratios();
        r
    }

    fn view(records: Vec<Record>) -> FilteredRecords {
        let ds: Arc<Dataset> = Arc::new(DatasetBuilder::new().build(records, BuildMeta::default()));
        FilteredRecords::all(ds)
    }

    fn engine() -> TrendEngine {
        TrendEngine::new(&EngineConfig::default())
    }

    #[test]
    fn test_daily_buckets_combined_series() {
        let v = view(vec![
            record("L1", "OPE-1", IsoDate::from_ymd(2024, 1, 1), 90.0, 100.0, 1.0),
            record("L2", "OPE-2", IsoDate::from_ymd(2024, 1, 1), 100.0, 100.0, 2.0),
            record("L1", "OPE-3", IsoDate::from_ymd(2024, 1, 2), 97.0, 100.0, 3.0),
            record("L1", "", IsoDate::EMPTY, 0.0, 50.0, 4.0),
        ]);
        let chart = engine().waste_trend(&v, false, false);
        assert_eq!(chart.scale, BucketScale::Day);
        assert_eq!(chart.buckets, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].label, COMBINED_SERIES_LABEL);
        assert_eq!(chart.series[0].values, vec![5.0, 3.0]);
        assert_eq!(chart.series[0].order_codes[0], vec!["OPE-1", "OPE-2"]);
        assert_eq!(chart.y_min, 2.0);
        assert_eq!(chart.y_max, 5.0);
    }

    #[test]
    fn test_month_buckets_beyond_threshold() {
        let v = view(vec![
            record("L1", "A", IsoDate::from_ymd(2024, 1, 1), 90.0, 100.0, 0.0),
            record("L1", "B", IsoDate::from_ymd(2024, 6, 1), 90.0, 100.0, 0.0),
        ]);
        let chart = engine().waste_trend(&v, false, false);
        assert_eq!(chart.scale, BucketScale::Month);
        assert_eq!(chart.buckets, vec!["2024-01", "2024-06"]);
    }

    #[test]
    fn test_split_by_line_drops_flat_series() {
        let v = view(vec![
            record("Linea 2", "A", IsoDate::from_ymd(2024, 1, 1), 90.0, 100.0, 0.0),
            record("Linea 1", "B", IsoDate::from_ymd(2024, 1, 1), 80.0, 100.0, 0.0),
            record("Linea 3", "C", IsoDate::from_ymd(2024, 1, 2), 100.0, 100.0, 0.0),
        ]);
        let chart = engine().waste_trend(&v, true, false);
        let labels: Vec<&str> = chart.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Linea 1", "Linea 2"]);
        assert_eq!(chart.series[0].values, vec![20.0, 0.0]);
        assert_eq!(chart.y_max, 20.0);
    }

    #[test]
    fn test_split_caps_series_count() {
        let records: Vec<Record> = (0..12)
            .map(|i| record(&format!("L{:02}", i), "A", IsoDate::from_ymd(2024, 1, 1), 90.0, 100.0, 0.0))
            .collect();
        let chart = engine().waste_trend(&view(records), true, false);
        assert_eq!(chart.series.len(), 10);
        assert_eq!(chart.series[0].label, "L00");
    }

    #[test]
    fn test_empty_view_uses_target_bounds() {
        let chart = engine().waste_trend(&view(Vec::new()), false, false);
        assert!(chart.buckets.is_empty());
        assert_eq!(chart.y_min, 2.0);
        assert_eq!(chart.y_max, 2.0);
    }

    #[test]
    fn test_daily_cost_series() {
        let v = view(vec![
            record("L1", "A", IsoDate::from_ymd(2024, 1, 2), 0.0, 0.0, 400.0),
            record("L1", "B", IsoDate::from_ymd(2024, 1, 1), 0.0, 0.0, 100.0),
            record("L1", "C", IsoDate::from_ymd(2024, 1, 2), 0.0, 0.0, 900.0),
            record("L1", "D", IsoDate::EMPTY, 0.0, 0.0, 50.0),
        ]);
        let series = engine().daily_cost(&v);
        assert_eq!(series.dates, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(series.values, vec![100.0, 1300.0]);
        assert_eq!(series.axis_max, 2000.0);
    }
}
