// ==========================================
// 物料损耗分析引擎 - 聚合引擎
// ==========================================
// 职责: 筛选记录 → 分组聚合 + 全局 KPI
// 规则:
// - 分组损耗率 = 损耗 / 实际 × 100（实际 ≤ 0 时为 0）
// - 组合分类生效时，换算成员的理论 / 实际用量乘以换算系数（成本不换算）
// - 输出按损耗降序，损耗相同按键升序（结果确定）
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::aggregate::{AggregateGroup, GroupBy, Kpis, OrderSummary};
use crate::domain::dataset::FilteredRecords;
use crate::domain::record::{guarded_pct, IsoDate, Record};
use crate::importer::data_cleaner::normalize_text;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Default)]
struct Accumulator {
    record_count: usize,
    theoretical: f64,
    actual: f64,
    cost: f64,
}

impl Accumulator {
    fn add(&mut self, theoretical: f64, actual: f64, cost: f64) {
        self.record_count += 1;
        self.theoretical += theoretical;
        self.actual += actual;
        self.cost += cost;
    }

    fn waste(&self) -> f64 {
        self.actual - self.theoretical
    }
}

// ==========================================
// AggregationEngine
// ==========================================
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    converted_member: String,
    conversion_factor: f64,
}

impl AggregationEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            converted_member: normalize_text(&config.combined_category.converted_member),
            conversion_factor: config.combined_category.conversion_factor,
        }
    }

    /// 记录的数量换算系数
    fn scale_for(&self, record: &Record, combined_active: bool) -> f64 {
        if combined_active && normalize_text(&record.category) == self.converted_member {
            self.conversion_factor
        } else {
            1.0
        }
    }

    /// 换算后的 (理论, 实际, 成本)
    pub(crate) fn scaled(&self, record: &Record, combined_active: bool) -> (f64, f64, f64) {
        let factor = self.scale_for(record, combined_active);
        (record.theoretical * factor, record.actual * factor, record.waste_cost)
    }

    /// 分组聚合
    ///
    /// # 参数
    /// - filtered: 筛选视图
    /// - group_by: 分组维度
    /// - combined_active: 组合分类是否生效
    pub fn aggregate(
        &self,
        filtered: &FilteredRecords,
        group_by: GroupBy,
        combined_active: bool,
    ) -> Vec<AggregateGroup> {
        let mut groups: HashMap<String, Accumulator> = HashMap::new();
        let mut total = Accumulator::default();

        for record in filtered.iter() {
            let (theoretical, actual, cost) = self.scaled(record, combined_active);
            total.add(theoretical, actual, cost);
            groups
                .entry(group_by.key_of(record).into_owned())
                .or_default()
                .add(theoretical, actual, cost);
        }

        let total_waste = total.waste();
        let mut result: Vec<AggregateGroup> = groups
            .into_iter()
            .map(|(key, acc)| {
                let waste = acc.waste();
                AggregateGroup {
                    key,
                    record_count: acc.record_count,
                    theoretical: acc.theoretical,
                    actual: acc.actual,
                    waste,
                    cost: acc.cost,
                    waste_pct: guarded_pct(waste, acc.actual),
                    share_pct: guarded_pct(waste, total_waste),
                    actual_share_pct: guarded_pct(acc.actual, total.actual),
                }
            })
            .collect();

        result.sort_by(|a, b| desc_by(a.waste, b.waste, &a.key, &b.key));
        result
    }

    /// 全局 KPI（与分组使用相同的换算规则）
    pub fn kpis(&self, filtered: &FilteredRecords, combined_active: bool) -> Kpis {
        let mut total = Accumulator::default();
        for record in filtered.iter() {
            let (theoretical, actual, cost) = self.scaled(record, combined_active);
            total.add(theoretical, actual, cost);
        }
        let total_waste = total.waste();
        Kpis {
            total_theoretical: total.theoretical,
            total_actual: total.actual,
            total_waste,
            total_cost: total.cost,
            waste_pct: guarded_pct(total_waste, total.actual),
            record_count: total.record_count,
        }
    }
}

/// 损耗成本最高的分组（"关键产线"视图）
pub fn critical_group(groups: &[AggregateGroup]) -> Option<&AggregateGroup> {
    groups.iter().max_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            // 成本相同取键较小者
            .then_with(|| b.key.cmp(&a.key))
    })
}

// ==========================================
// 订单汇总
// ==========================================

struct OrderAccumulator {
    order_code: String,
    line_counts: Vec<(String, usize)>,
    first_date: IsoDate,
    last_date: IsoDate,
    actual: f64,
    waste: f64,
    record_count: usize,
}

impl OrderAccumulator {
    fn new(order_code: &str) -> Self {
        Self {
            order_code: order_code.to_string(),
            line_counts: Vec::new(),
            first_date: IsoDate::EMPTY,
            last_date: IsoDate::EMPTY,
            actual: 0.0,
            waste: 0.0,
            record_count: 0,
        }
    }

    fn add(&mut self, record: &Record) {
        self.record_count += 1;
        self.actual += record.actual;
        self.waste += record.waste;

        let line = record.line.trim();
        if !line.is_empty() {
            match self.line_counts.iter_mut().find(|(l, _)| l == line) {
                Some((_, count)) => *count += 1,
                None => self.line_counts.push((line.to_string(), 1)),
            }
        }

        if !record.date.is_empty() {
            if self.first_date.is_empty() || record.date < self.first_date {
                self.first_date = record.date;
            }
            if record.date > self.last_date {
                self.last_date = record.date;
            }
        }
    }

    /// 出现次数最多的产线（并列取最先出现者）
    fn dominant_line(&self) -> String {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.line_counts {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(line, _)| line.clone()).unwrap_or_default()
    }
}

/// 按订单汇总（按损耗率降序，相同按订单号升序）
///
/// 订单号为空的记录不参与汇总。
pub fn order_summaries(filtered: &FilteredRecords) -> Vec<OrderSummary> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut accumulators: Vec<OrderAccumulator> = Vec::new();

    for record in filtered.iter() {
        let code = record.order_code.trim();
        if code.is_empty() {
            continue;
        }
        let pos = *positions.entry(code).or_insert_with(|| {
            accumulators.push(OrderAccumulator::new(code));
            accumulators.len() - 1
        });
        accumulators[pos].add(record);
    }

    let dataset = filtered.dataset();
    let mut summaries: Vec<OrderSummary> = accumulators
        .into_iter()
        .map(|acc| OrderSummary {
            line: acc.dominant_line(),
            first_date: acc.first_date,
            last_date: acc.last_date,
            actual: acc.actual,
            waste: acc.waste,
            waste_pct: guarded_pct(acc.waste, acc.actual),
            units_produced: dataset.units_for_order(&acc.order_code).unwrap_or(0.0),
            record_count: acc.record_count,
            order_code: acc.order_code,
        })
        .collect();

    summaries.sort_by(|a, b| desc_by(a.waste_pct, b.waste_pct, &a.order_code, &b.order_code));
    summaries
}

/// 按指标降序比较（相同按键升序）
pub(crate) fn desc_by(a_value: f64, b_value: f64, a_key: &str, b_key: &str) -> Ordering {
    b_value.total_cmp(&a_value).then_with(|| a_key.cmp(b_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::Dataset;
    use crate::domain::record::IsoDate;
    use crate::engine::dataset_builder::{BuildMeta, DatasetBuilder};
    use std::sync::Arc;

    fn record(line: &str, category: &str, theoretical: f64, actual: f64, cost: f64) -> Record {
        let mut r = Record {
            line: line.to_string(),
            category: category.to_string(),
            material_name: format!("MAT {}", line),
            theoretical,
            actual,
            waste_cost: cost,
            date: IsoDate::from_ymd(2024, 1, 1),
            ..Default::default()
        };
        r.recompute_ratios();
        r
    }

    fn view(records: Vec<Record>) -> FilteredRecords {
        let ds: Arc<Dataset> = Arc::new(DatasetBuilder::new().build(records, BuildMeta::default()));
        FilteredRecords::all(ds)
    }

    fn engine() -> AggregationEngine {
        AggregationEngine::new(&EngineConfig::default())
    }

    #[test]
    fn test_group_by_line() {
        let v = view(vec![
            record("L1", "Etiquetas", 100.0, 110.0, 5.0),
            record("L1", "Etiquetas", 50.0, 55.0, 2.0),
            record("L2", "Etiquetas", 100.0, 130.0, 9.0),
        ]);
        let groups = engine().aggregate(&v, GroupBy::Line, false);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "L2");
        assert_eq!(groups[0].waste, 30.0);
        assert_eq!(groups[1].key, "L1");
        assert_eq!(groups[1].record_count, 2);
        assert_eq!(groups[1].waste, 15.0);
        assert!((groups[1].waste_pct - 15.0 / 165.0 * 100.0).abs() < 1e-9);
        assert!((groups[0].share_pct - 30.0 / 45.0 * 100.0).abs() < 1e-9);
        assert_eq!(groups[1].cost, 7.0);
    }

    #[test]
    fn test_ties_sorted_by_key() {
        let v = view(vec![
            record("B", "X", 10.0, 11.0, 0.0),
            record("A", "X", 10.0, 11.0, 0.0),
        ]);
        let keys: Vec<String> = engine()
            .aggregate(&v, GroupBy::Line, false)
            .into_iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_zero_actual_guards_pct() {
        let v = view(vec![record("L1", "X", 5.0, 0.0, 0.0)]);
        let groups = engine().aggregate(&v, GroupBy::Line, false);
        assert_eq!(groups[0].waste_pct, 0.0);
        let kpis = engine().kpis(&v, false);
        assert_eq!(kpis.waste_pct, 0.0);
        assert_eq!(kpis.total_waste, -5.0);
    }

    #[test]
    fn test_combined_scales_converted_member_only() {
        let v = view(vec![
            record("L1", "Preformas PET", 1000.0, 1010.0, 3.0),
            record("L1", "Resinas PET", 18.5, 37.0, 4.0),
        ]);
        let plain = engine().kpis(&v, false);
        assert!((plain.total_actual - 1047.0).abs() < 1e-9);

        let combined = engine().kpis(&v, true);
        // 18.5 kg → 1000 件；37 kg → 2000 件
        assert!((combined.total_theoretical - 2000.0).abs() < 1e-9);
        assert!((combined.total_actual - 3010.0).abs() < 1e-9);
        assert!((combined.total_waste - 1010.0).abs() < 1e-9);
        assert_eq!(combined.total_cost, 7.0);
    }

    #[test]
    fn test_critical_group_by_cost() {
        let v = view(vec![
            record("L1", "X", 10.0, 11.0, 50.0),
            record("L2", "X", 10.0, 20.0, 10.0),
        ]);
        let groups = engine().aggregate(&v, GroupBy::Line, false);
        assert_eq!(critical_group(&groups).unwrap().key, "L1");
        assert!(critical_group(&[]).is_none());
    }

    #[test]
    fn test_order_summaries() {
        let mut a1 = record("L2", "X", 100.0, 110.0, 0.0);
        a1.order_code = "OPE-1".to_string();
        a1.units_produced = 480.0;
        a1.date = IsoDate::from_ymd(2024, 1, 3);
        let mut a2 = record("L1", "X", 100.0, 101.0, 0.0);
        a2.order_code = "OPE-1".to_string();
        a2.date = IsoDate::from_ymd(2024, 1, 5);
        let mut a3 = record("L1", "X", 50.0, 50.0, 0.0);
        a3.order_code = "OPE-1".to_string();
        a3.date = IsoDate::from_ymd(2024, 1, 4);
        let mut b = record("L3", "X", 10.0, 20.0, 0.0);
        b.order_code = "OPE-2".to_string();
        let orphan = record("L9", "X", 1.0, 2.0, 0.0);

        let v = view(vec![a1, a2, a3, b, orphan]);
        let summaries = order_summaries(&v);
        assert_eq!(summaries.len(), 2);
        // OPE-2 损耗率 50% 排在前
        assert_eq!(summaries[0].order_code, "OPE-2");

        let ope1 = &summaries[1];
        assert_eq!(ope1.line, "L1");
        assert_eq!(ope1.first_date, IsoDate::from_ymd(2024, 1, 3));
        assert_eq!(ope1.last_date, IsoDate::from_ymd(2024, 1, 5));
        assert_eq!(ope1.waste, 11.0);
        assert_eq!(ope1.record_count, 3);
        assert_eq!(ope1.units_produced, 480.0);
    }

    #[test]
    fn test_order_line_tie_takes_first_seen() {
        let mut a = record("L2", "X", 1.0, 1.0, 0.0);
        a.order_code = "OPE-9".to_string();
        let mut b = record("L1", "X", 1.0, 1.0, 0.0);
        b.order_code = "OPE-9".to_string();
        let summaries = order_summaries(&view(vec![a, b]));
        assert_eq!(summaries[0].line, "L2");
    }

    #[test]
    fn test_kpis_sum_matches_groups() {
        let v = view(vec![
            record("L1", "X", 10.0, 12.0, 1.0),
            record("L2", "Y", 20.0, 21.0, 2.0),
            record("L3", "Y", 30.0, 29.0, 3.0),
        ]);
        let kpis = engine().kpis(&v, false);
        let groups = engine().aggregate(&v, GroupBy::Category, false);
        let waste_sum: f64 = groups.iter().map(|g| g.waste).sum();
        assert!((kpis.total_waste - waste_sum).abs() < 1e-9);
        assert_eq!(kpis.record_count, 3);
    }
}
