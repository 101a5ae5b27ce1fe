// ==========================================
// 性质测试
// ==========================================
// 测试目标: 损耗率公式、分类幂等、日期往返、筛选单调性、Pareto 累计序列
// ==========================================

mod helpers;

use chrono::NaiveDate;
use helpers::test_data_builder::RecordBuilder;
use merma_engine::config::EngineConfig;
use merma_engine::domain::{AggregateGroup, IsoDate, RankMetric, Record};
use merma_engine::engine::{BuildMeta, DatasetBuilder, FilterEngine, ParetoEngine};
use merma_engine::importer::parse_date;
use merma_engine::taxonomy::{MaterialClassifier, Taxonomy};
use merma_engine::FilterSpec;
use proptest::prelude::*;
use std::sync::Arc;

const LINES: &[&str] = &["Linea 1", "Linea 2", "Linea 3", "CO2"];
const CATEGORIES: &[&str] = &["Azúcar", "Etiquetas", "Preformas PET", "Resinas PET", "Otros"];

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2090, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        0..LINES.len(),
        0..CATEGORIES.len(),
        (2024i32..2026, 1u32..=12, 1u32..=28),
        0.0f64..10_000.0,
        0.0f64..10_000.0,
    )
        .prop_map(|(line, category, (y, m, d), theoretical, actual)| {
            RecordBuilder::new(&format!("MAT {}", category))
                .line(LINES[line])
                .order(&format!("OPE-{}", line))
                .date(y, m, d)
                .quantities(theoretical, actual)
                .category(CATEGORIES[category], "")
                .build()
        })
}

fn serial_of(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    (date - epoch).num_days()
}

proptest! {
    #[test]
    fn prop_waste_pct_formula(theoretical in -1_000.0f64..100_000.0, actual in -1_000.0f64..100_000.0) {
        let record = RecordBuilder::new("X").quantities(theoretical, actual).build();
        prop_assert!((record.waste - (actual - theoretical)).abs() < 1e-9);
        if actual > 0.0 {
            let expected = (actual - theoretical) / actual * 100.0;
            prop_assert!((record.waste_pct - expected).abs() < 1e-6);
        } else {
            prop_assert_eq!(record.waste_pct, 0.0);
            prop_assert_eq!(record.yield_pct, 0.0);
        }
    }

    #[test]
    fn prop_classify_idempotent_and_total(text in "[A-Za-z0-9 áéíóúñ\\-]{0,40}") {
        let taxonomy = Taxonomy::standard().unwrap();
        let first = taxonomy.classify(&text);
        let second = taxonomy.classify(&text);
        prop_assert!(!first.category.is_empty());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_date_round_trip(date in arb_date()) {
        let iso = IsoDate::new(date).to_string();

        prop_assert_eq!(parse_date(&iso).to_string(), iso.clone());
        let slashed = date.format("%d/%m/%Y").to_string();
        prop_assert_eq!(parse_date(&slashed).to_string(), iso.clone());
        let serial = serial_of(date).to_string();
        prop_assert_eq!(parse_date(&serial).to_string(), iso);
    }

    #[test]
    fn prop_filter_monotonic(
        records in prop::collection::vec(arb_record(), 0..60),
        line in 0..LINES.len(),
        category in 0..CATEGORIES.len(),
        month in 1u32..=12,
    ) {
        let dataset = Arc::new(DatasetBuilder::new().build(records, BuildMeta::default()));
        let engine = FilterEngine::new(&EngineConfig::default());

        let base = FilterSpec::new();
        let by_line = base.clone().with_lines([LINES[line]]);
        let by_category = by_line.clone().with_category(CATEGORIES[category]);
        let by_month = by_category.clone().with_month(format!("2024-{:02}", month));
        let comparable = by_month.clone().comparable_only(true);

        let counts: Vec<usize> = [&base, &by_line, &by_category, &by_month, &comparable]
            .iter()
            .map(|spec| engine.apply(&dataset, spec).len())
            .collect();
        prop_assert!(counts.windows(2).all(|w| w[1] <= w[0]), "counts = {:?}", counts);
    }

    #[test]
    fn prop_pareto_cumulative(values in prop::collection::vec(0.01f64..1_000.0, 1..30)) {
        let groups: Vec<AggregateGroup> = values
            .iter()
            .enumerate()
            .map(|(i, v)| AggregateGroup { key: format!("G{:02}", i), waste: *v, ..Default::default() })
            .collect();
        let series = ParetoEngine::with_max_labels(0).rank(&groups, RankMetric::Waste);

        prop_assert!(series.cumulative.windows(2).all(|w| w[1] >= w[0]));
        prop_assert!((series.cumulative.last().unwrap() - 100.0).abs() < 0.01);
        prop_assert!(series.values.windows(2).all(|w| w[1] <= w[0]));
    }
}

#[test]
fn test_pareto_waste_pct_example() {
    let groups: Vec<AggregateGroup> = [("A", 10.0), ("B", 30.0), ("C", 60.0)]
        .iter()
        .map(|(k, pct)| AggregateGroup {
            key: k.to_string(),
            waste_pct: *pct,
            ..Default::default()
        })
        .collect();
    let series = ParetoEngine::with_max_labels(0).rank(&groups, RankMetric::WastePct);
    assert_eq!(series.values, vec![60.0, 30.0, 10.0]);
    assert_eq!(series.cumulative, vec![60.0, 90.0, 100.0]);
    assert_eq!(series.labels, vec!["C", "B", "A"]);
}
