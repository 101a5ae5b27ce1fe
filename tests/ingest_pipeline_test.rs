// ==========================================
// 导入管道集成测试
// ==========================================
// 测试目标: 文件 / 网格 → 规范化记录 → 数据集 → 快照
// ==========================================

mod helpers;

use helpers::memory_api;
use helpers::test_data_builder::{sample_grid, GridBuilder};
use merma_engine::api::ApiError;
use merma_engine::i18n;
use merma_engine::importer::{parse_date, parse_number, ImportError, IngestProgress};
use merma_engine::logging;
use merma_engine::taxonomy::{MaterialClassifier, Taxonomy};
use tempfile::Builder;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_scalar_examples() {
    assert!(approx(parse_number("6,042,729.00"), 6_042_729.00));
    assert!(approx(parse_number("1.234,56"), 1_234.56));
    assert_eq!(parse_date("44927").to_string(), "2023-01-01");
}

#[test]
fn test_preform_classification() {
    let taxonomy = Taxonomy::standard().unwrap();
    let c = taxonomy.classify("PREFORMA 28MM ALPLA");
    assert_eq!(c.category, "Preformas PET");
    assert_eq!(c.subcategory, "Proveedor / Maquila");
}

#[test]
fn test_ingest_sample_grid() -> anyhow::Result<()> {
    logging::init_test();
    let (api, _store) = memory_api();

    let report = api.ingest_grid(&sample_grid().build(), "consumo_enero.xlsx", None)?;
    assert_eq!(report.records, 3);
    assert_eq!(report.total_rows, 5);
    assert_eq!(report.skipped_rows, 1);
    assert_eq!(report.total_marker_rows, 1);
    assert_eq!(report.soft_field_errors, 0);
    assert!(report.persisted);

    let records = api.all_records();
    // 按日期升序
    let dates: Vec<String> = records.iter().map(|r| r.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-05", "2024-01-05", "2024-01-20"]);

    let sugar = &records[0];
    assert_eq!(sugar.material_code, "100");
    assert_eq!(sugar.material_name, "AZUCAR REFINADA");
    assert_eq!(sugar.article_code, "5");
    assert_eq!(sugar.category, "Azúcar");
    assert!(approx(sugar.waste, 20.0));

    let preform = &records[1];
    assert_eq!(preform.category, "Preformas PET");
    assert!(approx(preform.waste_cost, 35.5));

    // 合计行回填产出箱数
    let label = &records[2];
    assert_eq!(label.order_code, "OPE-2");
    assert!(approx(label.units_produced, 1200.0));
    assert!(approx(label.waste, -10.0));
    assert_eq!(api.dataset().units_for_order("OPE-2"), Some(1200.0));

    // 每条记录恰有一个非空分类
    assert!(records.iter().all(|r| !r.category.is_empty()));
    Ok(())
}

#[test]
fn test_ingest_csv_file_with_progress() -> anyhow::Result<()> {
    let file = Builder::new().suffix(".csv").tempfile()?;
    sample_grid().write_csv(file.path())?;

    let (api, _store) = memory_api();
    let mut events: Vec<IngestProgress> = Vec::new();
    let on_progress: &mut dyn FnMut(IngestProgress) = &mut |p: IngestProgress| events.push(p);
    let report = api.ingest_file(file.path(), Some(on_progress))?;

    assert_eq!(report.records, 3);
    assert!(report.filename.ends_with(".csv"));
    let last = events.last().copied().unwrap();
    assert_eq!(last.processed, last.total);
    Ok(())
}

#[test]
fn test_negative_waste_example() {
    let (api, _store) = memory_api();
    let grid = GridBuilder::new()
        .row("10 - ETIQUETA SPRITE", "Linea 1", "1 - SPRITE", "2024-02-01", "OPE-9", "", "100", "90", "")
        .build();
    assert!(api.ingest_grid(&grid, "x.xlsx", None).unwrap().persisted);

    let records = api.all_records();
    let record = &records[0];
    assert!(approx(record.waste, -10.0));
    assert!((record.waste_pct - (-11.11)).abs() < 0.01);
}

#[test]
fn test_missing_header_aborts_with_localized_message() {
    let (api, _store) = memory_api();
    assert!(api.ingest_grid(&sample_grid().build(), "ok.xlsx", None).unwrap().persisted);
    let version = api.dataset().version();

    let grid = GridBuilder::new().build();
    let bad: Vec<_> = grid.into_iter().take(1).collect();
    let err = api.ingest_grid(&bad, "bad.xlsx", None).unwrap_err();

    assert!(matches!(err, ApiError::Import(ImportError::HeaderNotFound { .. })));
    assert!(err.is_malformed_input());
    assert_eq!(api.dataset().version(), version);

    i18n::set_locale("es");
    assert!(!err.user_message().is_empty());
}

#[test]
fn test_missing_file_is_malformed_input() {
    let (api, _store) = memory_api();
    let err = api
        .ingest_file(std::path::Path::new("/no/existe/consumo.xlsx"), None)
        .unwrap_err();
    assert!(err.is_malformed_input());
}

#[test]
fn test_soft_field_errors_do_not_abort() {
    let (api, _store) = memory_api();
    let grid = GridBuilder::new()
        .row("1 - AZUCAR", "Linea 1", "1 - X", "no es fecha", "OPE-1", "", "abc", "10", "")
        .build();
    let report = api.ingest_grid(&grid, "x.xlsx", None).unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(report.soft_field_errors, 2);
    let records = api.all_records();
    let record = &records[0];
    assert!(record.date.is_empty());
    assert!(approx(record.theoretical, 0.0));
    assert!(approx(record.waste, 10.0));
}
