// ==========================================
// 物料损耗分析引擎 - 数据集导入器实现
// ==========================================
// 职责: 整合导入流程，从文件 / 网格到规范化 Record 列表
// 流程: 读取 → 表头定位 → 行归一化（含分类）→ 汇总
// 红线: 单元格级错误不中止整批；仅结构错误（无表头、文件错误）中止
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{reader_for, RawGrid};
use crate::importer::importer_trait::{DatasetImporter, IngestOutcome, IngestProgress};
use crate::importer::row_normalizer::{RowNormalizer, DEFAULT_CHUNK_SIZE};
use crate::perf::PerfGuard;
use crate::taxonomy::MaterialClassifier;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// DatasetImporterImpl - 数据集导入器实现
// ==========================================
pub struct DatasetImporterImpl {
    classifier: Arc<dyn MaterialClassifier>,
    field_mapper: FieldMapper,
    chunk_size: usize,
}

impl DatasetImporterImpl {
    /// 创建导入器
    ///
    /// # 参数
    /// - classifier: 物料分类器
    pub fn new(classifier: Arc<dyn MaterialClassifier>) -> ImportResult<Self> {
        Ok(Self {
            classifier,
            field_mapper: FieldMapper::new()?,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn run(
        &self,
        grid: &RawGrid,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ImportResult<IngestOutcome> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let _perf = PerfGuard::new("ingest_grid");

        // === 步骤 1: 表头定位 ===
        debug!(batch_id = %batch_id, grid_rows = grid.len(), "步骤 1: 表头定位");
        let layout = self.field_mapper.locate(grid).map_err(|e| {
            error!(batch_id = %batch_id, error = %e, "表头定位失败");
            e
        })?;

        // === 步骤 2: 行归一化 + 分类 ===
        debug!(batch_id = %batch_id, header_row = layout.header_row, "步骤 2: 行归一化");
        let (records, stats) = RowNormalizer::new(&layout, self.classifier.as_ref())
            .with_chunk_size(self.chunk_size)
            .normalize(grid, on_progress);

        if stats.soft_field_errors > 0 {
            warn!(
                batch_id = %batch_id,
                soft_field_errors = stats.soft_field_errors,
                "部分单元格无法解析，已按默认值处理"
            );
        }

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            records = records.len(),
            total_rows = stats.total_rows,
            skipped_rows = stats.skipped_rows,
            total_marker_rows = stats.total_marker_rows,
            elapsed_ms,
            "导入完成"
        );

        Ok(IngestOutcome {
            batch_id,
            records,
            total_rows: stats.total_rows,
            skipped_rows: stats.skipped_rows,
            total_marker_rows: stats.total_marker_rows,
            soft_field_errors: stats.soft_field_errors,
            elapsed_ms,
        })
    }
}

impl DatasetImporter for DatasetImporterImpl {
    #[instrument(skip(self, on_progress), fields(file = %file_path.display()))]
    fn ingest_file(
        &self,
        file_path: &Path,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ImportResult<IngestOutcome> {
        info!("开始导入文件");

        // === 步骤 0: 读取首个工作表 ===
        let grid = reader_for(file_path)?.read_grid(file_path).map_err(|e| {
            error!(error = %e, "文件读取失败");
            e
        })?;
        debug!(grid_rows = grid.len(), "文件读取完成");

        self.run(&grid, on_progress)
    }

    fn ingest_grid(
        &self,
        grid: &RawGrid,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ImportResult<IngestOutcome> {
        self.run(grid, on_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::error::ImportError;
    use crate::importer::file_parser::RawCell;
    use crate::taxonomy::Taxonomy;
    use std::io::Write;
    use tempfile::Builder;

    fn importer() -> DatasetImporterImpl {
        DatasetImporterImpl::new(Arc::new(Taxonomy::standard().unwrap())).unwrap()
    }

    #[test]
    fn test_ingest_grid_without_header_fails() {
        let grid = vec![vec![RawCell::from("sin encabezados")]];
        let err = importer().ingest_grid(&grid, None).unwrap_err();
        assert!(matches!(err, ImportError::HeaderNotFound { .. }));
    }

    #[test]
    fn test_ingest_csv_file() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Consumo de materiales,,,,,,").unwrap();
        writeln!(
            file,
            "Articulo + Descripción,Recurso,Código de artículo + nombre,Fecha,Producción,Cantidad teórica,Cantidad real"
        )
        .unwrap();
        writeln!(file, "100 - AZUCAR REFINADA,L1,5 - COCA COLA,2024-01-05,OPE-1,\"1,000.00\",\"1,020.00\"").unwrap();
        writeln!(file, "-,L1,,,,,").unwrap();
        file.flush().unwrap();

        let outcome = importer().ingest_file(file.path(), None).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped_rows, 1);
        assert_eq!(outcome.records[0].waste, 20.0);
        assert_eq!(outcome.records[0].category, "Azúcar");
        assert!(!outcome.batch_id.is_empty());
    }
}
