// ==========================================
// 物料损耗分析引擎 - 导入 Trait
// ==========================================
// 职责: 定义导入管道各阶段的接口（不包含实现）
// ==========================================

use crate::domain::record::Record;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawGrid;
use std::path::Path;

// ==========================================
// GridReader Trait
// ==========================================
// 用途: 读取文件首个工作表为原始网格
// 实现者: CsvGridReader / WorkbookGridReader
pub trait GridReader {
    /// 读取原始网格
    ///
    /// # 参数
    /// - file_path: 文件路径
    ///
    /// # 返回
    /// - Ok(RawGrid): 首个工作表的全部行（含表头之前的说明行）
    /// - Err: 文件不存在、格式错误等
    fn read_grid(&self, file_path: &Path) -> ImportResult<RawGrid>;
}

/// 导入进度（分块归一化时回调）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestProgress {
    pub processed: usize,
    pub total: usize,
}

/// 导入结果汇总
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub batch_id: String,
    pub records: Vec<Record>,
    /// 网格中表头之后的数据行数
    pub total_rows: usize,
    /// 空描述 / 占位符行
    pub skipped_rows: usize,
    /// 合计行（仅贡献产出箱数）
    pub total_marker_rows: usize,
    /// 解析失败按默认值处理的单元格数
    pub soft_field_errors: usize,
    pub elapsed_ms: u64,
}

// ==========================================
// DatasetImporter Trait
// ==========================================
// 用途: 导入主接口（文件 / 内存网格 → 规范化 Record 列表）
// 实现者: DatasetImporterImpl
pub trait DatasetImporter {
    /// 从文件导入
    ///
    /// # 导入流程
    /// 1. 读取首个工作表
    /// 2. 定位表头并解析列映射
    /// 3. 逐行归一化（拆分、数值/日期解析、合计行回填）
    /// 4. 分类
    fn ingest_file(
        &self,
        file_path: &Path,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ImportResult<IngestOutcome>;

    /// 从内存网格导入
    fn ingest_grid(
        &self,
        grid: &RawGrid,
        on_progress: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> ImportResult<IngestOutcome>;
}
