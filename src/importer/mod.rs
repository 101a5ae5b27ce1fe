// ==========================================
// 物料损耗分析引擎 - 导入层
// ==========================================
// 职责: 表格文件 → 规范化、已分类的 Record 列表
// 阶段: 读取 → 表头定位 → 标量解析 → 行归一化 → 分类
// ==========================================

pub mod data_cleaner;
pub mod dataset_importer;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod row_normalizer;
pub mod scalar_parser;

pub use dataset_importer::DatasetImporterImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{ColumnMap, FieldMapper, HeaderLayout};
pub use file_parser::{CsvGridReader, RawCell, RawGrid, WorkbookGridReader};
pub use importer_trait::{DatasetImporter, GridReader, IngestOutcome, IngestProgress};
pub use row_normalizer::{NormalizeStats, RowNormalizer};
pub use scalar_parser::{parse_date, parse_number};
