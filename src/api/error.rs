// ==========================================
// 物料损耗分析引擎 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，生成本地化的用户提示
// 规则: 硬错误只产生一条可读消息（user_message）
// ==========================================

use crate::config::error::ConfigError;
use crate::export::ExportError;
use crate::i18n::t_with_args;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use crate::taxonomy::TaxonomyError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 各层错误
    // ==========================================
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error(transparent)]
    Export(#[from] ExportError),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 是否为输入结构错误（整批导入中止）
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, ApiError::Import(e) if e.is_malformed_input())
    }

    /// 面向用户的本地化消息（按当前语言）
    pub fn user_message(&self) -> String {
        match self {
            ApiError::InvalidInput(detail) => t_with_args("error.invalid_input", &[("detail", detail.as_str())]),
            ApiError::NotFound(detail) => t_with_args("error.not_found", &[("detail", detail.as_str())]),
            ApiError::Import(err) => import_message(err),
            ApiError::Repository(err) => repository_message(err),
            ApiError::Config(err) => t_with_args("error.config", &[("detail", err.to_string().as_str())]),
            ApiError::Taxonomy(err) => t_with_args("error.taxonomy", &[("detail", err.to_string().as_str())]),
            ApiError::Export(err) => t_with_args("error.export", &[("detail", err.to_string().as_str())]),
            ApiError::InternalError(detail) => t_with_args("error.internal", &[("detail", detail.as_str())]),
        }
    }
}

fn import_message(err: &ImportError) -> String {
    match err {
        ImportError::FileNotFound(path) => t_with_args("error.file_not_found", &[("path", path.as_str())]),
        ImportError::UnsupportedFormat(path) => t_with_args("error.unsupported_format", &[("path", path.as_str())]),
        ImportError::FileReadError(detail) => t_with_args("error.file_read", &[("detail", detail.as_str())]),
        ImportError::ExcelParseError(detail) | ImportError::CsvParseError(detail) => {
            t_with_args("error.parse_failed", &[("detail", detail.as_str())])
        }
        ImportError::NoWorksheet => t_with_args("error.no_worksheet", &[]),
        ImportError::HeaderNotFound { material, article } => t_with_args(
            "error.header_not_found",
            &[("material", material.as_str()), ("article", article.as_str())],
        ),
        ImportError::InternalError(detail) => t_with_args("error.internal", &[("detail", detail.as_str())]),
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::AllStoresFailed { primary, secondary } => {
            let detail = format!("{}; {}", primary, secondary);
            t_with_args("error.persistence_failed", &[("detail", detail.as_str())])
        }
        RepositoryError::CapacityExceeded { size, capacity, .. } => t_with_args(
            "error.capacity_exceeded",
            &[("size", size.to_string().as_str()), ("capacity", capacity.to_string().as_str())],
        ),
        other => t_with_args("error.storage", &[("detail", other.to_string().as_str())]),
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
