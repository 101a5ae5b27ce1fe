// ==========================================
// 物料损耗分析引擎 - 文件数据集存储（次存储）
// ==========================================
// 职责: 单文件 blob 存储，带容量上限
// 规则:
// - 超过容量上限直接拒绝（CapacityExceeded），不截断
// - 先写临时文件再 rename，读者不会看到半写入内容
// ==========================================

use crate::repository::dataset_store::DatasetStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileDatasetStore {
    path: PathBuf,
    capacity_bytes: usize,
}

impl FileDatasetStore {
    /// # 参数
    /// - path: blob 文件路径（父目录不存在时在写入时创建）
    /// - capacity_bytes: 容量上限
    pub fn new(path: impl Into<PathBuf>, capacity_bytes: usize) -> Self {
        Self {
            path: path.into(),
            capacity_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl DatasetStore for FileDatasetStore {
    fn name(&self) -> &str {
        "file"
    }

    fn put(&self, blob: &[u8]) -> RepositoryResult<()> {
        if blob.len() > self.capacity_bytes {
            return Err(RepositoryError::CapacityExceeded {
                store: self.name().to_string(),
                size: blob.len(),
                capacity: self.capacity_bytes,
            });
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = blob.len(), "数据集已写入文件");
        Ok(())
    }

    fn get(&self) -> RepositoryResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> RepositoryResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
