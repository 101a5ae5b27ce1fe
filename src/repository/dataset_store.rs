// ==========================================
// 物料损耗分析引擎 - 数据集存储 Trait
// ==========================================
// 职责: 定义单槽位不透明 blob 存储能力 + 数据集编解码
// 说明: 引擎 / API 只依赖 put / get，不感知具体存储
// ==========================================

use crate::domain::dataset::{Dataset, PersistedDataset};
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::sync::{Mutex, PoisonError};

/// 数据集 blob 存储
///
/// 每个存储只保存"当前"一份快照，put 覆盖旧值。
pub trait DatasetStore: Send + Sync {
    /// 存储名称（日志 / 错误信息用）
    fn name(&self) -> &str;

    /// 写入 blob（覆盖）
    fn put(&self, blob: &[u8]) -> RepositoryResult<()>;

    /// 读取 blob（不存在时返回 None）
    fn get(&self) -> RepositoryResult<Option<Vec<u8>>>;

    /// 删除 blob（不存在时视为成功）
    fn clear(&self) -> RepositoryResult<()>;
}

// ==========================================
// 编解码
// ==========================================

/// Dataset → JSON blob
pub fn encode_dataset(dataset: &Dataset) -> RepositoryResult<Vec<u8>> {
    Ok(serde_json::to_vec(&PersistedDataset::from(dataset))?)
}

/// JSON blob → PersistedDataset
pub fn decode_dataset(blob: &[u8]) -> RepositoryResult<PersistedDataset> {
    Ok(serde_json::from_slice(blob)?)
}

// ==========================================
// MemoryDatasetStore - 内存存储（测试 / 临时会话）
// ==========================================
pub struct MemoryDatasetStore {
    name: String,
    slot: Mutex<Option<Vec<u8>>>,
    capacity: Option<usize>,
}

impl MemoryDatasetStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
            capacity: None,
        }
    }

    /// 带容量上限的内存存储
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(name)
        }
    }
}

impl DatasetStore for MemoryDatasetStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, blob: &[u8]) -> RepositoryResult<()> {
        if let Some(capacity) = self.capacity {
            if blob.len() > capacity {
                return Err(RepositoryError::CapacityExceeded {
                    store: self.name.clone(),
                    size: blob.len(),
                    capacity,
                });
            }
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(blob.to_vec());
        Ok(())
    }

    fn get(&self) -> RepositoryResult<Option<Vec<u8>>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn clear(&self) -> RepositoryResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
