// ==========================================
// 物料损耗分析引擎 - 回退存储组合
// ==========================================
// 职责: 主存储 → 次存储 的有序回退
// 规则:
// - put: 主存储失败时告警并写入次存储；写入成功后尽力清除另一侧旧值
// - get: 主存储无值或失败时读次存储
// - 两侧均失败: RepositoryError::AllStoresFailed
// ==========================================

use crate::repository::dataset_store::DatasetStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FallbackDatasetStore {
    primary: Arc<dyn DatasetStore>,
    secondary: Arc<dyn DatasetStore>,
    name: String,
}

impl FallbackDatasetStore {
    pub fn new(primary: Arc<dyn DatasetStore>, secondary: Arc<dyn DatasetStore>) -> Self {
        let name = format!("{}+{}", primary.name(), secondary.name());
        Self {
            primary,
            secondary,
            name,
        }
    }

    pub fn primary(&self) -> &Arc<dyn DatasetStore> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<dyn DatasetStore> {
        &self.secondary
    }

    /// 尽力清除陈旧副本（失败只告警）
    fn clear_stale(store: &dyn DatasetStore) {
        if let Err(e) = store.clear() {
            warn!(store = store.name(), error = %e, "清除陈旧数据集副本失败");
        }
    }
}

impl DatasetStore for FallbackDatasetStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, blob: &[u8]) -> RepositoryResult<()> {
        let primary_err = match self.primary.put(blob) {
            Ok(()) => {
                Self::clear_stale(self.secondary.as_ref());
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            bytes = blob.len(),
            error = %primary_err,
            "主存储写入失败，回退到次存储"
        );

        match self.secondary.put(blob) {
            Ok(()) => {
                Self::clear_stale(self.primary.as_ref());
                Ok(())
            }
            Err(secondary_err) => Err(RepositoryError::AllStoresFailed {
                primary: primary_err.to_string(),
                secondary: secondary_err.to_string(),
            }),
        }
    }

    fn get(&self) -> RepositoryResult<Option<Vec<u8>>> {
        let primary_err = match self.primary.get() {
            Ok(Some(blob)) => return Ok(Some(blob)),
            Ok(None) => None,
            Err(e) => {
                warn!(store = self.primary.name(), error = %e, "主存储读取失败，尝试次存储");
                Some(e)
            }
        };

        match (self.secondary.get(), primary_err) {
            (Ok(blob), _) => {
                if blob.is_some() {
                    debug!(store = self.secondary.name(), "数据集从次存储读取");
                }
                Ok(blob)
            }
            (Err(secondary_err), Some(primary_err)) => Err(RepositoryError::AllStoresFailed {
                primary: primary_err.to_string(),
                secondary: secondary_err.to_string(),
            }),
            (Err(secondary_err), None) => {
                warn!(store = self.secondary.name(), error = %secondary_err, "次存储读取失败");
                Ok(None)
            }
        }
    }

    fn clear(&self) -> RepositoryResult<()> {
        let primary = self.primary.clear();
        let secondary = self.secondary.clear();
        match (primary, secondary) {
            (Err(p), Err(s)) => Err(RepositoryError::AllStoresFailed {
                primary: p.to_string(),
                secondary: s.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
