// ==========================================
// 集成测试共享辅助模块
// ==========================================

#![allow(dead_code)]

pub mod test_data_builder;

use merma_engine::api::AnalyticsApi;
use merma_engine::config::EngineConfig;
use merma_engine::repository::{DatasetStore, MemoryDatasetStore};
use std::sync::Arc;

/// 使用内存存储与默认配置创建 API
pub fn memory_api() -> (AnalyticsApi, Arc<MemoryDatasetStore>) {
    let store = Arc::new(MemoryDatasetStore::new("mem"));
    let api = api_with_store(store.clone());
    (api, store)
}

/// 使用指定存储与默认配置创建 API
pub fn api_with_store(store: Arc<dyn DatasetStore>) -> AnalyticsApi {
    AnalyticsApi::new(&EngineConfig::default(), store).expect("创建 AnalyticsApi 失败")
}
