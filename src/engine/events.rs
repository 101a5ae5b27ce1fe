// ==========================================
// 物料损耗分析引擎 - 快照更新发布
// ==========================================
// 职责: 维护监听者注册表，每次变更后同步广播不可变快照
// 规则:
// - 无批处理 / 去抖：每次变更对应一次广播
// - 分发前克隆监听者列表，回调期间不持锁（回调内可订阅 / 退订）
// - 零监听者时行为不变
// ==========================================

use crate::domain::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

/// 监听者标识
pub type ListenerId = u64;

// ==========================================
// 更新事件
// ==========================================

/// 触发快照重算的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateReason {
    /// 数据集替换（导入完成）
    DatasetReplaced,
    /// 从存储恢复
    DatasetRestored,
    /// 筛选条件变更
    FilterChanged,
    /// 分组维度变更
    GroupByChanged,
}

impl UpdateReason {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateReason::DatasetReplaced => "DatasetReplaced",
            UpdateReason::DatasetRestored => "DatasetRestored",
            UpdateReason::FilterChanged => "FilterChanged",
            UpdateReason::GroupByChanged => "GroupByChanged",
        }
    }
}

/// 快照更新事件
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    pub reason: UpdateReason,
    pub snapshot: Arc<Snapshot>,
}

// ==========================================
// 监听者 Trait
// ==========================================

/// 快照监听者
///
/// 回调在发布线程上同步执行；回调内可以调用 subscribe / unsubscribe。
pub trait SnapshotListener: Send + Sync {
    fn on_snapshot(&self, event: &SnapshotEvent);
}

impl<F> SnapshotListener for F
where
    F: Fn(&SnapshotEvent) + Send + Sync,
{
    fn on_snapshot(&self, event: &SnapshotEvent) {
        self(event)
    }
}

#[derive(Default)]
struct Registry {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Arc<dyn SnapshotListener>)>,
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // 监听者在锁外执行，中毒只可能来自注册表自身操作，数据仍然一致
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove_listener(registry: &Mutex<Registry>, id: ListenerId) -> bool {
    let mut guard = lock_registry(registry);
    let before = guard.listeners.len();
    guard.listeners.retain(|(listener_id, _)| *listener_id != id);
    guard.listeners.len() != before
}

// ==========================================
// SnapshotPublisher
// ==========================================

/// 监听者注册表 + 同步广播
#[derive(Clone, Default)]
pub struct SnapshotPublisher {
    registry: Arc<Mutex<Registry>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听者
    ///
    /// # 返回
    /// 可调用 `dispose()` 退订的句柄
    pub fn subscribe(&self, listener: Arc<dyn SnapshotListener>) -> Subscription {
        let mut guard = lock_registry(&self.registry);
        guard.next_id += 1;
        let id = guard.next_id;
        guard.listeners.push((id, listener));
        debug!(listener_id = id, listeners = guard.listeners.len(), "监听者已注册");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// 按 id 退订（id 不存在时返回 false）
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = remove_listener(&self.registry, id);
        if removed {
            debug!(listener_id = id, "监听者已退订");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        lock_registry(&self.registry).listeners.len()
    }

    /// 广播事件
    ///
    /// # 返回
    /// 本次通知的监听者数量
    pub fn publish(&self, event: &SnapshotEvent) -> usize {
        let listeners: Vec<Arc<dyn SnapshotListener>> = lock_registry(&self.registry)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener.on_snapshot(event);
        }

        debug!(
            reason = event.reason.as_str(),
            version = event.snapshot.dataset_version,
            notified = listeners.len(),
            "快照已广播"
        );
        listeners.len()
    }
}

/// 订阅句柄
///
/// 不随 drop 自动退订，需显式 `dispose()` 或 `SnapshotPublisher::unsubscribe(id)`。
#[must_use = "丢弃句柄后只能通过 id 退订"]
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// 退订（发布者已释放或已退订时返回 false）
    pub fn dispose(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => remove_listener(&registry, self.id),
            None => false,
        }
    }
}
