use std::cell::Cell;
use std::time::Instant;

thread_local! {
    static PERF_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// 性能统计 Guard：记录 elapsed_ms + 处理条数 + 嵌套深度
///
/// 使用方式：
/// ```ignore
/// let mut perf = merma_engine::perf::PerfGuard::new("recompute");
/// // do work...
/// perf.set_items(rows.len());
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    items: Option<usize>,
    depth: u32,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        let depth = PERF_DEPTH.with(|d| {
            let current = d.get();
            d.set(current.saturating_add(1));
            current
        });
        Self {
            op,
            start: Instant::now(),
            items: None,
            depth,
        }
    }

    /// 记录本次操作处理的条数（记录数 / 分组数）
    pub fn set_items(&mut self, items: usize) {
        self.items = Some(items);
    }

    /// 已耗时（毫秒）
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            items = self.items,
            depth = self.depth,
            "done"
        );

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
