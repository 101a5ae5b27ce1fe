// ==========================================
// 物料损耗分析引擎 - SQLite 数据集存储（主存储）
// ==========================================
// 职责: 管理 dataset_blob 表（单槽位 "current"）
// 约束: 所有语句使用参数化
// ==========================================

use crate::db::{open_in_memory_connection, open_sqlite_connection};
use crate::repository::dataset_store::DatasetStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const CURRENT_SLOT: &str = "current";

pub struct SqliteDatasetStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatasetStore {
    /// 打开（或创建）数据库文件
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 内存数据库（测试 / 临时会话）
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = open_in_memory_connection()?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 复用已有连接（与 ConfigManager 共享同一数据库）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dataset_blob (
                slot TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                byte_len INTEGER NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl DatasetStore for SqliteDatasetStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn put(&self, blob: &[u8]) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO dataset_blob (slot, payload, byte_len, saved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(slot) DO UPDATE SET
                payload = excluded.payload,
                byte_len = excluded.byte_len,
                saved_at = excluded.saved_at
            "#,
            params![CURRENT_SLOT, blob, blob.len() as i64, Utc::now().to_rfc3339()],
        )?;
        debug!(bytes = blob.len(), "数据集已写入 SQLite");
        Ok(())
    }

    fn get(&self) -> RepositoryResult<Option<Vec<u8>>> {
        let conn = self.get_conn()?;
        let blob = conn
            .query_row(
                "SELECT payload FROM dataset_blob WHERE slot = ?1",
                params![CURRENT_SLOT],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(blob)
    }

    fn clear(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM dataset_blob WHERE slot = ?1", params![CURRENT_SLOT])?;
        Ok(())
    }
}
