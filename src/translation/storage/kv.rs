//! 键值持久化存储
//!
//! 翻译响应与词频表都通过这个最小接口落盘。提供两种实现：
//! 进程内的 [`MemoryKvStore`] 和基于 redb 的 [`RedbKvStore`]。

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use redb::{Database, TableDefinition};

use crate::translation::error::{TranslationError, TranslationResult};

const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("wordweave_kv");

/// 键值存储接口
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> TranslationResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> TranslationResult<()>;

    /// 删除键，返回键是否存在
    fn remove(&self, key: &str) -> TranslationResult<bool>;
}

/// 进程内键值存储
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> TranslationResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }
}

/// 基于 redb 的磁盘键值存储
pub struct RedbKvStore {
    db: Database,
}

impl RedbKvStore {
    /// 打开（或创建）数据库文件
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;

        // 预先建表，读事务无需处理表不存在的情况
        let write_txn = db.begin_write()?;
        write_txn.open_table(KV_TABLE)?;
        write_txn.commit()?;

        tracing::debug!("打开持久化存储: {}", path.display());
        Ok(Self { db })
    }
}

impl KeyValueStore for RedbKvStore {
    fn get(&self, key: &str) -> TranslationResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;
        let value = table.get(key)?.map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(KV_TABLE)?;
            let removed = table.remove(key)?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore").finish_non_exhaustive()
    }
}

/// 将存储错误转换为带键名的上下文
pub(crate) fn store_context(error: TranslationError, key: &str) -> TranslationError {
    error.with_context(format!("key={}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryKvStore::new();
        assert!(store.is_empty());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.redb");

        {
            let store = RedbKvStore::open(&path).unwrap();
            assert_eq!(store.get("missing").unwrap(), None);
            store.set("freq:en", "[\"the\",\"of\"]").unwrap();
        }

        let store = RedbKvStore::open(&path).unwrap();
        assert_eq!(store.get("freq:en").unwrap().as_deref(), Some("[\"the\",\"of\"]"));
        assert!(store.remove("freq:en").unwrap());
        assert_eq!(store.get("freq:en").unwrap(), None);
    }
}
