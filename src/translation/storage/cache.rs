//! 翻译响应缓存
//!
//! 内存层是容量有界的 `LruCache`，读取时只用 `peek` 不提升顺序，
//! 因此满容量时淘汰的是最早写入的条目。可选的持久层在内存未命中时回填。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use blake3::Hasher;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::kv::{store_context, KeyValueStore};

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source_lang: String,
    pub target_lang: String,
    pub text: String,
}

impl CacheKey {
    /// 创建缓存键，文本会被规范化（去空白、转小写）
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            text: normalize_text(text),
        }
    }

    /// 生成持久化用的散列键
    pub fn digest(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.source_lang.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.target_lang.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.text.as_bytes());
        format!("trans:{}", hasher.finalize().to_hex())
    }
}

/// 缓存的翻译响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTranslation {
    pub translated_text: String,
    pub provider: String,
    pub confidence: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl CachedTranslation {
    pub fn new(translated_text: &str, provider: &str, confidence: Option<f32>) -> Self {
        Self {
            translated_text: translated_text.to_string(),
            provider: provider.to_string(),
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default)]
pub struct CacheStats {
    pub memory_hits: AtomicUsize,
    pub store_hits: AtomicUsize,
    pub misses: AtomicUsize,
    pub sets: AtomicUsize,
    pub store_errors: AtomicUsize,
}

/// 缓存统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    pub memory_hits: usize,
    pub store_hits: usize,
    pub misses: usize,
    pub sets: usize,
    pub store_errors: usize,
}

impl CacheStatsSnapshot {
    /// 计算命中率
    pub fn hit_rate(&self) -> f32 {
        let hits = self.memory_hits + self.store_hits;
        let total = hits + self.misses;
        if total > 0 {
            hits as f32 / total as f32
        } else {
            0.0
        }
    }
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

/// 两级翻译响应缓存
pub struct ResponseCache {
    entries: RwLock<LruCache<CacheKey, CachedTranslation>>,
    store: Option<Arc<dyn KeyValueStore>>,
    stats: CacheStats,
}

impl ResponseCache {
    /// 创建新的响应缓存，容量为 0 时按 1 处理
    pub fn new(capacity: usize, store: Option<Arc<dyn KeyValueStore>>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            store,
            stats: CacheStats::default(),
        }
    }

    /// 查询缓存：先内存，后持久层（命中时回填内存）
    pub fn get(&self, key: &CacheKey) -> Option<CachedTranslation> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.peek(key) {
                self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.clone());
            }
        }

        if let Some(ref store) = self.store {
            let digest = key.digest();
            match store.get(&digest) {
                Ok(Some(raw)) => match serde_json::from_str::<CachedTranslation>(&raw) {
                    Ok(entry) => {
                        self.stats.store_hits.fetch_add(1, Ordering::Relaxed);
                        self.put_memory(key.clone(), entry.clone());
                        return Some(entry);
                    }
                    Err(e) => {
                        tracing::warn!("持久化缓存条目损坏，忽略: {} ({})", digest, e);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("持久化缓存查询失败: {}", store_context(e, &digest));
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// 写入缓存（内存 + 持久层），持久层失败只记录日志
    pub fn put(&self, key: CacheKey, entry: CachedTranslation) {
        if let Some(ref store) = self.store {
            let digest = key.digest();
            match serde_json::to_string(&entry) {
                Ok(raw) => {
                    if let Err(e) = store.set(&digest, &raw) {
                        self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("持久化缓存写入失败: {}", store_context(e, &digest));
                    }
                }
                Err(e) => tracing::warn!("缓存条目序列化失败: {}", e),
            }
        }

        self.put_memory(key, entry);
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn put_memory(&self, key: CacheKey, entry: CachedTranslation) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.put(key, entry);
    }

    /// 内存层条目数
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空内存层（持久层保持不变）
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::storage::kv::MemoryKvStore;

    #[test]
    fn test_cache_basic_operations() {
        let cache = ResponseCache::new(10, None);
        let key = CacheKey::new("House", "en", "es");

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), CachedTranslation::new("casa", "lingva", None));

        // 规范化后的同一文本命中
        let hit = cache.get(&CacheKey::new("  house ", "en", "es")).unwrap();
        assert_eq!(hit.translated_text, "casa");
        assert_eq!(hit.provider, "lingva");

        let stats = cache.stats();
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_oldest_first_eviction() {
        let cache = ResponseCache::new(2, None);
        let k1 = CacheKey::new("one", "en", "es");
        let k2 = CacheKey::new("two", "en", "es");
        let k3 = CacheKey::new("three", "en", "es");

        cache.put(k1.clone(), CachedTranslation::new("uno", "p", None));
        cache.put(k2.clone(), CachedTranslation::new("dos", "p", None));

        // 读取不提升顺序，最早写入的仍然最先被淘汰
        assert!(cache.get(&k1).is_some());
        cache.put(k3.clone(), CachedTranslation::new("tres", "p", None));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn test_store_backfill() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
        let key = CacheKey::new("dog", "en", "es");

        {
            let cache = ResponseCache::new(10, Some(Arc::clone(&store)));
            cache.put(key.clone(), CachedTranslation::new("perro", "mymemory", Some(0.9)));
        }

        // 新实例内存为空，从持久层读取并回填
        let cache = ResponseCache::new(10, Some(store));
        assert!(cache.is_empty());
        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.translated_text, "perro");
        assert_eq!(hit.confidence, Some(0.9));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().store_hits, 1);
    }

    #[test]
    fn test_language_pair_is_part_of_key() {
        let a = CacheKey::new("dog", "en", "es");
        let b = CacheKey::new("dog", "en", "fr");
        assert_ne!(a.digest(), b.digest());
    }
}
