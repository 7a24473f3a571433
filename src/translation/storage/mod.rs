//! 存储模块
//!
//! 提供响应缓存、词典存储和键值持久化。

pub mod cache;
pub mod dictionary;
pub mod kv;

pub use cache::{CacheKey, CacheStatsSnapshot, CachedTranslation, ResponseCache};
pub use dictionary::{
    import_json_file, DictionaryFile, DictionaryRecord, DictionaryStore, KvDictionaryStore,
    MemoryDictionaryStore,
};
pub use kv::{KeyValueStore, MemoryKvStore, RedbKvStore};
