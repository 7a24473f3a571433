//! 词典存储
//!
//! 查词流水线的第二级。接口只包含按词查询、插入、按等级列举和计数四个操作，
//! 插入重复键时返回 [`TranslationError::DuplicateEntry`]，由调用方按幂等成功处理。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::lexicon::entry::{
    lookup_key, PartOfSpeech, ProficiencyLevel, ResolutionSource, WordEntry,
};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::kv::{store_context, KeyValueStore};

/// 持久化词典接口
#[async_trait]
pub trait DictionaryStore: Send + Sync {
    /// 按规范化后的源词精确查询
    async fn get_by_word(
        &self,
        word: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Option<WordEntry>>;

    /// 插入新词条；键已存在时返回 `DuplicateEntry`
    async fn insert(&self, entry: &WordEntry) -> TranslationResult<()>;

    async fn get_by_level(
        &self,
        source_lang: &str,
        target_lang: &str,
        level: ProficiencyLevel,
    ) -> TranslationResult<Vec<WordEntry>>;

    async fn count(&self, source_lang: &str, target_lang: &str) -> TranslationResult<usize>;
}

/// 词典文件中的一条记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryRecord {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub level: Option<ProficiencyLevel>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub pronunciation: Option<String>,
}

impl DictionaryRecord {
    /// 转换为词条；未给出等级时由排名换算，两者都缺失时视为中级
    pub fn to_entry(
        &self,
        source_lang: &str,
        target_lang: &str,
        source: ResolutionSource,
    ) -> WordEntry {
        let level = self
            .level
            .or_else(|| self.rank.map(ProficiencyLevel::from_rank))
            .unwrap_or(ProficiencyLevel::Intermediate);
        let pos = self
            .pos
            .as_deref()
            .and_then(|p| p.parse::<PartOfSpeech>().ok())
            .unwrap_or_default();

        WordEntry::new(&self.word, &self.translation, source_lang, target_lang, level, source)
            .with_rank(self.rank)
            .with_part_of_speech(pos)
            .with_variants(self.variants.clone())
            .with_pronunciation(self.pronunciation.clone())
    }
}

/// 词典文件格式
///
/// ```json
/// { "sourceLanguage": "en", "targetLanguage": "es",
///   "entries": [ { "word": "house", "translation": "casa", "rank": 120, "pos": "noun" } ] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryFile {
    pub source_language: String,
    pub target_language: String,
    #[serde(default)]
    pub entries: Vec<DictionaryRecord>,
}

impl DictionaryFile {
    pub fn from_json_str(content: &str) -> TranslationResult<Self> {
        let file: DictionaryFile = serde_json::from_str(content)?;
        if file.source_language.trim().is_empty() || file.target_language.trim().is_empty() {
            return Err(TranslationError::InvalidInput(
                "词典文件缺少语言代码".to_string(),
            ));
        }
        Ok(file)
    }

    pub fn to_entries(&self, source: ResolutionSource) -> Vec<WordEntry> {
        self.entries
            .iter()
            .filter(|record| !record.word.trim().is_empty() && !record.translation.trim().is_empty())
            .map(|record| record.to_entry(&self.source_language, &self.target_language, source))
            .collect()
    }
}

/// 进程内词典存储
#[derive(Debug, Default)]
pub struct MemoryDictionaryStore {
    entries: RwLock<HashMap<String, WordEntry>>,
}

impl MemoryDictionaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用给定词条构造（重复键以先出现者为准）
    pub fn with_entries(entries: impl IntoIterator<Item = WordEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            let key = lookup_key(&entry.source_language, &entry.target_language, &entry.source_word);
            map.entry(key).or_insert(entry);
        }
        Self {
            entries: RwLock::new(map),
        }
    }

    /// 从 JSON 词典文件导入，返回新增条目数
    pub async fn load_json_file<P: AsRef<Path>>(&self, path: P) -> TranslationResult<usize> {
        import_json_file(self, path.as_ref()).await
    }
}

/// 把 JSON 词典文件导入任意词典存储，返回新增条目数；已有的键保持不变
pub async fn import_json_file(store: &dyn DictionaryStore, path: &Path) -> TranslationResult<usize> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        TranslationError::InvalidInput(format!("读取词典文件失败 {}: {}", path.display(), e))
    })?;
    let file = DictionaryFile::from_json_str(&content)?;

    let mut inserted = 0;
    for entry in file.to_entries(ResolutionSource::Store) {
        match store.insert(&entry).await {
            Ok(()) => inserted += 1,
            Err(TranslationError::DuplicateEntry(_)) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::info!("从 {} 导入 {} 个词条", path.display(), inserted);
    Ok(inserted)
}

#[async_trait]
impl DictionaryStore for MemoryDictionaryStore {
    async fn get_by_word(
        &self,
        word: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Option<WordEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&lookup_key(source_lang, target_lang, word))
            .map(|entry| entry.relabeled(ResolutionSource::Store)))
    }

    async fn insert(&self, entry: &WordEntry) -> TranslationResult<()> {
        let key = lookup_key(&entry.source_language, &entry.target_language, &entry.source_word);
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(TranslationError::DuplicateEntry(key));
        }
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn get_by_level(
        &self,
        source_lang: &str,
        target_lang: &str,
        level: ProficiencyLevel,
    ) -> TranslationResult<Vec<WordEntry>> {
        let entries = self.entries.read().await;
        let mut found: Vec<WordEntry> = entries
            .values()
            .filter(|e| {
                e.source_language == source_lang
                    && e.target_language == target_lang
                    && e.proficiency_level == level
            })
            .map(|e| e.relabeled(ResolutionSource::Store))
            .collect();
        found.sort_by(|a, b| a.source_word.cmp(&b.source_word));
        Ok(found)
    }

    async fn count(&self, source_lang: &str, target_lang: &str) -> TranslationResult<usize> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| e.source_language == source_lang && e.target_language == target_lang)
            .count())
    }
}

fn entry_key(key: &str) -> String {
    format!("dict:{}", key)
}

fn index_key(source_lang: &str, target_lang: &str) -> String {
    format!("dict-index:{}:{}", source_lang, target_lang)
}

/// 建立在键值存储上的词典
///
/// 每个词条以 JSON 存在 `dict:<查询键>` 下，`dict-index:<源>:<目标>`
/// 记录该语言对的全部查询键，供按等级列举和计数使用。
/// 配合 [`RedbKvStore`](crate::translation::storage::RedbKvStore) 时词条跨进程保留。
pub struct KvDictionaryStore {
    kv: Arc<dyn KeyValueStore>,
    /// 串行化插入，保证查重与写入之间没有交错
    write_lock: Mutex<()>,
}

impl KvDictionaryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    fn read_entry(&self, key: &str) -> TranslationResult<Option<WordEntry>> {
        let storage_key = entry_key(key);
        match self.kv.get(&storage_key).map_err(|e| store_context(e, &storage_key))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn read_index(&self, source_lang: &str, target_lang: &str) -> TranslationResult<Vec<String>> {
        let storage_key = index_key(source_lang, target_lang);
        match self.kv.get(&storage_key).map_err(|e| store_context(e, &storage_key))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Debug for KvDictionaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvDictionaryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl DictionaryStore for KvDictionaryStore {
    async fn get_by_word(
        &self,
        word: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Option<WordEntry>> {
        let key = lookup_key(source_lang, target_lang, word);
        Ok(self
            .read_entry(&key)?
            .map(|entry| entry.relabeled(ResolutionSource::Store)))
    }

    async fn insert(&self, entry: &WordEntry) -> TranslationResult<()> {
        let key = lookup_key(&entry.source_language, &entry.target_language, &entry.source_word);
        let _guard = self.write_lock.lock().await;

        if self.read_entry(&key)?.is_some() {
            return Err(TranslationError::DuplicateEntry(key));
        }

        let storage_key = entry_key(&key);
        self.kv
            .set(&storage_key, &serde_json::to_string(entry)?)
            .map_err(|e| store_context(e, &storage_key))?;

        let mut index = self.read_index(&entry.source_language, &entry.target_language)?;
        index.push(key);
        let index_storage_key = index_key(&entry.source_language, &entry.target_language);
        self.kv
            .set(&index_storage_key, &serde_json::to_string(&index)?)
            .map_err(|e| store_context(e, &index_storage_key))?;
        Ok(())
    }

    async fn get_by_level(
        &self,
        source_lang: &str,
        target_lang: &str,
        level: ProficiencyLevel,
    ) -> TranslationResult<Vec<WordEntry>> {
        let mut found = Vec::new();
        for key in self.read_index(source_lang, target_lang)? {
            if let Some(entry) = self.read_entry(&key)? {
                if entry.proficiency_level == level {
                    found.push(entry.relabeled(ResolutionSource::Store));
                }
            }
        }
        found.sort_by(|a, b| a.source_word.cmp(&b.source_word));
        Ok(found)
    }

    async fn count(&self, source_lang: &str, target_lang: &str) -> TranslationResult<usize> {
        Ok(self.read_index(source_lang, target_lang)?.len())
    }
}
