//! 三级查词流水线
//!
//! 1. 内存缓存（按语言对 + 规范化词）
//! 2. 持久化词典存储（精确匹配）
//! 3. 翻译提供方编排器
//!
//! 第三级的新词条根据源词的词频排名确定熟练度，没有排名时使用配置的默认等级，
//! 随后写入内存缓存和词典存储。任何一级失败都只让这个词成为未命中，不会向上抛错。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::lexicon::entry::{lookup_key, normalize_word, ProficiencyLevel, ResolutionSource, WordEntry};
use crate::lexicon::frequency::FrequencyService;
use crate::translation::error::{helpers, TranslationError};
use crate::translation::orchestrator::{ProviderOrchestrator, Translation};
use crate::translation::storage::DictionaryStore;

/// 一次查词的结果；`entry` 为 `None` 表示没有可用的翻译
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub entry: Option<WordEntry>,
    pub source: Option<ResolutionSource>,
}

impl Resolution {
    pub fn found(entry: WordEntry, source: ResolutionSource) -> Self {
        Self {
            entry: Some(entry.relabeled(source)),
            source: Some(source),
        }
    }

    pub fn miss() -> Self {
        Self {
            entry: None,
            source: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.entry.is_some()
    }
}

#[derive(Debug, Default)]
struct ResolverStats {
    memory_hits: AtomicUsize,
    store_hits: AtomicUsize,
    provider_hits: AtomicUsize,
    misses: AtomicUsize,
    store_errors: AtomicUsize,
}

/// 查词统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverStatsSnapshot {
    pub memory_hits: usize,
    pub store_hits: usize,
    pub provider_hits: usize,
    pub misses: usize,
    pub store_errors: usize,
}

/// 查词流水线
pub struct WordResolver {
    memory: DashMap<String, WordEntry>,
    store: Arc<dyn DictionaryStore>,
    frequency: Arc<FrequencyService>,
    orchestrator: Arc<ProviderOrchestrator>,
    default_proficiency: ProficiencyLevel,
    stats: ResolverStats,
}

impl WordResolver {
    pub fn new(
        store: Arc<dyn DictionaryStore>,
        frequency: Arc<FrequencyService>,
        orchestrator: Arc<ProviderOrchestrator>,
        default_proficiency: ProficiencyLevel,
    ) -> Self {
        Self {
            memory: DashMap::new(),
            store,
            frequency,
            orchestrator,
            default_proficiency,
            stats: ResolverStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn DictionaryStore> {
        &self.store
    }

    pub fn frequency(&self) -> &Arc<FrequencyService> {
        &self.frequency
    }

    pub fn orchestrator(&self) -> &Arc<ProviderOrchestrator> {
        &self.orchestrator
    }

    /// 内存缓存中的词条数
    pub fn cached_len(&self) -> usize {
        self.memory.len()
    }

    pub fn stats(&self) -> ResolverStatsSnapshot {
        ResolverStatsSnapshot {
            memory_hits: self.stats.memory_hits.load(Ordering::Relaxed),
            store_hits: self.stats.store_hits.load(Ordering::Relaxed),
            provider_hits: self.stats.provider_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            store_errors: self.stats.store_errors.load(Ordering::Relaxed),
        }
    }

    /// 查一个词
    pub async fn lookup_word(&self, word: &str, source_lang: &str, target_lang: &str) -> Resolution {
        let normalized = normalize_word(word);
        if normalized.is_empty() {
            return Resolution::miss();
        }

        if let Some(local) = self.lookup_local(&normalized, source_lang, target_lang).await {
            return local;
        }

        match self
            .orchestrator
            .translate(&normalized, source_lang, target_lang)
            .await
        {
            Ok(translation) => {
                self.accept(&normalized, source_lang, target_lang, &translation)
                    .await
            }
            Err(e) => {
                debug!("'{}' 无法翻译: {}", normalized, e);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Resolution::miss()
            }
        }
    }

    /// 批量查词：先逐个查前两级，剩余的词一次交给编排器的批量接口。
    /// 结果以调用方传入的原词为键。
    pub async fn lookup_words(
        &self,
        words: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> HashMap<String, Resolution> {
        let mut results = HashMap::with_capacity(words.len());
        let mut pending: Vec<(String, String)> = Vec::new();

        for word in words {
            if results.contains_key(word) || pending.iter().any(|(original, _)| original == word) {
                continue;
            }
            let normalized = normalize_word(word);
            if normalized.is_empty() {
                results.insert(word.clone(), Resolution::miss());
                continue;
            }
            match self.lookup_local(&normalized, source_lang, target_lang).await {
                Some(local) => {
                    results.insert(word.clone(), local);
                }
                None => pending.push((word.clone(), normalized)),
            }
        }

        if pending.is_empty() {
            return results;
        }

        let mut to_translate: Vec<String> = Vec::with_capacity(pending.len());
        for (_, normalized) in &pending {
            if !to_translate.contains(normalized) {
                to_translate.push(normalized.clone());
            }
        }
        debug!("{} 个词需要外部翻译", to_translate.len());

        let bulk = self
            .orchestrator
            .translate_bulk(&to_translate, source_lang, target_lang)
            .await;

        for (original, normalized) in pending {
            let resolution = match bulk.translations.get(&normalized) {
                Some(translation) => {
                    self.accept(&normalized, source_lang, target_lang, translation)
                        .await
                }
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    Resolution::miss()
                }
            };
            results.insert(original, resolution);
        }

        results
    }

    /// 直接放入内存缓存
    pub fn remember(&self, entry: WordEntry) {
        let key = lookup_key(&entry.source_language, &entry.target_language, &entry.source_word);
        self.memory.insert(key, entry);
    }

    /// 前两级查询
    async fn lookup_local(
        &self,
        normalized: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Option<Resolution> {
        let key = lookup_key(source_lang, target_lang, normalized);
        if let Some(entry) = self.memory.get(&key) {
            self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some(Resolution::found(entry.value().clone(), ResolutionSource::Cache));
        }

        match self.store.get_by_word(normalized, source_lang, target_lang).await {
            Ok(Some(entry)) => {
                self.stats.store_hits.fetch_add(1, Ordering::Relaxed);
                self.memory.insert(key, entry.clone());
                Some(Resolution::found(entry, ResolutionSource::Store))
            }
            Ok(None) => None,
            Err(e) => {
                helpers::log_error(&e.with_context(format!("查询 '{}'", normalized)));
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 把编排器的译文变成词条并落盘
    async fn accept(
        &self,
        normalized: &str,
        source_lang: &str,
        target_lang: &str,
        translation: &Translation,
    ) -> Resolution {
        let text = translation.text.trim();
        if text.is_empty() || text.to_lowercase() == normalized {
            debug!("'{}' 的译文与原词相同，视为未命中", normalized);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return Resolution::miss();
        }

        let rank = self.frequency.get_word_rank(source_lang, normalized).await;
        let level = rank
            .map(ProficiencyLevel::from_rank)
            .unwrap_or(self.default_proficiency);

        let mut entry = WordEntry::new(
            normalized,
            text,
            source_lang,
            target_lang,
            level,
            ResolutionSource::Provider,
        )
        .with_rank(rank);
        entry.cached_at = Some(Utc::now());

        match self.store.insert(&entry).await {
            Ok(()) | Err(TranslationError::DuplicateEntry(_)) => {}
            Err(e) => {
                helpers::log_error(&e.with_context(format!("保存 '{}'", normalized)));
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return Resolution::miss();
            }
        }

        self.remember(entry.clone());
        self.stats.provider_hits.fetch_add(1, Ordering::Relaxed);
        debug!(
            "'{}' -> '{}' ({}, {})",
            normalized, entry.target_word, translation.provider, level
        );
        Resolution::found(entry, ResolutionSource::Provider)
    }
}

impl std::fmt::Debug for WordResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordResolver")
            .field("cached", &self.memory.len())
            .field("default_proficiency", &self.default_proficiency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::config::OrchestratorConfig;
    use crate::translation::error::TranslationResult;
    use crate::translation::providers::{ProviderResponse, RegisteredProvider, TranslationProvider};
    use crate::translation::storage::{MemoryDictionaryStore, ResponseCache};
    use async_trait::async_trait;

    struct FixedProvider {
        endpoints: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationProvider for FixedProvider {
        fn id(&self) -> &str {
            "fixed"
        }

        fn endpoints(&self) -> &[String] {
            &self.endpoints
        }

        async fn translate(
            &self,
            _endpoint: &str,
            text: &str,
            _source_lang: &str,
            _target_lang: &str,
        ) -> TranslationResult<ProviderResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match text {
                "house" => Ok(ProviderResponse::new("casa")),
                "dog" => Ok(ProviderResponse::new("perro")),
                "hotel" => Ok(ProviderResponse::new("Hotel")),
                _ => Err(TranslationError::NetworkError("unknown".to_string())),
            }
        }
    }

    fn build_resolver(store: Arc<dyn DictionaryStore>) -> (WordResolver, Arc<FixedProvider>) {
        let provider = Arc::new(FixedProvider {
            endpoints: vec!["mock://fixed".to_string()],
            calls: AtomicUsize::new(0),
        });
        let orchestrator = ProviderOrchestrator::new(
            vec![RegisteredProvider::new(provider.clone(), 1000)],
            ResponseCache::new(100, None),
            OrchestratorConfig::default(),
        );
        let resolver = WordResolver::new(
            store,
            Arc::new(FrequencyService::disabled()),
            Arc::new(orchestrator),
            ProficiencyLevel::Intermediate,
        );
        (resolver, provider)
    }

    #[tokio::test]
    async fn test_tiers_in_order() {
        let store = Arc::new(MemoryDictionaryStore::new());
        let (resolver, provider) = build_resolver(store.clone());

        let first = resolver.lookup_word("House", "en", "es").await;
        assert_eq!(first.source, Some(ResolutionSource::Provider));
        let entry = first.entry.unwrap();
        assert_eq!(entry.target_word, "casa");
        // 没有词频数据时使用默认等级
        assert_eq!(entry.proficiency_level, ProficiencyLevel::Intermediate);
        assert_eq!(entry.frequency_rank, None);

        let second = resolver.lookup_word("house", "en", "es").await;
        assert_eq!(second.source, Some(ResolutionSource::Cache));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // 新实例共享同一个存储，命中第二级
        let (fresh, fresh_provider) = build_resolver(store);
        let third = fresh.lookup_word("house", "en", "es").await;
        assert_eq!(third.source, Some(ResolutionSource::Store));
        assert_eq!(fresh_provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_misses_are_not_errors() {
        let (resolver, _) = build_resolver(Arc::new(MemoryDictionaryStore::new()));

        let unknown = resolver.lookup_word("zzyzx", "en", "es").await;
        assert!(unknown.entry.is_none());
        assert!(unknown.source.is_none());

        // 译文与原词相同
        let same = resolver.lookup_word("hotel", "en", "es").await;
        assert!(!same.is_found());
        assert_eq!(resolver.stats().misses, 2);
    }

    struct BrokenStore;

    #[async_trait]
    impl DictionaryStore for BrokenStore {
        async fn get_by_word(&self, _: &str, _: &str, _: &str) -> TranslationResult<Option<WordEntry>> {
            Err(TranslationError::StoreError("disk unavailable".to_string()))
        }

        async fn insert(&self, _: &WordEntry) -> TranslationResult<()> {
            Err(TranslationError::StoreError("disk unavailable".to_string()))
        }

        async fn get_by_level(
            &self,
            _: &str,
            _: &str,
            _: ProficiencyLevel,
        ) -> TranslationResult<Vec<WordEntry>> {
            Ok(Vec::new())
        }

        async fn count(&self, _: &str, _: &str) -> TranslationResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_store_failures_become_misses() {
        let (resolver, provider) = build_resolver(Arc::new(BrokenStore));

        let resolution = resolver.lookup_word("house", "en", "es").await;
        assert!(!resolution.is_found());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let stats = resolver.stats();
        assert_eq!(stats.store_errors, 2, "both the lookup and the insert fail");
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.provider_hits, 0);
    }

    #[tokio::test]
    async fn test_bulk_lookup_merges_by_original_word() {
        let store = Arc::new(MemoryDictionaryStore::with_entries(vec![WordEntry::new(
            "cat",
            "gato",
            "en",
            "es",
            ProficiencyLevel::Beginner,
            ResolutionSource::Store,
        )]));
        let (resolver, provider) = build_resolver(store);

        let words = vec![
            "cat".to_string(),
            "Dog".to_string(),
            "house".to_string(),
            "zzyzx".to_string(),
        ];
        let results = resolver.lookup_words(&words, "en", "es").await;

        assert_eq!(results.len(), 4);
        assert_eq!(results["cat"].source, Some(ResolutionSource::Store));
        assert_eq!(results["Dog"].entry.as_ref().unwrap().target_word, "perro");
        assert_eq!(results["house"].source, Some(ResolutionSource::Provider));
        assert!(results["zzyzx"].entry.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
