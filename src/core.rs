use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeMessage, BridgeSender, ProgressStage};
use crate::lexicon::bundled::BundledDictionary;
use crate::lexicon::entry::{ProficiencyLevel, ResolutionSource, WordEntry};
use crate::lexicon::frequency::{
    FileFrequencySource, FrequencyListSource, FrequencyService, HttpFrequencySource,
};
use crate::lexicon::resolver::{Resolution, ResolverStatsSnapshot, WordResolver};
use crate::parsers::tokenizer::{get_unique_words, Tokenizer, TokenizerOptions};
use crate::translation::config::{constants, WeaveConfig};
use crate::translation::error::TranslationResult;
use crate::translation::orchestrator::{OrchestratorStatsSnapshot, ProviderOrchestrator};
use crate::translation::providers::build_providers;
use crate::translation::storage::{
    DictionaryStore, KeyValueStore, KvDictionaryStore, MemoryDictionaryStore, MemoryKvStore,
    RedbKvStore, ResponseCache,
};
use crate::weave::rewrite::{ForeignWord, Replacer};

/// Statistics for one `process_content` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    pub total_words: usize,
    pub eligible_words: usize,
    pub replaced_words: usize,
    pub protected_words: usize,
    pub skipped_by_density: usize,
    /// Unique words no tier (nor the bundled dictionary) could translate
    pub unresolved_words: usize,
    pub processing_time_ms: u64,
}

/// Result of processing a markup fragment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutput {
    pub content: String,
    pub foreign_words: Vec<ForeignWord>,
    pub stats: ProcessStats,
}

/// Outcome of `pre_cache_words`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCacheReport {
    pub requested: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// 引擎累计统计
#[derive(Debug, Default)]
struct EngineCounters {
    documents: AtomicUsize,
    words_replaced: AtomicUsize,
    unresolved: AtomicUsize,
    bundled_hits: AtomicUsize,
}

/// Cumulative engine statistics
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub documents: usize,
    pub words_replaced: usize,
    pub unresolved: usize,
    pub bundled_hits: usize,
    pub registered_words: usize,
    pub resolver: ResolverStatsSnapshot,
    pub orchestrator: OrchestratorStatsSnapshot,
}

/// The collaborators an engine is assembled from
///
/// Passing these in explicitly keeps the engine free of shared global state:
/// tests inject in-memory stores and scripted providers, the CLI builds them
/// from a [`WeaveConfig`].
pub struct EngineParts {
    pub store: Arc<dyn DictionaryStore>,
    pub frequency: Arc<FrequencyService>,
    pub orchestrator: Arc<ProviderOrchestrator>,
    pub bundled: Option<Arc<BundledDictionary>>,
}

impl EngineParts {
    /// Builds the default collaborators for a configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `offline` - When true, no translation providers and no remote frequency lists are used
    ///
    /// # Returns
    ///
    /// The assembled parts, or an error if the on-disk store or an HTTP client cannot be created.
    pub fn from_config(config: &WeaveConfig, offline: bool) -> TranslationResult<Self> {
        // 1. 键值存储与词典：配置了路径时落盘
        let persistent = config.storage.resolved_path();
        let kv: Arc<dyn KeyValueStore> = match &persistent {
            Some(path) => {
                info!("使用本地存储: {}", path);
                Arc::new(RedbKvStore::open(path)?)
            }
            None => Arc::new(MemoryKvStore::new()),
        };
        let store: Arc<dyn DictionaryStore> = if persistent.is_some() {
            Arc::new(KvDictionaryStore::new(kv.clone()))
        } else {
            Arc::new(MemoryDictionaryStore::new())
        };

        // 2. 翻译提供方与编排器
        let providers = if offline {
            Vec::new()
        } else {
            build_providers(&config.providers, config.orchestrator.request_timeout())?
        };
        let cache = ResponseCache::new(config.orchestrator.response_cache_size, Some(kv.clone()));
        let orchestrator = Arc::new(ProviderOrchestrator::new(
            providers,
            cache,
            config.orchestrator.clone(),
        ));

        // 3. 词频来源：本地目录优先，其次远程下载
        let source: Option<Arc<dyn FrequencyListSource>> = if !config.frequency.enabled {
            None
        } else if let Some(dir) = &config.frequency.local_dir {
            Some(Arc::new(FileFrequencySource::new(
                shellexpand::tilde(dir).into_owned(),
            )))
        } else if offline {
            None
        } else {
            let template = config
                .frequency
                .url_template
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_FREQUENCY_URL.to_string());
            Some(Arc::new(HttpFrequencySource::new(
                template,
                config.orchestrator.request_timeout(),
            )?))
        };
        let frequency = Arc::new(FrequencyService::new(
            source,
            kv,
            config.frequency.max_list_size,
        ));

        let bundled = config
            .learning
            .bundled_fallback
            .then(|| Arc::new(BundledDictionary::builtin()));

        Ok(Self {
            store,
            frequency,
            orchestrator,
            bundled,
        })
    }
}

/// The lexical substitution engine
///
/// Ties the tokenizer, the three-tier resolver and the replacer together
/// behind [`LexicalEngine::process_content`]. Initialization is lazy and
/// idempotent; every public operation triggers it on first use.
pub struct LexicalEngine {
    config: WeaveConfig,
    tokenizer: Tokenizer,
    replacer: Replacer,
    resolver: Arc<WordResolver>,
    bundled: Option<Arc<BundledDictionary>>,
    registry: DashMap<String, WordEntry>,
    progress: Option<BridgeSender>,
    initialized: OnceCell<usize>,
    rng: Mutex<StdRng>,
    counters: EngineCounters,
}

impl LexicalEngine {
    /// Creates an engine from a configuration and its collaborators
    pub fn new(config: WeaveConfig, parts: EngineParts) -> Self {
        let tokenizer = Tokenizer::new(TokenizerOptions::from_config(
            &config.tokenizer,
            &config.learning.marker_class,
        ));
        let replacer = Replacer::from_learning(&config.learning);
        let resolver = Arc::new(WordResolver::new(
            parts.store,
            parts.frequency,
            parts.orchestrator,
            config.learning.default_proficiency,
        ));
        let rng = match config.learning.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let bundled = parts.bundled.filter(|_| config.learning.bundled_fallback);

        Self {
            config,
            tokenizer,
            replacer,
            resolver,
            bundled,
            registry: DashMap::new(),
            progress: None,
            initialized: OnceCell::new(),
            rng: Mutex::new(rng),
            counters: EngineCounters::default(),
        }
    }

    /// Creates an engine with the default collaborators for `config`
    pub fn from_config(config: WeaveConfig, offline: bool) -> TranslationResult<Self> {
        let parts = EngineParts::from_config(&config, offline)?;
        Ok(Self::new(config, parts))
    }

    /// Attaches a bridge sender that receives `progress` messages
    pub fn with_progress(mut self, sender: BridgeSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<WordResolver> {
        &self.resolver
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Loads the source-language frequency list; later calls are no-ops
    ///
    /// # Returns
    ///
    /// The number of ranked words available for the source language (0 when unranked).
    pub async fn initialize(&self) -> usize {
        *self
            .initialized
            .get_or_init(|| async {
                let ranked = self
                    .resolver
                    .frequency()
                    .preload(&self.config.source_lang)
                    .await;
                info!(
                    "引擎初始化完成: {} -> {}，{} 个排名词，{} 个提供方",
                    self.config.source_lang,
                    self.config.target_lang,
                    ranked,
                    self.resolver.orchestrator().provider_count()
                );
                ranked
            })
            .await
    }

    /// Rewrites a markup fragment with foreign-language markers
    ///
    /// Never fails: words that cannot be resolved are left untouched and
    /// counted in `stats.unresolved_words`.
    ///
    /// # Arguments
    ///
    /// * `markup` - The HTML fragment to process
    ///
    /// # Returns
    ///
    /// The rewritten content, the inserted foreign words in document order, and statistics.
    pub async fn process_content(&self, markup: &str) -> ProcessOutput {
        self.initialize().await;
        let started = Instant::now();
        let source_lang = self.config.source_lang.as_str();
        let target_lang = self.config.target_lang.as_str();

        // 1. 分词
        self.report(ProgressStage::Tokenizing, 0, 1);
        let tokens = self.tokenizer.tokenize(markup);
        let words = get_unique_words(&tokens);
        debug!("{} 个词，{} 个待查", tokens.len(), words.len());

        // 2. 查词，流水线未命中时回退到内置词典
        self.report(ProgressStage::Resolving, 0, words.len());
        let resolutions = self
            .resolver
            .lookup_words(&words, source_lang, target_lang)
            .await;

        let mut entries: HashMap<String, WordEntry> = HashMap::with_capacity(words.len());
        let mut unresolved = 0;
        for word in &words {
            let resolved = resolutions
                .get(word)
                .and_then(|resolution| resolution.entry.clone())
                .or_else(|| self.bundled_lookup(word));
            match resolved {
                Some(entry) => {
                    entries.insert(word.clone(), entry);
                }
                None => unresolved += 1,
            }
        }
        self.report(ProgressStage::Resolving, words.len(), words.len());

        // 3. 选择与改写
        self.report(ProgressStage::Replacing, 0, entries.len());
        let output = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.replacer.replace(markup, &tokens, &entries, &mut *rng)
        };

        for word in &output.foreign_words {
            self.registry
                .entry(word.entry.id.clone())
                .or_insert_with(|| word.entry.clone());
        }

        let stats = ProcessStats {
            total_words: output.stats.total_words,
            eligible_words: output.stats.eligible_words,
            replaced_words: output.stats.replaced_words,
            protected_words: output.stats.protected_words,
            skipped_by_density: output.stats.skipped_by_density,
            unresolved_words: unresolved,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        self.counters.documents.fetch_add(1, Ordering::Relaxed);
        self.counters
            .words_replaced
            .fetch_add(stats.replaced_words, Ordering::Relaxed);
        self.counters
            .unresolved
            .fetch_add(unresolved, Ordering::Relaxed);
        self.report(ProgressStage::Done, stats.replaced_words, stats.eligible_words);

        info!(
            "处理完成: 替换 {}/{}，受保护 {}，未解析 {}，耗时 {}ms",
            stats.replaced_words,
            stats.total_words,
            stats.protected_words,
            stats.unresolved_words,
            stats.processing_time_ms
        );

        ProcessOutput {
            content: output.content,
            foreign_words: output.foreign_words,
            stats,
        }
    }

    /// Looks up a single word on demand, e.g. for a detail popup
    pub async fn translate_word(&self, word: &str) -> Resolution {
        self.initialize().await;
        let resolution = self
            .resolver
            .lookup_word(word, &self.config.source_lang, &self.config.target_lang)
            .await;

        let resolution = if resolution.is_found() {
            resolution
        } else {
            match self.bundled_lookup(word) {
                Some(entry) => Resolution::found(entry, ResolutionSource::Bundled),
                None => resolution,
            }
        };

        if let Some(entry) = &resolution.entry {
            self.registry
                .entry(entry.id.clone())
                .or_insert_with(|| entry.clone());
        }
        resolution
    }

    /// Samples up to `count` entries of a proficiency tier for review
    ///
    /// Falls back to the bundled dictionary when the store has nothing for the tier.
    pub async fn get_words_for_practice(
        &self,
        level: ProficiencyLevel,
        count: usize,
    ) -> TranslationResult<Vec<WordEntry>> {
        self.initialize().await;
        let source_lang = self.config.source_lang.as_str();
        let target_lang = self.config.target_lang.as_str();

        let mut pool = self
            .resolver
            .store()
            .get_by_level(source_lang, target_lang, level)
            .await?;
        if pool.is_empty() {
            if let Some(bundled) = &self.bundled {
                pool = bundled.entries_for_level(source_lang, target_lang, level);
            }
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pool.shuffle(&mut *rng);
        pool.truncate(count);
        Ok(pool)
    }

    /// Resolves the `count` most frequent source words so later reads work offline
    pub async fn pre_cache_words(&self, count: usize) -> PreCacheReport {
        self.initialize().await;
        let source_lang = self.config.source_lang.as_str();
        let target_lang = self.config.target_lang.as_str();

        let words = self
            .resolver
            .frequency()
            .get_top_words(source_lang, count)
            .await;
        if words.is_empty() {
            warn!("没有 {} 的词频数据，无法预缓存", source_lang);
            return PreCacheReport::default();
        }

        info!("预缓存 {} 个常用词 ({} -> {})", words.len(), source_lang, target_lang);
        let results = self
            .resolver
            .lookup_words(&words, source_lang, target_lang)
            .await;
        let resolved = results.values().filter(|r| r.is_found()).count();

        PreCacheReport {
            requested: words.len(),
            resolved,
            failed: words.len() - resolved,
        }
    }

    /// Whether any enabled provider serves the configured language pair
    pub fn is_language_pair_supported(&self) -> bool {
        self.resolver
            .orchestrator()
            .is_language_pair_supported(&self.config.source_lang, &self.config.target_lang)
    }

    /// Returns the entry behind a marker's `data-word-id`
    pub fn lookup_registered(&self, word_id: &str) -> Option<WordEntry> {
        self.registry.get(word_id).map(|entry| entry.value().clone())
    }

    /// Answers a message from the host
    ///
    /// A `wordTap` is answered with the tapped word's entry; other messages need no reply.
    pub fn handle_bridge_message(&self, message: &BridgeMessage) -> Option<WordEntry> {
        match message {
            BridgeMessage::WordTap { word_id, .. } => {
                let entry = self.lookup_registered(word_id);
                if entry.is_none() {
                    debug!("未知的词 id: {}", word_id);
                }
                entry
            }
            BridgeMessage::WordHoverEnd { .. } | BridgeMessage::Progress { .. } => None,
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            documents: self.counters.documents.load(Ordering::Relaxed),
            words_replaced: self.counters.words_replaced.load(Ordering::Relaxed),
            unresolved: self.counters.unresolved.load(Ordering::Relaxed),
            bundled_hits: self.counters.bundled_hits.load(Ordering::Relaxed),
            registered_words: self.registry.len(),
            resolver: self.resolver.stats(),
            orchestrator: self.resolver.orchestrator().stats(),
        }
    }

    fn bundled_lookup(&self, word: &str) -> Option<WordEntry> {
        let entry = self.bundled.as_ref()?.lookup(
            word,
            &self.config.source_lang,
            &self.config.target_lang,
        )?;
        self.counters.bundled_hits.fetch_add(1, Ordering::Relaxed);
        Some(entry)
    }

    /// 进度消息只是尽力投递，通道满或已关闭时丢弃
    fn report(&self, stage: ProgressStage, completed: usize, total: usize) {
        if let Some(sender) = &self.progress {
            if let Err(e) = sender.try_send(BridgeMessage::progress(stage, completed, total)) {
                debug!("进度消息未送达: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for LexicalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalEngine")
            .field("source_lang", &self.config.source_lang)
            .field("target_lang", &self.config.target_lang)
            .field("initialized", &self.is_initialized())
            .field("registered", &self.registry.len())
            .finish()
    }
}
