// 集成测试公共模块
//
// 提供可编排的模拟提供方、静态词频来源和引擎构建辅助

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wordweave::lexicon::{FrequencyListSource, FrequencyService, ProficiencyLevel, ResolutionSource, WordEntry};
use wordweave::translation::config::OrchestratorConfig;
use wordweave::translation::{
    DictionaryStore, MemoryDictionaryStore, MemoryKvStore, ProviderOrchestrator, ProviderResponse,
    RegisteredProvider, ResponseCache, TranslationError, TranslationProvider, TranslationResult,
    WeaveConfig,
};
use wordweave::{EngineParts, LexicalEngine};

/// 按词表应答的模拟提供方
pub struct ScriptedProvider {
    id: String,
    endpoints: Vec<String>,
    answers: HashMap<String, String>,
    failing_endpoints: HashSet<String>,
    languages: Option<Vec<String>>,
    rate_limited: AtomicBool,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, answers: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            endpoints: vec![format!("https://{}.test", id)],
            answers: answers
                .iter()
                .map(|(word, translation)| (word.to_string(), translation.to_string()))
                .collect(),
            failing_endpoints: HashSet::new(),
            languages: None,
            rate_limited: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_endpoints(mut self, endpoints: &[&str]) -> Self {
        self.endpoints = endpoints.iter().map(|e| e.to_string()).collect();
        self
    }

    /// 对这个端点的请求一律返回网络错误
    pub fn failing_on(mut self, endpoint: &str) -> Self {
        self.failing_endpoints.insert(endpoint.to_string());
        self
    }

    pub fn failing_everywhere(mut self) -> Self {
        self.failing_endpoints = self.endpoints.iter().cloned().collect();
        self
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = Some(languages.iter().map(|l| l.to_string()).collect());
        self
    }

    /// 之后的请求返回 `RateLimited`
    pub fn start_rate_limiting(&self) {
        self.rate_limited.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn supports_language(&self, code: &str) -> bool {
        match &self.languages {
            Some(languages) => languages.iter().any(|l| l == code),
            None => true,
        }
    }

    async fn translate(
        &self,
        endpoint: &str,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> TranslationResult<ProviderResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), text.to_string()));

        if self.failing_endpoints.contains(endpoint) {
            return Err(TranslationError::NetworkError(format!("{} unreachable", endpoint)));
        }
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(TranslationError::RateLimited(self.id.clone()));
        }
        match self.answers.get(&text.to_lowercase()) {
            Some(answer) => Ok(ProviderResponse::new(answer.clone())),
            None => Err(TranslationError::MalformedResponse(format!("no answer for {}", text))),
        }
    }
}

/// 内存中的词频表
pub struct StaticFrequencySource {
    lists: HashMap<String, String>,
}

impl StaticFrequencySource {
    pub fn new(lang: &str, words: &[&str]) -> Self {
        let text = words
            .iter()
            .enumerate()
            .map(|(i, word)| format!("{} {}", word, 100_000 - i))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            lists: [(lang.to_string(), text)].into_iter().collect(),
        }
    }
}

#[async_trait]
impl FrequencyListSource for StaticFrequencySource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, lang: &str) -> TranslationResult<String> {
        self.lists
            .get(lang)
            .cloned()
            .ok_or_else(|| TranslationError::NetworkError(format!("no list for {}", lang)))
    }
}

/// 测试用配置：确定性种子、满密度、无间距、无内置词典、无真实提供方
pub fn test_config() -> WeaveConfig {
    let mut config = WeaveConfig::default();
    config.providers.clear();
    config.frequency.enabled = false;
    config.learning.seed = Some(7);
    config.learning.density = 1.0;
    config.learning.min_word_spacing = 0;
    config.learning.bundled_fallback = false;
    config
}

/// 快速的编排器配置，批次之间不等待
pub fn fast_orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        batch_delay_ms: 0,
        ..OrchestratorConfig::default()
    }
}

pub fn orchestrator(providers: Vec<RegisteredProvider>) -> Arc<ProviderOrchestrator> {
    let config = fast_orchestrator_config();
    let cache = ResponseCache::new(config.response_cache_size, None);
    Arc::new(ProviderOrchestrator::new(providers, cache, config))
}

pub fn register(provider: &Arc<ScriptedProvider>, requests_per_minute: u32) -> RegisteredProvider {
    RegisteredProvider::new(provider.clone(), requests_per_minute)
}

pub fn frequency(words: &[&str]) -> Arc<FrequencyService> {
    Arc::new(FrequencyService::new(
        Some(Arc::new(StaticFrequencySource::new("en", words))),
        Arc::new(MemoryKvStore::new()),
        10_000,
    ))
}

/// 已排名的英西词条
pub fn entry(word: &str, translation: &str, rank: u32) -> WordEntry {
    WordEntry::new(
        word,
        translation,
        "en",
        "es",
        ProficiencyLevel::from_rank(rank),
        ResolutionSource::Store,
    )
    .with_rank(Some(rank))
}

pub fn store_with(entries: Vec<WordEntry>) -> Arc<dyn DictionaryStore> {
    Arc::new(MemoryDictionaryStore::with_entries(entries))
}

/// 只用词典存储的引擎
pub fn store_engine(config: WeaveConfig, entries: Vec<WordEntry>) -> LexicalEngine {
    LexicalEngine::new(
        config,
        EngineParts {
            store: store_with(entries),
            frequency: Arc::new(FrequencyService::disabled()),
            orchestrator: orchestrator(Vec::new()),
            bundled: None,
        },
    )
}

/// 词典存储为空、只靠提供方的引擎
pub fn provider_engine(
    config: WeaveConfig,
    providers: Vec<RegisteredProvider>,
    ranked_words: &[&str],
) -> LexicalEngine {
    LexicalEngine::new(
        config,
        EngineParts {
            store: store_with(Vec::new()),
            frequency: frequency(ranked_words),
            orchestrator: orchestrator(providers),
            bundled: None,
        },
    )
}
