//! 词频排名服务
//!
//! 每种语言一张按频率降序排列的词表：排名 = 行号（从 1 开始）。
//! 词表从外部来源获取，在内存和键值存储中各缓存一份。缺失的语言
//! 不报错，查询结果为 `None` 或空列表，调用方按"未排名"处理。

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::lexicon::entry::{normalize_word, ProficiencyLevel};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::{KeyValueStore, MemoryKvStore};

/// 词频表来源
#[async_trait]
pub trait FrequencyListSource: Send + Sync {
    /// 来源名称，用于日志
    fn name(&self) -> &str;

    /// 取回某种语言的原始词表（每行 `word frequency`）
    async fn fetch(&self, lang: &str) -> TranslationResult<String>;
}

/// 通过 HTTP 下载词表，URL 模板中的 `{lang}` 会被替换为语言代码
#[derive(Debug, Clone)]
pub struct HttpFrequencySource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpFrequencySource {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wordweave/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn url_for(&self, lang: &str) -> String {
        self.url_template.replace("{lang}", lang)
    }
}

impl Default for HttpFrequencySource {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url_template: constants::DEFAULT_FREQUENCY_URL.to_string(),
        }
    }
}

#[async_trait]
impl FrequencyListSource for HttpFrequencySource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, lang: &str) -> TranslationResult<String> {
        let url = self.url_for(lang);
        debug!("下载词频表: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(TranslationError::NetworkError(format!(
                "词频表下载失败 {}: HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

/// 从本地目录读取 `<dir>/<lang>.txt`
#[derive(Debug, Clone)]
pub struct FileFrequencySource {
    dir: PathBuf,
}

impl FileFrequencySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", lang))
    }
}

#[async_trait]
impl FrequencyListSource for FileFrequencySource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, lang: &str) -> TranslationResult<String> {
        let path = self.path_for(lang);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| TranslationError::from(e).with_context(path.display()))
    }
}

/// 解析 `word frequency` 格式的词表，保持原有顺序、去重，最多保留 `max` 个词
pub fn parse_frequency_list(text: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .map(normalize_word)
        .filter(|word| word.chars().any(char::is_alphabetic))
        .filter(|word| seen.insert(word.clone()))
        .take(max)
        .collect()
}

/// 一种语言的词表
#[derive(Debug, Default)]
struct FrequencyList {
    words: Vec<String>,
    ranks: HashMap<String, u32>,
}

impl FrequencyList {
    fn new(words: Vec<String>) -> Self {
        let ranks = words
            .iter()
            .enumerate()
            .map(|(i, word)| (word.clone(), i as u32 + 1))
            .collect();
        Self { words, ranks }
    }
}

fn store_key(lang: &str) -> String {
    format!("freq:{}", lang)
}

/// 某种语言词表的加载结果
enum ListSlot {
    Ready(Arc<FrequencyList>),
    /// 来源没有该语言的数据
    Missing,
    /// 获取失败，到期后重试
    Failed(Instant),
}

enum LoadOutcome {
    Loaded(FrequencyList),
    Missing,
    Failed,
}

/// 词频排名服务
pub struct FrequencyService {
    source: Option<Arc<dyn FrequencyListSource>>,
    store: Arc<dyn KeyValueStore>,
    max_list_size: usize,
    lists: RwLock<HashMap<String, ListSlot>>,
    retry_after: Duration,
}

impl FrequencyService {
    pub fn new(
        source: Option<Arc<dyn FrequencyListSource>>,
        store: Arc<dyn KeyValueStore>,
        max_list_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            max_list_size,
            lists: RwLock::new(HashMap::new()),
            retry_after: Duration::from_secs(constants::FREQUENCY_RETRY_SECS),
        }
    }

    /// 获取失败后等待多久再次请求来源
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// 没有任何数据来源的服务，所有词都未排名
    pub fn disabled() -> Self {
        Self::new(
            None,
            Arc::new(MemoryKvStore::new()),
            constants::DEFAULT_MAX_LIST_SIZE,
        )
    }

    /// 排名到熟练度等级
    pub fn get_proficiency_level(rank: u32) -> ProficiencyLevel {
        ProficiencyLevel::from_rank(rank)
    }

    pub async fn get_word_rank(&self, lang: &str, word: &str) -> Option<u32> {
        let list = self.list(lang).await?;
        list.ranks.get(&normalize_word(word)).copied()
    }

    /// 某个等级排名区间内的词
    pub async fn get_words_by_proficiency(&self, lang: &str, level: ProficiencyLevel) -> Vec<String> {
        let Some(list) = self.list(lang).await else {
            return Vec::new();
        };
        let (low, high) = level.rank_range();
        let start = (low as usize).saturating_sub(1).min(list.words.len());
        // 高级没有上限，覆盖词表余下的全部排名
        let end = match level {
            ProficiencyLevel::Advanced => list.words.len(),
            _ => (high as usize).min(list.words.len()),
        };
        list.words[start..end].to_vec()
    }

    /// 最常见的前 `count` 个词
    pub async fn get_top_words(&self, lang: &str, count: usize) -> Vec<String> {
        match self.list(lang).await {
            Some(list) => list.words.iter().take(count).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// 预先加载词表，返回词数
    pub async fn preload(&self, lang: &str) -> usize {
        self.list(lang).await.map(|list| list.words.len()).unwrap_or(0)
    }

    async fn list(&self, lang: &str) -> Option<Arc<FrequencyList>> {
        match self.lists.read().await.get(lang) {
            Some(ListSlot::Ready(list)) => return Some(list.clone()),
            Some(ListSlot::Missing) => return None,
            Some(ListSlot::Failed(at)) if at.elapsed() < self.retry_after => return None,
            _ => {}
        }

        let slot = match self.load(lang).await {
            LoadOutcome::Loaded(list) => ListSlot::Ready(Arc::new(list)),
            LoadOutcome::Missing => ListSlot::Missing,
            LoadOutcome::Failed => ListSlot::Failed(Instant::now()),
        };

        let mut lists = self.lists.write().await;
        // 并发加载时保留已成功的结果
        if !matches!(lists.get(lang), Some(ListSlot::Ready(_))) {
            lists.insert(lang.to_string(), slot);
        }
        match lists.get(lang) {
            Some(ListSlot::Ready(list)) => Some(list.clone()),
            _ => None,
        }
    }

    async fn load(&self, lang: &str) -> LoadOutcome {
        let key = store_key(lang);
        match self.store.get(&key) {
            Ok(Some(persisted)) => {
                let words = parse_frequency_list(&persisted, self.max_list_size);
                if !words.is_empty() {
                    debug!("从本地存储加载 {} 词频表: {} 个词", lang, words.len());
                    return LoadOutcome::Loaded(FrequencyList::new(words));
                }
            }
            Ok(None) => {}
            Err(e) => warn!("读取本地词频表失败 ({}): {}", lang, e),
        }

        let Some(source) = self.source.as_ref() else {
            return LoadOutcome::Missing;
        };
        let raw = match source.fetch(lang).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "获取 {} 词频表失败 (来源: {})，{} 秒后重试: {}",
                    lang,
                    source.name(),
                    self.retry_after.as_secs(),
                    e
                );
                return LoadOutcome::Failed;
            }
        };

        let words = parse_frequency_list(&raw, self.max_list_size);
        if words.is_empty() {
            warn!("{} 词频表为空 (来源: {})", lang, source.name());
            return LoadOutcome::Missing;
        }

        if let Err(e) = self.store.set(&key, &words.join("\n")) {
            warn!("保存 {} 词频表失败: {}", lang, e);
        }
        info!("已加载 {} 词频表: {} 个词 (来源: {})", lang, words.len(), source.name());
        LoadOutcome::Loaded(FrequencyList::new(words))
    }
}

impl std::fmt::Debug for FrequencyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyService")
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("max_list_size", &self.max_list_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FrequencyListSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self, lang: &str) -> TranslationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if lang == "en" {
                Ok(self.body.clone())
            } else {
                Err(TranslationError::NetworkError("not found".to_string()))
            }
        }
    }

    fn ranked_words(count: usize) -> String {
        (1..=count)
            .map(|i| format!("w{} {}", i, 100_000 - i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_frequency_list() {
        let text = "the 2300000\nYou 1500000\n\n# comment\nthe 12\n123 99\nhouse 500";
        assert_eq!(parse_frequency_list(text, 10), vec!["the", "you", "house"]);
        assert_eq!(parse_frequency_list(text, 2), vec!["the", "you"]);
    }

    #[tokio::test]
    async fn test_rank_lookup_and_caching() {
        let source = Arc::new(CountingSource {
            body: "the 100\nhouse 50\nbig 10".to_string(),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryKvStore::new());
        let service = FrequencyService::new(Some(source.clone()), store.clone(), 100);

        assert_eq!(service.get_word_rank("en", "House").await, Some(2));
        assert_eq!(service.get_word_rank("en", "missing").await, None);
        assert_eq!(service.get_top_words("en", 2).await, vec!["the", "house"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // 持久化后，新实例无需来源也能读取
        let offline = FrequencyService::new(None, store, 100);
        assert_eq!(offline.get_word_rank("en", "big").await, Some(3));
    }

    #[tokio::test]
    async fn test_missing_language_is_unranked() {
        let source = Arc::new(CountingSource {
            body: String::new(),
            calls: AtomicUsize::new(0),
        });
        let service = FrequencyService::new(Some(source.clone()), Arc::new(MemoryKvStore::new()), 100);

        assert_eq!(service.get_word_rank("xx", "house").await, None);
        assert!(service.get_words_by_proficiency("xx", ProficiencyLevel::Beginner).await.is_empty());
        // 失败结果在重试间隔内不再请求
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        assert_eq!(FrequencyService::disabled().get_word_rank("en", "the").await, None);
    }

    #[tokio::test]
    async fn test_words_by_proficiency() {
        let source = Arc::new(CountingSource {
            body: ranked_words(2500),
            calls: AtomicUsize::new(0),
        });
        let service = FrequencyService::new(Some(source), Arc::new(MemoryKvStore::new()), 10_000);

        let beginner = service.get_words_by_proficiency("en", ProficiencyLevel::Beginner).await;
        assert_eq!(beginner.len(), 500);
        assert_eq!(beginner[0], "w1");

        let intermediate = service
            .get_words_by_proficiency("en", ProficiencyLevel::Intermediate)
            .await;
        assert_eq!(intermediate.len(), 1500);
        assert_eq!(intermediate[0], "w501");

        let advanced = service.get_words_by_proficiency("en", ProficiencyLevel::Advanced).await;
        assert_eq!(advanced.len(), 500);
        assert_eq!(advanced[0], "w2001");
        assert_eq!(
            FrequencyService::get_proficiency_level(2001),
            ProficiencyLevel::Advanced
        );
    }

    #[tokio::test]
    async fn test_advanced_covers_ranks_past_reference_bound() {
        let source = Arc::new(CountingSource {
            body: ranked_words(8000),
            calls: AtomicUsize::new(0),
        });
        let service = FrequencyService::new(Some(source), Arc::new(MemoryKvStore::new()), 10_000);

        assert_eq!(service.get_word_rank("en", "w7000").await, Some(7000));
        assert_eq!(
            FrequencyService::get_proficiency_level(7000),
            ProficiencyLevel::Advanced
        );

        let advanced = service.get_words_by_proficiency("en", ProficiencyLevel::Advanced).await;
        assert_eq!(advanced.len(), 6000);
        assert!(advanced.contains(&"w7000".to_string()));
        assert_eq!(advanced.last().map(String::as_str), Some("w8000"));
    }

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FrequencyListSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self, _lang: &str) -> TranslationResult<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TranslationError::NetworkError("connection reset".to_string()))
            } else {
                Ok("the 100\nhouse 50".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_retried_after_backoff() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        let service = FrequencyService::new(Some(source.clone()), Arc::new(MemoryKvStore::new()), 100)
            .with_retry_after(Duration::from_secs(30));

        assert_eq!(service.get_word_rank("en", "house").await, None);
        assert_eq!(service.get_word_rank("en", "house").await, None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1, "no refetch inside the backoff");

        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(service.get_word_rank("en", "house").await, Some(2));
        assert_eq!(service.get_word_rank("en", "the").await, Some(1));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_url_template() {
        let source = HttpFrequencySource::default();
        assert!(source.url_for("es").contains("/es/es_50k.txt"));
    }
}
