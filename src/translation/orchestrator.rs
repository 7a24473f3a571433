//! 翻译提供方编排器
//!
//! 单次翻译的流程：
//! 1. 查询响应缓存，命中直接返回（`cached = true`）
//! 2. 按优先级依次尝试提供方，每次尝试的结果是成功、跳过或失败之一
//! 3. 成功的响应写入缓存并计入该提供方的速率窗口
//! 4. 全部跳过或失败时返回 [`TranslationError::ProvidersExhausted`]
//!
//! 多镜像提供方失败后，后续调用改用下一个镜像；本次调用不重试。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::{sleep, timeout, Instant};

use crate::translation::config::OrchestratorConfig;
use crate::translation::error::{helpers, ErrorCategory, TranslationError, TranslationResult};
use crate::translation::providers::{ProviderResponse, RegisteredProvider};
use crate::translation::storage::{CacheKey, CacheStatsSnapshot, CachedTranslation, ResponseCache};

/// 一次翻译的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub provider: String,
    pub confidence: Option<f32>,
    pub cached: bool,
}

/// 批量翻译结果：成功的译文与失败的原词
#[derive(Debug, Clone, Default)]
pub struct BulkTranslation {
    pub translations: HashMap<String, Translation>,
    pub failed: Vec<String>,
}

/// 提供方当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderState {
    Disabled,
    RateLimited,
    Available,
}

/// 提供方状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub id: String,
    pub state: ProviderState,
    pub endpoint: String,
    pub requests_in_window: u32,
    pub requests_per_minute: u32,
}

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    Disabled,
    UnsupportedLanguage,
    RateLimited,
}

/// 单个提供方的一次尝试
#[derive(Debug)]
enum Attempt {
    Success(ProviderResponse),
    Skip(SkipReason),
    Fail(TranslationError),
}

/// 固定窗口计数器
#[derive(Debug)]
struct RateWindow {
    started: Instant,
    count: u32,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            count: 0,
        }
    }

    fn roll(&mut self, window: Duration) {
        if self.started.elapsed() >= window {
            self.started = Instant::now();
            self.count = 0;
        }
    }

    fn is_limited(&mut self, budget: u32, window: Duration) -> bool {
        self.roll(window);
        self.count >= budget
    }

    fn record(&mut self, window: Duration) {
        self.roll(window);
        self.count = self.count.saturating_add(1);
    }

    /// 提供方主动限流时，本窗口剩余时间内不再调用
    fn exhaust(&mut self, budget: u32, window: Duration) {
        self.roll(window);
        self.count = self.count.max(budget);
    }
}

struct ProviderSlot {
    registered: RegisteredProvider,
    window: Mutex<RateWindow>,
    mirror: AtomicUsize,
}

impl ProviderSlot {
    fn id(&self) -> &str {
        self.registered.provider.id()
    }

    fn current_endpoint(&self) -> String {
        let endpoints = self.registered.provider.endpoints();
        if endpoints.is_empty() {
            return String::new();
        }
        let index = self.mirror.load(Ordering::Relaxed) % endpoints.len();
        endpoints[index].clone()
    }

    fn rotate_mirror(&self) {
        let count = self.registered.provider.endpoints().len();
        if count > 1 {
            let next = (self.mirror.load(Ordering::Relaxed) + 1) % count;
            self.mirror.store(next, Ordering::Relaxed);
            tracing::info!("{} 切换到镜像 {}", self.id(), self.current_endpoint());
        }
    }

    fn window(&self) -> std::sync::MutexGuard<'_, RateWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn supports_pair(&self, source_lang: &str, target_lang: &str) -> bool {
        let provider = &self.registered.provider;
        provider.supports_language(source_lang) && provider.supports_language(target_lang)
    }
}

/// 编排器统计
#[derive(Debug, Default)]
struct OrchestratorStats {
    requests: AtomicUsize,
    cache_hits: AtomicUsize,
    provider_calls: AtomicUsize,
    successes: AtomicUsize,
    rate_limited_skips: AtomicUsize,
    exhausted: AtomicUsize,
    failures_by_category: DashMap<ErrorCategory, usize>,
}

/// 编排器统计快照
#[derive(Debug, Clone, Default)]
pub struct OrchestratorStatsSnapshot {
    pub requests: usize,
    pub cache_hits: usize,
    pub provider_calls: usize,
    pub successes: usize,
    pub rate_limited_skips: usize,
    pub exhausted: usize,
    pub failures_by_category: HashMap<ErrorCategory, usize>,
    pub cache: CacheStatsSnapshot,
}

/// 翻译提供方编排器
pub struct ProviderOrchestrator {
    slots: Vec<ProviderSlot>,
    cache: ResponseCache,
    config: OrchestratorConfig,
    stats: OrchestratorStats,
}

impl ProviderOrchestrator {
    /// 创建编排器，提供方按 `priority` 升序排列（相同优先级保持注册顺序）
    pub fn new(
        mut providers: Vec<RegisteredProvider>,
        cache: ResponseCache,
        config: OrchestratorConfig,
    ) -> Self {
        providers.sort_by_key(|p| p.priority);
        let slots = providers
            .into_iter()
            .map(|registered| ProviderSlot {
                registered,
                window: Mutex::new(RateWindow::new()),
                mirror: AtomicUsize::new(0),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "编排器初始化: {}",
            slots.iter().map(|s| s.id()).collect::<Vec<_>>().join(", ")
        );

        Self {
            slots,
            cache,
            config,
            stats: OrchestratorStats::default(),
        }
    }

    /// 翻译一段文本
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Translation> {
        if text.trim().is_empty() {
            return Err(TranslationError::InvalidInput("待翻译文本为空".to_string()));
        }
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(hit) = self.cached(text, source_lang, target_lang) {
            return Ok(hit);
        }

        self.translate_uncached(text, source_lang, target_lang).await
    }

    /// 批量翻译单词
    ///
    /// 已缓存的词直接返回；其余按 `bulk_batch_size` 分批，批内逐个顺序翻译，
    /// 批次之间暂停 `batch_delay`。单个词失败只记入 `failed`。
    pub async fn translate_bulk(
        &self,
        words: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> BulkTranslation {
        let mut result = BulkTranslation::default();
        let mut pending = Vec::new();

        for word in words {
            if word.trim().is_empty()
                || result.translations.contains_key(word)
                || pending.contains(word)
            {
                continue;
            }
            self.stats.requests.fetch_add(1, Ordering::Relaxed);
            match self.cached(word, source_lang, target_lang) {
                Some(hit) => {
                    result.translations.insert(word.clone(), hit);
                }
                None => pending.push(word.clone()),
            }
        }

        let batch_size = self.config.bulk_batch_size.max(1);
        let batch_count = pending.len().div_ceil(batch_size);
        if batch_count > 0 {
            tracing::info!(
                "批量翻译 {} 个词（缓存命中 {}），共 {} 批",
                pending.len(),
                result.translations.len(),
                batch_count
            );
        }

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            if index > 0 {
                sleep(self.config.batch_delay()).await;
            }
            for word in batch {
                match self.translate_uncached(word, source_lang, target_lang).await {
                    Ok(translation) => {
                        result.translations.insert(word.clone(), translation);
                    }
                    Err(e) => {
                        tracing::debug!("批量翻译失败 '{}': {}", word, e);
                        result.failed.push(word.clone());
                    }
                }
            }
        }

        result
    }

    /// 是否有启用的提供方同时服务这两种语言
    pub fn is_language_pair_supported(&self, source_lang: &str, target_lang: &str) -> bool {
        if source_lang.eq_ignore_ascii_case(target_lang) {
            return false;
        }
        self.slots
            .iter()
            .any(|slot| slot.registered.enabled && slot.supports_pair(source_lang, target_lang))
    }

    /// 各提供方的状态快照
    pub fn provider_states(&self) -> Vec<ProviderStatus> {
        let window = self.config.rate_window();
        self.slots
            .iter()
            .map(|slot| {
                let budget = slot.registered.requests_per_minute;
                let (limited, count) = {
                    let mut guard = slot.window();
                    let limited = guard.is_limited(budget, window);
                    (limited, guard.count)
                };
                let state = if !slot.registered.enabled {
                    ProviderState::Disabled
                } else if limited {
                    ProviderState::RateLimited
                } else {
                    ProviderState::Available
                };
                ProviderStatus {
                    id: slot.id().to_string(),
                    state,
                    endpoint: slot.current_endpoint(),
                    requests_in_window: count,
                    requests_per_minute: budget,
                }
            })
            .collect()
    }

    pub fn provider_count(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        OrchestratorStatsSnapshot {
            requests: self.stats.requests.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            provider_calls: self.stats.provider_calls.load(Ordering::Relaxed),
            successes: self.stats.successes.load(Ordering::Relaxed),
            rate_limited_skips: self.stats.rate_limited_skips.load(Ordering::Relaxed),
            exhausted: self.stats.exhausted.load(Ordering::Relaxed),
            failures_by_category: self
                .stats
                .failures_by_category
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            cache: self.cache.stats(),
        }
    }

    fn cached(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<Translation> {
        let key = CacheKey::new(text, source_lang, target_lang);
        let hit = self.cache.get(&key)?;
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        Some(Translation {
            text: hit.translated_text,
            source_language: source_lang.to_string(),
            target_language: target_lang.to_string(),
            provider: hit.provider,
            confidence: hit.confidence,
            cached: true,
        })
    }

    async fn translate_uncached(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Translation> {
        let mut outcomes: Vec<String> = Vec::new();

        for slot in &self.slots {
            match self.attempt(slot, text, source_lang, target_lang).await {
                Attempt::Success(response) => {
                    let provider = slot.id().to_string();
                    self.cache.put(
                        CacheKey::new(text, source_lang, target_lang),
                        CachedTranslation::new(&response.translated_text, &provider, response.confidence),
                    );
                    self.stats.successes.fetch_add(1, Ordering::Relaxed);
                    record_outcome(&provider, "success");

                    return Ok(Translation {
                        text: response.translated_text,
                        source_language: source_lang.to_string(),
                        target_language: target_lang.to_string(),
                        provider,
                        confidence: response.confidence,
                        cached: false,
                    });
                }
                Attempt::Skip(reason) => {
                    if reason == SkipReason::RateLimited {
                        self.stats.rate_limited_skips.fetch_add(1, Ordering::Relaxed);
                        record_outcome(slot.id(), "rate_limited");
                    }
                    outcomes.push(format!("{}: 跳过({:?})", slot.id(), reason));
                }
                Attempt::Fail(error) => {
                    *self
                        .stats
                        .failures_by_category
                        .entry(error.category())
                        .or_insert(0) += 1;
                    record_outcome(slot.id(), "failure");
                    outcomes.push(format!("{}: {}", slot.id(), error));
                    helpers::log_error(
                        &error.with_context(format!("提供方 {} 翻译 '{}'", slot.id(), text)),
                    );
                }
            }
        }

        self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
        let summary = if outcomes.is_empty() {
            "没有注册提供方".to_string()
        } else {
            outcomes.join("; ")
        };
        Err(TranslationError::ProvidersExhausted(format!("'{}' ({})", text, summary)))
    }

    async fn attempt(
        &self,
        slot: &ProviderSlot,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Attempt {
        if !slot.registered.enabled {
            return Attempt::Skip(SkipReason::Disabled);
        }
        if !slot.supports_pair(source_lang, target_lang) {
            return Attempt::Skip(SkipReason::UnsupportedLanguage);
        }

        let window = self.config.rate_window();
        let budget = slot.registered.requests_per_minute;
        if slot.window().is_limited(budget, window) {
            tracing::debug!("提供方 {} 已达到速率上限，跳过", slot.id());
            return Attempt::Skip(SkipReason::RateLimited);
        }

        let endpoint = slot.current_endpoint();
        self.stats.provider_calls.fetch_add(1, Ordering::Relaxed);

        let call = slot
            .registered
            .provider
            .translate(&endpoint, text, source_lang, target_lang);
        let result = match timeout(self.config.request_timeout(), call).await {
            Ok(result) => result,
            Err(elapsed) => Err(TranslationError::from(elapsed).with_context(slot.id())),
        };

        match result {
            Ok(response) => {
                slot.window().record(window);
                Attempt::Success(response)
            }
            Err(error) => {
                if matches!(error, TranslationError::RateLimited(_)) {
                    slot.window().exhaust(budget, window);
                }
                slot.rotate_mirror();
                Attempt::Fail(error)
            }
        }
    }
}

fn record_outcome(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "wordweave_provider_requests_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

impl std::fmt::Debug for ProviderOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOrchestrator")
            .field("providers", &self.slots.iter().map(|s| s.id()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 无提供方的编排器（离线模式）
impl Default for ProviderOrchestrator {
    fn default() -> Self {
        let config = OrchestratorConfig::default();
        let cache = ResponseCache::new(config.response_cache_size, None);
        Self::new(Vec::new(), cache, config)
    }
}
