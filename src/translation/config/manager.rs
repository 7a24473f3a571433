//! 配置管理器
//!
//! 加载顺序：`.env` 文件 → 内置默认值 → 配置文件 → `WORDWEAVE__*` 分层环境变量
//! → `env.rs` 中的类型化环境变量 → 验证。

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::lexicon::entry::{PartOfSpeech, ProficiencyLevel};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::providers::ProviderConfig;
use crate::weave::selection::SelectionStrategy;

/// 学习参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// 替换比例，(0, 1]
    pub density: f64,
    /// 相邻替换之间至少间隔的估算词数
    pub min_word_spacing: usize,
    pub max_proficiency: ProficiencyLevel,
    pub strategy: SelectionStrategy,
    pub preferred_parts_of_speech: Vec<PartOfSpeech>,
    pub excluded_words: Vec<String>,
    /// 没有词频排名的新译词使用的等级
    pub default_proficiency: ProficiencyLevel,
    pub seed: Option<u64>,
    pub bundled_fallback: bool,
    pub marker_class: String,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            density: constants::DEFAULT_DENSITY,
            min_word_spacing: constants::DEFAULT_MIN_WORD_SPACING,
            max_proficiency: ProficiencyLevel::Intermediate,
            strategy: SelectionStrategy::default(),
            preferred_parts_of_speech: vec![PartOfSpeech::Noun, PartOfSpeech::Adjective],
            excluded_words: Vec::new(),
            default_proficiency: ProficiencyLevel::Intermediate,
            seed: None,
            bundled_fallback: true,
            marker_class: constants::DEFAULT_MARKER_CLASS.to_string(),
        }
    }
}

/// 分词参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub min_word_length: usize,
    pub max_word_length: usize,
    pub skip_quoted: bool,
    pub skip_names: bool,
    pub skip_words: Vec<String>,
    pub extra_skip_elements: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_word_length: constants::DEFAULT_MIN_WORD_LENGTH,
            max_word_length: constants::DEFAULT_MAX_WORD_LENGTH,
            skip_quoted: true,
            skip_names: true,
            skip_words: Vec::new(),
            extra_skip_elements: Vec::new(),
        }
    }
}

/// 提供方调度参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub request_timeout_secs: u64,
    pub bulk_batch_size: usize,
    pub batch_delay_ms: u64,
    pub rate_window_secs: u64,
    pub response_cache_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            bulk_batch_size: constants::DEFAULT_BULK_BATCH_SIZE,
            batch_delay_ms: constants::DEFAULT_BATCH_DELAY_MS,
            rate_window_secs: constants::RATE_WINDOW.as_secs(),
            response_cache_size: constants::DEFAULT_RESPONSE_CACHE_SIZE,
        }
    }
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}

/// 词频表来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub enabled: bool,
    /// 含 `{lang}` 占位符的下载地址
    pub url_template: Option<String>,
    /// 本地词频表目录（`{lang}.txt`），优先于远程地址
    pub local_dir: Option<String>,
    pub max_list_size: usize,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url_template: Some(constants::DEFAULT_FREQUENCY_URL.to_string()),
            local_dir: None,
            max_list_size: constants::DEFAULT_MAX_LIST_SIZE,
        }
    }
}

/// 持久化存储
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// redb 数据库文件，未设置时只使用内存
    pub path: Option<String>,
}

impl StorageConfig {
    /// 展开 `~` 后的路径
    pub fn resolved_path(&self) -> Option<String> {
        self.path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| shellexpand::tilde(p).into_owned())
    }
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub source_lang: String,
    pub target_lang: String,
    pub learning: LearningConfig,
    pub tokenizer: TokenizerConfig,
    pub providers: Vec<ProviderConfig>,
    pub orchestrator: OrchestratorConfig,
    pub frequency: FrequencyConfig,
    pub storage: StorageConfig,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            learning: LearningConfig::default(),
            tokenizer: TokenizerConfig::default(),
            providers: ProviderConfig::builtin(),
            orchestrator: OrchestratorConfig::default(),
            frequency: FrequencyConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl WeaveConfig {
    /// 直接解析 TOML 文档（缺省字段取默认值），并验证
    pub fn from_toml_str(content: &str) -> TranslationResult<Self> {
        let config: WeaveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.source_lang.trim().is_empty() || self.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("语言代码不能为空".to_string()));
        }

        if self.source_lang.eq_ignore_ascii_case(&self.target_lang) {
            return Err(TranslationError::ConfigError(format!(
                "源语言与目标语言相同: {}",
                self.source_lang
            )));
        }

        let density = self.learning.density;
        if !(density > 0.0 && density <= 1.0) {
            return Err(TranslationError::ConfigError(format!(
                "替换密度必须在 (0, 1] 之间: {}",
                density
            )));
        }

        if self.tokenizer.min_word_length == 0 {
            return Err(TranslationError::ConfigError("最小词长不能为0".to_string()));
        }

        if self.tokenizer.min_word_length > self.tokenizer.max_word_length {
            return Err(TranslationError::ConfigError(format!(
                "最小词长 {} 大于最大词长 {}",
                self.tokenizer.min_word_length, self.tokenizer.max_word_length
            )));
        }

        if self.orchestrator.bulk_batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.orchestrator.response_cache_size == 0 {
            return Err(TranslationError::ConfigError("响应缓存大小不能为0".to_string()));
        }

        if self.orchestrator.request_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("请求超时不能为0".to_string()));
        }

        for provider in &self.providers {
            provider.validate()?;
        }

        Ok(())
    }

    /// 应用类型化环境变量覆盖（只覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{learning, providers, storage, EnvVar};

        if let Some(lang) = learning::SourceLang::get_override() {
            self.source_lang = lang;
        }
        if let Some(lang) = learning::TargetLang::get_override() {
            self.target_lang = lang;
        }
        if let Some(density) = learning::Density::get_override() {
            self.learning.density = density;
        }
        if let Some(spacing) = learning::MinWordSpacing::get_override() {
            self.learning.min_word_spacing = spacing;
        }
        if let Some(level) = learning::MaxProficiency::get_override() {
            self.learning.max_proficiency = level;
        }
        if let Some(strategy) = learning::Strategy::get_override() {
            self.learning.strategy = strategy;
        }
        if let Some(seed) = learning::Seed::get_override() {
            self.learning.seed = Some(seed);
        }
        if let Some(fallback) = learning::BundledFallback::get_override() {
            self.learning.bundled_fallback = fallback;
        }

        if let Some(timeout) = providers::RequestTimeout::get_override() {
            self.orchestrator.request_timeout_secs = timeout.as_secs();
        }
        if let Some(batch) = providers::BulkBatchSize::get_override() {
            self.orchestrator.bulk_batch_size = batch;
        }
        if let Some(delay) = providers::BatchDelay::get_override() {
            self.orchestrator.batch_delay_ms = delay.as_millis() as u64;
        }

        if let Some(path) = storage::StorePath::get_override() {
            tracing::info!("环境变量覆盖存储路径: {}", path);
            self.storage.path = Some(path);
        }
        if let Some(size) = storage::ResponseCacheSize::get_override() {
            self.orchestrator.response_cache_size = size;
        }
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WeaveConfig,
    config_path: Option<String>,
}

impl ConfigManager {
    /// 从默认位置加载配置
    pub fn new() -> TranslationResult<Self> {
        Self::load(None)
    }

    /// 加载配置；指定路径时该文件必须存在
    pub fn load(explicit_path: Option<&Path>) -> TranslationResult<Self> {
        Self::load_dotenv();

        let mut builder = Config::builder().add_source(
            Config::try_from(&WeaveConfig::default())
                .map_err(|e| TranslationError::ConfigError(format!("默认配置错误: {}", e)))?,
        );

        let mut config_path = None;
        match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TranslationError::ConfigError(format!(
                        "配置文件不存在: {}",
                        path.display()
                    )));
                }
                builder = builder.add_source(File::from(path));
                config_path = Some(path.display().to_string());
            }
            None => {
                for path in constants::CONFIG_PATHS {
                    let expanded_path = shellexpand::tilde(path);
                    if Path::new(expanded_path.as_ref()).exists() {
                        builder = builder.add_source(File::with_name(&expanded_path));
                        config_path = Some(expanded_path.to_string());
                        break;
                    }
                }
            }
        }

        match config_path {
            Some(ref path) => tracing::info!("加载配置文件: {}", path),
            None => tracing::info!("未找到配置文件，使用默认配置"),
        }

        builder = builder.add_source(
            Environment::with_prefix(constants::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: WeaveConfig = builder
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("构建配置失败: {}", e)))?
            .try_deserialize()
            .map_err(|e| TranslationError::ConfigError(format!("反序列化配置失败: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;

        tracing::debug!(
            "配置已加载: {} -> {}, 密度 {}, {} 个提供方",
            config.source_lang,
            config.target_lang,
            config.learning.density,
            config.providers.len()
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// 获取配置
    pub fn get_config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    pub fn into_config(self) -> WeaveConfig {
        self.config
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &Path) -> TranslationResult<()> {
        let content = toml::to_string_pretty(&WeaveConfig::default())
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WeaveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.bulk_batch_size, 10);
        assert_eq!(config.orchestrator.rate_window(), Duration::from_secs(60));
        assert_eq!(config.learning.default_proficiency, ProficiencyLevel::Intermediate);
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = WeaveConfig::from_toml_str(
            r#"
            source_lang = "en"
            target_lang = "fr"

            [learning]
            density = 0.3
            max_proficiency = "advanced"
            strategy = "frequency"

            [orchestrator]
            bulk_batch_size = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.target_lang, "fr");
        assert_eq!(config.learning.density, 0.3);
        assert_eq!(config.learning.max_proficiency, ProficiencyLevel::Advanced);
        assert_eq!(config.learning.strategy, SelectionStrategy::Frequency);
        assert_eq!(config.orchestrator.bulk_batch_size, 5);
        // 未指定的部分保留默认值
        assert_eq!(config.tokenizer, TokenizerConfig::default());
        assert!(!config.providers.is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = WeaveConfig::default();
        config.learning.density = 0.0;
        assert!(config.validate().is_err());

        let mut config = WeaveConfig::default();
        config.learning.density = 1.5;
        assert!(config.validate().is_err());

        let mut config = WeaveConfig::default();
        config.target_lang = "EN".to_string();
        assert!(config.validate().is_err());

        let mut config = WeaveConfig::default();
        config.tokenizer.min_word_length = 10;
        config.tokenizer.max_word_length = 5;
        assert!(config.validate().is_err());

        let mut config = WeaveConfig::default();
        config.orchestrator.bulk_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_providers_section() {
        let config = WeaveConfig::from_toml_str(
            r#"
            [[providers]]
            name = "local-libre"
            kind = "libretranslate"
            endpoints = ["http://localhost:5000"]
            requests_per_minute = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.providers.len(), 1);
        assert!(config.providers[0].enabled);
        assert_eq!(config.providers[0].priority, 0);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        std::fs::write(&path, "target_lang = \"de\"\n[learning]\nmin_word_spacing = 7\n").unwrap();

        let manager = ConfigManager::load(Some(&path)).unwrap();
        assert_eq!(manager.get_config().target_lang, "de");
        assert_eq!(manager.get_config().learning.min_word_spacing, 7);
        assert!(manager.config_path().is_some());

        let missing = dir.path().join("missing.toml");
        assert!(ConfigManager::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_storage_path_expansion() {
        let storage = StorageConfig {
            path: Some("~/wordweave.redb".to_string()),
        };
        let resolved = storage.resolved_path().unwrap();
        assert!(!resolved.starts_with('~'));
        assert_eq!(StorageConfig::default().resolved_path(), None);
    }
}
