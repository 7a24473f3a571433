//! 翻译模块
//!
//! 负责把单词交给外部翻译提供方，并处理缓存、降级和限流：
//! - **config**: 配置管理
//! - **error**: 错误处理
//! - **providers**: 提供方接口与内置 HTTP 提供方
//! - **orchestrator**: 按优先级调度提供方
//! - **storage**: 响应缓存、词典存储和键值持久化
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use wordweave::translation::{
//!     build_providers, OrchestratorConfig, ProviderConfig, ProviderOrchestrator, ResponseCache,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OrchestratorConfig::default();
//! let providers = build_providers(&ProviderConfig::builtin(), config.request_timeout())?;
//! let cache = ResponseCache::new(config.response_cache_size, None);
//! let orchestrator = ProviderOrchestrator::new(providers, cache, config);
//!
//! let translation = orchestrator.translate("house", "en", "es").await?;
//! println!("{} ({})", translation.text, translation.provider);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 提供方调度
pub mod orchestrator;

/// 翻译提供方
pub mod providers;

/// 存储管理模块 - 缓存和持久化存储
pub mod storage;

// ============================================================================
// 公共API重新导出
// ============================================================================

pub use config::{ConfigManager, OrchestratorConfig, WeaveConfig};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use orchestrator::{
    BulkTranslation, ProviderOrchestrator, ProviderState, ProviderStatus, Translation,
};
pub use providers::{
    build_providers, HttpProvider, ProviderConfig, ProviderKind, ProviderResponse,
    RegisteredProvider, TranslationProvider,
};
pub use storage::{
    import_json_file, DictionaryStore, KeyValueStore, KvDictionaryStore, MemoryDictionaryStore,
    MemoryKvStore, RedbKvStore, ResponseCache,
};
