//! 统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 软性未命中（分词丢弃、查词无结果、批量翻译失败列表）不是错误，
//! 不会出现在这里；这里只描述真正需要向调用方报告的失败。

use std::fmt;

use thiserror::Error;

/// 翻译与查词错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误（连接失败、非成功状态码）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 提供方返回限流响应或本地计数已用尽
    #[error("请求速率过快，已达到限制: {0}")]
    RateLimited(String),

    /// 提供方响应无法解析或缺少译文
    #[error("响应格式错误: {0}")]
    MalformedResponse(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 持久化存储错误
    #[error("存储错误: {0}")]
    StoreError(String),

    /// 重复键写入，调用方应视为幂等成功
    #[error("条目已存在: {0}")]
    DuplicateEntry(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 不支持的语言对
    #[error("不支持的语言对: {source_lang} -> {target_lang}")]
    UnsupportedLanguagePair {
        source_lang: String,
        target_lang: String,
    },

    /// 所有可用提供方都失败或被限流
    #[error("所有翻译提供方均不可用: {0}")]
    ProvidersExhausted(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::RateLimited(_) => true,
            TranslationError::ProvidersExhausted(_) => true,
            TranslationError::StoreError(_) => true,
            TranslationError::CacheError(_) => true,
            TranslationError::MalformedResponse(_) => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::DuplicateEntry(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::UnsupportedLanguagePair { .. } => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::RateLimited(_) => ErrorSeverity::Info,
            TranslationError::MalformedResponse(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::StoreError(_) => ErrorSeverity::Error,
            TranslationError::DuplicateEntry(_) => ErrorSeverity::Info,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::UnsupportedLanguagePair { .. } => ErrorSeverity::Warning,
            TranslationError::ProvidersExhausted(_) => ErrorSeverity::Warning,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::RateLimited(_) => ErrorCategory::RateLimit,
            TranslationError::MalformedResponse(_) => ErrorCategory::Parsing,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::StoreError(_) => ErrorCategory::Storage,
            TranslationError::DuplicateEntry(_) => ErrorCategory::Storage,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::UnsupportedLanguagePair { .. } => ErrorCategory::Input,
            TranslationError::ProvidersExhausted(_) => ErrorCategory::Service,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let new_msg = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            TranslationError::ConfigError(msg) => TranslationError::ConfigError(new_msg(msg)),
            TranslationError::NetworkError(msg) => TranslationError::NetworkError(new_msg(msg)),
            TranslationError::RateLimited(msg) => TranslationError::RateLimited(new_msg(msg)),
            TranslationError::MalformedResponse(msg) => {
                TranslationError::MalformedResponse(new_msg(msg))
            }
            TranslationError::InvalidInput(msg) => TranslationError::InvalidInput(new_msg(msg)),
            TranslationError::CacheError(msg) => TranslationError::CacheError(new_msg(msg)),
            TranslationError::StoreError(msg) => TranslationError::StoreError(new_msg(msg)),
            TranslationError::DuplicateEntry(msg) => TranslationError::DuplicateEntry(new_msg(msg)),
            TranslationError::TimeoutError(msg) => TranslationError::TimeoutError(new_msg(msg)),
            TranslationError::ParseError(msg) => TranslationError::ParseError(new_msg(msg)),
            TranslationError::SerializationError(msg) => {
                TranslationError::SerializationError(new_msg(msg))
            }
            TranslationError::ProvidersExhausted(msg) => {
                TranslationError::ProvidersExhausted(new_msg(msg))
            }
            TranslationError::InternalError(msg) => TranslationError::InternalError(new_msg(msg)),
            other @ TranslationError::UnsupportedLanguagePair { .. } => other,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    RateLimit,
    Input,
    Cache,
    Storage,
    Timeout,
    Parsing,
    Serialization,
    Service,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StoreError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(format!("配置错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("HTTP请求超时: {}", error))
        } else if error.is_decode() {
            TranslationError::MalformedResponse(format!("响应解码失败: {}", error))
        } else {
            TranslationError::NetworkError(format!("HTTP请求失败: {}", error))
        }
    }
}

impl From<redb::Error> for TranslationError {
    fn from(error: redb::Error) -> Self {
        TranslationError::StoreError(format!("redb错误: {}", error))
    }
}

impl From<redb::DatabaseError> for TranslationError {
    fn from(error: redb::DatabaseError) -> Self {
        TranslationError::StoreError(format!("redb数据库错误: {}", error))
    }
}

impl From<redb::TransactionError> for TranslationError {
    fn from(error: redb::TransactionError) -> Self {
        TranslationError::StoreError(format!("redb事务错误: {}", error))
    }
}

impl From<redb::TableError> for TranslationError {
    fn from(error: redb::TableError) -> Self {
        TranslationError::StoreError(format!("redb表错误: {}", error))
    }
}

impl From<redb::StorageError> for TranslationError {
    fn from(error: redb::StorageError) -> Self {
        TranslationError::StoreError(format!("redb存储错误: {}", error))
    }
}

impl From<redb::CommitError> for TranslationError {
    fn from(error: redb::CommitError) -> Self {
        TranslationError::StoreError(format!("redb提交错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，不改变错误本身，返回所用的级别
    pub fn log_error(error: &TranslationError) -> ErrorSeverity {
        let severity = error.severity();
        match severity {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
        severity
    }

    /// 创建网络错误
    pub fn network_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::NetworkError(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建响应格式错误
    pub fn malformed<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::MalformedResponse(msg.to_string())
    }

    /// 创建存储错误
    pub fn store_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StoreError(msg.to_string())
    }
}
