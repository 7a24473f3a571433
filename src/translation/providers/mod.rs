//! 翻译提供方
//!
//! 每个提供方通过 [`TranslationProvider`] 暴露统一的调用接口，
//! 由编排器按优先级依次尝试。一个提供方可以有多个可互换的镜像端点，
//! 当前使用哪个镜像由编排器维护。

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

pub use http::HttpProvider;

/// 提供方的原始响应
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub translated_text: String,
    pub confidence: Option<f32>,
}

impl ProviderResponse {
    pub fn new(translated_text: impl Into<String>) -> Self {
        Self {
            translated_text: translated_text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence;
        self
    }
}

/// 翻译提供方接口
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 提供方标识，出现在翻译结果和日志中
    fn id(&self) -> &str;

    /// 可互换的镜像端点，至少一个
    fn endpoints(&self) -> &[String];

    /// 是否服务该语言代码
    fn supports_language(&self, _code: &str) -> bool {
        true
    }

    /// 通过指定端点翻译
    async fn translate(
        &self,
        endpoint: &str,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<ProviderResponse>;
}

/// 内置提供方类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Lingva,
    LibreTranslate,
    MyMemory,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Lingva => "lingva",
            ProviderKind::LibreTranslate => "libretranslate",
            ProviderKind::MyMemory => "mymemory",
            ProviderKind::Google => "google",
        }
    }
}

/// 提供方配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub endpoints: Vec<String>,
    pub requests_per_minute: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    /// 支持的语言代码，空列表表示不限
    #[serde(default)]
    pub languages: Vec<String>,
    /// 数值越小越先尝试
    #[serde(default)]
    pub priority: u32,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// 内置的免费提供方列表
    pub fn builtin() -> Vec<ProviderConfig> {
        vec![
            ProviderConfig {
                name: "lingva".to_string(),
                kind: ProviderKind::Lingva,
                endpoints: vec![
                    "https://lingva.ml".to_string(),
                    "https://lingva.garudalinux.org".to_string(),
                    "https://translate.plausibility.cloud".to_string(),
                ],
                requests_per_minute: 30,
                enabled: true,
                api_key: None,
                languages: Vec::new(),
                priority: 0,
            },
            ProviderConfig {
                name: "mymemory".to_string(),
                kind: ProviderKind::MyMemory,
                endpoints: vec!["https://api.mymemory.translated.net".to_string()],
                requests_per_minute: 20,
                enabled: true,
                api_key: None,
                languages: Vec::new(),
                priority: 1,
            },
            ProviderConfig {
                name: "libretranslate".to_string(),
                kind: ProviderKind::LibreTranslate,
                endpoints: vec![
                    "https://libretranslate.de".to_string(),
                    "https://translate.argosopentech.com".to_string(),
                ],
                requests_per_minute: 20,
                enabled: true,
                api_key: None,
                languages: Vec::new(),
                priority: 2,
            },
            ProviderConfig {
                name: "google".to_string(),
                kind: ProviderKind::Google,
                endpoints: vec!["https://translate.googleapis.com".to_string()],
                requests_per_minute: 10,
                enabled: false,
                api_key: None,
                languages: Vec::new(),
                priority: 3,
            },
        ]
    }

    pub fn validate(&self) -> TranslationResult<()> {
        if self.name.trim().is_empty() {
            return Err(TranslationError::ConfigError("提供方名称不能为空".to_string()));
        }
        if self.endpoints.is_empty() {
            return Err(TranslationError::ConfigError(format!(
                "提供方 {} 没有配置端点",
                self.name
            )));
        }
        if self.requests_per_minute == 0 {
            return Err(TranslationError::ConfigError(format!(
                "提供方 {} 的每分钟请求数不能为0",
                self.name
            )));
        }
        Ok(())
    }
}

/// 注册到编排器的提供方及其调度参数
#[derive(Clone)]
pub struct RegisteredProvider {
    pub provider: Arc<dyn TranslationProvider>,
    pub requests_per_minute: u32,
    pub enabled: bool,
    pub priority: u32,
}

impl RegisteredProvider {
    pub fn new(provider: Arc<dyn TranslationProvider>, requests_per_minute: u32) -> Self {
        Self {
            provider,
            requests_per_minute,
            enabled: true,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("id", &self.provider.id())
            .field("requests_per_minute", &self.requests_per_minute)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 按配置构建 HTTP 提供方
pub fn build_providers(
    configs: &[ProviderConfig],
    request_timeout: Duration,
) -> TranslationResult<Vec<RegisteredProvider>> {
    let mut registered = Vec::with_capacity(configs.len());
    for config in configs {
        config.validate()?;
        let provider = HttpProvider::from_config(config, request_timeout)?;
        registered.push(RegisteredProvider {
            provider: Arc::new(provider),
            requests_per_minute: config.requests_per_minute,
            enabled: config.enabled,
            priority: config.priority,
        });
    }
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_providers_are_valid() {
        let builtin = ProviderConfig::builtin();
        assert!(builtin.iter().all(|p| p.validate().is_ok()));
        assert!(builtin.iter().any(|p| p.endpoints.len() > 1));
    }

    #[test]
    fn test_provider_validation() {
        let mut config = ProviderConfig::builtin().remove(0);
        config.endpoints.clear();
        assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));

        let mut config = ProviderConfig::builtin().remove(0);
        config.requests_per_minute = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_providers_keeps_schedule() {
        let registered = build_providers(&ProviderConfig::builtin(), Duration::from_secs(5)).unwrap();
        assert_eq!(registered.len(), 4);
        assert_eq!(registered[0].provider.id(), "lingva");
        assert_eq!(registered[0].requests_per_minute, 30);
        assert!(!registered[3].enabled);
    }
}
