//! 基于 HTTP 的免费翻译提供方
//!
//! 请求格式各不相同，响应统一解析为 [`ProviderResponse`]。
//! 解析函数与网络调用分离，便于单独测试。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{ProviderConfig, ProviderKind, ProviderResponse, TranslationProvider};
use crate::translation::error::{helpers, TranslationError, TranslationResult};

const USER_AGENT: &str = concat!("wordweave/", env!("CARGO_PKG_VERSION"));

/// HTTP 翻译提供方
#[derive(Debug, Clone)]
pub struct HttpProvider {
    name: String,
    kind: ProviderKind,
    endpoints: Vec<String>,
    api_key: Option<String>,
    languages: Vec<String>,
    client: Client,
}

impl HttpProvider {
    pub fn from_config(config: &ProviderConfig, request_timeout: Duration) -> TranslationResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            endpoints: config
                .endpoints
                .iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            api_key: config.api_key.clone(),
            languages: config.languages.iter().map(|l| l.to_lowercase()).collect(),
            client,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// 构建请求 URL（LibreTranslate 使用 POST，不带查询参数）
    pub fn request_url(
        &self,
        endpoint: &str,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Url> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| helpers::config_error(format!("无效的端点 {}: {}", endpoint, e)))?;

        match self.kind {
            ProviderKind::Lingva => {
                url.path_segments_mut()
                    .map_err(|_| helpers::config_error(format!("端点不能作为基础 URL: {}", endpoint)))?
                    .pop_if_empty()
                    .extend(["api", "v1", source_lang, target_lang, text]);
            }
            ProviderKind::LibreTranslate => {
                url.path_segments_mut()
                    .map_err(|_| helpers::config_error(format!("端点不能作为基础 URL: {}", endpoint)))?
                    .pop_if_empty()
                    .push("translate");
            }
            ProviderKind::MyMemory => {
                url.path_segments_mut()
                    .map_err(|_| helpers::config_error(format!("端点不能作为基础 URL: {}", endpoint)))?
                    .pop_if_empty()
                    .push("get");
                url.query_pairs_mut()
                    .append_pair("q", text)
                    .append_pair("langpair", &format!("{}|{}", source_lang, target_lang));
            }
            ProviderKind::Google => {
                url.path_segments_mut()
                    .map_err(|_| helpers::config_error(format!("端点不能作为基础 URL: {}", endpoint)))?
                    .pop_if_empty()
                    .extend(["translate_a", "single"]);
                url.query_pairs_mut()
                    .append_pair("client", "gtx")
                    .append_pair("sl", source_lang)
                    .append_pair("tl", target_lang)
                    .append_pair("dt", "t")
                    .append_pair("q", text);
            }
        }

        Ok(url)
    }

    fn parse_body(&self, body: &str) -> TranslationResult<ProviderResponse> {
        match self.kind {
            ProviderKind::Lingva => parse_lingva(body),
            ProviderKind::LibreTranslate => parse_libretranslate(body),
            ProviderKind::MyMemory => parse_mymemory(body),
            ProviderKind::Google => parse_google(body),
        }
    }
}

#[async_trait]
impl TranslationProvider for HttpProvider {
    fn id(&self) -> &str {
        &self.name
    }

    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn supports_language(&self, code: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l.eq_ignore_ascii_case(code))
    }

    async fn translate(
        &self,
        endpoint: &str,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<ProviderResponse> {
        let url = self.request_url(endpoint, text, source_lang, target_lang)?;
        tracing::debug!("{} 请求: {}", self.name, url);

        let request = match self.kind {
            ProviderKind::LibreTranslate => {
                let mut payload = serde_json::json!({
                    "q": text,
                    "source": source_lang,
                    "target": target_lang,
                    "format": "text",
                });
                if let Some(ref key) = self.api_key {
                    payload["api_key"] = Value::String(key.clone());
                }
                self.client.post(url).json(&payload)
            }
            _ => self.client.get(url),
        };

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranslationError::RateLimited(format!("{} 返回 429", self.name)));
        }
        if !status.is_success() {
            return Err(helpers::network_error(format!("{} 返回状态码 {}", self.name, status)));
        }

        let body = response.text().await?;
        self.parse_body(&body)
    }
}

fn non_empty(text: &str, provider: &str) -> TranslationResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(helpers::malformed(format!("{} 响应缺少译文", provider)))
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Deserialize)]
struct LingvaBody {
    translation: Option<String>,
    error: Option<String>,
}

/// 解析 Lingva 响应：`{"translation": "..."}`
pub fn parse_lingva(body: &str) -> TranslationResult<ProviderResponse> {
    let parsed: LingvaBody = serde_json::from_str(body)
        .map_err(|e| helpers::malformed(format!("lingva: {}", e)))?;
    if let Some(error) = parsed.error {
        return Err(helpers::malformed(format!("lingva 错误: {}", error)));
    }
    let text = parsed.translation.unwrap_or_default();
    Ok(ProviderResponse::new(non_empty(&text, "lingva")?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreBody {
    translated_text: Option<String>,
    error: Option<String>,
}

/// 解析 LibreTranslate 响应：`{"translatedText": "..."}`
pub fn parse_libretranslate(body: &str) -> TranslationResult<ProviderResponse> {
    let parsed: LibreBody = serde_json::from_str(body)
        .map_err(|e| helpers::malformed(format!("libretranslate: {}", e)))?;
    if let Some(error) = parsed.error {
        return Err(helpers::malformed(format!("libretranslate 错误: {}", error)));
    }
    let text = parsed.translated_text.unwrap_or_default();
    Ok(ProviderResponse::new(non_empty(&text, "libretranslate")?))
}

/// 解析 MyMemory 响应
///
/// `responseStatus` 可能是数字也可能是字符串；429 视为限流。
pub fn parse_mymemory(body: &str) -> TranslationResult<ProviderResponse> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| helpers::malformed(format!("mymemory: {}", e)))?;

    let status = match &value["responseStatus"] {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match status {
        Some(429) => {
            return Err(TranslationError::RateLimited(
                "mymemory 配额已用尽".to_string(),
            ))
        }
        Some(200) | None => {}
        Some(other) => {
            let details = value["responseDetails"].as_str().unwrap_or_default();
            return Err(helpers::network_error(format!(
                "mymemory 状态 {}: {}",
                other, details
            )));
        }
    }

    let data = &value["responseData"];
    let text = data["translatedText"]
        .as_str()
        .ok_or_else(|| helpers::malformed("mymemory 响应缺少 translatedText"))?;
    let confidence = data["match"].as_f64().map(|m| m as f32);

    Ok(ProviderResponse::new(non_empty(text, "mymemory")?).with_confidence(confidence))
}

/// 解析 Google 免费端点响应：`[[["译文","原文",...],...],...]`
pub fn parse_google(body: &str) -> TranslationResult<ProviderResponse> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| helpers::malformed(format!("google: {}", e)))?;
    let sentences = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| helpers::malformed("google 响应结构异常"))?;

    let text: String = sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(Value::as_str))
        .collect();

    Ok(ProviderResponse::new(non_empty(&text, "google")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: ProviderKind) -> HttpProvider {
        let config = ProviderConfig::builtin()
            .into_iter()
            .find(|p| p.kind == kind)
            .unwrap();
        HttpProvider::from_config(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_lingva_url_encodes_text() {
        let p = provider(ProviderKind::Lingva);
        let url = p.request_url("https://lingva.ml", "ice cream", "en", "es").unwrap();
        assert_eq!(url.as_str(), "https://lingva.ml/api/v1/en/es/ice%20cream");
    }

    #[test]
    fn test_mymemory_and_google_urls() {
        let p = provider(ProviderKind::MyMemory);
        let url = p
            .request_url("https://api.mymemory.translated.net", "house", "en", "es")
            .unwrap();
        assert_eq!(url.path(), "/get");
        assert!(url.query_pairs().any(|(k, v)| k == "langpair" && v == "en|es"));

        let p = provider(ProviderKind::Google);
        let url = p.request_url("https://translate.googleapis.com", "house", "en", "es").unwrap();
        assert_eq!(url.path(), "/translate_a/single");
        assert!(url.query_pairs().any(|(k, v)| k == "client" && v == "gtx"));
    }

    #[test]
    fn test_parse_lingva() {
        assert_eq!(
            parse_lingva(r#"{"translation":"casa"}"#).unwrap().translated_text,
            "casa"
        );
        assert!(matches!(
            parse_lingva(r#"{"translation":"  "}"#),
            Err(TranslationError::MalformedResponse(_))
        ));
        assert!(parse_lingva("<html>").is_err());
    }

    #[test]
    fn test_parse_libretranslate() {
        let resp = parse_libretranslate(r#"{"translatedText":"perro"}"#).unwrap();
        assert_eq!(resp.translated_text, "perro");
        assert!(parse_libretranslate(r#"{"error":"Invalid API key"}"#).is_err());
    }

    #[test]
    fn test_parse_mymemory() {
        let resp = parse_mymemory(
            r#"{"responseData":{"translatedText":"gato","match":0.85},"responseStatus":200}"#,
        )
        .unwrap();
        assert_eq!(resp.translated_text, "gato");
        assert!((resp.confidence.unwrap() - 0.85).abs() < f32::EPSILON);

        let limited = parse_mymemory(
            r#"{"responseData":{"translatedText":"MYMEMORY WARNING"},"responseStatus":"429"}"#,
        );
        assert!(matches!(limited, Err(TranslationError::RateLimited(_))));
    }

    #[test]
    fn test_parse_google() {
        let resp = parse_google(r#"[[["la casa","the house",null,null,1]],null,"en"]"#).unwrap();
        assert_eq!(resp.translated_text, "la casa");
        assert!(parse_google(r#"{"x":1}"#).is_err());
    }

    #[test]
    fn test_language_restriction() {
        let mut config = ProviderConfig::builtin().remove(0);
        config.languages = vec!["en".to_string(), "ES".to_string()];
        let p = HttpProvider::from_config(&config, Duration::from_secs(5)).unwrap();
        assert!(p.supports_language("es"));
        assert!(!p.supports_language("ja"));
    }
}
