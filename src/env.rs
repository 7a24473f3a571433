//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。分层配置中的 `WORDWEAVE__*`
//! 变量由 `config` crate 处理；这里定义的是常用设置的扁平别名。

use std::env;
use std::fmt;
use std::time::Duration;

use crate::lexicon::entry::ProficiencyLevel;
use crate::weave::selection::SelectionStrategy;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }

    /// 仅在变量被显式设置且有效时返回值；无效值记录警告后忽略
    fn get_override() -> Option<T> {
        let value = env::var(Self::NAME).ok()?;
        match Self::parse(&value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("忽略无效的环境变量: {}", e);
                None
            }
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "WORDWEAVE_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("warn".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 学习参数相关环境变量
pub mod learning {
    use super::*;

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "WORDWEAVE_SOURCE_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Language of the input content (ISO 639-1 code)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "WORDWEAVE_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Language being learned (ISO 639-1 code)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 替换密度
    pub struct Density;
    impl EnvVar<f64> for Density {
        const NAME: &'static str = "WORDWEAVE_DENSITY";
        const DEFAULT: Option<f64> = Some(0.15);
        const DESCRIPTION: &'static str = "Fraction of words to replace, in (0, 1]";

        fn parse(value: &str) -> EnvResult<f64> {
            let density: f64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number".to_string(),
            })?;

            if !(density > 0.0 && density <= 1.0) {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Density must be greater than 0 and at most 1".to_string(),
                });
            }

            Ok(density)
        }
    }

    /// 最小替换间隔
    pub struct MinWordSpacing;
    impl EnvVar<usize> for MinWordSpacing {
        const NAME: &'static str = "WORDWEAVE_MIN_WORD_SPACING";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Minimum estimated words between two replacements";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 1000)
        }
    }

    /// 最高熟练度等级
    pub struct MaxProficiency;
    impl EnvVar<ProficiencyLevel> for MaxProficiency {
        const NAME: &'static str = "WORDWEAVE_MAX_PROFICIENCY";
        const DEFAULT: Option<ProficiencyLevel> = Some(ProficiencyLevel::Intermediate);
        const DESCRIPTION: &'static str =
            "Highest proficiency level to show: beginner, intermediate, advanced";

        fn parse(value: &str) -> EnvResult<ProficiencyLevel> {
            value.parse().map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("{}", e),
            })
        }
    }

    /// 选择策略
    pub struct Strategy;
    impl EnvVar<SelectionStrategy> for Strategy {
        const NAME: &'static str = "WORDWEAVE_STRATEGY";
        const DEFAULT: Option<SelectionStrategy> = Some(SelectionStrategy::Distributed);
        const DESCRIPTION: &'static str = "Selection strategy: random, frequency, distributed";

        fn parse(value: &str) -> EnvResult<SelectionStrategy> {
            value.parse().map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("{}", e),
            })
        }
    }

    /// 随机种子
    pub struct Seed;
    impl EnvVar<u64> for Seed {
        const NAME: &'static str = "WORDWEAVE_SEED";
        const DEFAULT: Option<u64> = None;
        const DESCRIPTION: &'static str = "Fixed random seed for reproducible selection";

        fn parse(value: &str) -> EnvResult<u64> {
            value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a non-negative integer".to_string(),
            })
        }
    }

    /// 内置词典回退
    pub struct BundledFallback;
    impl EnvVar<bool> for BundledFallback {
        const NAME: &'static str = "WORDWEAVE_BUNDLED_FALLBACK";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Fall back to the built-in dictionary when lookups miss";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 翻译提供方相关环境变量
pub mod providers {
    use super::*;

    /// 单次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "WORDWEAVE_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(10));
        const DESCRIPTION: &'static str = "Per-call provider timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout must be greater than 0".to_string(),
                });
            }

            if seconds > 300 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout too long (max 300 seconds)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }

    /// 批量翻译的批次大小
    pub struct BulkBatchSize;
    impl EnvVar<usize> for BulkBatchSize {
        const NAME: &'static str = "WORDWEAVE_BULK_BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(10);
        const DESCRIPTION: &'static str = "Words per bulk translation batch";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 500)
        }
    }

    /// 批次间隔
    pub struct BatchDelay;
    impl EnvVar<Duration> for BatchDelay {
        const NAME: &'static str = "WORDWEAVE_BATCH_DELAY_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(200));
        const DESCRIPTION: &'static str = "Pause between bulk translation batches in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_usize(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(millis as u64))
        }
    }
}

/// 存储相关环境变量
pub mod storage {
    use super::*;

    /// 持久化数据库路径
    pub struct StorePath;
    impl EnvVar<String> for StorePath {
        const NAME: &'static str = "WORDWEAVE_STORE_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the on-disk store (redb file)";

        fn parse(value: &str) -> EnvResult<String> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path cannot be empty".to_string(),
                });
            }
            Ok(path.to_string())
        }
    }

    /// 响应缓存大小
    pub struct ResponseCacheSize;
    impl EnvVar<usize> for ResponseCacheSize {
        const NAME: &'static str = "WORDWEAVE_RESPONSE_CACHE_SIZE";
        const DEFAULT: Option<usize> = Some(1000);
        const DESCRIPTION: &'static str = "In-memory translation response cache size (entries)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 10, 1_000_000)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_lang(value: &str, var_name: &str) -> EnvResult<String> {
    let lang = value.trim().to_lowercase();
    if lang.len() < 2 || lang.len() > 3 || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Language code must be 2-3 letters (ISO 639)".to_string(),
        });
    }
    Ok(lang)
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
        docs.push_str(&format!(
            "- `{}`: {} (default: {:?})\n",
            V::NAME,
            V::DESCRIPTION,
            V::DEFAULT
        ));
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    line::<String, core::LogLevel>(&mut docs);
    line::<bool, core::NoColor>(&mut docs);

    docs.push_str("\n## Learning Configuration\n\n");
    line::<String, learning::SourceLang>(&mut docs);
    line::<String, learning::TargetLang>(&mut docs);
    line::<f64, learning::Density>(&mut docs);
    line::<usize, learning::MinWordSpacing>(&mut docs);
    line::<ProficiencyLevel, learning::MaxProficiency>(&mut docs);
    line::<SelectionStrategy, learning::Strategy>(&mut docs);
    line::<u64, learning::Seed>(&mut docs);
    line::<bool, learning::BundledFallback>(&mut docs);

    docs.push_str("\n## Provider Configuration\n\n");
    line::<Duration, providers::RequestTimeout>(&mut docs);
    line::<usize, providers::BulkBatchSize>(&mut docs);
    line::<Duration, providers::BatchDelay>(&mut docs);

    docs.push_str("\n## Storage Configuration\n\n");
    line::<String, storage::StorePath>(&mut docs);
    line::<usize, storage::ResponseCacheSize>(&mut docs);

    docs.push_str(
        "\nAny configuration key can also be set with `WORDWEAVE__<SECTION>__<KEY>`, \
         e.g. `WORDWEAVE__LEARNING__DENSITY=0.3`.\n",
    );

    docs
}
