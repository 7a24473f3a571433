//! 配置管理模块
//!
//! 提供分层配置：内置默认值、配置文件、环境变量，最后统一验证。

pub mod manager;

// 重新导出主要类型
pub use manager::{
    ConfigManager, FrequencyConfig, LearningConfig, OrchestratorConfig, StorageConfig,
    TokenizerConfig, WeaveConfig,
};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 语言
    pub const DEFAULT_SOURCE_LANG: &str = "en";
    pub const DEFAULT_TARGET_LANG: &str = "es";

    // 学习参数
    pub const DEFAULT_DENSITY: f64 = 0.15;
    pub const DEFAULT_MIN_WORD_SPACING: usize = 3;
    pub const AVERAGE_WORD_LENGTH: usize = 5;
    pub const DEFAULT_MARKER_CLASS: &str = "foreign-word";

    // 分词
    pub const DEFAULT_MIN_WORD_LENGTH: usize = 3;
    pub const DEFAULT_MAX_WORD_LENGTH: usize = 30;

    // 提供方调度
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_BULK_BATCH_SIZE: usize = 10;
    pub const DEFAULT_BATCH_DELAY_MS: u64 = 200;
    pub const RATE_WINDOW: Duration = Duration::from_secs(60);
    pub const DEFAULT_RESPONSE_CACHE_SIZE: usize = 1000;

    // 词频表
    pub const DEFAULT_FREQUENCY_URL: &str =
        "https://raw.githubusercontent.com/hermitdave/FrequencyWords/master/content/2018/{lang}/{lang}_50k.txt";
    pub const DEFAULT_MAX_LIST_SIZE: usize = 10000;
    pub const FREQUENCY_RETRY_SECS: u64 = 300;

    // 内容不参与替换的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "code", "pre", "kbd", "samp", "var", "textarea", "noscript",
        "svg", "math", "template", "head", "title", "ruby", "rt",
    ];

    // 开始新句子的块级元素
    pub const BLOCK_ELEMENTS: &[&str] = &[
        "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
        "blockquote", "section", "article", "header", "footer", "td", "th", "tr",
        "table", "dd", "dt", "figcaption", "body",
    ];

    // 只结束句子、不关闭引号的换行元素
    pub const LINE_BREAK_ELEMENTS: &[&str] = &["br", "hr"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "wordweave.toml",
        ".wordweave.toml",
        "~/.config/wordweave/config.toml",
        "/etc/wordweave/config.toml",
    ];

    // 环境变量前缀（分层配置使用双下划线分隔）
    pub const ENV_PREFIX: &str = "WORDWEAVE";
}

