//! # WordWeave
//!
//! 把外语单词织入网页内容的词汇替换引擎，面向语言学习者。
//!
//! ## 模块组织
//!
//! - `core` - 引擎入口，串联分词、查词和改写
//! - `parsers` - 标记感知的分词器与大小写、转义等启发式
//! - `lexicon` - 词条模型、词频排名、查词流水线、内置词典
//! - `translation` - 翻译提供方、编排器、存储与配置
//! - `weave` - 候选选择策略与内容改写
//! - `bridge` - 宿主消息
//! - `env` - 类型化环境变量

pub mod bridge;
pub mod core;
pub mod env;
pub mod lexicon;
pub mod parsers;
pub mod translation;
pub mod weave;

// Re-export commonly used items for convenience
pub use crate::bridge::{BridgeMessage, ProgressStage};
pub use crate::core::{EngineParts, EngineStats, LexicalEngine, PreCacheReport, ProcessOutput, ProcessStats};
pub use crate::lexicon::{ProficiencyLevel, Resolution, ResolutionSource, WordEntry};
pub use crate::parsers::{Token, Tokenizer, TokenizerOptions};
pub use crate::translation::{ConfigManager, TranslationError, TranslationResult, WeaveConfig};
pub use crate::weave::{ForeignWord, SelectionStrategy};
