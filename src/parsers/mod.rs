//! # 解析器模块
//!
//! 把标记文本切分成带精确偏移的单词：
//!
//! - `markup` - 标签、注释、字符实体的最小识别
//! - `heuristics` - 缩写、称谓、专有名词与大小写规则
//! - `tokenizer` - 跳过元素栈 + 引号深度的单遍状态机

pub mod heuristics;
pub mod markup;
pub mod tokenizer;

pub use heuristics::{match_case, CasePattern};
pub use markup::escape_html;
pub use tokenizer::{get_unique_words, ProtectionReason, Token, Tokenizer, TokenizerOptions};
