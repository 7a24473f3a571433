//! 词条数据模型
//!
//! `WordEntry` 是查词流水线的产物，也是替换引擎与前端交互层共享的数据结构。
//! 熟练度等级只有一个换算入口：[`ProficiencyLevel::from_rank`]。

use std::fmt;
use std::str::FromStr;

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::translation::error::TranslationError;

/// 初级词汇的最大词频排名
pub const BEGINNER_MAX_RANK: u32 = 500;
/// 中级词汇的最大词频排名
pub const INTERMEDIATE_MAX_RANK: u32 = 2000;
/// 高级词汇的参考上限，超出部分同样视为高级
pub const ADVANCED_MAX_RANK: u32 = 5000;

/// 学习者熟练度等级（有序：初级 < 中级 < 高级）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ProficiencyLevel {
    /// 词频排名到熟练度等级的唯一换算函数
    pub fn from_rank(rank: u32) -> Self {
        if rank <= BEGINNER_MAX_RANK {
            ProficiencyLevel::Beginner
        } else if rank <= INTERMEDIATE_MAX_RANK {
            ProficiencyLevel::Intermediate
        } else {
            ProficiencyLevel::Advanced
        }
    }

    /// 该等级覆盖的排名区间（闭区间，高级的上限为参考值）
    pub fn rank_range(&self) -> (u32, u32) {
        match self {
            ProficiencyLevel::Beginner => (1, BEGINNER_MAX_RANK),
            ProficiencyLevel::Intermediate => (BEGINNER_MAX_RANK + 1, INTERMEDIATE_MAX_RANK),
            ProficiencyLevel::Advanced => (INTERMEDIATE_MAX_RANK + 1, ADVANCED_MAX_RANK),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => "beginner",
            ProficiencyLevel::Intermediate => "intermediate",
            ProficiencyLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "a1" | "a2" => Ok(ProficiencyLevel::Beginner),
            "intermediate" | "b1" | "b2" => Ok(ProficiencyLevel::Intermediate),
            "advanced" | "c1" | "c2" => Ok(ProficiencyLevel::Advanced),
            other => Err(TranslationError::InvalidInput(format!(
                "未知的熟练度等级 '{}'，可选: beginner, intermediate, advanced",
                other
            ))),
        }
    }
}

/// 词性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Conjunction,
    Determiner,
    Interjection,
    #[default]
    Unknown,
}

impl PartOfSpeech {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Conjunction => "conjunction",
            PartOfSpeech::Determiner => "determiner",
            PartOfSpeech::Interjection => "interjection",
            PartOfSpeech::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartOfSpeech {
    type Err = TranslationError;

    /// 宽松解析：接受常见缩写，无法识别时返回 `Unknown` 而不是报错
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "noun" | "n" => PartOfSpeech::Noun,
            "verb" | "v" => PartOfSpeech::Verb,
            "adjective" | "adj" => PartOfSpeech::Adjective,
            "adverb" | "adv" => PartOfSpeech::Adverb,
            "pronoun" | "pron" => PartOfSpeech::Pronoun,
            "preposition" | "prep" => PartOfSpeech::Preposition,
            "conjunction" | "conj" => PartOfSpeech::Conjunction,
            "determiner" | "det" | "article" => PartOfSpeech::Determiner,
            "interjection" | "interj" => PartOfSpeech::Interjection,
            _ => PartOfSpeech::Unknown,
        })
    }
}

/// 词条来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// 内存缓存
    Cache,
    /// 持久化词典存储
    Store,
    /// 外部翻译提供方
    Provider,
    /// 内置词典回退
    Bundled,
}

/// 词条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    pub id: String,
    pub source_word: String,
    pub target_word: String,
    pub source_language: String,
    pub target_language: String,
    pub proficiency_level: ProficiencyLevel,
    /// 词频排名，越小越常见；未排名时为 `None`
    #[serde(default)]
    pub frequency_rank: Option<u32>,
    #[serde(default)]
    pub part_of_speech: PartOfSpeech,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    pub source: ResolutionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl WordEntry {
    /// 创建新词条，id 由语言对和源词派生
    pub fn new(
        source_word: &str,
        target_word: &str,
        source_language: &str,
        target_language: &str,
        proficiency_level: ProficiencyLevel,
        source: ResolutionSource,
    ) -> Self {
        let source_word = normalize_word(source_word);
        Self {
            id: Self::stable_id(source_language, target_language, &source_word),
            source_word,
            target_word: target_word.trim().to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            proficiency_level,
            frequency_rank: None,
            part_of_speech: PartOfSpeech::Unknown,
            variants: Vec::new(),
            pronunciation: None,
            source,
            cached_at: None,
        }
    }

    pub fn with_rank(mut self, rank: Option<u32>) -> Self {
        self.frequency_rank = rank;
        self
    }

    pub fn with_part_of_speech(mut self, pos: PartOfSpeech) -> Self {
        self.part_of_speech = pos;
        self
    }

    pub fn with_variants(mut self, variants: Vec<String>) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_pronunciation(mut self, pronunciation: Option<String>) -> Self {
        self.pronunciation = pronunciation;
        self
    }

    /// 稳定 id：`w_` + blake3(源语言|目标语言|词) 的前 16 位十六进制
    pub fn stable_id(source_language: &str, target_language: &str, word: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(source_language.as_bytes());
        hasher.update(b"|");
        hasher.update(target_language.as_bytes());
        hasher.update(b"|");
        hasher.update(normalize_word(word).as_bytes());
        let hex = hasher.finalize().to_hex();
        format!("w_{}", &hex.as_str()[..16])
    }

    /// 复制一份并标记新的来源
    pub fn relabeled(&self, source: ResolutionSource) -> Self {
        let mut entry = self.clone();
        entry.source = source;
        entry
    }
}

/// 词的规范化形式：去空白、统一弯引号、转小写
pub fn normalize_word(word: &str) -> String {
    word.trim().replace('\u{2019}', "'").to_lowercase()
}

/// 语言对 + 规范化词组成的查找键
pub fn lookup_key(source_language: &str, target_language: &str, word: &str) -> String {
    format!("{}:{}:{}", source_language, target_language, normalize_word(word))
}
