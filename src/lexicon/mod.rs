//! 词汇模块
//!
//! - `entry` - 词条、熟练度、词性
//! - `frequency` - 词频排名服务
//! - `resolver` - 三级查词流水线
//! - `bundled` - 内置词典回退

pub mod bundled;
pub mod entry;
pub mod frequency;
pub mod resolver;

pub use bundled::BundledDictionary;
pub use entry::{
    lookup_key, normalize_word, PartOfSpeech, ProficiencyLevel, ResolutionSource, WordEntry,
};
pub use frequency::{
    parse_frequency_list, FileFrequencySource, FrequencyListSource, FrequencyService,
    HttpFrequencySource,
};
pub use resolver::{Resolution, ResolverStatsSnapshot, WordResolver};
