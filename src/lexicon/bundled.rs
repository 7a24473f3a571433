//! 内置词典
//!
//! 查词流水线没有结果时的回退。匹配顺序：原词、列出的变形、再去掉常见
//! 英语词尾（-s、-es、-ies、-ed、-ing）后重试。

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::lexicon::entry::{normalize_word, ProficiencyLevel, ResolutionSource, WordEntry};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::DictionaryFile;

const BUILTIN_EN_ES: &str = include_str!("../../data/en-es.json");

/// 内置或从文件加载的小型词典
#[derive(Debug, Clone)]
pub struct BundledDictionary {
    source_language: String,
    target_language: String,
    entries: HashMap<String, WordEntry>,
    /// 变形 -> 原形
    variants: HashMap<String, String>,
}

impl BundledDictionary {
    /// 随程序发布的英语-西班牙语词表
    pub fn builtin() -> Self {
        match DictionaryFile::from_json_str(BUILTIN_EN_ES) {
            Ok(file) => Self::from_file(&file),
            Err(e) => {
                warn!("内置词典解析失败: {}", e);
                Self::empty("en", "es")
            }
        }
    }

    pub fn empty(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            entries: HashMap::new(),
            variants: HashMap::new(),
        }
    }

    pub fn from_file(file: &DictionaryFile) -> Self {
        let mut dictionary = Self::empty(&file.source_language, &file.target_language);
        for entry in file.to_entries(ResolutionSource::Bundled) {
            for variant in &entry.variants {
                dictionary
                    .variants
                    .entry(normalize_word(variant))
                    .or_insert_with(|| entry.source_word.clone());
            }
            dictionary
                .entries
                .entry(entry.source_word.clone())
                .or_insert(entry);
        }
        dictionary
    }

    pub async fn load_json_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            TranslationError::InvalidInput(format!("读取词典文件失败 {}: {}", path.display(), e))
        })?;
        Ok(Self::from_file(&DictionaryFile::from_json_str(&content)?))
    }

    pub fn supports(&self, source_language: &str, target_language: &str) -> bool {
        self.source_language == source_language && self.target_language == target_language
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 查词，语言对不匹配时返回 `None`
    pub fn lookup(&self, word: &str, source_language: &str, target_language: &str) -> Option<WordEntry> {
        if !self.supports(source_language, target_language) {
            return None;
        }

        let word = normalize_word(word);
        if let Some(entry) = self.entries.get(&word) {
            return Some(entry.clone());
        }

        if let Some(base) = self.variants.get(&word) {
            return self.entries.get(base).cloned();
        }

        stem_candidates(&word)
            .into_iter()
            .find_map(|stem| self.entries.get(&stem).cloned())
    }

    /// 某个等级的全部词条，按词排序
    pub fn entries_for_level(
        &self,
        source_language: &str,
        target_language: &str,
        level: ProficiencyLevel,
    ) -> Vec<WordEntry> {
        if !self.supports(source_language, target_language) {
            return Vec::new();
        }

        let mut entries: Vec<WordEntry> = self
            .entries
            .values()
            .filter(|entry| entry.proficiency_level == level)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.source_word.cmp(&b.source_word));
        entries
    }
}

/// 去掉屈折词尾后可能的原形
fn stem_candidates(word: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(base) = word.strip_suffix("ies") {
        candidates.push(format!("{}y", base));
    }
    if let Some(base) = word.strip_suffix("es") {
        candidates.push(base.to_string());
    }
    if let Some(base) = word.strip_suffix('s') {
        if !base.ends_with('s') {
            candidates.push(base.to_string());
        }
    }
    for suffix in ["ed", "ing"] {
        if let Some(base) = word.strip_suffix(suffix) {
            candidates.push(base.to_string());
            candidates.push(format!("{}e", base));
            if let Some(undoubled) = strip_doubled_consonant(base) {
                candidates.push(undoubled.to_string());
            }
        }
    }
    if let Some(base) = word.strip_suffix('d') {
        if base.ends_with('e') {
            candidates.push(base.to_string());
        }
    }

    candidates.retain(|c| c.chars().count() >= 2);
    candidates
}

/// `running` -> `run`
fn strip_doubled_consonant(base: &str) -> Option<&str> {
    let mut chars = base.chars().rev();
    let last = chars.next()?;
    let previous = chars.next()?;
    if last == previous && !"aeiou".contains(last) {
        Some(&base[..base.len() - last.len_utf8()])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let dictionary = BundledDictionary::builtin();
        assert!(dictionary.len() > 50);
        assert!(dictionary.supports("en", "es"));

        let house = dictionary.lookup("House", "en", "es").unwrap();
        assert_eq!(house.target_word, "casa");
        assert_eq!(house.source, ResolutionSource::Bundled);
        assert_eq!(house.proficiency_level, ProficiencyLevel::Beginner);
    }

    #[test]
    fn test_variants_and_inflections() {
        let dictionary = BundledDictionary::builtin();
        let target = |word: &str| dictionary.lookup(word, "en", "es").map(|e| e.target_word);

        assert_eq!(target("children").as_deref(), Some("niño"));
        assert_eq!(target("houses").as_deref(), Some("casa"));
        assert_eq!(target("cities").as_deref(), Some("ciudad"));
        assert_eq!(target("walked").as_deref(), Some("caminar"));
        assert_eq!(target("running").as_deref(), Some("correr"));
        assert_eq!(target("closed").as_deref(), Some("cerrar"));
        assert_eq!(target("dancing").as_deref(), Some("bailar"));
        assert_eq!(target("zzzz"), None);
    }

    #[test]
    fn test_other_pairs_miss() {
        let dictionary = BundledDictionary::builtin();
        assert!(dictionary.lookup("house", "en", "fr").is_none());
        assert!(dictionary
            .entries_for_level("en", "fr", ProficiencyLevel::Beginner)
            .is_empty());
    }

    #[test]
    fn test_entries_for_level() {
        let dictionary = BundledDictionary::builtin();
        let advanced = dictionary.entries_for_level("en", "es", ProficiencyLevel::Advanced);
        assert!(!advanced.is_empty());
        assert!(advanced
            .iter()
            .all(|e| e.proficiency_level == ProficiencyLevel::Advanced));
        assert!(advanced.windows(2).all(|w| w[0].source_word <= w[1].source_word));
    }
}
