//! 改写内容
//!
//! 选中的 token 按位置降序依次替换为内联标记，前面的偏移因此不受影响。
//! 输出的外语词记录按原文顺序排列，位置指向改写后的内容。

use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::lexicon::entry::WordEntry;
use crate::parsers::heuristics::match_case;
use crate::parsers::markup::escape_html;
use crate::parsers::tokenizer::Token;
use crate::translation::config::LearningConfig;
use crate::weave::selection::{build_candidates, select, Candidate, SelectionConfig};

/// 改写后内容中的一个外语词
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignWord {
    /// 原文写法
    pub original: String,
    /// 按原文大小写调整后的译词
    pub replacement: String,
    /// 标记在改写后内容中的起始字节偏移
    pub start: usize,
    pub end: usize,
    pub entry: WordEntry,
}

/// 替换统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementStats {
    pub total_words: usize,
    pub eligible_words: usize,
    pub replaced_words: usize,
    pub protected_words: usize,
    pub skipped_by_density: usize,
}

/// 替换结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementOutput {
    pub content: String,
    pub foreign_words: Vec<ForeignWord>,
    pub stats: ReplacementStats,
}

/// 生成内联标记，返回（标记 HTML，可见译词）
///
/// ```text
/// <span class="foreign-word" data-original="House" data-word-id="w_…" data-pos="noun">Casa</span>
/// ```
pub fn render_marker(token: &Token, entry: &WordEntry, marker_class: &str) -> (String, String) {
    let replacement = match_case(&token.original, &entry.target_word);

    let mut marker = format!(
        "<span class=\"{}\" data-original=\"{}\" data-word-id=\"{}\" data-pos=\"{}\"",
        escape_html(marker_class),
        escape_html(&token.original),
        escape_html(&entry.id),
        entry.part_of_speech
    );
    if let Some(pronunciation) = &entry.pronunciation {
        marker.push_str(&format!(
            " data-pronunciation=\"{}\"",
            escape_html(pronunciation)
        ));
    }
    marker.push('>');
    marker.push_str(&escape_html(&replacement));
    marker.push_str("</span>");

    (marker, replacement)
}

/// 把选中的候选写回内容
pub fn rewrite(content: &str, selected: &[Candidate<'_>], marker_class: &str) -> (String, Vec<ForeignWord>) {
    let mut ordered: Vec<&Candidate<'_>> = selected.iter().collect();
    ordered.sort_by(|a, b| b.token.start.cmp(&a.token.start));

    let mut output = content.to_string();
    let mut records: Vec<ForeignWord> = Vec::with_capacity(ordered.len());

    for candidate in ordered {
        let token = candidate.token;
        if output.get(token.start..token.end) != Some(token.original.as_str()) {
            debug!("跳过偏移不一致的词 '{}' @{}", token.original, token.start);
            continue;
        }

        let (marker, replacement) = render_marker(token, candidate.entry, marker_class);
        output.replace_range(token.start..token.end, &marker);
        records.push(ForeignWord {
            original: token.original.clone(),
            replacement,
            start: token.start,
            end: token.start + marker.len(),
            entry: candidate.entry.clone(),
        });
    }

    // 恢复原文顺序，并把偏移换算到改写后的内容
    records.reverse();
    let mut shift = 0usize;
    let foreign_words = records
        .into_iter()
        .map(|mut word| {
            let marker_len = word.end - word.start;
            word.start += shift;
            word.end = word.start + marker_len;
            shift += marker_len - word.original.len();
            word
        })
        .collect();

    (output, foreign_words)
}

/// 选择并改写
#[derive(Debug, Clone)]
pub struct Replacer {
    config: SelectionConfig,
    marker_class: String,
}

impl Default for Replacer {
    fn default() -> Self {
        Self::from_learning(&LearningConfig::default())
    }
}

impl Replacer {
    pub fn new(config: SelectionConfig, marker_class: impl Into<String>) -> Self {
        Self {
            config,
            marker_class: marker_class.into(),
        }
    }

    pub fn from_learning(learning: &LearningConfig) -> Self {
        Self::new(SelectionConfig::from_learning(learning), learning.marker_class.clone())
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn marker_class(&self) -> &str {
        &self.marker_class
    }

    /// `entries` 以规范化单词为键
    pub fn replace<R: Rng + ?Sized>(
        &self,
        content: &str,
        tokens: &[Token],
        entries: &HashMap<String, WordEntry>,
        rng: &mut R,
    ) -> ReplacementOutput {
        let protected_words = tokens.iter().filter(|t| t.protected).count();
        let candidates = build_candidates(tokens, entries, &self.config);
        let selection = select(candidates, tokens.len(), content, &self.config, rng);
        let (content, foreign_words) = rewrite(content, &selection.selected, &self.marker_class);

        let stats = ReplacementStats {
            total_words: tokens.len(),
            eligible_words: selection.eligible,
            replaced_words: foreign_words.len(),
            protected_words,
            skipped_by_density: selection.skipped_by_density,
        };
        debug!(
            "替换 {}/{} 个候选（共 {} 个词，{} 个受保护）",
            stats.replaced_words, stats.eligible_words, stats.total_words, stats.protected_words
        );

        ReplacementOutput {
            content,
            foreign_words,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::entry::{PartOfSpeech, ProficiencyLevel, ResolutionSource};
    use crate::parsers::tokenizer::{Tokenizer, TokenizerOptions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(word: &str, target: &str) -> WordEntry {
        WordEntry::new(word, target, "en", "es", ProficiencyLevel::Beginner, ResolutionSource::Store)
            .with_rank(Some(100))
            .with_part_of_speech(PartOfSpeech::Noun)
    }

    fn dense() -> Replacer {
        Replacer::new(
            SelectionConfig {
                density: 1.0,
                min_word_spacing: 0,
                ..SelectionConfig::default()
            },
            "foreign-word",
        )
    }

    #[test]
    fn test_marker_attributes() {
        let tokens = Tokenizer::default().tokenize("<p>the HOUSE</p>");
        let mut e = entry("house", "casa");
        e.pronunciation = Some("ˈka.sa".to_string());

        let (marker, visible) = render_marker(&tokens[1], &e, "foreign-word");
        assert_eq!(visible, "CASA");
        assert!(marker.starts_with("<span class=\"foreign-word\" data-original=\"HOUSE\""));
        assert!(marker.contains(&format!("data-word-id=\"{}\"", e.id)));
        assert!(marker.contains("data-pos=\"noun\""));
        assert!(marker.contains("data-pronunciation=\"ˈka.sa\""));
        assert!(marker.ends_with(">CASA</span>"));
    }

    #[test]
    fn test_rewrite_keeps_markup_and_positions() {
        let content = "<p>The house and the dog.</p>";
        let tokens = Tokenizer::default().tokenize(content);
        let entries: HashMap<String, WordEntry> = [entry("house", "casa"), entry("dog", "perro")]
            .into_iter()
            .map(|e| (e.source_word.clone(), e))
            .collect();

        let output = dense().replace(content, &tokens, &entries, &mut StdRng::seed_from_u64(3));

        assert_eq!(output.stats.replaced_words, 2);
        assert!(output.content.starts_with("<p>The <span"));
        assert!(output.content.ends_with("</span>.</p>"));

        let words: Vec<&str> = output.foreign_words.iter().map(|w| w.original.as_str()).collect();
        assert_eq!(words, vec!["house", "dog"]);
        for word in &output.foreign_words {
            let marker = &output.content[word.start..word.end];
            assert!(marker.starts_with("<span"));
            assert!(marker.ends_with(&format!(">{}</span>", word.replacement)));
        }
    }

    #[test]
    fn test_case_preservation() {
        let content = "<p>HOUSE, House, house</p>";
        let mut options = TokenizerOptions::default();
        options.skip_names = false;
        let tokens = Tokenizer::new(options).tokenize(content);
        let entries: HashMap<String, WordEntry> =
            [("house".to_string(), entry("house", "casa"))].into_iter().collect();

        let output = dense().replace(content, &tokens, &entries, &mut StdRng::seed_from_u64(1));
        let visible: Vec<&str> = output
            .foreign_words
            .iter()
            .map(|w| w.replacement.as_str())
            .collect();
        assert_eq!(visible, vec!["CASA", "Casa", "casa"]);
    }

    #[test]
    fn test_no_candidates_leaves_content_untouched() {
        let content = "<p>nothing to see here</p>";
        let tokens = Tokenizer::default().tokenize(content);
        let output = Replacer::default().replace(content, &tokens, &HashMap::new(), &mut StdRng::seed_from_u64(1));

        assert_eq!(output.content, content);
        assert!(output.foreign_words.is_empty());
        assert_eq!(output.stats.eligible_words, 0);
        assert_eq!(output.stats.total_words, tokens.len());
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(ReplacementStats::default()).unwrap();
        assert!(json.get("replacedWords").is_some());
        assert!(json.get("skippedByDensity").is_some());
    }
}
