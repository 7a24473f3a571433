//! 替换候选的构建、打分与选择
//!
//! 流程：过滤出候选 → 打分 → 按策略选出目标数量 → 按间距约束过滤。
//! 间距约束可能让最终数量少于目标数量。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::lexicon::entry::{normalize_word, PartOfSpeech, ProficiencyLevel, WordEntry};
use crate::parsers::tokenizer::Token;
use crate::translation::config::constants::AVERAGE_WORD_LENGTH;
use crate::translation::config::LearningConfig;
use crate::translation::error::TranslationError;

/// 选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// 打乱后取前若干个
    Random,
    /// 优先常见词
    Frequency,
    /// 在全文中均匀分布
    #[default]
    Distributed,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::Random => "random",
            SelectionStrategy::Frequency => "frequency",
            SelectionStrategy::Distributed => "distributed",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(SelectionStrategy::Random),
            "frequency" => Ok(SelectionStrategy::Frequency),
            "distributed" => Ok(SelectionStrategy::Distributed),
            other => Err(TranslationError::InvalidInput(format!(
                "未知的选择策略 '{}'，可选: random, frequency, distributed",
                other
            ))),
        }
    }
}

/// 选择参数
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub density: f64,
    pub min_word_spacing: usize,
    pub max_proficiency: ProficiencyLevel,
    pub strategy: SelectionStrategy,
    pub preferred_parts_of_speech: HashSet<PartOfSpeech>,
    /// 规范化形式
    pub excluded_words: HashSet<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self::from_learning(&LearningConfig::default())
    }
}

impl SelectionConfig {
    pub fn from_learning(learning: &LearningConfig) -> Self {
        Self {
            density: learning.density,
            min_word_spacing: learning.min_word_spacing,
            max_proficiency: learning.max_proficiency,
            strategy: learning.strategy,
            preferred_parts_of_speech: learning.preferred_parts_of_speech.iter().copied().collect(),
            excluded_words: learning
                .excluded_words
                .iter()
                .map(|w| normalize_word(w))
                .collect(),
        }
    }
}

/// 替换候选，只在选择过程中存在
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub token: &'a Token,
    pub entry: &'a WordEntry,
    pub score: i32,
}

impl Candidate<'_> {
    /// 未排名的词排在最后
    fn rank_key(&self) -> u32 {
        self.entry.frequency_rank.unwrap_or(u32::MAX)
    }
}

/// 候选得分
///
/// 基础 100 分；按词频排名扣分（`rank / 100`，最多 50，未排名扣满）；
/// 偏好词性 +20；不在句首 +10；不超过 6 个字符 +5。
pub fn score_candidate(
    token: &Token,
    entry: &WordEntry,
    preferred: &HashSet<PartOfSpeech>,
) -> i32 {
    let penalty = entry
        .frequency_rank
        .map(|rank| (rank / 100).min(50) as i32)
        .unwrap_or(50);

    let mut score = 100 - penalty;
    if preferred.contains(&entry.part_of_speech) {
        score += 20;
    }
    if !token.sentence_start {
        score += 10;
    }
    if token.char_len() <= 6 {
        score += 5;
    }
    score
}

/// 过滤并打分；受保护、被排除、没有词条或等级过高的 token 不是候选
pub fn build_candidates<'a>(
    tokens: &'a [Token],
    entries: &'a HashMap<String, WordEntry>,
    config: &SelectionConfig,
) -> Vec<Candidate<'a>> {
    tokens
        .iter()
        .filter(|token| !token.protected)
        .filter(|token| !config.excluded_words.contains(&token.word))
        .filter_map(|token| entries.get(&token.word).map(|entry| (token, entry)))
        .filter(|(_, entry)| entry.proficiency_level <= config.max_proficiency)
        .map(|(token, entry)| Candidate {
            token,
            entry,
            score: score_candidate(token, entry, &config.preferred_parts_of_speech),
        })
        .collect()
}

/// 目标替换数：有候选时为 `max(1, floor(total * density))`，不超过候选数
pub fn target_count(total_tokens: usize, density: f64, candidates: usize) -> usize {
    if candidates == 0 {
        return 0;
    }
    let wanted = (total_tokens as f64 * density).floor() as usize;
    wanted.max(1).min(candidates)
}

/// 选择结果
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// 最终选中的候选，按位置升序
    pub selected: Vec<Candidate<'a>>,
    pub eligible: usize,
    /// 因密度目标而未选中的候选数
    pub skipped_by_density: usize,
}

/// 按策略选择，再应用间距约束
pub fn select<'a, R: Rng + ?Sized>(
    candidates: Vec<Candidate<'a>>,
    total_tokens: usize,
    content: &str,
    config: &SelectionConfig,
    rng: &mut R,
) -> Selection<'a> {
    let eligible = candidates.len();
    let target = target_count(total_tokens, config.density, eligible);

    let chosen = match config.strategy {
        SelectionStrategy::Random => select_random(candidates, target, rng),
        SelectionStrategy::Frequency => select_by_frequency(candidates, target),
        SelectionStrategy::Distributed => select_distributed(candidates, target, rng),
    };
    let skipped_by_density = eligible - chosen.len();

    Selection {
        selected: apply_spacing(chosen, content, config.min_word_spacing),
        eligible,
        skipped_by_density,
    }
}

fn select_random<'a, R: Rng + ?Sized>(
    mut candidates: Vec<Candidate<'a>>,
    target: usize,
    rng: &mut R,
) -> Vec<Candidate<'a>> {
    candidates.shuffle(rng);
    candidates.truncate(target);
    candidates
}

fn select_by_frequency(mut candidates: Vec<Candidate<'_>>, target: usize) -> Vec<Candidate<'_>> {
    candidates.sort_by(|a, b| {
        a.rank_key()
            .cmp(&b.rank_key())
            .then(b.score.cmp(&a.score))
            .then(a.token.start.cmp(&b.token.start))
    });
    candidates.truncate(target);
    candidates
}

/// 按位置排序后，每个区间内抖动取一个
fn select_distributed<'a, R: Rng + ?Sized>(
    mut candidates: Vec<Candidate<'a>>,
    target: usize,
    rng: &mut R,
) -> Vec<Candidate<'a>> {
    if target == 0 {
        return Vec::new();
    }
    candidates.sort_by_key(|c| c.token.start);

    let total = candidates.len();
    let interval = total as f64 / target as f64;
    let mut picked: Vec<usize> = Vec::with_capacity(target);

    for i in 0..target {
        let jitter: f64 = rng.gen::<f64>() * interval;
        let mut index = ((i as f64 * interval + jitter).floor() as usize).min(total - 1);
        if let Some(&last) = picked.last() {
            if index <= last {
                index = last + 1;
            }
        }
        if index >= total {
            break;
        }
        picked.push(index);
    }

    picked.into_iter().map(|index| candidates[index]).collect()
}

/// 间距约束：按位置从左到右，与上一个保留项之间的估算词数不小于 `min_spacing` 才保留
pub fn apply_spacing<'a>(
    mut chosen: Vec<Candidate<'a>>,
    content: &str,
    min_spacing: usize,
) -> Vec<Candidate<'a>> {
    chosen.sort_by_key(|c| c.token.start);
    if min_spacing == 0 {
        return chosen;
    }

    let mut kept: Vec<Candidate<'a>> = Vec::with_capacity(chosen.len());
    for candidate in chosen {
        let far_enough = match kept.last() {
            None => true,
            Some(previous) => estimated_gap(content, previous.token, candidate.token) >= min_spacing,
        };
        if far_enough {
            kept.push(candidate);
        }
    }
    kept
}

/// 两个 token 之间的估算词数（字符数 / 平均词长）
pub fn estimated_gap(content: &str, previous: &Token, next: &Token) -> usize {
    let chars = content
        .get(previous.end..next.start)
        .map(|between| between.chars().count())
        .unwrap_or(0);
    chars / AVERAGE_WORD_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::entry::ResolutionSource;
    use crate::parsers::tokenizer::Tokenizer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(word: &str, target: &str, level: ProficiencyLevel, rank: Option<u32>) -> WordEntry {
        WordEntry::new(word, target, "en", "es", level, ResolutionSource::Store).with_rank(rank)
    }

    fn entries(words: &[(&str, &str, u32)]) -> HashMap<String, WordEntry> {
        words
            .iter()
            .map(|&(w, t, rank)| {
                (w.to_string(), entry(w, t, ProficiencyLevel::from_rank(rank), Some(rank)))
            })
            .collect()
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("RANDOM".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Random);
        assert_eq!(SelectionStrategy::default(), SelectionStrategy::Distributed);
        assert!("alphabetical".parse::<SelectionStrategy>().is_err());
        assert_eq!(SelectionStrategy::Frequency.to_string(), "frequency");
    }

    #[test]
    fn test_score() {
        let tokens = Tokenizer::default().tokenize("<p>Houses near the house</p>");
        let preferred: HashSet<_> = [PartOfSpeech::Noun].into_iter().collect();
        let noun = entry("house", "casa", ProficiencyLevel::Beginner, Some(250))
            .with_part_of_speech(PartOfSpeech::Noun);

        // 100 - 2 + 20 + 10 + 5
        assert_eq!(score_candidate(&tokens[3], &noun, &preferred), 133);
        // 句首，6 个字符
        assert_eq!(score_candidate(&tokens[0], &noun, &preferred), 123);

        let unranked = entry("near", "cerca", ProficiencyLevel::Intermediate, None);
        assert_eq!(score_candidate(&tokens[1], &unranked, &preferred), 65);

        let rare = entry("house", "casa", ProficiencyLevel::Advanced, Some(9000));
        assert_eq!(score_candidate(&tokens[3], &rare, &HashSet::new()), 65);
    }

    #[test]
    fn test_target_count() {
        assert_eq!(target_count(10, 0.15, 5), 1);
        assert_eq!(target_count(100, 0.25, 50), 25);
        assert_eq!(target_count(100, 0.25, 4), 4);
        assert_eq!(target_count(100, 0.15, 0), 0);
        assert_eq!(target_count(3, 1.0, 3), 3);
    }

    #[test]
    fn test_candidates_filtering() {
        let tokens = Tokenizer::default()
            .tokenize("<p>the dog saw \"the cat\" near a castle in London</p>");
        let mut map = entries(&[("dog", "perro", 780), ("cat", "gato", 1450), ("near", "cerca", 600)]);
        map.insert(
            "castle".to_string(),
            entry("castle", "castillo", ProficiencyLevel::Advanced, Some(4000)),
        );
        map.insert(
            "london".to_string(),
            entry("london", "Londres", ProficiencyLevel::Beginner, Some(300)),
        );

        let mut config = SelectionConfig::default();
        config.excluded_words.insert("near".to_string());
        let candidates = build_candidates(&tokens, &map, &config);
        let words: Vec<&str> = candidates.iter().map(|c| c.token.word.as_str()).collect();

        // cat 在引号内；near 被排除；castle 等级过高；London 是专有名词
        assert_eq!(words, vec!["dog"]);
    }

    #[test]
    fn test_spacing() {
        let content = "<p>house table window garden kitchen and then a long stretch of words before forest</p>";
        let tokens = Tokenizer::default().tokenize(content);
        let map = entries(&[
            ("house", "casa", 250),
            ("table", "mesa", 1240),
            ("window", "ventana", 1150),
            ("garden", "jardín", 1900),
            ("kitchen", "cocina", 1800),
            ("forest", "bosque", 1900),
        ]);
        let candidates = build_candidates(&tokens, &map, &SelectionConfig::default());
        assert_eq!(candidates.len(), 6);

        let kept = apply_spacing(candidates, content, 3);
        let words: Vec<&str> = kept.iter().map(|c| c.token.word.as_str()).collect();
        assert_eq!(words, vec!["house", "kitchen", "forest"]);
        for pair in kept.windows(2) {
            assert!(estimated_gap(content, pair[0].token, pair[1].token) >= 3);
        }
    }

    #[test]
    fn test_strategies_respect_target() {
        let content = "<p>house table window garden kitchen forest</p>";
        let tokens = Tokenizer::default().tokenize(content);
        let map = entries(&[
            ("house", "casa", 250),
            ("table", "mesa", 1240),
            ("window", "ventana", 1150),
            ("garden", "jardín", 1900),
            ("kitchen", "cocina", 1800),
            ("forest", "bosque", 1900),
        ]);

        for strategy in [
            SelectionStrategy::Random,
            SelectionStrategy::Frequency,
            SelectionStrategy::Distributed,
        ] {
            let config = SelectionConfig {
                density: 0.5,
                min_word_spacing: 0,
                strategy,
                ..SelectionConfig::default()
            };
            let mut rng = StdRng::seed_from_u64(7);
            let candidates = build_candidates(&tokens, &map, &config);
            let selection = select(candidates, tokens.len(), content, &config, &mut rng);

            assert_eq!(selection.selected.len(), 3, "strategy {}", strategy);
            assert_eq!(selection.eligible, 6);
            assert_eq!(selection.skipped_by_density, 3);
            assert!(selection
                .selected
                .windows(2)
                .all(|w| w[0].token.start < w[1].token.start));
        }
    }

    #[test]
    fn test_frequency_prefers_common_words() {
        let content = "<p>forest garden house window</p>";
        let tokens = Tokenizer::default().tokenize(content);
        let map = entries(&[
            ("house", "casa", 250),
            ("window", "ventana", 1150),
            ("garden", "jardín", 1900),
            ("forest", "bosque", 1950),
        ]);
        let config = SelectionConfig {
            density: 0.5,
            min_word_spacing: 0,
            strategy: SelectionStrategy::Frequency,
            ..SelectionConfig::default()
        };
        let candidates = build_candidates(&tokens, &map, &config);
        let selection = select(candidates, tokens.len(), content, &config, &mut StdRng::seed_from_u64(1));
        let words: Vec<&str> = selection.selected.iter().map(|c| c.token.word.as_str()).collect();
        assert_eq!(words, vec!["house", "window"]);
    }

    #[test]
    fn test_same_seed_same_selection() {
        let content = "<p>house table window garden kitchen forest house table window garden</p>";
        let tokens = Tokenizer::default().tokenize(content);
        let map = entries(&[
            ("house", "casa", 250),
            ("table", "mesa", 1240),
            ("window", "ventana", 1150),
            ("garden", "jardín", 1900),
            ("kitchen", "cocina", 1800),
            ("forest", "bosque", 1900),
        ]);
        let config = SelectionConfig {
            density: 0.3,
            min_word_spacing: 0,
            strategy: SelectionStrategy::Random,
            ..SelectionConfig::default()
        };

        let run = |seed: u64| {
            let candidates = build_candidates(&tokens, &map, &config);
            select(candidates, tokens.len(), content, &config, &mut StdRng::seed_from_u64(seed))
                .selected
                .iter()
                .map(|c| c.token.start)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
