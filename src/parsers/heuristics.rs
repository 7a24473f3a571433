//! 启发式规则：缩写、称谓、专有名词与大小写模式

/// 常见英文缩写（需以 `.` 结尾才视为缩写）
pub const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "etc", "inc", "ltd",
    "co", "corp", "dept", "univ", "approx", "fig", "vol", "no", "ed", "eds", "est",
    "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
    "capt", "col", "gen", "lt", "sgt", "rev", "gov", "sen", "rep",
];

/// 后面通常跟人名的称谓
pub const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "sir", "dame", "madam", "lord", "lady",
    "saint", "st", "capt", "captain", "col", "colonel", "gen", "general", "lt", "sgt",
    "rev", "father", "sister", "brother", "king", "queen", "prince", "princess",
    "president", "senator", "uncle", "aunt",
];

/// 结束句子的标点
pub fn is_sentence_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

pub fn is_abbreviation(normalized: &str) -> bool {
    ABBREVIATIONS.contains(&normalized)
}

pub fn is_honorific(normalized: &str) -> bool {
    HONORIFICS.contains(&normalized)
}

/// 原词的大小写模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePattern {
    Lower,
    /// 首字母大写
    Title,
    Upper,
    Mixed,
}

impl CasePattern {
    pub fn of(word: &str) -> Self {
        let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.is_empty() {
            return CasePattern::Lower;
        }

        let cased: Vec<char> = letters
            .iter()
            .copied()
            .filter(|c| c.is_uppercase() || c.is_lowercase())
            .collect();
        if cased.is_empty() {
            return CasePattern::Lower;
        }

        let upper = cased.iter().filter(|c| c.is_uppercase()).count();
        if upper == 0 {
            CasePattern::Lower
        } else if upper == cased.len() && cased.len() > 1 {
            CasePattern::Upper
        } else if cased[0].is_uppercase() && upper == 1 {
            CasePattern::Title
        } else if upper == cased.len() {
            // 单个大写字母
            CasePattern::Title
        } else {
            CasePattern::Mixed
        }
    }
}

/// 按原词的大小写模式调整替换词
pub fn match_case(original: &str, replacement: &str) -> String {
    match CasePattern::of(original) {
        CasePattern::Upper => replacement.to_uppercase(),
        CasePattern::Title => capitalize(replacement),
        CasePattern::Lower => replacement.to_lowercase(),
        CasePattern::Mixed => replacement.to_string(),
    }
}

/// 首字母大写，其余保持不变
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn starts_uppercase(word: &str) -> bool {
    word.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// 是否像专有名词
///
/// 首字母大写，且满足其一：不在句首；前一个词是称谓；
/// 全大写或含内部大写（句首也算）。
pub fn looks_like_name(word: &str, sentence_start: bool, previous: Option<&str>) -> bool {
    if !starts_uppercase(word) {
        return false;
    }

    if !sentence_start {
        return true;
    }

    if previous.map(is_honorific).unwrap_or(false) {
        return true;
    }

    matches!(CasePattern::of(word), CasePattern::Upper | CasePattern::Mixed)
}
