//! 标记感知分词器
//!
//! 单遍扫描标记文本，维护跳过元素栈与未闭合的引号，按文本段切分单词并记录
//! 精确的字节偏移：对每个 token 都有 `&markup[start..end] == original`。
//! 分词是纯 CPU 操作，不会失败；畸形标记按文本处理。

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lexicon::entry::normalize_word;
use crate::parsers::heuristics::{is_abbreviation, is_sentence_terminator, looks_like_name};
use crate::parsers::markup::{
    entity_ranges, find_raw_text_end, scan_markup, Markup, Tag, RAW_TEXT_ELEMENTS,
};
use crate::translation::config::constants;
use crate::translation::config::TokenizerConfig;

/// 单词模式：字母开头，允许内部撇号和连字符
fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| {
        Regex::new(r"\p{L}[\p{L}\p{M}]*(?:['’\-]\p{L}[\p{L}\p{M}]*)*")
            .expect("word pattern is a valid regex")
    })
}

/// 受保护的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectionReason {
    /// 引号内文本
    Quoted,
    /// 代码、脚本等跳过元素内
    CodeRegion,
    /// 疑似专有名词
    ProperName,
    /// 已知缩写
    Abbreviation,
}

/// 从标记中提取出的单词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// 规范化（小写）后的单词
    pub word: String,
    /// 原文中的写法
    pub original: String,
    /// 起始字节偏移
    pub start: usize,
    /// 结束字节偏移（不含）
    pub end: usize,
    /// 紧邻的前导标点
    pub prefix: String,
    /// 紧邻的后随标点
    pub suffix: String,
    pub protected: bool,
    pub protection: Option<ProtectionReason>,
    /// 是否位于句首
    pub sentence_start: bool,
}

impl Token {
    /// 原文中的字符数
    pub fn char_len(&self) -> usize {
        self.original.chars().count()
    }
}

/// 分词选项
#[derive(Debug, Clone)]
pub struct TokenizerOptions {
    pub min_word_length: usize,
    pub max_word_length: usize,
    pub skip_quoted: bool,
    pub skip_names: bool,
    /// 直接丢弃的单词（规范化形式）
    pub skip_words: HashSet<String>,
    /// 内容整体受保护的元素
    pub skip_elements: HashSet<String>,
    /// 已有替换标记的 class，其内容同样受保护
    pub marker_class: Option<String>,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self::from_config(&TokenizerConfig::default(), constants::DEFAULT_MARKER_CLASS)
    }
}

impl TokenizerOptions {
    pub fn from_config(config: &TokenizerConfig, marker_class: &str) -> Self {
        let skip_elements = constants::SKIP_ELEMENTS
            .iter()
            .map(|name| name.to_string())
            .chain(config.extra_skip_elements.iter().map(|name| name.to_ascii_lowercase()))
            .collect();

        Self {
            min_word_length: config.min_word_length,
            max_word_length: config.max_word_length,
            skip_quoted: config.skip_quoted,
            skip_names: config.skip_names,
            skip_words: config.skip_words.iter().map(|w| normalize_word(w)).collect(),
            skip_elements,
            marker_class: if marker_class.is_empty() {
                None
            } else {
                Some(marker_class.to_string())
            },
        }
    }
}

/// 扫描过程中的状态
struct ScanState {
    tokens: Vec<Token>,
    /// 打开的跳过元素
    skip_stack: Vec<String>,
    /// 未闭合引号的开引号字符
    quote_stack: Vec<char>,
    sentence_start: bool,
    previous: Option<String>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            skip_stack: Vec::new(),
            quote_stack: Vec::new(),
            sentence_start: true,
            previous: None,
        }
    }

    fn reset_block(&mut self) {
        self.sentence_start = true;
        self.quote_stack.clear();
        self.previous = None;
    }

    /// 换行只结束句子，引号可以跨行
    fn break_line(&mut self) {
        self.sentence_start = true;
        self.previous = None;
    }

    fn in_quote(&self) -> bool {
        !self.quote_stack.is_empty()
    }

    fn quote_char(&mut self, c: char) {
        let open = self.quote_stack.last().copied();
        match c {
            '"' if open == Some('"') => {
                self.quote_stack.pop();
            }
            '"' => self.quote_stack.push('"'),
            // 德语引号以 „ 开、以 “ 闭
            '“' if open == Some('„') => {
                self.quote_stack.pop();
            }
            '“' | '«' | '„' => self.quote_stack.push(c),
            '”' | '»' => {
                self.quote_stack.pop();
            }
            _ => {}
        }
    }
}

/// 分词器
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    options: TokenizerOptions,
}

impl Tokenizer {
    pub fn new(options: TokenizerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    /// 对标记文本分词，结果按位置排序且互不重叠
    pub fn tokenize(&self, markup: &str) -> Vec<Token> {
        let mut state = ScanState::new();
        let bytes = markup.as_bytes();
        let mut text_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'<' {
                i += 1;
                continue;
            }

            match scan_markup(markup, i) {
                None => i += 1,
                Some(Markup::Ignored { end }) => {
                    self.scan_text(&mut state, markup, text_start, i);
                    i = end;
                    text_start = end;
                }
                Some(Markup::Tag(tag)) => {
                    self.scan_text(&mut state, markup, text_start, i);
                    self.enter_tag(&mut state, &tag);
                    i = tag.end;

                    if !tag.closing
                        && !tag.self_closing
                        && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str())
                    {
                        let raw_end = find_raw_text_end(markup, i, &tag.name);
                        self.scan_text(&mut state, markup, i, raw_end);
                        i = raw_end;
                    }
                    text_start = i;
                }
            }
        }

        self.scan_text(&mut state, markup, text_start, bytes.len());
        state.tokens
    }

    fn enter_tag(&self, state: &mut ScanState, tag: &Tag) {
        let name = tag.name.as_str();
        if constants::LINE_BREAK_ELEMENTS.contains(&name) {
            state.break_line();
        } else if constants::BLOCK_ELEMENTS.contains(&name) {
            state.reset_block();
        }

        if tag.closing {
            if let Some(pos) = state.skip_stack.iter().rposition(|name| *name == tag.name) {
                state.skip_stack.truncate(pos);
            }
            return;
        }

        if tag.self_closing {
            return;
        }

        let is_marker = self
            .options
            .marker_class
            .as_deref()
            .map(|class| tag.has_class(class))
            .unwrap_or(false);
        // 跳过区域内同名元素嵌套时也要入栈，保证闭合配对
        let nested = state.skip_stack.last() == Some(&tag.name);

        if is_marker || nested || self.options.skip_elements.contains(&tag.name) {
            state.skip_stack.push(tag.name.clone());
        }
    }

    /// 处理两个标签之间的一段文本
    fn scan_text(&self, state: &mut ScanState, markup: &str, from: usize, to: usize) {
        if from >= to {
            return;
        }

        let text = &markup[from..to];
        let protected_segment = !state.skip_stack.is_empty();
        let entities = entity_ranges(text);

        // 与字符实体重叠、或紧贴字母实体的片段不是单词
        let matches: Vec<(usize, usize)> = word_pattern()
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .filter(|&(start, end)| {
                !entities.iter().any(|&(e_start, e_end)| {
                    let overlaps = start < e_end && e_start < end;
                    let touches = start == e_end || end == e_start;
                    overlaps || (touches && entity_is_letter(&text[e_start..e_end]))
                })
            })
            .collect();

        let mut cursor = 0;
        for (index, &(start, end)) in matches.iter().enumerate() {
            let gap = &text[cursor..start];
            self.scan_gap(state, gap, &entities, cursor);

            let next_start = matches
                .get(index + 1)
                .map(|&(next, _)| next)
                .unwrap_or(text.len());
            let original = &text[start..end];
            let prefix = trailing_punctuation(gap);
            let suffix = leading_punctuation(&text[end..next_start]);

            self.emit_word(
                state,
                original,
                from + start,
                from + end,
                prefix,
                suffix,
                protected_segment,
            );
            cursor = end;
        }

        self.scan_gap(state, &text[cursor..], &entities, cursor);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_word(
        &self,
        state: &mut ScanState,
        original: &str,
        start: usize,
        end: usize,
        prefix: &str,
        suffix: &str,
        protected_segment: bool,
    ) {
        let word = normalize_word(original);
        let sentence_start = state.sentence_start;
        let previous = state.previous.replace(word.clone());
        state.sentence_start = false;

        let char_len = original.chars().count();
        if char_len < self.options.min_word_length
            || char_len > self.options.max_word_length
            || self.options.skip_words.contains(&word)
        {
            return;
        }

        let protection = if protected_segment {
            Some(ProtectionReason::CodeRegion)
        } else if self.options.skip_quoted && state.in_quote() {
            Some(ProtectionReason::Quoted)
        } else if is_abbreviation(&word) && suffix.starts_with('.') {
            Some(ProtectionReason::Abbreviation)
        } else if self.options.skip_names
            && looks_like_name(original, sentence_start, previous.as_deref())
        {
            Some(ProtectionReason::ProperName)
        } else {
            None
        };

        state.tokens.push(Token {
            word,
            original: original.to_string(),
            start,
            end,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            protected: protection.is_some(),
            protection,
            sentence_start,
        });
    }

    /// 扫描单词之间的文本，更新引号状态和句子边界。
    /// `offset` 是 `gap` 在所在文本段中的起始位置。
    fn scan_gap(&self, state: &mut ScanState, gap: &str, entities: &[(usize, usize)], offset: usize) {
        if !state.skip_stack.is_empty() {
            return;
        }

        let after_abbreviation = state
            .previous
            .as_deref()
            .map(is_abbreviation)
            .unwrap_or(false);
        let mut skip_until = 0;

        for (pos, c) in gap.char_indices() {
            if pos < skip_until {
                continue;
            }

            let c = match entities.iter().find(|&&(start, _)| start == offset + pos) {
                Some(&(_, end)) => {
                    skip_until = end - offset;
                    match decode_entity(&gap[pos..skip_until]) {
                        Some(decoded) => decoded,
                        None => continue,
                    }
                }
                None => c,
            };

            match c {
                '"' | '“' | '«' | '„' | '”' | '»' => state.quote_char(c),
                '.' if pos == 0 && after_abbreviation => {}
                c if is_sentence_terminator(c) => state.sentence_start = true,
                _ => {}
            }
        }
    }
}

/// 影响引号与句子状态的字符实体
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "&quot;" | "&#34;" | "&#x22;" => Some('"'),
        "&ldquo;" | "&#8220;" | "&#x201C;" | "&#x201c;" | "&laquo;" | "&#171;" => Some('“'),
        "&rdquo;" | "&#8221;" | "&#x201D;" | "&#x201d;" | "&raquo;" | "&#187;" => Some('”'),
        "&bdquo;" | "&#8222;" | "&#x201E;" | "&#x201e;" => Some('„'),
        "&hellip;" | "&#8230;" => Some('…'),
        _ => None,
    }
}

/// 实体是否代表字母（如 `&eacute;`、`&#233;`），紧贴它的片段属于同一个词
fn entity_is_letter(entity: &str) -> bool {
    let body = entity.trim_start_matches('&').trim_end_matches(';');
    if let Some(number) = body.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(char::is_alphabetic)
            .unwrap_or(false);
    }

    !matches!(
        body,
        "amp" | "lt" | "gt" | "quot" | "apos" | "nbsp" | "ldquo" | "rdquo" | "lsquo"
            | "rsquo" | "bdquo" | "laquo" | "raquo" | "hellip" | "mdash" | "ndash" | "middot"
            | "bull" | "copy" | "reg" | "trade" | "shy" | "thinsp" | "ensp" | "emsp"
    )
}

fn is_punctuation(c: char) -> bool {
    !c.is_whitespace() && !c.is_alphanumeric() && c != '&' && c != ';'
}

fn trailing_punctuation(gap: &str) -> &str {
    let start = gap
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_punctuation(c))
        .last()
        .map(|(pos, _)| pos)
        .unwrap_or(gap.len());
    &gap[start..]
}

fn leading_punctuation(gap: &str) -> &str {
    let end = gap
        .char_indices()
        .find(|&(_, c)| !is_punctuation(c))
        .map(|(pos, _)| pos)
        .unwrap_or(gap.len());
    &gap[..end]
}

/// 未受保护 token 中的不同单词，按首次出现的顺序
pub fn get_unique_words(tokens: &[Token]) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .filter(|token| !token.protected)
        .filter(|token| seen.insert(token.word.as_str()))
        .map(|token| token.word.clone())
        .collect()
}
