//! 标记扫描工具
//!
//! 只做分词需要的最小识别：标签名、是否闭合、class 属性，以及注释、
//! doctype、处理指令和字符实体的边界。无法识别的 `<` 按普通文本处理。

/// 内容按原样保留、内部 `<` 不视为标签的元素
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// 一个标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// 小写标签名
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
    /// 标签结束位置（`>` 之后的字节偏移）
    pub end: usize,
    pub class: Option<String>,
}

impl Tag {
    pub fn has_class(&self, class: &str) -> bool {
        self.class
            .as_deref()
            .map(|c| c.split_whitespace().any(|item| item == class))
            .unwrap_or(false)
    }
}

/// `<` 开头的一段标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Tag(Tag),
    /// 注释、doctype、处理指令，整段跳过
    Ignored { end: usize },
}

/// 识别 `start` 处（必须是 `<`）的标记；不是合法标记时返回 `None`
pub fn scan_markup(input: &str, start: usize) -> Option<Markup> {
    let rest = input.get(start..)?;
    if !rest.starts_with('<') {
        return None;
    }

    if rest.starts_with("<!--") {
        let close = rest[4..].find("-->")?;
        return Some(Markup::Ignored {
            end: start + 4 + close + 3,
        });
    }

    let mut chars = rest[1..].chars();
    match chars.next()? {
        '!' | '?' => {
            let close = rest.find('>')?;
            Some(Markup::Ignored {
                end: start + close + 1,
            })
        }
        '/' => {
            let name_start = start + 2;
            let name = read_name(input, name_start);
            if name.is_empty() {
                return None;
            }
            let close = input[name_start..].find('>')?;
            Some(Markup::Tag(Tag {
                name: name.to_ascii_lowercase(),
                closing: true,
                self_closing: false,
                end: name_start + close + 1,
                class: None,
            }))
        }
        c if c.is_ascii_alphabetic() => {
            let name_start = start + 1;
            let name = read_name(input, name_start);
            let (attributes, end, self_closing) = scan_attributes(input, name_start + name.len())?;
            let class = attributes
                .into_iter()
                .find(|(key, _)| key == "class")
                .map(|(_, value)| value);
            Some(Markup::Tag(Tag {
                name: name.to_ascii_lowercase(),
                closing: false,
                self_closing,
                end,
                class,
            }))
        }
        _ => None,
    }
}

fn read_name(input: &str, from: usize) -> &str {
    let rest = &input[from..];
    let len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_'))
        .unwrap_or(rest.len());
    &rest[..len]
}

/// 扫描属性直到 `>`，引号内的 `>` 不结束标签。
/// 返回（小写属性名与值、结束偏移、是否自闭合）。
fn scan_attributes(input: &str, from: usize) -> Option<(Vec<(String, String)>, usize, bool)> {
    let bytes = input.as_bytes();
    let mut attributes = Vec::new();
    let mut i = from;
    let mut last_significant = b' ';

    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Some((attributes, i + 1, last_significant == b'/')),
            b if b.is_ascii_whitespace() => i += 1,
            b'/' => {
                last_significant = b'/';
                i += 1;
            }
            _ => {
                let key_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                let key = input[key_start..i].to_ascii_lowercase();
                let mut value = String::new();

                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'=' {
                    j += 1;
                    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    if j < bytes.len() && (bytes[j] == b'"' || bytes[j] == b'\'') {
                        let quote = bytes[j];
                        let value_start = j + 1;
                        let close = input[value_start..].find(quote as char)?;
                        value = input[value_start..value_start + close].to_string();
                        j = value_start + close + 1;
                    } else {
                        let value_start = j;
                        while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                            j += 1;
                        }
                        value = input[value_start..j].to_string();
                    }
                    i = j;
                }

                last_significant = b'a';
                attributes.push((key, value));
            }
        }
    }

    None
}

/// 原样文本元素的内容结束位置（对应闭合标签的 `<`，找不到时为输入末尾）
pub fn find_raw_text_end(input: &str, from: usize, name: &str) -> usize {
    let bytes = input.as_bytes();
    let name = name.as_bytes();
    let mut i = from;
    while let Some(offset) = input[i..].find("</") {
        let pos = i + offset;
        let name_start = pos + 2;
        let name_end = name_start + name.len();
        if name_end <= bytes.len() && bytes[name_start..name_end].eq_ignore_ascii_case(name) {
            let boundary = bytes.get(name_end).copied().unwrap_or(b'>');
            if boundary == b'>' || boundary.is_ascii_whitespace() {
                return pos;
            }
        }
        i = name_start;
    }
    input.len()
}

/// 识别 `start` 处的字符实体（`&amp;`、`&#8217;`、`&#x2019;`），返回其字节长度
pub fn entity_len(input: &str, start: usize) -> Option<usize> {
    let rest = input.get(start..)?.as_bytes();
    if rest.first() != Some(&b'&') {
        return None;
    }

    let mut i = 1;
    let valid_char: fn(u8) -> bool = if rest.get(1) == Some(&b'#') {
        i = 2;
        if matches!(rest.get(2), Some(b'x') | Some(b'X')) {
            i = 3;
            |b: u8| b.is_ascii_hexdigit()
        } else {
            |b: u8| b.is_ascii_digit()
        }
    } else {
        |b: u8| b.is_ascii_alphanumeric()
    };

    let body_start = i;
    while i < rest.len() && i - body_start < 32 && valid_char(rest[i]) {
        i += 1;
    }
    if i > body_start && rest.get(i) == Some(&b';') {
        Some(i + 1)
    } else {
        None
    }
}

/// 文本段内所有字符实体的字节区间
pub fn entity_ranges(text: &str) -> Vec<(usize, usize)> {
    text.match_indices('&')
        .filter_map(|(pos, _)| entity_len(text, pos).map(|len| (pos, pos + len)))
        .collect()
}

/// 转义文本与属性值
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
