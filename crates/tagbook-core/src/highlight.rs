//! Source-code tokenizer built on the [`pattern`](crate::pattern) matcher.
//!
//! A language is described by eight ordered pattern tables; unknown languages
//! fall back to a generic table set that covers the usual C-family and
//! script-family lexemes.

use once_cell::sync::Lazy;

use crate::pattern::{MatchResult, match_pattern};

pub const HL_COMMENT: usize = 0;
pub const HL_RESERVED: usize = 1;
pub const HL_OPERATOR: usize = 2;
pub const HL_NUMBER: usize = 3;
pub const HL_QUOTE: usize = 4;
pub const HL_PUNCTUATION: usize = 5;
pub const HL_TYPE: usize = 6;
pub const HL_KEYWORD: usize = 7;

// Token categories. The first eight line up with the table indices; words
// that survive reclassification stay CAT_WORD.
const CAT_STRING: u8 = 4;
const CAT_SEPARATOR: u8 = 5;
const CAT_TYPE: u8 = 6;
const CAT_KEYWORD: u8 = 7;
const CAT_FUNCTION: u8 = 8;
const CAT_WORD: u8 = 9;
const CAT_CLASSES: &[u8; 10] = b"cpons.tkfv";

/// One language's highlight tables, loaded before parsing and immutable
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct HighlightRules {
    pub name: String,
    pub tables: [Vec<String>; 8],
}

/// All loaded rule tables, looked up by exact language name.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<HighlightRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rules: HighlightRules) {
        self.rules.push(rules);
    }

    pub fn lookup(&self, name: &str) -> Option<&HighlightRules> {
        self.rules.iter().find(|rules| rules.name == name)
    }

    pub fn generic() -> &'static HighlightRules {
        &GENERIC
    }
}

static GENERIC: Lazy<HighlightRules> = Lazy::new(|| {
    fn table(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|entry| (*entry).to_string()).collect()
    }
    HighlightRules {
        name: String::new(),
        tables: [
            table(&["\\/\\/.*?$", "\\/\\*.*?\\*\\/", "#.*?$"]),
            table(&[]),
            table(&["[:=\\<\\>\\+\\-\\*\\/%&\\^\\|!][:=]?"]),
            table(&["[0-9][0-9bx]?[0-9\\.a-fp]*"]),
            table(&["\"", "'", "`"]),
            table(&["[", "]", "{", "}", ",", ";", ":"]),
            table(&[
                "char", "int", "float", "true", "false", "nil", "null", "nullptr", "none",
                "public", "static", "struct", "enum", "typedef", "from", "with", "new", "delete",
                "void",
            ]),
            table(&[
                "import", "def", "if", "then", "elseif", "else", "endif", "elif", "switch",
                "case", "loop", "until", "for", "foreach", "as", "is", "in", "or", "and", "while",
                "do", "break", "continue", "function", "return", "try", "catch", "volatile",
                "class", "sizeof",
            ]),
        ],
    }
});

#[derive(Clone, Copy, Debug)]
struct Token {
    start: usize,
    cat: u8,
}

/// Emits a highlighted code block: line-number gutter, then the tokenized
/// source wrapped in per-category spans.
pub fn render_code(out: &mut String, source: &str, rules: &HighlightRules) {
    out.push_str("<div class=\"pre\"><pre class=\"lineno\">");
    let bytes = source.as_bytes();
    let mut start = 0;
    while start < bytes.len() && matches!(bytes[start], b'\r' | b'\n') {
        start += 1;
    }
    let mut end = bytes.len();
    while end > start && matches!(bytes[end - 1], b' ' | b'\r' | b'\n') {
        end -= 1;
    }
    let code = &bytes[start..end];
    if code.is_empty() {
        out.push_str("</pre><code>");
    } else {
        let mut line = 1u32;
        for &b in code {
            if b == b'\n' {
                out.push_str(&format!("{}<br>", line));
                line += 1;
            }
        }
        out.push_str(&format!("{}<br></pre><code>", line));
        let tokens = tokenize(code, rules);
        emit_tokens(out, code, &tokens);
    }
    out.push_str("</code></div>");
}

fn tokenize(src: &[u8], rules: &HighlightRules) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut k = 0;
    'scan: while k < src.len() {
        let last_cat = tokens.last().map(|token| token.cat);

        // A shebang counts as a whole-line comment, first line only.
        if k == 0 && src.len() > 1 && src[0] == b'#' && src[1] == b'!' {
            tokens.push(Token { start: 0, cat: HL_COMMENT as u8 });
            while k < src.len() && src[k] != b'\r' && src[k] != b'\n' {
                k += 1;
            }
            continue;
        }

        // Force-highlight markers are their own token boundary, excluded
        // from category accounting.
        if let Some(len) = marker_len(src, k) {
            if last_cat != Some(CAT_SEPARATOR) {
                tokens.push(Token { start: k, cat: CAT_SEPARATOR });
            }
            k += len;
            continue;
        }

        if src[k] == b'(' {
            tokens.push(Token { start: k, cat: CAT_SEPARATOR });
            k += 1;
            continue;
        }

        let listed_punct = rules.tables[HL_PUNCTUATION]
            .iter()
            .any(|p| p.as_bytes().first() == Some(&src[k]));
        if listed_punct || matches!(src[k], b')' | b' ' | b'\t' | b'\r' | b'\n') {
            if last_cat != Some(CAT_SEPARATOR) {
                tokens.push(Token { start: k, cat: CAT_SEPARATOR });
            }
            k += 1;
            continue;
        }

        for m in 0..4 {
            // A number directly after word characters is part of an
            // identifier, not a numeric literal.
            if m == HL_NUMBER && last_cat == Some(CAT_WORD) {
                continue;
            }
            for pat in &rules.tables[m] {
                let len = match match_pattern(pat.as_bytes(), &src[k..]) {
                    MatchResult::Matched(len) => len,
                    _ => continue,
                };
                // Alphabetic operators only match between non-identifier
                // boundaries, so `div` inside `divisor` stays a word.
                if m == HL_OPERATOR && src[k].is_ascii_alphabetic() {
                    let prev_ok = k == 0
                        || matches!(src[k - 1], b' ' | b'\t' | b'\r' | b'\n' | b')' | b']')
                        || src[k - 1].is_ascii_digit();
                    let next_ok = k + len >= src.len()
                        || matches!(src[k + len], b' ' | b'\t' | b'\r' | b'\n' | b'(' | b'[')
                        || src[k + len].is_ascii_digit();
                    if !prev_ok || !next_ok {
                        continue;
                    }
                }
                if last_cat != Some(m as u8) {
                    tokens.push(Token { start: k, cat: m as u8 });
                }
                k += len;
                continue 'scan;
            }
        }

        for quote in &rules.tables[HL_QUOTE] {
            let open = quote.as_bytes();
            if !src[k..].starts_with(open) {
                continue;
            }
            if last_cat != Some(CAT_STRING) {
                tokens.push(Token { start: k, cat: CAT_STRING });
            }
            k += open.len();
            let close = open[open.len() - 1];
            while k < src.len() {
                if src[k] == b'\\' {
                    k += 2;
                    continue;
                }
                if src[k] == close {
                    if src.get(k + 1) == Some(&close) {
                        k += 2;
                        continue;
                    }
                    break;
                }
                k += 1;
            }
            if k < src.len() {
                k += 1;
            }
            continue 'scan;
        }

        if last_cat != Some(CAT_WORD) {
            tokens.push(Token { start: k, cat: CAT_WORD });
        }
        k += 1;
    }

    reclassify(src, &mut tokens, rules);
    tokens
}

fn reclassify(src: &[u8], tokens: &mut [Token], rules: &HighlightRules) {
    for i in 0..tokens.len() {
        if tokens[i].cat == CAT_WORD {
            let end = tokens.get(i + 1).map(|t| t.start).unwrap_or(src.len());
            let word: String = src[tokens[i].start..end]
                .iter()
                .map(|b| b.to_ascii_lowercase() as char)
                .collect();
            if rules.tables[HL_TYPE].iter().any(|entry| *entry == word) {
                tokens[i].cat = CAT_TYPE;
            } else if rules.tables[HL_KEYWORD].iter().any(|entry| *entry == word) {
                tokens[i].cat = CAT_KEYWORD;
            } else {
                let direct = end < src.len() && src[end] == b'(';
                let via_separator = i + 2 < tokens.len()
                    && tokens[i + 2].cat == CAT_SEPARATOR
                    && src[tokens[i + 2].start] == b'(';
                if direct || via_separator {
                    tokens[i].cat = CAT_FUNCTION;
                }
            }
        }
        // `-1` and `.5` attach the sign or decimal point to the number.
        if i > 0
            && tokens[i].cat == HL_NUMBER as u8
            && tokens[i - 1].cat == HL_OPERATOR as u8
            && matches!(src[tokens[i - 1].start], b'-' | b'.')
            && tokens[i].start > 0
        {
            tokens[i].start -= 1;
        }
    }
}

fn marker_len(src: &[u8], k: usize) -> Option<usize> {
    if src[k..].starts_with(b"<hl>") || src[k..].starts_with(b"<hm>") {
        return Some(4);
    }
    if src[k..].starts_with(b"</hl>") {
        return Some(5);
    }
    if src[k..].starts_with(b"</hm>") {
        if src.get(k + 5) == Some(&b'\n') {
            return Some(6);
        }
        if src.get(k + 5) == Some(&b'\r') && src.get(k + 6) == Some(&b'\n') {
            return Some(7);
        }
        return Some(5);
    }
    None
}

fn emit_tokens(out: &mut String, src: &[u8], tokens: &[Token]) {
    let mut cursor = 0usize;
    for i in 0..tokens.len() {
        let end = tokens.get(i + 1).map(|t| t.start).unwrap_or(src.len());
        if end == cursor {
            continue;
        }
        let cat = tokens[i].cat;
        if cat != CAT_SEPARATOR {
            out.push_str("<span class=\"hl_");
            out.push(CAT_CLASSES[cat as usize] as char);
            out.push_str("\">");
        }
        let mut pos = cursor;
        let mut seg = cursor;
        while pos < end {
            if src[pos] == b'<' {
                if src[pos..].starts_with(b"<hl>") {
                    push_escaped(out, &src[seg..pos]);
                    out.push_str("<span class=\"hl_h\">");
                    pos += 4;
                    seg = pos;
                    continue;
                }
                if src[pos..].starts_with(b"<hm>") {
                    push_escaped(out, &src[seg..pos]);
                    out.push_str("<span class=\"hl_h hl_b\">");
                    pos += 4;
                    seg = pos;
                    continue;
                }
                if src[pos..].starts_with(b"</hl>") || src[pos..].starts_with(b"</hm>") {
                    push_escaped(out, &src[seg..pos]);
                    out.push_str("</span>");
                    let block = src[pos + 3] == b'm';
                    pos += 5;
                    if block {
                        if src.get(pos) == Some(&b'\r') && src.get(pos + 1) == Some(&b'\n') {
                            pos += 2;
                        } else if matches!(src.get(pos), Some(&b'\n') | Some(&b'\r')) {
                            pos += 1;
                        }
                    }
                    seg = pos;
                    continue;
                }
            }
            pos += 1;
        }
        push_escaped(out, &src[seg..end]);
        if cat != CAT_SEPARATOR {
            out.push_str("</span>");
        }
        cursor = end;
    }
}

fn push_escaped(out: &mut String, bytes: &[u8]) {
    let mut start = 0;
    for (idx, &b) in bytes.iter().enumerate() {
        let replacement = match b {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            _ => continue,
        };
        out.push_str(&String::from_utf8_lossy(&bytes[start..idx]));
        out.push_str(replacement);
        start = idx + 1;
    }
    out.push_str(&String::from_utf8_lossy(&bytes[start..]));
}

#[cfg(test)]
mod tests {
    use super::{RuleSet, render_code};

    fn highlighted(source: &str) -> String {
        let mut out = String::new();
        render_code(&mut out, source, RuleSet::generic());
        out
    }

    fn strip_markup(html: &str) -> String {
        let mut out = String::new();
        let mut in_tag = false;
        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(ch),
                _ => {}
            }
        }
        out.replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
    }

    #[test]
    fn round_trips_the_source_text() {
        let source = "int main(void) {\n    return a && b ? 1.5e+3 : \"x\\\"y\";\n}";
        let html = highlighted(source);
        let body = html
            .split("</pre><code>")
            .nth(1)
            .and_then(|rest| rest.strip_suffix("</code></div>"))
            .expect("code body");
        assert_eq!(strip_markup(body), source);
    }

    #[test]
    fn classifies_types_keywords_and_functions() {
        let html = highlighted("int x = sum(1, 2); return x;");
        assert!(html.contains("<span class=\"hl_t\">int</span>"));
        assert!(html.contains("<span class=\"hl_k\">return</span>"));
        assert!(html.contains("<span class=\"hl_f\">sum</span>"));
        assert!(html.contains("<span class=\"hl_n\">1</span>"));
    }

    #[test]
    fn function_call_via_one_separator() {
        let html = highlighted("sum (1)");
        assert!(html.contains("<span class=\"hl_f\">sum</span>"));
    }

    #[test]
    fn shebang_is_a_comment() {
        let html = highlighted("#!/bin/sh\necho hi");
        assert!(html.contains("<span class=\"hl_c\">#!/bin/sh</span>"));
    }

    #[test]
    fn comments_and_strings_span_correctly() {
        let html = highlighted("x = 1; // trailing note");
        assert!(html.contains("<span class=\"hl_c\">// trailing note</span>"));
        let html = highlighted("s = \"a \\\" b\";");
        assert!(
            html.contains("<span class=\"hl_s\">&quot;a \\&quot; b&quot;</span>"),
            "{html}"
        );
    }

    #[test]
    fn negative_number_takes_its_sign() {
        let html = highlighted("x = -42;");
        assert!(html.contains("<span class=\"hl_n\">-42</span>"), "{html}");
    }

    #[test]
    fn line_numbers_cover_every_line() {
        let html = highlighted("a\nb\nc");
        assert!(html.starts_with("<div class=\"pre\"><pre class=\"lineno\">1<br>2<br>3<br></pre><code>"));
    }

    #[test]
    fn force_highlight_markers_become_nested_spans() {
        let html = highlighted("a <hl>b</hl> c");
        assert!(html.contains("<span class=\"hl_h\">"), "{html}");
        assert!(!html.contains("&lt;hl&gt;"));
    }
}
