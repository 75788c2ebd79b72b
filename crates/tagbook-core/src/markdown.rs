//! Markdown → tag-vocabulary translator.
//!
//! Embedded Markdown never reaches the markup parser directly; it is first
//! rewritten into the same tag vocabulary hand-written documents use, so the
//! rest of the pipeline has a single input language. The recognizer set is
//! deliberately restricted Markdown: first match wins at each scan position
//! and unmatched bytes pass through literally. Single newlines inside a
//! block are kept verbatim so downstream diagnostics stay line-accurate.

use memchr::memmem;

struct Step {
    consumed: usize,
    block: bool,
}

const LINE_PREFIXES: &[(&[u8], u8, &str, &str)] = &[
    (b">", 2, "<quote>", "</quote>"),
    (b"###### ", 1, "<h6>", "</h6>"),
    (b"##### ", 1, "<h5>", "</h5>"),
    (b"#### ", 1, "<h4>", "</h4>"),
    (b"### ", 1, "<h3>", "</h3>"),
    (b"## ", 1, "<h2>", "</h2>"),
    (b"# ", 1, "<h1>", "</h1>"),
];

// Longest first; the triple backtick entry must stay first because a fenced
// block with a language tag becomes <code lang> instead of <pre>.
const SURROUNDS: &[(&[u8], bool, &str, &str)] = &[
    (b"```", false, "<pre>", "</pre>"),
    (b"``", false, "<tt>", "</tt>"),
    (b"`", false, "<tt>", "</tt>"),
    (b"^^", true, "<sup>", "</sup>"),
    (b",,", true, "<sub>", "</sub>"),
    (b"___", true, "<u><i><b>", "</b></i></u>"),
    (b"***", true, "<i><b>", "</b></i>"),
    (b"~~", true, "<s>", "</s>"),
    (b"__", true, "<u>", "</u>"),
    (b"**", true, "<b>", "</b>"),
    (b"~", true, "<s>", "</s>"),
    (b"_", true, "<u>", "</u>"),
    (b"*", true, "<i>", "</i>"),
];

const ESCAPES: &[(&[u8], &str)] = &[
    (b"\\\\", "\\"),
    (b"\\`", "`"),
    (b"\\*", "*"),
    (b"\\_", "_"),
    (b"\\~", "~"),
    (b"\\^", "^"),
    (b"\\,", ","),
    (b"\\{", "{"),
    (b"\\}", "}"),
    (b"\\[", "["),
    (b"\\]", "]"),
    (b"\\(", "("),
    (b"\\)", ")"),
    (b"\\#", "#"),
    (b"\\+", "+"),
    (b"\\-", "-"),
    (b"\\.", "."),
    (b"\\!", "!"),
];

const ALERT_LABELS: &[(&[u8], &str)] = &[
    (b"INFO:", "info"),
    (b"HINT:", "hint"),
    (b"NOTE:", "note"),
    (b"SEE ALSO:", "also"),
    (b"ALSO:", "also"),
    (b"TODO:", "todo"),
    (b"WARNING:", "warn"),
    (b"WARN:", "warn"),
];

/// Translates a Markdown buffer into tag vocabulary. Carriage returns are
/// stripped up front, matching how include files are normalized.
pub fn translate(source: &str) -> String {
    let bytes: Vec<u8> = source.bytes().filter(|b| *b != b'\r').collect();
    let mut translator = Translator::default();
    translator.parse(&bytes, true);
    match String::from_utf8(translator.out) {
        Ok(out) => out,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

#[derive(Default)]
struct Translator {
    out: Vec<u8>,
    in_table: bool,
    in_row: i8,
    in_cell: usize,
    align: u64,
}

impl Translator {
    fn text(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }

    fn write(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    fn parse(&mut self, s: &[u8], mut newblock: bool) {
        let mut p = 0;
        while p < s.len() {
            if newblock {
                while s[p] == b'\n' {
                    self.out.push(b'\n');
                    p += 1;
                    if p == s.len() {
                        return;
                    }
                }
            }
            let step = self.step(s, p, newblock);
            let block = match &step {
                Some(step) if step.consumed > 0 => {
                    p += step.consumed;
                    step.block
                }
                _ => {
                    self.out.push(s[p]);
                    p += 1;
                    false
                }
            };
            let mut q = p;
            while q < s.len() && s[q] == b'\n' {
                q += 1;
            }
            if q == s.len() {
                return;
            }
            newblock = (s[p] == b'\n' && p + 1 < s.len() && s[p + 1] == b'\n') || block;
        }
    }

    fn step(&mut self, s: &[u8], p: usize, newblock: bool) -> Option<Step> {
        if let Some(step) = self.do_underline(s, p, newblock) {
            return Some(step);
        }
        if let Some(step) = self.do_comment(s, p, newblock) {
            return Some(step);
        }
        if let Some(step) = self.do_lineprefix(s, p, newblock) {
            return Some(step);
        }
        if let Some(step) = self.do_table(s, p) {
            return Some(step);
        }
        if let Some(step) = self.do_list(s, p, newblock) {
            return Some(step);
        }
        if let Some(step) = self.do_surround(s, p) {
            return Some(step);
        }
        if let Some(step) = self.do_paragraph(s, p, newblock) {
            return Some(step);
        }
        if let Some(step) = self.do_gtlt(s, p) {
            return Some(step);
        }
        if let Some(step) = self.do_link(s, p) {
            return Some(step);
        }
        if let Some(step) = self.do_shortlink(s, p) {
            return Some(step);
        }
        if let Some(step) = self.do_html(s, p) {
            return Some(step);
        }
        self.do_replace(s, p)
    }

    /// Setext headings: a text line underlined with `=` (h1) or `-` (h2).
    fn do_underline(&mut self, s: &[u8], p: usize, newblock: bool) -> Option<Step> {
        if !newblock {
            return None;
        }
        let mut len = 0;
        let mut chars = 0;
        while p + len < s.len() && s[p + len] != b'\n' {
            let b = s[p + len];
            if (b as i8) > 0 || b & 0xC0 == 0xC0 {
                chars += 1;
            }
            len += 1;
        }
        if len == 0 {
            return None;
        }
        let next = p + len + 1;
        if next > s.len() {
            return None;
        }
        for (ch, open, close) in [(b'=', "<h1>", "</h1>"), (b'-', "<h2>", "</h2>")] {
            let mut j = 0;
            while next + j < s.len() && s[next + j] == ch {
                j += 1;
            }
            if j >= chars {
                self.text(open);
                self.parse(&s[p..p + len], false);
                self.text(close);
                self.out.push(b'\n');
                return Some(Step { consumed: len + 1 + j, block: true });
            }
        }
        None
    }

    /// HTML comments are consumed without output.
    fn do_comment(&mut self, s: &[u8], p: usize, newblock: bool) -> Option<Step> {
        if !s[p..].starts_with(b"<!--") {
            return None;
        }
        let rel = memmem::find(&s[p..], b"-->")?;
        let end = p + rel + 3;
        if end >= s.len() {
            return None;
        }
        Some(Step { consumed: end - p, block: newblock })
    }

    /// Blockquotes and ATX headings, recognized at line starts.
    fn do_lineprefix(&mut self, s: &[u8], p: usize, newblock: bool) -> Option<Step> {
        let start = if newblock {
            p
        } else if s[p] == b'\n' {
            p + 1
        } else {
            return None;
        };
        for &(search, process, before, after) in LINE_PREFIXES {
            let l = search.len();
            if s.len() - start < l || !s[start..].starts_with(search) {
                continue;
            }
            if s[p] == b'\n' {
                self.out.push(b'\n');
            }
            self.text(before);
            let mut buffer: Vec<u8> = Vec::new();
            let mut q = start;
            while s[q..].starts_with(search) && q + l < s.len() {
                q += l;
                // Blockquotes allow one optional space after the marker.
                if search[0] == b'>' && s[q] == b' ' {
                    q += 1;
                }
                while q < s.len() {
                    let b = s[q];
                    buffer.push(b);
                    q += 1;
                    if b == b'\n' {
                        break;
                    }
                }
            }
            if process > 0 {
                self.parse(&buffer, process >= 2);
            } else {
                self.write(&buffer);
            }
            self.text(after);
            self.out.push(b'\n');
            return Some(Step { consumed: q - p, block: true });
        }
        None
    }

    /// Pipe tables. A `-`/`:`/`*` row right under the header row sets
    /// per-column alignment, two bits per column.
    fn do_table(&mut self, s: &[u8], p: usize) -> Option<Step> {
        const MAX_COLS: usize = 32;
        if s[p] != b'|' {
            return None;
        }
        if self.in_row != 0 && (p + 1 >= s.len() || s[p + 1] == b'\n') {
            self.text(if self.in_row == -1 { "</th></tr>" } else { "</td></tr>" });
            self.in_row = 0;
            if p + 2 >= s.len() || s[p + 2] == b'\n' {
                self.in_table = false;
                self.text("</table>");
            }
            return Some(Step { consumed: 1, block: false });
        }
        if p + 1 < s.len() && matches!(s[p + 1], b'-' | b':' | b'*') {
            let mut q = p;
            while q < s.len() && s[q] != b'\n' {
                q += 1;
            }
            return Some(Step { consumed: q - p, block: false });
        }
        if !self.in_table {
            self.in_table = true;
            self.in_row = -1;
            self.in_cell = 0;
            self.align = 0;
            let mut q = p + 1;
            while q < s.len() && s[q] != b'\n' {
                q += 1;
            }
            while q < s.len() && s[q] == b'\n' {
                q += 1;
            }
            if q + 1 < s.len() && matches!(s[q + 1], b'-' | b':' | b'*') {
                let mut col: i64 = -1;
                while q < s.len() && s[q] != b'\n' {
                    if col < MAX_COLS as i64 {
                        match s[q] {
                            b'|' => col += 1,
                            b':' if col >= 0 => self.align |= 1u64 << (col * 2),
                            b'*' if col >= 0 => {
                                let bits: u64 = if s.get(q + 1) == Some(&b'|') { 3 } else { 2 };
                                self.align |= bits << (col * 2);
                            }
                            _ => {}
                        }
                    }
                    q += 1;
                }
            }
            self.text("<table><tr>");
        }
        if self.in_row == 0 {
            self.in_row = 1;
            self.in_cell = 0;
            self.text("<tr>");
        }
        if self.in_cell > 0 {
            self.text(if self.in_row == -1 { "</th>" } else { "</td>" });
        }
        let a = if self.in_cell < MAX_COLS {
            ((self.align >> (self.in_cell * 2)) & 3) as usize
        } else {
            0
        };
        if self.in_row == -1 {
            self.text(if a > 1 { "<tH>" } else { "<th>" });
        } else {
            self.text(["<td>", "<tn>", "<tD>", "<tN>"][a]);
        }
        self.in_cell += 1;
        let mut q = p + 1;
        while q < s.len() && s[q] == b' ' {
            q += 1;
        }
        Some(Step { consumed: q - p, block: false })
    }

    /// Ordered and unordered lists. Continuation lines must match the
    /// marker's indent; a blank line followed by re-indented content keeps
    /// the item open as block content.
    fn do_list(&mut self, s: &[u8], pos: usize, newblock: bool) -> Option<Step> {
        let mut isblock = 0i32;
        let mut p = if newblock {
            pos
        } else if s[pos] == b'\n' {
            pos + 1
        } else {
            return None;
        };
        let item_start = p;
        let ul;
        let mut marker = 0u8;
        if p < s.len() && matches!(s[p], b'-' | b'*' | b'+') {
            ul = true;
            marker = s[p];
        } else {
            ul = false;
            while p < s.len() && s[p].is_ascii_digit() {
                p += 1;
            }
            if p >= s.len() || s[p] != b'.' {
                return None;
            }
        }
        p += 1;
        if p >= s.len() || !matches!(s[p], b' ' | b'\t') {
            return None;
        }
        p += 1;
        while p < s.len() && matches!(s[p], b' ' | b'\t') {
            p += 1;
        }
        let indent = p - item_start;
        if !newblock || s[pos] == b'\n' {
            self.out.push(b'\n');
        }
        self.text(if ul { "<ul>" } else { "<ol>" });
        let mut run = true;
        let mut buffer: Vec<u8> = Vec::new();
        while p < s.len() && run {
            buffer.clear();
            loop {
                if p >= s.len() || !run {
                    break;
                }
                let mut item_break = false;
                if s[p] == b'\n' {
                    if p + 1 == s.len() {
                        break;
                    }
                    let mut blank = p + 1;
                    while blank < s.len() && matches!(s[blank], b' ' | b'\t') {
                        blank += 1;
                    }
                    if blank < s.len() && s[blank] == b'\n' {
                        buffer.push(b'\n');
                        run = false;
                        isblock += 1;
                        p = blank;
                    }
                    let q = p + 1;
                    let mut j = 0usize;
                    if ul && q < s.len() && s[q] == marker {
                        j = 1;
                    } else if !ul {
                        while q + j < s.len() && s[q + j].is_ascii_digit() && j < indent {
                            j += 1;
                        }
                        if q + j >= s.len() {
                            break;
                        }
                        if j > 0 && s[q + j] == b'.' {
                            j += 1;
                        } else {
                            j = 0;
                        }
                    }
                    if q + indent < s.len() {
                        while q + j < s.len() && matches!(s[q + j], b' ' | b'\t') && j < indent {
                            j += 1;
                        }
                    }
                    if j == indent {
                        buffer.push(b'\n');
                        p += indent;
                        run = true;
                        if q < s.len() && matches!(s[q], b' ' | b'\t') {
                            p += 1;
                        } else {
                            item_break = true;
                        }
                    } else if j < indent {
                        run = false;
                    }
                }
                if item_break {
                    break;
                }
                if p < s.len() {
                    buffer.push(s[p]);
                }
                p += 1;
            }
            self.text("<li>");
            let inner_block = isblock > 1 || (isblock == 1 && run);
            let item = std::mem::take(&mut buffer);
            self.parse(&item, inner_block);
            buffer = item;
            self.text("</li>\n");
            p += 1;
        }
        if self.out.last() == Some(&b'\n') {
            self.out.pop();
        }
        self.text(if ul { "</ul>" } else { "</ol>" });
        let mut end = p.min(s.len());
        if end > pos {
            end -= 1;
        }
        while end > pos {
            end -= 1;
            if s[end] != b'\n' {
                break;
            }
        }
        Some(Step { consumed: end - pos + 1, block: true })
    }

    /// Symmetric inline delimiters, longest first, non-greedy to the
    /// nearest unescaped close. A fenced code block with a language tag on
    /// the opening fence becomes `<code lang>`.
    fn do_surround(&mut self, s: &[u8], pos: usize) -> Option<Step> {
        for (idx, &(search, process, before, after)) in SURROUNDS.iter().enumerate() {
            let l = search.len();
            if s.len() - pos < 2 * l || !s[pos..].starts_with(search) {
                continue;
            }
            let content_start = pos + l;
            let mut from = content_start;
            let mut close = None;
            while let Some(rel) = memmem::find(&s[from..], search) {
                let at = from + rel;
                if at > 0 && s[at - 1] == b'\\' {
                    from = at + 1;
                    continue;
                }
                close = Some(at);
                break;
            }
            let stop = match close {
                Some(at) if at >= content_start => at,
                _ => continue,
            };
            let fenced = idx == 0;
            let mut start = content_start;
            let mut lang: Option<(usize, usize)> = None;
            if fenced && start < stop && s[start] != b' ' && s[start] != b'\n' {
                let lang_start = start;
                while start < stop && s[start] != b'\n' {
                    start += 1;
                }
                lang = Some((lang_start, start));
            }
            if let Some((lang_start, lang_end)) = lang {
                self.text("<code ");
                self.write(&s[lang_start..lang_end]);
                self.text(">");
            } else {
                self.text(before);
            }
            let mut inner_start = start;
            let mut inner_stop = stop;
            if inner_stop > inner_start
                && s[inner_start] == b' '
                && s[inner_stop - 1] == b' '
            {
                inner_start += 1;
                inner_stop -= 1;
            }
            if process {
                self.parse(&s[inner_start..inner_stop], false);
            } else {
                self.write(&s[inner_start..inner_stop]);
            }
            if lang.is_some() {
                self.text("</code>");
            } else {
                self.text(after);
            }
            return Some(Step { consumed: stop + l - pos, block: false });
        }
        None
    }

    /// Paragraphs end at blank-line pairs. A recognized label on the first
    /// line redirects the paragraph into the matching alert box.
    fn do_paragraph(&mut self, s: &[u8], pos: usize, newblock: bool) -> Option<Step> {
        if !newblock {
            return None;
        }
        let end = memmem::find(&s[pos..], b"\n\n")
            .map(|rel| pos + rel)
            .unwrap_or(s.len());
        let mut nl = pos;
        while nl < end && s[nl] != b'\n' {
            nl += 1;
        }
        if end - pos <= 1 {
            return None;
        }
        if nl == end && s[pos] == b'<' && s[end - 1] == b'>' {
            return None;
        }
        let mut start = pos;
        let mut tag = "p";
        for &(label, alert) in ALERT_LABELS {
            if s[pos..].starts_with(label) {
                start = pos + label.len();
                tag = alert;
                break;
            }
        }
        self.text("<");
        self.text(tag);
        self.text(">");
        self.parse(&s[start..end], false);
        self.text("</");
        self.text(tag);
        self.text(">");
        Some(Step { consumed: end - pos, block: true })
    }

    /// Literal `<` and `>` that cannot start or end a real tag.
    fn do_gtlt(&mut self, s: &[u8], p: usize) -> Option<Step> {
        if p + 1 >= s.len() {
            return None;
        }
        let closing = s[p + 1] == b'>';
        if !closing && s[p] != b'<' {
            return None;
        }
        let c = if closing { s[p] } else { s[p + 1] };
        let tag_ish = c.is_ascii_alphabetic() || (b'1'..=b'6').contains(&c);
        if !closing && !tag_ish {
            self.text("&lt;");
            return Some(Step { consumed: 1, block: false });
        }
        if closing && !tag_ish && !matches!(c, b'/' | b'"' | b'\'') {
            self.out.push(c);
            self.text("&gt;");
            return Some(Step { consumed: 2, block: false });
        }
        None
    }

    /// `[text](target)` links and `![alt](target)` images, tolerant of
    /// nested brackets and parentheses.
    fn do_link(&mut self, s: &[u8], pos: usize) -> Option<Step> {
        let img = if s[pos..].starts_with(b"![") {
            true
        } else if s[pos] == b'[' {
            false
        } else {
            return None;
        };
        let desc_start = pos + 1 + img as usize;
        let mut p = desc_start;
        while p < s.len() && s[p] != b'\n' && s[p] != b']' {
            p += 1;
        }
        if p >= s.len() || s.get(p + 1) != Some(&b'(') {
            return None;
        }
        // Every nested image inside the description pushes the closing
        // bracket one "](" further out.
        let mut nested_from = desc_start;
        loop {
            let nested = memmem::find(&s[nested_from..], b"![").map(|rel| nested_from + rel);
            match nested {
                Some(at) if at < p => {
                    p = memmem::find(&s[p + 1..], b"](").map(|rel| p + 1 + rel)?;
                    nested_from = at + 1;
                }
                _ => break,
            }
        }
        let desc_end = p;
        let link_start = p + 2;
        let mut depth = 1i32;
        let mut q = link_start;
        while depth > 0 {
            while q < s.len() && s[q] != b'(' && s[q] != b')' {
                q += 1;
            }
            if q >= s.len() {
                return None;
            }
            if s[q] == b'(' {
                depth += 1;
            } else {
                depth -= 1;
            }
            if depth > 0 {
                q += 1;
            }
        }
        let mut link = link_start;
        let mut link_end = q;
        if link < link_end && s[link] == b'<' && s[link_end - 1] == b'>' {
            link += 1;
            link_end -= 1;
        }
        if img {
            let block_image = pos > 0 && s[pos - 1] == b'\n';
            self.text(if block_image { "<imgw " } else { "<imgt " });
            self.write(&s[link..link_end]);
            self.text(">");
            if desc_end > desc_start {
                self.text("<fig>");
                self.write(&s[desc_start..desc_end]);
                self.text("</fig>");
            }
        } else {
            self.text("<a ");
            self.write(&s[link..link_end]);
            self.text(">");
            self.parse(&s[desc_start..desc_end], false);
            self.text("</a>");
        }
        Some(Step { consumed: q + 1 - pos, block: false })
    }

    /// `[text]` with no target becomes an internal-link placeholder.
    fn do_shortlink(&mut self, s: &[u8], pos: usize) -> Option<Step> {
        if s[pos] != b'[' {
            return None;
        }
        let mut p = pos + 1;
        while p < s.len() && !matches!(s[p], b'\\' | b'\n' | b']') {
            p += 1;
        }
        if p < s.len() && s[p] == b']' {
            self.text("<a>");
            self.write(&s[pos + 1..p]);
            self.text("</a>");
            return Some(Step { consumed: p - pos + 1, block: false });
        }
        None
    }

    /// Balanced foreign HTML passes through with its content re-parsed;
    /// an unpaired tag is copied verbatim.
    fn do_html(&mut self, s: &[u8], pos: usize) -> Option<Step> {
        if pos + 2 >= s.len() {
            return None;
        }
        if s[pos] != b'<' || !s[pos + 1].is_ascii_alphabetic() {
            return None;
        }
        let name_start = pos + 1;
        let mut p = name_start;
        while p < s.len() && s[p] != b' ' && s[p] != b'>' {
            p += 1;
        }
        let name = &s[name_start..p];
        let mut from = p;
        while let Some(rel) = memmem::find(&s[from..], b"</") {
            let at = from + rel;
            let close_name = at + 2;
            if s[close_name..].starts_with(name) && s.get(close_name + name.len()) == Some(&b'>') {
                self.parse(&s[pos..at], false);
                self.write(&s[at..at + name.len() + 3]);
                return Some(Step { consumed: at + name.len() + 3 - pos, block: false });
            }
            from = at + 2;
        }
        let mut q = p;
        while q < s.len() && s[q] != b'>' {
            q += 1;
        }
        if q < s.len() {
            self.write(&s[pos..q + 1]);
            return Some(Step { consumed: q + 1 - pos, block: false });
        }
        None
    }

    /// Hard breaks and backslash escapes.
    fn do_replace(&mut self, s: &[u8], pos: usize) -> Option<Step> {
        if s[pos..].starts_with(b"  \n") {
            self.text("<br>\n");
        }
        for &(from, to) in ESCAPES {
            if s.len() - pos < from.len() {
                continue;
            }
            if s[pos..].starts_with(from) {
                self.text(to);
                return Some(Step { consumed: from.len(), block: false });
            }
        }
        None
    }
}
