//! Single-pass parser for the tag vocabulary.
//!
//! Each input file is scanned left to right exactly once. Recognized tags
//! either emit their HTML spelling (consulting the [`TagValidator`] on every
//! open/close), recurse into a verbatim body (`<tt>`, `<pre>`, `<code>`,
//! `<kbd>`, `<fig>`), or trigger a directive: metadata, include, image or
//! API-doc extraction. Unrecognized tags are copied through with a warning.
//! Headings drive the table of contents, the per-page containers and the
//! forward-reference resolver.

use std::io;
use std::path::{Path, PathBuf};

use memchr::memmem;

use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, E_HEADING_DUP, E_HEADING_EMPTY, E_INCLUDE_CYCLE, E_RESOURCE,
    E_TOC_MISSING, W_LANG_UNKNOWN, W_TAG_UNKNOWN,
};
use crate::highlight::{self, RuleSet};
use crate::markdown;
use crate::resolver::{LinkResolver, Output};
use crate::slug::safe_id;
use crate::strings::Strings;
use crate::toc::TocEntry;
use crate::validator::{TagKind, TagValidator};

/// An image ready for embedding: probed dimensions plus a `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub src: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageError {
    Unreadable,
    Unsupported,
}

/// What the core needs from the outside world: relative-path resolution,
/// include-file reading, and image probing. The CLI wires this to the real
/// filesystem; tests use in-memory stubs.
pub trait DocSource {
    fn resolve(&self, dir: &Path, target: &str) -> PathBuf {
        dir.join(target)
    }

    fn read_text(&self, path: &Path) -> io::Result<String>;

    fn image(&self, path: &Path) -> Result<EmbeddedImage, ImageError>;
}

/// Everything one run produces, handed to the templating stage. Output is
/// always best-effort complete; `diagnostics` decides the exit status.
pub struct GenerateResult {
    pub body: String,
    pub toc: Vec<TocEntry>,
    pub strings: Strings,
    pub title_image: Option<PathBuf>,
    pub theme: Option<PathBuf>,
    pub landing: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerateResult {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// Runs the whole pipeline over the given inputs in order, sharing one
/// output buffer and one table of contents across all of them.
pub fn generate(inputs: &[PathBuf], source: &dyn DocSource, rules: &RuleSet) -> GenerateResult {
    let mut parser = Parser::new(source, rules);
    for input in inputs {
        parser.include_file(input.clone());
    }
    parser.finish()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PageAnchor {
    None,
    Landing,
    Entry(usize),
}

// Tags that map to a fixed spelling plus a validator event. Self-closing
// line break and horizontal rule carry no event.
const SIMPLE_TAGS: &[(&[u8], &str, Option<(TagKind, bool)>)] = &[
    (b"<b>", "<b>", Some((TagKind::B, true))),
    (b"</b>", "</b>", Some((TagKind::B, false))),
    (b"<i>", "<i>", Some((TagKind::I, true))),
    (b"</i>", "</i>", Some((TagKind::I, false))),
    (b"<u>", "<u>", Some((TagKind::U, true))),
    (b"</u>", "</u>", Some((TagKind::U, false))),
    (b"<s>", "<s>", Some((TagKind::S, true))),
    (b"</s>", "</s>", Some((TagKind::S, false))),
    (b"<sup>", "<sup>", Some((TagKind::Sup, true))),
    (b"</sup>", "</sup>", Some((TagKind::Sup, false))),
    (b"<sub>", "<sub>", Some((TagKind::Sub, true))),
    (b"</sub>", "</sub>", Some((TagKind::Sub, false))),
    (
        b"<quote>",
        "<blockquote class=\"pre\"><span></span>",
        Some((TagKind::Quote, true)),
    ),
    (b"</quote>", "</blockquote>", Some((TagKind::Quote, false))),
    (b"<p>", "<p>", Some((TagKind::P, true))),
    (b"</p>", "</p>", Some((TagKind::P, false))),
    (b"<br>", "<br>", None),
    (b"<hr>", "<hr>", None),
    (b"<ol>", "<ol>", Some((TagKind::Ol, true))),
    (b"</ol>", "</ol>", Some((TagKind::Ol, false))),
    (b"<ul>", "<ul>", Some((TagKind::Ul, true))),
    (b"</ul>", "</ul>", Some((TagKind::Ul, false))),
    (b"<li>", "<li>", Some((TagKind::Li, true))),
    (b"</li>", "</li>", Some((TagKind::Li, false))),
    (b"<dl>", "<dl>", Some((TagKind::Dl, true))),
    (b"</dl>", "</dl>", Some((TagKind::Dl, false))),
    (b"<dt>", "<dt>", Some((TagKind::Dt, true))),
    (b"</dt>", "</dt>", Some((TagKind::Dt, false))),
    (b"<dd>", "<dd>", Some((TagKind::Dd, true))),
    (b"</dd>", "</dd>", Some((TagKind::Dd, false))),
    (b"<grid>", "<table class=\"grid\">", Some((TagKind::Grid, true))),
    (b"</grid>", "</table>", Some((TagKind::Grid, false))),
    (b"<gr>", "<tr>", Some((TagKind::Gr, true))),
    (b"</gr>", "</tr>", Some((TagKind::Gr, false))),
    (b"<gd>", "<td>", Some((TagKind::Gd, true))),
    (b"<gD>", "<td class=\"wide\">", Some((TagKind::Gd, true))),
    (b"</gd>", "</td>", Some((TagKind::Gd, false))),
    (
        b"<table>",
        "<div class=\"table\"><table>",
        Some((TagKind::Table, true)),
    ),
    (b"</table>", "</table></div>", Some((TagKind::Table, false))),
    (b"<tr>", "<tr>", Some((TagKind::Tr, true))),
    (b"</tr>", "</tr>", Some((TagKind::Tr, false))),
    (b"<th>", "<th>", Some((TagKind::Th, true))),
    (b"<tH>", "<th class=\"wide\">", Some((TagKind::Th, true))),
    (b"</th>", "</th>", Some((TagKind::Th, false))),
    (b"<td>", "<td>", Some((TagKind::Td, true))),
    (b"<tD>", "<td class=\"wide\">", Some((TagKind::Td, true))),
    (b"</td>", "</td>", Some((TagKind::Td, false))),
    (b"<tn>", "<td class=\"right\">", Some((TagKind::Td, true))),
    (b"<tN>", "<td class=\"right wide\">", Some((TagKind::Td, true))),
    (b"</tn>", "</td>", Some((TagKind::Td, false))),
];

struct Parser<'a> {
    source: &'a dyn DocSource,
    rules: &'a RuleSet,
    out: Output,
    resolver: LinkResolver,
    validator: TagValidator,
    toc: Vec<TocEntry>,
    strings: Strings,
    title_image: Option<PathBuf>,
    theme: Option<PathBuf>,
    diagnostics: Vec<Diagnostic>,
    file: String,
    dir: PathBuf,
    line: u32,
    include_stack: Vec<PathBuf>,
    first: PageAnchor,
    last: PageAnchor,
    prev: PageAnchor,
    landing: bool,
    seen_landing: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a dyn DocSource, rules: &'a RuleSet) -> Self {
        Self {
            source,
            rules,
            out: Output::new(),
            resolver: LinkResolver::new(),
            validator: TagValidator::new(),
            toc: Vec::new(),
            strings: Strings::default(),
            title_image: None,
            theme: None,
            diagnostics: Vec::new(),
            file: String::new(),
            dir: PathBuf::new(),
            line: 0,
            include_stack: Vec::new(),
            first: PageAnchor::None,
            last: PageAnchor::None,
            prev: PageAnchor::None,
            landing: false,
            seen_landing: false,
        }
    }

    fn error(&mut self, code: &'static str, message: String) {
        self.diagnostics.push(Diagnostic::new(
            self.file.clone(),
            self.line,
            DiagnosticSeverity::Error,
            code,
            message,
        ));
    }

    fn warning(&mut self, code: &'static str, message: String) {
        self.diagnostics.push(Diagnostic::new(
            self.file.clone(),
            self.line,
            DiagnosticSeverity::Warning,
            code,
            message,
        ));
    }

    fn count_lines(&mut self, bytes: &[u8]) {
        self.line += bytes.iter().filter(|b| **b == b'\n').count() as u32;
    }

    /// Locates `close` from `from` on, counting the lines skipped over.
    /// A missing close tag swallows the rest of the buffer.
    fn find_tag_close(&mut self, buf: &[u8], from: usize, close: &[u8]) -> usize {
        let from = from.min(buf.len());
        let end = memmem::find(&buf[from..], close)
            .map(|rel| from + rel)
            .unwrap_or(buf.len());
        self.count_lines(&buf[from..end]);
        end
    }

    fn find_byte(&mut self, buf: &[u8], from: usize, byte: u8) -> usize {
        let from = from.min(buf.len());
        let end = memchr::memchr(byte, &buf[from..])
            .map(|rel| from + rel)
            .unwrap_or(buf.len());
        self.count_lines(&buf[from..end]);
        end
    }

    /// Parses one file: reads it, routes Markdown through the translator,
    /// switches the path context, scans, and restores the context.
    fn include_file(&mut self, path: PathBuf) {
        if self.include_stack.contains(&path) {
            self.error(
                E_INCLUDE_CYCLE,
                format!("include cycle: '{}'", path.display()),
            );
            return;
        }
        let content = match self.source.read_text(&path) {
            Ok(content) => content,
            Err(_) => {
                self.diagnostics.push(Diagnostic::new(
                    path.display().to_string(),
                    0,
                    DiagnosticSeverity::Error,
                    E_RESOURCE,
                    "unable to read",
                ));
                return;
            }
        };
        let is_markdown = path.extension().and_then(|ext| ext.to_str()) == Some("md");
        let content = if is_markdown {
            markdown::translate(&content)
        } else {
            content
        };
        let saved_file = std::mem::replace(&mut self.file, path.display().to_string());
        let saved_dir = std::mem::replace(
            &mut self.dir,
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        );
        let saved_line = std::mem::replace(&mut self.line, 1);
        self.include_stack.push(path);
        self.scan(content.as_bytes());
        self.include_stack.pop();
        self.file = saved_file;
        self.dir = saved_dir;
        self.line = saved_line;
    }

    fn include_directive(&mut self, target: &str) {
        let path = self.source.resolve(&self.dir, target);
        self.include_file(path);
    }

    fn finish(mut self) -> GenerateResult {
        if self.toc.is_empty() {
            self.diagnostics.push(Diagnostic::new(
                String::new(),
                0,
                DiagnosticSeverity::Error,
                E_TOC_MISSING,
                "no table of contents detected",
            ));
        }
        self.resolver.finish(&mut self.diagnostics);
        if !self.out.is_empty() {
            self.out.trim_end();
            self.prev_link();
            self.out.text("</div>");
        }
        let rendered = self.out.render(&self.resolver);
        let body = rendered.trim_start_matches([' ', '\r', '\n']).to_string();
        GenerateResult {
            body,
            toc: self.toc,
            strings: self.strings,
            title_image: self.title_image,
            theme: self.theme,
            landing: self.seen_landing,
            diagnostics: self.diagnostics,
        }
    }

    fn scan(&mut self, buf: &[u8]) {
        let mut s = 0;
        while s < buf.len() {
            if buf[s..].starts_with(b"<!--") {
                s += 4;
                while s < buf.len() && !buf[s..].starts_with(b"-->") {
                    if buf[s] == b'\n' {
                        self.line += 1;
                    }
                    s += 1;
                }
                if s < buf.len() {
                    s += 3;
                }
                continue;
            }
            if buf[s] == b'\n' {
                self.line += 1;
            }
            if buf[s] != b'<' {
                match buf[s] {
                    b' ' | b'\t' => {
                        if s == 0 || !matches!(buf[s - 1], b' ' | b'\t' | b'\n') {
                            self.out.text(" ");
                        }
                        s += 1;
                    }
                    b'\r' => s += 1,
                    b'\n' => {
                        if !self.out.ends_with('\n') {
                            self.out.push('\n');
                        }
                        s += 1;
                    }
                    _ => {
                        let start = s;
                        while s < buf.len()
                            && !matches!(buf[s], b' ' | b'\t' | b'\r' | b'\n' | b'<')
                        {
                            s += 1;
                        }
                        self.out.text(&String::from_utf8_lossy(&buf[start..s]));
                    }
                }
                continue;
            }

            let rest = &buf[s..];

            if rest.starts_with(b"<doc>") {
                let start = s + 5;
                let end = self.find_tag_close(buf, start, b"</doc>");
                let content = buf[start..end].to_vec();
                self.parse_doc(&content);
                s = (end + 6).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<hello>") {
                s += 7;
                self.landing = true;
                self.seen_landing = true;
                self.first = PageAnchor::Landing;
                self.last = PageAnchor::Landing;
                continue;
            }
            if rest.starts_with(b"</hello>") {
                s += 8;
                self.landing = false;
                continue;
            }

            if rest.len() > 2 && rest[1] == b'h' && (b'1'..=b'6').contains(&rest[2]) {
                let start = s + 1;
                let end = self.find_tag_close(buf, start, b"</h");
                let content = buf[start..end].to_vec();
                self.heading(&content);
                s = (end + 5).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<cap>") {
                let start = s + 5;
                let end = self.find_tag_close(buf, start, b"</cap>");
                self.toc
                    .push(TocEntry::caption(String::from_utf8_lossy(&buf[start..end])));
                s = (end + 6).min(buf.len());
                continue;
            }

            if let Some((tag, html, event)) = SIMPLE_TAGS
                .iter()
                .find(|(tag, _, _)| rest.starts_with(tag))
            {
                self.out.text(html);
                if let Some((kind, open)) = event {
                    if *open {
                        self.validator
                            .open(*kind, &self.file, self.line, &mut self.diagnostics);
                    } else {
                        self.validator
                            .close(*kind, &self.file, self.line, &mut self.diagnostics);
                    }
                }
                s += tag.len();
                continue;
            }

            if rest.starts_with(b"<a>") {
                let start = s + 3;
                let end = self.find_tag_close(buf, start, b"</a>");
                let name = String::from_utf8_lossy(&buf[start..end]).into_owned();
                self.resolver.internal_link(
                    &mut self.out,
                    &self.toc,
                    &name,
                    &self.file,
                    self.line,
                );
                s = (end + 4).min(buf.len());
                continue;
            }
            if rest.starts_with(b"<a ") {
                self.validator
                    .open(TagKind::A, &self.file, self.line, &mut self.diagnostics);
                let mut p = s + 3;
                while p < buf.len() && buf[p] == b' ' {
                    p += 1;
                }
                let end = self.find_byte(buf, p, b'>');
                let url = String::from_utf8_lossy(&buf[p..end]).into_owned();
                // A '#' target is an internal anchor, taken on faith.
                if let Some(anchor) = url.strip_prefix('#') {
                    self.out
                        .text(&format!("<a href=\"{url}\" onclick=\"c('{anchor}')\">"));
                } else {
                    self.out.text(&format!("<a href=\"{url}\" target=\"new\">"));
                }
                s = (end + 1).min(buf.len());
                continue;
            }
            if rest.starts_with(b"</a>") {
                self.out.text("</a>");
                self.validator
                    .close(TagKind::A, &self.file, self.line, &mut self.diagnostics);
                s += 4;
                continue;
            }

            if rest.starts_with(b"<tt>") {
                let start = s + 4;
                let end = self.find_tag_close(buf, start, b"</tt>");
                if let Some(escaped) =
                    html_escape_trim(&String::from_utf8_lossy(&buf[start..end]))
                {
                    self.out.text(&format!("<samp>{escaped}</samp>"));
                }
                s = (end + 5).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<pre>") {
                let start = s + 5;
                let end = self.find_tag_close(buf, start, b"</pre>");
                self.out.text("<div class=\"pre\"><pre>");
                if let Some(formatted) = preformat(&buf[start..end]) {
                    self.out.text(&formatted);
                }
                self.out.text("</pre></div>");
                s = (end + 6).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<code") {
                let mut p = s + 5;
                let mut lang = None;
                if buf.get(p) == Some(&b' ') {
                    p += 1;
                    let lang_start = p;
                    while p < buf.len() && buf[p] != b'>' {
                        p += 1;
                    }
                    lang = Some(String::from_utf8_lossy(&buf[lang_start..p]).into_owned());
                    if p < buf.len() {
                        p += 1;
                    }
                } else {
                    p += 1;
                }
                let end = self.find_tag_close(buf, p, b"</code>");
                let code = String::from_utf8_lossy(&buf[p.min(end)..end]).into_owned();
                self.source_code(&code, lang.as_deref());
                s = (end + 7).min(buf.len());
                continue;
            }

            if rest.len() > 4 && rest.starts_with(b"<ui") && (b'1'..=b'6').contains(&rest[3]) && rest[4] == b'>' {
                self.out
                    .text(&format!("<span class=\"ui{}\">", rest[3] as char));
                self.validator
                    .open(TagKind::Ui, &self.file, self.line, &mut self.diagnostics);
                s += 5;
                continue;
            }
            if rest.len() > 5
                && rest.starts_with(b"</ui")
                && (b'1'..=b'6').contains(&rest[4])
                && rest[5] == b'>'
            {
                self.out.text("</span>");
                self.validator
                    .close(TagKind::Ui, &self.file, self.line, &mut self.diagnostics);
                s += 6;
                continue;
            }

            if rest.starts_with(b"<kbd>") {
                let start = s + 5;
                let end = self.find_tag_close(buf, start, b"</kbd>");
                if let Some(escaped) =
                    html_escape_trim(&String::from_utf8_lossy(&buf[start..end]))
                {
                    self.out.text(&format!("<kbd>{escaped}</kbd>"));
                }
                s = (end + 6).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<mbl>") {
                self.out.text("<span class=\"mouseleft\"></span>");
                s += 5;
                continue;
            }
            if rest.starts_with(b"<mbr>") {
                self.out.text("<span class=\"mouseright\"></span>");
                s += 5;
                continue;
            }
            if rest.starts_with(b"<mbw>") {
                self.out.text("<span class=\"mousewheel\"></span>");
                s += 5;
                continue;
            }

            // Our image directives <imgt> <imgl> <imgr> <imgc> <imgw>; plain
            // HTML <img ...> falls through to the foreign-tag path.
            if rest.starts_with(b"<img") && !matches!(rest.get(4), None | Some(&b' ') | Some(&b'/') | Some(&b'>')) {
                let align = rest[4];
                let start = s + 6;
                let end = self.find_byte(buf, start.min(buf.len()), b'>');
                let target = String::from_utf8_lossy(&buf[start.min(end)..end]).into_owned();
                self.image(align, &target);
                s = (end + 1).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<fig>") {
                let start = s + 5;
                let end = self.find_tag_close(buf, start, b"</fig>");
                if end > start {
                    self.out.text(&format!(
                        "<span class=\"fig\">{}</span>",
                        String::from_utf8_lossy(&buf[start..end])
                    ));
                }
                s = (end + 6).min(buf.len());
                continue;
            }

            if let Some(kind) = alert_open(rest) {
                let css = match kind {
                    b'h' => "hint",
                    b't' | b'w' => "warn",
                    _ => "info",
                };
                let caption = match kind {
                    b'i' => &self.strings.info,
                    b'h' => &self.strings.hint,
                    b'n' => &self.strings.note,
                    b'a' => &self.strings.also,
                    b't' => &self.strings.todo,
                    _ => &self.strings.warn,
                }
                .clone();
                self.out
                    .text(&format!("<div class=\"{css}\"><p><span>{caption}</span></p><p>"));
                self.validator
                    .open(TagKind::Alert, &self.file, self.line, &mut self.diagnostics);
                s += 6;
                continue;
            }
            if alert_close(rest) {
                self.out.text("</p></div>");
                self.validator
                    .close(TagKind::Alert, &self.file, self.line, &mut self.diagnostics);
                s += 7;
                continue;
            }

            if rest.starts_with(b"<include ") {
                let start = s + 9;
                let end = self.find_byte(buf, start, b'>');
                let target = String::from_utf8_lossy(&buf[start..end]).into_owned();
                self.include_directive(&target);
                s = (end + 1).min(buf.len());
                continue;
            }

            if rest.starts_with(b"<api ") {
                let word_start = s + 5;
                let mut p = word_start;
                while p < buf.len() && buf[p] != b' ' && buf[p] != b'>' {
                    p += 1;
                }
                let (lang, path_start) = if p < buf.len() && buf[p] == b' ' {
                    (
                        Some(String::from_utf8_lossy(&buf[word_start..p]).into_owned()),
                        p + 1,
                    )
                } else {
                    (None, word_start)
                };
                let end = self.find_byte(buf, path_start, b'>');
                let target = String::from_utf8_lossy(&buf[path_start..end]).into_owned();
                self.api_doc(lang.as_deref(), &target);
                s = (end + 1).min(buf.len());
                continue;
            }

            // Anything else is a foreign tag: copied through untouched.
            let tag_start = s;
            s += 1;
            while s < buf.len() && buf[s] != b'<' && buf[s - 1] != b'>' {
                if buf[s] == b'\n' {
                    self.line += 1;
                }
                s += 1;
            }
            self.out
                .text(&String::from_utf8_lossy(&buf[tag_start..s]));
            let first_line = buf[tag_start..s]
                .split(|b| *b == b'\n')
                .next()
                .unwrap_or(&[]);
            self.warning(
                W_TAG_UNKNOWN,
                format!("unknown tag '{}'", String::from_utf8_lossy(first_line)),
            );
        }
    }

    /// `<doc>` metadata: document identity plus per-string overrides for
    /// the built-in UI vocabulary.
    fn parse_doc(&mut self, content: &[u8]) {
        let mut s = 0;
        while s < content.len() {
            while s < content.len() && content[s] != b'<' {
                s += 1;
            }
            if s >= content.len() {
                break;
            }
            s += 1;
            let mut d = s;
            while d < content.len() && content[d] != b'<' {
                d += 1;
            }
            let sub = &content[s..d];
            let value = |prefix: &[u8]| String::from_utf8_lossy(&sub[prefix.len()..]).into_owned();
            if sub.starts_with(b"lang>") {
                self.strings.lang = value(b"lang>");
            } else if sub.starts_with(b"titleimg>") {
                let raw = value(b"titleimg>");
                let (path, alt) = match raw.split_once(' ') {
                    Some((path, alt)) => (path.to_string(), alt.to_string()),
                    None => (raw, String::new()),
                };
                self.title_image = Some(self.source.resolve(&self.dir, &path));
                self.strings.titleimg_alt = alt;
            } else if sub.starts_with(b"title>") {
                self.strings.title = value(b"title>");
            } else if sub.starts_with(b"url>") {
                self.strings.url = value(b"url>");
            } else if sub.starts_with(b"version>") {
                self.strings.version = value(b"version>");
            } else if sub.starts_with(b"theme>") {
                let raw = value(b"theme>");
                self.theme = Some(self.source.resolve(&self.dir, &raw));
            } else if sub.starts_with(b"rslt>") {
                self.strings.search_results = value(b"rslt>");
            } else if sub.starts_with(b"home>") {
                self.strings.home = value(b"home>");
            } else if sub.starts_with(b"link>") {
                self.strings.permalink = value(b"link>");
            } else if sub.starts_with(b"info>") {
                self.strings.info = value(b"info>");
            } else if sub.starts_with(b"hint>") {
                self.strings.hint = value(b"hint>");
            } else if sub.starts_with(b"note>") {
                self.strings.note = value(b"note>");
            } else if sub.starts_with(b"also>") {
                self.strings.also = value(b"also>");
            } else if sub.starts_with(b"todo>") {
                self.strings.todo = value(b"todo>");
            } else if sub.starts_with(b"warn>") {
                self.strings.warn = value(b"warn>");
            } else if sub.starts_with(b"args>") {
                self.strings.args = value(b"args>");
            } else if sub.starts_with(b"rval>") {
                self.strings.rval = value(b"rval>");
            } else if sub.starts_with(b"prev>") {
                self.strings.prev = value(b"prev>");
            } else if sub.starts_with(b"next>") {
                self.strings.next = value(b"next>");
            } else if sub.starts_with(b"copy>") {
                self.strings.copyright = value(b"copy>");
            }
            s = d + 1;
        }
    }

    /// Headings: id/alias words, TOC bookkeeping, page containers and
    /// forward-reference resolution. `content` starts at the `h` of the
    /// opening tag.
    fn heading(&mut self, content: &[u8]) {
        let level = content[1];
        self.validator
            .finish(&self.file, self.line, &mut self.diagnostics);
        let mut idx = 2;
        let mut id: Option<String> = None;
        let mut alias: Option<String> = None;
        if content.get(idx) == Some(&b' ') {
            idx += 1;
            let first = idx;
            while idx < content.len() && content[idx] != b' ' && content[idx] != b'>' {
                idx += 1;
            }
            if content.get(idx) == Some(&b' ') {
                alias = Some(String::from_utf8_lossy(&content[first..idx]).into_owned());
                idx += 1;
                let second = idx;
                while idx < content.len() && content[idx] != b'>' {
                    idx += 1;
                }
                id = Some(String::from_utf8_lossy(&content[second..idx]).into_owned());
            } else {
                id = Some(String::from_utf8_lossy(&content[first..idx]).into_owned());
            }
            if content.get(idx) == Some(&b'>') {
                idx += 1;
            }
        } else {
            idx += 1;
        }
        if idx >= content.len() && self.first != PageAnchor::Landing {
            self.error(E_HEADING_EMPTY, "empty heading name".to_string());
            return;
        }
        let title = String::from_utf8_lossy(&content[idx.min(content.len())..]).into_owned();

        if self.landing {
            if level == b'1' {
                self.out.text("<div class=\"page\" rel=\"_\">");
            }
            self.out.text(&format!(
                "\n<h{}>{}</h{}>",
                level as char, title, level as char
            ));
            return;
        }

        let mut slug = safe_id(id.as_deref().unwrap_or(&title)).unwrap_or_default();
        if slug.is_empty() {
            self.error(E_HEADING_EMPTY, format!("no id for heading ({title})"));
            return;
        }
        if self
            .toc
            .iter()
            .any(|entry| !entry.slug.is_empty() && entry.slug == slug)
        {
            self.error(
                E_HEADING_DUP,
                format!("id for heading isn't unique ({slug})"),
            );
            slug.clear();
        }
        if !slug.is_empty() {
            self.resolver.resolve(&title, &slug);
        }
        self.out.trim_end();

        let entry_index = self.toc.len();
        self.toc.push(TocEntry {
            slug: slug.clone(),
            level: level - b'0',
            raw_title: title.clone(),
            escaped_title: html_escape_trim(&title).unwrap_or_default(),
        });

        if level == b'1' {
            if entry_index > 0 {
                self.prev_link();
                self.next_link(entry_index);
            }
            self.prev = self.last;
            self.last = PageAnchor::Entry(entry_index);
            if self.first == PageAnchor::None {
                self.first = PageAnchor::Entry(entry_index);
            }
            self.out.text("<div class=\"page\"");
            if !slug.is_empty() {
                self.out.text(&format!(" rel=\"{slug}\""));
            }
            self.out
                .text("><div><ul class=\"breadcrumbs\"><li><label class=\"home\" for=\"_");
            if let PageAnchor::Entry(first) = self.first {
                let home_slug = self.toc[first].slug.clone();
                self.out.text(&home_slug);
            }
            self.out.text(&format!(
                "\" title=\"{}\"></label>&nbsp;»</li><li>&nbsp;{}</li></ul><hr></div>",
                self.strings.home, title
            ));
        }
        self.out.text("\n");
        if let Some(alias_slug) = alias.as_deref().and_then(safe_id) {
            self.out.text(&format!("<span id=\"{alias_slug}\"></span>"));
        }
        self.out.text(&format!("<h{}", level as char));
        if !slug.is_empty() {
            self.out.text(&format!(" id=\"{slug}\""));
        }
        self.out.text(&format!(">{title}"));
        if !slug.is_empty() {
            self.out.text(&format!("<a href=\"#{slug}\"></a>"));
        }
        self.out.text(&format!("</h{}>", level as char));
    }

    /// Closes the open page: the navigation footer pointing back to the
    /// previous level-1 heading. Also where leftover open tags get swept.
    fn prev_link(&mut self) {
        self.validator
            .finish(&self.file, self.line, &mut self.diagnostics);
        match self.prev {
            PageAnchor::None => {}
            PageAnchor::Landing => {
                self.out.text(&format!(
                    "<br style=\"clear:both;\"><label class=\"btn prev\" accesskey=\"p\" for=\"_\">{}</label>",
                    self.strings.prev
                ));
            }
            PageAnchor::Entry(index) => {
                let entry = &self.toc[index];
                self.out.text(&format!(
                    "<br style=\"clear:both;\"><label class=\"btn prev\" accesskey=\"p\" for=\"_{}\" title=\"{}\">{}</label>",
                    entry.slug, entry.escaped_title, self.strings.prev
                ));
            }
        }
    }

    fn next_link(&mut self, index: usize) {
        self.validator
            .finish(&self.file, self.line, &mut self.diagnostics);
        let entry = &self.toc[index];
        if !entry.slug.is_empty() {
            if self.prev == PageAnchor::None {
                self.out.text("<br style=\"clear:both;\">");
            }
            self.out.text(&format!(
                "<label class=\"btn next\" accesskey=\"n\" for=\"_{}\" title=\"{}\">{}</label>",
                entry.slug, entry.escaped_title, self.strings.next
            ));
        }
        self.out.text("</div>\n");
    }

    fn source_code(&mut self, code: &str, lang: Option<&str>) {
        let rule_set = self.rules;
        let rules = match lang {
            Some(name) if !name.is_empty() => match rule_set.lookup(name) {
                Some(rules) => rules,
                None => {
                    self.warning(
                        W_LANG_UNKNOWN,
                        format!("no highlight rules for '{name}' using generics"),
                    );
                    RuleSet::generic()
                }
            },
            _ => RuleSet::generic(),
        };
        let mut html = String::new();
        highlight::render_code(&mut html, code, rules);
        self.out.text(&html);
    }

    /// Image directive: probes the file through the collaborator and embeds
    /// it as a data URI. Inline images are scaled to the 22px text height.
    fn image(&mut self, align: u8, target: &str) {
        let target = target
            .strip_prefix(self.strings.url.as_str())
            .unwrap_or(target);
        let path = self.source.resolve(&self.dir, target);
        let image = match self.source.image(&path) {
            Ok(image) => image,
            Err(ImageError::Unreadable) => {
                self.error(E_RESOURCE, format!("unable to read image '{}'", path.display()));
                return;
            }
            Err(ImageError::Unsupported) => {
                self.error(
                    E_RESOURCE,
                    format!("unknown file format or oversized image '{}'", path.display()),
                );
                return;
            }
        };
        let align = if matches!(align, b'l' | b'r' | b'c' | b'w') {
            align
        } else {
            b't'
        };
        if align == b'c' {
            self.out.text("<div class=\"imgc\">");
        }
        self.out.text(&format!("<img class=\"img{}\"", align as char));
        let (mut width, mut height) = (image.width, image.height);
        if align == b't' && height > 22 {
            width = 22 * width / height;
            height = 22;
        }
        if align != b'w' {
            self.out
                .text(&format!(" width=\"{width}\" height=\"{height}\""));
        }
        let name = target.rsplit('/').next().unwrap_or(target);
        let alt = html_escape_trim(name).unwrap_or_default();
        self.out.text(&format!(" alt=\"{alt}\" src=\"{}\">", image.src));
        if align == b'c' {
            self.out.text("</div>");
        }
    }

    /// API-doc extraction: `/**`-delimited comment blocks immediately above
    /// a source line become definition-list entries, with `@param` and
    /// `@return` annotations tabulated and the signature highlighted.
    fn api_doc(&mut self, lang: Option<&str>, target: &str) {
        if target.is_empty() {
            return;
        }
        let path = self.source.resolve(&self.dir, target);
        let text = match self.source.read_text(&path) {
            Ok(text) => text,
            Err(_) => {
                self.error(
                    E_RESOURCE,
                    format!("unable to read source '{}'", path.display()),
                );
                return;
            }
        };
        let bytes = text.as_bytes();
        let mut s = 0;
        while s < bytes.len() {
            if !(bytes[s..].starts_with(b"/**") && bytes.get(s + 3) != Some(&b'*')) {
                s += 1;
                continue;
            }
            let body_start = s + 3;
            let Some(rel) = memmem::find(&bytes[body_start..], b"*/") else {
                break;
            };
            let body_end = body_start + rel;
            let mut sig = body_end + 2;
            while sig < bytes.len() && matches!(bytes[sig], b' ' | b'\t' | b'\r' | b'\n') {
                sig += 1;
            }
            if sig >= bytes.len() {
                break;
            }
            let sig_start = sig;
            while sig < bytes.len() && bytes[sig] != b'\r' && bytes[sig] != b'\n' {
                sig += 1;
            }
            let signature = String::from_utf8_lossy(&bytes[sig_start..sig]).into_owned();
            self.out.text("<dl><dt>");
            self.source_code(&signature, lang);
            self.out.text("</dt><dd>");
            let mut in_table = false;
            let mut pos = body_start;
            while pos < body_end {
                while pos < body_end && matches!(bytes[pos], b'\r' | b'\n' | b' ' | b'*') {
                    pos += 1;
                }
                if pos >= body_end {
                    break;
                }
                let line_start = pos;
                while pos < body_end && bytes[pos] != b'\r' && bytes[pos] != b'\n' {
                    pos += 1;
                }
                let Some(escaped) =
                    html_escape_trim(&String::from_utf8_lossy(&bytes[line_start..pos]))
                else {
                    continue;
                };
                if let Some(param) = escaped.strip_prefix("@param ") {
                    let param = param.trim_start_matches(' ');
                    if !in_table {
                        in_table = true;
                        self.out.text(&format!(
                            "<div class=\"table\"><table><tr><th>{}</th></tr>",
                            self.strings.args
                        ));
                    }
                    self.out.text(&format!("<tr><td>{param}</td></tr>"));
                } else if let Some(rval) = escaped.strip_prefix("@return ") {
                    let rval = rval.trim_start_matches(' ');
                    if !in_table {
                        in_table = true;
                        self.out.text("<div class=\"table\"><table>");
                    }
                    self.out.text(&format!(
                        "<tr><th>{}</th></tr><tr><td>{rval}</td></tr>",
                        self.strings.rval
                    ));
                } else if !in_table {
                    self.out.text(&escaped);
                    self.out.text(" ");
                }
            }
            if in_table {
                self.out.text("</table></div>");
            }
            self.out.text("</dd></dl><br>");
            s = sig;
        }
    }
}

fn alert_open(rest: &[u8]) -> Option<u8> {
    for tag in [
        b"<info>".as_slice(),
        b"<hint>",
        b"<note>",
        b"<also>",
        b"<todo>",
        b"<warn>",
    ] {
        if rest.starts_with(tag) {
            return Some(tag[1]);
        }
    }
    None
}

fn alert_close(rest: &[u8]) -> bool {
    [
        b"</info>".as_slice(),
        b"</hint>",
        b"</note>",
        b"</also>",
        b"</todo>",
        b"</warn>",
    ]
    .iter()
    .any(|tag| rest.starts_with(tag))
}

/// HTML-escapes text the way every verbatim span here expects: `&<>"`
/// replaced, single leading/trailing spaces dropped, `None` when nothing
/// remains.
pub(crate) fn html_escape_trim(text: &str) -> Option<String> {
    let trimmed = text.trim_start_matches(' ');
    let mut out = String::new();
    for ch in trimmed.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Like [`html_escape_trim`] but honoring `<hl>`/`<hm>` force-highlight
/// markers, used for `<pre>` bodies.
fn preformat(bytes: &[u8]) -> Option<String> {
    let mut start = 0;
    while start < bytes.len() && bytes[start] == b' ' {
        start += 1;
    }
    let bytes = &bytes[start..];
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"<hl>") {
            out.push_str("<span class=\"hl_h\">");
            i += 4;
            continue;
        }
        if bytes[i..].starts_with(b"<hm>") {
            out.push_str("<span class=\"hl_h hl_b\">");
            i += 4;
            continue;
        }
        if bytes[i..].starts_with(b"</hl>") || bytes[i..].starts_with(b"</hm>") {
            let block = bytes[i + 3] == b'm';
            out.push_str("</span>");
            i += 5;
            if block {
                if bytes.get(i) == Some(&b'\r') && bytes.get(i + 1) == Some(&b'\n') {
                    i += 2;
                } else if matches!(bytes.get(i), Some(&b'\n') | Some(&b'\r')) {
                    i += 1;
                }
            }
            continue;
        }
        match bytes[i] {
            b'&' => out.push_str("&amp;"),
            b'<' => out.push_str("&lt;"),
            b'>' => out.push_str("&gt;"),
            b'"' => out.push_str("&quot;"),
            _ => {
                let run_start = i;
                while i < bytes.len()
                    && !matches!(bytes[i], b'&' | b'<' | b'>' | b'"')
                {
                    i += 1;
                }
                out.push_str(&String::from_utf8_lossy(&bytes[run_start..i]));
                continue;
            }
        }
        i += 1;
    }
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() { None } else { Some(out) }
}
