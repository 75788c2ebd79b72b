//! Internal cross-reference resolution.
//!
//! Links name headings by their visible text; headings may carry explicit
//! ids. The parser therefore emits the output as a chunk sequence where a
//! not-yet-resolvable link target is a `SlugRef` node instead of literal
//! text. When the heading finally appears its title-slug is mapped to the
//! real anchor id and every pending forward reference for that slug is
//! dropped. Rendering happens once, after all inputs are parsed, so no live
//! buffer ever needs splicing and no in-band marker can leak into the
//! delivered output: a slug that never resolved renders as itself and only
//! the recorded diagnostics remain.

use std::collections::{HashMap, HashSet};

use crate::diagnostic::{Diagnostic, DiagnosticSeverity, E_REF_UNRESOLVED};
use crate::slug::safe_id;
use crate::toc::TocEntry;

#[derive(Clone, Debug)]
enum Chunk {
    Text(String),
    SlugRef(String),
}

/// The growable output of one pipeline run. Append-only; only the final
/// render consults the resolver's substitutions.
#[derive(Default)]
pub struct Output {
    chunks: Vec<Chunk>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Chunk::Text(last)) = self.chunks.last_mut() {
            last.push_str(text);
        } else {
            self.chunks.push(Chunk::Text(text.to_string()));
        }
    }

    pub fn push(&mut self, ch: char) {
        if let Some(Chunk::Text(last)) = self.chunks.last_mut() {
            last.push(ch);
        } else {
            self.chunks.push(Chunk::Text(ch.to_string()));
        }
    }

    fn slug_ref(&mut self, slug: &str) {
        self.chunks.push(Chunk::SlugRef(slug.to_string()));
    }

    /// Whether the rendered output currently ends with this character.
    /// A trailing slug reference never counts: slugs contain no whitespace.
    pub fn ends_with(&self, ch: char) -> bool {
        match self.chunks.last() {
            Some(Chunk::Text(text)) => text.ends_with(ch),
            _ => false,
        }
    }

    /// Drops trailing spaces and newlines, the way headings and the final
    /// footer expect the buffer to end tight.
    pub fn trim_end(&mut self) {
        while let Some(chunk) = self.chunks.last_mut() {
            match chunk {
                Chunk::Text(text) => {
                    let kept = text.trim_end_matches([' ', '\r', '\n']).len();
                    text.truncate(kept);
                    if text.is_empty() {
                        self.chunks.pop();
                    } else {
                        return;
                    }
                }
                Chunk::SlugRef(_) => return,
            }
        }
    }

    /// Renders the chunk sequence, replacing every slug reference with its
    /// resolved anchor id (or the slug itself when nothing resolved it).
    pub fn render(&self, resolver: &LinkResolver) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Text(text) => out.push_str(text),
                Chunk::SlugRef(slug) => {
                    out.push_str(resolver.substitutions.get(slug).unwrap_or(slug));
                }
            }
        }
        out
    }
}

#[derive(Clone, Debug)]
struct ForwardRef {
    slug: String,
    file: String,
    line: u32,
    name: String,
}

/// Tracks pending forward references and the title-slug → anchor-id
/// substitutions gathered as headings are parsed.
#[derive(Default)]
pub struct LinkResolver {
    pending: Vec<ForwardRef>,
    substitutions: HashMap<String, String>,
}

impl LinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits an internal link to `name`. Known targets produce a direct
    /// anchor; unknown ones a placeholder plus one pending reference per
    /// occurrence.
    pub fn internal_link(
        &mut self,
        out: &mut Output,
        toc: &[TocEntry],
        name: &str,
        file: &str,
        line: u32,
    ) {
        let Some(slug) = safe_id(name) else {
            return;
        };
        if toc.iter().any(|entry| !entry.slug.is_empty() && entry.slug == slug) {
            out.text(&format!(
                "<a href=\"#{slug}\" onclick=\"c('{slug}')\">{name}</a>"
            ));
            return;
        }
        if let Some(id) = self.substitutions.get(&slug) {
            out.text(&format!("<a href=\"#{id}\" onclick=\"c('{id}')\">{name}</a>"));
            return;
        }
        self.pending.push(ForwardRef {
            slug: slug.clone(),
            file: file.to_string(),
            line,
            name: name.to_string(),
        });
        out.text("<a href=\"#");
        out.slug_ref(&slug);
        out.text("\" onclick=\"c('");
        out.slug_ref(&slug);
        out.text("')\">");
        out.text(name);
        out.text("</a>");
    }

    /// Called when a heading is created: links naming `title` now resolve
    /// to `id`, and every pending reference for that title is satisfied.
    pub fn resolve(&mut self, title: &str, id: &str) {
        if id.is_empty() {
            return;
        }
        let Some(slug) = safe_id(title) else {
            return;
        };
        self.pending.retain(|forward| forward.slug != slug);
        self.substitutions.insert(slug, id.to_string());
    }

    /// End of run: every reference still pending is an unresolved-link
    /// error, one per occurrence.
    pub fn finish(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        for forward in self.pending.drain(..) {
            diagnostics.push(Diagnostic::new(
                forward.file,
                forward.line,
                DiagnosticSeverity::Error,
                E_REF_UNRESOLVED,
                format!("unresolved link: {}", forward.name),
            ));
        }
    }
}

/// Cleans a rendered body with an allow-list covering the tags this
/// pipeline emits. Foreign tags pass through parsing verbatim by design, so
/// embedding contexts can opt into this pass.
pub fn sanitize_html(html: &str) -> String {
    let tags: HashSet<&'static str> = [
        "a", "b", "blockquote", "br", "code", "dd", "div", "dl", "dt", "h1", "h2", "h3", "h4",
        "h5", "h6", "hr", "i", "img", "kbd", "li", "ol", "p", "pre", "s", "samp", "span", "sub",
        "sup", "table", "td", "th", "tr", "u", "ul",
    ]
    .iter()
    .copied()
    .collect();

    let mut generic_attributes: HashSet<&'static str> = HashSet::new();
    generic_attributes.insert("class");
    generic_attributes.insert("id");

    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", ["href", "title"].iter().copied().collect());
    tag_attributes.insert(
        "img",
        ["alt", "src", "width", "height"].iter().copied().collect(),
    );
    tag_attributes.insert("div", ["class", "rel"].iter().copied().collect());

    ammonia::Builder::new()
        .tags(tags)
        .generic_attributes(generic_attributes)
        .tag_attributes(tag_attributes)
        .clean(html)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{LinkResolver, Output};
    use crate::toc::TocEntry;

    fn entry(slug: &str, title: &str) -> TocEntry {
        TocEntry {
            slug: slug.into(),
            level: 1,
            raw_title: title.into(),
            escaped_title: title.into(),
        }
    }

    #[test]
    fn known_target_links_directly() {
        let mut resolver = LinkResolver::new();
        let mut out = Output::new();
        let toc = vec![entry("intro", "Intro")];
        resolver.internal_link(&mut out, &toc, "Intro", "a.xml", 1);
        assert_eq!(
            out.render(&resolver),
            "<a href=\"#intro\" onclick=\"c('intro')\">Intro</a>"
        );
        let mut diags = Vec::new();
        resolver.finish(&mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn forward_reference_resolves_on_heading() {
        let mut resolver = LinkResolver::new();
        let mut out = Output::new();
        resolver.internal_link(&mut out, &[], "Setup Guide", "a.xml", 2);
        resolver.resolve("Setup Guide", "custom_anchor");
        assert_eq!(
            out.render(&resolver),
            "<a href=\"#custom_anchor\" onclick=\"c('custom_anchor')\">Setup Guide</a>"
        );
        let mut diags = Vec::new();
        resolver.finish(&mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn dangling_reference_reports_once_per_occurrence() {
        let mut resolver = LinkResolver::new();
        let mut out = Output::new();
        resolver.internal_link(&mut out, &[], "Missing", "a.xml", 1);
        resolver.internal_link(&mut out, &[], "Missing", "a.xml", 5);
        let mut diags = Vec::new();
        resolver.finish(&mut diags);
        assert_eq!(diags.len(), 2);
        // best-effort output still carries the normalized slug, no marker
        let html = out.render(&resolver);
        assert!(html.contains("href=\"#missing\""));
    }

    #[test]
    fn trim_end_stops_at_slug_refs() {
        let mut resolver = LinkResolver::new();
        let mut out = Output::new();
        resolver.internal_link(&mut out, &[], "Later", "a.xml", 1);
        out.text("tail  \n\n");
        out.trim_end();
        assert!(out.render(&resolver).ends_with("tail"));
    }
}
