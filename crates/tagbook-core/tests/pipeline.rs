use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tagbook_core::{
    DocSource, E_HEADING_DUP, E_INCLUDE_CYCLE, E_REF_UNRESOLVED, E_TAG_CONTEXT, E_TAG_UNCLOSED,
    EmbeddedImage, GenerateResult, ImageError, RuleSet, W_LANG_UNKNOWN, W_TAG_UNKNOWN, generate,
    sanitize_html,
};

struct MemSource {
    files: HashMap<PathBuf, String>,
}

impl MemSource {
    fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, text)| (PathBuf::from(path), (*text).to_string()))
                .collect(),
        }
    }
}

impl DocSource for MemSource {
    fn read_text(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
    }

    fn image(&self, _path: &Path) -> Result<EmbeddedImage, ImageError> {
        Ok(EmbeddedImage {
            mime: "gif".to_string(),
            width: 100,
            height: 44,
            src: "data:image/gif;base64,AAAA".to_string(),
        })
    }
}

fn run(files: &[(&str, &str)], inputs: &[&str]) -> GenerateResult {
    let source = MemSource::new(files);
    let rules = RuleSet::new();
    let inputs: Vec<PathBuf> = inputs.iter().map(PathBuf::from).collect();
    generate(&inputs, &source, &rules)
}

fn count_code(result: &GenerateResult, code: &str) -> usize {
    result.diagnostics.iter().filter(|d| d.code == code).count()
}

#[test]
fn well_nested_list_reports_nothing() {
    let result = run(
        &[("doc.xml", "<h1>Top</h1>\n<ol><li>a</li></ol>\n")],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, E_TAG_CONTEXT), 0, "{:?}", result.diagnostics);
}

#[test]
fn li_outside_list_is_one_error_and_parsing_continues() {
    let result = run(
        &[("doc.xml", "<h1>Top</h1>\n<li>x</li>\n<p>after</p>\n")],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, E_TAG_CONTEXT), 1, "{:?}", result.diagnostics);
    assert!(result.body.contains("<p>after</p>"));
}

#[test]
fn forward_reference_across_include_resolves() {
    // B links to A's heading before A reaches it in scan order.
    let result = run(
        &[
            (
                "a.xml",
                "<include b.xml>\n<h1>Intro</h1>\n<p><a>Intro</a></p>\n",
            ),
            ("b.xml", "<cap>Guide</cap>\n<a>Intro</a>\n"),
        ],
        &["a.xml"],
    );
    assert_eq!(count_code(&result, E_REF_UNRESOLVED), 0, "{:?}", result.diagnostics);
    // both the early and the late link resolve to the same anchor; the third
    // href on the heading itself is the permalink
    assert_eq!(result.body.matches("onclick=\"c('intro')\"").count(), 2);
    let headings: Vec<_> = result.toc.iter().filter(|e| e.level > 0).collect();
    assert_eq!(headings.len(), 1);
    assert_eq!(headings[0].slug, "intro");
}

#[test]
fn dangling_link_reports_once_per_occurrence() {
    let result = run(
        &[(
            "doc.xml",
            "<h1>Top</h1>\n<p><a>Nowhere</a> and <a>Nowhere</a></p>\n",
        )],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, E_REF_UNRESOLVED), 2);
    // best effort: the normalized slug survives, no in-band marker
    assert!(result.body.contains("href=\"#nowhere\""));
}

#[test]
fn explicit_heading_id_still_satisfies_title_links() {
    let result = run(
        &[(
            "doc.xml",
            "<p><a>Setup Guide</a></p>\n<h1 setup>Setup Guide</h1>\n",
        )],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, E_REF_UNRESOLVED), 0, "{:?}", result.diagnostics);
    assert!(result.body.contains("href=\"#setup\""));
}

#[test]
fn duplicate_heading_id_is_reported_and_cleared() {
    let result = run(
        &[("doc.xml", "<h1>Same</h1>\n<h2>Same</h2>\n")],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, E_HEADING_DUP), 1);
    assert_eq!(result.toc.len(), 2);
    assert_eq!(result.toc[0].slug, "same");
    assert_eq!(result.toc[1].slug, "");
}

#[test]
fn include_cycle_is_caught() {
    let result = run(
        &[("a.xml", "<h1>A</h1>\n<include a.xml>\n")],
        &["a.xml"],
    );
    assert_eq!(count_code(&result, E_INCLUDE_CYCLE), 1);
}

#[test]
fn markdown_include_goes_through_the_translator() {
    let result = run(
        &[
            ("a.xml", "<include b.md>\n<p><a>Intro</a></p>\n"),
            ("b.md", "# Intro\n\nHello **world**\n\n"),
        ],
        &["a.xml"],
    );
    assert_eq!(count_code(&result, E_REF_UNRESOLVED), 0, "{:?}", result.diagnostics);
    assert_eq!(result.toc.len(), 1);
    assert_eq!(result.toc[0].slug, "intro");
    assert!(result.body.contains("<b>world</b>"));
}

#[test]
fn unknown_tags_pass_through_with_a_warning() {
    let result = run(
        &[("doc.xml", "<h1>Top</h1>\n<marquee>hi</marquee>\n")],
        &["doc.xml"],
    );
    assert!(count_code(&result, W_TAG_UNKNOWN) >= 1);
    assert!(result.body.contains("<marquee>"));
}

#[test]
fn code_blocks_highlight_with_generic_fallback() {
    let result = run(
        &[(
            "doc.xml",
            "<h1>Top</h1>\n<code nosuchlang>int x = sum(1);</code>\n",
        )],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, W_LANG_UNKNOWN), 1);
    assert!(result.body.contains("<span class=\"hl_t\">int</span>"));
    assert!(result.body.contains("<pre class=\"lineno\">1<br></pre>"));
}

#[test]
fn metadata_block_overrides_strings() {
    let result = run(
        &[(
            "doc.xml",
            "<doc><title>My Doc</title><version>1.2</version><warn>Achtung</warn></doc>\n<h1>Top</h1>\n<warn>careful</warn>\n",
        )],
        &["doc.xml"],
    );
    assert_eq!(result.strings.title, "My Doc");
    assert_eq!(result.strings.version, "1.2");
    assert!(result.body.contains("<div class=\"warn\"><p><span>Achtung</span></p>"));
}

#[test]
fn image_directives_scale_and_wrap() {
    let result = run(
        &[(
            "doc.xml",
            "<h1>Top</h1>\n<imgt icon.gif>\n<imgc banner.gif>\n",
        )],
        &["doc.xml"],
    );
    // inline images shrink to the 22px line height: 100x44 -> 50x22
    assert!(result.body.contains("<img class=\"imgt\" width=\"50\" height=\"22\""));
    assert!(result.body.contains("<div class=\"imgc\"><img class=\"imgc\" width=\"100\" height=\"44\""));
    assert!(result.body.contains("src=\"data:image/gif;base64,AAAA\""));
}

#[test]
fn api_doc_extracts_comment_blocks() {
    let result = run(
        &[
            (
                "doc.xml",
                "<h1>Top</h1>\n<api c lib.c>\n",
            ),
            (
                "lib.c",
                "/** Adds two numbers.\n * @param a first operand\n * @return the sum\n */\nint add(int a);\n",
            ),
        ],
        &["doc.xml"],
    );
    assert!(result.body.contains("<dl><dt>"));
    assert!(result.body.contains("Adds two numbers."));
    assert!(result.body.contains("<th>Arguments</th>"));
    assert!(result.body.contains("<tr><td>a first operand</td></tr>"));
    assert!(result.body.contains("<th>Return Value</th>"));
    assert!(result.body.contains("<span class=\"hl_t\">int</span>"));
}

#[test]
fn landing_section_suppresses_toc() {
    let result = run(
        &[(
            "doc.xml",
            "<hello><h1>Welcome</h1></hello>\n<h1>First</h1>\n",
        )],
        &["doc.xml"],
    );
    assert!(result.landing);
    assert!(result.body.contains("<div class=\"page\" rel=\"_\">"));
    assert!(result.body.contains("<h1>Welcome</h1>"));
    assert_eq!(result.toc.len(), 1);
    assert_eq!(result.toc[0].slug, "first");
}

#[test]
fn pre_blocks_honor_force_highlight_markers() {
    let result = run(
        &[(
            "doc.xml",
            "<h1>Top</h1>\n<pre>plain <hl>bright</hl> &amp;</pre>\n",
        )],
        &["doc.xml"],
    );
    assert!(result.body.contains("<span class=\"hl_h\">bright</span>"));
    assert!(result.body.contains("&amp;amp;"));
}

#[test]
fn open_tags_are_swept_at_the_next_heading() {
    let result = run(
        &[("doc.xml", "<h1>A</h1>\n<b>bold never closed\n<h2>B</h2>\n")],
        &["doc.xml"],
    );
    assert_eq!(count_code(&result, E_TAG_UNCLOSED), 1);
}

#[test]
fn pages_get_navigation_between_level_one_headings() {
    let result = run(
        &[(
            "doc.xml",
            "<h1>One</h1>\n<p>first page</p>\n<h1>Two</h1>\n<p>second page</p>\n",
        )],
        &["doc.xml"],
    );
    assert!(result.body.contains("class=\"btn next\""));
    assert!(result.body.contains("for=\"_two\""));
    // closing footer of the last page points back to page one
    assert!(result.body.contains("class=\"btn prev\""));
    assert!(result.body.contains("for=\"_one\""));
    assert!(result.body.starts_with("<div class=\"page\" rel=\"one\">"));
}

#[test]
fn sanitize_strips_foreign_script() {
    let clean = sanitize_html("<p>keep</p><script>alert(1)</script>");
    assert!(clean.contains("<p>keep</p>"));
    assert!(!clean.contains("script"));
}
