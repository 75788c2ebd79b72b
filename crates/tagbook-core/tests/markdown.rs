use tagbook_core::translate;

#[test]
fn pipe_table_with_separator_row() {
    let out = translate("|a|b|\n|-|-|\n|1|2|\n");
    assert_eq!(
        out,
        "<table><tr><th>a</th><th>b</th></tr>\n\n<tr><td>1</td><td>2</td></tr></table>"
    );
}

#[test]
fn table_alignment_bits_pick_cell_tags() {
    let out = translate("|name|count|\n|*|:|\n|x|1|\n");
    // bold-header and right-aligned cells open with their variant but close
    // with the plain spelling, which is what the markup parser pairs them by
    assert!(out.contains("<tH>name</th>"), "{out}");
    assert!(out.contains("<tn>1</td>"), "{out}");
}

#[test]
fn atx_heading_then_paragraph() {
    // the collected heading line keeps its newline, like every block body
    let out = translate("# Title\n\nBody text here\n\n");
    assert_eq!(out, "<h1>Title\n</h1>\n\n<p>Body text here</p>");
}

#[test]
fn setext_headings() {
    let out = translate("Title\n=====\n\nText follows\n\n");
    assert!(out.starts_with("<h1>Title</h1>\n"), "{out}");
    assert!(out.contains("<p>Text follows</p>"), "{out}");
    let out = translate("Minor\n-----\n\nMore\n\n");
    assert!(out.starts_with("<h2>Minor</h2>\n"), "{out}");
}

#[test]
fn alert_labels_redirect_paragraphs() {
    assert_eq!(
        translate("NOTE: remember this\n\n"),
        "<note> remember this</note>"
    );
    assert_eq!(
        translate("SEE ALSO: the appendix\n\n"),
        "<also> the appendix</also>"
    );
    assert_eq!(translate("WARN: hot\n\n"), "<warn> hot</warn>");
}

#[test]
fn inline_emphasis() {
    assert_eq!(
        translate("This is **bold** text\n\n"),
        "<p>This is <b>bold</b> text</p>"
    );
    assert_eq!(translate("a *i* b\n\n"), "<p>a <i>i</i> b</p>");
    assert_eq!(translate("x ~~gone~~ y\n\n"), "<p>x <s>gone</s> y</p>");
    assert_eq!(translate("e = mc^^2^^\n\n"), "<p>e = mc<sup>2</sup></p>");
    assert_eq!(translate("H,,2,,O\n\n"), "<p>H<sub>2</sub>O</p>");
    assert_eq!(translate("see `mmap` docs\n\n"), "<p>see <tt>mmap</tt> docs</p>");
}

#[test]
fn fenced_code_with_language_tag() {
    let out = translate("```c\nint x;\n```\n\n");
    assert_eq!(out, "<code c>\nint x;\n</code>");
    let out = translate("``` \nplain\n```\n\n");
    assert!(out.starts_with("<pre>"), "{out}");
}

#[test]
fn links_images_and_shortcuts() {
    assert_eq!(
        translate("See [docs](https://example.com) now\n\n"),
        "<p>See <a https://example.com>docs</a> now</p>"
    );
    assert_eq!(
        translate("See [docs](<https://example.com>)\n\n"),
        "<p>See <a https://example.com>docs</a></p>"
    );
    assert_eq!(translate("go [Intro] now\n\n"), "<p>go <a>Intro</a> now</p>");
    // inline image: not preceded by a newline
    let out = translate("icon ![alt text](pic.gif) here\n\n");
    assert!(out.contains("<imgt pic.gif>"), "{out}");
    assert!(out.contains("<fig>alt text</fig>"), "{out}");
}

#[test]
fn block_image_after_newline_is_wide() {
    let out = translate("intro text\n![shot](screen.png)\n\n");
    assert!(out.contains("<imgw screen.png>"), "{out}");
}

#[test]
fn backslash_escapes_and_hard_breaks() {
    assert_eq!(translate("a \\*literal\\* b\n\n"), "<p>a *literal* b</p>");
    let out = translate("line one  \nline two\n\n");
    assert!(out.contains("<br>"), "{out}");
}

#[test]
fn blockquote_recurses_as_block() {
    let out = translate("> quoted line\n\n");
    assert!(out.contains("<quote><p>quoted line\n</p></quote>"), "{out}");
}

#[test]
fn unordered_list_items() {
    let out = translate("- one\n- two\n\n");
    assert!(out.starts_with("<ul><li>one\n</li>"), "{out}");
    assert!(out.contains("<li>two\n</li>"), "{out}");
    assert!(out.ends_with("</ul>"), "{out}");
}

#[test]
fn ordered_list_items() {
    let out = translate("1. first\n2. second\n\n");
    assert!(out.starts_with("<ol><li>first\n</li>"), "{out}");
    assert!(out.ends_with("</ol>"), "{out}");
}

#[test]
fn html_comments_vanish() {
    let out = translate("before <!-- hidden --> after\n\n");
    assert!(!out.contains("hidden"), "{out}");
    assert!(out.contains("before"), "{out}");
    assert!(out.contains("after"), "{out}");
}

#[test]
fn single_newlines_survive_inside_blocks() {
    let out = translate("first line\nsecond line\n\n");
    assert_eq!(out, "<p>first line\nsecond line</p>");
}
