use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tagbook_core::{E_RESOURCE, RuleSet, generate};
use tagbook_render::{FsDocSource, render_document};

fn temp_doc(name: &str, contents: &str) -> PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("time");
    let mut path = env::temp_dir();
    path.push(format!(
        "tagbook_shell_{}_{}_{}.xml",
        name,
        now.as_secs(),
        now.subsec_nanos()
    ));
    fs::write(&path, contents).expect("write temp doc");
    path
}

#[test]
fn shell_wraps_body_with_nav_and_scripts() {
    let input = temp_doc(
        "wrap",
        "<doc><title>Handbook</title><version>2.0</version></doc>\n\
         <h1>Start</h1>\n<p>hello body</p>\n<h2>Detail</h2>\n",
    );
    let result = generate(&[input], &FsDocSource, &RuleSet::new());
    let mut diags = result.diagnostics.clone();
    let html = render_document(&result, &mut diags);

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Handbook</title>"));
    assert!(html.contains("<div class=\"version\">2.0</div>"));
    // the first page is pre-selected via its radio input
    assert!(html.contains("<input type=\"radio\" name=\"page\" id=\"_start\" checked>"));
    // sidebar entries: level-1 folds, deeper levels link to anchors
    assert!(html.contains("<li rel=\"start\">"));
    assert!(html.contains("<li class=\"h2\"><a href=\"#detail\""));
    assert!(html.contains("hello body"));
    assert!(html.contains("function c(s)"));
    assert!(html.ends_with("</body>\n</html>\n"));
}

#[test]
fn captions_group_the_sidebar() {
    let input = temp_doc(
        "caption",
        "<cap>Basics</cap>\n<h1>Start</h1>\n<p>x</p>\n",
    );
    let result = generate(&[input], &FsDocSource, &RuleSet::new());
    let mut diags = result.diagnostics.clone();
    let html = render_document(&result, &mut diags);
    assert!(html.contains("<p>Basics</p>"), "caption row in the sidebar");
}

#[test]
fn missing_theme_reports_and_falls_back() {
    let input = temp_doc(
        "theme",
        "<doc><theme>no_such_theme.css</theme></doc>\n<h1>Start</h1>\n<p>x</p>\n",
    );
    let result = generate(&[input], &FsDocSource, &RuleSet::new());
    let mut diags = result.diagnostics.clone();
    let before = diags.len();
    let html = render_document(&result, &mut diags);
    assert!(diags[before..].iter().any(|d| d.code == E_RESOURCE));
    assert!(html.contains(".hl_c{color:#808080"), "default theme present");
}
