use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    if let Some(path) = env::var_os("CARGO_BIN_EXE_tagbook-cli") {
        return PathBuf::from(path);
    }
    let exe = env::current_exe().expect("current exe");
    let mut dir = exe.as_path();
    while let Some(parent) = dir.parent() {
        if parent.file_name().and_then(|name| name.to_str()) == Some("debug") {
            let candidate = parent.join("tagbook-cli");
            if candidate.exists() {
                return candidate;
            }
        }
        dir = parent;
    }
    panic!("binary path missing");
}

fn temp_path(name: &str, ext: &str) -> PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("time");
    let mut path = env::temp_dir();
    path.push(format!(
        "tagbook_cli_{}_{}_{}.{}",
        name,
        now.as_secs(),
        now.subsec_nanos(),
        ext
    ));
    path
}

#[test]
fn clean_document_exits_zero_and_writes_html() {
    let input = temp_path("clean", "xml");
    fs::write(&input, "<h1>Only Page</h1>\n<p>content</p>\n").expect("write input");
    let output = temp_path("clean_out", "html");

    let run = Command::new(bin_path())
        .args([output.to_str().expect("path"), input.to_str().expect("path")])
        .output()
        .expect("run");
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let html = fs::read_to_string(&output).expect("read output");
    assert!(html.contains("<h1 id=\"only_page\">Only Page"));
    assert!(html.contains("<p>content</p>"));
}

#[test]
fn unresolved_link_exits_nonzero_but_still_writes() {
    let input = temp_path("broken", "xml");
    fs::write(&input, "<h1>Page</h1>\n<p><a>Missing Section</a></p>\n").expect("write input");
    let output = temp_path("broken_out", "html");

    let run = Command::new(bin_path())
        .args([output.to_str().expect("path"), input.to_str().expect("path")])
        .output()
        .expect("run");
    assert!(!run.status.success(), "expected nonzero exit");
    let stderr = String::from_utf8_lossy(&run.stderr);
    assert!(stderr.contains("unresolved link: Missing Section"), "{stderr}");

    let html = fs::read_to_string(&output).expect("output written despite errors");
    assert!(html.contains("href=\"#missing_section\""));
}

#[test]
fn usage_on_missing_arguments() {
    let run = Command::new(bin_path()).output().expect("run");
    assert!(run.status.success());
    let stderr = String::from_utf8_lossy(&run.stderr);
    assert!(stderr.contains("Usage:"), "{stderr}");
}
