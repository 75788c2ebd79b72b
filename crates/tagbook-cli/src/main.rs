use std::env;
use std::path::PathBuf;
use std::process;

use tagbook_core::{Diagnostic, DiagnosticSeverity, generate, sanitize_html};
use tagbook_render::{FsDocSource, load_rules, render_document, write_document};

fn main() {
    let mut output: Option<PathBuf> = None;
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut plugins: Option<PathBuf> = None;
    let mut sanitized = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "--sanitized" => sanitized = true,
            "--plugins" => match args.next() {
                Some(dir) => plugins = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("--plugins expects a directory");
                    print_usage();
                    process::exit(2);
                }
            },
            _ => {
                if output.is_none() {
                    output = Some(PathBuf::from(arg));
                } else {
                    inputs.push(PathBuf::from(arg));
                }
            }
        }
    }

    let Some(output) = output else {
        print_usage();
        return;
    };
    if inputs.is_empty() {
        print_usage();
        return;
    }

    let plugins = plugins.unwrap_or_else(default_plugins_dir);
    let mut diagnostics = Vec::new();
    let rules = load_rules(&plugins, &mut diagnostics);

    let mut result = generate(&inputs, &FsDocSource, &rules);
    if sanitized {
        result.body = sanitize_html(&result.body);
    }
    diagnostics.append(&mut result.diagnostics);
    let html = render_document(&result, &mut diagnostics);

    if let Err(err) = write_document(&output, &html) {
        eprintln!("tagbook error: {err}");
        process::exit(1);
    }

    for diagnostic in &diagnostics {
        eprintln!("{}", format_diagnostic(diagnostic));
    }
    if diagnostics.iter().any(|diagnostic| diagnostic.is_error()) {
        eprintln!(
            "tagbook: there were errors during generation; the documentation was saved but is probably incomplete"
        );
        process::exit(1);
    }
}

fn default_plugins_dir() -> PathBuf {
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join("plugins");
            if candidate.is_dir() {
                return candidate;
            }
        }
    }
    PathBuf::from("/usr/share/tagbook/plugins")
}

fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    let severity = match diagnostic.severity {
        DiagnosticSeverity::Error => "error",
        DiagnosticSeverity::Warning => "warning",
    };
    format!(
        "tagbook {}: {}:{}: {}",
        severity, diagnostic.file, diagnostic.line, diagnostic.message
    )
}

fn print_usage() {
    eprintln!("Usage: tagbook-cli [--plugins <dir>] [--sanitized] <output.html> <input> [input...]");
}
