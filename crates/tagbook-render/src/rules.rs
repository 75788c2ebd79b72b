//! Highlight-rule discovery: `hl_<name>.json` files in a plugins directory,
//! each a JSON array of eight pattern arrays in table order (comment,
//! reserved, operator, number, quote, punctuation, type, keyword).

use std::fs;
use std::path::{Path, PathBuf};

use tagbook_core::{
    Diagnostic, DiagnosticSeverity, E_RESOURCE, HighlightRules, RuleSet, W_PATTERN_BAD,
    validate_pattern,
};

pub fn load_rules(dir: &Path, diagnostics: &mut Vec<Diagnostic>) -> RuleSet {
    let mut set = RuleSet::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return set;
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| rule_language(path).is_some())
        .collect();
    files.sort();
    for path in files {
        let name = rule_language(&path).unwrap_or_default();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => {
                diagnostics.push(Diagnostic::new(
                    path.display().to_string(),
                    0,
                    DiagnosticSeverity::Error,
                    E_RESOURCE,
                    "unable to read highlight rules",
                ));
                continue;
            }
        };
        let parsed: Vec<Vec<String>> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                diagnostics.push(Diagnostic::new(
                    path.display().to_string(),
                    0,
                    DiagnosticSeverity::Error,
                    E_RESOURCE,
                    format!("invalid highlight rules: {err}"),
                ));
                continue;
            }
        };
        let mut tables: [Vec<String>; 8] = Default::default();
        for (index, table) in parsed.into_iter().take(8).enumerate() {
            tables[index] = table;
        }
        // Only the first four tables hold patterns; the rest are literals.
        for table in &tables[..4] {
            for pattern in table {
                if !validate_pattern(pattern.as_bytes()) {
                    diagnostics.push(Diagnostic::new(
                        path.display().to_string(),
                        0,
                        DiagnosticSeverity::Warning,
                        W_PATTERN_BAD,
                        format!("malformed highlight pattern '{pattern}'"),
                    ));
                }
            }
        }
        set.push(HighlightRules {
            name: name.clone(),
            tables,
        });
    }
    set
}

fn rule_language(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_prefix("hl_")?.strip_suffix(".json")?;
    if stem.is_empty() { None } else { Some(stem.to_string()) }
}
