pub const E_TAG_CONTEXT: &str = "E_TAG_CONTEXT";
pub const E_TAG_REOPENED: &str = "E_TAG_REOPENED";
pub const E_TAG_UNOPENED: &str = "E_TAG_UNOPENED";
pub const E_TAG_UNCLOSED: &str = "E_TAG_UNCLOSED";
pub const E_HEADING_EMPTY: &str = "E_HEADING_EMPTY";
pub const E_HEADING_DUP: &str = "E_HEADING_DUP";
pub const E_TOC_MISSING: &str = "E_TOC_MISSING";
pub const E_REF_UNRESOLVED: &str = "E_REF_UNRESOLVED";
pub const E_RESOURCE: &str = "E_RESOURCE";
pub const E_INCLUDE_CYCLE: &str = "E_INCLUDE_CYCLE";

pub const W_PATTERN_BAD: &str = "W_PATTERN_BAD";
pub const W_TAG_UNKNOWN: &str = "W_TAG_UNKNOWN";
pub const W_LANG_UNKNOWN: &str = "W_LANG_UNKNOWN";

/// A single reported problem. Nothing in the pipeline aborts on these; they
/// are collected and the caller decides what an error-level count means.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub severity: DiagnosticSeverity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        file: impl Into<String>,
        line: u32,
        severity: DiagnosticSeverity,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            severity,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}
