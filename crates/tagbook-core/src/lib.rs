mod diagnostic;
mod highlight;
mod markdown;
mod parser;
mod pattern;
mod resolver;
mod slug;
mod strings;
mod toc;
mod validator;

pub use diagnostic::{
    Diagnostic, DiagnosticSeverity, E_HEADING_DUP, E_HEADING_EMPTY, E_INCLUDE_CYCLE,
    E_REF_UNRESOLVED, E_RESOURCE, E_TAG_CONTEXT, E_TAG_REOPENED, E_TAG_UNCLOSED, E_TAG_UNOPENED,
    E_TOC_MISSING, W_LANG_UNKNOWN, W_PATTERN_BAD, W_TAG_UNKNOWN,
};
pub use highlight::{
    HL_COMMENT, HL_KEYWORD, HL_NUMBER, HL_OPERATOR, HL_PUNCTUATION, HL_QUOTE, HL_RESERVED,
    HL_TYPE, HighlightRules, RuleSet, render_code,
};
pub use markdown::translate;
pub use parser::{DocSource, EmbeddedImage, GenerateResult, ImageError, generate};
pub use pattern::{MatchResult, match_pattern, validate_pattern};
pub use resolver::sanitize_html;
pub use slug::safe_id;
pub use strings::Strings;
pub use toc::TocEntry;
