//! Nesting and balance checks for the tag vocabulary, invoked on every tag
//! event. Violations are reported and parsing continues; nothing here stops
//! the pipeline.

use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, E_TAG_CONTEXT, E_TAG_REOPENED, E_TAG_UNCLOSED, E_TAG_UNOPENED,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TagKind {
    Ol,
    Ul,
    Li,
    Grid,
    Gr,
    Gd,
    Table,
    Tr,
    Th,
    Td,
    Dl,
    Dt,
    Dd,
    P,
    B,
    I,
    U,
    S,
    Sup,
    Sub,
    Quote,
    A,
    Ui,
    Alert,
}

const TAG_COUNT: usize = 24;

const ALL: [TagKind; TAG_COUNT] = [
    TagKind::Ol,
    TagKind::Ul,
    TagKind::Li,
    TagKind::Grid,
    TagKind::Gr,
    TagKind::Gd,
    TagKind::Table,
    TagKind::Tr,
    TagKind::Th,
    TagKind::Td,
    TagKind::Dl,
    TagKind::Dt,
    TagKind::Dd,
    TagKind::P,
    TagKind::B,
    TagKind::I,
    TagKind::U,
    TagKind::S,
    TagKind::Sup,
    TagKind::Sub,
    TagKind::Quote,
    TagKind::A,
    TagKind::Ui,
    TagKind::Alert,
];

impl TagKind {
    pub fn name(self) -> &'static str {
        match self {
            TagKind::Ol => "ol",
            TagKind::Ul => "ul",
            TagKind::Li => "li",
            TagKind::Grid => "grid",
            TagKind::Gr => "gr",
            TagKind::Gd => "gd",
            TagKind::Table => "table",
            TagKind::Tr => "tr",
            TagKind::Th => "th",
            TagKind::Td => "td",
            TagKind::Dl => "dl",
            TagKind::Dt => "dt",
            TagKind::Dd => "dd",
            TagKind::P => "p",
            TagKind::B => "b",
            TagKind::I => "i",
            TagKind::U => "u",
            TagKind::S => "s",
            TagKind::Sup => "sup",
            TagKind::Sub => "sub",
            TagKind::Quote => "quote",
            TagKind::A => "a",
            TagKind::Ui => "ui",
            TagKind::Alert => "alert box",
        }
    }

    /// Counting kinds track a depth and may be open several times at once
    /// (nested lists, tables inside grid cells). Singleton kinds record the
    /// opening line instead.
    fn counting(self) -> bool {
        matches!(
            self,
            TagKind::Ol
                | TagKind::Ul
                | TagKind::Li
                | TagKind::Grid
                | TagKind::Gr
                | TagKind::Gd
                | TagKind::Table
                | TagKind::Tr
                | TagKind::Th
                | TagKind::Td
                | TagKind::Dl
                | TagKind::Dt
                | TagKind::Dd
                | TagKind::P
        )
    }
}

/// Tag state, one slot per kind: open depth for counting tags, opening line
/// for singletons, zero when closed.
#[derive(Default)]
pub struct TagValidator {
    state: [u32; TAG_COUNT],
}

impl TagValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: TagKind) -> u32 {
        self.state[kind as usize]
    }

    fn error(
        &self,
        diagnostics: &mut Vec<Diagnostic>,
        file: &str,
        line: u32,
        code: &'static str,
        message: String,
    ) {
        diagnostics.push(Diagnostic::new(
            file,
            line,
            DiagnosticSeverity::Error,
            code,
            message,
        ));
    }

    pub fn open(
        &mut self,
        kind: TagKind,
        file: &str,
        line: u32,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let missing: Option<&str> = match kind {
            TagKind::Li if self.slot(TagKind::Ol) == 0 && self.slot(TagKind::Ul) == 0 => {
                Some("an ol/ul")
            }
            TagKind::Dt | TagKind::Dd if self.slot(TagKind::Dl) == 0 => Some("a dl"),
            TagKind::Gr if self.slot(TagKind::Grid) == 0 => Some("a grid"),
            TagKind::Gd if self.slot(TagKind::Gr) == 0 => Some("a gr"),
            TagKind::Tr if self.slot(TagKind::Table) == 0 => Some("a table"),
            TagKind::Th | TagKind::Td if self.slot(TagKind::Tr) == 0 => Some("a tr"),
            _ => None,
        };
        if let Some(context) = missing {
            self.error(
                diagnostics,
                file,
                line,
                E_TAG_CONTEXT,
                format!("tag {} not in {}", kind.name(), context),
            );
        }
        if kind.counting() {
            self.state[kind as usize] += 1;
        } else if self.slot(kind) != 0 {
            self.error(
                diagnostics,
                file,
                line,
                E_TAG_REOPENED,
                format!(
                    "tag {} already open (opened in line {})",
                    kind.name(),
                    self.slot(kind)
                ),
            );
        } else {
            self.state[kind as usize] = line;
        }
    }

    pub fn close(
        &mut self,
        kind: TagKind,
        file: &str,
        line: u32,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let depth = self.slot(kind);
        if depth > 0 {
            let dependents: &[TagKind] = match kind {
                TagKind::Ol | TagKind::Ul => &[TagKind::Li],
                TagKind::Dl => &[TagKind::Dt, TagKind::Dd],
                TagKind::Grid => &[TagKind::Gr],
                TagKind::Gr => &[TagKind::Gd],
                TagKind::Table => &[TagKind::Tr],
                TagKind::Tr => &[TagKind::Th, TagKind::Td],
                _ => &[],
            };
            let open: Vec<&str> = dependents
                .iter()
                .filter(|child| self.slot(**child) >= depth && self.slot(**child) > 0)
                .map(|child| child.name())
                .collect();
            if !open.is_empty() {
                self.error(
                    diagnostics,
                    file,
                    line,
                    E_TAG_CONTEXT,
                    format!(
                        "tag {} closed but tag {} still open",
                        kind.name(),
                        open.join("/")
                    ),
                );
            }
        }
        if depth == 0 {
            self.error(
                diagnostics,
                file,
                line,
                E_TAG_UNOPENED,
                format!("no opening tag {}", kind.name()),
            );
        } else if kind.counting() {
            self.state[kind as usize] -= 1;
        } else {
            self.state[kind as usize] = 0;
        }
    }

    /// End-of-document sweep: everything still open is reported with its
    /// opening line where known, and all state is cleared.
    pub fn finish(&mut self, file: &str, line: u32, diagnostics: &mut Vec<Diagnostic>) {
        for kind in ALL {
            let value = self.state[kind as usize];
            if value == 0 {
                continue;
            }
            let message = if kind.counting() {
                format!("tag {} not closed", kind.name())
            } else {
                format!("tag {} not closed (opened in line {})", kind.name(), value)
            };
            self.error(diagnostics, file, line, E_TAG_UNCLOSED, message);
            self.state[kind as usize] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TagKind, TagValidator};
    use crate::diagnostic::{Diagnostic, E_TAG_CONTEXT, E_TAG_REOPENED, E_TAG_UNOPENED};

    fn open(v: &mut TagValidator, kind: TagKind, line: u32, diags: &mut Vec<Diagnostic>) {
        v.open(kind, "doc.xml", line, diags);
    }

    fn close(v: &mut TagValidator, kind: TagKind, line: u32, diags: &mut Vec<Diagnostic>) {
        v.close(kind, "doc.xml", line, diags);
    }

    #[test]
    fn well_nested_list_is_clean() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        open(&mut v, TagKind::Ol, 1, &mut diags);
        open(&mut v, TagKind::Li, 1, &mut diags);
        close(&mut v, TagKind::Li, 1, &mut diags);
        close(&mut v, TagKind::Ol, 1, &mut diags);
        v.finish("doc.xml", 2, &mut diags);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn li_without_list_is_one_error() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        open(&mut v, TagKind::Li, 3, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, E_TAG_CONTEXT);
        // parsing continues: the li is open and closes cleanly
        close(&mut v, TagKind::Li, 3, &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn closing_list_with_open_item_is_reported() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        open(&mut v, TagKind::Ol, 1, &mut diags);
        open(&mut v, TagKind::Li, 1, &mut diags);
        close(&mut v, TagKind::Ol, 2, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, E_TAG_CONTEXT);
    }

    #[test]
    fn singleton_reopen_names_the_first_line() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        open(&mut v, TagKind::B, 4, &mut diags);
        open(&mut v, TagKind::B, 9, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, E_TAG_REOPENED);
        assert!(diags[0].message.contains("line 4"));
    }

    #[test]
    fn closing_unopened_tag_keeps_state() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        close(&mut v, TagKind::B, 2, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, E_TAG_UNOPENED);
        open(&mut v, TagKind::B, 3, &mut diags);
        close(&mut v, TagKind::B, 3, &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn sweep_reports_and_clears_everything() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        open(&mut v, TagKind::Table, 1, &mut diags);
        open(&mut v, TagKind::I, 2, &mut diags);
        v.finish("doc.xml", 10, &mut diags);
        assert_eq!(diags.len(), 2);
        v.finish("doc.xml", 10, &mut diags);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn nested_lists_allow_concurrent_opens() {
        let mut v = TagValidator::new();
        let mut diags = Vec::new();
        open(&mut v, TagKind::Ul, 1, &mut diags);
        open(&mut v, TagKind::Li, 1, &mut diags);
        open(&mut v, TagKind::Ul, 2, &mut diags);
        open(&mut v, TagKind::Li, 2, &mut diags);
        close(&mut v, TagKind::Li, 2, &mut diags);
        close(&mut v, TagKind::Ul, 3, &mut diags);
        close(&mut v, TagKind::Li, 3, &mut diags);
        close(&mut v, TagKind::Ul, 4, &mut diags);
        assert!(diags.is_empty(), "{diags:?}");
    }
}
