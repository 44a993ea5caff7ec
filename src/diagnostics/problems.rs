//! Problems found while reconciling a document

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, DiagnosticTag, NumberOrString, Position, Range,
};

use crate::text::{LineIndex, Region};

/// Source name attached to published diagnostics
pub const DIAGNOSTIC_SOURCE: &str = "yaml-assist-lsp";

/// What kind of problem was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemKind {
    SyntaxError,
    UnknownProperty,
    MissingRequired,
    MutuallyExclusive,
    Deprecated,
    InvalidValue,
    TypeMismatch,
    DuplicateKey,
}

impl ProblemKind {
    pub const ALL: [ProblemKind; 8] = [
        ProblemKind::SyntaxError,
        ProblemKind::UnknownProperty,
        ProblemKind::MissingRequired,
        ProblemKind::MutuallyExclusive,
        ProblemKind::Deprecated,
        ProblemKind::InvalidValue,
        ProblemKind::TypeMismatch,
        ProblemKind::DuplicateKey,
    ];

    /// Diagnostic code
    pub fn code(&self) -> &'static str {
        match self {
            ProblemKind::SyntaxError => "syntax-error",
            ProblemKind::UnknownProperty => "unknown-property",
            ProblemKind::MissingRequired => "missing-required",
            ProblemKind::MutuallyExclusive => "mutually-exclusive",
            ProblemKind::Deprecated => "deprecated",
            ProblemKind::InvalidValue => "invalid-value",
            ProblemKind::TypeMismatch => "type-mismatch",
            ProblemKind::DuplicateKey => "duplicate-key",
        }
    }

    pub fn default_severity(&self) -> ProblemSeverity {
        match self {
            ProblemKind::Deprecated => ProblemSeverity::Warning,
            _ => ProblemSeverity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemSeverity {
    Error,
    Warning,
    Info,
    Hint,
    /// Problems of this severity are dropped
    Ignore,
}

impl ProblemSeverity {
    fn to_lsp(self) -> Option<DiagnosticSeverity> {
        match self {
            ProblemSeverity::Error => Some(DiagnosticSeverity::ERROR),
            ProblemSeverity::Warning => Some(DiagnosticSeverity::WARNING),
            ProblemSeverity::Info => Some(DiagnosticSeverity::INFORMATION),
            ProblemSeverity::Hint => Some(DiagnosticSeverity::HINT),
            ProblemSeverity::Ignore => None,
        }
    }
}

/// A problem with a precise source region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub severity: ProblemSeverity,
    pub region: Region,
    pub message: String,
    /// Text that would fix the problem when put in place of `region`
    pub replacement: Option<String>,
}

impl Problem {
    pub fn new(kind: ProblemKind, region: Region, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            region,
            message: message.into(),
            replacement: None,
        }
    }

    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Convert into an LSP diagnostic
    pub fn to_diagnostic(&self, text: &str, index: &LineIndex) -> Option<Diagnostic> {
        let severity = self.severity.to_lsp()?;
        let (start_line, start_col) = index.position_of(text, self.region.start);
        let (end_line, end_col) = index.position_of(text, self.region.end);
        Some(Diagnostic {
            range: Range {
                start: Position {
                    line: start_line,
                    character: start_col,
                },
                end: Position {
                    line: end_line,
                    character: end_col,
                },
            },
            severity: Some(severity),
            code: Some(NumberOrString::String(self.code().to_string())),
            code_description: None,
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: self.message.clone(),
            related_information: None,
            tags: (self.kind == ProblemKind::Deprecated).then(|| vec![DiagnosticTag::DEPRECATED]),
            data: self
                .replacement
                .as_ref()
                .map(|replacement| json!({ "replacement": replacement })),
        })
    }
}

/// The replacement text carried by a diagnostic of ours, if any.
pub fn replacement_of(diagnostic: &Diagnostic) -> Option<&str> {
    if diagnostic.source.as_deref() != Some(DIAGNOSTIC_SOURCE) {
        return None;
    }
    diagnostic.data.as_ref()?.get("replacement")?.as_str()
}

/// Collects problems during reconciling, applying configured severities
#[derive(Debug, Default)]
pub struct ProblemCollector {
    problems: Vec<Problem>,
    severities: HashMap<ProblemKind, ProblemSeverity>,
}

impl ProblemCollector {
    /// Create a new empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector that overrides the default severity of some kinds
    pub fn with_severities(severities: HashMap<ProblemKind, ProblemSeverity>) -> Self {
        Self {
            problems: Vec::new(),
            severities,
        }
    }

    pub fn accept(&mut self, mut problem: Problem) {
        if let Some(severity) = self.severities.get(&problem.kind) {
            problem.severity = *severity;
        }
        if problem.severity != ProblemSeverity::Ignore {
            self.problems.push(problem);
        }
    }

    pub fn extend(&mut self, problems: impl IntoIterator<Item = Problem>) {
        for problem in problems {
            self.accept(problem);
        }
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// The collected problems, ordered by position
    pub fn into_problems(mut self) -> Vec<Problem> {
        self.problems.sort_by_key(|p| p.region.start);
        self.problems
    }

    /// Convert into the final list of diagnostics
    pub fn into_diagnostics(self, text: &str) -> Vec<Diagnostic> {
        let index = LineIndex::new(text);
        self.into_problems()
            .iter()
            .filter_map(|p| p.to_diagnostic(text, &index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_override() {
        let mut severities = HashMap::new();
        severities.insert(ProblemKind::UnknownProperty, ProblemSeverity::Warning);
        severities.insert(ProblemKind::Deprecated, ProblemSeverity::Ignore);
        let mut collector = ProblemCollector::with_severities(severities);
        collector.accept(Problem::new(
            ProblemKind::UnknownProperty,
            Region::new(5, 9),
            "Unknown property 'blah'",
        ));
        collector.accept(Problem::new(ProblemKind::Deprecated, Region::new(0, 1), "old"));
        collector.accept(Problem::new(ProblemKind::SyntaxError, Region::new(1, 2), "bad"));
        let problems = collector.into_problems();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].kind, ProblemKind::SyntaxError);
        assert_eq!(problems[1].severity, ProblemSeverity::Warning);
    }

    #[test]
    fn test_diagnostic_conversion() {
        let text = "name: x\nblah: y\n";
        let mut collector = ProblemCollector::new();
        collector.accept(Problem::new(
            ProblemKind::UnknownProperty,
            Region::new(8, 12),
            "Unknown property 'blah'",
        ));
        let diagnostics = collector.into_diagnostics(text);
        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.range.start, Position::new(1, 0));
        assert_eq!(d.range.end, Position::new(1, 4));
        assert_eq!(d.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            d.code,
            Some(NumberOrString::String("unknown-property".to_string()))
        );
        assert_eq!(d.source.as_deref(), Some(DIAGNOSTIC_SOURCE));
        assert_eq!(d.tags, None);
        assert_eq!(d.data, None);
        assert_eq!(replacement_of(d), None);
    }

    #[test]
    fn test_deprecated_diagnostic_carries_tag_and_replacement() {
        let text = "mode: old\n";
        let index = LineIndex::new(text);
        let problem = Problem::new(ProblemKind::Deprecated, Region::new(6, 9), "Use 'new'")
            .with_replacement("new");

        let d = problem.to_diagnostic(text, &index).unwrap();
        assert_eq!(d.tags, Some(vec![DiagnosticTag::DEPRECATED]));
        assert_eq!(d.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(replacement_of(&d), Some("new"));

        let foreign = Diagnostic {
            source: Some("other".to_string()),
            ..d.clone()
        };
        assert_eq!(replacement_of(&foreign), None);

        let plain = Problem::new(ProblemKind::Deprecated, Region::new(0, 4), "old key");
        let d = plain.to_diagnostic(text, &index).unwrap();
        assert_eq!(d.tags, Some(vec![DiagnosticTag::DEPRECATED]));
        assert_eq!(replacement_of(&d), None);
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: ProblemKind = serde_json::from_str("\"missing-required\"").unwrap();
        assert_eq!(kind, ProblemKind::MissingRequired);
        for kind in ProblemKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.code()));
        }
    }
}
