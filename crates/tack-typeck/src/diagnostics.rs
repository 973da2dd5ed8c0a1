//! Ariadne-based diagnostic rendering for static-analysis errors.
//!
//! Renders [`StaticAnalysisError`] values into formatted, labeled
//! messages against the original source text. Output is colorless for
//! stable test snapshots. Each diagnostic gets an error code; internal
//! errors are rendered as bugs, not user mistakes.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use tack_common::span::LineIndex;

use crate::error::{ErrorKind, StaticAnalysisError};

/// Assign a unique error code to each error kind.
fn error_code(error: &StaticAnalysisError) -> &'static str {
    match &error.kind {
        ErrorKind::Type { .. } => "E0001",
        ErrorKind::StackMismatch { .. } => "E0002",
        ErrorKind::Attribute { .. } => "E0003",
        ErrorKind::Name { .. } => "E0004",
        ErrorKind::RigidVariable { .. } => "E0005",
        ErrorKind::OccursCheck { .. } => "E0006",
        ErrorKind::ModuleNotFound { .. } => "E0007",
        ErrorKind::UnhandledNode { .. } => "E9999",
    }
}

fn label_message(error: &StaticAnalysisError) -> String {
    match &error.kind {
        ErrorKind::Type { .. } => "types do not match here".to_string(),
        ErrorKind::StackMismatch { expected, .. } => {
            format!("expected the stack to be {expected}")
        }
        ErrorKind::Attribute { attribute, .. } => format!("no attribute `{attribute}`"),
        ErrorKind::Name { .. } => "not found in this scope".to_string(),
        ErrorKind::RigidVariable { .. } => "cannot specialize this variable".to_string(),
        ErrorKind::OccursCheck { .. } => "recursive binding here".to_string(),
        ErrorKind::ModuleNotFound { .. } => "module not found".to_string(),
        ErrorKind::UnhandledNode { .. } => "this is a bug in the type checker".to_string(),
    }
}

fn help_message(error: &StaticAnalysisError) -> Option<String> {
    match &error.kind {
        ErrorKind::OccursCheck { .. } => {
            Some("a stack shape cannot contain itself".to_string())
        }
        ErrorKind::Name { name } => Some(format!("define `{name}` before using it")),
        ErrorKind::UnhandledNode { .. } => {
            Some("please report this as a compiler bug".to_string())
        }
        _ => None,
    }
}

/// Render one error against its source. The output is colorless.
pub fn render_diagnostic(error: &StaticAnalysisError, source: &str, _filename: &str) -> String {
    let config = Config::default().with_color(false);
    let index = LineIndex::new(source);
    let source_len = source.len();

    let span: Range<usize> = match error.location {
        Some(location) => {
            let start = index.offset(location).min(source_len);
            // Ariadne needs a nonempty span.
            let end = (start + 1).min(source_len).max(start);
            if start == end && start > 0 {
                start - 1..start
            } else {
                start..end
            }
        }
        None => 0..source_len.min(1),
    };

    let report = Report::build(ReportKind::Error, span.clone())
        .with_code(error_code(error))
        .with_message(error.kind.to_string())
        .with_config(config);
    let mut report = report.with_label(
        Label::new(span)
            .with_message(label_message(error))
            .with_color(Color::Red),
    );
    if let Some(help) = help_message(error) {
        report.set_help(help);
    }
    let report = report.finish();

    let mut buf = Vec::new();
    let cache = Source::from(source);
    report
        .write(cache, &mut buf)
        .expect("writing a diagnostic to a buffer cannot fail");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

/// Serialize errors as a JSON array of `(message, location)` diagnostics
/// for tool consumption.
pub fn diagnostics_to_json(errors: &[StaticAnalysisError]) -> String {
    let diagnostics: Vec<_> = errors.iter().map(|e| e.to_diagnostic()).collect();
    serde_json::to_string_pretty(&diagnostics)
        .expect("diagnostics serialize without fallible types")
}
