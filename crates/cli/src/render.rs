//! Pretty finding rendering using ariadne.
//!
//! Converts the errors a script line produced into ariadne [`Report`]s for
//! coloured, source-annotated terminal output. Falls back to structured JSON
//! when the output is piped or when the user explicitly requests it.

use std::io::{self, IsTerminal};

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use scpi_engine_diagnostics::{ErrorClass, ErrorEntry, Span};
use serde::Serialize;

// ── Output format ───────────────────────────────────────────────────────

/// Output format for findings and command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Coloured, source-annotated output (ariadne).
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, or detect from whether stdout is a TTY.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Findings ────────────────────────────────────────────────────────────

/// One error queued while running one line of a script.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Finding {
    /// 1-based line number.
    pub(crate) line: usize,
    /// Bytes of the line, terminator excluded.
    pub(crate) span: Span,
    /// The queued entry.
    #[serde(flatten)]
    pub(crate) entry: ErrorEntry,
    /// Error class name.
    pub(crate) class: String,
}

impl Finding {
    pub(crate) fn new(line: usize, span: Span, entry: ErrorEntry) -> Self {
        let class = entry.class().to_string();
        Self {
            line,
            span,
            entry,
            class,
        }
    }
}

fn report_kind(class: ErrorClass) -> ReportKind<'static> {
    match class {
        ErrorClass::Command | ErrorClass::Execution | ErrorClass::Query => ReportKind::Error,
        _ => ReportKind::Warning,
    }
}

fn class_color(class: ErrorClass) -> Color {
    match class {
        ErrorClass::Command => Color::Red,
        ErrorClass::Execution => Color::Magenta,
        ErrorClass::Query => Color::Yellow,
        _ => Color::Blue,
    }
}

// ── Pretty rendering ────────────────────────────────────────────────────

/// Render findings in pretty (ariadne) format to stderr.
pub(crate) fn render_findings_pretty(source: &str, filename: &str, findings: &[Finding]) {
    let config = Config::default().with_compact(false);
    let mut cache = (filename, Source::from(source));

    for finding in findings {
        let class = finding.entry.class();
        // Clamp to the source; ariadne panics on out-of-range spans.
        let start = finding.span.start.min(source.len());
        let end = finding.span.end.min(source.len()).max(start);
        let code = finding.entry.code.to_string();

        let mut builder = Report::build(report_kind(class), (filename, start..end))
            .with_code(&code)
            .with_message(&finding.entry.message)
            .with_config(config)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(format!("{class} error"))
                    .with_color(class_color(class)),
            );
        if let Some(explanation) = finding.entry.explain() {
            builder = builder.with_help(explanation);
        }
        builder.finish().eprint(&mut cache).ok();
    }
}

// ── JSON rendering ──────────────────────────────────────────────────────

/// Render findings as a JSON array to stdout.
pub(crate) fn render_findings_json(findings: &[Finding]) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(findings)?);
    Ok(())
}

// ── Summary line ────────────────────────────────────────────────────────

/// Print a coloured summary line, e.g. `2 errors on 1 line`.
pub(crate) fn print_summary(findings: &[Finding]) {
    use ariadne::Fmt;

    if findings.is_empty() {
        return;
    }
    let mut lines: Vec<usize> = findings.iter().map(|f| f.line).collect();
    lines.dedup();

    let errors = findings.len();
    let e = if errors == 1 { "" } else { "s" };
    let l = if lines.len() == 1 { "" } else { "s" };
    eprintln!(
        "{} on {} line{l}",
        format!("{errors} error{e}").fg(Color::Red),
        lines.len()
    );
}
