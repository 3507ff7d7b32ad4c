//! The compilation context's failure-mode switch.
//!
//! A failing stage either exits the process immediately with a caret
//! diagnostic, or collects the failure and lets its caller resynchronise
//! and keep going — a plain enum and a `Vec`, no process-wide global or
//! longjmp-style unwind involved.

use forge_base::Span;

/// A single collected diagnostic: a message anchored to a source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

/// Whether a failing stage should exit the process immediately or collect
/// the failure and let the caller keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Print a location-prefixed message with a caret line and exit.
    #[default]
    Exit,
    /// Append to the diagnostics list; the caller resynchronises and
    /// continues parsing.
    Diagnostic,
}

/// Collects diagnostics for a single compilation and holds the mode switch.
///
/// Regex compilation always runs in [`Mode::Exit`] (it has no embedding
/// caller to hand partial results back to); the CLI driver also uses
/// `Exit`. An embedding tool — an LSP, say — would construct its own
/// `Diagnostics` in `Mode::Diagnostic` instead.
#[derive(Debug, Default)]
pub struct Diagnostics {
    mode: Mode,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(mode: Mode) -> Self {
        Diagnostics { mode, items: Vec::new() }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records a failure. In [`Mode::Exit`], formats the message with a
    /// caret line under the offending span against `source` and exits the
    /// process with status 1 — this function does not return in that mode.
    /// In [`Mode::Diagnostic`], appends to the list and returns normally so
    /// the caller can resynchronise and keep parsing.
    pub fn report(&mut self, source: &str, message: impl Into<String>, span: Span) {
        let message = message.into();
        match self.mode {
            Mode::Exit => {
                eprintln!("{}", render_caret(source, &message, span));
                std::process::exit(1);
            }
            Mode::Diagnostic => {
                self.items.push(Diagnostic { message, span });
            }
        }
    }

    /// Renders a single message-and-span pair the same way [`Self::report`]
    /// would in [`Mode::Exit`], without exiting — for callers (the CLI's
    /// own taxonomy-keyed exit codes) that need the caret text but want to
    /// choose their own exit status.
    pub fn format_one(source: &str, message: &str, span: Span) -> String {
        render_caret(source, message, span)
    }
}

/// Renders a one-line message followed by the offending source line and a
/// caret pointing at the span's start column.
fn render_caret(source: &str, message: &str, span: Span) -> String {
    let (line_no, col, line_text) = locate(source, span.start);
    format!(
        "error: {message}\n  --> line {line_no}\n   | {line_text}\n   | {caret:>col$}",
        caret = "^",
        col = col + 1,
    )
}

fn locate(source: &str, offset: usize) -> (usize, usize, &str) {
    let mut line_no = 1usize;
    let mut line_start = 0usize;
    for (i, b) in source.as_bytes().iter().enumerate() {
        if i >= offset {
            break;
        }
        if *b == b'\n' {
            line_no += 1;
            line_start = i + 1;
        }
    }
    let line_end = source[line_start..]
        .find('\n')
        .map(|rel| line_start + rel)
        .unwrap_or(source.len());
    let col = offset.saturating_sub(line_start);
    (line_no, col, &source[line_start..line_end])
}
