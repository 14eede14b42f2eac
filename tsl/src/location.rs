use std::fmt;
use std::ops::Range;

/// Where a declarative construct was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A call site in a Rust template, captured with `#[track_caller]`.
    Caller {
        file: &'static str,
        line: u32,
        column: u32,
    },
    /// A byte span inside a template file (for codespan-reporting).
    Span { file_id: usize, span: Range<usize> },
}

impl SourceLocation {
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        SourceLocation::Caller {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    pub fn span(file_id: usize, span: Range<usize>) -> Self {
        SourceLocation::Span { file_id, span }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Caller { file, line, column } => {
                write!(f, "{}:{}:{}", file, line, column)
            }
            SourceLocation::Span { file_id, span } => {
                write!(f, "file #{} bytes {}..{}", file_id, span.start, span.end)
            }
        }
    }
}
