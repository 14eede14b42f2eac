use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

use crate::location::SourceLocation;

/// Failure classes. All of them abort the phase that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Invalid attribute shape, strategy/kind pairing or repeated configuration.
    #[error("configuration error")]
    Configuration,
    /// An argument of the wrong shape.
    #[error("type error")]
    Type,
    /// A value outside its permitted range (numeric label slots, bit ranges).
    #[error("range error")]
    Range,
    /// A label or reference that cannot be resolved in scope.
    #[error("resolution error")]
    Resolution,
    /// An abstract capability invoked without a concrete backing.
    #[error("not implemented")]
    NotImplemented,
    /// A malformed template file.
    #[error("syntax error")]
    Syntax,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub notes: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            location: None,
            notes: Vec::new(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    /// Attach a location unless a more precise one is already present.
    /// A span in a template file beats a Rust call site.
    pub fn at(mut self, location: SourceLocation) -> Self {
        let replace = match (&self.location, &location) {
            (None, _) => true,
            (Some(SourceLocation::Caller { .. }), SourceLocation::Span { .. }) => true,
            _ => false,
        };
        if replace {
            self.location = Some(location);
        }
        self
    }

    /// Same as [`Error::at`] for an optional location.
    pub fn at_opt(self, location: Option<&SourceLocation>) -> Self {
        match location {
            Some(location) => self.at(location.clone()),
            None => self,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let mut diagnostic = Diagnostic::new(Severity::Error).with_message(self.to_string());
        let mut notes = self.notes.clone();
        match &self.location {
            Some(SourceLocation::Span { file_id, span }) => {
                diagnostic = diagnostic.with_labels(vec![Label::primary(*file_id, span.clone())]);
            }
            Some(location @ SourceLocation::Caller { .. }) => {
                notes.insert(0, format!("declared at {}", location));
            }
            None => {}
        }
        diagnostic.with_notes(notes)
    }
}
