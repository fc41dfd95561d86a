use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn offset(self, by: usize) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
        }
    }
}

/// Script-visible error classes raised by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    Name,
    NoMethod,
    Argument,
    Type,
    Frozen,
    InvalidOperation,
    TypeAccess,
    ZeroDivision,
    Index,
    Key,
    LocalJump,
    SystemStack,
    Io,
    Runtime,
    /// A script-defined exception class, identified by its full name.
    Custom(String),
}

impl DiagnosticKind {
    pub fn class_name(&self) -> &str {
        match self {
            DiagnosticKind::Syntax => "SyntaxError",
            DiagnosticKind::Name => "NameError",
            DiagnosticKind::NoMethod => "NoMethodError",
            DiagnosticKind::Argument => "ArgumentError",
            DiagnosticKind::Type => "TypeError",
            DiagnosticKind::Frozen => "FrozenError",
            DiagnosticKind::InvalidOperation => "InvalidOperationError",
            DiagnosticKind::TypeAccess => "TypeAccessError",
            DiagnosticKind::ZeroDivision => "ZeroDivisionError",
            DiagnosticKind::Index => "IndexError",
            DiagnosticKind::Key => "KeyError",
            DiagnosticKind::LocalJump => "LocalJumpError",
            DiagnosticKind::SystemStack => "SystemStackError",
            DiagnosticKind::Io => "IOError",
            DiagnosticKind::Runtime => "RuntimeError",
            DiagnosticKind::Custom(name) => name,
        }
    }

    pub fn from_class_name(name: &str) -> Self {
        match name {
            "SyntaxError" => DiagnosticKind::Syntax,
            "NameError" => DiagnosticKind::Name,
            "NoMethodError" => DiagnosticKind::NoMethod,
            "ArgumentError" => DiagnosticKind::Argument,
            "TypeError" => DiagnosticKind::Type,
            "FrozenError" => DiagnosticKind::Frozen,
            "InvalidOperationError" => DiagnosticKind::InvalidOperation,
            "TypeAccessError" => DiagnosticKind::TypeAccess,
            "ZeroDivisionError" => DiagnosticKind::ZeroDivision,
            "IndexError" => DiagnosticKind::Index,
            "KeyError" => DiagnosticKind::Key,
            "LocalJumpError" => DiagnosticKind::LocalJump,
            "SystemStackError" => DiagnosticKind::SystemStack,
            "IOError" => DiagnosticKind::Io,
            "RuntimeError" => DiagnosticKind::Runtime,
            other => DiagnosticKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
    /// Exception object carried by errors raised from script code.
    pub exception: Option<Value>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
            exception: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches a span only when none was recorded closer to the fault.
    pub fn or_span(mut self, span: SourceSpan) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_exception(mut self, exception: Value) -> Self {
        self.exception = Some(exception);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        if !self.notes.is_empty() {
            writeln!(f)?;
            for note in &self.notes {
                writeln!(f, "  note: {note}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Garnet runtime.
#[derive(Debug, Error)]
pub enum GarnetError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GarnetError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            GarnetError::Diagnostic(diag) => diag.kind.clone(),
            GarnetError::Io(_) => DiagnosticKind::Io,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GarnetError::Diagnostic(diag) => diag.message.clone(),
            GarnetError::Io(err) => err.to_string(),
        }
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            GarnetError::Diagnostic(diag) => diag.span,
            GarnetError::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GarnetError>;

pub fn name_error(message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Name, message)
}

pub fn argument_error(message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Argument, message)
}

pub fn type_error(message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Type, message)
}

pub fn runtime_error(message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Runtime, message)
}

pub fn arity_error(given: usize, expected: impl fmt::Display) -> Diagnostic {
    argument_error(format!(
        "wrong number of arguments (given {given}, expected {expected})"
    ))
}
