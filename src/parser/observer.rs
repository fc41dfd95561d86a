//! Parse events for external tooling such as live syntax highlighting.

use crate::{diagnostics::SourceSpan, lexer::TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseEventKind {
    TokenRead(TokenKind),
    CommandEntered,
    CommandExited,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseEvent {
    pub kind: ParseEventKind,
    /// Zero-based index of the top-level command being parsed.
    pub command_index: usize,
    pub span: SourceSpan,
}

pub trait ParseObserver {
    fn on_event(&mut self, event: &ParseEvent);
}

impl<F> ParseObserver for F
where
    F: FnMut(&ParseEvent),
{
    fn on_event(&mut self, event: &ParseEvent) {
        self(event)
    }
}

/// Keeps every event in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<ParseEvent>,
}

impl ParseObserver for RecordingObserver {
    fn on_event(&mut self, event: &ParseEvent) {
        self.events.push(event.clone());
    }
}
