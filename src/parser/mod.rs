//! Recursive-descent parser producing [`Expr`] trees.
//!
//! `parse` handles a whole program. `try_parse_commands` parses top-level
//! commands one at a time and keeps every command parsed before the first
//! failure.

mod expression;
pub mod observer;
mod statement;

use indexmap::IndexSet;
use tracing::debug;

use crate::{
    ast::{Expr, ExprKind},
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub use observer::{ParseEvent, ParseEventKind, ParseObserver, RecordingObserver};

/// Parses a complete program into a single sequence expression.
pub fn parse(source: &str) -> Result<Expr, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens, None).parse_program()
}

pub fn parse_with_observer(
    source: &str,
    observer: &mut dyn ParseObserver,
) -> Result<Expr, Diagnostic> {
    let tokens = match Lexer::new(source).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            report_error(observer, &err);
            return Err(err);
        }
    };
    Parser::new(tokens, Some(observer)).parse_program()
}

/// Parses top-level commands, returning all commands that parsed before the
/// first error together with that error.
pub fn try_parse_commands(source: &str) -> (Vec<Expr>, Option<Diagnostic>) {
    try_parse_commands_inner(source, None)
}

pub fn try_parse_commands_with_observer(
    source: &str,
    observer: &mut dyn ParseObserver,
) -> (Vec<Expr>, Option<Diagnostic>) {
    try_parse_commands_inner(source, Some(observer))
}

fn try_parse_commands_inner(
    source: &str,
    mut observer: Option<&mut dyn ParseObserver>,
) -> (Vec<Expr>, Option<Diagnostic>) {
    let (tokens, lex_error) = match Lexer::new(source).tokenize() {
        Ok(tokens) => (tokens, None),
        Err(err) => {
            // Keep the lines before the lexing failure parseable.
            let cut = err
                .span
                .and_then(|span| source[..span.start.min(source.len())].rfind('\n'))
                .unwrap_or(0);
            let tokens = Lexer::new(&source[..cut]).tokenize().unwrap_or_default();
            (tokens, Some(err))
        }
    };
    if let (Some(err), Some(observer)) = (&lex_error, observer.as_deref_mut()) {
        report_error(observer, err);
    }
    if tokens.is_empty() {
        return (Vec::new(), lex_error);
    }
    let mut parser = Parser::new(tokens, observer);
    let (commands, parse_error) = parser.parse_commands();
    (commands, parse_error.or(lex_error))
}

fn report_error(observer: &mut dyn ParseObserver, err: &Diagnostic) {
    observer.on_event(&ParseEvent {
        kind: ParseEventKind::Error(err.message.clone()),
        command_index: 0,
        span: err.span.unwrap_or_default(),
    });
}

#[derive(Debug, Default)]
struct LocalScope {
    names: IndexSet<String>,
    /// `def`, `class` and `module` bodies do not see outer locals.
    gate: bool,
}

pub(crate) struct Parser<'o> {
    tokens: Vec<Token>,
    current: usize,
    scopes: Vec<LocalScope>,
    /// Nesting of loops and blocks, where `break`/`next`/`redo` are legal.
    loop_depth: usize,
    /// While parsing command arguments or loop conditions `do` belongs to
    /// the outer construct.
    no_do: usize,
    command_index: usize,
    observer: Option<&'o mut dyn ParseObserver>,
}

impl<'o> Parser<'o> {
    fn new(tokens: Vec<Token>, observer: Option<&'o mut dyn ParseObserver>) -> Self {
        Self {
            tokens,
            current: 0,
            scopes: vec![LocalScope {
                names: IndexSet::new(),
                gate: true,
            }],
            loop_depth: 0,
            no_do: 0,
            command_index: 0,
            observer,
        }
    }

    fn parse_program(&mut self) -> Result<Expr, Diagnostic> {
        let (commands, error) = self.parse_commands();
        if let Some(err) = error {
            return Err(err);
        }
        let span = match (commands.first(), commands.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => SourceSpan::default(),
        };
        Ok(Expr::new(ExprKind::Sequence(commands), span))
    }

    fn parse_commands(&mut self) -> (Vec<Expr>, Option<Diagnostic>) {
        let mut commands = Vec::new();
        self.skip_terminators();
        while !self.is_at_end() {
            let start = self.peek().span;
            self.emit(ParseEventKind::CommandEntered, start);
            match self.parse_statement() {
                Ok(expr) => {
                    self.emit(ParseEventKind::CommandExited, expr.span);
                    commands.push(expr);
                }
                Err(err) => {
                    debug!(message = %err.message, "parse error");
                    self.emit(
                        ParseEventKind::Error(err.message.clone()),
                        err.span.unwrap_or(start),
                    );
                    return (commands, Some(err));
                }
            }
            if !self.is_at_end() && !self.check_terminator() {
                let err = self.unexpected();
                self.emit(
                    ParseEventKind::Error(err.message.clone()),
                    err.span.unwrap_or(start),
                );
                return (commands, Some(err));
            }
            self.skip_terminators();
            self.command_index += 1;
        }
        (commands, None)
    }

    /// Parses the `#{...}` code of a string template with the enclosing
    /// locals visible.
    fn parse_interpolation(&mut self, source: &str, offset: usize) -> Result<Expr, Diagnostic> {
        let tokens = Lexer::with_offset(source, offset).tokenize()?;
        let visible: IndexSet<String> = self.visible_locals();
        let mut inner = Parser::new(tokens, None);
        inner.scopes[0].names = visible;
        inner.loop_depth = self.loop_depth;
        let (mut commands, error) = inner.parse_commands();
        if let Some(err) = error {
            return Err(err);
        }
        let span = SourceSpan::new(offset, offset + source.len());
        Ok(match commands.len() {
            0 => Expr::nil(span),
            1 => commands.remove(0),
            _ => Expr::new(ExprKind::Sequence(commands), span),
        })
    }

    fn emit(&mut self, kind: ParseEventKind, span: SourceSpan) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_event(&ParseEvent {
                kind,
                command_index: self.command_index,
                span,
            });
        }
    }

    // Local variable tracking.

    fn push_scope(&mut self, gate: bool) {
        self.scopes.push(LocalScope {
            names: IndexSet::new(),
            gate,
        });
    }

    fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn declare(&mut self, name: &str) {
        if self.is_local(name) {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains(name) {
                return true;
            }
            if scope.gate {
                break;
            }
        }
        false
    }

    fn visible_locals(&self) -> IndexSet<String> {
        let mut names = IndexSet::new();
        for scope in self.scopes.iter().rev() {
            names.extend(scope.names.iter().cloned());
            if scope.gate {
                break;
            }
        }
        names
    }

    // Token cursor.

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(keyword)
    }

    fn check_terminator(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        if self.observer.is_some() {
            self.emit(ParseEventKind::TokenRead(token.kind.clone()), token.span);
        }
        token
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else if self.is_at_end() {
            Err(self.error(
                self.peek(),
                &format!("unexpected end of input, expecting '{}'", keyword.as_str()),
            ))
        } else {
            Err(self.error(
                self.peek(),
                &format!(
                    "unexpected '{}', expecting '{}'",
                    describe(self.peek()),
                    keyword.as_str()
                ),
            ))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_terminators(&mut self) {
        while self.check_terminator() {
            self.advance();
        }
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Syntax, message).with_span(token.span)
    }

    fn unexpected(&self) -> Diagnostic {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            self.error(token, "unexpected end of input")
        } else {
            self.error(token, &format!("unexpected '{}'", describe(token)))
        }
    }
}

fn describe(token: &Token) -> String {
    match &token.kind {
        TokenKind::Newline => "end-of-line".into(),
        TokenKind::Eof => "end-of-input".into(),
        TokenKind::Keyword(keyword) => keyword.as_str().into(),
        TokenKind::String => "string literal".into(),
        _ if token.lexeme.is_empty() => format!("{:?}", token.kind),
        _ => token.lexeme.clone(),
    }
}
