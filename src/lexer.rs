use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Alias,
    And,
    Begin,
    Break,
    Case,
    Class,
    Def,
    Defined,
    Do,
    Else,
    Elsif,
    End,
    Ensure,
    False,
    For,
    If,
    In,
    Module,
    Next,
    Nil,
    Not,
    Or,
    Redo,
    Rescue,
    Retry,
    Return,
    SelfValue,
    Super,
    Then,
    True,
    Unless,
    Until,
    When,
    While,
    Yield,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Alias => "alias",
            Keyword::And => "and",
            Keyword::Begin => "begin",
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Class => "class",
            Keyword::Def => "def",
            Keyword::Defined => "defined?",
            Keyword::Do => "do",
            Keyword::Else => "else",
            Keyword::Elsif => "elsif",
            Keyword::End => "end",
            Keyword::Ensure => "ensure",
            Keyword::False => "false",
            Keyword::For => "for",
            Keyword::If => "if",
            Keyword::In => "in",
            Keyword::Module => "module",
            Keyword::Next => "next",
            Keyword::Nil => "nil",
            Keyword::Not => "not",
            Keyword::Or => "or",
            Keyword::Redo => "redo",
            Keyword::Rescue => "rescue",
            Keyword::Retry => "retry",
            Keyword::Return => "return",
            Keyword::SelfValue => "self",
            Keyword::Super => "super",
            Keyword::Then => "then",
            Keyword::True => "true",
            Keyword::Unless => "unless",
            Keyword::Until => "until",
            Keyword::When => "when",
            Keyword::While => "while",
            Keyword::Yield => "yield",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Constant,
    InstanceVar,
    ClassVar,
    GlobalVar,
    Integer,
    Float,
    String,
    Symbol,
    DSymbol,
    Regex,
    Words,
    Symbols,
    Label,
    Keyword(Keyword),
    Newline,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    SafeNav,
    DotDot,
    DotDotDot,
    ColonColon,
    Colon,
    Question,
    Arrow,
    FatArrow,
    Assign,
    /// Compound assignment; the lexeme holds the operator without `=`.
    OpAssign,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    Percent,
    Ampersand,
    DoubleAmpersand,
    Pipe,
    DoublePipe,
    Caret,
    Tilde,
    Bang,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Spaceship,
    EqualEqual,
    CaseEqual,
    BangEqual,
    Match,
    NotMatch,
    ShiftLeft,
    ShiftRight,
    Unknown,
    Eof,
}

/// One segment of a string, symbol or regex literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    /// Source of a `#{...}` interpolation and its byte offset in the file.
    Code { source: String, offset: usize },
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
    pub space_before: bool,
    pub parts: Vec<TemplatePart>,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
            space_before: false,
            parts: Vec::new(),
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    base: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            base: 0,
            tokens: Vec::new(),
        }
    }

    /// Lexes a fragment that starts at `base` inside a larger file, so spans
    /// stay file-relative.
    pub fn with_offset(source: &'a str, base: usize) -> Self {
        let mut lexer = Self::new(source);
        lexer.base = base;
        lexer
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(ahead)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn match_str(&mut self, expected: &str) -> bool {
        if self.source[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn span(&self, start: usize) -> SourceSpan {
        SourceSpan::new(self.base + start, self.base + self.pos)
    }

    fn error(&self, message: &str, start: usize) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Syntax, message).with_span(self.span(start))
    }

    fn last_kind(&self) -> Option<&TokenKind> {
        self.tokens.last().map(|tok| &tok.kind)
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.bytes[self.pos - 1] == b'\n'
    }

    /// Whether the previous token ends an operand, which decides between
    /// binary and prefix readings of `/`, `%`, `[` and `-`.
    fn after_value(&self) -> bool {
        match self.last_kind() {
            Some(kind) => matches!(
                kind,
                TokenKind::Identifier
                    | TokenKind::Constant
                    | TokenKind::InstanceVar
                    | TokenKind::ClassVar
                    | TokenKind::GlobalVar
                    | TokenKind::Integer
                    | TokenKind::Float
                    | TokenKind::String
                    | TokenKind::Symbol
                    | TokenKind::DSymbol
                    | TokenKind::Regex
                    | TokenKind::Words
                    | TokenKind::Symbols
                    | TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::RBrace
                    | TokenKind::Keyword(Keyword::End)
                    | TokenKind::Keyword(Keyword::SelfValue)
                    | TokenKind::Keyword(Keyword::Nil)
                    | TokenKind::Keyword(Keyword::True)
                    | TokenKind::Keyword(Keyword::False)
            ),
            None => false,
        }
    }

    /// `foo /re/` and `foo %w[a]` read as command arguments.
    fn command_argument_position(&self, space_before: bool) -> bool {
        let next_is_space = self
            .peek_at(1)
            .map(|ch| ch.is_whitespace() || ch == '=')
            .unwrap_or(true);
        matches!(self.last_kind(), Some(TokenKind::Identifier)) && space_before && !next_is_space
    }

    fn continues_line(&self) -> bool {
        match self.last_kind() {
            None => true,
            Some(kind) => matches!(
                kind,
                TokenKind::Newline
                    | TokenKind::Semicolon
                    | TokenKind::Comma
                    | TokenKind::Dot
                    | TokenKind::SafeNav
                    | TokenKind::ColonColon
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::LBrace
                    | TokenKind::Pipe
                    | TokenKind::Assign
                    | TokenKind::OpAssign
                    | TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Star
                    | TokenKind::DoubleStar
                    | TokenKind::Slash
                    | TokenKind::Percent
                    | TokenKind::DoubleAmpersand
                    | TokenKind::DoublePipe
                    | TokenKind::Ampersand
                    | TokenKind::Caret
                    | TokenKind::Less
                    | TokenKind::LessEqual
                    | TokenKind::Greater
                    | TokenKind::GreaterEqual
                    | TokenKind::Spaceship
                    | TokenKind::EqualEqual
                    | TokenKind::CaseEqual
                    | TokenKind::BangEqual
                    | TokenKind::Match
                    | TokenKind::NotMatch
                    | TokenKind::FatArrow
                    | TokenKind::Question
                    | TokenKind::Colon
                    | TokenKind::Keyword(Keyword::And)
                    | TokenKind::Keyword(Keyword::Or)
                    | TokenKind::Keyword(Keyword::Not)
            ),
        }
    }

    /// A newline followed by `.method` continues the previous expression.
    fn next_line_starts_with_dot(&self) -> bool {
        let rest = self.source[self.pos..].trim_start();
        (rest.starts_with('.') && !rest.starts_with("..")) || rest.starts_with("&.")
    }

    /// Skips blanks and comments, reporting whether any were present.
    fn skip_trivia(&mut self) -> bool {
        let mut skipped = false;
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                    skipped = true;
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    skipped = true;
                }
                Some('#') => {
                    while let Some(ch) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    skipped = true;
                }
                Some('=') if self.at_line_start() && self.source[self.pos..].starts_with("=begin") => {
                    match self.source[self.pos..].find("\n=end") {
                        Some(offset) => {
                            self.pos += offset + "\n=end".len();
                            while let Some(ch) = self.peek_char() {
                                if ch == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        None => self.pos = self.source.len(),
                    }
                    skipped = true;
                }
                _ => return skipped,
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, space_before: bool) {
        let lexeme = self.source[start..self.pos].to_string();
        let mut token = Token::new(kind, lexeme, self.span(start));
        token.space_before = space_before;
        self.tokens.push(token);
    }

    fn push_token(&mut self, mut token: Token, space_before: bool) {
        token.space_before = space_before;
        self.tokens.push(token);
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        loop {
            let space_before = self.skip_trivia();
            let start = self.pos;
            let Some(ch) = self.peek_char() else {
                break;
            };

            if ch == '\n' {
                self.bump();
                if self.continues_line() || self.next_line_starts_with_dot() {
                    continue;
                }
                self.push(TokenKind::Newline, start, space_before);
                continue;
            }

            if self.at_line_start() && self.source[self.pos..].starts_with("__END__") {
                break;
            }

            match ch {
                'a'..='z' | 'A'..='Z' | '_' => {
                    let token = self.identifier(start);
                    self.push_token(token, space_before);
                }
                c if !c.is_ascii() && c.is_alphabetic() => {
                    let token = self.identifier(start);
                    self.push_token(token, space_before);
                }
                '0'..='9' => {
                    let token = self.number(start)?;
                    self.push_token(token, space_before);
                }
                '"' => {
                    self.bump();
                    let parts = self.template_body('"', start)?;
                    let mut token = Token::new(TokenKind::String, "", self.span(start));
                    token.parts = parts;
                    self.push_token(token, space_before);
                }
                '\'' => {
                    self.bump();
                    let text = self.single_quoted(start)?;
                    let mut token = Token::new(TokenKind::String, "", self.span(start));
                    token.parts = vec![TemplatePart::Text(text)];
                    self.push_token(token, space_before);
                }
                '@' if !space_before
                    && matches!(self.last_kind(), Some(TokenKind::Plus) | Some(TokenKind::Minus))
                    && !self.peek_at(1).is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '@') =>
                {
                    // `def -@` names the unary operator method.
                    self.bump();
                    if let Some(last) = self.tokens.last_mut() {
                        last.lexeme.push('@');
                        last.span.end = self.base + self.pos;
                    }
                }
                '@' => {
                    self.bump();
                    let kind = if self.match_next('@') {
                        TokenKind::ClassVar
                    } else {
                        TokenKind::InstanceVar
                    };
                    self.consume_word();
                    if self.pos - start <= 1 || self.source[start..self.pos].ends_with('@') {
                        return Err(self.error("expected variable name after `@`", start));
                    }
                    self.push(kind, start, space_before);
                }
                '$' => {
                    self.bump();
                    match self.peek_char() {
                        Some(c) if c.is_alphanumeric() || c == '_' => self.consume_word(),
                        Some('~') | Some('!') | Some('0') => {
                            self.bump();
                        }
                        _ => return Err(self.error("expected global variable name", start)),
                    }
                    self.push(TokenKind::GlobalVar, start, space_before);
                }
                ':' => {
                    if self.source[self.pos..].starts_with("::") {
                        self.pos += 2;
                        self.push(TokenKind::ColonColon, start, space_before);
                    } else if let Some(token) = self.symbol(start)? {
                        self.push_token(token, space_before);
                    } else {
                        self.bump();
                        self.push(TokenKind::Colon, start, space_before);
                    }
                }
                '/' => {
                    if !self.after_value() || self.command_argument_position(space_before) {
                        self.bump();
                        let parts = self.template_body('/', start)?;
                        let flags_start = self.pos;
                        while let Some(c) = self.peek_char() {
                            if matches!(c, 'i' | 'm' | 'x') {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                        let flags = self.source[flags_start..self.pos].to_string();
                        let mut token = Token::new(TokenKind::Regex, flags, self.span(start));
                        token.parts = parts;
                        self.push_token(token, space_before);
                    } else {
                        self.bump();
                        if self.match_next('=') {
                            self.push_op_assign("/", start, space_before);
                        } else {
                            self.push(TokenKind::Slash, start, space_before);
                        }
                    }
                }
                '%' => {
                    let literal = matches!(self.peek_at(1), Some('w') | Some('i'))
                        && matches!(self.peek_at(2), Some('[') | Some('(') | Some('{') | Some('<'))
                        && (!self.after_value() || self.command_argument_position(space_before));
                    if literal {
                        let token = self.word_list(start)?;
                        self.push_token(token, space_before);
                    } else {
                        self.bump();
                        if self.match_next('=') {
                            self.push_op_assign("%", start, space_before);
                        } else {
                            self.push(TokenKind::Percent, start, space_before);
                        }
                    }
                }
                _ => {
                    self.bump();
                    let kind = self.operator(ch);
                    if kind == TokenKind::OpAssign {
                        let op = self.source[start..self.pos - 1].to_string();
                        let mut token = Token::new(TokenKind::OpAssign, op, self.span(start));
                        token.space_before = space_before;
                        self.tokens.push(token);
                    } else {
                        self.push(kind, start, space_before);
                    }
                }
            }
        }

        let end = self.base + self.pos;
        self.tokens
            .push(Token::new(TokenKind::Eof, "", SourceSpan::new(end, end)));
        Ok(self.tokens)
    }

    fn push_op_assign(&mut self, op: &str, start: usize, space_before: bool) {
        let mut token = Token::new(TokenKind::OpAssign, op, self.span(start));
        token.space_before = space_before;
        self.tokens.push(token);
    }

    fn operator(&mut self, ch: char) -> TokenKind {
        match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '?' => TokenKind::Question,
            '~' => TokenKind::Tilde,
            '^' => TokenKind::Caret,
            '.' => {
                if self.match_str("..") {
                    TokenKind::DotDotDot
                } else if self.match_next('.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '=' => {
                if self.match_str("==") {
                    TokenKind::CaseEqual
                } else if self.match_next('=') {
                    TokenKind::EqualEqual
                } else if self.match_next('~') {
                    TokenKind::Match
                } else if self.match_next('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_next('=') {
                    TokenKind::BangEqual
                } else if self.match_next('~') {
                    TokenKind::NotMatch
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.match_str("=>") {
                    TokenKind::Spaceship
                } else if self.match_next('=') {
                    TokenKind::LessEqual
                } else if self.match_str("<=") {
                    TokenKind::OpAssign
                } else if self.match_next('<') {
                    TokenKind::ShiftLeft
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_next('=') {
                    TokenKind::GreaterEqual
                } else if self.match_str(">=") {
                    TokenKind::OpAssign
                } else if self.match_next('>') {
                    TokenKind::ShiftRight
                } else {
                    TokenKind::Greater
                }
            }
            '+' => {
                if self.match_next('=') {
                    TokenKind::OpAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.match_next('>') {
                    TokenKind::Arrow
                } else if self.match_next('=') {
                    TokenKind::OpAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.match_str("*=") {
                    TokenKind::OpAssign
                } else if self.match_next('*') {
                    TokenKind::DoubleStar
                } else if self.match_next('=') {
                    TokenKind::OpAssign
                } else {
                    TokenKind::Star
                }
            }
            '&' => {
                if self.match_str("&=") {
                    TokenKind::OpAssign
                } else if self.match_next('&') {
                    TokenKind::DoubleAmpersand
                } else if self.peek_char() == Some('.') && self.peek_at(1) != Some('.') {
                    self.bump();
                    TokenKind::SafeNav
                } else if self.match_next('=') {
                    TokenKind::OpAssign
                } else {
                    TokenKind::Ampersand
                }
            }
            '|' => {
                if self.match_str("|=") {
                    TokenKind::OpAssign
                } else if self.match_next('|') {
                    TokenKind::DoublePipe
                } else if self.match_next('=') {
                    TokenKind::OpAssign
                } else {
                    TokenKind::Pipe
                }
            }
            _ => TokenKind::Unknown,
        }
    }

    fn consume_word(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self, start: usize) -> Token {
        self.consume_word();
        if let Some(suffix @ ('?' | '!')) = self.peek_char() {
            let next = self.peek_at(1);
            if next != Some('=') || self.source[self.pos + 1..].starts_with("==") {
                self.pos += suffix.len_utf8();
            }
        }

        let text = &self.source[start..self.pos];
        if self.peek_char() == Some(':') && self.peek_at(1) != Some(':') {
            let label_ok = !text.ends_with('?') || text == "defined?";
            if label_ok && !matches!(self.last_kind(), Some(TokenKind::Question)) {
                let name = text.to_string();
                self.bump();
                return Token::new(TokenKind::Label, name, self.span(start));
            }
        }

        let kind = if matches!(self.last_kind(), Some(TokenKind::Dot) | Some(TokenKind::SafeNav))
        {
            if text.starts_with(|c: char| c.is_uppercase()) {
                TokenKind::Constant
            } else {
                TokenKind::Identifier
            }
        } else if let Some(keyword) = keyword_for(text) {
            TokenKind::Keyword(keyword)
        } else if text.starts_with(|c: char| c.is_uppercase()) {
            TokenKind::Constant
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, self.span(start))
    }

    fn number(&mut self, start: usize) -> Result<Token, Diagnostic> {
        if self.peek_char() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('b') | Some('B') => Some(2),
                Some('o') | Some('O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while let Some(ch) = self.peek_char() {
                    if ch.is_digit(radix) || ch == '_' {
                        self.bump();
                    } else {
                        break;
                    }
                }
                let digits = self.source[digits_start..self.pos].replace('_', "");
                if digits.is_empty() {
                    return Err(self.error("invalid numeric literal", start));
                }
                let token = match i128::from_str_radix(&digits, radix) {
                    Ok(value) => Token::new(TokenKind::Integer, value.to_string(), self.span(start)),
                    Err(_) => {
                        let value = digits
                            .chars()
                            .filter_map(|digit| digit.to_digit(radix))
                            .fold(0f64, |acc, digit| acc * f64::from(radix) + f64::from(digit));
                        Token::new(TokenKind::Float, format!("{value:e}"), self.span(start))
                    }
                };
                return Ok(token);
            }
        }

        let mut is_float = false;
        self.consume_digits();
        if self.peek_char() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            self.consume_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let next = self.peek_at(1);
            let after = self.peek_at(2);
            let exponent = next.is_some_and(|c| c.is_ascii_digit())
                || (matches!(next, Some('+') | Some('-')) && after.is_some_and(|c| c.is_ascii_digit()));
            if exponent {
                is_float = true;
                self.bump();
                if matches!(self.peek_char(), Some('+') | Some('-')) {
                    self.bump();
                }
                self.consume_digits();
            }
        }
        let lexeme = self.source[start..self.pos].replace('_', "");
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Ok(Token::new(kind, lexeme, self.span(start)))
    }

    fn consume_digits(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || (ch == '_' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn single_quoted(&mut self, start: usize) -> Result<String, Diagnostic> {
        let mut value = String::new();
        while let Some(ch) = self.bump() {
            match ch {
                '\'' => return Ok(value),
                '\\' => match self.peek_char() {
                    Some('\'') | Some('\\') => {
                        value.push(self.bump().unwrap_or('\\'));
                    }
                    _ => value.push('\\'),
                },
                other => value.push(other),
            }
        }
        Err(self.error("unterminated string literal", start))
    }

    /// Reads an interpolating body up to `close`, splitting out `#{...}`.
    fn template_body(&mut self, close: char, start: usize) -> Result<Vec<TemplatePart>, Diagnostic> {
        let mut parts = Vec::new();
        let mut text = String::new();
        while let Some(ch) = self.bump() {
            if ch == close {
                if !text.is_empty() || parts.is_empty() {
                    parts.push(TemplatePart::Text(text));
                }
                return Ok(parts);
            }
            match ch {
                '\\' => {
                    let Some(esc) = self.bump() else {
                        break;
                    };
                    if close == '/' {
                        if esc != '/' {
                            text.push('\\');
                        }
                        text.push(esc);
                        continue;
                    }
                    match esc {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '0' => text.push('\0'),
                        's' => text.push(' '),
                        'e' => text.push('\u{1b}'),
                        'u' => text.push(self.unicode_escape(start)?),
                        other => text.push(other),
                    }
                }
                '#' if self.peek_char() == Some('{') => {
                    self.bump();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let code_start = self.pos;
                    let code_end = self.interpolation_end(start)?;
                    parts.push(TemplatePart::Code {
                        source: self.source[code_start..code_end].to_string(),
                        offset: self.base + code_start,
                    });
                }
                other => text.push(other),
            }
        }
        let message = if close == '/' {
            "unterminated regexp meets end of file"
        } else {
            "unterminated string literal"
        };
        Err(self.error(message, start))
    }

    fn unicode_escape(&mut self, start: usize) -> Result<char, Diagnostic> {
        let digits = if self.match_next('{') {
            let digits_start = self.pos;
            while self.peek_char().is_some_and(|c| c != '}') {
                self.bump();
            }
            let digits = self.source[digits_start..self.pos].to_string();
            self.bump();
            digits
        } else {
            let digits_start = self.pos;
            for _ in 0..4 {
                self.bump();
            }
            self.source[digits_start..self.pos.min(self.source.len())].to_string()
        };
        u32::from_str_radix(digits.trim(), 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid Unicode escape", start))
    }

    /// Finds the `}` closing an interpolation, skipping nested braces and
    /// string literals. Leaves the cursor after the brace.
    fn interpolation_end(&mut self, start: usize) -> Result<usize, Diagnostic> {
        let mut depth = 1usize;
        while let Some(ch) = self.bump() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.pos - 1);
                    }
                }
                '"' | '\'' => {
                    while let Some(inner) = self.bump() {
                        if inner == '\\' {
                            self.bump();
                        } else if inner == ch {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unterminated string interpolation", start))
    }

    fn symbol(&mut self, start: usize) -> Result<Option<Token>, Diagnostic> {
        let next = self.peek_at(1);
        match next {
            Some('"') => {
                self.pos += 2;
                let parts = self.template_body('"', start)?;
                let mut token = Token::new(TokenKind::DSymbol, "", self.span(start));
                token.parts = parts;
                Ok(Some(token))
            }
            Some(c) if c.is_alphabetic() || c == '_' || c == '@' || c == '$' => {
                self.bump();
                let name_start = self.pos;
                while matches!(self.peek_char(), Some('@') | Some('$')) {
                    self.bump();
                }
                self.consume_word();
                match self.peek_char() {
                    Some('?') | Some('!') => {
                        self.bump();
                    }
                    Some('=')
                        if !matches!(self.peek_at(1), Some('=') | Some('~') | Some('>')) =>
                    {
                        self.bump();
                    }
                    _ => {}
                }
                let name = self.source[name_start..self.pos].to_string();
                Ok(Some(Token::new(TokenKind::Symbol, name, self.span(start))))
            }
            Some(_) => {
                const OPERATORS: [&str; 25] = [
                    "[]=", "[]", "<=>", "===", "==", "=~", "!=", "!~", "<<", ">>", "<=", ">=",
                    "**", "+@", "-@", "!", "<", ">", "+", "-", "*", "/", "%", "&", "|",
                ];
                let rest = &self.source[self.pos + 1..];
                for op in OPERATORS.iter().chain(["^", "~"].iter()) {
                    if rest.starts_with(op) {
                        self.pos += 1 + op.len();
                        return Ok(Some(Token::new(
                            TokenKind::Symbol,
                            *op,
                            self.span(start),
                        )));
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn word_list(&mut self, start: usize) -> Result<Token, Diagnostic> {
        self.bump();
        let kind = match self.bump() {
            Some('i') => TokenKind::Symbols,
            _ => TokenKind::Words,
        };
        let open = self.bump().unwrap_or('[');
        let close = match open {
            '(' => ')',
            '{' => '}',
            '<' => '>',
            _ => ']',
        };
        let mut parts = Vec::new();
        let mut current = String::new();
        loop {
            match self.bump() {
                Some(ch) if ch == close => break,
                Some(ch) if ch.is_whitespace() => {
                    if !current.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut current)));
                    }
                }
                Some(ch) => current.push(ch),
                None => return Err(self.error("unterminated list literal", start)),
            }
        }
        if !current.is_empty() {
            parts.push(TemplatePart::Text(current));
        }
        let mut token = Token::new(kind, "", self.span(start));
        token.parts = parts;
        Ok(token)
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "alias" => Kw::Alias,
        "and" => Kw::And,
        "begin" => Kw::Begin,
        "break" => Kw::Break,
        "case" => Kw::Case,
        "class" => Kw::Class,
        "def" => Kw::Def,
        "defined?" => Kw::Defined,
        "do" => Kw::Do,
        "else" => Kw::Else,
        "elsif" => Kw::Elsif,
        "end" => Kw::End,
        "ensure" => Kw::Ensure,
        "false" => Kw::False,
        "for" => Kw::For,
        "if" => Kw::If,
        "in" => Kw::In,
        "module" => Kw::Module,
        "next" => Kw::Next,
        "nil" => Kw::Nil,
        "not" => Kw::Not,
        "or" => Kw::Or,
        "redo" => Kw::Redo,
        "rescue" => Kw::Rescue,
        "retry" => Kw::Retry,
        "return" => Kw::Return,
        "self" => Kw::SelfValue,
        "super" => Kw::Super,
        "then" => Kw::Then,
        "true" => Kw::True,
        "unless" => Kw::Unless,
        "until" => Kw::Until,
        "when" => Kw::When,
        "while" => Kw::While,
        "yield" => Kw::Yield,
        _ => return None,
    };
    Some(keyword)
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}
