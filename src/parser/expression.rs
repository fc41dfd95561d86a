use std::rc::Rc;

use crate::{
    ast::{
        Arg, BinaryOp, BlockLiteral, ConstPath, Expr, ExprKind, HashEntry, Literal, LogicalOp,
        ParamList, ParamTarget, StringPart, UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, TemplatePart, Token, TokenKind},
    stack::ensure_sufficient_stack,
};

use super::Parser;

/// Binding power of binary operators; higher binds tighter.
fn binary_precedence(kind: &TokenKind) -> Option<u8> {
    let level = match kind {
        TokenKind::DoublePipe => 1,
        TokenKind::DoubleAmpersand => 2,
        TokenKind::Spaceship
        | TokenKind::EqualEqual
        | TokenKind::CaseEqual
        | TokenKind::BangEqual
        | TokenKind::Match
        | TokenKind::NotMatch => 3,
        TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => 4,
        TokenKind::Pipe | TokenKind::Caret => 5,
        TokenKind::Ampersand => 6,
        TokenKind::ShiftLeft | TokenKind::ShiftRight => 7,
        TokenKind::Plus | TokenKind::Minus => 8,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 9,
        _ => return None,
    };
    Some(level)
}

/// Level just above `|`, used for block parameter defaults.
const ABOVE_PIPE: u8 = 6;

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::EqualEqual => BinaryOp::Equal,
        TokenKind::BangEqual => BinaryOp::NotEqual,
        TokenKind::CaseEqual => BinaryOp::CaseEqual,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::Spaceship => BinaryOp::Compare,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::ShiftLeft => BinaryOp::ShiftLeft,
        TokenKind::ShiftRight => BinaryOp::ShiftRight,
        TokenKind::Match => BinaryOp::Match,
        TokenKind::NotMatch => BinaryOp::NotMatch,
        _ => return None,
    };
    Some(op)
}

impl<'o> Parser<'o> {
    /// Assignment-level expression: no `and`/`or`/`not` and no modifiers.
    pub(super) fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let left = self.parse_ternary()?;
        if self.check(TokenKind::Assign) {
            self.advance();
            let target = self.to_assign_target(left)?;
            let value = self.parse_assignment_value()?;
            let span = value.span;
            return Ok(Expr::new(
                ExprKind::Assign {
                    target,
                    value: Box::new(value),
                },
                span,
            ));
        }
        if self.check(TokenKind::OpAssign) {
            let op = self.advance().lexeme;
            let target = self.to_assign_target(left)?;
            let value = self.parse_assignment_value()?;
            let span = value.span;
            return Ok(Expr::new(
                ExprKind::OpAssign {
                    target,
                    op,
                    value: Box::new(value),
                },
                span,
            ));
        }
        Ok(left)
    }

    /// Right-hand side of `=`; `a = 1, 2` builds an array and
    /// `a = b rescue c` rescues only the value.
    fn parse_assignment_value(&mut self) -> Result<Expr, Diagnostic> {
        let value = if self.check(TokenKind::Star) {
            let star = self.advance().span;
            let inner = self.parse_ternary()?;
            let span = star.to(inner.span);
            Expr::new(
                ExprKind::Array(vec![Expr::new(ExprKind::Splat(Box::new(inner)), span)]),
                span,
            )
        } else {
            self.parse_expr()?
        };
        Ok(value)
    }

    pub(super) fn parse_ternary(&mut self) -> Result<Expr, Diagnostic> {
        let condition = self.parse_range()?;
        if !self.check(TokenKind::Question) {
            return Ok(condition);
        }
        self.advance();
        self.skip_newlines();
        let then_branch = self.parse_ternary()?;
        self.skip_newlines();
        if self.check(TokenKind::Label) {
            return Err(self.error(self.peek(), "expected ':' in conditional expression"));
        }
        self.consume(TokenKind::Colon, "expected ':' in conditional expression")?;
        self.skip_newlines();
        let else_branch = self.parse_ternary()?;
        let span = condition.span.to(else_branch.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ))
    }

    fn parse_range(&mut self) -> Result<Expr, Diagnostic> {
        let from = self.parse_binary(1)?;
        if self.check(TokenKind::DotDot) || self.check(TokenKind::DotDotDot) {
            let operator = self.advance();
            let exclusive = operator.kind == TokenKind::DotDotDot;
            // `1..` with nothing after it is an endless range.
            let to = if self.token_starts_value() {
                self.parse_binary(1)?
            } else {
                Expr::nil(operator.span)
            };
            let span = from.span.to(to.span);
            return Ok(Expr::new(
                ExprKind::Range {
                    from: Box::new(from),
                    to: Box::new(to),
                    exclusive,
                },
                span,
            ));
        }
        Ok(from)
    }

    fn parse_binary(&mut self, min_level: u8) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_unary()?;
        while let Some(level) = binary_precedence(&self.peek().kind) {
            if level < min_level {
                break;
            }
            let op_token = self.advance();
            let right = self.parse_binary(level + 1)?;
            let span = left.span.to(right.span);
            let kind = match op_token.kind {
                TokenKind::DoubleAmpersand => ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                TokenKind::DoublePipe => ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                ref other => match binary_op(other) {
                    Some(op) => ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    None => return Err(self.error(&op_token, "unknown operator")),
                },
            };
            left = Expr::new(kind, span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = token.span.to(operand.span);
                Ok(Expr::new(ExprKind::Not(Box::new(operand)), span))
            }
            TokenKind::Tilde | TokenKind::Plus => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = token.span.to(operand.span);
                let op = if token.kind == TokenKind::Tilde {
                    UnaryOp::BitNot
                } else {
                    UnaryOp::Plus
                };
                Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenKind::Minus => {
                self.advance();
                let next = self.peek().clone();
                let numeric = matches!(next.kind, TokenKind::Integer | TokenKind::Float);
                if numeric && !next.space_before && self.peek_next().kind != TokenKind::DoubleStar
                {
                    // `-2.abs` is a call on the literal -2.
                    self.advance();
                    let literal = negative_literal(&next).map_err(|msg| self.error(&next, msg))?;
                    let expr = Expr::new(ExprKind::Literal(literal), token.span.to(next.span));
                    return self.parse_postfix_from(expr);
                }
                let operand = self.parse_unary()?;
                let span = token.span.to(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenKind::Ampersand => {
                Err(self.error(&token, "Expected expression after &"))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, Diagnostic> {
        let base = self.parse_postfix()?;
        if self.check(TokenKind::DoubleStar) {
            self.advance();
            let exponent = self.parse_unary()?;
            let span = base.span.to(exponent.span);
            return Ok(Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Pow,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
                span,
            ));
        }
        Ok(base)
    }

    pub(super) fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let primary = self.parse_primary()?;
        self.parse_postfix_from(primary)
    }

    fn parse_postfix_from(&mut self, mut expr: Expr) -> Result<Expr, Diagnostic> {
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Dot | TokenKind::SafeNav => {
                    self.advance();
                    let safe_nav = token.kind == TokenKind::SafeNav;
                    expr = self.parse_method_call(expr, safe_nav)?;
                }
                TokenKind::ColonColon if !token.space_before || !self.peek_next().space_before => {
                    self.advance();
                    let name_token = self.advance();
                    match name_token.kind {
                        TokenKind::Constant
                            if !(self.check(TokenKind::LParen) && !self.peek().space_before) =>
                        {
                            let span = expr.span.to(name_token.span);
                            expr = Expr::new(
                                ExprKind::Const(ConstPath {
                                    scope: Some(Box::new(expr)),
                                    name: name_token.lexeme.clone(),
                                    top_level: false,
                                }),
                                span,
                            );
                        }
                        TokenKind::Constant | TokenKind::Identifier => {
                            self.current -= 1;
                            expr = self.parse_method_call(expr, false)?;
                        }
                        _ => return Err(self.error(&name_token, "expected constant or method name after '::'")),
                    }
                }
                TokenKind::LBracket if !token.space_before || !is_command_capable(&expr) => {
                    self.advance();
                    let args = self.parse_delimited_args(TokenKind::RBracket, "expected ']'")?;
                    let span = expr.span.to(self.previous().span);
                    expr = Expr::new(
                        ExprKind::Call {
                            receiver: Some(Box::new(expr)),
                            name: "[]".into(),
                            args,
                            block: None,
                            safe_nav: false,
                            vcall: false,
                        },
                        span,
                    );
                }
                TokenKind::LBrace if accepts_block(&expr) => {
                    self.advance();
                    let block = self.parse_block_literal(TokenKind::RBrace, token.span)?;
                    expr = attach_block(expr, block);
                }
                TokenKind::Keyword(Keyword::Do) if self.no_do == 0 && accepts_block(&expr) => {
                    self.advance();
                    let block = self.parse_block_literal(TokenKind::Keyword(Keyword::End), token.span)?;
                    expr = attach_block(expr, block);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_method_call(&mut self, receiver: Expr, safe_nav: bool) -> Result<Expr, Diagnostic> {
        let name_token = self.advance();
        let name = match &name_token.kind {
            TokenKind::Identifier | TokenKind::Constant => name_token.lexeme.clone(),
            TokenKind::Keyword(keyword) => keyword.as_str().to_string(),
            TokenKind::LParen => {
                // `callable.(args)` is `callable.call(args)`.
                self.current -= 1;
                "call".to_string()
            }
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::EqualEqual
            | TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEqual
            | TokenKind::GreaterEqual
            | TokenKind::Spaceship
            | TokenKind::ShiftLeft
            | TokenKind::Bang => name_token.lexeme.clone(),
            _ => return Err(self.error(&name_token, "expected method name after '.'")),
        };
        let args = if self.check(TokenKind::LParen) && !self.peek().space_before {
            self.advance();
            self.parse_delimited_args(TokenKind::RParen, "expected ')'")?
        } else if self.can_start_command_arg() {
            self.parse_command_args()?
        } else {
            Vec::new()
        };
        let span = receiver.span.to(self.previous().span);
        Ok(Expr::new(
            ExprKind::Call {
                receiver: Some(Box::new(receiver)),
                name,
                args,
                block: None,
                safe_nav,
                vcall: false,
            },
            span,
        ))
    }

    /// Whether the current token begins an unparenthesized argument list,
    /// as in `puts x` or `foo -1` (but not `foo - 1`).
    fn can_start_command_arg(&self) -> bool {
        let token = self.peek();
        if !token.space_before {
            return false;
        }
        let glued_next = !self.peek_next().space_before
            && !matches!(self.peek_next().kind, TokenKind::Newline | TokenKind::Eof);
        match &token.kind {
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
            | TokenKind::Label
            | TokenKind::Arrow
            | TokenKind::LBracket
            | TokenKind::LParen => true,
            TokenKind::Keyword(keyword) => matches!(
                keyword,
                Keyword::Nil
                    | Keyword::True
                    | Keyword::False
                    | Keyword::SelfValue
                    | Keyword::Not
                    | Keyword::Defined
                    | Keyword::Super
                    | Keyword::Yield
                    | Keyword::Case
                    | Keyword::Def
            ),
            TokenKind::Minus
            | TokenKind::Star
            | TokenKind::DoubleStar
            | TokenKind::Ampersand
            | TokenKind::ColonColon
            | TokenKind::Bang
            | TokenKind::Tilde => glued_next,
            _ => false,
        }
    }

    fn parse_command_args(&mut self) -> Result<Vec<Arg>, Diagnostic> {
        self.no_do += 1;
        let result = self.parse_command_args_inner();
        self.no_do -= 1;
        result
    }

    fn parse_command_args_inner(&mut self) -> Result<Vec<Arg>, Diagnostic> {
        let mut args = Vec::new();
        loop {
            args.push(self.parse_arg()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// Arguments up to `closer`, which is consumed. Newlines are allowed.
    pub(super) fn parse_delimited_args(
        &mut self,
        closer: TokenKind,
        message: &str,
    ) -> Result<Vec<Arg>, Diagnostic> {
        let saved = std::mem::replace(&mut self.no_do, 0);
        let result = self.parse_delimited_args_inner(closer, message);
        self.no_do = saved;
        result
    }

    fn parse_delimited_args_inner(
        &mut self,
        closer: TokenKind,
        message: &str,
    ) -> Result<Vec<Arg>, Diagnostic> {
        let mut args = Vec::new();
        self.skip_newlines();
        while !self.check(closer.clone()) {
            if self.is_at_end() {
                return Err(self.error(self.peek(), message));
            }
            args.push(self.parse_arg()?);
            self.skip_newlines();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.skip_newlines();
        self.consume(closer, message)?;
        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<Arg, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Star => {
                self.advance();
                Ok(Arg::Splat(self.parse_ternary()?))
            }
            TokenKind::DoubleStar => {
                self.advance();
                Ok(Arg::DoubleSplat(self.parse_ternary()?))
            }
            TokenKind::Ampersand => {
                self.advance();
                let next = self.peek().clone();
                if next.kind == TokenKind::Symbol {
                    self.advance();
                    return Ok(Arg::Block(Expr::new(
                        ExprKind::Literal(Literal::Symbol(next.lexeme.clone())),
                        token.span.to(next.span),
                    )));
                }
                if !self.token_starts_value() || next.kind == TokenKind::Label {
                    return Err(self.error(&next, "Expected expression after &"));
                }
                Ok(Arg::Block(self.parse_ternary()?))
            }
            TokenKind::Label => {
                self.advance();
                self.skip_newlines();
                let value = self.parse_no_statement_expr()?;
                Ok(Arg::Keyword(token.lexeme.clone(), value))
            }
            _ => {
                let value = self.parse_no_statement_expr()?;
                if self.matches(TokenKind::FatArrow) {
                    self.skip_newlines();
                    let pair_value = self.parse_no_statement_expr()?;
                    return Ok(Arg::Pair(value, pair_value));
                }
                Ok(Arg::Positional(value))
            }
        }
    }

    /// An argument expression; `not` is accepted as in `puts(not true)`.
    fn parse_no_statement_expr(&mut self) -> Result<Expr, Diagnostic> {
        if self.check_keyword(Keyword::Not) {
            let start = self.advance().span;
            let operand = self.parse_expr()?;
            let span = start.to(operand.span);
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), span));
        }
        self.parse_expr()
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.advance();
        let span = token.span;
        let kind = match &token.kind {
            TokenKind::Integer => match integer_literal(&token.lexeme) {
                Some(literal) => ExprKind::Literal(literal),
                None => return Err(self.error(&token, "invalid integer literal")),
            },
            TokenKind::Float => match token.lexeme.parse::<f64>() {
                Ok(value) => ExprKind::Literal(Literal::Float(value)),
                Err(_) => return Err(self.error(&token, "invalid float literal")),
            },
            TokenKind::String => {
                let mut parts = self.template_parts(&token)?;
                let mut span = span;
                // Adjacent literals concatenate: "a" "b".
                while self.check(TokenKind::String) {
                    let next = self.advance();
                    span = span.to(next.span);
                    parts.extend(self.template_parts(&next)?);
                }
                return Ok(string_expr(parts, span));
            }
            TokenKind::Symbol => ExprKind::Literal(Literal::Symbol(token.lexeme.clone())),
            TokenKind::DSymbol => {
                let parts = self.template_parts(&token)?;
                match plain_text(&parts) {
                    Some(text) => ExprKind::Literal(Literal::Symbol(text)),
                    None => ExprKind::InterpolatedSymbol(parts),
                }
            }
            TokenKind::Regex => ExprKind::Regex {
                parts: self.template_parts(&token)?,
                flags: token.lexeme.clone(),
            },
            TokenKind::Words | TokenKind::Symbols => {
                let symbols = token.kind == TokenKind::Symbols;
                let items = token
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        TemplatePart::Text(text) => Some(text.clone()),
                        TemplatePart::Code { .. } => None,
                    })
                    .map(|text| {
                        let literal = if symbols {
                            Literal::Symbol(text)
                        } else {
                            Literal::String(text)
                        };
                        Expr::new(ExprKind::Literal(literal), span)
                    })
                    .collect();
                ExprKind::Array(items)
            }
            TokenKind::Label => {
                return Err(self.error(&token, &format!("unexpected label '{}:'", token.lexeme)))
            }
            TokenKind::InstanceVar => ExprKind::InstanceVar(token.lexeme.clone()),
            TokenKind::ClassVar => ExprKind::ClassVar(token.lexeme.clone()),
            TokenKind::GlobalVar => ExprKind::GlobalVar(token.lexeme.clone()),
            TokenKind::Identifier => return self.parse_identifier(token),
            TokenKind::Constant => {
                if self.check(TokenKind::LParen) && !self.peek().space_before {
                    self.advance();
                    let args = self.parse_delimited_args(TokenKind::RParen, "expected ')'")?;
                    ExprKind::Call {
                        receiver: None,
                        name: token.lexeme.clone(),
                        args,
                        block: None,
                        safe_nav: false,
                        vcall: false,
                    }
                } else {
                    ExprKind::Const(ConstPath {
                        scope: None,
                        name: token.lexeme.clone(),
                        top_level: false,
                    })
                }
            }
            TokenKind::ColonColon => {
                let name = self.consume(TokenKind::Constant, "expected constant after '::'")?;
                return Ok(Expr::new(
                    ExprKind::Const(ConstPath {
                        scope: None,
                        name: name.lexeme.clone(),
                        top_level: true,
                    }),
                    span.to(name.span),
                ));
            }
            TokenKind::LParen => {
                let saved = std::mem::replace(&mut self.no_do, 0);
                let body = self.parse_statements_until(|kind| *kind == TokenKind::RParen);
                self.no_do = saved;
                let body = body?;
                self.skip_newlines();
                self.consume(TokenKind::RParen, "expected ')'")?;
                let span = span.to(self.previous().span);
                return Ok(Expr::new(body.kind, span));
            }
            TokenKind::LBracket => {
                let args = self.parse_delimited_args(TokenKind::RBracket, "expected ']'")?;
                let mut items = Vec::new();
                let mut pairs = Vec::new();
                for arg in args {
                    match arg {
                        Arg::Positional(expr) => items.push(expr),
                        Arg::Splat(expr) => {
                            let span = expr.span;
                            items.push(Expr::new(ExprKind::Splat(Box::new(expr)), span));
                        }
                        Arg::Keyword(key, value) => pairs.push(HashEntry::Pair(
                            Expr::new(ExprKind::Literal(Literal::Symbol(key)), value.span),
                            value,
                        )),
                        Arg::Pair(key, value) => pairs.push(HashEntry::Pair(key, value)),
                        Arg::DoubleSplat(expr) => pairs.push(HashEntry::DoubleSplat(expr)),
                        Arg::Block(expr) => {
                            return Err(Diagnostic::new(
                                DiagnosticKind::Syntax,
                                "block argument should not be given",
                            )
                            .with_span(expr.span))
                        }
                    }
                }
                let span = span.to(self.previous().span);
                if !pairs.is_empty() {
                    items.push(Expr::new(ExprKind::Hash(pairs), span));
                }
                return Ok(Expr::new(ExprKind::Array(items), span));
            }
            TokenKind::LBrace => return self.parse_hash(span),
            TokenKind::Arrow => return self.parse_lambda(span),
            TokenKind::Keyword(keyword) => return self.parse_keyword(*keyword, token.clone()),
            TokenKind::Eof => return Err(self.error(&token, "unexpected end of input")),
            _ => {
                return Err(self.error(
                    &token,
                    &format!("unexpected '{}'", super::describe(&token)),
                ))
            }
        };
        Ok(Expr::new(kind, span))
    }

    fn parse_keyword(&mut self, keyword: Keyword, token: Token) -> Result<Expr, Diagnostic> {
        let span = token.span;
        let kind = match keyword {
            Keyword::Nil => ExprKind::Literal(Literal::Nil),
            Keyword::True => ExprKind::Literal(Literal::Bool(true)),
            Keyword::False => ExprKind::Literal(Literal::Bool(false)),
            Keyword::SelfValue => ExprKind::SelfRef,
            Keyword::If => return self.parse_if(false),
            Keyword::Unless => return self.parse_if(true),
            Keyword::While => return self.parse_while(false),
            Keyword::Until => return self.parse_while(true),
            Keyword::For => return self.parse_for(),
            Keyword::Case => return self.parse_case(),
            Keyword::Begin => return self.parse_begin(),
            Keyword::Def => return self.parse_def(),
            Keyword::Class => return self.parse_class(),
            Keyword::Module => return self.parse_module(),
            Keyword::Alias => return self.parse_alias(),
            Keyword::Return | Keyword::Break | Keyword::Next | Keyword::Redo => {
                return self.parse_jump(keyword)
            }
            Keyword::Retry => ExprKind::Retry,
            Keyword::Not => {
                let operand = self.parse_expr()?;
                let span = span.to(operand.span);
                return Ok(Expr::new(ExprKind::Not(Box::new(operand)), span));
            }
            Keyword::Defined => {
                let operand = if self.check(TokenKind::LParen) {
                    self.advance();
                    self.skip_newlines();
                    let inner = self.parse_expression_statement()?;
                    self.skip_newlines();
                    self.consume(TokenKind::RParen, "expected ')'")?;
                    inner
                } else {
                    self.parse_unary()?
                };
                let span = span.to(self.previous().span);
                return Ok(Expr::new(ExprKind::Defined(Box::new(operand)), span));
            }
            Keyword::Yield => {
                let args = self.parse_optional_call_args()?;
                let span = span.to(self.previous().span);
                return Ok(Expr::new(ExprKind::Yield(args.unwrap_or_default()), span));
            }
            Keyword::Super => {
                let args = self.parse_optional_call_args()?;
                let span = span.to(self.previous().span);
                return Ok(Expr::new(ExprKind::Super { args, block: None }, span));
            }
            _ => {
                return Err(self.error(
                    &token,
                    &format!("unexpected keyword '{}'", keyword.as_str()),
                ))
            }
        };
        Ok(Expr::new(kind, span))
    }

    /// `(args)`, a command argument list, or nothing.
    fn parse_optional_call_args(&mut self) -> Result<Option<Vec<Arg>>, Diagnostic> {
        if self.check(TokenKind::LParen) && !self.peek().space_before {
            self.advance();
            return Ok(Some(
                self.parse_delimited_args(TokenKind::RParen, "expected ')'")?,
            ));
        }
        if self.can_start_command_arg() {
            return Ok(Some(self.parse_command_args()?));
        }
        Ok(None)
    }

    fn parse_identifier(&mut self, token: Token) -> Result<Expr, Diagnostic> {
        let name = token.lexeme.clone();
        let paren_call = self.check(TokenKind::LParen) && !self.peek().space_before;
        if self.is_local(&name) && !paren_call {
            return Ok(Expr::new(ExprKind::LocalVar(name), token.span));
        }
        let (args, vcall) = if paren_call {
            self.advance();
            (
                self.parse_delimited_args(TokenKind::RParen, "expected ')'")?,
                false,
            )
        } else if self.can_start_command_arg() {
            (self.parse_command_args()?, false)
        } else {
            (Vec::new(), !name.ends_with('?') && !name.ends_with('!'))
        };
        let span = token.span.to(self.previous().span);
        Ok(Expr::new(
            ExprKind::Call {
                receiver: None,
                name,
                args,
                block: None,
                safe_nav: false,
                vcall,
            },
            span,
        ))
    }

    fn parse_hash(&mut self, start: SourceSpan) -> Result<Expr, Diagnostic> {
        let saved = std::mem::replace(&mut self.no_do, 0);
        let entries = self.parse_hash_entries();
        self.no_do = saved;
        let entries = entries?;
        let span = start.to(self.previous().span);
        Ok(Expr::new(ExprKind::Hash(entries), span))
    }

    fn parse_hash_entries(&mut self) -> Result<Vec<HashEntry>, Diagnostic> {
        let mut entries = Vec::new();
        self.skip_newlines();
        while !self.check(TokenKind::RBrace) {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Label => {
                    self.advance();
                    self.skip_newlines();
                    let key = Expr::new(
                        ExprKind::Literal(Literal::Symbol(token.lexeme.clone())),
                        token.span,
                    );
                    entries.push(HashEntry::Pair(key, self.parse_no_statement_expr()?));
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    entries.push(HashEntry::DoubleSplat(self.parse_ternary()?));
                }
                TokenKind::String
                    if self.peek_next().kind == TokenKind::Colon
                        && !self.peek_next().space_before =>
                {
                    self.advance();
                    self.advance();
                    let parts = self.template_parts(&token)?;
                    let key = match plain_text(&parts) {
                        Some(text) => ExprKind::Literal(Literal::Symbol(text)),
                        None => ExprKind::InterpolatedSymbol(parts),
                    };
                    let key = Expr::new(key, token.span);
                    entries.push(HashEntry::Pair(key, self.parse_no_statement_expr()?));
                }
                TokenKind::Eof => return Err(self.error(&token, "expected '}'")),
                _ => {
                    let key = self.parse_no_statement_expr()?;
                    self.skip_newlines();
                    self.consume(TokenKind::FatArrow, "expected '=>' in hash literal")?;
                    self.skip_newlines();
                    entries.push(HashEntry::Pair(key, self.parse_no_statement_expr()?));
                }
            }
            self.skip_newlines();
            if !self.matches(TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.skip_newlines();
        self.consume(TokenKind::RBrace, "expected '}'")?;
        Ok(entries)
    }

    fn parse_lambda(&mut self, start: SourceSpan) -> Result<Expr, Diagnostic> {
        self.push_scope(false);
        let result = self.parse_lambda_inner(start);
        self.pop_scope();
        result
    }

    fn parse_lambda_inner(&mut self, start: SourceSpan) -> Result<Expr, Diagnostic> {
        let params = if self.check(TokenKind::LParen) {
            self.advance();
            self.parse_param_list(TokenKind::RParen)?
        } else if self.check(TokenKind::Identifier) || self.check(TokenKind::Star) {
            self.parse_param_list(TokenKind::LBrace)?
        } else {
            ParamList::default()
        };
        let closer = if self.matches(TokenKind::LBrace) {
            TokenKind::RBrace
        } else if self.matches_keyword(Keyword::Do) {
            TokenKind::Keyword(Keyword::End)
        } else {
            return Err(self.error(self.peek(), "stabby lambda requires a block"));
        };
        let body = self.parse_block_body(closer)?;
        let span = start.to(self.previous().span);
        Ok(Expr::new(
            ExprKind::Lambda(Rc::new(BlockLiteral {
                params,
                body,
                is_lambda: true,
                span,
            })),
            span,
        ))
    }

    /// Parses `|params| body closer` after the opening `{` or `do`.
    fn parse_block_literal(
        &mut self,
        closer: TokenKind,
        start: SourceSpan,
    ) -> Result<Rc<BlockLiteral>, Diagnostic> {
        self.push_scope(false);
        let result = self.parse_block_literal_inner(closer, start);
        self.pop_scope();
        result
    }

    fn parse_block_literal_inner(
        &mut self,
        closer: TokenKind,
        start: SourceSpan,
    ) -> Result<Rc<BlockLiteral>, Diagnostic> {
        self.skip_newlines();
        let params = if self.matches(TokenKind::Pipe) {
            self.parse_param_list(TokenKind::Pipe)?
        } else {
            self.matches(TokenKind::DoublePipe);
            ParamList::default()
        };
        let body = self.parse_block_body(closer)?;
        let span = start.to(self.previous().span);
        Ok(Rc::new(BlockLiteral {
            params,
            body,
            is_lambda: false,
            span,
        }))
    }

    fn parse_block_body(&mut self, closer: TokenKind) -> Result<Expr, Diagnostic> {
        let saved_no_do = std::mem::replace(&mut self.no_do, 0);
        self.loop_depth += 1;
        let body = if closer == TokenKind::RBrace {
            self.parse_statements_until(|kind| *kind == TokenKind::RBrace)
        } else {
            self.parse_rescue_body()
        };
        self.loop_depth -= 1;
        self.no_do = saved_no_do;
        let body = body?;
        if closer == TokenKind::RBrace {
            self.consume(TokenKind::RBrace, "expected '}'")?;
        } else {
            self.consume_keyword(Keyword::End)?;
        }
        Ok(body)
    }

    /// Parses a parameter list up to `closer`. `)` and `|` are consumed;
    /// for a newline-terminated `def` list the terminator is left in place.
    pub(super) fn parse_param_list(&mut self, closer: TokenKind) -> Result<ParamList, Diagnostic> {
        let mut params = ParamList::default();
        let delimited = matches!(closer, TokenKind::RParen | TokenKind::Pipe);
        let closing_message = match closer {
            TokenKind::Pipe => "expected '|'",
            _ => "expected ')'",
        };
        let at_close = |parser: &Parser<'o>| {
            if delimited {
                parser.check(closer.clone())
            } else {
                parser.check_terminator() || parser.check(closer.clone())
                    || parser.check_keyword(Keyword::Do)
            }
        };
        if delimited {
            self.skip_newlines();
        }
        while !at_close(self) {
            let token = self.advance();
            match token.kind {
                TokenKind::Identifier => {
                    let name = token.lexeme.clone();
                    self.declare(&name);
                    if self.matches(TokenKind::Assign) {
                        let default = if closer == TokenKind::Pipe {
                            self.parse_binary(ABOVE_PIPE)?
                        } else {
                            self.parse_ternary()?
                        };
                        params.optional.push((name, default));
                    } else if params.rest.is_some() || !params.optional.is_empty() {
                        params.post.push(ParamTarget::Name(name));
                    } else {
                        params.required.push(ParamTarget::Name(name));
                    }
                }
                TokenKind::LParen => {
                    let mut names = Vec::new();
                    loop {
                        let inner = self.consume(TokenKind::Identifier, "expected parameter name")?;
                        self.declare(&inner.lexeme);
                        names.push(inner.lexeme.clone());
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.consume(TokenKind::RParen, "expected ')'")?;
                    let target = ParamTarget::Nested(names);
                    if params.rest.is_some() {
                        params.post.push(target);
                    } else {
                        params.required.push(target);
                    }
                }
                TokenKind::Star => {
                    let name = if self.check(TokenKind::Identifier) {
                        self.advance().lexeme
                    } else {
                        "*".to_string()
                    };
                    self.declare(&name);
                    params.rest = Some(name);
                }
                TokenKind::DoubleStar => {
                    let name = if self.check(TokenKind::Identifier) {
                        self.advance().lexeme
                    } else {
                        "**".to_string()
                    };
                    self.declare(&name);
                    params.kwrest = Some(name);
                }
                TokenKind::Ampersand => {
                    let name = if self.check(TokenKind::Identifier) {
                        self.advance().lexeme
                    } else {
                        "&".to_string()
                    };
                    self.declare(&name);
                    params.block = Some(name);
                }
                TokenKind::Label => {
                    let name = token.lexeme.clone();
                    self.declare(&name);
                    let has_default = !(self.check(TokenKind::Comma) || at_close(self))
                        && !self.check(TokenKind::Newline);
                    let default = if has_default {
                        Some(if closer == TokenKind::Pipe {
                            self.parse_binary(ABOVE_PIPE)?
                        } else {
                            self.parse_ternary()?
                        })
                    } else {
                        None
                    };
                    params.keywords.push((name, default));
                }
                _ => return Err(self.error(&token, closing_message)),
            }
            if delimited {
                self.skip_newlines();
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
            if delimited {
                self.skip_newlines();
            }
        }
        if delimited {
            self.consume(closer, closing_message)?;
        }
        Ok(params)
    }

    fn template_parts(&mut self, token: &Token) -> Result<Vec<StringPart>, Diagnostic> {
        let mut parts = Vec::with_capacity(token.parts.len());
        for part in &token.parts {
            match part {
                TemplatePart::Text(text) => parts.push(StringPart::Text(text.clone())),
                TemplatePart::Code { source, offset } => {
                    parts.push(StringPart::Code(self.parse_interpolation(source, *offset)?))
                }
            }
        }
        Ok(parts)
    }
}

/// `i64` when it fits, then `i128`, then the nearest Float.
fn integer_literal(text: &str) -> Option<Literal> {
    if let Ok(value) = text.parse::<i64>() {
        return Some(Literal::Int(value));
    }
    if let Ok(value) = text.parse::<i128>() {
        return Some(Literal::BigInt(value));
    }
    text.parse::<f64>().ok().filter(|value| value.is_finite()).map(Literal::Float)
}

fn negative_literal(token: &Token) -> Result<Literal, &'static str> {
    match token.kind {
        TokenKind::Integer => integer_literal(&format!("-{}", token.lexeme)).ok_or("invalid integer literal"),
        _ => token
            .lexeme
            .parse::<f64>()
            .map(|value| Literal::Float(-value))
            .map_err(|_| "invalid float literal"),
    }
}

fn plain_text(parts: &[StringPart]) -> Option<String> {
    let mut text = String::new();
    for part in parts {
        match part {
            StringPart::Text(chunk) => text.push_str(chunk),
            StringPart::Code(_) => return None,
        }
    }
    Some(text)
}

fn string_expr(parts: Vec<StringPart>, span: SourceSpan) -> Expr {
    match plain_text(&parts) {
        Some(text) => Expr::new(ExprKind::Literal(Literal::String(text)), span),
        None => Expr::new(ExprKind::Interpolated(parts), span),
    }
}

/// Expressions that may take a trailing `{ }` or `do end` block.
fn accepts_block(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Call { block: None, .. } | ExprKind::Super { block: None, .. }
    )
}

/// A bare method name that could still receive command arguments.
fn is_command_capable(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Call { vcall: true, .. })
}

fn attach_block(expr: Expr, literal: Rc<BlockLiteral>) -> Expr {
    let span = expr.span.to(literal.span);
    let kind = match expr.kind {
        ExprKind::Call {
            receiver,
            name,
            args,
            safe_nav,
            ..
        } => ExprKind::Call {
            receiver,
            name,
            args,
            block: Some(literal),
            safe_nav,
            vcall: false,
        },
        ExprKind::Super { args, .. } => ExprKind::Super {
            args,
            block: Some(literal),
        },
        other => other,
    };
    Expr::new(kind, span)
}
