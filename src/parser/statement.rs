use std::rc::Rc;

use crate::{
    ast::{
        AssignTarget, BeginBlock, ConstPath, Expr, ExprKind, LogicalOp, MethodDef, RescueClause,
        WhenClause,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, TokenKind},
    stack::ensure_sufficient_stack,
};

use super::Parser;

fn ends_body(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Keyword(Keyword::End)
            | TokenKind::Keyword(Keyword::Else)
            | TokenKind::Keyword(Keyword::Elsif)
            | TokenKind::Keyword(Keyword::When)
            | TokenKind::Keyword(Keyword::Rescue)
            | TokenKind::Keyword(Keyword::Ensure)
    )
}

impl<'o> Parser<'o> {
    pub(super) fn parse_statement(&mut self) -> Result<Expr, Diagnostic> {
        ensure_sufficient_stack(|| self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_expression_statement()?;
        loop {
            let start = expr.span;
            if self.matches_keyword(Keyword::If) {
                let condition = self.parse_expression_statement()?;
                let span = start.to(condition.span);
                expr = Expr::new(
                    ExprKind::If {
                        condition: Box::new(condition),
                        then_branch: Box::new(expr),
                        else_branch: None,
                    },
                    span,
                );
            } else if self.matches_keyword(Keyword::Unless) {
                let condition = self.parse_expression_statement()?;
                let span = start.to(condition.span);
                expr = Expr::new(
                    ExprKind::If {
                        condition: Box::new(condition),
                        then_branch: Box::new(Expr::nil(span)),
                        else_branch: Some(Box::new(expr)),
                    },
                    span,
                );
            } else if self.check_keyword(Keyword::While) || self.check_keyword(Keyword::Until) {
                let until = self.advance().is_keyword(Keyword::Until);
                let condition = self.parse_expression_statement()?;
                let span = start.to(condition.span);
                let do_while = matches!(expr.kind, ExprKind::Begin(_));
                expr = Expr::new(
                    ExprKind::While {
                        condition: Box::new(condition),
                        body: Box::new(expr),
                        until,
                        do_while,
                    },
                    span,
                );
            } else if self.matches_keyword(Keyword::Rescue) {
                let fallback = self.parse_expression_statement()?;
                let span = start.to(fallback.span);
                expr = Expr::new(
                    ExprKind::Begin(Box::new(BeginBlock {
                        body: expr,
                        rescues: vec![RescueClause {
                            classes: Vec::new(),
                            binding: None,
                            body: fallback,
                        }],
                        else_branch: None,
                        ensure: None,
                    })),
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// An expression including `not`, `and` and `or`, without modifiers.
    pub(super) fn parse_expression_statement(&mut self) -> Result<Expr, Diagnostic> {
        if self.starts_multiple_assignment() {
            return self.parse_multiple_assignment();
        }
        let mut left = self.parse_not_expr()?;
        loop {
            let op = if self.matches_keyword(Keyword::And) {
                LogicalOp::And
            } else if self.matches_keyword(Keyword::Or) {
                LogicalOp::Or
            } else {
                return Ok(left);
            };
            let right = self.parse_not_expr()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn parse_not_expr(&mut self) -> Result<Expr, Diagnostic> {
        if self.check_keyword(Keyword::Not) {
            let start = self.advance().span;
            let operand = self.parse_not_expr()?;
            let span = start.to(operand.span);
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), span));
        }
        self.parse_expr()
    }

    /// Statements up to (not including) a token accepted by `stop`.
    pub(super) fn parse_statements_until(
        &mut self,
        stop: impl Fn(&TokenKind) -> bool,
    ) -> Result<Expr, Diagnostic> {
        self.skip_terminators();
        let start = self.peek().span;
        let mut statements = Vec::new();
        while !stop(&self.peek().kind) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
            if !stop(&self.peek().kind) && !self.is_at_end() && !self.check_terminator() {
                return Err(self.unexpected());
            }
            self.skip_terminators();
        }
        Ok(match statements.len() {
            0 => Expr::nil(start),
            1 => statements.remove(0),
            _ => {
                let span = statements[0].span.to(statements[statements.len() - 1].span);
                Expr::new(ExprKind::Sequence(statements), span)
            }
        })
    }

    pub(super) fn parse_body(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_statements_until(ends_body)
    }

    /// A body that may carry `rescue`/`else`/`ensure` clauses, as in `begin`,
    /// `def` and `do` blocks. Stops before `end`.
    pub(super) fn parse_rescue_body(&mut self) -> Result<Expr, Diagnostic> {
        let body = self.parse_body()?;
        let start = body.span;
        let mut rescues = Vec::new();
        while self.check_keyword(Keyword::Rescue) {
            self.advance();
            let mut classes = Vec::new();
            let mut binding = None;
            if !self.check_terminator() && !self.check_keyword(Keyword::Then) {
                if !self.check(TokenKind::FatArrow) {
                    loop {
                        classes.push(self.parse_ternary()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                if self.matches(TokenKind::FatArrow) {
                    let target = self.parse_postfix()?;
                    binding = Some(self.to_assign_target(target)?);
                }
            }
            self.matches_keyword(Keyword::Then);
            let body = self.parse_body()?;
            rescues.push(RescueClause {
                classes,
                binding,
                body,
            });
        }
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(self.parse_body()?)
        } else {
            None
        };
        let ensure = if self.matches_keyword(Keyword::Ensure) {
            Some(self.parse_body()?)
        } else {
            None
        };
        if rescues.is_empty() && else_branch.is_none() && ensure.is_none() {
            return Ok(body);
        }
        let span = start.to(self.previous().span);
        Ok(Expr::new(
            ExprKind::Begin(Box::new(BeginBlock {
                body,
                rescues,
                else_branch,
                ensure,
            })),
            span,
        ))
    }

    pub(super) fn parse_if(&mut self, unless: bool) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let condition = self.parse_condition()?;
        let then_branch = self.parse_body()?;
        let else_branch = if !unless && self.check_keyword(Keyword::Elsif) {
            self.advance();
            Some(self.parse_if(false)?)
        } else if self.matches_keyword(Keyword::Else) {
            let body = self.parse_body()?;
            self.consume_keyword(Keyword::End)?;
            Some(body)
        } else {
            self.consume_keyword(Keyword::End)?;
            None
        };
        let span = start.to(self.previous().span);
        let (then_branch, else_branch) = if unless {
            let else_body = else_branch.unwrap_or_else(|| Expr::nil(span));
            (else_body, Some(then_branch))
        } else {
            (then_branch, else_branch)
        };
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            span,
        ))
    }

    fn parse_condition(&mut self) -> Result<Expr, Diagnostic> {
        self.no_do += 1;
        let condition = self.parse_expression_statement();
        self.no_do -= 1;
        let condition = condition?;
        if !self.matches_keyword(Keyword::Then) && !self.matches_keyword(Keyword::Do) {
            if !self.check_terminator() {
                return Err(self.unexpected());
            }
        }
        Ok(condition)
    }

    pub(super) fn parse_while(&mut self, until: bool) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let condition = self.parse_condition()?;
        self.loop_depth += 1;
        let body = self.parse_body();
        self.loop_depth -= 1;
        let body = body?;
        self.consume_keyword(Keyword::End)?;
        Ok(Expr::new(
            ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
                until,
                do_while: false,
            },
            start.to(self.previous().span),
        ))
    }

    pub(super) fn parse_for(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let mut targets = Vec::new();
        loop {
            targets.push(self.parse_mlhs_item()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_condition()?;
        self.loop_depth += 1;
        let body = self.parse_body();
        self.loop_depth -= 1;
        let body = body?;
        self.consume_keyword(Keyword::End)?;
        Ok(Expr::new(
            ExprKind::For {
                targets,
                iterable: Box::new(iterable),
                body: Box::new(body),
            },
            start.to(self.previous().span),
        ))
    }

    pub(super) fn parse_case(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let subject = if self.check_terminator() {
            None
        } else {
            Some(Box::new(self.parse_expression_statement()?))
        };
        self.skip_terminators();
        let mut whens = Vec::new();
        while self.matches_keyword(Keyword::When) {
            let mut patterns = Vec::new();
            loop {
                if self.check(TokenKind::Star) {
                    let star = self.advance().span;
                    let inner = self.parse_ternary()?;
                    let span = star.to(inner.span);
                    patterns.push(Expr::new(ExprKind::Splat(Box::new(inner)), span));
                } else {
                    patterns.push(self.parse_ternary()?);
                }
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            if !self.matches_keyword(Keyword::Then) && !self.check_terminator() {
                return Err(self.unexpected());
            }
            let body = self.parse_body()?;
            whens.push(WhenClause { patterns, body });
        }
        if whens.is_empty() {
            return Err(self.error(self.peek(), "case requires at least one 'when' clause"));
        }
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(Box::new(self.parse_body()?))
        } else {
            None
        };
        self.consume_keyword(Keyword::End)?;
        Ok(Expr::new(
            ExprKind::Case {
                subject,
                whens,
                else_branch,
            },
            start.to(self.previous().span),
        ))
    }

    pub(super) fn parse_begin(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        // `begin ... end while cond` is a loop, decided after the body.
        self.loop_depth += 1;
        let body = self.parse_rescue_body();
        self.loop_depth -= 1;
        let body = body?;
        self.consume_keyword(Keyword::End)?;
        let span = start.to(self.previous().span);
        let block = match body.kind {
            ExprKind::Begin(block) => block,
            _ => Box::new(BeginBlock {
                body,
                rescues: Vec::new(),
                else_branch: None,
                ensure: None,
            }),
        };
        Ok(Expr::new(ExprKind::Begin(block), span))
    }

    pub(super) fn parse_def(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let singleton = self.parse_def_receiver()?;
        let name = self.parse_def_name()?;

        self.push_scope(true);
        let saved_loop = std::mem::replace(&mut self.loop_depth, 0);
        let result = self.parse_def_rest(name, singleton, start);
        self.loop_depth = saved_loop;
        self.pop_scope();
        result
    }

    fn parse_def_rest(
        &mut self,
        name: String,
        singleton: Option<Expr>,
        start: SourceSpan,
    ) -> Result<Expr, Diagnostic> {
        let params = if self.check(TokenKind::LParen) {
            self.advance();
            self.parse_param_list(TokenKind::RParen)?
        } else if self.check_terminator() {
            Default::default()
        } else {
            self.parse_param_list(TokenKind::Newline)?
        };
        let body = self.parse_rescue_body()?;
        self.consume_keyword(Keyword::End)?;
        let span = start.to(self.previous().span);
        Ok(Expr::new(
            ExprKind::Def(Rc::new(MethodDef {
                name,
                singleton,
                params,
                body,
                span,
            })),
            span,
        ))
    }

    fn parse_def_receiver(&mut self) -> Result<Option<Expr>, Diagnostic> {
        if self.peek_next().kind != TokenKind::Dot {
            return Ok(None);
        }
        let token = self.peek().clone();
        let receiver = match &token.kind {
            TokenKind::Keyword(Keyword::SelfValue) => ExprKind::SelfRef,
            TokenKind::Constant => ExprKind::Const(ConstPath {
                scope: None,
                name: token.lexeme.clone(),
                top_level: false,
            }),
            TokenKind::Identifier if self.is_local(&token.lexeme) => {
                ExprKind::LocalVar(token.lexeme.clone())
            }
            _ => return Ok(None),
        };
        self.advance();
        self.advance();
        Ok(Some(Expr::new(receiver, token.span)))
    }

    fn parse_def_name(&mut self) -> Result<String, Diagnostic> {
        let token = self.advance();
        let mut name = match &token.kind {
            TokenKind::Identifier | TokenKind::Constant => token.lexeme.clone(),
            TokenKind::Keyword(keyword) => keyword.as_str().to_string(),
            TokenKind::LBracket => {
                self.consume(TokenKind::RBracket, "expected ']' in method name")?;
                "[]".to_string()
            }
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::DoubleStar
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::EqualEqual
            | TokenKind::CaseEqual
            | TokenKind::Match
            | TokenKind::Spaceship
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::ShiftLeft
            | TokenKind::ShiftRight
            | TokenKind::Ampersand
            | TokenKind::Pipe
            | TokenKind::Caret
            | TokenKind::Tilde
            | TokenKind::Bang
            | TokenKind::BangEqual => token.lexeme.clone(),
            _ => return Err(self.error(&token, "expected method name after 'def'")),
        };
        let setter_shaped = matches!(
            token.kind,
            TokenKind::Identifier | TokenKind::Constant | TokenKind::LBracket
        );
        if setter_shaped
            && self.check(TokenKind::Assign)
            && !self.peek().space_before
            && matches!(
                self.peek_next().kind,
                TokenKind::LParen | TokenKind::Identifier
            )
        {
            self.advance();
            name.push('=');
        }
        Ok(name)
    }

    pub(super) fn parse_class(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        if self.matches(TokenKind::ShiftLeft) {
            let target = self.parse_expr()?;
            let body = self.parse_gated_body()?;
            return Ok(Expr::new(
                ExprKind::SingletonClass {
                    target: Box::new(target),
                    body: Box::new(body),
                },
                start.to(self.previous().span),
            ));
        }
        let path = self.parse_const_path()?;
        let superclass = if self.matches(TokenKind::Less) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let body = self.parse_gated_body()?;
        Ok(Expr::new(
            ExprKind::ClassDef {
                path,
                superclass,
                body: Box::new(body),
            },
            start.to(self.previous().span),
        ))
    }

    pub(super) fn parse_module(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let path = self.parse_const_path()?;
        let body = self.parse_gated_body()?;
        Ok(Expr::new(
            ExprKind::ModuleDef {
                path,
                body: Box::new(body),
            },
            start.to(self.previous().span),
        ))
    }

    fn parse_gated_body(&mut self) -> Result<Expr, Diagnostic> {
        self.push_scope(true);
        let saved_loop = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_body();
        self.loop_depth = saved_loop;
        self.pop_scope();
        let body = body?;
        self.consume_keyword(Keyword::End)?;
        Ok(body)
    }

    fn parse_const_path(&mut self) -> Result<ConstPath, Diagnostic> {
        let top_level = self.matches(TokenKind::ColonColon);
        let first = self.consume(TokenKind::Constant, "expected constant name")?;
        let mut path = ConstPath {
            scope: None,
            name: first.lexeme.clone(),
            top_level,
        };
        let mut span = first.span;
        while self.check(TokenKind::ColonColon) {
            self.advance();
            let next = self.consume(TokenKind::Constant, "expected constant name")?;
            let scope = Expr::new(ExprKind::Const(path), span);
            span = span.to(next.span);
            path = ConstPath {
                scope: Some(Box::new(scope)),
                name: next.lexeme.clone(),
                top_level: false,
            };
        }
        Ok(path)
    }

    pub(super) fn parse_alias(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.previous().span;
        let new_name = self.parse_method_name_token()?;
        let old_name = self.parse_method_name_token()?;
        Ok(Expr::new(
            ExprKind::Alias { new_name, old_name },
            start.to(self.previous().span),
        ))
    }

    fn parse_method_name_token(&mut self) -> Result<String, Diagnostic> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Identifier | TokenKind::Constant | TokenKind::Symbol => {
                Ok(token.lexeme.clone())
            }
            TokenKind::Keyword(keyword) => Ok(keyword.as_str().to_string()),
            _ => Err(self.error(&token, "expected method name")),
        }
    }

    /// `break`, `next` and `redo` are only legal inside loops and blocks.
    pub(super) fn parse_jump(&mut self, keyword: Keyword) -> Result<Expr, Diagnostic> {
        let token = self.previous().clone();
        if self.loop_depth == 0 && keyword != Keyword::Return {
            let name = keyword.as_str();
            return Err(self.error(&token, &format!("Invalid {name}")));
        }
        if keyword == Keyword::Redo {
            return Ok(Expr::new(ExprKind::Redo, token.span));
        }
        let value = if self.token_starts_value() {
            let first = self.parse_expr()?;
            if self.check(TokenKind::Comma) {
                let mut items = vec![first];
                while self.matches(TokenKind::Comma) {
                    items.push(self.parse_expr()?);
                }
                let span = items[0].span.to(items[items.len() - 1].span);
                Some(Box::new(Expr::new(ExprKind::Array(items), span)))
            } else {
                Some(Box::new(first))
            }
        } else {
            None
        };
        let span = match &value {
            Some(value) => token.span.to(value.span),
            None => token.span,
        };
        let kind = match keyword {
            Keyword::Break => ExprKind::Break(value),
            Keyword::Next => ExprKind::Next(value),
            _ => ExprKind::Return(value),
        };
        Ok(Expr::new(kind, span))
    }

    /// Whether the current token can begin an operand for `return`, `break`
    /// and friends.
    pub(super) fn token_starts_value(&self) -> bool {
        let token = self.peek();
        match &token.kind {
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
                    | Keyword::Begin
                    | Keyword::Def
            ),
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
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::Star
            | TokenKind::ColonColon
            | TokenKind::Tilde => true,
            _ => false,
        }
    }

    // Multiple assignment.

    /// Looks ahead for `a, b = ...` / `*a, b = ...` at statement level.
    fn starts_multiple_assignment(&self) -> bool {
        let mut depth = 0usize;
        let mut saw_comma = false;
        let mut prev_atom = false;
        let first = &self.peek().kind;
        if !matches!(
            first,
            TokenKind::Identifier
                | TokenKind::InstanceVar
                | TokenKind::ClassVar
                | TokenKind::GlobalVar
                | TokenKind::Constant
                | TokenKind::Star
                | TokenKind::LParen
                | TokenKind::Keyword(Keyword::SelfValue)
        ) {
            return false;
        }
        for token in &self.tokens[self.current..] {
            if depth > 0 {
                match token.kind {
                    TokenKind::LParen | TokenKind::LBracket => depth += 1,
                    TokenKind::RParen | TokenKind::RBracket => {
                        depth -= 1;
                        prev_atom = true;
                    }
                    TokenKind::Eof => return false,
                    _ => {}
                }
                continue;
            }
            let atom = matches!(
                token.kind,
                TokenKind::Identifier
                    | TokenKind::InstanceVar
                    | TokenKind::ClassVar
                    | TokenKind::GlobalVar
                    | TokenKind::Constant
                    | TokenKind::Keyword(Keyword::SelfValue)
            );
            match token.kind {
                _ if atom => {
                    if prev_atom {
                        return false;
                    }
                    prev_atom = true;
                }
                TokenKind::Comma => {
                    saw_comma = true;
                    prev_atom = false;
                }
                TokenKind::Star | TokenKind::Dot | TokenKind::SafeNav | TokenKind::ColonColon => {
                    prev_atom = false
                }
                TokenKind::LParen | TokenKind::LBracket => {
                    depth += 1;
                    prev_atom = false;
                }
                TokenKind::Assign => return saw_comma,
                _ => return false,
            }
        }
        false
    }

    fn parse_multiple_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.peek().span;
        let mut targets = Vec::new();
        loop {
            targets.push(self.parse_mlhs_item()?);
            if !self.matches(TokenKind::Comma) || self.check(TokenKind::Assign) {
                break;
            }
        }
        self.consume(TokenKind::Assign, "expected '=' in multiple assignment")?;
        let mut values = Vec::new();
        loop {
            if self.check(TokenKind::Star) {
                let star = self.advance().span;
                let inner = self.parse_ternary()?;
                let span = star.to(inner.span);
                values.push(Expr::new(ExprKind::Splat(Box::new(inner)), span));
            } else {
                values.push(self.parse_expr()?);
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let value = if values.len() == 1 && !matches!(values[0].kind, ExprKind::Splat(_)) {
            values.remove(0)
        } else {
            let span = values[0].span.to(values[values.len() - 1].span);
            Expr::new(ExprKind::Array(values), span)
        };
        let span = start.to(value.span);
        Ok(Expr::new(
            ExprKind::MultiAssign {
                targets,
                value: Box::new(value),
            },
            span,
        ))
    }

    pub(super) fn parse_mlhs_item(&mut self) -> Result<AssignTarget, Diagnostic> {
        if self.matches(TokenKind::Star) {
            if matches!(
                self.peek().kind,
                TokenKind::Identifier | TokenKind::InstanceVar | TokenKind::GlobalVar
            ) {
                let inner = self.parse_postfix()?;
                let target = self.to_assign_target(inner)?;
                return Ok(AssignTarget::Splat(Some(Box::new(target))));
            }
            return Ok(AssignTarget::Splat(None));
        }
        if self.matches(TokenKind::LParen) {
            let mut inner = Vec::new();
            loop {
                inner.push(self.parse_mlhs_item()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RParen, "expected ')'")?;
            return Ok(AssignTarget::Nested(inner));
        }
        let expr = self.parse_postfix()?;
        self.to_assign_target(expr)
    }

    pub(super) fn to_assign_target(&mut self, expr: Expr) -> Result<AssignTarget, Diagnostic> {
        let span = expr.span;
        let target = match expr.kind {
            ExprKind::LocalVar(name) => AssignTarget::Local(name),
            ExprKind::Call {
                receiver: None,
                name,
                args,
                block: None,
                ..
            } if args.is_empty() && !name.ends_with('?') && !name.ends_with('!') => {
                self.declare(&name);
                AssignTarget::Local(name)
            }
            ExprKind::InstanceVar(name) => AssignTarget::InstanceVar(name),
            ExprKind::ClassVar(name) => AssignTarget::ClassVar(name),
            ExprKind::GlobalVar(name) => AssignTarget::GlobalVar(name),
            ExprKind::Const(path) => AssignTarget::Const {
                scope: path.scope,
                name: path.name,
            },
            ExprKind::Call {
                receiver: Some(receiver),
                name,
                args,
                block: None,
                ..
            } if name == "[]" => AssignTarget::Index { receiver, args },
            ExprKind::Call {
                receiver: Some(receiver),
                name,
                args,
                block: None,
                safe_nav,
                ..
            } if args.is_empty() => AssignTarget::Attribute {
                receiver,
                name,
                safe_nav,
            },
            ExprKind::Splat(inner) => {
                let inner = self.to_assign_target(*inner)?;
                AssignTarget::Splat(Some(Box::new(inner)))
            }
            _ => {
                return Err(
                    Diagnostic::new(DiagnosticKind::Syntax, "invalid assignment target")
                        .with_span(span),
                )
            }
        };
        Ok(target)
    }
}
