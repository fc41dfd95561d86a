use std::rc::Rc;

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    /// Integer literals past `i64`.
    BigInt(i128),
    Float(f64),
    String(String),
    Symbol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Equal,
    NotEqual,
    CaseEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Compare,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Match,
    NotMatch,
}

impl BinaryOp {
    /// Method a binary operator dispatches to. `!=` and `!~` negate `==`/`=~`.
    pub fn method_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Equal | BinaryOp::NotEqual => "==",
            BinaryOp::CaseEqual => "===",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Compare => "<=>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Match | BinaryOp::NotMatch => "=~",
        }
    }

    pub fn from_operator(op: &str) -> Option<Self> {
        let op = match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::ShiftLeft,
            ">>" => BinaryOp::ShiftRight,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    BitNot,
}

impl UnaryOp {
    pub fn method_name(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-@",
            UnaryOp::Plus => "+@",
            UnaryOp::BitNot => "~",
        }
    }
}

/// A required block or method parameter; blocks may destructure `|(a, b)|`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamTarget {
    Name(String),
    Nested(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct ParamList {
    pub required: Vec<ParamTarget>,
    pub optional: Vec<(String, Expr)>,
    /// `*rest`; an anonymous `*` binds under the name `*`.
    pub rest: Option<String>,
    /// Required parameters after the splat.
    pub post: Vec<ParamTarget>,
    /// Keyword parameters; `None` default means the keyword is required.
    pub keywords: Vec<(String, Option<Expr>)>,
    pub kwrest: Option<String>,
    pub block: Option<String>,
}

impl ParamList {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.optional.is_empty()
            && self.rest.is_none()
            && self.post.is_empty()
            && self.keywords.is_empty()
            && self.kwrest.is_none()
            && self.block.is_none()
    }

    pub fn positional_count(&self) -> usize {
        self.required.len() + self.post.len()
    }

    /// Arity in the `Proc#arity`/`Method#arity` sense.
    pub fn arity(&self) -> i64 {
        let required = self.positional_count() as i64;
        let required_keywords = self.keywords.iter().any(|(_, default)| default.is_none());
        if self.rest.is_some() || !self.optional.is_empty() {
            -(required + if required_keywords { 1 } else { 0 }) - 1
        } else if required_keywords {
            required + 1
        } else {
            required
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let push_target = |target: &ParamTarget, names: &mut Vec<String>| match target {
            ParamTarget::Name(name) => names.push(name.clone()),
            ParamTarget::Nested(inner) => names.extend(inner.iter().cloned()),
        };
        for target in &self.required {
            push_target(target, &mut names);
        }
        names.extend(self.optional.iter().map(|(name, _)| name.clone()));
        names.extend(self.rest.iter().cloned());
        for target in &self.post {
            push_target(target, &mut names);
        }
        names.extend(self.keywords.iter().map(|(name, _)| name.clone()));
        names.extend(self.kwrest.iter().cloned());
        names.extend(self.block.iter().cloned());
        names
    }
}

#[derive(Debug, Clone)]
pub enum Arg {
    Positional(Expr),
    Splat(Expr),
    /// `key: value`, collected into the trailing keyword hash.
    Keyword(String, Expr),
    /// `key => value` inside an argument list.
    Pair(Expr, Expr),
    DoubleSplat(Expr),
    /// `&expr`, including the `&:symbol` shorthand.
    Block(Expr),
}

#[derive(Debug, Clone)]
pub enum HashEntry {
    Pair(Expr, Expr),
    DoubleSplat(Expr),
}

#[derive(Debug, Clone)]
pub enum StringPart {
    Text(String),
    Code(Expr),
}

#[derive(Debug)]
pub struct BlockLiteral {
    pub params: ParamList,
    pub body: Expr,
    /// Stabby lambdas get lambda semantics for arity and `return`.
    pub is_lambda: bool,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct MethodDef {
    pub name: String,
    /// Receiver of `def self.name` / `def obj.name`.
    pub singleton: Option<Expr>,
    pub params: ParamList,
    pub body: Expr,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Local(String),
    InstanceVar(String),
    ClassVar(String),
    GlobalVar(String),
    Const {
        scope: Option<Box<Expr>>,
        name: String,
    },
    Index {
        receiver: Box<Expr>,
        args: Vec<Arg>,
    },
    Attribute {
        receiver: Box<Expr>,
        name: String,
        safe_nav: bool,
    },
    /// `*rest` inside a multiple-assignment target list.
    Splat(Option<Box<AssignTarget>>),
    Nested(Vec<AssignTarget>),
}

#[derive(Debug, Clone)]
pub struct WhenClause {
    pub patterns: Vec<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub struct RescueClause {
    pub classes: Vec<Expr>,
    pub binding: Option<AssignTarget>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub struct BeginBlock {
    pub body: Expr,
    pub rescues: Vec<RescueClause>,
    pub else_branch: Option<Expr>,
    pub ensure: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ConstPath {
    pub scope: Option<Box<Expr>>,
    pub name: String,
    pub top_level: bool,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

impl Expr {
    pub fn new(kind: ExprKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn nil(span: SourceSpan) -> Self {
        Self::new(ExprKind::Literal(Literal::Nil), span)
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Interpolated(Vec<StringPart>),
    InterpolatedSymbol(Vec<StringPart>),
    Regex {
        parts: Vec<StringPart>,
        flags: String,
    },
    Array(Vec<Expr>),
    Hash(Vec<HashEntry>),
    Range {
        from: Box<Expr>,
        to: Box<Expr>,
        exclusive: bool,
    },
    SelfRef,
    LocalVar(String),
    InstanceVar(String),
    ClassVar(String),
    GlobalVar(String),
    Const(ConstPath),
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Arg>,
        block: Option<Rc<BlockLiteral>>,
        safe_nav: bool,
        /// A bare identifier that could also have been a local variable.
        vcall: bool,
    },
    /// `super` without parentheses or arguments re-passes the current ones.
    Super {
        args: Option<Vec<Arg>>,
        block: Option<Rc<BlockLiteral>>,
    },
    Yield(Vec<Arg>),
    Not(Box<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Defined(Box<Expr>),
    Assign {
        target: AssignTarget,
        value: Box<Expr>,
    },
    /// `target op= value`; `op` is the operator without `=` (`+`, `||`, ...).
    OpAssign {
        target: AssignTarget,
        op: String,
        value: Box<Expr>,
    },
    MultiAssign {
        targets: Vec<AssignTarget>,
        value: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    While {
        condition: Box<Expr>,
        body: Box<Expr>,
        until: bool,
        /// `begin ... end while cond` runs the body before the first test.
        do_while: bool,
    },
    For {
        targets: Vec<AssignTarget>,
        iterable: Box<Expr>,
        body: Box<Expr>,
    },
    Case {
        subject: Option<Box<Expr>>,
        whens: Vec<WhenClause>,
        else_branch: Option<Box<Expr>>,
    },
    Break(Option<Box<Expr>>),
    Next(Option<Box<Expr>>),
    Redo,
    Retry,
    Return(Option<Box<Expr>>),
    Sequence(Vec<Expr>),
    Begin(Box<BeginBlock>),
    Def(Rc<MethodDef>),
    ClassDef {
        path: ConstPath,
        superclass: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    ModuleDef {
        path: ConstPath,
        body: Box<Expr>,
    },
    SingletonClass {
        target: Box<Expr>,
        body: Box<Expr>,
    },
    Lambda(Rc<BlockLiteral>),
    Alias {
        new_name: String,
        old_name: String,
    },
    Splat(Box<Expr>),
}
