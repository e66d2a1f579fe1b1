use crate::language::cexpr::{LetKind, Op1, Op2};
use crate::language::span::Span;

#[derive(Clone, Debug)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Decl {
        kind: LetKind,
        name: String,
        value: Expr,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        els: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
}

#[derive(Clone, Debug)]
pub enum Expr {
    Bool(bool, Span),
    Num(f64, Span),
    Str(String, Span),
    Undefined(Span),
    This(Span),
    Id(String, Span),
    Unary {
        op: Op1,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: Op2,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    IncrDecr {
        target: Box<Expr>,
        delta: f64,
        span: Span,
    },
    Array(Vec<Expr>, Span),
    Object(Vec<(String, Expr)>, Span),
    Function {
        name: Option<String>,
        params: Vec<String>,
        body: Vec<Stmt>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Bool(_, span)
            | Expr::Num(_, span)
            | Expr::Str(_, span)
            | Expr::Undefined(span)
            | Expr::This(span)
            | Expr::Id(_, span)
            | Expr::Array(_, span)
            | Expr::Object(_, span) => *span,
            Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::IncrDecr { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Member { span, .. }
            | Expr::Function { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. } => *span,
        }
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }
}
