use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

pub type Ident = String;

/// Stable identity for the nodes other passes attach tags to
/// (function literals and application sites).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LetKind {
    Const,
    Let,
    Var,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op1 {
    Neg,
    Not,
    Typeof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op2 {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
}

/// Atomic expressions: value-producing, no control effect.
#[derive(Clone, Debug, PartialEq)]
pub enum AExpr {
    Bool(bool),
    Num(f64),
    Str(String),
    Undefined,
    This,
    Id(Ident),
    Un { op: Op1, expr: Rc<AExpr> },
    Bin { op: Op2, left: Rc<AExpr>, right: Rc<AExpr> },
}

impl AExpr {
    pub fn id(name: impl Into<Ident>) -> AExpr {
        AExpr::Id(name.into())
    }
}

/// Assignment targets.
#[derive(Clone, Debug, PartialEq)]
pub enum LValue {
    Id(Ident),
    Prop { object: AExpr, property: Ident },
}

/// Basic (flat) expressions: atomics plus single-step effects.
/// Still no internal control flow.
#[derive(Clone, Debug, PartialEq)]
pub enum BExpr {
    Atom(AExpr),
    Assign { target: LValue, value: AExpr },
    Obj(Vec<(Ident, AExpr)>),
    Arr(Vec<AExpr>),
    Get { object: AExpr, property: Ident },
    IncrDecr { target: LValue, delta: f64 },
    Seq(Vec<BExpr>),
    /// Source-level function literal; subject to hoisting.
    Fun(BFun),
    /// Administrative function introduced by normalization (continuations
    /// and join points); never hoisted.
    AdminFun(BFun),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BFun {
    pub id: NodeId,
    pub name: Option<Ident>,
    pub params: Vec<Ident>,
    pub body: Rc<CExpr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppKind {
    /// Ordinary application `f(k, args...)`.
    Call,
    /// Method-style application: `args[1]` is the receiver.
    Apply,
    /// Administrative jump to a continuation or join point.
    Admin,
    /// Constructor invocation, routed through the runtime's `handle_new`.
    New,
}

/// Complex expressions: the control-affecting tier. Every chain of `Let`s
/// evaluates strictly top to bottom and terminates in an application or a
/// branch whose arms are applications.
#[derive(Clone, Debug, PartialEq)]
pub enum CExpr {
    App {
        id: NodeId,
        kind: AppKind,
        fun: AExpr,
        args: Vec<AExpr>,
    },
    Let {
        kind: LetKind,
        name: Ident,
        named: BExpr,
        body: Rc<CExpr>,
    },
    Ite {
        cond: AExpr,
        then: Rc<CExpr>,
        els: Rc<CExpr>,
    },
}

/// Free variables of a function literal: identifiers referenced in its body
/// that neither its parameters nor any binding inside the body introduce.
pub fn free_vars(fun: &BFun) -> BTreeSet<Ident> {
    let mut bound: Vec<Ident> = fun.params.clone();
    if let Some(name) = &fun.name {
        bound.push(name.clone());
    }
    let mut free = BTreeSet::new();
    fv_c(&fun.body, &mut bound, &mut free);
    free
}

fn fv_a(e: &AExpr, bound: &[Ident], free: &mut BTreeSet<Ident>) {
    match e {
        AExpr::Id(name) => {
            if !bound.iter().any(|b| b == name) {
                free.insert(name.clone());
            }
        }
        AExpr::Un { expr, .. } => fv_a(expr, bound, free),
        AExpr::Bin { left, right, .. } => {
            fv_a(left, bound, free);
            fv_a(right, bound, free);
        }
        _ => {}
    }
}

fn fv_lvalue(target: &LValue, bound: &[Ident], free: &mut BTreeSet<Ident>) {
    match target {
        LValue::Id(name) => {
            if !bound.iter().any(|b| b == name) {
                free.insert(name.clone());
            }
        }
        LValue::Prop { object, .. } => fv_a(object, bound, free),
    }
}

fn fv_b(e: &BExpr, bound: &mut Vec<Ident>, free: &mut BTreeSet<Ident>) {
    match e {
        BExpr::Atom(a) => fv_a(a, bound, free),
        BExpr::Assign { target, value } => {
            fv_lvalue(target, bound, free);
            fv_a(value, bound, free);
        }
        BExpr::Obj(props) => {
            for (_, value) in props {
                fv_a(value, bound, free);
            }
        }
        BExpr::Arr(items) => {
            for item in items {
                fv_a(item, bound, free);
            }
        }
        BExpr::Get { object, .. } => fv_a(object, bound, free),
        BExpr::IncrDecr { target, .. } => fv_lvalue(target, bound, free),
        BExpr::Seq(items) => {
            for item in items {
                fv_b(item, bound, free);
            }
        }
        BExpr::Fun(f) | BExpr::AdminFun(f) => {
            let depth = bound.len();
            bound.extend(f.params.iter().cloned());
            if let Some(name) = &f.name {
                bound.push(name.clone());
            }
            fv_c(&f.body, bound, free);
            bound.truncate(depth);
        }
    }
}

fn fv_c(e: &CExpr, bound: &mut Vec<Ident>, free: &mut BTreeSet<Ident>) {
    match e {
        CExpr::App { fun, args, .. } => {
            fv_a(fun, bound, free);
            for arg in args {
                fv_a(arg, bound, free);
            }
        }
        CExpr::Let {
            name, named, body, ..
        } => {
            fv_b(named, bound, free);
            bound.push(name.clone());
            fv_c(body, bound, free);
            bound.pop();
        }
        CExpr::Ite { cond, then, els } => {
            fv_a(cond, bound, free);
            fv_c(then, bound, free);
            fv_c(els, bound, free);
        }
    }
}

impl Op1 {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op1::Neg => "-",
            Op1::Not => "!",
            Op1::Typeof => "typeof ",
        }
    }
}

impl Op2 {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op2::Add => "+",
            Op2::Sub => "-",
            Op2::Mul => "*",
            Op2::Div => "/",
            Op2::Mod => "%",
            Op2::Lt => "<",
            Op2::LtEq => "<=",
            Op2::Gt => ">",
            Op2::GtEq => ">=",
            Op2::Eq => "==",
            Op2::NotEq => "!=",
            Op2::And => "&&",
            Op2::Or => "||",
        }
    }
}

impl LetKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            LetKind::Const => "const",
            LetKind::Let => "let",
            LetKind::Var => "var",
        }
    }
}

impl fmt::Display for AExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AExpr::Bool(b) => write!(f, "{b}"),
            AExpr::Num(n) => write!(f, "{n}"),
            AExpr::Str(s) => write!(f, "{s:?}"),
            AExpr::Undefined => write!(f, "undefined"),
            AExpr::This => write!(f, "this"),
            AExpr::Id(name) => write!(f, "{name}"),
            AExpr::Un { op, expr } => write!(f, "{}{}", op.symbol(), expr),
            AExpr::Bin { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

impl fmt::Display for LValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Id(name) => write!(f, "{name}"),
            LValue::Prop { object, property } => write!(f, "{object}.{property}"),
        }
    }
}

impl fmt::Display for BExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BExpr::Atom(a) => write!(f, "{a}"),
            BExpr::Assign { target, value } => write!(f, "{target} = {value}"),
            BExpr::Obj(props) => {
                write!(f, "{{")?;
                for (idx, (name, value)) in props.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            BExpr::Arr(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            BExpr::Get { object, property } => write!(f, "{object}.{property}"),
            BExpr::IncrDecr { target, delta } => {
                if *delta >= 0.0 {
                    write!(f, "{target}++")
                } else {
                    write!(f, "{target}--")
                }
            }
            BExpr::Seq(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            BExpr::Fun(fun) => write_fun(f, "function", fun),
            BExpr::AdminFun(fun) => write_fun(f, "function*", fun),
        }
    }
}

fn write_fun(f: &mut fmt::Formatter<'_>, keyword: &str, fun: &BFun) -> fmt::Result {
    write!(f, "{keyword} ")?;
    if let Some(name) = &fun.name {
        write!(f, "{name}")?;
    }
    write!(f, "({})", fun.params.join(", "))?;
    write!(f, " {{ {} }}", fun.body)
}

impl fmt::Display for CExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CExpr::App { kind, fun, args, .. } => {
                if *kind == AppKind::New {
                    write!(f, "new ")?;
                }
                write!(f, "{fun}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            CExpr::Let {
                kind, name, named, body,
            } => {
                write!(f, "{} {name} = {named};\n{body}", kind.keyword())
            }
            CExpr::Ite { cond, then, els } => {
                write!(f, "if ({cond}) {{\n{then}\n}} else {{\n{els}\n}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fun(id: u32, params: &[&str], body: CExpr) -> BFun {
        BFun {
            id: NodeId(id),
            name: None,
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Rc::new(body),
        }
    }

    #[test]
    fn free_vars_sees_through_lets() {
        // function(x) { const y = x + z; k(y) }
        let body = CExpr::Let {
            kind: LetKind::Const,
            name: "y".to_string(),
            named: BExpr::Atom(AExpr::Bin {
                op: Op2::Add,
                left: Rc::new(AExpr::id("x")),
                right: Rc::new(AExpr::id("z")),
            }),
            body: Rc::new(CExpr::App {
                id: NodeId(0),
                kind: AppKind::Admin,
                fun: AExpr::id("k"),
                args: vec![AExpr::id("y")],
            }),
        };
        let free = free_vars(&fun(1, &["x"], body));
        let names: Vec<_> = free.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["k", "z"]);
    }

    #[test]
    fn free_vars_exclude_nested_params() {
        // function() { const g = function(a) { h(a) }; g(1) }
        let inner = fun(
            2,
            &["a"],
            CExpr::App {
                id: NodeId(3),
                kind: AppKind::Call,
                fun: AExpr::id("h"),
                args: vec![AExpr::id("a")],
            },
        );
        let body = CExpr::Let {
            kind: LetKind::Const,
            name: "g".to_string(),
            named: BExpr::Fun(inner),
            body: Rc::new(CExpr::App {
                id: NodeId(4),
                kind: AppKind::Call,
                fun: AExpr::id("g"),
                args: vec![AExpr::Num(1.0)],
            }),
        };
        let free = free_vars(&fun(5, &[], body));
        let names: Vec<_> = free.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["h"]);
    }
}
