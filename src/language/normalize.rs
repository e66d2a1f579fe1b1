use crate::language::ast::{Expr, Program, Stmt};
use crate::language::cexpr::{AExpr, AppKind, BExpr, BFun, CExpr, Ident, LValue, LetKind};
use crate::language::cps::{all, ret, Staged};
use crate::language::fresh::FreshIds;
use crate::language::span::{LineMap, Span};
use crate::language::tags::TagTable;
use std::cell::RefCell;
use std::rc::Rc;

/// The continuation the runtime hands the whole program; the lowered tree
/// jumps to it with the program's final value.
pub const DONE_K: &str = "$onDone";

/// Lowers the surface tree into the three-tier IR. Every call site gets an
/// explicit continuation: the continuation of `let x = f(y); rest` becomes
/// an administrative function binding `x` over the lowered `rest`, passed
/// to `f` as its first argument. Branches rejoin through administrative
/// join points, so control flow is fully explicit in the output tree.
pub fn lower(
    program: &Program,
    fresh: &Rc<RefCell<FreshIds>>,
    tags: &Rc<RefCell<TagTable>>,
    lines: &Rc<LineMap>,
) -> CExpr {
    let lower = Lower {
        fresh: fresh.clone(),
        tags: tags.clone(),
        lines: lines.clone(),
    };
    lower.stmts(&program.body, &DONE_K.to_string())
}

#[derive(Clone)]
struct Lower {
    fresh: Rc<RefCell<FreshIds>>,
    tags: Rc<RefCell<TagTable>>,
    lines: Rc<LineMap>,
}

#[derive(Clone, Copy)]
enum CallKind {
    Fun,
    Ctor,
}

impl Lower {
    fn fresh_name(&self, hint: &str) -> Ident {
        self.fresh.borrow_mut().fresh(hint)
    }

    fn node_id(&self) -> crate::language::cexpr::NodeId {
        self.fresh.borrow_mut().node_id()
    }

    fn jump(&self, k: &Ident, value: AExpr) -> CExpr {
        CExpr::App {
            id: self.node_id(),
            kind: AppKind::Admin,
            fun: AExpr::Id(k.clone()),
            args: vec![value],
        }
    }

    fn stmts(&self, stmts: &[Stmt], k: &Ident) -> CExpr {
        let Some((stmt, rest)) = stmts.split_first() else {
            return self.jump(k, AExpr::Undefined);
        };
        match stmt {
            Stmt::Decl {
                kind, name, value, ..
            } => self.decl(*kind, name, value, rest, k),
            Stmt::Expr { expr, .. } => match expr {
                Expr::Call { callee, args, span } => {
                    let rest_c = self.stmts(rest, k);
                    let binder = self.fresh_name("$e");
                    self.lower_call(
                        CallKind::Fun,
                        (**callee).clone(),
                        args.clone(),
                        *span,
                        binder,
                        rest_c,
                    )
                }
                Expr::New { callee, args, span } => {
                    let rest_c = self.stmts(rest, k);
                    let binder = self.fresh_name("$e");
                    self.lower_call(
                        CallKind::Ctor,
                        (**callee).clone(),
                        args.clone(),
                        *span,
                        binder,
                        rest_c,
                    )
                }
                other => {
                    let rest_c = self.stmts(rest, k);
                    let binder = self.fresh_name("$e");
                    self.to_basic(other.clone()).finish(move |named| CExpr::Let {
                        kind: LetKind::Const,
                        name: binder,
                        named,
                        body: Rc::new(rest_c),
                    })
                }
            },
            Stmt::If {
                cond, then, els, ..
            } => self.if_stmt(cond, then, els, rest, k),
            Stmt::Return { value, .. } => {
                // Anything after a return is unreachable and dropped.
                match value {
                    Some(value) => {
                        let me = self.clone();
                        let k = k.clone();
                        self.atomize(value.clone())
                            .finish(move |a| me.jump(&k, a))
                    }
                    None => self.jump(k, AExpr::Undefined),
                }
            }
        }
    }

    fn decl(
        &self,
        kind: LetKind,
        name: &Ident,
        value: &Expr,
        rest: &[Stmt],
        k: &Ident,
    ) -> CExpr {
        match value {
            Expr::Function {
                name: fun_name,
                params,
                body,
                ..
            } => {
                let f = self.function(
                    fun_name.clone(),
                    params.clone(),
                    body.clone(),
                );
                CExpr::Let {
                    kind,
                    name: name.clone(),
                    named: BExpr::Fun(f),
                    body: Rc::new(self.stmts(rest, k)),
                }
            }
            Expr::Call { callee, args, span } => {
                let rest_c = self.stmts(rest, k);
                self.lower_call(
                    CallKind::Fun,
                    (**callee).clone(),
                    args.clone(),
                    *span,
                    name.clone(),
                    rest_c,
                )
            }
            Expr::New { callee, args, span } => {
                let rest_c = self.stmts(rest, k);
                self.lower_call(
                    CallKind::Ctor,
                    (**callee).clone(),
                    args.clone(),
                    *span,
                    name.clone(),
                    rest_c,
                )
            }
            other => {
                let rest_c = self.stmts(rest, k);
                let name = name.clone();
                self.to_basic(other.clone()).finish(move |named| CExpr::Let {
                    kind,
                    name,
                    named,
                    body: Rc::new(rest_c),
                })
            }
        }
    }

    fn if_stmt(
        &self,
        cond: &Expr,
        then: &[Stmt],
        els: &[Stmt],
        rest: &[Stmt],
        k: &Ident,
    ) -> CExpr {
        let me = self.clone();
        let then = then.to_vec();
        let els = els.to_vec();
        if rest.is_empty() {
            let k = k.clone();
            self.atomize(cond.clone()).finish(move |cond| CExpr::Ite {
                cond,
                then: Rc::new(me.stmts(&then, &k)),
                els: Rc::new(me.stmts(&els, &k)),
            })
        } else {
            // Both arms rejoin through one administrative join point, so
            // the statements after the `if` are lowered exactly once.
            let join = self.fresh_name("$j");
            let joined = BExpr::AdminFun(BFun {
                id: self.node_id(),
                name: None,
                params: vec![self.fresh_name("$x")],
                body: Rc::new(self.stmts(rest, k)),
            });
            self.atomize(cond.clone()).finish(move |cond| CExpr::Let {
                kind: LetKind::Const,
                name: join.clone(),
                named: joined,
                body: Rc::new(CExpr::Ite {
                    cond,
                    then: Rc::new(me.stmts(&then, &join)),
                    els: Rc::new(me.stmts(&els, &join)),
                }),
            })
        }
    }

    /// Rewrites one call or construction. `binder` receives the result in
    /// `rest`; the continuation becomes an administrative function passed
    /// as the callee's first argument.
    fn lower_call(
        &self,
        call: CallKind,
        callee: Expr,
        args: Vec<Expr>,
        span: Span,
        binder: Ident,
        rest: CExpr,
    ) -> CExpr {
        let kid = self.fresh_name("$k");
        let cont = BExpr::AdminFun(BFun {
            id: self.node_id(),
            name: None,
            params: vec![binder],
            body: Rc::new(rest),
        });
        let app_id = self.node_id();
        self.tags
            .borrow_mut()
            .lines
            .insert(app_id, self.lines.line(span.start));

        let k_ref = AExpr::Id(kid.clone());
        let staged: Staged<CExpr> = match (call, callee) {
            (
                CallKind::Fun,
                Expr::Member {
                    object, property, ..
                },
            ) => {
                let me = self.clone();
                self.atomize(*object).bind(move |obj| {
                    let me2 = me.clone();
                    all(args.into_iter().map(|arg| me.atomize(arg)).collect()).bind(
                        move |args| {
                            let obj2 = obj.clone();
                            me2.bind_basic(BExpr::Get {
                                object: obj,
                                property,
                            })
                            .map(move |method| {
                                let mut full = vec![k_ref, obj2];
                                full.extend(args);
                                CExpr::App {
                                    id: app_id,
                                    kind: AppKind::Apply,
                                    fun: method,
                                    args: full,
                                }
                            })
                        },
                    )
                })
            }
            (call, callee) => {
                let me = self.clone();
                let kind = match call {
                    CallKind::Fun => AppKind::Call,
                    CallKind::Ctor => AppKind::New,
                };
                self.atomize(callee).bind(move |fun| {
                    all(args.into_iter().map(|arg| me.atomize(arg)).collect()).map(
                        move |args| {
                            let mut full = vec![k_ref];
                            full.extend(args);
                            CExpr::App {
                                id: app_id,
                                kind,
                                fun,
                                args: full,
                            }
                        },
                    )
                })
            }
        };
        staged.finish(move |app| CExpr::Let {
            kind: LetKind::Const,
            name: kid,
            named: cont,
            body: Rc::new(app),
        })
    }

    /// Rewrites a function literal: a fresh continuation parameter is
    /// prepended and the body is lowered against it.
    fn function(&self, name: Option<Ident>, params: Vec<Ident>, body: Vec<Stmt>) -> BFun {
        let id = self.node_id();
        let kid = self.fresh_name("$k");
        {
            let mut tags = self.tags.borrow_mut();
            tags.k_args.insert(id, kid.clone());
            tags.transformed.insert(id);
        }
        let mut full_params = vec![kid.clone()];
        full_params.extend(params);
        let body_c = self.stmts(&body, &kid);
        BFun {
            id,
            name,
            params: full_params,
            body: Rc::new(body_c),
        }
    }

    /// Stages an expression down to a Basic expression, without forcing a
    /// temporary for the outermost step.
    fn to_basic(&self, expr: Expr) -> Staged<BExpr> {
        match expr {
            Expr::Function {
                name, params, body, ..
            } => ret(BExpr::Fun(self.function(name, params, body))),
            Expr::Assign { target, value, .. } => {
                let me = self.clone();
                self.lvalue(*target).bind(move |target| {
                    me.atomize(*value)
                        .map(move |value| BExpr::Assign { target, value })
                })
            }
            Expr::IncrDecr { target, delta, .. } => self
                .lvalue(*target)
                .map(move |target| BExpr::IncrDecr { target, delta }),
            Expr::Member {
                object, property, ..
            } => self.atomize(*object).map(move |object| BExpr::Get {
                object,
                property,
            }),
            Expr::Array(items, _) => {
                let me = self.clone();
                all(items.into_iter().map(move |item| me.atomize(item)).collect())
                    .map(BExpr::Arr)
            }
            Expr::Object(props, _) => {
                let me = self.clone();
                all(props
                    .into_iter()
                    .map(move |(name, value)| {
                        me.atomize(value).map(move |value| (name, value))
                    })
                    .collect())
                .map(BExpr::Obj)
            }
            other => self.atomize(other).map(BExpr::Atom),
        }
    }

    /// Stages an expression all the way down to an atom, let-binding
    /// whatever intermediate steps require it.
    fn atomize(&self, expr: Expr) -> Staged<AExpr> {
        match expr {
            Expr::Bool(b, _) => ret(AExpr::Bool(b)),
            Expr::Num(n, _) => ret(AExpr::Num(n)),
            Expr::Str(s, _) => ret(AExpr::Str(s)),
            Expr::Undefined(_) => ret(AExpr::Undefined),
            Expr::This(_) => ret(AExpr::This),
            Expr::Id(name, _) => ret(AExpr::Id(name)),
            Expr::Unary { op, expr, .. } => self
                .atomize(*expr)
                .map(move |a| AExpr::Un {
                    op,
                    expr: Rc::new(a),
                }),
            Expr::Binary {
                op, left, right, ..
            } => {
                let me = self.clone();
                self.atomize(*left).bind(move |left| {
                    me.atomize(*right).map(move |right| AExpr::Bin {
                        op,
                        left: Rc::new(left),
                        right: Rc::new(right),
                    })
                })
            }
            Expr::Call { callee, args, span } => {
                self.staged_result(CallKind::Fun, *callee, args, span)
            }
            Expr::New { callee, args, span } => {
                self.staged_result(CallKind::Ctor, *callee, args, span)
            }
            other => {
                let me = self.clone();
                self.to_basic(other)
                    .bind(move |b| match b {
                        BExpr::Atom(a) => ret(a),
                        b => me.bind_basic(b),
                    })
            }
        }
    }

    /// A call in expression position: its result flows through a fresh
    /// binder in the administrative continuation.
    fn staged_result(
        &self,
        call: CallKind,
        callee: Expr,
        args: Vec<Expr>,
        span: Span,
    ) -> Staged<AExpr> {
        let me = self.clone();
        Staged::new(move |k| {
            let result = me.fresh_name("$r");
            let rest = k(AExpr::Id(result.clone()));
            me.lower_call(call, callee, args, span, result, rest)
        })
    }

    /// Let-binds a Basic expression to a fresh temporary.
    fn bind_basic(&self, named: BExpr) -> Staged<AExpr> {
        let me = self.clone();
        Staged::new(move |k| {
            let name = me.fresh_name("$t");
            CExpr::Let {
                kind: LetKind::Const,
                name: name.clone(),
                named,
                body: Rc::new(k(AExpr::Id(name))),
            }
        })
    }

    fn lvalue(&self, expr: Expr) -> Staged<LValue> {
        match expr {
            Expr::Id(name, _) => ret(LValue::Id(name)),
            Expr::Member {
                object, property, ..
            } => self.atomize(*object).map(move |object| LValue::Prop {
                object,
                property,
            }),
            // The parser only produces the two shapes above as targets.
            other => ret(LValue::Id(format!("$bad_target_{}", other.span().start))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser;

    fn lower_source(source: &str) -> CExpr {
        let program = parser::parse(source).unwrap();
        let fresh = Rc::new(RefCell::new(FreshIds::new()));
        let renamed =
            crate::language::hygiene::rename_program(&program, &mut fresh.borrow_mut());
        let tags = Rc::new(RefCell::new(TagTable::new()));
        let lines = Rc::new(LineMap::new(source));
        lower(&renamed, &fresh, &tags, &lines)
    }

    fn let_chain(mut e: &CExpr) -> Vec<String> {
        let mut names = Vec::new();
        while let CExpr::Let { name, body, .. } = e {
            names.push(name.clone());
            e = body;
        }
        names
    }

    #[test]
    fn empty_program_jumps_to_done() {
        let c = lower_source("");
        match c {
            CExpr::App { kind, fun, args, .. } => {
                assert_eq!(kind, AppKind::Admin);
                assert_eq!(fun, AExpr::id(DONE_K));
                assert_eq!(args, vec![AExpr::Undefined]);
            }
            other => panic!("expected admin jump, got {other:?}"),
        }
    }

    #[test]
    fn simple_bindings_stay_lets() {
        let c = lower_source("let x = 1; let y = x + 2;");
        let names = let_chain(&c);
        assert_eq!(&names[..2], &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn call_gets_admin_continuation() {
        let c = lower_source("let r = f(1);");
        // const $k = function*($r) ...; f($k, 1)
        match &c {
            CExpr::Let { name, named, body, .. } => {
                assert!(name.starts_with("$k"));
                match named {
                    BExpr::AdminFun(cont) => assert_eq!(cont.params, vec!["r".to_string()]),
                    other => panic!("expected admin fun, got {other:?}"),
                }
                match body.as_ref() {
                    CExpr::App { kind, fun, args, .. } => {
                        assert_eq!(*kind, AppKind::Call);
                        assert_eq!(*fun, AExpr::id("f"));
                        assert_eq!(args[0], AExpr::id(name));
                        assert_eq!(args[1], AExpr::Num(1.0));
                    }
                    other => panic!("expected call, got {other:?}"),
                }
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn function_literal_gains_continuation_param() {
        let c = lower_source("let f = function(a) { return a; };");
        match &c {
            CExpr::Let { named: BExpr::Fun(f), .. } => {
                assert_eq!(f.params.len(), 2);
                assert!(f.params[0].starts_with("$k"));
                match f.body.as_ref() {
                    CExpr::App { kind, fun, .. } => {
                        assert_eq!(*kind, AppKind::Admin);
                        assert_eq!(*fun, AExpr::Id(f.params[0].clone()));
                    }
                    other => panic!("expected admin jump, got {other:?}"),
                }
            }
            other => panic!("expected function let, got {other:?}"),
        }
    }

    #[test]
    fn branches_rejoin_through_one_join_point() {
        let c = lower_source("let x = 1; if (x) { x = 2; } else { x = 3; } f(x);");
        // let x; const $j = ...; Ite(x, ..., ...)
        match &c {
            CExpr::Let { body, .. } => match body.as_ref() {
                CExpr::Let { name, named, body, .. } => {
                    assert!(name.starts_with("$j"));
                    assert!(matches!(named, BExpr::AdminFun(_)));
                    assert!(matches!(body.as_ref(), CExpr::Ite { .. }));
                }
                other => panic!("expected join let, got {other:?}"),
            },
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn tail_if_uses_enclosing_continuation() {
        let c = lower_source("let x = 1; if (x) { f(); } else { g(); }");
        match &c {
            CExpr::Let { body, .. } => assert!(matches!(body.as_ref(), CExpr::Ite { .. })),
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn method_call_binds_receiver_and_method() {
        let c = lower_source("o.m(1);");
        // const $k = ...; const $t = o.m; $t($k, o, 1)
        match &c {
            CExpr::Let { body, .. } => match body.as_ref() {
                CExpr::Let { named, body, .. } => {
                    assert!(matches!(named, BExpr::Get { .. }));
                    match body.as_ref() {
                        CExpr::App { kind, args, .. } => {
                            assert_eq!(*kind, AppKind::Apply);
                            assert_eq!(args[1], AExpr::id("o"));
                        }
                        other => panic!("expected apply, got {other:?}"),
                    }
                }
                other => panic!("expected method let, got {other:?}"),
            },
            other => panic!("expected continuation let, got {other:?}"),
        }
    }

    #[test]
    fn records_call_lines() {
        let source = "let a = 1;\nf(a);\n";
        let program = parser::parse(source).unwrap();
        let fresh = Rc::new(RefCell::new(FreshIds::new()));
        let renamed =
            crate::language::hygiene::rename_program(&program, &mut fresh.borrow_mut());
        let tags = Rc::new(RefCell::new(TagTable::new()));
        let lines = Rc::new(LineMap::new(source));
        lower(&renamed, &fresh, &tags, &lines);
        assert!(tags.borrow().lines.values().any(|line| *line == 2));
    }
}
