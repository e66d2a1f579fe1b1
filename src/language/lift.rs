use crate::language::cexpr::{free_vars, BExpr, BFun, CExpr, Ident, LetKind};
use std::collections::HashSet;
use std::rc::Rc;

/// How far a hoisted function binding travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoistPolicy {
    /// A function's own nested function bindings are re-attached at the top
    /// of its rebuilt body; only the binding itself rises further.
    Local,
    /// Every function binding, nested ones included, rises to the outermost
    /// caller. Only scope-safe when the risen functions close over nothing
    /// bound between their definition site and the destination.
    Full,
}

/// Transient output of the hoisting recursion: a rewritten body plus the
/// function bindings that must be re-attached somewhere above it.
pub struct Lifted {
    pub body: CExpr,
    pub funs: Vec<(Ident, BFun)>,
}

/// Hoists function-bound `let`s upward, past branch nodes in particular, so
/// that every function literal ends up bound at an enclosing `let` ahead of
/// any branch it was defined under. A binding stops rising at the binder of
/// any of its free variables; everything still rising at the top is re-bound
/// there, outermost first, in discovery order.
pub fn raise_funs(expr: &CExpr, policy: HoistPolicy) -> CExpr {
    bind_funs(crec(expr, policy))
}

/// Re-folds pending bindings into nested `let`s around `body`. The first
/// discovered binding becomes the outermost `let`.
fn bind_funs(lifted: Lifted) -> CExpr {
    lifted
        .funs
        .into_iter()
        .rev()
        .fold(lifted.body, |body, (name, f)| CExpr::Let {
            kind: LetKind::Const,
            name,
            named: BExpr::Fun(f),
            body: Rc::new(body),
        })
}

fn crec(expr: &CExpr, policy: HoistPolicy) -> Lifted {
    match expr {
        CExpr::Let {
            name,
            named: BExpr::Fun(f),
            body,
            ..
        } => {
            let fun_lift = crec(&f.body, policy);
            let cont = crec(body, policy);
            match policy {
                HoistPolicy::Local => {
                    let rebuilt = BFun {
                        body: Rc::new(bind_funs(fun_lift)),
                        ..f.clone()
                    };
                    let mut funs = vec![(name.clone(), rebuilt)];
                    funs.extend(cont.funs);
                    Lifted {
                        body: cont.body,
                        funs,
                    }
                }
                HoistPolicy::Full => {
                    let rebuilt = BFun {
                        body: Rc::new(fun_lift.body),
                        ..f.clone()
                    };
                    let mut funs = vec![(name.clone(), rebuilt)];
                    funs.extend(fun_lift.funs);
                    funs.extend(cont.funs);
                    Lifted {
                        body: cont.body,
                        funs,
                    }
                }
            }
        }
        // Administrative functions and plain values stay where they are;
        // bindings rising out of the continuation stop here if they depend
        // on this binder.
        CExpr::Let {
            kind,
            name,
            named,
            body,
        } => {
            let cont = crec(body, policy);
            let (stuck, rising) = split_at_binder(name, cont.funs);
            let body = if stuck.is_empty() {
                cont.body
            } else {
                bind_funs(Lifted {
                    body: cont.body,
                    funs: stuck,
                })
            };
            Lifted {
                body: CExpr::Let {
                    kind: *kind,
                    name: name.clone(),
                    named: named.clone(),
                    body: Rc::new(body),
                },
                funs: rising,
            }
        }
        CExpr::Ite { cond, then, els } => {
            // Both branches see the identical enclosing scope, which is what
            // makes emitting their bindings past the branch node safe.
            let t = crec(then, policy);
            let f = crec(els, policy);
            let mut funs = t.funs;
            funs.extend(f.funs);
            Lifted {
                body: CExpr::Ite {
                    cond: cond.clone(),
                    then: Rc::new(t.body),
                    els: Rc::new(f.body),
                },
                funs,
            }
        }
        CExpr::App { .. } => Lifted {
            body: expr.clone(),
            funs: Vec::new(),
        },
    }
}

/// Splits rising bindings into those that must stop at `binder` (they, or a
/// binding stopping with them, reference it freely) and those that keep
/// rising.
fn split_at_binder(
    binder: &Ident,
    funs: Vec<(Ident, BFun)>,
) -> (Vec<(Ident, BFun)>, Vec<(Ident, BFun)>) {
    let mut stuck_names: HashSet<Ident> = HashSet::new();
    stuck_names.insert(binder.clone());
    let mut stuck = Vec::new();
    let mut rising = Vec::new();
    for (name, f) in funs {
        let free = free_vars(&f);
        if free.iter().any(|v| stuck_names.contains(v)) {
            stuck_names.insert(name.clone());
            stuck.push((name, f));
        } else {
            rising.push((name, f));
        }
    }
    (stuck, rising)
}
