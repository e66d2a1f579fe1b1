use crate::language::cexpr::{AExpr, AppKind, BExpr, BFun, CExpr, Ident};
use crate::language::tags::{Flatness, TagTable};
use std::collections::HashSet;

/// Marks functions whose bodies can never reach a capture point (no call,
/// method call, or construction anywhere outside nested function literals)
/// and the application sites whose callee is known to be such a function.
/// Marked sites are eligible for the cheap calling convention that skips
/// frame bookkeeping.
pub fn mark(body: &CExpr, tags: &mut TagTable) {
    mark_funs(body, tags);
    let mut flat_bound = HashSet::new();
    mark_apps(body, &mut flat_bound, tags);
}

fn each_fun<'a>(named: &'a BExpr, mut visit: impl FnMut(&'a BFun)) {
    match named {
        BExpr::Fun(f) | BExpr::AdminFun(f) => visit(f),
        BExpr::Seq(items) => {
            for item in items {
                if let BExpr::Fun(f) | BExpr::AdminFun(f) = item {
                    visit(f);
                }
            }
        }
        _ => {}
    }
}

fn mark_funs(e: &CExpr, tags: &mut TagTable) {
    match e {
        CExpr::Let { named, body, .. } => {
            each_fun(named, |f| {
                let flatness = if body_is_flat(&f.body) {
                    Flatness::Flat
                } else {
                    Flatness::NotFlat
                };
                tags.flatness.insert(f.id, flatness);
                mark_funs(&f.body, tags);
            });
            mark_funs(body, tags);
        }
        CExpr::Ite { then, els, .. } => {
            mark_funs(then, tags);
            mark_funs(els, tags);
        }
        CExpr::App { .. } => {}
    }
}

/// A body is flat when it performs no application that could suspend.
/// Administrative jumps cannot suspend; nested function literals do not
/// count against the body that merely defines them.
fn body_is_flat(e: &CExpr) -> bool {
    match e {
        CExpr::App { kind, .. } => *kind == AppKind::Admin,
        CExpr::Let { body, .. } => body_is_flat(body),
        CExpr::Ite { then, els, .. } => body_is_flat(then) && body_is_flat(els),
    }
}

fn mark_apps(e: &CExpr, flat_bound: &mut HashSet<Ident>, tags: &mut TagTable) {
    match e {
        CExpr::Let {
            name, named, body, ..
        } => {
            let mut bound_here = false;
            each_fun(named, |f| {
                if tags.is_flat_fun(f.id) {
                    bound_here = true;
                }
                mark_apps(&f.body, flat_bound, tags);
            });
            if bound_here {
                // Binder uniqueness (hygiene) makes one flat set sound.
                flat_bound.insert(name.clone());
            }
            mark_apps(body, flat_bound, tags);
        }
        CExpr::Ite { then, els, .. } => {
            mark_apps(then, flat_bound, tags);
            mark_apps(els, flat_bound, tags);
        }
        CExpr::App { id, kind, fun, .. } => {
            if matches!(kind, AppKind::Call | AppKind::Admin) {
                if let AExpr::Id(name) = fun {
                    if flat_bound.contains(name) {
                        tags.flat_apps.insert(*id);
                    }
                }
            }
        }
    }
}
