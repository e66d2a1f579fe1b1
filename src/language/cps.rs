use crate::language::cexpr::CExpr;

/// A staged computation: something that will produce a `T` once told what
/// Complex-expression tree to build around it. Passes use this to thread
/// "what happens to the already-built subtree" through recursive tree
/// construction without a hand-written continuation parameter at every
/// call site.
pub struct Staged<T> {
    run: Box<dyn FnOnce(StagedK<T>) -> CExpr>,
}

pub type StagedK<T> = Box<dyn FnOnce(T) -> CExpr>;

/// Lifts a plain value; the receiver gets it unchanged.
pub fn ret<T: 'static>(value: T) -> Staged<T> {
    Staged::new(move |k| k(value))
}

impl<T: 'static> Staged<T> {
    pub fn new(run: impl FnOnce(StagedK<T>) -> CExpr + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    /// Sequences left to right: the tree built by `self` encloses the tree
    /// built by the computation `f` returns.
    pub fn bind<U: 'static>(self, f: impl FnOnce(T) -> Staged<U> + 'static) -> Staged<U> {
        Staged::new(move |k| (self.run)(Box::new(move |t| (f(t).run)(k))))
    }

    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Staged<U> {
        self.bind(move |t| ret(f(t)))
    }

    /// Supplies the final receiver and builds the tree.
    pub fn finish(self, k: impl FnOnce(T) -> CExpr + 'static) -> CExpr {
        (self.run)(Box::new(k))
    }
}

/// Sequences a whole list, preserving order.
pub fn all<T: 'static>(items: Vec<Staged<T>>) -> Staged<Vec<T>> {
    items
        .into_iter()
        .fold(ret(Vec::new()), |acc: Staged<Vec<T>>, item| {
            acc.bind(move |mut values| {
                item.map(move |value| {
                    values.push(value);
                    values
                })
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::cexpr::{AExpr, AppKind, BExpr, CExpr, LetKind, NodeId};
    use std::rc::Rc;

    fn bind_temp(name: &'static str, value: f64) -> Staged<AExpr> {
        Staged::new(move |k| CExpr::Let {
            kind: LetKind::Const,
            name: name.to_string(),
            named: BExpr::Atom(AExpr::Num(value)),
            body: Rc::new(k(AExpr::id(name))),
        })
    }

    fn halt(arg: AExpr) -> CExpr {
        CExpr::App {
            id: NodeId(0),
            kind: AppKind::Admin,
            fun: AExpr::id("k"),
            args: vec![arg],
        }
    }

    #[test]
    fn ret_builds_nothing() {
        let tree = ret(AExpr::Num(1.0)).finish(halt);
        assert_eq!(tree, halt(AExpr::Num(1.0)));
    }

    #[test]
    fn bind_nests_left_to_right() {
        let staged = bind_temp("a", 1.0).bind(|a| {
            bind_temp("b", 2.0).map(move |b| AExpr::Bin {
                op: crate::language::cexpr::Op2::Add,
                left: Rc::new(a),
                right: Rc::new(b),
            })
        });
        let tree = staged.finish(halt);
        // `a`'s let must be the outermost binding.
        match tree {
            CExpr::Let { name, body, .. } => {
                assert_eq!(name, "a");
                match body.as_ref() {
                    CExpr::Let { name, .. } => assert_eq!(name, "b"),
                    other => panic!("expected inner let, got {other:?}"),
                }
            }
            other => panic!("expected outer let, got {other:?}"),
        }
    }

    #[test]
    fn all_preserves_order() {
        let staged = all(vec![bind_temp("x", 1.0), bind_temp("y", 2.0)]);
        let tree = staged.finish(|values| {
            assert_eq!(values, vec![AExpr::id("x"), AExpr::id("y")]);
            halt(AExpr::Undefined)
        });
        match tree {
            CExpr::Let { name, .. } => assert_eq!(name, "x"),
            other => panic!("expected let, got {other:?}"),
        }
    }
}
