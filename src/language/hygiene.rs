use crate::language::ast::{Expr, Program, Stmt};
use crate::language::fresh::FreshIds;
use std::collections::{HashMap, HashSet};

/// Names the renamer must leave alone: the capture primitive and the
/// ambient bindings the runtime provides to hosted programs.
pub const RESERVED: &[&str] = &["captureCC", "console", "Object", "Array"];

/// Makes every binder unique across the whole program, not just within one
/// scope chain: two sibling branches may each hoist their bindings past the
/// shared branch node later, so their names must never collide. A binder
/// keeps its source name if it is the first of that name; later duplicates
/// get a fresh suffix.
pub fn rename_program(program: &Program, fresh: &mut FreshIds) -> Program {
    let mut renamer = Renamer {
        fresh,
        scopes: vec![HashMap::new()],
        used: HashSet::new(),
    };
    Program {
        body: renamer.stmts(&program.body),
    }
}

struct Renamer<'a> {
    fresh: &'a mut FreshIds,
    scopes: Vec<HashMap<String, String>>,
    used: HashSet<String>,
}

impl Renamer<'_> {
    fn declare(&mut self, name: &str) -> String {
        let taken = RESERVED.contains(&name) || self.used.contains(name);
        let unique = if taken {
            self.fresh.fresh(name)
        } else {
            name.to_string()
        };
        self.used.insert(unique.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), unique.clone());
        }
        unique
    }

    fn lookup(&self, name: &str) -> Option<&String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    fn reference(&self, name: &str) -> String {
        // Unresolved names are globals or runtime-provided bindings.
        self.lookup(name).cloned().unwrap_or_else(|| name.to_string())
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        stmts.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Decl {
                kind,
                name,
                value,
                span,
            } => {
                // The initializer is renamed first: a declaration is not in
                // scope inside its own right-hand side (except for function
                // literals, which close over their binder by name).
                let value = self.expr(value);
                let name = self.declare(name);
                Stmt::Decl {
                    kind: *kind,
                    name,
                    value,
                    span: *span,
                }
            }
            Stmt::Expr { expr, span } => Stmt::Expr {
                expr: self.expr(expr),
                span: *span,
            },
            Stmt::If {
                cond,
                then,
                els,
                span,
            } => {
                let cond = self.expr(cond);
                self.scopes.push(HashMap::new());
                let then = self.stmts(then);
                self.scopes.pop();
                self.scopes.push(HashMap::new());
                let els = self.stmts(els);
                self.scopes.pop();
                Stmt::If {
                    cond,
                    then,
                    els,
                    span: *span,
                }
            }
            Stmt::Return { value, span } => Stmt::Return {
                value: value.as_ref().map(|v| self.expr(v)),
                span: *span,
            },
        }
    }

    fn expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Bool(..)
            | Expr::Num(..)
            | Expr::Str(..)
            | Expr::Undefined(..)
            | Expr::This(..) => expr.clone(),
            Expr::Id(name, span) => Expr::Id(self.reference(name), *span),
            Expr::Unary { op, expr, span } => Expr::Unary {
                op: *op,
                expr: Box::new(self.expr(expr)),
                span: *span,
            },
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => Expr::Binary {
                op: *op,
                left: Box::new(self.expr(left)),
                right: Box::new(self.expr(right)),
                span: *span,
            },
            Expr::Assign {
                target,
                value,
                span,
            } => Expr::Assign {
                target: Box::new(self.expr(target)),
                value: Box::new(self.expr(value)),
                span: *span,
            },
            Expr::Member {
                object,
                property,
                span,
            } => Expr::Member {
                object: Box::new(self.expr(object)),
                property: property.clone(),
                span: *span,
            },
            Expr::IncrDecr {
                target,
                delta,
                span,
            } => Expr::IncrDecr {
                target: Box::new(self.expr(target)),
                delta: *delta,
                span: *span,
            },
            Expr::Array(items, span) => {
                Expr::Array(items.iter().map(|item| self.expr(item)).collect(), *span)
            }
            Expr::Object(props, span) => Expr::Object(
                props
                    .iter()
                    .map(|(name, value)| (name.clone(), self.expr(value)))
                    .collect(),
                *span,
            ),
            Expr::Function {
                name,
                params,
                body,
                span,
            } => {
                self.scopes.push(HashMap::new());
                let name = name.as_ref().map(|n| self.declare(n));
                let params = params.iter().map(|p| self.declare(p)).collect();
                let body = self.stmts(body);
                self.scopes.pop();
                Expr::Function {
                    name,
                    params,
                    body,
                    span: *span,
                }
            }
            Expr::Call { callee, args, span } => Expr::Call {
                callee: Box::new(self.expr(callee)),
                args: args.iter().map(|arg| self.expr(arg)).collect(),
                span: *span,
            },
            Expr::New { callee, args, span } => Expr::New {
                callee: Box::new(self.expr(callee)),
                args: args.iter().map(|arg| self.expr(arg)).collect(),
                span: *span,
            },
        }
    }
}
