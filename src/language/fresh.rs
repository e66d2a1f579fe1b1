use crate::language::cexpr::{Ident, NodeId};

/// Single source of fresh identifiers and node ids for one compilation.
/// Generated names carry a `$` so they can never collide with source
/// identifiers, which the lexer rejects `$` in.
#[derive(Debug, Default)]
pub struct FreshIds {
    names: u32,
    nodes: u32,
}

impl FreshIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, hint: &str) -> Ident {
        let n = self.names;
        self.names += 1;
        format!("{hint}${n}")
    }

    pub fn node_id(&mut self) -> NodeId {
        let n = self.nodes;
        self.nodes += 1;
        NodeId(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_never_repeat() {
        let mut fresh = FreshIds::new();
        let a = fresh.fresh("x");
        let b = fresh.fresh("x");
        assert_ne!(a, b);
        assert!(a.starts_with("x$"));
    }

    #[test]
    fn node_ids_are_sequential() {
        let mut fresh = FreshIds::new();
        assert_eq!(fresh.node_id(), NodeId(0));
        assert_eq!(fresh.node_id(), NodeId(1));
    }
}
