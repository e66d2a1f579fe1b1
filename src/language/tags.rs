use crate::language::cexpr::{Ident, NodeId};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flatness {
    Flat,
    NotFlat,
}

/// Side table carrying everything one pass needs to tell a later pass.
/// Keyed by node identity so the trees themselves stay immutable; each
/// field is its own namespace, so passes cannot clobber each other.
#[derive(Clone, Debug, Default)]
pub struct TagTable {
    /// Function literals proven to never capture.
    pub flatness: HashMap<NodeId, Flatness>,
    /// Application sites whose callee is a known flat function.
    pub flat_apps: HashSet<NodeId>,
    /// Function literals already rewritten into capture form.
    pub transformed: HashSet<NodeId>,
    /// The continuation parameter prepended to each rewritten function.
    pub k_args: HashMap<NodeId, Ident>,
    /// Source line of each application site, for breakpoints.
    pub lines: HashMap<NodeId, u32>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_flat_fun(&self, id: NodeId) -> bool {
        self.flatness.get(&id) == Some(&Flatness::Flat)
    }

    pub fn is_flat_app(&self, id: NodeId) -> bool {
        self.flat_apps.contains(&id)
    }

    pub fn line_of(&self, id: NodeId) -> Option<u32> {
        self.lines.get(&id).copied()
    }
}
