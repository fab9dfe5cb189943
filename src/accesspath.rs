//! Symbolic access paths over dependence-graph nodes.
//!
//! Paths are interned: a path is identified by its parent and its
//! last step, so two syntactically equal paths share one `Ap`.

use crate::entity;
use crate::entity::EntityVec;
use crate::program::{Field, TypeId};
use fxhash::{FxHashMap, FxHashSet};
use std::fmt;

mod context;
pub use context::*;

entity!(Ap, "ap");
entity!(PdgNode, "n");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApStep {
    /// The dependence-graph node a path starts from.
    Root(PdgNode),
    Field(Field),
}

impl fmt::Display for ApStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApStep::Root(node) => write!(f, "{}", node),
            ApStep::Field(field) => write!(f, "{}", field),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApData {
    pub parent: Option<Ap>,
    pub end: ApStep,
    pub ty: Option<TypeId>,
}

/// All access paths of one procedure and the paths attached to each
/// of its dependence-graph nodes. Read-only once alias contexts are
/// created over it.
#[derive(Clone, Debug, Default)]
pub struct ApTable {
    paths: EntityVec<Ap, ApData>,
    interned: FxHashMap<(Option<Ap>, ApStep), Ap>,
    node_paths: FxHashMap<PdgNode, Vec<Ap>>,
    /// Type pairs known to have no common instance. Kept ordered.
    disjoint_types: FxHashSet<(TypeId, TypeId)>,
}

impl ApTable {
    pub fn new() -> ApTable {
        ApTable::default()
    }

    fn intern(&mut self, parent: Option<Ap>, end: ApStep, ty: Option<TypeId>) -> Ap {
        if let Some(&ap) = self.interned.get(&(parent, end)) {
            return ap;
        }
        let ap = self.paths.push(ApData { parent, end, ty });
        self.interned.insert((parent, end), ap);
        ap
    }

    pub fn root(&mut self, node: PdgNode, ty: Option<TypeId>) -> Ap {
        self.intern(None, ApStep::Root(node), ty)
    }

    pub fn field(&mut self, parent: Ap, field: Field, ty: Option<TypeId>) -> Ap {
        self.intern(Some(parent), ApStep::Field(field), ty)
    }

    pub fn data(&self, ap: Ap) -> &ApData {
        &self.paths[ap]
    }

    pub fn parent(&self, ap: Ap) -> Option<Ap> {
        self.paths[ap].parent
    }

    /// Attaches `ap` to dependence-graph node `node`.
    pub fn add_node_path(&mut self, node: PdgNode, ap: Ap) {
        let paths = self.node_paths.entry(node).or_default();
        if !paths.contains(&ap) {
            paths.push(ap);
        }
    }

    pub fn node_paths(&self, node: PdgNode) -> &[Ap] {
        self.node_paths
            .get(&node)
            .map(|paths| &paths[..])
            .unwrap_or(&[])
    }

    /// Declares that no object is an instance of both `t1` and `t2`.
    /// Without such a declaration any two types may share instances.
    pub fn set_disjoint_types(&mut self, t1: TypeId, t2: TypeId) {
        if t1 != t2 {
            self.disjoint_types.insert((t1.min(t2), t1.max(t2)));
        }
    }

    pub fn types_may_overlap(&self, t1: TypeId, t2: TypeId) -> bool {
        !self.disjoint_types.contains(&(t1.min(t2), t1.max(t2)))
    }

    /// The full step sequence of `ap`, root first.
    pub fn steps(&self, ap: Ap) -> Vec<ApStep> {
        let mut steps = vec![];
        let mut cur = Some(ap);
        while let Some(p) = cur {
            steps.push(self.paths[p].end);
            cur = self.paths[p].parent;
        }
        steps.reverse();
        steps
    }
}

/// An assertion that two paths are definitely not aliased.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoAlias {
    pub a: Ap,
    pub b: Ap,
}

impl NoAlias {
    pub fn new(a: Ap, b: Ap) -> NoAlias {
        NoAlias { a, b }
    }

    pub fn captures(&self, a1: Ap, a2: Ap) -> bool {
        (self.a == a1 && self.b == a2) || (self.a == a2 && self.b == a1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// Heap data dependence; only realizable if the endpoints alias.
    DataAlias,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapEdge {
    pub source: PdgNode,
    pub target: PdgNode,
    pub kind: EdgeKind,
}
