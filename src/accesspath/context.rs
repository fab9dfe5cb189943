//! One calling-context configuration of aliasing between access
//! paths. Asked whether heap data dependences are realizable under
//! that configuration.

use super::{Ap, ApStep, ApTable, EdgeKind, HeapEdge, NoAlias, PdgNode};
use crate::entity;
use crate::program::CgNode;
use fxhash::FxHashSet;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

entity!(EqClassId, "eq");

/// Paths known to be co-referent. Immutable once published.
#[derive(Clone, Debug)]
struct EqClass {
    id: EqClassId,
    paths: Arc<FxHashSet<Ap>>,
}

impl EqClass {
    fn contains(&self, ap: Ap) -> bool {
        self.paths.contains(&ap)
    }
}

/// Canonical form of a path: the class of its closest aliased
/// ancestor (or itself) plus the remaining field steps, or the
/// literal path if nothing on it is aliased.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApLabel {
    pub class: Option<EqClassId>,
    pub steps: SmallVec<[ApStep; 4]>,
}

impl fmt::Display for ApLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        if let Some(class) = self.class {
            write!(f, "{}", class)?;
            first = false;
        }
        for step in &self.steps {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", step)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ApContext {
    pdg: CgNode,
    table: Arc<ApTable>,
    classes: Vec<EqClass>,
    initial_no_alias: Arc<FxHashSet<NoAlias>>,
    next_id: u32,
}

impl ApContext {
    pub fn new(pdg: CgNode, table: Arc<ApTable>) -> ApContext {
        ApContext {
            pdg,
            table,
            classes: vec![],
            initial_no_alias: Arc::new(FxHashSet::default()),
            next_id: 0,
        }
    }

    pub fn pdg(&self) -> CgNode {
        self.pdg
    }

    pub fn set_initial_no_alias(&mut self, no_alias: Arc<FxHashSet<NoAlias>>) {
        self.initial_no_alias = no_alias;
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    fn next_class_id(&mut self) -> EqClassId {
        let id = EqClassId::from(self.next_id);
        self.next_id += 1;
        id
    }

    /// From now on, all of `from` and `to` are aliased. Every existing
    /// class sharing a path with them is folded into the new class,
    /// keeping classes pairwise disjoint.
    pub fn add_merge(&mut self, from: &[Ap], to: &[Ap]) {
        let id = self.next_class_id();
        let mut paths: FxHashSet<Ap> = from.iter().chain(to.iter()).copied().collect();
        let mut kept = Vec::with_capacity(self.classes.len());
        for cls in self.classes.drain(..) {
            if cls.paths.iter().any(|ap| paths.contains(ap)) {
                log::trace!("add_merge: {} absorbs {}", id, cls.id);
                paths.extend(cls.paths.iter().copied());
            } else {
                kept.push(cls);
            }
        }
        kept.push(EqClass {
            id,
            paths: Arc::new(paths),
        });
        self.classes = kept;
    }

    fn find_eq(&self, ap: Ap) -> Option<&EqClass> {
        self.classes.iter().find(|cls| cls.contains(ap))
    }

    pub fn class_of(&self, ap: Ap) -> Option<EqClassId> {
        self.find_eq(ap).map(|cls| cls.id)
    }

    pub fn equivalence_class_ap(&self, ap: Ap) -> ApLabel {
        let mut suffix: SmallVec<[ApStep; 4]> = SmallVec::new();
        let mut cur = Some(ap);
        while let Some(p) = cur {
            if let Some(cls) = self.find_eq(p) {
                suffix.reverse();
                return ApLabel {
                    class: Some(cls.id),
                    steps: suffix,
                };
            }
            let data = self.table.data(p);
            suffix.push(data.end);
            cur = data.parent;
        }
        suffix.reverse();
        assert!(
            matches!(suffix.first(), Some(ApStep::Root(_))),
            "access path {} does not start at a root",
            ap
        );
        ApLabel {
            class: None,
            steps: suffix,
        }
    }

    fn extract_equiv(&self, paths: &[Ap]) -> FxHashSet<ApLabel> {
        paths
            .iter()
            .map(|&ap| self.equivalence_class_ap(ap))
            .collect()
    }

    /// True if some path of `n1` and some path of `n2` share a
    /// canonical label.
    pub fn may_be_aliased(&self, n1: PdgNode, n2: PdgNode) -> bool {
        let equiv1 = self.extract_equiv(self.table.node_paths(n1));
        let equiv2 = self.extract_equiv(self.table.node_paths(n2));
        !equiv1.is_disjoint(&equiv2)
    }

    pub fn may_be_active(&self, edge: &HeapEdge) -> bool {
        if edge.kind != EdgeKind::DataAlias {
            return true;
        }
        self.may_be_aliased(edge.source, edge.target)
    }

    /// The edges of `edges` that may be active, in input order.
    pub fn filter_active(&self, edges: &[HeapEdge]) -> Vec<HeapEdge> {
        edges
            .par_iter()
            .filter(|edge| self.may_be_active(edge))
            .copied()
            .collect()
    }

    pub fn is_aliased(&self, a1: Ap, a2: Ap) -> bool {
        if a1 == a2 {
            return true;
        }

        if self.equivalence_class_ap(a1) == self.equivalence_class_ap(a2) {
            true
        } else if self.compatible_type(a1, a2) {
            !self
                .initial_no_alias
                .iter()
                .any(|na| na.captures(a1, a2))
        } else {
            false
        }
    }

    /// Unknown types are compatible with anything; known types are
    /// compatible unless the table declares them disjoint.
    pub fn compatible_type(&self, a1: Ap, a2: Ap) -> bool {
        match (self.table.data(a1).ty, self.table.data(a2).ty) {
            (Some(t1), Some(t2)) => self.table.types_may_overlap(t1, t2),
            _ => true,
        }
    }
}
