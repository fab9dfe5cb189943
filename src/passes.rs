//! Interface-bounding passes.
//!
//! Every pass works on a `BoundingCx`, which applies each removal or
//! merge to the node's interface model and to the candidate graph in
//! one step. A pass is never interrupted between two such steps.

use crate::candidates::{Candidate, CandidateGraph, ModRefCandidates};
use crate::entity::EntitySet;
use crate::program::{CgNode, Procedure};

pub mod cut_immutables;
pub mod cut_unreachable;
pub mod merge_at_depth;
pub mod merge_exceptions;
pub mod merge_one_field_per_parent;
pub mod merge_statics;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    CutUnreachable,
    MergeExceptions,
    CutImmutables,
    MergeOneFieldPerParent,
    MergeStatics,
    MergeAtDepth,
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            PassKind::CutUnreachable => "cut-unreachable",
            PassKind::MergeExceptions => "merge-exceptions",
            PassKind::CutImmutables => "cut-immutables",
            PassKind::MergeOneFieldPerParent => "merge-one-field-per-parent",
            PassKind::MergeStatics => "merge-statics",
            PassKind::MergeAtDepth => "merge-at-depth",
        };
        f.write_str(name)
    }
}

pub struct BoundingCx<'a> {
    pub cands: &'a mut ModRefCandidates,
    pub procedure: &'a Procedure,
    pub graph: CandidateGraph,
}

impl<'a> BoundingCx<'a> {
    pub fn new(cands: &'a mut ModRefCandidates, procedure: &'a Procedure) -> BoundingCx<'a> {
        let graph = CandidateGraph::compute(cands, procedure);
        BoundingCx {
            cands,
            procedure,
            graph,
        }
    }

    pub fn node(&self) -> CgNode {
        self.procedure.node
    }

    /// Current interface size.
    pub fn size(&self) -> usize {
        self.cands.interface(self.node()).len()
    }

    pub fn interface(&self) -> Vec<Candidate> {
        self.cands.interface(self.node()).iter().collect()
    }

    pub fn find_reachable<I: IntoIterator<Item = Candidate>>(
        &self,
        start: I,
    ) -> EntitySet<Candidate> {
        self.graph.find_reachable(&*self.cands, start)
    }

    /// The field candidates of `set`, in id order.
    pub fn fields_of(&self, set: &EntitySet<Candidate>) -> Vec<Candidate> {
        set.iter().filter(|&c| self.cands[c].is_field()).collect()
    }

    pub fn remove(&mut self, c: Candidate) {
        let node = self.node();
        if self.cands.remove_candidate(node, c) {
            self.graph.remove_node(c);
        }
    }

    /// Merges `group` into one candidate. Groups of fewer than two
    /// are left alone.
    pub fn merge(&mut self, group: &[Candidate]) -> Option<Candidate> {
        if group.len() < 2 {
            return None;
        }
        let node = self.node();
        let merged = self.cands.merge_candidates(node, group);
        self.graph.merge_nodes(group, merged);
        Some(merged)
    }
}
