//! Per-procedure candidate graph: `c1 -> c2` iff `c2` is reachable
//! from `c1` by one field dereference.

use super::{Candidate, ModRefCandidates};
use crate::entity::{EntitySet, PerEntity};
use crate::program::{PointsToSet, Procedure};
use std::collections::VecDeque;

#[derive(Clone, Debug, Default)]
pub struct CandidateGraph {
    roots: Vec<Candidate>,
    nodes: EntitySet<Candidate>,
    succs: PerEntity<Candidate, EntitySet<Candidate>>,
    preds: PerEntity<Candidate, EntitySet<Candidate>>,
}

impl CandidateGraph {
    /// Builds the graph over `procedure`'s roots and the current
    /// interface of its call-graph node. Root candidates are
    /// allocated in `cands`.
    pub fn compute(cands: &mut ModRefCandidates, procedure: &Procedure) -> CandidateGraph {
        let mut graph = CandidateGraph::default();
        for decl in &procedure.roots {
            let root = cands.add_root(decl);
            graph.roots.push(root);
            graph.nodes.insert(root);
        }
        let fields: Vec<Candidate> = cands.interface(procedure.node).iter().collect();
        for &c in &fields {
            graph.nodes.insert(c);
        }

        let nodes: Vec<Candidate> = graph.nodes.iter().collect();
        for &from in &nodes {
            let pts = cands[from].pts();
            for &to in &fields {
                if cands.field(to).is_reachable_from(pts) {
                    graph.succs[from].insert(to);
                    graph.preds[to].insert(from);
                }
            }
        }
        log::trace!(
            "candidate graph for {}: {} roots, {} fields",
            procedure.name,
            graph.roots.len(),
            fields.len()
        );
        graph
    }

    pub fn roots(&self) -> &[Candidate] {
        &self.roots[..]
    }

    /// Union of the points-to sets of all roots.
    pub fn roots_pts(&self, cands: &ModRefCandidates) -> PointsToSet {
        let mut pts = PointsToSet::new();
        for &root in &self.roots {
            pts.union_with(cands[root].pts());
        }
        pts
    }

    pub fn contains(&self, c: Candidate) -> bool {
        self.nodes.contains(c)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn succs(&self, c: Candidate) -> &EntitySet<Candidate> {
        &self.succs[c]
    }

    pub fn preds(&self, c: Candidate) -> &EntitySet<Candidate> {
        &self.preds[c]
    }

    pub fn remove_node(&mut self, c: Candidate) {
        assert!(
            !self.roots.contains(&c),
            "root {} cannot be removed from the candidate graph",
            c
        );
        let succs = std::mem::take(&mut self.succs[c]);
        let preds = std::mem::take(&mut self.preds[c]);
        for s in succs.iter() {
            self.preds[s].remove(c);
        }
        for p in preds.iter() {
            self.succs[p].remove(c);
        }
        self.nodes.remove(c);
    }

    /// Replaces `group` by the single node `into`, which inherits
    /// every edge into or out of the group. Edges inside the group
    /// become a self edge.
    pub fn merge_nodes(&mut self, group: &[Candidate], into: Candidate) {
        let members: EntitySet<Candidate> = group.iter().copied().collect();
        let mut succs = EntitySet::new();
        let mut preds = EntitySet::new();
        for &c in group {
            succs.union_with(&self.succs[c]);
            preds.union_with(&self.preds[c]);
        }
        let self_edge = succs.intersects(&members) || preds.intersects(&members);
        succs.subtract(&members);
        preds.subtract(&members);

        for &c in group {
            self.remove_node(c);
        }

        self.nodes.insert(into);
        for s in succs.iter() {
            self.preds[s].insert(into);
        }
        for p in preds.iter() {
            self.succs[p].insert(into);
        }
        if self_edge {
            succs.insert(into);
            preds.insert(into);
        }
        self.succs[into] = succs;
        self.preds[into] = preds;
    }

    /// Everything reachable from `start`, including `start` itself.
    /// A definitely-primitive node is included but never expanded.
    pub fn find_reachable<I: IntoIterator<Item = Candidate>>(
        &self,
        cands: &ModRefCandidates,
        start: I,
    ) -> EntitySet<Candidate> {
        let mut reachable = EntitySet::new();
        let mut work = VecDeque::new();
        for c in start {
            if reachable.insert(c) {
                work.push_back(c);
            }
        }

        while let Some(c) = work.pop_front() {
            for succ in self.succs[c].iter() {
                if reachable.insert(succ) && !cands[succ].is_primitive().is_true() {
                    work.push_back(succ);
                }
            }
        }

        reachable
    }
}
