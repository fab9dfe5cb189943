//! Interprocedural propagation: for every call-graph node, the field
//! candidates that escape into it from everything it may call.

use crate::candidates::{Candidate, ModRefCandidates};
use crate::entity::{EntitySet, PerEntity};
use crate::errors::Canceled;
use crate::monitor::ProgressMonitor;
use crate::program::{CallGraph, CgNode, Program};

pub mod advanced;
pub mod simple;

/// Propagated candidate set per call-graph node.
#[derive(Clone, Debug, Default)]
pub struct Propagation {
    per_node: PerEntity<CgNode, EntitySet<Candidate>>,
}

impl Propagation {
    pub fn get(&self, node: CgNode) -> &EntitySet<Candidate> {
        &self.per_node[node]
    }

    pub fn set(&mut self, node: CgNode, cands: EntitySet<Candidate>) {
        self.per_node[node] = cands;
    }
}

/// Runs the advanced strategy if `advanced` is set, the simple one
/// otherwise. `callgraph` is the non-pruned graph with thread
/// dispatch edges already stripped.
pub fn propagate(
    program: &Program,
    callgraph: &CallGraph,
    cands: &ModRefCandidates,
    advanced: bool,
    monitor: &dyn ProgressMonitor,
) -> Result<Propagation, Canceled> {
    if advanced {
        advanced::propagate(program, callgraph, cands, monitor)
    } else {
        simple::propagate(callgraph, cands, monitor)
    }
}
