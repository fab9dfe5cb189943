//! Simple propagation: a gen-reach problem on the reversed call
//! graph. Every candidate generated below a node reaches it, with no
//! points-to check.

use super::Propagation;
use crate::candidates::{Candidate, ModRefCandidates};
use crate::entity::{EntitySet, PerEntity};
use crate::errors::Canceled;
use crate::monitor::{check_canceled, ProgressMonitor};
use crate::program::{CallGraph, CgNode};
use std::collections::VecDeque;

pub fn propagate(
    callgraph: &CallGraph,
    cands: &ModRefCandidates,
    monitor: &dyn ProgressMonitor,
) -> Result<Propagation, Canceled> {
    let mut out: PerEntity<CgNode, EntitySet<Candidate>> = PerEntity::default();
    for node in callgraph.nodes() {
        out[node] = cands.locals(node).clone();
    }

    let mut workqueue: VecDeque<CgNode> = callgraph.nodes().collect();
    let mut workqueue_set: EntitySet<CgNode> = callgraph.nodes().collect();

    while let Some(node) = workqueue.pop_front() {
        check_canceled(monitor)?;
        workqueue_set.remove(node);

        let mut value = out[node].clone();
        let mut changed = false;
        for &callee in callgraph.succs(node) {
            changed |= value.union_with(&out[callee]);
        }
        if changed {
            log::trace!("simple: {} grows to {} candidates", node, value.len());
            out[node] = value;
            for &caller in callgraph.preds(node) {
                if workqueue_set.insert(caller) {
                    workqueue.push_back(caller);
                }
            }
        }
    }

    let mut ret = Propagation::default();
    for node in callgraph.nodes() {
        check_canceled(monitor)?;
        ret.set(node, std::mem::take(&mut out[node]));
    }
    Ok(ret)
}
