//! Precise propagation: a candidate only moves into a caller if it is
//! reachable from what the caller can already reach.
//!
//! Each procedure keeps a `reaching` points-to set, seeded with its
//! roots, and a strict partition of its local candidates into
//! `reached` and `unreachable`. Candidates only ever move from
//! `unreachable` to `reached`, and `reaching` only grows, so the
//! outer "until nothing changes" loop terminates.

use super::{simple, Propagation};
use crate::candidates::{Candidate, ModRefCandidates};
use crate::entity::EntitySet;
use crate::errors::Canceled;
use crate::monitor::{check_canceled, ProgressMonitor};
use crate::program::{CallGraph, CgNode, PointsToSet, Procedure, Program};
use fxhash::FxHashMap;
use rayon::prelude::*;

#[derive(Clone, Debug)]
struct ReachInfo {
    node: CgNode,
    reached: EntitySet<Candidate>,
    unreachable: EntitySet<Candidate>,
    reaching: PointsToSet,
    /// Indices of callee infos.
    callees: Vec<usize>,
    /// Flattened results of callees outside the pruned graph.
    pruned: Option<EntitySet<Candidate>>,
}

impl ReachInfo {
    fn new(node: CgNode, reaching: PointsToSet, locals: &EntitySet<Candidate>) -> ReachInfo {
        ReachInfo {
            node,
            reached: EntitySet::new(),
            unreachable: locals.clone(),
            reaching,
            callees: vec![],
            pruned: None,
        }
    }

    fn reach(&mut self, cands: &ModRefCandidates, c: Candidate) {
        self.unreachable.remove(c);
        self.reached.insert(c);
        self.reaching.union_with(&cands.field(c).pts);
    }

    /// Moves local candidates into `reached` until a local fixpoint.
    fn local_propagate(&mut self, cands: &ModRefCandidates) -> bool {
        let mut added_any = false;
        loop {
            let added: Vec<Candidate> = self
                .unreachable
                .iter()
                .filter(|&c| cands.field(c).is_reachable_from(&self.reaching))
                .collect();
            if added.is_empty() {
                break;
            }
            for c in added {
                self.reach(cands, c);
            }
            added_any = true;
        }
        added_any
    }

    fn pull(&mut self, cands: &ModRefCandidates, from: &EntitySet<Candidate>) -> bool {
        let mut changed = false;
        for c in from.iter() {
            if !self.reached.contains(c) && cands.field(c).is_reachable_from(&self.reaching) {
                self.reach(cands, c);
                changed = true;
            }
        }
        changed
    }
}

fn propagate_from_callees(infos: &mut [ReachInfo], idx: usize, cands: &ModRefCandidates) -> bool {
    let mut changed = false;
    for i in 0..infos[idx].callees.len() {
        let callee = infos[idx].callees[i];
        if callee == idx {
            continue;
        }
        let callee_reached = infos[callee].reached.clone();
        changed |= infos[idx].pull(cands, &callee_reached);
    }
    if let Some(pruned) = infos[idx].pruned.take() {
        changed |= infos[idx].pull(cands, &pruned);
        infos[idx].pruned = Some(pruned);
    }
    changed
}

pub fn propagate(
    program: &Program,
    callgraph: &CallGraph,
    cands: &ModRefCandidates,
    monitor: &dyn ProgressMonitor,
) -> Result<Propagation, Canceled> {
    let simple = simple::propagate(callgraph, cands, monitor)?;

    // Postorder over the pruned graph, so callees are usually
    // settled before their callers.
    let mut order: Vec<CgNode> = callgraph
        .postorder_pruned()
        .into_iter()
        .filter(|&node| program.procedure(node).is_some())
        .collect();
    for procedure in program.procedures() {
        if !order.contains(&procedure.node) {
            order.push(procedure.node);
        }
    }

    let procedures: Vec<&Procedure> = order
        .iter()
        .filter_map(|&node| program.procedure(node))
        .collect();
    let root_pts: Vec<PointsToSet> = procedures.par_iter().map(|p| p.root_pts()).collect();

    let mut index: FxHashMap<CgNode, usize> = FxHashMap::default();
    let mut infos: Vec<ReachInfo> = vec![];
    for (procedure, reaching) in procedures.iter().zip(root_pts.into_iter()) {
        index.insert(procedure.node, infos.len());
        infos.push(ReachInfo::new(
            procedure.node,
            reaching,
            cands.locals(procedure.node),
        ));
    }

    for info in infos.iter_mut() {
        for &succ in callgraph.succs(info.node) {
            match index.get(&succ) {
                Some(&callee) => info.callees.push(callee),
                None => {
                    info.pruned
                        .get_or_insert_with(EntitySet::new)
                        .union_with(simple.get(succ));
                }
            }
        }
    }

    let mut passes = 0;
    loop {
        check_canceled(monitor)?;
        passes += 1;
        let mut changed = false;
        for idx in 0..infos.len() {
            check_canceled(monitor)?;
            loop {
                let local = infos[idx].local_propagate(cands);
                let from_callees = propagate_from_callees(&mut infos, idx, cands);
                if !(local || from_callees) {
                    break;
                }
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    log::debug!(
        "advanced propagation: {} procedures converged after {} passes",
        infos.len(),
        passes
    );

    let mut ret = simple;
    for info in infos {
        debug_assert!(!info.reached.intersects(&info.unreachable));
        ret.set(info.node, info.reached);
    }
    Ok(ret)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::monitor::{Fuel, NullMonitor};
    use crate::passes::testutil::pts;
    use crate::program::{CgNodeKind, FieldAccess, RootDecl};

    /// main(p) calls callee(q); callee touches one field reachable
    /// from p and one only reachable from its own local allocation.
    fn program() -> (Program, CgNode, CgNode) {
        let mut program = Program::new();
        let f = program.add_field("f");
        let g = program.add_field("g");
        let main = program.callgraph.add_node("main", CgNodeKind::Normal);
        let callee = program.callgraph.add_node("callee", CgNodeKind::Normal);
        program.callgraph.add_edge(main, callee);
        program
            .callgraph
            .add_access(callee, FieldAccess::new(f, pts(&[1]), pts(&[2])));
        program
            .callgraph
            .add_access(callee, FieldAccess::new(g, pts(&[2]), pts(&[])));
        program
            .callgraph
            .add_access(callee, FieldAccess::new(f, pts(&[9]), pts(&[])));

        let mut p = Procedure::new(main, "main");
        p.roots.push(RootDecl::formal("p", None, pts(&[1])));
        program.add_procedure(p);
        let mut q = Procedure::new(callee, "callee");
        q.roots.push(RootDecl::formal("q", None, pts(&[1, 9])));
        program.add_procedure(q);
        (program, main, callee)
    }

    #[test]
    fn gated_by_points_to() {
        let _ = env_logger::try_init();
        let (program, main, callee) = program();
        let cands = ModRefCandidates::compute_intraproc(&program);
        let precise = propagate(&program, &program.callgraph, &cands, &NullMonitor).unwrap();
        let coarse = simple::propagate(&program.callgraph, &cands, &NullMonitor).unwrap();

        assert_eq!(coarse.get(main).len(), 3);
        assert_eq!(precise.get(callee).len(), 3);
        // The field on the callee's private object does not escape.
        assert_eq!(precise.get(main).len(), 2);
        for node in program.callgraph.nodes() {
            assert!(precise.get(node).is_subset(coarse.get(node)));
        }
    }

    #[test]
    fn pruned_callee_is_flattened() {
        let (mut program, main, callee) = program();
        program.callgraph.set_pruned_member(callee, false);
        let mut only_main = Program::new();
        std::mem::swap(&mut only_main.callgraph, &mut program.callgraph);
        only_main.fields = program.fields.clone();
        if let Some(p) = program.procedure(main) {
            only_main.add_procedure(p.clone());
        }

        let cands = ModRefCandidates::compute_intraproc(&only_main);
        let precise =
            propagate(&only_main, &only_main.callgraph, &cands, &NullMonitor).unwrap();
        assert_eq!(precise.get(main).len(), 2);
        // No procedure for the pruned node: falls back to the simple result.
        assert_eq!(precise.get(callee).len(), 3);
    }

    #[test]
    fn cancellation_aborts() {
        let (program, _, _) = program();
        let cands = ModRefCandidates::compute_intraproc(&program);
        let fuel = Fuel::new(3);
        assert_eq!(
            propagate(&program, &program.callgraph, &cands, &fuel).unwrap_err(),
            Canceled
        );
    }
}
