//! Call graph with pruned-membership and a fast postorder.

use super::FieldAccess;
use crate::entity;
use crate::entity::{EntityRef, EntitySet, EntityVec, PerEntity};
use smallvec::{smallvec, SmallVec};

entity!(CgNode, "cg");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CgNodeKind {
    Normal,
    /// `Thread.start()`-like entry that dispatches to a run method.
    ThreadStart,
    /// The run method invoked by a thread start.
    ThreadRun,
}

#[derive(Clone, Debug)]
pub struct CgNodeData {
    pub name: String,
    pub kind: CgNodeKind,
    /// Field accesses performed directly by this node.
    pub accesses: Vec<FieldAccess>,
    pub succs: Vec<CgNode>,
    pub preds: Vec<CgNode>,
}

/// The non-pruned call graph; `pruned` marks the members of the
/// pruned variant. Pruned-graph edges are the non-pruned edges
/// between two members.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    nodes: EntityVec<CgNode, CgNodeData>,
    pruned: EntitySet<CgNode>,
}

impl CallGraph {
    pub fn new() -> CallGraph {
        CallGraph::default()
    }

    /// Adds a node. New nodes are members of the pruned graph.
    pub fn add_node(&mut self, name: &str, kind: CgNodeKind) -> CgNode {
        let node = self.nodes.push(CgNodeData {
            name: name.to_string(),
            kind,
            accesses: vec![],
            succs: vec![],
            preds: vec![],
        });
        self.pruned.insert(node);
        log::trace!("add_node: {} '{}'", node, name);
        node
    }

    pub fn add_edge(&mut self, from: CgNode, to: CgNode) {
        if self.nodes[from].succs.contains(&to) {
            return;
        }
        self.nodes[from].succs.push(to);
        self.nodes[to].preds.push(from);
        log::trace!("add_edge: from {} to {}", from, to);
    }

    pub fn add_access(&mut self, node: CgNode, access: FieldAccess) {
        self.nodes[node].accesses.push(access);
    }

    pub fn node(&self, node: CgNode) -> &CgNodeData {
        &self.nodes[node]
    }

    pub fn nodes(&self) -> impl Iterator<Item = CgNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn succs(&self, node: CgNode) -> &[CgNode] {
        &self.nodes[node].succs[..]
    }

    pub fn preds(&self, node: CgNode) -> &[CgNode] {
        &self.nodes[node].preds[..]
    }

    pub fn is_pruned_member(&self, node: CgNode) -> bool {
        self.pruned.contains(node)
    }

    pub fn set_pruned_member(&mut self, node: CgNode, member: bool) {
        if member {
            self.pruned.insert(node);
        } else {
            self.pruned.remove(node);
        }
    }

    /// A copy without the edges from thread-start dispatchers to
    /// thread run methods. Those edges are not real calls: the run
    /// method executes in another thread.
    pub fn strip_thread_start_to_run(&self) -> CallGraph {
        let mut ret = CallGraph {
            nodes: self.nodes.clone(),
            pruned: self.pruned.clone(),
        };
        for node in self.nodes() {
            if self.nodes[node].kind != CgNodeKind::ThreadStart {
                continue;
            }
            let stripped: SmallVec<[CgNode; 4]> = self.nodes[node]
                .succs
                .iter()
                .copied()
                .filter(|&succ| self.nodes[succ].kind == CgNodeKind::ThreadRun)
                .collect();
            for succ in stripped {
                log::trace!("strip_thread_start_to_run: {} -> {}", node, succ);
                ret.nodes[node].succs.retain(|&s| s != succ);
                ret.nodes[succ].preds.retain(|&p| p != node);
            }
        }
        ret
    }

    /// DFS finish-time order of the pruned graph: every member
    /// appears once, and callees finish before their callers except
    /// along cycles. Roots are tried in node order.
    pub fn postorder_pruned(&self) -> Vec<CgNode> {
        let mut ret = vec![];

        // State: visited-node map, and explicit DFS stack.
        let mut visited: PerEntity<CgNode, bool> = PerEntity::default();

        #[derive(Debug)]
        struct State<'a> {
            node: CgNode,
            succs: &'a [CgNode],
            next_succ: usize,
        }

        for root in self.nodes() {
            if visited[root] || !self.is_pruned_member(root) {
                continue;
            }
            let mut stack: SmallVec<[State; 64]> = smallvec![];
            visited[root] = true;
            stack.push(State {
                node: root,
                succs: self.succs(root),
                next_succ: 0,
            });

            while let Some(ref mut state) = stack.last_mut() {
                log::trace!("postorder: TOS is {:?}", state);
                // Perform one action: push to new succ, skip an already-visited succ, or pop.
                if state.next_succ < state.succs.len() {
                    let succ = state.succs[state.next_succ];
                    state.next_succ += 1;
                    if !visited[succ] && self.is_pruned_member(succ) {
                        log::trace!(" -> visiting {}", succ);
                        visited[succ] = true;
                        stack.push(State {
                            node: succ,
                            succs: self.succs(succ),
                            next_succ: 0,
                        });
                    }
                } else {
                    log::trace!("retreating from {}", state.node);
                    ret.push(state.node);
                    stack.pop();
                }
            }
        }

        debug_assert!(ret.iter().all(|n| n.index() < self.len()));
        ret
    }
}
