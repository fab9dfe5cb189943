//! Depth-bounded automatic merge.
//!
//! Starting from the roots' points-to set, candidates are taken level
//! by level, where a level is what one more dereference reaches. The
//! walk stops before a level that would push the accepted frontier
//! above `max_nodes`, or after `max_depth` levels. The last accepted
//! level is the border: each border node absorbs everything reachable
//! from it that is not itself in the frontier.
//!
//! If the very first level already exceeds `max_nodes` there is no
//! smaller frontier to fall back to. That level and everything below
//! it collapse into a single node.

use super::BoundingCx;
use crate::candidates::Candidate;
use crate::entity::EntitySet;

/// Depth at which merging starts by default. Few candidates sit
/// deeper than this with realistic points-to precision.
pub const STD_MERGE_LEVEL: usize = 5;

pub fn run(cx: &mut BoundingCx, max_nodes: usize, max_depth: usize) {
    let mut reach_pts = cx.graph.roots_pts(cx.cands);
    let mut remaining: EntitySet<Candidate> = cx.cands.interface(cx.node()).candidates().clone();
    let mut accepted: EntitySet<Candidate> = EntitySet::new();
    let mut border: Vec<Candidate> = vec![];
    let mut oversized = false;

    for level in (1..=max_depth).rev() {
        let layer: Vec<Candidate> = remaining
            .iter()
            .filter(|&c| cx.cands.field(c).is_reachable_from(&reach_pts))
            .collect();
        if layer.is_empty() {
            // Nothing new is reachable, so no deeper level can be either.
            break;
        }
        for &c in &layer {
            remaining.remove(c);
        }
        log::trace!("merge_at_depth: level {} has {} nodes", level, layer.len());

        if accepted.is_empty() && layer.len() > max_nodes {
            accepted.extend(layer.iter().copied());
            border = layer;
            oversized = true;
            break;
        } else if accepted.len() + layer.len() > max_nodes {
            break;
        }

        accepted.extend(layer.iter().copied());
        if level > 1 {
            for &c in &layer {
                reach_pts.union_with(&cx.cands.field(c).pts);
            }
        }
        border = layer;
    }

    if oversized {
        let below = cx.find_reachable(border.iter().copied());
        let group = cx.fields_of(&below);
        if let Some(m) = cx.merge(&group) {
            log::debug!(
                "merge_at_depth: oversized first level, {} candidates into {}",
                group.len(),
                m
            );
        }
        return;
    }

    for c in border {
        if !cx.graph.contains(c) {
            continue;
        }
        let below = cx.find_reachable(std::iter::once(c));
        let mut group = vec![c];
        group.extend(
            cx.fields_of(&below)
                .into_iter()
                .filter(|&r| r != c && !accepted.contains(r)),
        );
        if let Some(m) = cx.merge(&group) {
            log::trace!(
                "merge_at_depth: border {} absorbs {} nodes into {}",
                c,
                group.len() - 1,
                m
            );
            accepted.insert(m);
        }
    }
}
