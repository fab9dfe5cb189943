//! Merge field nodes that share a parent and refer to the same
//! field. The result has one node per field per parent.

use super::BoundingCx;
use crate::candidates::Candidate;
use crate::entity::EntitySet;
use crate::program::Field;
use smallvec::SmallVec;
use std::collections::{BTreeMap, VecDeque};

pub fn run(cx: &mut BoundingCx) {
    let mut work: VecDeque<Candidate> = cx.graph.roots().iter().copied().collect();
    let mut visited: EntitySet<Candidate> = work.iter().copied().collect();

    while let Some(c) = work.pop_front() {
        if !cx.graph.contains(c) {
            // Absorbed by an earlier merge.
            continue;
        }

        let parent = merge_same_fields_of_parent(cx, c);

        for succ in cx.graph.succs(parent).iter() {
            if visited.insert(succ) {
                work.push_back(succ);
            }
        }
    }
}

/// Merges same-field successors of `parent` until each field has one
/// successor. A parent with a self edge may be merged into its own
/// group; the node standing for it afterwards is returned.
fn merge_same_fields_of_parent(cx: &mut BoundingCx, parent: Candidate) -> Candidate {
    let mut parent = parent;
    loop {
        let mut by_field: BTreeMap<Field, SmallVec<[Candidate; 4]>> = BTreeMap::new();
        for succ in cx.graph.succs(parent).iter() {
            for field in cx.cands.field(succ).fields.iter() {
                by_field.entry(field).or_default().push(succ);
            }
        }

        let group = match by_field.values().find(|group| group.len() > 1) {
            Some(group) => group.clone(),
            None => return parent,
        };
        let m = cx.merge(&group[..]);
        log::trace!(
            "merge_one_field_per_parent: {:?} under {} into {:?}",
            group,
            parent,
            m
        );
        if !cx.graph.contains(parent) {
            match m {
                Some(m) => parent = m,
                None => return parent,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::passes::testutil::*;
    use crate::program::{FieldAccess, RootDecl};

    #[test]
    fn two_formals_aliasing_one_field() {
        let _ = env_logger::try_init();
        let mut fx = Fixture::new();
        let f = fx.field("f");
        fx.root(RootDecl::formal("a", None, pts(&[1, 2])));
        fx.root(RootDecl::formal("b", None, pts(&[2])));
        fx.access(FieldAccess::new(f, pts(&[1]), pts(&[])));
        fx.access(FieldAccess::new(f, pts(&[2]), pts(&[])));

        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        assert_eq!(cx.size(), 2);
        run(&mut cx);
        assert_eq!(cx.size(), 1);
        let root_b = cx.graph.roots()[1];
        assert!(cx.graph.succs(root_b).contains(cx.interface()[0]));
    }

    #[test]
    fn distinct_fields_stay_apart() {
        let mut fx = Fixture::new();
        let f = fx.field("f");
        let g = fx.field("g");
        fx.root(RootDecl::formal("a", None, pts(&[1])));
        fx.access(FieldAccess::new(f, pts(&[1]), pts(&[3])));
        fx.access(FieldAccess::new(g, pts(&[1]), pts(&[4])));
        fx.access(FieldAccess::new(f, pts(&[3]), pts(&[])));
        fx.access(FieldAccess::new(f, pts(&[4]), pts(&[])));

        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        run(&mut cx);
        // a.f.f and a.g.f have different parents.
        assert_eq!(cx.size(), 4);
    }

    #[test]
    fn self_looping_parent_joins_its_siblings() {
        let mut fx = Fixture::new();
        let next = fx.field("next");
        fx.root(RootDecl::formal("l", None, pts(&[1])));
        // {1}.next points back to {1} and on to {2}.
        fx.access(FieldAccess::new(next, pts(&[1]), pts(&[1, 2])));
        fx.access(FieldAccess::new(next, pts(&[2]), pts(&[])));

        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        assert_eq!(cx.size(), 2);
        run(&mut cx);
        assert_eq!(cx.size(), 1);
        let m = cx.interface()[0];
        assert!(cx.graph.succs(m).contains(m));
        assert_eq!(cx.cands.field(m).origin.len(), 2);
    }
}
