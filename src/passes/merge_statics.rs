//! Last-resort size reduction: merge everything reachable only
//! through static fields into a single candidate.
//!
//! Only roots classified `Yes` count as static; `Maybe` is treated as
//! not proven.

use super::BoundingCx;
use crate::candidates::Candidate;

pub fn run(cx: &mut BoundingCx) {
    let (statics, others): (Vec<Candidate>, Vec<Candidate>) = cx
        .graph
        .roots()
        .iter()
        .copied()
        .partition(|&r| cx.cands.root(r).is_static.is_true());
    if statics.is_empty() {
        return;
    }

    let mut only_static = cx.find_reachable(statics);
    only_static.subtract(&cx.find_reachable(others));
    let group = cx.fields_of(&only_static);
    if let Some(m) = cx.merge(&group) {
        log::trace!("merge_statics: {} candidates into {}", group.len(), m);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::passes::testutil::*;
    use crate::program::{FieldAccess, RootDecl};
    use crate::tvl::Tvl;

    #[test]
    fn merges_static_only_and_ignores_maybe() {
        let mut fx = Fixture::new();
        let f = fx.field("f");
        let g = fx.field("g");
        fx.root(RootDecl::formal("p", None, pts(&[1])));
        fx.root(RootDecl::static_field("S.cache", None, pts(&[3])));
        let mut unknown = RootDecl::formal("S.maybe", None, pts(&[5]));
        unknown.is_static = Tvl::Maybe;
        fx.root(unknown);
        fx.access(FieldAccess::new(f, pts(&[1]), pts(&[])));
        fx.access(FieldAccess::new(f, pts(&[3]), pts(&[4])));
        fx.access(FieldAccess::new(g, pts(&[4]), pts(&[])));
        fx.access(FieldAccess::new(f, pts(&[5]), pts(&[])));
        fx.access(FieldAccess::new(g, pts(&[5]), pts(&[])));

        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        assert_eq!(cx.size(), 5);
        run(&mut cx);
        assert_eq!(cx.size(), 4);
    }
}
