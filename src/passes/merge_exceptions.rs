//! Merge all fields that are only reachable through an exception
//! value into a single candidate.

use super::BoundingCx;
use crate::candidates::Candidate;

pub fn run(cx: &mut BoundingCx) {
    let (exc, normal): (Vec<Candidate>, Vec<Candidate>) = cx
        .graph
        .roots()
        .iter()
        .copied()
        .partition(|&r| cx.cands.root(r).is_exception.is_true());
    if exc.is_empty() {
        return;
    }

    let mut only_exc = cx.find_reachable(exc);
    only_exc.subtract(&cx.find_reachable(normal));
    let group = cx.fields_of(&only_exc);
    if let Some(m) = cx.merge(&group) {
        log::trace!("merge_exceptions: {} candidates into {}", group.len(), m);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::passes::testutil::*;
    use crate::program::{FieldAccess, RootDecl};

    #[test]
    fn merges_exception_only_fields() {
        let mut fx = Fixture::new();
        let msg = fx.field("msg");
        let cause = fx.field("cause");
        let f = fx.field("f");
        fx.root(RootDecl::formal("p", None, pts(&[1])));
        fx.root(RootDecl::exception(None, pts(&[5])));
        fx.access(FieldAccess::new(f, pts(&[1]), pts(&[7])));
        fx.access(FieldAccess::new(msg, pts(&[5]), pts(&[6])));
        fx.access(FieldAccess::new(cause, pts(&[5]), pts(&[5])));
        // Shared with the normal root: must stay separate.
        fx.access(FieldAccess::new(f, pts(&[7]), pts(&[])));
        fx.access(FieldAccess::new(msg, pts(&[1]), pts(&[])));

        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        assert_eq!(cx.size(), 5);
        run(&mut cx);
        assert_eq!(cx.size(), 4);
        run(&mut cx);
        assert_eq!(cx.size(), 4);
    }
}
