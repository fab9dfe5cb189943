//! Cut off fields that are only reachable through immutable types:
//! they can never change. Inside a constructor of an immutable type
//! the fields of that type are merged instead, so the constructor's
//! side effects on its receiver stay visible.

use super::{cut_unreachable, BoundingCx};
use crate::candidates::Candidate;
use crate::entity::EntitySet;
use crate::program::{Program, TypeId};
use fxhash::FxHashSet;
use lazy_static::lazy_static;

lazy_static! {
    /// Boxed value types whose instances never change after
    /// construction.
    pub static ref DEFAULT_IMMUTABLES: FxHashSet<&'static str> = [
        "java.lang.String",
        "java.lang.Long",
        "java.lang.Character",
        "java.lang.Integer",
        "java.lang.Double",
        "java.lang.Boolean",
        "java.lang.Byte",
        "java.lang.Float",
        "java.lang.Short",
    ]
    .iter()
    .copied()
    .collect();
}

/// Resolves immutable type names against the program's type table.
/// Names the program never mentions are skipped.
pub fn resolve<'a, I: IntoIterator<Item = &'a str>>(
    program: &Program,
    names: I,
) -> EntitySet<TypeId> {
    names
        .into_iter()
        .filter_map(|name| program.type_by_name(name))
        .collect()
}

pub fn run(cx: &mut BoundingCx, immutables: &EntitySet<TypeId>, cut_unreachable_after: bool) {
    let merge_type = if cx.procedure.is_constructor {
        cx.procedure
            .declaring_type
            .filter(|&ty| immutables.contains(ty))
    } else {
        None
    };

    let mut cut: Vec<Candidate> = vec![];
    let mut merge: Vec<Candidate> = vec![];
    let candidates = cx.graph.roots().iter().copied().chain(cx.interface());
    for c in candidates {
        match cx.cands[c].ty() {
            Some(ty) if immutables.contains(ty) => {
                if Some(ty) == merge_type {
                    merge.push(c);
                } else {
                    cut.push(c);
                }
            }
            _ => {}
        }
    }
    if cut.is_empty() && merge.is_empty() {
        return;
    }
    log::trace!(
        "cut_immutables: {} to cut, {} to merge (merge type {:?})",
        cut.len(),
        merge.len(),
        merge_type
    );

    let mut reach_cut = if cut.is_empty() {
        EntitySet::new()
    } else {
        cx.find_reachable(cut.iter().copied())
    };
    let mut reach_merge = if merge.is_empty() {
        EntitySet::new()
    } else {
        cx.find_reachable(merge.iter().copied())
    };
    let cut_set: EntitySet<Candidate> = cut.iter().copied().collect();
    let merge_set: EntitySet<Candidate> = merge.iter().copied().collect();
    reach_cut.subtract(&reach_merge);
    reach_cut.subtract(&cut_set);
    reach_merge.subtract(&merge_set);

    for c in cx.fields_of(&reach_cut) {
        cx.remove(c);
    }
    let group = cx.fields_of(&reach_merge);
    cx.merge(&group);

    // Cutting may have orphaned more nodes.
    if !cut.is_empty() && cut_unreachable_after {
        cut_unreachable::run(cx);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::passes::testutil::*;
    use crate::program::{FieldAccess, RootDecl};
    use crate::tvl::Tvl;

    fn immutables(fx: &Fixture) -> EntitySet<TypeId> {
        resolve(&fx.program, DEFAULT_IMMUTABLES.iter().copied())
    }

    #[test]
    fn constructor_merges_own_type_and_cuts_others() {
        let _ = env_logger::try_init();
        let mut fx = Fixture::new();
        let integer = fx.program.add_type("java.lang.Integer");
        let string = fx.program.add_type("java.lang.String");
        fx.procedure.declaring_type = Some(integer);
        fx.procedure.is_constructor = true;

        let value = fx.field("value");
        let cache = fx.field("cache");
        let x = fx.field("x");
        let chars = fx.field("chars");
        let elem = fx.field("elem");
        fx.root(RootDecl::formal("this", Some(integer), pts(&[1])));
        fx.root(RootDecl::formal("s", Some(string), pts(&[5])));
        fx.access(FieldAccess::new(value, pts(&[1]), pts(&[])).primitive(Tvl::Yes));
        fx.access(FieldAccess::new(cache, pts(&[1]), pts(&[2])));
        fx.access(FieldAccess::new(x, pts(&[2]), pts(&[])));
        fx.access(FieldAccess::new(chars, pts(&[5]), pts(&[6])));
        fx.access(FieldAccess::new(elem, pts(&[6]), pts(&[])));

        let ims = immutables(&fx);
        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        assert_eq!(cx.size(), 5);
        run(&mut cx, &ims, true);
        assert_eq!(cx.size(), 1);
        let merged = cx.interface()[0];
        assert_eq!(cx.cands.field(merged).fields.len(), 3);
        assert!(!cx.cands.field(merged).fields.contains(chars));
    }

    #[test]
    fn immutable_reference_field_is_kept_outside_constructor() {
        let mut fx = Fixture::new();
        let string = fx.program.add_type("java.lang.String");
        let name = fx.field("name");
        let chars = fx.field("chars");
        fx.root(RootDecl::formal("p", None, pts(&[1])));
        fx.access(FieldAccess::new(name, pts(&[1]), pts(&[2])).with_type(string));
        fx.access(FieldAccess::new(chars, pts(&[2]), pts(&[3])));

        let ims = immutables(&fx);
        let mut cands = fx.candidates();
        let mut cx = BoundingCx::new(&mut cands, &fx.procedure);
        run(&mut cx, &ims, true);
        // `p.name` can still be reassigned; the string's contents cannot.
        assert_eq!(cx.size(), 1);
        assert!(cx.cands.field(cx.interface()[0]).fields.contains(name));
    }
}
