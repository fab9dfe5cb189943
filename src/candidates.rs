//! Mod/ref candidates: the abstract heap locations a procedure may
//! modify or reference, and the per-node interface models that hold
//! them.

use crate::entity;
use crate::entity::{EntitySet, EntityVec, PerEntity};
use crate::program::{CgNode, Field, FieldAccess, PointsToSet, Program, RootDecl, TypeId};
use crate::tvl::Tvl;
use fxhash::FxHashMap;
use std::ops::Index;

mod graph;
pub use graph::*;

entity!(Candidate, "c");

/// A root heap location: formal parameter, static field, or
/// exception value.
#[derive(Clone, Debug)]
pub struct RootCandidate {
    pub name: String,
    pub ty: Option<TypeId>,
    pub is_static: Tvl,
    pub is_exception: Tvl,
    pub pts: PointsToSet,
}

/// A location one field dereference away from a root or from
/// another field candidate.
#[derive(Clone, Debug)]
pub struct FieldCandidate {
    /// Underlying fields. Never empty.
    pub fields: EntitySet<Field>,
    /// Objects whose field is accessed.
    pub bases: PointsToSet,
    /// Objects the field value may point to.
    pub pts: PointsToSet,
    pub ty: Option<TypeId>,
    pub is_primitive: Tvl,
    /// Unmerged candidates this one stands for.
    pub origin: EntitySet<Candidate>,
}

impl FieldCandidate {
    pub fn is_reachable_from(&self, reaching: &PointsToSet) -> bool {
        self.bases.intersects(reaching)
    }

    fn absorb(&mut self, other: &FieldCandidate) {
        self.fields.union_with(&other.fields);
        self.bases.union_with(&other.bases);
        self.pts.union_with(&other.pts);
        self.origin.union_with(&other.origin);
        if self.ty != other.ty {
            self.ty = None;
        }
        self.is_primitive = self.is_primitive.join(other.is_primitive);
    }
}

#[derive(Clone, Debug)]
pub enum CandidateData {
    Root(RootCandidate),
    Field(FieldCandidate),
}

impl CandidateData {
    pub fn pts(&self) -> &PointsToSet {
        match self {
            CandidateData::Root(root) => &root.pts,
            CandidateData::Field(field) => &field.pts,
        }
    }

    pub fn ty(&self) -> Option<TypeId> {
        match self {
            CandidateData::Root(root) => root.ty,
            CandidateData::Field(field) => field.ty,
        }
    }

    /// Roots are references and never primitive.
    pub fn is_primitive(&self) -> Tvl {
        match self {
            CandidateData::Root(_) => Tvl::No,
            CandidateData::Field(field) => field.is_primitive,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, CandidateData::Field(_))
    }

    pub fn as_root(&self) -> Option<&RootCandidate> {
        match self {
            CandidateData::Root(root) => Some(root),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldCandidate> {
        match self {
            CandidateData::Field(field) => Some(field),
            _ => None,
        }
    }
}

/// The live set of field candidates forming one call-graph node's
/// interface.
#[derive(Clone, Debug, Default)]
pub struct InterProcCandidateModel {
    cands: EntitySet<Candidate>,
}

impl InterProcCandidateModel {
    pub fn contains(&self, c: Candidate) -> bool {
        self.cands.contains(c)
    }

    pub fn len(&self) -> usize {
        self.cands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.cands.iter()
    }

    pub fn candidates(&self) -> &EntitySet<Candidate> {
        &self.cands
    }
}

/// Arena of all candidates of one run, with the local (generated)
/// and current interface sets of every call-graph node.
#[derive(Clone, Debug, Default)]
pub struct ModRefCandidates {
    arena: EntityVec<Candidate, CandidateData>,
    by_access: FxHashMap<(Field, PointsToSet), Candidate>,
    locals: PerEntity<CgNode, EntitySet<Candidate>>,
    models: PerEntity<CgNode, InterProcCandidateModel>,
    touched: EntitySet<CgNode>,
}

impl Index<Candidate> for ModRefCandidates {
    type Output = CandidateData;
    fn index(&self, c: Candidate) -> &CandidateData {
        &self.arena[c]
    }
}

impl ModRefCandidates {
    pub fn new() -> ModRefCandidates {
        ModRefCandidates::default()
    }

    /// Creates one candidate per distinct field access and seeds
    /// every node's local set and interface with the accesses it
    /// performs itself.
    pub fn compute_intraproc(program: &Program) -> ModRefCandidates {
        let mut ret = ModRefCandidates::new();
        for node in program.callgraph.nodes() {
            for access in &program.callgraph.node(node).accesses {
                let c = ret.add_field_candidate(access);
                ret.locals[node].insert(c);
                ret.models[node].cands.insert(c);
                ret.touched.insert(node);
            }
        }
        log::debug!(
            "compute_intraproc: {} candidates for {} call-graph nodes",
            ret.arena.len(),
            program.callgraph.len()
        );
        ret
    }

    /// Returns the candidate for `access`, creating it on first use.
    /// Repeated accesses of the same field on the same bases share
    /// one candidate.
    pub fn add_field_candidate(&mut self, access: &FieldAccess) -> Candidate {
        let key = (access.field, access.bases.clone());
        if let Some(&c) = self.by_access.get(&key) {
            if let CandidateData::Field(field) = &mut self.arena[c] {
                field.pts.union_with(&access.pts);
                field.is_primitive = field.is_primitive.join(access.is_primitive);
                if field.ty != access.ty {
                    field.ty = None;
                }
            }
            return c;
        }
        let c = self.arena.push(CandidateData::Field(FieldCandidate {
            fields: std::iter::once(access.field).collect(),
            bases: access.bases.clone(),
            pts: access.pts.clone(),
            ty: access.ty,
            is_primitive: access.is_primitive,
            origin: EntitySet::new(),
        }));
        if let CandidateData::Field(field) = &mut self.arena[c] {
            field.origin.insert(c);
        }
        self.by_access.insert(key, c);
        log::trace!("add_field_candidate: {} for {}", c, access.field);
        c
    }

    pub fn add_root(&mut self, decl: &RootDecl) -> Candidate {
        self.arena.push(CandidateData::Root(RootCandidate {
            name: decl.name.clone(),
            ty: decl.ty,
            is_static: decl.is_static,
            is_exception: decl.is_exception,
            pts: decl.pts.clone(),
        }))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn field(&self, c: Candidate) -> &FieldCandidate {
        match &self.arena[c] {
            CandidateData::Field(field) => field,
            CandidateData::Root(root) => panic!("{} ({}) is a root, not a field", c, root.name),
        }
    }

    pub fn root(&self, c: Candidate) -> &RootCandidate {
        match &self.arena[c] {
            CandidateData::Root(root) => root,
            CandidateData::Field(_) => panic!("{} is a field, not a root", c),
        }
    }

    pub fn locals(&self, node: CgNode) -> &EntitySet<Candidate> {
        &self.locals[node]
    }

    pub fn interface(&self, node: CgNode) -> &InterProcCandidateModel {
        &self.models[node]
    }

    /// Total interface size over all nodes.
    pub fn count_candidates(&self) -> usize {
        self.touched.iter().map(|node| self.models[node].len()).sum()
    }

    pub fn add_candidate(&mut self, node: CgNode, c: Candidate) {
        assert!(self.arena[c].is_field(), "{} is not a field candidate", c);
        self.models[node].cands.insert(c);
        self.touched.insert(node);
    }

    pub fn remove_candidate(&mut self, node: CgNode, c: Candidate) -> bool {
        let removed = self.models[node].cands.remove(c);
        if removed {
            log::trace!("remove_candidate: {} from {}", c, node);
        }
        removed
    }

    /// Replaces `cands` in `node`'s interface by a single candidate
    /// standing for all of them. A single candidate merges to
    /// itself.
    pub fn merge_candidates(&mut self, node: CgNode, cands: &[Candidate]) -> Candidate {
        assert!(!cands.is_empty(), "merge of zero candidates");
        if cands.len() == 1 {
            self.add_candidate(node, cands[0]);
            return cands[0];
        }
        let mut merged = self.field(cands[0]).clone();
        for &c in &cands[1..] {
            merged.absorb(self.field(c));
        }
        assert!(
            !merged.fields.is_empty(),
            "merged candidate of {:?} has no fields",
            cands
        );
        let m = self.arena.push(CandidateData::Field(merged));
        for &c in cands {
            self.models[node].cands.remove(c);
        }
        self.models[node].cands.insert(m);
        self.touched.insert(node);
        log::trace!("merge_candidates: {:?} into {} at {}", cands, m, node);
        m
    }

    /// Folds `folded` into `node`'s interface as one candidate,
    /// together with every interface candidate that already stands
    /// for part of it.
    pub fn fold_into(&mut self, node: CgNode, folded: &EntitySet<Candidate>) -> Option<Candidate> {
        if folded.is_empty() {
            return None;
        }
        let mut origin = EntitySet::new();
        for c in folded.iter() {
            origin.union_with(&self.field(c).origin);
        }
        let mut group: Vec<Candidate> = folded.iter().collect();
        for c in self.models[node].iter() {
            if !folded.contains(c) && self.field(c).origin.intersects(&origin) {
                group.push(c);
            }
        }
        Some(self.merge_candidates(node, &group))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::program::{CgNodeKind, InstanceKey};

    fn pts(items: &[u32]) -> PointsToSet {
        items.iter().map(|&i| InstanceKey::from(i)).collect()
    }

    fn setup() -> (ModRefCandidates, CgNode, Vec<Candidate>) {
        let mut program = Program::new();
        let node = program.callgraph.add_node("m", CgNodeKind::Normal);
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            let field = program.add_field(name);
            program.callgraph.add_access(
                node,
                FieldAccess::new(field, pts(&[i as u32]), pts(&[10 + i as u32])),
            );
        }
        let cands = ModRefCandidates::compute_intraproc(&program);
        let all = cands.interface(node).iter().collect();
        (cands, node, all)
    }

    #[test]
    fn same_access_shares_candidate() {
        let mut program = Program::new();
        let f = program.add_field("f");
        let a = program.callgraph.add_node("a", CgNodeKind::Normal);
        let b = program.callgraph.add_node("b", CgNodeKind::Normal);
        program
            .callgraph
            .add_access(a, FieldAccess::new(f, pts(&[1]), pts(&[2])));
        program
            .callgraph
            .add_access(b, FieldAccess::new(f, pts(&[1]), pts(&[3])));
        let cands = ModRefCandidates::compute_intraproc(&program);
        assert_eq!(cands.len(), 1);
        let c = cands.interface(a).iter().next().unwrap();
        assert!(cands.interface(b).contains(c));
        assert_eq!(cands.field(c).pts, pts(&[2, 3]));
        assert_eq!(cands.count_candidates(), 2);
    }

    #[test]
    fn merge_is_order_independent() {
        let (mut stepwise, node, all) = setup();
        let ab = stepwise.merge_candidates(node, &[all[0], all[1]]);
        let abc = stepwise.merge_candidates(node, &[ab, all[2]]);

        let (mut direct, node2, all2) = setup();
        let abc2 = direct.merge_candidates(node2, &[all2[2], all2[0], all2[1]]);

        assert_eq!(stepwise.field(abc).fields, direct.field(abc2).fields);
        assert_eq!(stepwise.field(abc).origin, direct.field(abc2).origin);
        assert_eq!(stepwise.interface(node).len(), 1);
        assert_eq!(direct.interface(node2).len(), 1);
    }

    #[test]
    fn merge_joins_classification() {
        let mut program = Program::new();
        let node = program.callgraph.add_node("m", CgNodeKind::Normal);
        let int_ty = program.add_type("int");
        let f = program.add_field("f");
        let g = program.add_field("g");
        program.callgraph.add_access(
            node,
            FieldAccess::new(f, pts(&[1]), pts(&[])).primitive(Tvl::Yes).with_type(int_ty),
        );
        program
            .callgraph
            .add_access(node, FieldAccess::new(g, pts(&[1]), pts(&[2])));
        let mut cands = ModRefCandidates::compute_intraproc(&program);
        let all: Vec<_> = cands.interface(node).iter().collect();
        let m = cands.merge_candidates(node, &all);
        assert_eq!(cands.field(m).is_primitive, Tvl::Maybe);
        assert_eq!(cands.field(m).ty, None);
        assert_eq!(cands.field(m).fields.len(), 2);
    }

    #[test]
    fn fold_pulls_in_overlapping_merges() {
        let (mut cands, node, all) = setup();
        let ab = cands.merge_candidates(node, &[all[0], all[1]]);
        let folded: EntitySet<Candidate> = std::iter::once(all[1]).collect();
        let m = cands.fold_into(node, &folded).unwrap();
        assert!(!cands.interface(node).contains(ab));
        assert_eq!(cands.interface(node).len(), 2);
        assert_eq!(cands.field(m).origin.len(), 2);
    }
}
