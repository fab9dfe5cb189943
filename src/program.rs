//! Analysis inputs supplied by the surrounding dependence-graph
//! builder: call graph, type table, field registry, points-to sets,
//! and per-procedure metadata.
//!
//! Nothing in here is computed by this crate. Any sound
//! over-approximating supplier may fill these tables in.

use crate::entity;
use crate::entity::{EntitySet, EntityVec, PerEntity};
use crate::tvl::Tvl;

mod callgraph;
pub use callgraph::*;

entity!(TypeId, "t");
entity!(Field, "f");
entity!(InstanceKey, "ik");

/// Abstract allocation sites a value may refer to.
pub type PointsToSet = EntitySet<InstanceKey>;

#[derive(Clone, Debug)]
pub struct TypeData {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct FieldData {
    pub name: String,
}

/// A heap root of a procedure: a formal parameter, a static field, or
/// the exception value.
#[derive(Clone, Debug)]
pub struct RootDecl {
    pub name: String,
    pub ty: Option<TypeId>,
    pub is_static: Tvl,
    pub is_exception: Tvl,
    pub pts: PointsToSet,
}

impl RootDecl {
    pub fn formal(name: &str, ty: Option<TypeId>, pts: PointsToSet) -> RootDecl {
        RootDecl {
            name: name.to_string(),
            ty,
            is_static: Tvl::No,
            is_exception: Tvl::No,
            pts,
        }
    }

    pub fn static_field(name: &str, ty: Option<TypeId>, pts: PointsToSet) -> RootDecl {
        RootDecl {
            is_static: Tvl::Yes,
            ..RootDecl::formal(name, ty, pts)
        }
    }

    pub fn exception(ty: Option<TypeId>, pts: PointsToSet) -> RootDecl {
        RootDecl {
            is_exception: Tvl::Yes,
            ..RootDecl::formal("exc", ty, pts)
        }
    }
}

/// One field dereference performed directly by a call-graph node:
/// field `field` of any object in `bases`, whose value may point to
/// `pts`.
#[derive(Clone, Debug)]
pub struct FieldAccess {
    pub field: Field,
    pub bases: PointsToSet,
    pub pts: PointsToSet,
    pub ty: Option<TypeId>,
    pub is_primitive: Tvl,
}

impl FieldAccess {
    pub fn new(field: Field, bases: PointsToSet, pts: PointsToSet) -> FieldAccess {
        FieldAccess {
            field,
            bases,
            pts,
            ty: None,
            is_primitive: Tvl::No,
        }
    }

    pub fn with_type(mut self, ty: TypeId) -> FieldAccess {
        self.ty = Some(ty);
        self
    }

    pub fn primitive(mut self, is_primitive: Tvl) -> FieldAccess {
        self.is_primitive = is_primitive;
        self
    }
}

/// Metadata for a call-graph node that gets its own dependence graph.
#[derive(Clone, Debug, Default)]
pub struct Procedure {
    pub node: CgNode,
    pub name: String,
    pub declaring_type: Option<TypeId>,
    pub is_constructor: bool,
    pub roots: Vec<RootDecl>,
}

impl Procedure {
    pub fn new(node: CgNode, name: &str) -> Procedure {
        Procedure {
            node,
            name: name.to_string(),
            ..Procedure::default()
        }
    }

    /// Union of the points-to sets of all roots.
    pub fn root_pts(&self) -> PointsToSet {
        let mut pts = PointsToSet::new();
        for root in &self.roots {
            pts.union_with(&root.pts);
        }
        pts
    }
}

#[derive(Clone, Debug, Default)]
pub struct Program {
    pub callgraph: CallGraph,
    pub types: EntityVec<TypeId, TypeData>,
    pub fields: EntityVec<Field, FieldData>,
    procedures: PerEntity<CgNode, Option<Procedure>>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    /// Interns a type name.
    pub fn add_type(&mut self, name: &str) -> TypeId {
        match self.type_by_name(name) {
            Some(ty) => ty,
            None => self.types.push(TypeData {
                name: name.to_string(),
            }),
        }
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types
            .entries()
            .find(|(_, data)| data.name == name)
            .map(|(ty, _)| ty)
    }

    pub fn add_field(&mut self, name: &str) -> Field {
        self.fields.push(FieldData {
            name: name.to_string(),
        })
    }

    pub fn add_procedure(&mut self, procedure: Procedure) {
        let node = procedure.node;
        log::trace!("add_procedure: {} at {}", procedure.name, node);
        self.procedures[node] = Some(procedure);
    }

    pub fn procedure(&self, node: CgNode) -> Option<&Procedure> {
        self.procedures[node].as_ref()
    }

    /// All procedures, in call-graph node order.
    pub fn procedures(&self) -> impl Iterator<Item = &Procedure> + '_ {
        self.callgraph
            .nodes()
            .filter_map(move |node| self.procedure(node))
    }
}
