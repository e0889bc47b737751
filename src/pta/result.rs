// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Read-only view of a finished analysis.

use std::collections::BTreeSet;
use std::rc::Rc;

use super::solver::Solver;
use super::PointsTo;
use crate::context::{ContextId, Ctx};
use crate::cs::*;
use crate::graph::call_graph::{CSCallEdge, CSCallGraph};
use crate::graph::pag::Pointer;
use crate::ir::{CallSiteId, FieldId, MethodId, Program, VarId};
use crate::pts_set::points_to::PointsToSet;

/// The fixpoint reached by a [`Solver`]. Context-insensitive queries project
/// contexts away.
pub struct PointerAnalysisResult<'pta> {
    solver: Solver<'pta>,
}

impl<'pta> PointerAnalysisResult<'pta> {
    pub(crate) fn new(solver: Solver<'pta>) -> Self {
        PointerAnalysisResult { solver }
    }

    pub fn program(&self) -> &'pta Program {
        self.solver.program
    }

    pub fn csm(&self) -> &CSManager {
        &self.solver.csm
    }

    pub fn context(&self, cid: ContextId) -> Rc<Ctx> {
        self.solver.ctx_cache.get_context(cid)
    }

    pub fn num_contexts(&self) -> usize {
        self.solver.ctx_cache.len()
    }

    /// Number of work items processed by the solver.
    pub fn num_iterations(&self) -> usize {
        self.solver.iterations
    }

    fn pts_of(&self, pointer: &Pointer) -> PointsTo<CSObjId> {
        match self.solver.pag.get_node_id(pointer) {
            Some(node) => self.solver.pt_data.get_pts(node),
            None => PointsTo::new(),
        }
    }

    fn project(&self, pts: &PointsTo<CSObjId>, into: &mut BTreeSet<ObjId>) {
        into.extend(pts.iter().map(|cs_obj| self.solver.csm.cs_obj(cs_obj).obj));
    }

    /// Union of the points-to sets of the pointers that satisfy `pred`, without contexts.
    fn project_pointers<F>(&self, pred: F) -> BTreeSet<ObjId>
    where
        F: Fn(&Pointer) -> bool,
    {
        let mut objs = BTreeSet::new();
        for (node, pointer) in self.solver.pag.pointers() {
            if pred(&pointer) {
                self.project(&self.solver.pt_data.get_pts(node), &mut objs);
            }
        }
        objs
    }

    pub fn cs_points_to_set_of(&self, cs_var: CSVarId) -> BTreeSet<CSObjId> {
        self.pts_of(&Pointer::Var(cs_var)).iter().collect()
    }

    /// Objects `var` may point to under any context.
    pub fn points_to_set_of(&self, var: VarId) -> BTreeSet<ObjId> {
        let csm = &self.solver.csm;
        self.project_pointers(|p| matches!(p, Pointer::Var(v) if csm.cs_var(*v).var == var))
    }

    /// Objects stored in `field` of `obj`, under any heap context of `obj`.
    pub fn field_points_to_set_of(&self, obj: ObjId, field: FieldId) -> BTreeSet<ObjId> {
        let csm = &self.solver.csm;
        self.project_pointers(|p| {
            matches!(p, Pointer::InstanceField(o, f) if *f == field && csm.cs_obj(*o).obj == obj)
        })
    }

    pub fn array_points_to_set_of(&self, obj: ObjId) -> BTreeSet<ObjId> {
        let csm = &self.solver.csm;
        self.project_pointers(|p| matches!(p, Pointer::ArrayIndex(o) if csm.cs_obj(*o).obj == obj))
    }

    pub fn static_field_points_to_set_of(&self, field: FieldId) -> BTreeSet<ObjId> {
        let mut objs = BTreeSet::new();
        self.project(&self.pts_of(&Pointer::StaticField(field)), &mut objs);
        objs
    }

    /// All pointers with a non-empty points-to set.
    pub fn pointers(&self) -> impl Iterator<Item = (Pointer, PointsTo<CSObjId>)> + '_ {
        self.solver
            .pag
            .pointers()
            .map(move |(node, pointer)| (pointer, self.solver.pt_data.get_pts(node)))
            .filter(|(_, pts)| !pts.is_empty())
    }

    pub fn cs_call_graph(&self) -> &CSCallGraph {
        &self.solver.call_graph
    }

    pub fn cs_call_edges(&self) -> impl Iterator<Item = CSCallEdge> + '_ {
        self.solver.call_graph.edges()
    }

    /// The context-insensitive call graph, as call site and callee pairs.
    pub fn call_graph(&self) -> BTreeSet<(CallSiteId, MethodId)> {
        let csm = &self.solver.csm;
        self.cs_call_edges()
            .map(|edge| (csm.cs_callsite(edge.callsite).callsite, csm.cs_method(edge.callee).method))
            .collect()
    }

    pub fn callees_of(&self, callsite: CallSiteId) -> BTreeSet<MethodId> {
        self.call_graph()
            .into_iter()
            .filter(|(cs, _)| *cs == callsite)
            .map(|(_, callee)| callee)
            .collect()
    }

    pub fn reachable_methods(&self) -> BTreeSet<MethodId> {
        self.solver.reachable_methods.iter().copied().collect()
    }

    pub fn is_reachable(&self, method: MethodId) -> bool {
        self.solver.reachable_methods.contains(&method)
    }

    /// Receiver objects and call sites without a matching method.
    pub fn unresolved_calls(&self) -> &[(CSObjId, CSCallSiteId)] {
        &self.solver.unresolved_calls
    }

    pub fn num_pointers(&self) -> usize {
        self.solver.pag.num_nodes()
    }

    pub fn num_pfg_edges(&self) -> usize {
        self.solver.pag.num_edges()
    }

    /// A readable name of an abstract object.
    pub fn obj_name(&self, obj: ObjId) -> String {
        let program = self.program();
        let obj = self.solver.csm.get_obj(obj);
        match &obj.kind {
            ObjKind::Alloc(site) => program.alloc_site_name(*site),
            ObjKind::Mock(desc) => format!("<{}:{}>", desc, program.get_type(obj.ty).name),
        }
    }

    pub fn pointer_name(&self, pointer: &Pointer) -> String {
        let program = self.program();
        let csm = &self.solver.csm;
        match *pointer {
            Pointer::Var(cs_var) => {
                let CSVar { cid, var } = csm.cs_var(cs_var);
                format!("{:?}:{}", self.context(cid).elems(), program.var_name(var))
            }
            Pointer::StaticField(field) => program.field_name(field),
            Pointer::InstanceField(cs_obj, field) => {
                format!("{}.{}", self.cs_obj_name(cs_obj), program.get_field(field).name)
            }
            Pointer::ArrayIndex(cs_obj) => format!("{}[*]", self.cs_obj_name(cs_obj)),
        }
    }

    pub fn cs_obj_name(&self, cs_obj: CSObjId) -> String {
        let CSObj { cid, obj } = self.solver.csm.cs_obj(cs_obj);
        format!("{:?}:{}", self.context(cid).elems(), self.obj_name(obj))
    }
}
