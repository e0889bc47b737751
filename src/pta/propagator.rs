// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Propagation rules of the solver: statements become PAG edges, new points-to
//! facts flow along those edges and resolve the calls they reach.

use log::*;

use super::solver::Solver;
use super::worklist::WorkItem;
use super::{NodeId, PointsTo};
use crate::context::ContextId;
use crate::cs::*;
use crate::graph::call_graph::CSCallEdge;
use crate::graph::pag::{FieldRef, PAGEdgeEnum, Pointer, PAG};
use crate::ir::{MethodId, Stmt, VarId};
use crate::pts_set::points_to::PointsToSet;

impl<'pta> Solver<'pta> {
    /// Adds the constraints of a method that just became reachable under a context.
    pub(crate) fn process_new_cs_method(&mut self, cs_method: CSMethodId) {
        let CSMethod { cid, method } = self.csm.cs_method(cs_method);
        if self.reachable_methods.insert(method) {
            debug!("New reachable method: {}", self.program.method_name(method));
            self.dispatch(|plugin, solver| plugin.on_new_method(solver, method));
        }
        let program = self.program;
        for stmt in &program.get_method(method).stmts {
            self.process_stmt(cid, method, stmt);
        }
        self.dispatch(|plugin, solver| plugin.on_new_cs_method(solver, cs_method));
    }

    fn process_stmt(&mut self, cid: ContextId, method: MethodId, stmt: &Stmt) {
        match *stmt {
            Stmt::New { lhs, site } => {
                let obj = self.csm.alloc_obj(self.program, site);
                let method_ctx = self.ctx_cache.get_context(cid);
                let heap_ctx = self
                    .selector
                    .select_heap_context(&method_ctx, method, self.csm.get_obj(obj));
                let heap_cid = self.ctx_cache.get_context_id(&heap_ctx);
                let cs_obj = self.csm.get_cs_obj(heap_cid, obj);
                let lhs = self.var_node(cid, lhs);
                self.add_pts(lhs, cs_obj);
            }
            Stmt::Copy { lhs, rhs } => {
                let src = self.var_node(cid, rhs);
                let dst = self.var_node(cid, lhs);
                self.add_flow_edge(src, dst, PAGEdgeEnum::DirectPAGEdge);
            }
            Stmt::Cast { lhs, rhs, ty } => {
                let src = self.var_node(cid, rhs);
                let dst = self.var_node(cid, lhs);
                self.add_flow_edge(src, dst, PAGEdgeEnum::CastPAGEdge(ty));
            }
            Stmt::LoadStatic { lhs, field } => {
                let src = self.pointer_node(Pointer::StaticField(field));
                let dst = self.var_node(cid, lhs);
                self.add_flow_edge(src, dst, PAGEdgeEnum::DirectPAGEdge);
            }
            Stmt::StoreStatic { field, rhs } => {
                let src = self.var_node(cid, rhs);
                let dst = self.pointer_node(Pointer::StaticField(field));
                self.add_flow_edge(src, dst, PAGEdgeEnum::DirectPAGEdge);
            }
            Stmt::LoadField { lhs, base, field } => {
                self.add_load(cid, lhs, base, FieldRef::Field(field));
            }
            Stmt::LoadArray { lhs, base } => {
                self.add_load(cid, lhs, base, FieldRef::ArrayElem);
            }
            Stmt::StoreField { base, field, rhs } => {
                self.add_store(cid, base, FieldRef::Field(field), rhs);
            }
            Stmt::StoreArray { base, rhs } => {
                self.add_store(cid, base, FieldRef::ArrayElem, rhs);
            }
            Stmt::Invoke(callsite) => {
                let cs_callsite = self.csm.get_cs_callsite(cid, callsite);
                self.process_call_site(cs_callsite);
            }
            Stmt::Return(_) => {}
        }
    }

    /// `lhs = base.field`
    fn add_load(&mut self, cid: ContextId, lhs: VarId, base: VarId, field: FieldRef) {
        let base = self.var_node(cid, base);
        let lhs = self.var_node(cid, lhs);
        if self.pag.add_edge(base, lhs, PAGEdgeEnum::LoadPAGEdge(field)).is_none() {
            return;
        }
        if let Some(base_pts) = self.pt_data.get_propa_pts(base).cloned() {
            for cs_obj in base_pts.iter() {
                let src = self.pointer_node(Pointer::field_of(cs_obj, field));
                self.add_flow_edge(src, lhs, PAGEdgeEnum::DirectPAGEdge);
            }
        }
    }

    /// `base.field = rhs`
    fn add_store(&mut self, cid: ContextId, base: VarId, field: FieldRef, rhs: VarId) {
        let base = self.var_node(cid, base);
        let rhs = self.var_node(cid, rhs);
        if self.pag.add_edge(rhs, base, PAGEdgeEnum::StorePAGEdge(field)).is_none() {
            return;
        }
        if let Some(base_pts) = self.pt_data.get_propa_pts(base).cloned() {
            for cs_obj in base_pts.iter() {
                let dst = self.pointer_node(Pointer::field_of(cs_obj, field));
                self.add_flow_edge(rhs, dst, PAGEdgeEnum::DirectPAGEdge);
            }
        }
    }

    /// Handles the objects `delta` that just reached `node`.
    pub(crate) fn process_pointer(&mut self, node: NodeId, delta: PointsTo<CSObjId>) {
        self.handle_flow(node, &delta);
        let Pointer::Var(cs_var) = self.pag.node_pointer(node) else {
            return;
        };
        self.handle_load_and_store(node, &delta);
        self.handle_instance_calls(node, &delta);
        self.dispatch(|plugin, solver| plugin.on_new_points_to_set(solver, cs_var, &delta));
    }

    /// Process all outgoing direct and cast edges of the node.
    fn handle_flow(&mut self, node: NodeId, delta: &PointsTo<CSObjId>) {
        let flow_out_edges = PAG::take_edges(&mut self.pag.flow_out_edges, node);
        for edge in &flow_out_edges {
            let (_, dst) = self.pag.edge_endpoints(*edge);
            let kind = self.pag.get_edge(*edge).kind;
            let pts = self.filter_pts(delta, kind);
            self.propagate_to(dst, &pts);
        }
        PAG::restore_edges(&mut self.pag.flow_out_edges, node, flow_out_edges);
    }

    /// Process all outgoing load edges and incoming store edges of a base variable.
    /// o \in delta, base --load f--> lhs  ==>  o.f --direct--> lhs
    /// o \in delta, rhs --store f--> base ==>  rhs --direct--> o.f
    fn handle_load_and_store(&mut self, node: NodeId, delta: &PointsTo<CSObjId>) {
        let load_out_edges = PAG::take_edges(&mut self.pag.load_out_edges, node);
        for edge in &load_out_edges {
            let (_, lhs) = self.pag.edge_endpoints(*edge);
            let PAGEdgeEnum::LoadPAGEdge(field) = self.pag.get_edge(*edge).kind else {
                unreachable!()
            };
            for cs_obj in delta.iter() {
                let src = self.pointer_node(Pointer::field_of(cs_obj, field));
                self.add_flow_edge(src, lhs, PAGEdgeEnum::DirectPAGEdge);
            }
        }
        PAG::restore_edges(&mut self.pag.load_out_edges, node, load_out_edges);

        let store_in_edges = PAG::take_edges(&mut self.pag.store_in_edges, node);
        for edge in &store_in_edges {
            let (rhs, _) = self.pag.edge_endpoints(*edge);
            let PAGEdgeEnum::StorePAGEdge(field) = self.pag.get_edge(*edge).kind else {
                unreachable!()
            };
            for cs_obj in delta.iter() {
                let dst = self.pointer_node(Pointer::field_of(cs_obj, field));
                self.add_flow_edge(rhs, dst, PAGEdgeEnum::DirectPAGEdge);
            }
        }
        PAG::restore_edges(&mut self.pag.store_in_edges, node, store_in_edges);
    }

    /// If the node is the receiver of some calls, dispatch them on the new objects.
    fn handle_instance_calls(&mut self, node: NodeId, delta: &PointsTo<CSObjId>) {
        let Some(callsites) = self.assoc_calls.get(&node).cloned() else {
            return;
        };
        for cs_obj in delta.iter() {
            for cs_callsite in &callsites {
                self.process_instance_call(*cs_callsite, cs_obj);
            }
        }
    }

    fn process_call_site(&mut self, cs_callsite: CSCallSiteId) {
        let CSCallSite { cid, callsite } = self.csm.cs_callsite(cs_callsite);
        let program = self.program;
        let cs = program.get_call_site(callsite);
        match cs.receiver {
            Some(recv) if cs.kind.has_receiver() => {
                let recv = self.var_node(cid, recv);
                let callsites = self.assoc_calls.entry(recv).or_default();
                if callsites.contains(&cs_callsite) {
                    return;
                }
                callsites.push(cs_callsite);
                if let Some(recv_pts) = self.pt_data.get_propa_pts(recv).cloned() {
                    for cs_obj in recv_pts.iter() {
                        self.process_instance_call(cs_callsite, cs_obj);
                    }
                }
            }
            _ => self.process_static_call(cs_callsite),
        }
    }

    /// Dispatches an instance call on the receiver object `recv` and binds the
    /// object to `this` of the callee.
    pub(crate) fn process_instance_call(&mut self, cs_callsite: CSCallSiteId, recv: CSObjId) {
        let CSCallSite { cid, callsite } = self.csm.cs_callsite(cs_callsite);
        let CSObj { cid: heap_cid, obj } = self.csm.cs_obj(recv);
        let recv_ty = self.csm.get_obj(obj).ty;
        let Some(callee) = self.resolver.resolve_callee(Some(recv_ty), callsite) else {
            self.report_unresolved_call(recv, cs_callsite);
            return;
        };

        let caller_ctx = self.ctx_cache.get_context(cid);
        let recv_ctx = self.ctx_cache.get_context(heap_cid);
        let callee_ctx = self.selector.select_instance_context(
            &caller_ctx,
            callsite,
            &recv_ctx,
            (obj, self.csm.get_obj(obj)),
            callee,
        );
        let callee_cid = self.ctx_cache.get_context_id(&callee_ctx);
        let cs_callee = self.csm.get_cs_method(callee_cid, callee);
        let program = self.program;
        if let Some(this) = program.get_method(callee).this_var {
            let this = self.var_node(callee_cid, this);
            self.add_pts(this, recv);
        }
        self.worklist.push(WorkItem::CallEdge(CSCallEdge {
            kind: program.get_call_site(callsite).kind,
            callsite: cs_callsite,
            callee: cs_callee,
        }));
    }

    fn process_static_call(&mut self, cs_callsite: CSCallSiteId) {
        let CSCallSite { cid, callsite } = self.csm.cs_callsite(cs_callsite);
        let Some(callee) = self.resolver.resolve_callee(None, callsite) else {
            warn!(
                "Cannot resolve the callee of {}, the call is ignored",
                self.program.call_site_name(callsite)
            );
            return;
        };
        let caller_ctx = self.ctx_cache.get_context(cid);
        let callee_ctx = self.selector.select_context(&caller_ctx, callsite, callee);
        let callee_cid = self.ctx_cache.get_context_id(&callee_ctx);
        let cs_callee = self.csm.get_cs_method(callee_cid, callee);
        self.worklist.push(WorkItem::CallEdge(CSCallEdge {
            kind: self.program.get_call_site(callsite).kind,
            callsite: cs_callsite,
            callee: cs_callee,
        }));
    }

    /// Adds a resolved call edge to the call graph, then passes arguments to the
    /// callee's parameters and its return values to the call result. Edges whose
    /// caller has not been reached are dropped.
    pub(crate) fn process_call_edge(&mut self, edge: CSCallEdge) {
        let caller = self.csm.callsite_container(self.program, edge.callsite);
        if !self.call_graph.contains_func(caller) {
            let callsite = self.csm.cs_callsite(edge.callsite).callsite;
            warn!(
                "Ignoring call edge from {}: the caller is not reachable",
                self.program.call_site_name(callsite)
            );
            return;
        }
        if !self.call_graph.add_edge(caller, edge) {
            return;
        }
        let CSCallSite { cid: caller_cid, callsite } = self.csm.cs_callsite(edge.callsite);
        let CSMethod { cid: callee_cid, method: callee } = self.csm.cs_method(edge.callee);
        debug!(
            "New call edge: {} -> {} ({:?})",
            self.program.call_site_name(callsite),
            self.program.method_name(callee),
            edge.kind
        );
        self.process_reach_funcs();

        let program = self.program;
        let cs = program.get_call_site(callsite);
        let callee_method = program.get_method(callee);
        for (arg, param) in cs.args.iter().zip(&callee_method.params) {
            let src = self.var_node(caller_cid, *arg);
            let dst = self.var_node(callee_cid, *param);
            self.add_flow_edge(src, dst, PAGEdgeEnum::DirectPAGEdge);
        }
        if let Some(result) = cs.result {
            let dst = self.var_node(caller_cid, result);
            for ret in &callee_method.return_vars {
                let src = self.var_node(callee_cid, *ret);
                self.add_flow_edge(src, dst, PAGEdgeEnum::DirectPAGEdge);
            }
        }
        self.dispatch(|plugin, solver| plugin.on_new_call_edge(solver, &edge));
    }
}
