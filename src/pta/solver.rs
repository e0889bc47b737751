// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The worklist solver.
//!
//! Points-to sets and the call graph are computed together. The solver owns all
//! mutable analysis state; plugins reach it only through the methods below, which
//! either read snapshots or enqueue monotone work.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

use log::*;

use super::result::PointerAnalysisResult;
use super::worklist::{WorkItem, WorkList, WorklistOrder};
use super::{DiffPTDataTy, NodeId, PointsTo};
use crate::context::{ContextCache, ContextElem, ContextId, ContextSelector, Ctx};
use crate::cs::*;
use crate::graph::call_graph::{CSCallEdge, CSCallGraph};
use crate::graph::pag::{PAGEdgeEnum, Pointer, PAG};
use crate::ir::hierarchy::{ClassHierarchy, DispatchResolver};
use crate::ir::{CallSiteId, MethodId, Program, TypeId, VarId};
use crate::plugin::Plugin;
use crate::pts_set::points_to::PointsToSet;

pub struct Solver<'pta> {
    pub(crate) program: &'pta Program,
    pub(crate) resolver: Box<dyn DispatchResolver + 'pta>,
    pub(crate) selector: Box<dyn ContextSelector + 'pta>,
    plugins: Vec<Box<dyn Plugin + 'pta>>,
    /// Set while plugins are being notified.
    dispatching: bool,

    pub(crate) ctx_cache: ContextCache<ContextElem>,
    pub(crate) csm: CSManager,
    /// Pointer Assignment Graph
    pub(crate) pag: PAG,
    /// Points-to data
    pub(crate) pt_data: DiffPTDataTy,
    pub(crate) call_graph: CSCallGraph,
    pub(crate) worklist: WorkList,

    /// Methods reachable under at least one context.
    pub(crate) reachable_methods: HashSet<MethodId>,
    /// Instance call sites waiting on the points-to set of their receiver.
    pub(crate) assoc_calls: HashMap<NodeId, Vec<CSCallSiteId>>,
    unresolved: HashSet<(CSObjId, CSCallSiteId)>,
    /// Receiver objects and call sites that could not be resolved, in discovery order.
    pub(crate) unresolved_calls: Vec<(CSObjId, CSCallSiteId)>,
    /// Number of processed work items.
    pub(crate) iterations: usize,
}

impl<'pta> Debug for Solver<'pta> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        "Solver".fmt(f)
    }
}

/// Constructor
impl<'pta> Solver<'pta> {
    pub fn new(
        program: &'pta Program,
        selector: Box<dyn ContextSelector + 'pta>,
        order: WorklistOrder,
    ) -> Self {
        Solver {
            program,
            resolver: Box::new(ClassHierarchy::new(program)),
            selector,
            plugins: Vec::new(),
            dispatching: false,
            ctx_cache: ContextCache::new(),
            csm: CSManager::new(),
            pag: PAG::new(),
            pt_data: DiffPTDataTy::new(),
            call_graph: CSCallGraph::new(),
            worklist: WorkList::new(order),
            reachable_methods: HashSet::new(),
            assoc_calls: HashMap::new(),
            unresolved: HashSet::new(),
            unresolved_calls: Vec::new(),
            iterations: 0,
        }
    }

    /// Replaces the default class hierarchy based resolver.
    pub fn with_resolver(mut self, resolver: Box<dyn DispatchResolver + 'pta>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Registers a plugin. Plugins are notified in registration order.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin + 'pta>) {
        assert!(!self.dispatching, "plugins cannot be registered during event dispatch");
        self.plugins.push(plugin);
    }
}

/// Main loop
impl<'pta> Solver<'pta> {
    /// Runs the analysis to its fixpoint.
    pub fn solve(mut self) -> PointerAnalysisResult<'pta> {
        info!(
            "Start {} pointer analysis from {} entry method(s)",
            self.selector.name(),
            self.program.entry_methods().len()
        );
        self.dispatch(|plugin, solver| plugin.on_start(solver));
        let program = self.program;
        for entry in program.entry_methods() {
            self.add_entry_method(*entry);
        }

        self.solve_worklist();
        debug_assert!(self.pt_data.is_quiescent());

        let mut plugins = std::mem::take(&mut self.plugins);
        for plugin in plugins.iter_mut() {
            plugin.on_finish(&self);
        }
        info!(
            "Pointer analysis finished after {} iterations: {} reachable methods, {} call edges",
            self.iterations,
            self.reachable_methods.len(),
            self.call_graph.num_edges()
        );
        PointerAnalysisResult::new(self)
    }

    fn solve_worklist(&mut self) {
        loop {
            self.process_reach_funcs();
            let Some(item) = self.worklist.pop() else {
                break;
            };
            self.iterations += 1;
            match item {
                WorkItem::Pointer(node) => {
                    if let Some(delta) = self.pt_data.flush(node) {
                        self.process_pointer(node, delta);
                    }
                }
                WorkItem::CallEdge(edge) => self.process_call_edge(edge),
            }
        }
    }

    /// Processes the functions that became reachable since the last call.
    pub(crate) fn process_reach_funcs(&mut self) {
        while let Some(cs_method) = self.call_graph.pop_reach_func() {
            self.process_new_cs_method(cs_method);
        }
    }

    /// Notifies every plugin through `f`.
    ///
    /// Panics when called during another dispatch: plugin callbacks only enqueue
    /// work, so events can never be raised from inside a callback.
    pub(crate) fn dispatch<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut (dyn Plugin + 'pta), &mut Solver<'pta>),
    {
        assert!(!self.dispatching, "nested dispatch of plugin events");
        if self.plugins.is_empty() {
            return;
        }
        self.dispatching = true;
        let mut plugins = std::mem::take(&mut self.plugins);
        for plugin in plugins.iter_mut() {
            f(plugin.as_mut(), self);
        }
        self.plugins = plugins;
        self.dispatching = false;
    }
}

/// Operations available to plugins.
impl<'pta> Solver<'pta> {
    #[inline]
    pub fn program(&self) -> &'pta Program {
        self.program
    }

    pub fn selector(&self) -> &dyn ContextSelector {
        self.selector.as_ref()
    }

    pub fn resolver(&self) -> &dyn DispatchResolver {
        self.resolver.as_ref()
    }

    pub fn call_graph(&self) -> &CSCallGraph {
        &self.call_graph
    }

    pub fn csm(&self) -> &CSManager {
        &self.csm
    }

    /// Receiver objects and call sites reported as unresolved so far.
    pub fn unresolved_calls(&self) -> &[(CSObjId, CSCallSiteId)] {
        &self.unresolved_calls
    }

    pub fn context(&self, cid: ContextId) -> Rc<Ctx> {
        self.ctx_cache.get_context(cid)
    }

    pub fn get_cs_var(&mut self, cid: ContextId, var: VarId) -> CSVarId {
        self.csm.get_cs_var(cid, var)
    }

    pub fn get_cs_obj(&mut self, cid: ContextId, obj: ObjId) -> CSObjId {
        self.csm.get_cs_obj(cid, obj)
    }

    pub fn get_cs_method(&mut self, cid: ContextId, method: MethodId) -> CSMethodId {
        self.csm.get_cs_method(cid, method)
    }

    pub fn get_cs_callsite(&mut self, cid: ContextId, callsite: CallSiteId) -> CSCallSiteId {
        self.csm.get_cs_callsite(cid, callsite)
    }

    /// Creates (or returns) an object that has no allocation site in the program.
    pub fn new_mock_obj(&mut self, desc: &str, ty: TypeId, container: Option<MethodId>) -> ObjId {
        self.csm.mock_obj(desc, ty, container)
    }

    /// A snapshot of the current points-to set of `pointer`.
    pub fn points_to_set_of(&self, pointer: Pointer) -> PointsTo<CSObjId> {
        match self.pag.get_node_id(&pointer) {
            Some(node) => self.pt_data.get_pts(node),
            None => PointsTo::new(),
        }
    }

    pub fn cs_var_points_to(&self, cs_var: CSVarId) -> PointsTo<CSObjId> {
        self.points_to_set_of(Pointer::Var(cs_var))
    }

    /// Adds `cs_obj` to the points-to set of `pointer`.
    pub fn add_pointer_points_to(&mut self, pointer: Pointer, cs_obj: CSObjId) {
        let node = self.pointer_node(pointer);
        self.add_pts(node, cs_obj);
    }

    pub fn add_points_to(&mut self, cs_var: CSVarId, cs_obj: CSObjId) {
        self.add_pointer_points_to(Pointer::Var(cs_var), cs_obj);
    }

    pub fn add_var_points_to(&mut self, cid: ContextId, var: VarId, cs_obj: CSObjId) {
        let cs_var = self.csm.get_cs_var(cid, var);
        self.add_points_to(cs_var, cs_obj);
    }

    /// Adds a flow edge from `src` to `dst`. Returns false if it already existed.
    pub fn add_pfg_edge(&mut self, src: Pointer, dst: Pointer) -> bool {
        let src = self.pointer_node(src);
        let dst = self.pointer_node(dst);
        self.add_flow_edge(src, dst, PAGEdgeEnum::DirectPAGEdge)
    }

    /// Schedules a call edge. Arguments and return values are bound when the edge
    /// is added to the call graph.
    pub fn add_call_edge(&mut self, edge: CSCallEdge) {
        self.worklist.push(WorkItem::CallEdge(edge));
    }

    /// Makes `method` reachable under the empty context.
    pub fn add_entry_method(&mut self, method: MethodId) {
        let cs_method = self.csm.get_cs_method(ContextId::EMPTY, method);
        self.call_graph.add_entry(cs_method);
    }
}

/// Node and points-to helpers
impl<'pta> Solver<'pta> {
    pub(crate) fn pointer_node(&mut self, pointer: Pointer) -> NodeId {
        self.pag.get_or_insert_node(pointer)
    }

    pub(crate) fn var_node(&mut self, cid: ContextId, var: VarId) -> NodeId {
        let cs_var = self.csm.get_cs_var(cid, var);
        self.pag.get_or_insert_node(Pointer::Var(cs_var))
    }

    #[inline]
    fn has_pending_diff(&self, node: NodeId) -> bool {
        self.pt_data
            .get_diff_pts(node)
            .is_some_and(|diff| !diff.is_empty())
    }

    /// Adds a single object to the points-to set of `node`.
    pub(crate) fn add_pts(&mut self, node: NodeId, cs_obj: CSObjId) {
        let pending = self.has_pending_diff(node);
        if self.pt_data.add_pts(node, cs_obj) && !pending {
            self.worklist.push(WorkItem::Pointer(node));
        }
    }

    /// Unions `pts` into the points-to set of `node`, scheduling the node if it grew.
    pub(crate) fn propagate_to(&mut self, node: NodeId, pts: &PointsTo<CSObjId>) {
        if pts.is_empty() {
            return;
        }
        let pending = self.has_pending_diff(node);
        let new = self.pt_data.propagate(node, pts);
        if !new.is_empty() {
            trace!("{:?} gets {} new object(s)", self.pag.node_pointer(node), new.count());
            if !pending {
                self.worklist.push(WorkItem::Pointer(node));
            }
        }
    }

    /// Adds a direct or cast edge and pushes the already propagated objects of
    /// `src` along it. Objects still pending at `src` follow once `src` is processed.
    pub(crate) fn add_flow_edge(&mut self, src: NodeId, dst: NodeId, kind: PAGEdgeEnum) -> bool {
        debug_assert!(kind.is_flow());
        if self.pag.add_edge(src, dst, kind).is_none() {
            return false;
        }
        let pts = match self.pt_data.get_propa_pts(src) {
            Some(pts) => self.filter_pts(pts, kind),
            None => return true,
        };
        self.propagate_to(dst, &pts);
        true
    }

    /// The part of `pts` that can flow along an edge of `kind`.
    pub(crate) fn filter_pts(&self, pts: &PointsTo<CSObjId>, kind: PAGEdgeEnum) -> PointsTo<CSObjId> {
        match kind {
            PAGEdgeEnum::CastPAGEdge(ty) => {
                let mut filtered = PointsTo::new();
                for cs_obj in pts.iter() {
                    let obj = self.csm.get_obj(self.csm.cs_obj(cs_obj).obj);
                    if self.resolver.is_subtype(obj.ty, ty) {
                        filtered.insert(cs_obj);
                    }
                }
                filtered
            }
            _ => pts.clone(),
        }
    }

    /// Records an unresolved call once per receiver object and call site.
    pub(crate) fn report_unresolved_call(&mut self, recv: CSObjId, cs_callsite: CSCallSiteId) {
        if !self.unresolved.insert((recv, cs_callsite)) {
            return;
        }
        let CSCallSite { cid, callsite } = self.csm.cs_callsite(cs_callsite);
        debug!(
            "Unresolved call {} on an object of type {}",
            self.program.call_site_name(callsite),
            self.program
                .get_type(self.csm.get_obj(self.csm.cs_obj(recv).obj).ty)
                .name
        );
        self.unresolved_calls.push((recv, cs_callsite));
        self.dispatch(|plugin, solver| plugin.on_unresolved_call(solver, recv, cid, callsite));
    }
}
