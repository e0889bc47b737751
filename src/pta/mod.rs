// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;

use crate::context::{
    default_heap_depth, ContextInsensitive, ContextSelector, KCallSiteSensitive, KObjectSensitive,
    KTypeSensitive,
};
use crate::cs::CSObjId;
use crate::graph::pag::*;
use crate::ir::Program;
use crate::plugin::{AnalysisTimer, NativeModeler, UnresolvedCallReporter};
use crate::pts_set::points_to::HybridPointsToSet;
use crate::pts_set::pt_data::DiffPTData;
use crate::util::options::AnalysisOptions;

pub mod propagator;
pub mod result;
pub mod solver;
pub mod worklist;

pub use self::result::PointerAnalysisResult;
pub use self::solver::Solver;

pub type NodeId = PAGNodeId;
pub type EdgeId = PAGEdgeId;
pub type PointsTo<T> = HybridPointsToSet<T>;
pub type DiffPTDataTy = DiffPTData<NodeId, CSObjId, PointsTo<CSObjId>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PTAType {
    ContextInsensitive,
    CallSiteSensitive,
    ObjectSensitive,
    TypeSensitive,
}

/// Builds the context selector described by the options.
pub fn make_selector(options: &AnalysisOptions) -> Box<dyn ContextSelector> {
    let k = options.context_depth as usize;
    let hk = options
        .heap_context_depth
        .map(|hk| hk as usize)
        .unwrap_or_else(|| default_heap_depth(k));
    match options.pta_type {
        PTAType::ContextInsensitive => Box::new(ContextInsensitive),
        PTAType::CallSiteSensitive => Box::new(KCallSiteSensitive::with_heap_depth(k, hk)),
        PTAType::ObjectSensitive => Box::new(KObjectSensitive::with_heap_depth(k, hk)),
        PTAType::TypeSensitive => Box::new(KTypeSensitive::with_heap_depth(k, hk)),
    }
}

/// Runs the pointer analysis configured by `options` on `program`, with the
/// default plugins.
pub fn run_pointer_analysis<'pta>(
    program: &'pta Program,
    options: &AnalysisOptions,
) -> PointerAnalysisResult<'pta> {
    let selector = make_selector(options);
    debug!("Using {} context selector", selector.name());

    let mut solver = Solver::new(program, selector, options.worklist_order);
    solver.add_plugin(Box::new(AnalysisTimer::new()));
    if options.native_model {
        solver.add_plugin(Box::new(NativeModeler::new()));
    }
    solver.add_plugin(Box::new(UnresolvedCallReporter::new()));
    solver.solve()
}
