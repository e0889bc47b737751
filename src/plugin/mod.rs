// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Extension points of the solver.
//!
//! A plugin implements only the callbacks it needs; the others do nothing.
//! Registered plugins are notified in registration order. Events are delivered
//! synchronously from the solver loop, one at a time, so a plugin may keep
//! per-key state without synchronization.
//!
//! Event callbacks receive the solver and may feed new facts back through its
//! public API (`add_points_to`, `add_pfg_edge`, `add_call_edge`, ...). Those
//! facts go through the worklist like the solver's own. `on_finish` only gets
//! shared access: results are frozen at that point.

use crate::context::ContextId;
use crate::cs::{CSMethodId, CSObjId, CSVarId};
use crate::graph::call_graph::CSCallEdge;
use crate::ir::{CallSiteId, MethodId};
use crate::pta::solver::Solver;
use crate::pta::PointsTo;

mod native;
mod timer;
mod unresolved;

pub use self::native::NativeModeler;
pub use self::timer::AnalysisTimer;
pub use self::unresolved::UnresolvedCallReporter;

pub trait Plugin {
    /// Called before the worklist loop starts.
    fn on_start(&mut self, _solver: &mut Solver<'_>) {}

    /// Called once the fixpoint is reached.
    fn on_finish(&mut self, _solver: &Solver<'_>) {}

    /// New objects `delta` have reached the points-to set of `cs_var`.
    fn on_new_points_to_set(&mut self, _solver: &mut Solver<'_>, _cs_var: CSVarId, _delta: &PointsTo<CSObjId>) {}

    fn on_new_call_edge(&mut self, _solver: &mut Solver<'_>, _edge: &CSCallEdge) {}

    /// `method` is reachable for the first time, under any context.
    fn on_new_method(&mut self, _solver: &mut Solver<'_>, _method: MethodId) {}

    fn on_new_cs_method(&mut self, _solver: &mut Solver<'_>, _cs_method: CSMethodId) {}

    /// No method of the receiver object `recv` matches `callsite`, which is
    /// analyzed under `context`. Reported once per receiver object and call site.
    fn on_unresolved_call(
        &mut self,
        _solver: &mut Solver<'_>,
        _recv: CSObjId,
        _context: ContextId,
        _callsite: CallSiteId,
    ) {
    }
}
