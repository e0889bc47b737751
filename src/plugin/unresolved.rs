// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;

use super::Plugin;
use crate::pta::solver::Solver;

/// Summarizes the calls that could not be dispatched on some receiver object.
#[derive(Debug, Default)]
pub struct UnresolvedCallReporter;

impl UnresolvedCallReporter {
    pub fn new() -> Self {
        UnresolvedCallReporter
    }
}

impl Plugin for UnresolvedCallReporter {
    fn on_finish(&mut self, solver: &Solver<'_>) {
        let calls = solver.unresolved_calls();
        if calls.is_empty() {
            return;
        }
        warn!("{} call(s) could not be resolved on their receiver", calls.len());
        let program = solver.program();
        let csm = solver.csm();
        for (recv, cs_callsite) in calls {
            let obj = csm.get_obj(csm.cs_obj(*recv).obj);
            debug!(
                "  {} on {}",
                program.call_site_name(csm.cs_callsite(*cs_callsite).callsite),
                program.get_type(obj.ty).name
            );
        }
    }
}
