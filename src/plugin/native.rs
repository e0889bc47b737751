// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use log::*;

use super::Plugin;
use crate::context::ContextId;
use crate::cs::{CSMethod, CSMethodId};
use crate::pta::solver::Solver;

/// Models the result of native methods. A reachable native method that returns
/// a reference returns one mock object of its declared return type.
#[derive(Debug, Default)]
pub struct NativeModeler;

impl NativeModeler {
    pub fn new() -> Self {
        NativeModeler
    }
}

impl Plugin for NativeModeler {
    fn on_new_cs_method(&mut self, solver: &mut Solver<'_>, cs_method: CSMethodId) {
        let CSMethod { cid, method } = solver.csm().cs_method(cs_method);
        let program = solver.program();
        let m = program.get_method(method);
        if !m.is_native {
            return;
        }
        let Some(ret_ty) = m.return_type else {
            return;
        };
        let desc = format!("native-result:{}", program.method_name(method));
        let obj = solver.new_mock_obj(&desc, ret_ty, Some(method));
        let cs_obj = solver.get_cs_obj(ContextId::EMPTY, obj);
        for ret in &m.return_vars {
            trace!("{} returns {}", program.method_name(method), desc);
            solver.add_var_points_to(cid, *ret, cs_obj);
        }
    }
}
