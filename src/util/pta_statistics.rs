// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, BufWriter, Write};

use log::*;

use crate::cs::{CSVar, ObjId};
use crate::graph::pag::Pointer;
use crate::ir::VarId;
use crate::pta::PointerAnalysisResult;
use crate::pts_set::points_to::PointsToSet;

pub struct PTAStat<'a, 'pta> {
    result: &'a PointerAnalysisResult<'pta>,
}

impl<'a, 'pta> PTAStat<'a, 'pta> {
    pub fn new(result: &'a PointerAnalysisResult<'pta>) -> Self {
        PTAStat { result }
    }

    pub fn dump_stats(&self) -> io::Result<()> {
        let mut stat_writer = BufWriter::new(io::stdout());
        info!("Dumping pta statistics...");
        self.dump_stats_to(&mut stat_writer)?;
        stat_writer.flush()
    }

    pub fn dump_stats_to<W: Write>(&self, stat_writer: &mut W) -> io::Result<()> {
        writeln!(stat_writer, "##########################################################")?;
        self.dump_call_graph_stat(stat_writer)?;
        writeln!(stat_writer, "----------------------------------------------------------")?;
        self.dump_pts_stat(stat_writer)?;
        writeln!(stat_writer, "##########################################################")
    }

    pub fn dump_call_graph_stat<W: Write>(&self, stat_writer: &mut W) -> io::Result<()> {
        let result = self.result;
        writeln!(stat_writer, "Call Graph Statistics: ")?;
        writeln!(stat_writer, "#Reachable methods: {}", result.reachable_methods().len())?;
        writeln!(stat_writer, "#CS methods: {}", result.cs_call_graph().num_nodes())?;
        writeln!(stat_writer, "#Call edges: {}", result.call_graph().len())?;
        writeln!(stat_writer, "#CS call edges: {}", result.cs_call_graph().num_edges())?;
        writeln!(stat_writer, "#Contexts: {}", result.num_contexts())?;
        writeln!(stat_writer, "#Unresolved calls: {}", result.unresolved_calls().len())
    }

    pub fn dump_pts_stat<W: Write>(&self, stat_writer: &mut W) -> io::Result<()> {
        let result = self.result;
        let csm = result.csm();
        let mut ci_pts_map: HashMap<VarId, BTreeSet<ObjId>> = HashMap::new();
        let mut num_cs_pointers = 0;
        let mut num_cs_pts_relations = 0;
        for (pointer, pts) in result.pointers() {
            num_cs_pointers += 1;
            num_cs_pts_relations += pts.count();
            if let Pointer::Var(cs_var) = pointer {
                let CSVar { var, .. } = csm.cs_var(cs_var);
                let ci_pts = ci_pts_map.entry(var).or_default();
                ci_pts.extend(pts.iter().map(|cs_obj| csm.cs_obj(cs_obj).obj));
            }
        }
        let num_ci_pointers = ci_pts_map.len();
        let num_ci_pts_relations: usize = ci_pts_map.values().map(|pts| pts.len()).sum();

        writeln!(stat_writer, "Objects: {} ({} context-sensitive)", csm.num_objs(), csm.num_cs_objs())?;
        writeln!(stat_writer, "CS Points-to Statistics: ")?;
        writeln!(stat_writer, "#Pointers: {}", num_cs_pointers)?;
        writeln!(stat_writer, "#Points-to relations: {}", num_cs_pts_relations)?;
        writeln!(stat_writer, "#Avg points-to size: {}", average(num_cs_pts_relations, num_cs_pointers))?;
        writeln!(stat_writer, "CI Points-to Statistics (variables): ")?;
        writeln!(stat_writer, "#Pointers: {}", num_ci_pointers)?;
        writeln!(stat_writer, "#Points-to relations: {}", num_ci_pts_relations)?;
        writeln!(stat_writer, "#Avg points-to size: {}", average(num_ci_pts_relations, num_ci_pointers))?;
        writeln!(stat_writer, "#Solver iterations: {}", result.num_iterations())
    }
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
