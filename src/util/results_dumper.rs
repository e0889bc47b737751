// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use itertools::Itertools;
use log::*;

use crate::graph::pag::Pointer;
use crate::pta::PointerAnalysisResult;
use crate::pts_set::points_to::PointsToSet;
use crate::util::options::AnalysisOptions;

fn open_writer(path: &str) -> io::Result<BufWriter<Box<dyn Write>>> {
    Ok(BufWriter::new(match path {
        "stdout" => Box::new(io::stdout()) as Box<dyn Write>,
        _ => Box::new(File::create(path)?) as Box<dyn Write>,
    }))
}

pub fn dump_results(result: &PointerAnalysisResult, options: &AnalysisOptions) -> io::Result<()> {
    // dump points-to results
    if let Some(pts_output) = &options.pts_output {
        info!("Dumping points-to results...");
        let mut pts_writer = open_writer(pts_output)?;
        dump_ci_pts(result, &mut pts_writer)?;
        dump_heap_pts(result, &mut pts_writer)?;
        pts_writer.flush()?;
    }

    // dump call graph
    if let Some(cg_output) = &options.call_graph_output {
        info!("Dumping call graph...");
        let mut cg_writer = open_writer(cg_output)?;
        dump_call_graph(result, &mut cg_writer)?;
        cg_writer.flush()?;
    }
    Ok(())
}

/// Writes the context-sensitive call graph in DOT format.
pub fn dump_call_graph<W: Write>(result: &PointerAnalysisResult, writer: &mut W) -> io::Result<()> {
    let dot = result.cs_call_graph().to_dot(result.program(), result.csm());
    writer.write_all(dot.as_bytes())
}

/// Writes the points-to sets of local variables, merged over contexts and grouped
/// by method.
pub fn dump_ci_pts<W: Write>(result: &PointerAnalysisResult, writer: &mut W) -> io::Result<()> {
    let program = result.program();
    let methods = result
        .reachable_methods()
        .into_iter()
        .sorted_by_key(|m| program.method_name(*m));
    for method in methods {
        writeln!(writer, "{}", program.method_name(method))?;
        for var in &program.get_method(method).vars {
            let pts = result.points_to_set_of(*var);
            if pts.is_empty() {
                continue;
            }
            let pointees = pts.iter().map(|obj| result.obj_name(*obj)).sorted().join(" ");
            writeln!(
                writer,
                "\t{} ({}) ==> {{ {} }}",
                program.get_var(*var).name,
                pts.len(),
                pointees
            )?;
        }
    }
    Ok(())
}

/// Writes the context-sensitive points-to sets of fields and array elements.
pub fn dump_heap_pts<W: Write>(result: &PointerAnalysisResult, writer: &mut W) -> io::Result<()> {
    let lines = result
        .pointers()
        .filter(|(pointer, _)| !matches!(pointer, Pointer::Var(_)))
        .map(|(pointer, pts)| {
            let pointees = pts.iter().map(|o| result.cs_obj_name(o)).sorted().join(" ");
            format!("{} ({}) ==> {{ {} }}", result.pointer_name(&pointer), pts.count(), pointees)
        })
        .sorted();
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}
