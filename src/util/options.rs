// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use clap::{Arg, ArgMatches, Command};

use crate::pta::worklist::WorklistOrder;
use crate::pta::PTAType;

const PTA_USAGE: &str = r#"pta [OPTIONS] INPUT"#;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command<'static> {
    Command::new("pta")
        .no_binary_name(true)
        .args_override_self(true)
        .override_usage(PTA_USAGE)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("pta-type")
            .long("pta-type")
            .takes_value(true)
            .value_parser([
                "ci", "insens",
                "callsite-sensitive", "cs",
                "object-sensitive", "obj",
                "type-sensitive", "type",
            ])
            .default_value("callsite-sensitive")
            .help("The type of pointer analysis.")
            .long_help("Context-insensitive, k-callsite-sensitive, k-object-sensitive and \
                        k-type-sensitive pointer analyses are supported."))
        .arg(Arg::new("context-depth")
            .long("context-depth")
            .takes_value(true)
            .value_parser(clap::value_parser!(u32))
            .default_value("1")
            .help("The context depth limit for a context-sensitive pointer analysis."))
        .arg(Arg::new("heap-context-depth")
            .long("heap-context-depth")
            .takes_value(true)
            .value_parser(clap::value_parser!(u32))
            .help("The depth limit of heap contexts. Defaults to the context depth minus one."))
        .arg(Arg::new("worklist-order")
            .long("worklist-order")
            .takes_value(true)
            .value_parser(["fifo", "lifo", "random"])
            .default_value("fifo")
            .hide(true)
            .help("The order in which the solver processes pending work."))
        .arg(Arg::new("seed")
            .long("seed")
            .takes_value(true)
            .value_parser(clap::value_parser!(u64))
            .default_value("0")
            .hide(true)
            .help("The seed of the random worklist order."))
        .arg(Arg::new("no-native-model")
            .long("no-native-model")
            .takes_value(false)
            .help("Do not synthesize result objects for native methods."))
        .arg(Arg::new("dump-stats")
            .long("dump-stats")
            .takes_value(false)
            .help("Dump the statistics of the analysis results."))
        .arg(Arg::new("call-graph-output")
            .long("dump-call-graph")
            .takes_value(true)
            .help("Dump the call graph in DOT format to the output file."))
        .arg(Arg::new("pts-output")
            .long("dump-pts")
            .takes_value(true)
            .help("Dump points-to results to the output file."))
        .arg(Arg::new("INPUT")
            .required(true)
            .help("The program to be analyzed, in JSON."))
}

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub input: String,
    pub pta_type: PTAType,
    // options for context-sensitive analysis
    pub context_depth: u32,
    pub heap_context_depth: Option<u32>,

    pub worklist_order: WorklistOrder,
    pub native_model: bool,

    pub dump_stats: bool,
    pub call_graph_output: Option<String>,
    pub pts_output: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            input: String::new(),
            pta_type: PTAType::CallSiteSensitive,
            context_depth: 1,
            heap_context_depth: None,
            worklist_order: WorklistOrder::Fifo,
            native_model: true,
            dump_stats: false,
            call_graph_output: None,
            pts_output: None,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from a list of strings, exiting with a diagnostic on errors.
    pub fn parse_from_args(&mut self, args: &[String]) {
        if let Err(e) = self.try_parse_from_args(args) {
            e.exit();
        }
    }

    pub fn try_parse_from_args(&mut self, args: &[String]) -> clap::Result<()> {
        let matches = make_options_parser().try_get_matches_from(args.iter())?;
        self.update(&matches);
        Ok(())
    }

    fn update(&mut self, matches: &ArgMatches) {
        if let Some(input) = matches.get_one::<String>("INPUT") {
            self.input = input.clone();
        }
        if let Some(pta_type) = matches.get_one::<String>("pta-type") {
            self.pta_type = match pta_type.as_str() {
                "ci" | "insens" => PTAType::ContextInsensitive,
                "callsite-sensitive" | "cs" => PTAType::CallSiteSensitive,
                "object-sensitive" | "obj" => PTAType::ObjectSensitive,
                "type-sensitive" | "type" => PTAType::TypeSensitive,
                _ => unreachable!(),
            }
        }
        if let Some(depth) = matches.get_one::<u32>("context-depth") {
            self.context_depth = *depth;
        }
        self.heap_context_depth = matches.get_one::<u32>("heap-context-depth").cloned();

        let seed = matches.get_one::<u64>("seed").cloned().unwrap_or_default();
        if let Some(order) = matches.get_one::<String>("worklist-order") {
            self.worklist_order = match order.as_str() {
                "fifo" => WorklistOrder::Fifo,
                "lifo" => WorklistOrder::Lifo,
                "random" => WorklistOrder::Random(seed),
                _ => unreachable!(),
            }
        }

        self.native_model = !matches.contains_id("no-native-model");
        self.dump_stats = matches.contains_id("dump-stats");
        self.call_graph_output = matches.get_one::<String>("call-graph-output").cloned();
        self.pts_output = matches.get_one::<String>("pts-output").cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn parses_context_options() {
        let mut options = AnalysisOptions::default();
        options
            .try_parse_from_args(&args("--pta-type obj --context-depth 2 --dump-stats prog.json"))
            .unwrap();
        assert_eq!(options.input, "prog.json");
        assert_eq!(options.pta_type, PTAType::ObjectSensitive);
        assert_eq!(options.context_depth, 2);
        assert_eq!(options.heap_context_depth, None);
        assert!(options.dump_stats);
        assert!(options.native_model);
        assert_eq!(options.worklist_order, WorklistOrder::Fifo);
    }

    #[test]
    fn parses_hidden_solver_options() {
        let mut options = AnalysisOptions::default();
        options
            .try_parse_from_args(&args(
                "--worklist-order random --seed 7 --no-native-model --dump-pts pts.txt prog.json",
            ))
            .unwrap();
        assert_eq!(options.worklist_order, WorklistOrder::Random(7));
        assert!(!options.native_model);
        assert_eq!(options.pts_output.as_deref(), Some("pts.txt"));
    }

    #[test]
    fn later_occurrences_override_earlier_ones() {
        let mut options = AnalysisOptions::default();
        options
            .try_parse_from_args(&args("--context-depth 3 --context-depth 2 prog.json"))
            .unwrap();
        assert_eq!(options.context_depth, 2);
    }

    #[test]
    fn rejects_unknown_analysis() {
        let mut options = AnalysisOptions::default();
        assert!(options
            .try_parse_from_args(&args("--pta-type flow prog.json"))
            .is_err());
    }
}
