// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `pta`.
//!
//! Loads a program from its JSON description, runs the configured pointer
//! analysis and dumps the requested results.

use std::env;
use std::path::Path;

use anyhow::Context;
use log::*;

use cspta::ir::loader::load_program;
use cspta::pta::run_pointer_analysis;
use cspta::util::options::AnalysisOptions;
use cspta::util::pta_statistics::PTAStat;
use cspta::util::results_dumper;

fn main() -> anyhow::Result<()> {
    // Initialize loggers.
    if env::var("PTA_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PTA_LOG")
            .write_style("PTA_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    // Options specified via the PTA_FLAGS environment variable come first, so that
    // arguments supplied on the command line override them.
    let pta_flags = env::var("PTA_FLAGS").unwrap_or_default();
    let mut args: Vec<String> = if pta_flags.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&pta_flags).context("PTA_FLAGS must be a JSON array of strings")?
    };
    args.extend(env::args().skip(1));

    let mut options = AnalysisOptions::default();
    options.parse_from_args(&args);
    info!("PTA Options: {:?}", options);

    let program = load_program(Path::new(&options.input))
        .with_context(|| format!("failed to load {}", options.input))?;
    let result = run_pointer_analysis(&program, &options);

    if options.dump_stats {
        PTAStat::new(&result).dump_stats()?;
    }
    results_dumper::dump_results(&result, &options).context("failed to dump results")?;
    Ok(())
}
