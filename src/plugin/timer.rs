// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::time::{Duration, Instant};

use log::*;

use super::Plugin;
use crate::pta::solver::Solver;

/// Logs the time spent to reach the fixpoint.
#[derive(Debug, Default)]
pub struct AnalysisTimer {
    start: Option<Instant>,
    elapsed: Option<Duration>,
}

impl AnalysisTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

impl Plugin for AnalysisTimer {
    fn on_start(&mut self, _solver: &mut Solver<'_>) {
        self.start = Some(Instant::now());
    }

    fn on_finish(&mut self, solver: &Solver<'_>) {
        let Some(start) = self.start else {
            return;
        };
        // Drop sub-millisecond noise from the report.
        let elapsed = Duration::from_millis(start.elapsed().as_millis() as u64);
        self.elapsed = Some(elapsed);
        info!(
            "{} pointer analysis time: {}",
            solver.selector().name(),
            humantime::format_duration(elapsed)
        );
    }
}
