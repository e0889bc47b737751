// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::NodeId;
use crate::graph::call_graph::CSCallEdge;

/// The order in which pending work is processed. The fixpoint does not depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorklistOrder {
    Fifo,
    Lifo,
    /// Pops a random pending item, reproducibly from the seed.
    Random(u64),
}

impl Default for WorklistOrder {
    fn default() -> Self {
        WorklistOrder::Fifo
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkItem {
    /// The pointer has a pending points-to diff.
    Pointer(NodeId),
    /// A resolved call edge to be added to the call graph.
    CallEdge(CSCallEdge),
}

#[derive(Debug)]
pub struct WorkList {
    items: VecDeque<WorkItem>,
    order: WorklistOrder,
    rng: Option<StdRng>,
}

impl WorkList {
    pub fn new(order: WorklistOrder) -> Self {
        let rng = match order {
            WorklistOrder::Random(seed) => Some(StdRng::seed_from_u64(seed)),
            _ => None,
        };
        WorkList {
            items: VecDeque::new(),
            order,
            rng,
        }
    }

    #[inline]
    pub fn push(&mut self, item: WorkItem) {
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        match (self.order, self.rng.as_mut()) {
            (WorklistOrder::Random(_), Some(rng)) if !self.items.is_empty() => {
                let idx = rng.gen_range(0..self.items.len());
                self.items.swap_remove_back(idx)
            }
            (WorklistOrder::Lifo, _) => self.items.pop_back(),
            _ => self.items.pop_front(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
