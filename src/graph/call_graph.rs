// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::dot::Dot;
use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::Graph;

use crate::cs::{CSCallSiteId, CSManager, CSMethodId};
use crate::ir::{CallKind, Program};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;

/// A context-sensitive call edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSCallEdge {
    pub kind: CallKind,
    pub callsite: CSCallSiteId,
    pub callee: CSMethodId,
}

#[derive(Debug)]
pub struct CallGraphNode {
    pub(crate) func: CSMethodId,
}

#[derive(Debug)]
pub struct CallGraphEdge {
    pub(crate) callsite: CSCallSiteId,
    pub(crate) kind: CallKind,
}

/// Context-sensitive call graph.
#[derive(Default)]
pub struct CSCallGraph {
    /// The graph structure capturing call relationships.
    pub graph: Graph<CallGraphNode, CallGraphEdge>,
    /// A map from functions to their corresponding call graph nodes.
    pub func_nodes: HashMap<CSMethodId, CGNodeId>,
    /// A map from call sites to call graph edges.
    pub callsite_to_edges: HashMap<CSCallSiteId, HashSet<CGEdgeId>>,
    /// Entry methods, which are reachable without a call.
    pub(crate) entries: Vec<CSMethodId>,
    /// A queue of reachable nodes not yet processed.
    pub(crate) reach_funcs: VecDeque<CSMethodId>,
}

impl CSCallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry node to the call graph.
    pub fn add_entry(&mut self, func: CSMethodId) {
        if !self.entries.contains(&func) {
            self.entries.push(func);
        }
        self.get_or_insert_node(func);
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    fn get_or_insert_node(&mut self, func: CSMethodId) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                // New nodes are reachable and have to be processed.
                self.reach_funcs.push_back(func);
                let node_id = self.graph.add_node(CallGraphNode { func });
                *v.insert(node_id)
            }
        }
    }

    /// Returns true if `func` has been reached.
    pub fn contains_func(&self, func: CSMethodId) -> bool {
        self.func_nodes.contains_key(&func)
    }

    /// Pops the next reachable function that has not been processed yet.
    pub fn pop_reach_func(&mut self) -> Option<CSMethodId> {
        self.reach_funcs.pop_front()
    }

    /// Returns all callees of a callsite.
    pub fn get_callees(&self, callsite: CSCallSiteId) -> HashSet<CSMethodId> {
        match self.callsite_to_edges.get(&callsite) {
            Some(edges) => edges
                .iter()
                .filter_map(|edge_id| self.graph.edge_endpoints(*edge_id))
                .map(|(_, target)| self.graph[target].func)
                .collect(),
            None => HashSet::new(),
        }
    }

    /// Returns true if an edge to the callee already existed for the callsite.
    pub fn has_edge(&self, callsite: CSCallSiteId, callee: CSMethodId) -> bool {
        self.callsite_to_edges.get(&callsite).is_some_and(|edges| {
            edges
                .iter()
                .filter_map(|edge_id| self.graph.edge_endpoints(*edge_id))
                .any(|(_, target)| self.graph[target].func == callee)
        })
    }

    /// Adds a new edge to the call graph.
    /// The edge is a call from `caller` to the edge's callee at the edge's callsite.
    /// Returns false if the edge already existed, and true otherwise.
    pub fn add_edge(&mut self, caller: CSMethodId, edge: CSCallEdge) -> bool {
        if self.has_edge(edge.callsite, edge.callee) {
            return false;
        }
        let caller_node = self.get_or_insert_node(caller);
        let callee_node = self.get_or_insert_node(edge.callee);
        let edge_id = self.graph.add_edge(
            caller_node,
            callee_node,
            CallGraphEdge {
                callsite: edge.callsite,
                kind: edge.kind,
            },
        );
        self.callsite_to_edges
            .entry(edge.callsite)
            .or_default()
            .insert(edge_id);
        true
    }

    /// Iterates over all context-sensitive call edges.
    pub fn edges(&self) -> impl Iterator<Item = CSCallEdge> + '_ {
        self.graph.edge_indices().filter_map(move |edge_id| {
            let (_, target) = self.graph.edge_endpoints(edge_id)?;
            let edge = &self.graph[edge_id];
            Some(CSCallEdge {
                kind: edge.kind,
                callsite: edge.callsite,
                callee: self.graph[target].func,
            })
        })
    }

    pub fn reachable_funcs(&self) -> impl Iterator<Item = CSMethodId> + '_ {
        self.graph.node_weights().map(|node| node.func)
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Produce a dot representation of the call graph
    /// for displaying with Graphviz.
    pub fn to_dot(&self, program: &Program, csm: &CSManager) -> String {
        let labeled = self.graph.map(
            |_, node| {
                let m = csm.cs_method(node.func);
                format!("{:?}:{}", m.cid, program.method_name(m.method))
            },
            |_, edge| {
                let cs = csm.cs_callsite(edge.callsite);
                format!("{}[{:?}]", program.call_site_name(cs.callsite), edge.kind)
            },
        );
        format!("{}", Dot::new(&labeled))
    }
}
