// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The pointer assignment graph.
//!
//! Nodes are pointers. Direct and cast edges carry points-to sets from their source
//! to their target. Load and store edges connect variables only: they wait on the
//! base variable of the field access and are turned into direct edges between
//! variables and instance fields whenever a new object reaches the base.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::Graph;

use crate::cs::{CSObjId, CSVarId};
use crate::ir::{FieldId, TypeId};

// Unique identifiers for graph node and edges.
pub type PAGNodeId = NodeIndex<DefaultIx>;
pub type PAGEdgeId = EdgeIndex<DefaultIx>;

/// Anything that owns a points-to set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pointer {
    Var(CSVarId),
    StaticField(FieldId),
    InstanceField(CSObjId, FieldId),
    ArrayIndex(CSObjId),
}

impl Pointer {
    /// The pointer reached by dereferencing `obj` through `field`.
    pub fn field_of(obj: CSObjId, field: FieldRef) -> Pointer {
        match field {
            FieldRef::Field(f) => Pointer::InstanceField(obj, f),
            FieldRef::ArrayElem => Pointer::ArrayIndex(obj),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Field(FieldId),
    ArrayElem,
}

pub struct PAGNode {
    pointer: Pointer,
}

impl PAGNode {
    pub fn new(pointer: Pointer) -> Self {
        PAGNode { pointer }
    }

    pub fn pointer(&self) -> Pointer {
        self.pointer
    }
}

#[derive(Debug)]
pub struct PAGEdge {
    pub kind: PAGEdgeEnum,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PAGEdgeEnum {
    /// `dst = src`, including argument passing and returns.
    DirectPAGEdge,
    /// `dst = (T) src`. Only objects of a subtype of `T` flow.
    CastPAGEdge(TypeId),
    /// `dst = src.f` or `dst = src[*]`.
    LoadPAGEdge(FieldRef),
    /// `dst.f = src` or `dst[*] = src`.
    StorePAGEdge(FieldRef),
}

impl PAGEdgeEnum {
    /// Returns true for edges that propagate points-to sets.
    pub fn is_flow(&self) -> bool {
        matches!(self, PAGEdgeEnum::DirectPAGEdge | PAGEdgeEnum::CastPAGEdge(_))
    }
}

pub(crate) type EdgeMap = HashMap<PAGNodeId, BTreeSet<PAGEdgeId>>;

#[derive(Default)]
pub struct PAG {
    /// The graph structure capturing assignment relations between nodes.
    pub(crate) graph: Graph<PAGNode, PAGEdge>,
    /// A map from pointers to node id.
    pub(crate) values: HashMap<Pointer, PAGNodeId>,

    /// Direct and cast edges, keyed by their source.
    pub(crate) flow_out_edges: EdgeMap,
    /// Load edges, keyed by the base variable.
    pub(crate) load_out_edges: EdgeMap,
    /// Store edges, keyed by the base variable.
    pub(crate) store_in_edges: EdgeMap,
}

impl PAG {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the pag graph.
    #[inline]
    pub fn graph(&self) -> &Graph<PAGNode, PAGEdge> {
        &self.graph
    }

    /// Returns the pointer of the given node.
    ///
    /// Panics if the node does not belong to this graph.
    pub fn node_pointer(&self, node_id: PAGNodeId) -> Pointer {
        self.graph[node_id].pointer()
    }

    /// Returns the node_id for the given pointer.
    pub fn get_node_id(&self, pointer: &Pointer) -> Option<PAGNodeId> {
        self.values.get(pointer).copied()
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    pub fn get_or_insert_node(&mut self, pointer: Pointer) -> PAGNodeId {
        match self.values.entry(pointer) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                let node_id = self.graph.add_node(PAGNode::new(pointer));
                *v.insert(node_id)
            }
        }
    }

    /// Returns the edge for the given edge_id.
    ///
    /// Panics if the edge does not belong to this graph.
    pub fn get_edge(&self, edge_id: PAGEdgeId) -> &PAGEdge {
        &self.graph[edge_id]
    }

    /// Returns the `(source, target)` nodes of an edge.
    pub fn edge_endpoints(&self, edge_id: PAGEdgeId) -> (PAGNodeId, PAGNodeId) {
        self.graph
            .edge_endpoints(edge_id)
            .unwrap_or_else(|| panic!("{:?} is not an edge of the graph", edge_id))
    }

    /// Returns true if the edge from `src` to `dst` of the `kind` exists.
    pub fn contains_edge(&self, src: PAGNodeId, dst: PAGNodeId, kind: &PAGEdgeEnum) -> bool {
        self.graph
            .edges_connecting(src, dst)
            .any(|edge| &edge.weight().kind == kind)
    }

    /// Adds an edge from `src` to `dst` according to the edge type.
    /// Returns the edge id if this edge is newly added to the graph.
    pub fn add_edge(&mut self, src: PAGNodeId, dst: PAGNodeId, kind: PAGEdgeEnum) -> Option<PAGEdgeId> {
        if self.contains_edge(src, dst, &kind) {
            return None;
        }
        let edge_id = self.graph.add_edge(src, dst, PAGEdge { kind });
        match kind {
            PAGEdgeEnum::DirectPAGEdge | PAGEdgeEnum::CastPAGEdge(_) => {
                self.flow_out_edges.entry(src).or_default().insert(edge_id);
            }
            PAGEdgeEnum::LoadPAGEdge(_) => {
                self.load_out_edges.entry(src).or_default().insert(edge_id);
            }
            PAGEdgeEnum::StorePAGEdge(_) => {
                self.store_in_edges.entry(dst).or_default().insert(edge_id);
            }
        }
        Some(edge_id)
    }

    /// Takes the edges of `node` out of `map` so that they can be iterated while
    /// the graph is being extended. Give them back with [`PAG::restore_edges`].
    pub(crate) fn take_edges(map: &mut EdgeMap, node: PAGNodeId) -> BTreeSet<PAGEdgeId> {
        map.get_mut(&node).map(std::mem::take).unwrap_or_default()
    }

    /// Puts back edges taken by [`PAG::take_edges`], keeping the ones added meanwhile.
    pub(crate) fn restore_edges(map: &mut EdgeMap, node: PAGNodeId, mut edges: BTreeSet<PAGEdgeId>) {
        if edges.is_empty() {
            return;
        }
        let slot = map.entry(node).or_default();
        edges.append(slot);
        *slot = edges;
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterates over all pointers and their node ids.
    pub fn pointers(&self) -> impl Iterator<Item = (PAGNodeId, Pointer)> + '_ {
        self.graph
            .node_indices()
            .map(move |id| (id, self.graph[id].pointer()))
    }
}
