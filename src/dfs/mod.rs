// PathPlan: Constrained path enumeration and multi-commodity flows
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Enumeration of all loopless paths between two nodes of a graph.
//!
//! A [`CompactGraph`] is an immutable, per-destination compilation of a
//! [`GraphStorage`] for fast adjacency walks: every vertex carries its
//! minimum-weight distance to the destination, and neighbour lists are
//! pre-sorted by that distance so the search always extends towards the
//! most promising neighbour first. [`Dfs`] runs an iterative depth-first
//! search over it, pruned by hop count, cumulative weight and a wallclock
//! budget.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netsim::enforcer::CountdownTimer;
use netsim::net::{GraphStorage, LinkSequence};
use netsim::types::{LinkId, NodeId};
use petgraph::algo::dijkstra;
use petgraph::visit::{EdgeRef, Reversed};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

pub mod constraint;

/// Distance of vertices that cannot reach the destination.
const INFINITE_DISTANCE: u64 = u64::MAX;

/// An outgoing edge of a compiled vertex.
#[derive(Debug, Clone, Copy)]
struct Neighbor {
    /// The link behind this edge.
    link: LinkId,
    /// Dense index of the link, used for constant-time marking.
    dense_index: usize,
    /// Compiled index of the target vertex.
    vertex: usize,
    /// Weight of the edge: the link delay in nanoseconds.
    weight: u64,
}

#[derive(Debug, Clone)]
struct Vertex {
    node: NodeId,
    /// Minimum-weight distance to the destination.
    dist_to_dst: u64,
    /// Outgoing edges, sorted by the target's distance to the destination.
    neighbors: Vec<Neighbor>,
}

/// An immutable, per-destination compilation of a graph, used by [`Dfs`].
#[derive(Debug, Clone)]
pub struct CompactGraph {
    dst: NodeId,
    dst_vertex: usize,
    vertices: Vec<Vertex>,
    vertex_by_node: HashMap<NodeId, usize>,
    num_edges: usize,
}

impl CompactGraph {
    /// Compile the graph for searches towards `dst`.
    pub fn new(storage: &GraphStorage, dst: &str) -> Result<Self, PlanError> {
        let dst = storage
            .node_by_name(dst)
            .ok_or_else(|| PlanError::DestinationNotFound(dst.to_string()))?;
        Ok(Self::towards(storage, dst))
    }

    /// Compile the graph for searches towards a known destination node.
    pub fn towards(storage: &GraphStorage, dst: NodeId) -> Self {
        let graph = storage.topology();

        // the minimum-weight distance from every vertex to the destination
        // is the shortest-path distance from the destination on the
        // reversed graph
        let distances = dijkstra(Reversed(graph), dst, None, |e| {
            e.weight().delay().as_nanos() as u64
        });

        let mut vertex_by_node = HashMap::new();
        let mut vertices = Vec::new();
        for node in storage.nodes() {
            vertex_by_node.insert(node, vertices.len());
            vertices.push(Vertex {
                node,
                dist_to_dst: distances.get(&node).copied().unwrap_or(INFINITE_DISTANCE),
                neighbors: Vec::new(),
            });
        }

        let dense_index: HashMap<LinkId, usize> = storage
            .links()
            .enumerate()
            .map(|(i, (link, _))| (link, i))
            .collect();

        for vertex_index in 0..vertices.len() {
            let node = vertices[vertex_index].node;
            let mut neighbors: Vec<Neighbor> = graph
                .edges(node)
                .map(|edge| Neighbor {
                    link: edge.id(),
                    dense_index: dense_index[&edge.id()],
                    vertex: vertex_by_node[&edge.target()],
                    weight: edge.weight().delay().as_nanos() as u64,
                })
                .collect();
            // `edges` iterates most-recent first; restore insertion order so
            // that equal distances tie-break deterministically by it
            neighbors.reverse();
            neighbors.sort_by_key(|n| vertices[n.vertex].dist_to_dst);
            vertices[vertex_index].neighbors = neighbors;
        }

        Self {
            dst,
            dst_vertex: vertex_by_node[&dst],
            vertices,
            vertex_by_node,
            num_edges: dense_index.len(),
        }
    }

    /// The destination this graph was compiled for.
    pub fn dst(&self) -> NodeId {
        self.dst
    }

    /// The minimum-weight distance (in nanoseconds of delay) from a node to
    /// the destination, if the node is part of the graph and the
    /// destination is reachable from it.
    pub fn distance_to_destination(&self, node: NodeId) -> Option<u64> {
        self.vertex_by_node
            .get(&node)
            .map(|v| self.vertices[*v].dist_to_dst)
            .filter(|d| *d != INFINITE_DISTANCE)
    }
}

/// A request to enumerate paths (the wire form of a search).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfsRequest {
    /// Name of the source node.
    pub src: String,
    /// Paths with more hops than this are not discovered.
    pub max_hops: usize,
    /// Paths with a larger cumulative delay than this are not discovered.
    pub max_weight: Duration,
    /// Wallclock budget for the search.
    pub max_duration: Duration,
    /// How many search steps to take between checks of the wallclock budget
    /// and the cancellation flag. Must be positive.
    pub steps_to_check_for_stop: u64,
    /// Also exclude paths that visit the same node twice.
    #[serde(default)]
    pub node_disjoint: bool,
}

impl DfsRequest {
    /// A request with permissive default limits.
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            max_hops: 10,
            max_weight: Duration::from_secs(2),
            max_duration: Duration::from_secs(10),
            steps_to_check_for_stop: 100_000,
            node_disjoint: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), PlanError> {
        if self.steps_to_check_for_stop == 0 {
            return Err(PlanError::ZeroStopCheckStep);
        }
        if self.max_duration.is_zero() {
            return Err(PlanError::ZeroDuration);
        }
        Ok(())
    }
}

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTermination {
    /// All paths within the limits were enumerated.
    Completed,
    /// The wallclock budget ran out; only some paths were reported.
    BudgetExceeded,
    /// The search was cancelled; only some paths were reported.
    Terminated,
    /// The callback asked to stop.
    CallbackStopped,
}

/// One hop of the search state.
#[derive(Debug, Clone, Copy)]
struct Frame {
    vertex: usize,
    /// Index of the next neighbour to visit.
    next_neighbor: usize,
    /// The edge taken to reach this frame (`None` for the source frame).
    edge: Option<TakenEdge>,
}

#[derive(Debug, Clone, Copy)]
struct TakenEdge {
    link: LinkId,
    dense_index: usize,
    weight: u64,
}

/// Enumerates all paths between a source and a destination. A path is a
/// sequence of unique edges; with [`DfsRequest::node_disjoint`] set, also
/// of unique nodes.
///
/// Every discovered path is passed to the callback; returning `false`
/// terminates the search early. A search from the destination to itself
/// yields a single empty path, regardless of the hop limit.
pub struct Dfs<'a, F> {
    graph: &'a CompactGraph,
    storage: &'a GraphStorage,
    max_hops: usize,
    max_weight: u64,
    budget: Duration,
    steps_to_check: u64,
    node_disjoint: bool,
    src_vertex: usize,
    stack: Vec<Frame>,
    marked_edges: Vec<bool>,
    marked_nodes: Vec<bool>,
    total_weight: u64,
    callback: F,
    cancel: Arc<AtomicBool>,
}

impl<'a, F: FnMut(&LinkSequence) -> bool> Dfs<'a, F> {
    /// Set up a search described by a request. Fails if the source is not
    /// in the graph or the request limits are malformed.
    pub fn new(
        request: &DfsRequest,
        graph: &'a CompactGraph,
        storage: &'a GraphStorage,
        callback: F,
    ) -> Result<Self, PlanError> {
        request.validate()?;
        let src_vertex = storage
            .node_by_name(&request.src)
            .and_then(|node| graph.vertex_by_node.get(&node).copied())
            .ok_or_else(|| PlanError::SourceNotFound(request.src.clone()))?;

        Ok(Self {
            graph,
            storage,
            max_hops: request.max_hops,
            max_weight: request.max_weight.as_nanos() as u64,
            budget: request.max_duration,
            steps_to_check: request.steps_to_check_for_stop,
            node_disjoint: request.node_disjoint,
            src_vertex,
            stack: Vec::with_capacity(request.max_hops.saturating_add(1)),
            marked_edges: vec![false; graph.num_edges],
            marked_nodes: vec![false; graph.vertices.len()],
            total_weight: 0,
            callback,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The cancellation flag of this search. Storing `true` terminates the
    /// search at the next stop check; the flag can be shared with other
    /// threads.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Replace the cancellation flag, e.g. to share one flag across many
    /// searches.
    pub fn set_cancel_handle(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = cancel;
    }

    /// Run the search to one of its four terminations.
    pub fn search(&mut self) -> SearchTermination {
        let graph = self.graph;
        let timer = CountdownTimer::new(self.budget);

        if self.node_disjoint {
            self.marked_nodes[self.src_vertex] = true;
        }
        self.stack.push(Frame {
            vertex: self.src_vertex,
            next_neighbor: 0,
            edge: None,
        });

        let mut steps = 0u64;
        let mut termination = SearchTermination::Completed;
        while !self.stack.is_empty() {
            steps += 1;
            if steps == self.steps_to_check {
                steps = 0;
                if self.cancel.load(Ordering::Relaxed) {
                    termination = SearchTermination::Terminated;
                    break;
                }
                if timer.expired() {
                    termination = SearchTermination::BudgetExceeded;
                    break;
                }
            }

            let top = self.stack.last().unwrap();
            let (vertex, neighbor_index) = (top.vertex, top.next_neighbor);

            if vertex == graph.dst_vertex {
                if !self.report_path() {
                    termination = SearchTermination::CallbackStopped;
                    break;
                }
                self.pop_frame();
                continue;
            }

            let neighbors = &graph.vertices[vertex].neighbors;
            if neighbor_index == neighbors.len() {
                self.pop_frame();
                continue;
            }
            self.stack.last_mut().unwrap().next_neighbor += 1;
            let neighbor = neighbors[neighbor_index];

            // taking an edge (or, node-disjoint, a node) twice is a loop
            let prune_loop = self.marked_edges[neighbor.dense_index]
                || (self.node_disjoint && self.marked_nodes[neighbor.vertex]);

            // can we still hope to reach the destination within the weight
            // budget after taking this edge?
            let weight_after = self.total_weight.saturating_add(neighbor.weight);
            let prune_too_far = weight_after
                .saturating_add(graph.vertices[neighbor.vertex].dist_to_dst)
                > self.max_weight;

            let prune_too_many_hops = self.stack.len() > self.max_hops;

            if prune_loop || prune_too_far || prune_too_many_hops {
                continue;
            }

            self.marked_edges[neighbor.dense_index] = true;
            if self.node_disjoint {
                self.marked_nodes[neighbor.vertex] = true;
            }
            self.total_weight = weight_after;
            self.stack.push(Frame {
                vertex: neighbor.vertex,
                next_neighbor: 0,
                edge: Some(TakenEdge {
                    link: neighbor.link,
                    dense_index: neighbor.dense_index,
                    weight: neighbor.weight,
                }),
            });
        }

        if self.node_disjoint {
            self.marked_nodes[self.src_vertex] = false;
        }
        termination
    }

    /// Materialise the stack as a link sequence and hand it to the
    /// callback.
    fn report_path(&mut self) -> bool {
        let links: Vec<LinkId> = self.stack[1..]
            .iter()
            .map(|frame| frame.edge.unwrap().link)
            .collect();
        let seq = LinkSequence::new(links, self.storage)
            .expect("enumerated paths are loop-free and contiguous");
        (self.callback)(&seq)
    }

    fn pop_frame(&mut self) {
        let frame = self.stack.pop().unwrap();
        if let Some(edge) = frame.edge {
            self.marked_edges[edge.dense_index] = false;
            if self.node_disjoint {
                self.marked_nodes[frame.vertex] = false;
            }
            self.total_weight -= edge.weight;
        }
    }
}

impl<F> std::fmt::Debug for Dfs<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dfs")
            .field("max_hops", &self.max_hops)
            .field("max_weight", &self.max_weight)
            .field("node_disjoint", &self.node_disjoint)
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}
