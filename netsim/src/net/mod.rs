// NetSim: Packet-level network simulator and graph toolkit written in Rust
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

//! The network model: nodes, links, link sequences and interned paths.
//!
//! A [`GraphStorage`] owns every node, link and path of a network and hands
//! out stable, copyable handles to them. Equal link sequences interned under
//! the same cookie map to the same [`GraphPath`] (and the same tag); the
//! empty path is a cookie-independent singleton with tag 0.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use crate::types::{Bandwidth, IndexType, LinkId, NetError, NodeId, PathId};

/// The graph type underlying a [`GraphStorage`].
pub type NetGraph = StableGraph<GraphNode, GraphLink, Directed, IndexType>;

/// Description of a single directed link (the wire form of a link).
///
/// Ports may be left at zero when the description is used to look up an
/// existing link; creating a new link requires both ports to be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    /// Name of the source node.
    pub src: String,
    /// Name of the destination node.
    pub dst: String,
    /// Port on the source node.
    #[serde(default)]
    pub src_port: u32,
    /// Port on the destination node.
    #[serde(default)]
    pub dst_port: u32,
    /// Propagation delay in seconds.
    pub delay_sec: f64,
    /// Bandwidth in bits per second.
    pub bandwidth_bps: u64,
}

impl LinkDescription {
    /// Create a new link description with explicit ports.
    pub fn new(
        src: impl Into<String>,
        dst: impl Into<String>,
        src_port: u32,
        dst_port: u32,
        delay: Duration,
        bandwidth: Bandwidth,
    ) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            src_port,
            dst_port,
            delay_sec: delay.as_secs_f64(),
            bandwidth_bps: bandwidth.bps(),
        }
    }

    /// The delay of the link.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_sec.max(0.0))
    }

    /// The bandwidth of the link.
    pub fn bandwidth(&self) -> Bandwidth {
        Bandwidth::from_bps(self.bandwidth_bps)
    }
}

/// A named set of nodes. A node belongs to at most one cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescription {
    /// Name of the cluster.
    pub name: String,
    /// The nodes of the cluster.
    pub nodes: BTreeSet<String>,
}

/// Description of an entire network (the wire form of a graph): a flat set
/// of directed links, plus optional clustering information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    /// All links of the network.
    pub links: Vec<LinkDescription>,
    /// Optional named clusters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterDescription>,
}

impl GraphDescription {
    /// Create an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single edge with auto-assigned port numbers.
    pub fn add_edge(&mut self, src: &str, dst: &str, delay: Duration, bandwidth: Bandwidth) {
        let port = self.links.len() as u32 + 1;
        self.links
            .push(LinkDescription::new(src, dst, port, port, delay, bandwidth));
    }

    /// Like [`Self::add_edge`], but also adds the edge from `dst` to `src`.
    pub fn add_bi_edge(&mut self, src: &str, dst: &str, delay: Duration, bandwidth: Bandwidth) {
        self.add_edge(src, dst, delay, bandwidth);
        self.add_edge(dst, src, delay, bandwidth);
    }

    /// Add a list of edges, all with the same delay and bandwidth and with
    /// auto-assigned port numbers.
    pub fn add_edges(&mut self, edges: &[(&str, &str)], delay: Duration, bandwidth: Bandwidth) {
        for (src, dst) in edges {
            self.add_edge(src, dst, delay, bandwidth);
        }
    }

    /// Like [`Self::add_edges`], but for each edge also adds the opposite
    /// edge.
    pub fn add_bi_edges(&mut self, edges: &[(&str, &str)], delay: Duration, bandwidth: Bandwidth) {
        for (src, dst) in edges {
            self.add_bi_edge(src, dst, delay, bandwidth);
        }
    }

    /// Returns true if there is a link with an endpoint equal to `node`.
    pub fn contains_node(&self, node: &str) -> bool {
        self.links.iter().any(|l| l.src == node || l.dst == node)
    }

    /// All node names referenced by the links, sorted.
    pub fn node_names(&self) -> BTreeSet<String> {
        self.links
            .iter()
            .flat_map(|l| [l.src.clone(), l.dst.clone()])
            .collect()
    }

    /// The nodes that share a cluster with `node` (excluding `node` itself).
    /// Fails if `node` is not in any cluster.
    pub fn nodes_in_same_cluster(&self, node: &str) -> Result<BTreeSet<String>, NetError> {
        let cluster = self
            .clusters
            .iter()
            .find(|c| c.nodes.contains(node))
            .ok_or_else(|| NetError::NotInCluster(node.to_string()))?;
        Ok(cluster
            .nodes
            .iter()
            .filter(|n| n.as_str() != node)
            .cloned()
            .collect())
    }

    /// All nodes that are in a cluster other than the one of `node`. Fails
    /// if `node` is not in any cluster.
    pub fn nodes_in_other_clusters(&self, node: &str) -> Result<BTreeSet<String>, NetError> {
        if !self.clusters.iter().any(|c| c.nodes.contains(node)) {
            return Err(NetError::NotInCluster(node.to_string()));
        }
        Ok(self
            .clusters
            .iter()
            .filter(|c| !c.nodes.contains(node))
            .flat_map(|c| c.nodes.iter().cloned())
            .collect())
    }

    /// Returns true if both endpoints of the link are in the same cluster.
    pub fn is_intra_cluster_link(&self, link: &LinkDescription) -> bool {
        self.clusters
            .iter()
            .any(|c| c.nodes.contains(&link.src) && c.nodes.contains(&link.dst))
    }
}

/// Generate a full graph on `num_nodes` nodes (named `N0`, `N1`, ...) where
/// all links share the same bandwidth and delay. Useful for testing.
pub fn generate_full_graph(
    num_nodes: usize,
    bandwidth: Bandwidth,
    delay: Duration,
) -> GraphDescription {
    let mut desc = GraphDescription::new();
    for i in 0..num_nodes {
        for j in 0..num_nodes {
            if i != j {
                desc.add_edge(&format!("N{i}"), &format!("N{j}"), delay, bandwidth);
            }
        }
    }
    desc
}

/// A node of the network. Created when first referenced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    name: String,
}

impl GraphNode {
    /// The human-readable name of the node.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A directed link of the network. There is exactly one `GraphLink` per
/// (source, destination, port pair) in a storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLink {
    src: NodeId,
    dst: NodeId,
    src_port: u32,
    dst_port: u32,
    delay: Duration,
    bandwidth: Bandwidth,
}

impl GraphLink {
    /// The source node.
    pub fn src(&self) -> NodeId {
        self.src
    }

    /// The destination node.
    pub fn dst(&self) -> NodeId {
        self.dst
    }

    /// The port on the source node.
    pub fn src_port(&self) -> u32 {
        self.src_port
    }

    /// The port on the destination node.
    pub fn dst_port(&self) -> u32 {
        self.dst_port
    }

    /// The propagation delay of the link.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The bandwidth of the link.
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }
}

/// An ordered sequence of links with a derived total delay.
///
/// Invariants: no link appears twice, and consecutive links are contiguous
/// (the destination of link *i* is the source of link *i+1*). Both are
/// checked on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSequence {
    links: Vec<LinkId>,
    // sorted copy, used by `contains`
    links_sorted: Vec<LinkId>,
    delay: Duration,
}

impl LinkSequence {
    /// The empty sequence.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a sequence from a list of links, validating the sequence
    /// invariants and computing the total delay.
    pub fn new(links: Vec<LinkId>, storage: &GraphStorage) -> Result<Self, NetError> {
        let mut links_sorted = links.clone();
        links_sorted.sort();
        for w in links_sorted.windows(2) {
            if w[0] == w[1] {
                return Err(NetError::DuplicateLink(format!("{:?}", w[0])));
            }
        }

        let mut delay = Duration::ZERO;
        for (i, link) in links.iter().enumerate() {
            let l = storage.link(*link);
            delay += l.delay();
            if i + 1 < links.len() {
                let next = storage.link(links[i + 1]);
                if l.dst() != next.src() {
                    return Err(NetError::DiscontiguousSequence(
                        storage.node_name(l.dst()).to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            links,
            links_sorted,
            delay,
        })
    }

    /// The total delay of the sequence.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of links in the sequence.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the sequence has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The links of the sequence, in order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    /// Whether the sequence contains the given link.
    pub fn contains(&self, link: LinkId) -> bool {
        self.links_sorted.binary_search(&link).is_ok()
    }
}

/// An interned path: a link sequence plus a tag and the cookie it was
/// interned under. Two equal sequences interned under the same cookie share
/// the same `GraphPath` (and tag); under different cookies they do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPath {
    seq: LinkSequence,
    tag: u32,
    cookie: u64,
}

impl GraphPath {
    /// The underlying link sequence.
    pub fn link_sequence(&self) -> &LinkSequence {
        &self.seq
    }

    /// The delay of the path.
    pub fn delay(&self) -> Duration {
        self.seq.delay()
    }

    /// The tag identifying the path. The empty path has tag 0.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// The cookie the path was interned under.
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    /// True if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Number of links in the path.
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// The first node along the path, if the path is non-empty.
    pub fn first_hop(&self, storage: &GraphStorage) -> Option<NodeId> {
        self.seq.links().first().map(|l| storage.link(*l).src())
    }

    /// The last node along the path, if the path is non-empty.
    pub fn last_hop(&self, storage: &GraphStorage) -> Option<NodeId> {
        self.seq.links().last().map(|l| storage.link(*l).dst())
    }
}

/// Owner of all nodes, links and paths of a network.
#[derive(Debug)]
pub struct GraphStorage {
    graph: NetGraph,
    nodes_by_name: HashMap<String, NodeId>,
    links_by_pair: HashMap<(NodeId, NodeId), Vec<LinkId>>,
    // non-empty paths, grouped by cookie and then by link sequence
    paths_by_cookie: BTreeMap<u64, BTreeMap<Vec<LinkId>, PathId>>,
    // all paths; the index into this vector is the tag, entry 0 is the
    // empty path singleton
    paths: Vec<GraphPath>,
}

impl Default for GraphStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self {
            graph: NetGraph::default(),
            nodes_by_name: HashMap::new(),
            links_by_pair: HashMap::new(),
            paths_by_cookie: BTreeMap::new(),
            paths: vec![GraphPath {
                seq: LinkSequence::empty(),
                tag: 0,
                cookie: 0,
            }],
        }
    }

    /// Create a storage and intern all links of a description.
    pub fn from_description(desc: &GraphDescription) -> Result<Self, NetError> {
        let mut storage = Self::new();
        for link in &desc.links {
            storage.link_from_description(link)?;
        }
        Ok(storage)
    }

    /// The underlying graph. Node weights are [`GraphNode`]s and edge
    /// weights are [`GraphLink`]s.
    pub fn topology(&self) -> &NetGraph {
        &self.graph
    }

    /// Intern a node by name. Repeated calls with the same name return the
    /// same id.
    pub fn node(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.nodes_by_name.get(name) {
            return *id;
        }
        let id = self.graph.add_node(GraphNode {
            name: name.to_string(),
        });
        self.nodes_by_name.insert(name.to_string(), id);
        id
    }

    /// Look up a node by name without creating it.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes_by_name.get(name).copied()
    }

    /// Look up a node by name, or fail with [`NetError::NodeNotFound`].
    pub fn require_node(&self, name: &str) -> Result<NodeId, NetError> {
        self.node_by_name(name)
            .ok_or_else(|| NetError::NodeNotFound(name.to_string()))
    }

    /// The name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        self.graph.node_weight(node).unwrap().name()
    }

    /// Iterator over all nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    /// The link behind a handle.
    pub fn link(&self, link: LinkId) -> &GraphLink {
        self.graph.edge_weight(link).unwrap()
    }

    /// Iterator over all links, in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &GraphLink)> + '_ {
        self.graph.edge_indices().map(|e| (e, self.link(e)))
    }

    /// Number of links in the storage.
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Intern a link from its description.
    ///
    /// If both ports are zero and a link between the two endpoints exists,
    /// the first such link is returned. If ports are set, they must match an
    /// existing link on both ports or on neither: matching on exactly one
    /// port fails. When no existing link matches, a new one is created; new
    /// links need non-zero ports and positive delay and bandwidth.
    pub fn link_from_description(&mut self, d: &LinkDescription) -> Result<LinkId, NetError> {
        if d.src.is_empty() || d.dst.is_empty() {
            return Err(NetError::MissingEndpoint);
        }
        if d.src == d.dst {
            return Err(NetError::SelfLoop(d.src.clone()));
        }

        if let (Some(src), Some(dst)) = (self.node_by_name(&d.src), self.node_by_name(&d.dst)) {
            if let Some(candidates) = self.links_by_pair.get(&(src, dst)) {
                if d.src_port == 0 && d.dst_port == 0 {
                    return Ok(candidates[0]);
                }

                let mut with_same_src_port = None;
                let mut with_same_dst_port = None;
                for link_id in candidates {
                    let link = self.link(*link_id);
                    if d.src_port != 0 && link.src_port() == d.src_port {
                        with_same_src_port = Some(*link_id);
                    }
                    if d.dst_port != 0 && link.dst_port() == d.dst_port {
                        with_same_dst_port = Some(*link_id);
                    }
                }

                if with_same_src_port != with_same_dst_port {
                    return Err(NetError::InconsistentPorts {
                        src: d.src.clone(),
                        dst: d.dst.clone(),
                    });
                }
                if let Some(link_id) = with_same_src_port {
                    return Ok(link_id);
                }
            }
        }

        // no existing link matches, create a new one
        if d.src_port == 0 || d.dst_port == 0 {
            return Err(NetError::MissingPort {
                src: d.src.clone(),
                dst: d.dst.clone(),
            });
        }
        if !(d.delay_sec > 0.0) || !d.delay_sec.is_finite() {
            return Err(NetError::ZeroDelay {
                src: d.src.clone(),
                dst: d.dst.clone(),
            });
        }
        if d.bandwidth_bps == 0 {
            return Err(NetError::ZeroBandwidth {
                src: d.src.clone(),
                dst: d.dst.clone(),
            });
        }

        let src = self.node(&d.src);
        let dst = self.node(&d.dst);
        let link = GraphLink {
            src,
            dst,
            src_port: d.src_port,
            dst_port: d.dst_port,
            delay: d.delay(),
            bandwidth: d.bandwidth(),
        };
        let id = self.graph.add_edge(src, dst, link);
        self.links_by_pair.entry((src, dst)).or_default().push(id);
        Ok(id)
    }

    /// Find an existing link by endpoint names and (optional) ports. Zero
    /// ports match the first link between the endpoints; non-zero ports must
    /// match exactly. Never creates a link.
    pub fn find_link(
        &self,
        src: &str,
        dst: &str,
        src_port: u32,
        dst_port: u32,
    ) -> Result<LinkId, NetError> {
        if src == dst {
            return Err(NetError::SelfLoop(src.to_string()));
        }
        let not_found = || NetError::LinkNotFound {
            src: src.to_string(),
            dst: dst.to_string(),
        };
        let (src_id, dst_id) = match (self.node_by_name(src), self.node_by_name(dst)) {
            (Some(s), Some(d)) => (s, d),
            _ => return Err(not_found()),
        };
        let candidates = self.links_by_pair.get(&(src_id, dst_id)).ok_or_else(not_found)?;
        if src_port == 0 && dst_port == 0 {
            return Ok(candidates[0]);
        }
        candidates
            .iter()
            .copied()
            .find(|l| {
                let link = self.link(*l);
                link.src_port() == src_port && link.dst_port() == dst_port
            })
            .ok_or_else(not_found)
    }

    /// Find the unique link in the opposite direction of `link`. Fails if
    /// zero or multiple reverse links exist.
    pub fn find_unique_reverse(&self, link: LinkId) -> Result<LinkId, NetError> {
        let l = self.link(link);
        let fmt = || {
            format!(
                "{} -> {}",
                self.node_name(l.src()),
                self.node_name(l.dst())
            )
        };
        match self.links_by_pair.get(&(l.dst(), l.src())) {
            None => Err(NetError::NoReverse(fmt())),
            Some(reverse) if reverse.is_empty() => Err(NetError::NoReverse(fmt())),
            Some(reverse) if reverse.len() > 1 => Err(NetError::AmbiguousReverse(fmt())),
            Some(reverse) => Ok(reverse[0]),
        }
    }

    /// Intern a link sequence under a cookie. Equal sequences interned under
    /// equal cookies return the same path; empty sequences always return the
    /// empty path singleton.
    pub fn path_from_links(&mut self, seq: &LinkSequence, cookie: u64) -> PathId {
        if seq.is_empty() {
            return PathId(0);
        }
        let path_map = self.paths_by_cookie.entry(cookie).or_default();
        if let Some(id) = path_map.get(seq.links()) {
            return *id;
        }
        let tag = self.paths.len() as u32;
        let id = PathId(tag);
        path_map.insert(seq.links().to_vec(), id);
        self.paths.push(GraphPath {
            seq: seq.clone(),
            tag,
            cookie,
        });
        id
    }

    /// Parse and intern a path of the form `[A->B, B->C]` or
    /// `[A:p1->B:p2, B:p3->C:p4]`. The empty path is `[]`. Every edge must
    /// already exist in the storage.
    pub fn path_from_string(&mut self, path_str: &str, cookie: u64) -> Result<PathId, NetError> {
        let malformed = || NetError::MalformedPathString(path_str.to_string());
        let inner = path_str
            .strip_prefix('[')
            .and_then(|x| x.strip_suffix(']'))
            .ok_or_else(malformed)?
            .trim();
        if inner.is_empty() {
            return Ok(self.empty_path());
        }

        let mut links = Vec::new();
        for edge_str in inner.split(',') {
            let (src, dst) = edge_str.trim().split_once("->").ok_or_else(malformed)?;
            let (src_name, src_port) = parse_endpoint(src).ok_or_else(malformed)?;
            let (dst_name, dst_port) = parse_endpoint(dst).ok_or_else(malformed)?;
            links.push(self.find_link(src_name, dst_name, src_port, dst_port)?);
        }

        let seq = LinkSequence::new(links, self)?;
        Ok(self.path_from_links(&seq, cookie))
    }

    /// The empty path singleton.
    pub fn empty_path(&self) -> PathId {
        PathId(0)
    }

    /// The path behind a handle.
    pub fn path(&self, id: PathId) -> &GraphPath {
        &self.paths[id.0 as usize]
    }

    /// Reverse lookup of a path by tag, across all cookies.
    pub fn find_path_by_tag(&self, tag: u32) -> Option<PathId> {
        self.paths.get(tag as usize).map(|p| PathId(p.tag))
    }

    /// Dump all interned paths, one line per path (`path|tag|cookie|delay`).
    pub fn dump_paths(&self) -> String {
        use crate::formatter::NetFormatter;
        use std::fmt::Write;

        let mut out = String::new();
        for (cookie, path_map) in &self.paths_by_cookie {
            for id in path_map.values() {
                let path = self.path(*id);
                writeln!(
                    out,
                    "{}|{}|{}|{:?}",
                    path.link_sequence().fmt_compact(self),
                    path.tag(),
                    cookie,
                    path.delay(),
                )
                .unwrap();
            }
        }
        out
    }
}

/// Parse `name` or `name:port` into its parts. Returns `None` on a
/// malformed port.
fn parse_endpoint(s: &str) -> Option<(&str, u32)> {
    let s = s.trim();
    match s.split_once(':') {
        None if !s.is_empty() => Some((s, 0)),
        Some((name, port)) if !name.is_empty() => Some((name, port.parse().ok()?)),
        _ => None,
    }
}
