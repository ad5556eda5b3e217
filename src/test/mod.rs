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

use std::time::Duration;

use netsim::net::{generate_full_graph, GraphDescription, GraphStorage, LinkSequence};
use netsim::types::Bandwidth;

use crate::dfs::DfsRequest;

mod test_constraint;
mod test_dfs;

/// A graph with two nodes and a single unidirectional link A -> B with a
/// delay of 1ms.
pub(crate) fn single_edge() -> GraphStorage {
    let mut desc = GraphDescription::new();
    desc.add_edge(
        "A",
        "B",
        Duration::from_millis(1),
        Bandwidth::from_mbps(100),
    );
    GraphStorage::from_description(&desc).unwrap()
}

/// A simple example of Braess's paradox: a diamond with a shortcut in the
/// middle. Bidirectional A - B (5ms), A - C (5ms), B - D (5ms) and C - D
/// (10ms) edges, plus the unidirectional shortcut B -> C (1ms).
///
/// The edge-disjoint paths from A to D and their delays:
/// `[A->B, B->D]` 10ms, `[A->C, C->D]` 15ms, `[A->B, B->C, C->D]` 16ms,
/// `[A->C, C->A, A->B, B->D]` 20ms, `[A->C, C->A, A->B, B->C, C->D]` 21ms,
/// `[A->B, B->A, A->C, C->D]` 25ms and
/// `[A->B, B->C, C->A, A->C, C->D]` 26ms.
pub(crate) fn braess() -> GraphStorage {
    let bw = Bandwidth::from_mbps(1000);
    let ms = Duration::from_millis;

    let mut desc = GraphDescription::new();
    desc.add_bi_edge("A", "B", ms(5), bw);
    desc.add_bi_edge("A", "C", ms(5), bw);
    desc.add_edge("B", "C", ms(1), bw);
    desc.add_bi_edge("B", "D", ms(5), bw);
    desc.add_bi_edge("C", "D", ms(10), bw);
    GraphStorage::from_description(&desc).unwrap()
}

/// A full graph on `n` nodes, all links with a delay of 10us and 10kbps of
/// bandwidth.
pub(crate) fn clique(n: usize) -> GraphStorage {
    let desc = generate_full_graph(n, Bandwidth::from_kbps(10), Duration::from_micros(10));
    GraphStorage::from_description(&desc).unwrap()
}

/// A request template with generous limits, as used by most tests.
pub(crate) fn default_request(src: &str) -> DfsRequest {
    DfsRequest::new(src)
}

/// True if `haystack` contains the path given as a path string.
pub(crate) fn is_in_paths(
    storage: &mut GraphStorage,
    needle: &str,
    haystack: &[LinkSequence],
) -> bool {
    let id = storage.path_from_string(needle, u64::MAX).unwrap();
    let needle = storage.path(id).link_sequence().clone();
    haystack.contains(&needle)
}
