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

use std::sync::atomic::Ordering;
use std::time::Duration;

use netsim::net::{GraphStorage, LinkSequence};
use pretty_assertions::assert_eq;

use super::{braess, clique, default_request, is_in_paths, single_edge};
use crate::dfs::{CompactGraph, Dfs, DfsRequest, SearchTermination};
use crate::error::PlanError;

/// Run a search and collect all discovered paths.
fn run_dfs(
    storage: &GraphStorage,
    request: &DfsRequest,
    dst: &str,
) -> (Vec<LinkSequence>, SearchTermination) {
    let graph = CompactGraph::new(storage, dst).unwrap();
    let mut paths = Vec::new();
    let mut dfs = Dfs::new(request, &graph, storage, |seq| {
        paths.push(seq.clone());
        true
    })
    .unwrap();
    let termination = dfs.search();
    (paths, termination)
}

#[test]
fn bad_source() {
    let storage = single_edge();
    let graph = CompactGraph::new(&storage, "B").unwrap();
    let request = default_request("BLAH");
    assert!(matches!(
        Dfs::new(&request, &graph, &storage, |_| true),
        Err(PlanError::SourceNotFound(_))
    ));
}

#[test]
fn bad_destination() {
    let storage = single_edge();
    assert!(matches!(
        CompactGraph::new(&storage, "BLAH"),
        Err(PlanError::DestinationNotFound(_))
    ));
}

#[test]
fn zero_stop_check_step() {
    let storage = single_edge();
    let graph = CompactGraph::new(&storage, "B").unwrap();
    let mut request = default_request("A");
    request.steps_to_check_for_stop = 0;
    assert!(matches!(
        Dfs::new(&request, &graph, &storage, |_| true),
        Err(PlanError::ZeroStopCheckStep)
    ));
}

#[test]
fn source_is_destination() {
    let storage = single_edge();
    let (paths, termination) = run_dfs(&storage, &default_request("B"), "B");
    assert_eq!(termination, SearchTermination::Completed);
    assert_eq!(paths.len(), 1);
    assert!(paths[0].is_empty());
}

#[test]
fn source_is_destination_with_zero_hop_limit() {
    let storage = single_edge();
    let mut request = default_request("B");
    request.max_hops = 0;
    let (paths, _) = run_dfs(&storage, &request, "B");
    assert_eq!(paths.len(), 1);
    assert!(paths[0].is_empty());
}

#[test]
fn single_path() {
    let mut storage = single_edge();
    let (paths, termination) = run_dfs(&storage, &default_request("A"), "B");
    assert_eq!(termination, SearchTermination::Completed);
    assert_eq!(paths.len(), 1);
    assert!(is_in_paths(&mut storage, "[A->B]", &paths));
}

#[test]
fn one_hop_limit() {
    let storage = single_edge();
    let mut request = default_request("A");
    request.max_hops = 1;
    let (paths, _) = run_dfs(&storage, &request, "B");
    assert_eq!(paths.len(), 1);
}

#[test]
fn zero_hop_limit() {
    let storage = single_edge();
    let mut request = default_request("A");
    request.max_hops = 0;
    let (paths, _) = run_dfs(&storage, &request, "B");
    assert!(paths.is_empty());
}

#[test]
fn insufficient_weight_limit() {
    let storage = single_edge();
    let mut request = default_request("A");
    request.max_weight = Duration::ZERO;
    let (paths, _) = run_dfs(&storage, &request, "B");
    assert!(paths.is_empty());
}

#[test]
fn braess_weight_limits() {
    let storage = braess();

    // no path from A to D is shorter than 10ms
    let mut request = default_request("A");
    request.max_weight = Duration::from_millis(9);
    assert!(run_dfs(&storage, &request, "D").0.is_empty());

    // exactly one path of 10ms
    request.max_weight = Duration::from_millis(10);
    assert_eq!(run_dfs(&storage, &request, "D").0.len(), 1);

    // two paths of up to 15ms
    request.max_weight = Duration::from_millis(15);
    assert_eq!(run_dfs(&storage, &request, "D").0.len(), 2);

    // three paths of up to 16ms
    request.max_weight = Duration::from_millis(16);
    assert_eq!(run_dfs(&storage, &request, "D").0.len(), 3);
}

#[test]
fn braess_all_edge_disjoint_paths() {
    let mut storage = braess();
    let (paths, _) = run_dfs(&storage, &default_request("A"), "D");

    assert_eq!(paths.len(), 7);
    for needle in [
        "[A->B, B->D]",
        "[A->C, C->D]",
        "[A->B, B->C, C->D]",
        "[A->B, B->A, A->C, C->D]",
        "[A->B, B->C, C->A, A->C, C->D]",
        "[A->C, C->A, A->B, B->D]",
        "[A->C, C->A, A->B, B->C, C->D]",
    ] {
        assert!(is_in_paths(&mut storage, needle, &paths), "missing {needle}");
    }
}

#[test]
fn braess_node_disjoint_paths() {
    let mut storage = braess();
    let mut request = default_request("A");
    request.node_disjoint = true;
    let (paths, _) = run_dfs(&storage, &request, "D");

    assert_eq!(paths.len(), 3);
    for needle in ["[A->B, B->D]", "[A->C, C->D]", "[A->B, B->C, C->D]"] {
        assert!(is_in_paths(&mut storage, needle, &paths), "missing {needle}");
    }
}

#[test]
fn loop_freedom_and_delay_correctness() {
    let storage = braess();
    let (paths, _) = run_dfs(&storage, &default_request("A"), "D");

    for path in &paths {
        // no link appears twice
        let mut links = path.links().to_vec();
        links.sort();
        links.dedup();
        assert_eq!(links.len(), path.len());

        // the reported delay is the sum of the link delays
        let total: Duration = path.links().iter().map(|l| storage.link(*l).delay()).sum();
        assert_eq!(total, path.delay());
    }
}

#[test]
fn clique_paths_from_n1_to_n0() {
    let mut storage = clique(3);
    let (paths, _) = run_dfs(&storage, &default_request("N1"), "N0");

    assert_eq!(paths.len(), 3);
    assert!(is_in_paths(&mut storage, "[N1->N0]", &paths));
    assert!(is_in_paths(&mut storage, "[N1->N2, N2->N0]", &paths));
    assert!(is_in_paths(&mut storage, "[N1->N2, N2->N1, N1->N0]", &paths));

    // neighbours are visited by ascending distance to the destination, so
    // the shortest path is discovered first
    assert_eq!(paths[0].len(), 1);
}

#[test]
fn distance_to_destination() {
    let storage = braess();
    let graph = CompactGraph::new(&storage, "D").unwrap();
    let a = storage.node_by_name("A").unwrap();
    let d = storage.node_by_name("D").unwrap();
    assert_eq!(
        graph.distance_to_destination(a),
        Some(Duration::from_millis(10).as_nanos() as u64)
    );
    assert_eq!(graph.distance_to_destination(d), Some(0));
}

#[test]
fn callback_can_stop_the_search() {
    let storage = braess();
    let graph = CompactGraph::new(&storage, "D").unwrap();
    let request = default_request("A");

    let mut count = 0;
    let mut dfs = Dfs::new(&request, &graph, &storage, |_| {
        count += 1;
        count < 2
    })
    .unwrap();
    assert_eq!(dfs.search(), SearchTermination::CallbackStopped);
    assert_eq!(count, 2);
}

#[test]
fn wallclock_budget_is_enforced() {
    let storage = clique(8);
    let graph = CompactGraph::new(&storage, "N0").unwrap();
    let mut request = default_request("N1");
    request.max_duration = Duration::from_nanos(1);
    request.steps_to_check_for_stop = 1;

    let mut count = 0usize;
    let mut dfs = Dfs::new(&request, &graph, &storage, |_| {
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(dfs.search(), SearchTermination::BudgetExceeded);
    // the clique holds far more edge-disjoint paths than the budget allows
    assert!(count < 100);
}

#[test]
fn cancellation_is_honoured() {
    let storage = clique(6);
    let graph = CompactGraph::new(&storage, "N0").unwrap();
    let mut request = default_request("N1");
    request.steps_to_check_for_stop = 1;

    let mut dfs = Dfs::new(&request, &graph, &storage, |_| true).unwrap();
    dfs.cancel_handle().store(true, Ordering::Relaxed);
    assert_eq!(dfs.search(), SearchTermination::Terminated);
}

#[test]
fn request_serde() {
    let request = default_request("A");
    let json = serde_json::to_string(&request).unwrap();
    let parsed: DfsRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(request, parsed);
}
