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

use std::time::Duration;

use maplit::btreeset;
use pretty_assertions::assert_eq;

use super::{braess, single_edge};
use crate::formatter::NetFormatter;
use crate::net::{
    generate_full_graph, ClusterDescription, GraphDescription, GraphStorage, LinkDescription,
    LinkSequence,
};
use crate::types::{Bandwidth, NetError};

fn ld(src: &str, dst: &str, src_port: u32, dst_port: u32) -> LinkDescription {
    LinkDescription::new(
        src,
        dst,
        src_port,
        dst_port,
        Duration::from_millis(1),
        Bandwidth::from_kbps(10),
    )
}

#[test]
fn node_interning() {
    let mut storage = GraphStorage::new();
    let a = storage.node("A");
    let b = storage.node("B");
    assert_ne!(a, b);
    assert_eq!(a, storage.node("A"));
    assert_eq!(storage.node_name(a), "A");
    assert_eq!(storage.node_by_name("C"), None);
    assert!(matches!(
        storage.require_node("C"),
        Err(NetError::NodeNotFound(_))
    ));
}

#[test]
fn link_interning() {
    let mut storage = GraphStorage::new();
    let first = storage.link_from_description(&ld("A", "B", 1, 1)).unwrap();

    // a lookup without ports returns the first link between the nodes
    assert_eq!(first, storage.link_from_description(&ld("A", "B", 0, 0)).unwrap());
    // a lookup with both ports matching returns the same link
    assert_eq!(first, storage.link_from_description(&ld("A", "B", 1, 1)).unwrap());

    // a double edge with a fresh port pair is a new link
    let second = storage.link_from_description(&ld("A", "B", 2, 2)).unwrap();
    assert_ne!(first, second);
    assert_eq!(storage.num_links(), 2);
    assert_eq!(second, storage.link_from_description(&ld("A", "B", 2, 2)).unwrap());
}

#[test]
fn link_port_consistency() {
    let mut storage = GraphStorage::new();
    storage.link_from_description(&ld("A", "B", 1, 2)).unwrap();

    // matching on exactly one of the two ports is rejected
    assert!(matches!(
        storage.link_from_description(&ld("A", "B", 1, 3)),
        Err(NetError::InconsistentPorts { .. })
    ));
    assert!(matches!(
        storage.link_from_description(&ld("A", "B", 4, 2)),
        Err(NetError::InconsistentPorts { .. })
    ));
}

#[test]
fn link_validation() {
    let mut storage = GraphStorage::new();
    assert!(matches!(
        storage.link_from_description(&ld("", "B", 1, 1)),
        Err(NetError::MissingEndpoint)
    ));
    assert!(matches!(
        storage.link_from_description(&ld("A", "A", 1, 1)),
        Err(NetError::SelfLoop(_))
    ));
    assert!(matches!(
        storage.link_from_description(&ld("A", "B", 0, 1)),
        Err(NetError::MissingPort { .. })
    ));

    let mut zero_delay = ld("A", "B", 1, 1);
    zero_delay.delay_sec = 0.0;
    assert!(matches!(
        storage.link_from_description(&zero_delay),
        Err(NetError::ZeroDelay { .. })
    ));

    let mut zero_bw = ld("A", "B", 1, 1);
    zero_bw.bandwidth_bps = 0;
    assert!(matches!(
        storage.link_from_description(&zero_bw),
        Err(NetError::ZeroBandwidth { .. })
    ));
}

#[test]
fn unique_reverse() {
    let mut storage = GraphStorage::new();
    let ab = storage.link_from_description(&ld("A", "B", 1, 1)).unwrap();
    assert!(matches!(
        storage.find_unique_reverse(ab),
        Err(NetError::NoReverse(_))
    ));

    let ba = storage.link_from_description(&ld("B", "A", 2, 2)).unwrap();
    assert_eq!(storage.find_unique_reverse(ab).unwrap(), ba);
    assert_eq!(storage.find_unique_reverse(ba).unwrap(), ab);

    storage.link_from_description(&ld("B", "A", 3, 3)).unwrap();
    assert!(matches!(
        storage.find_unique_reverse(ab),
        Err(NetError::AmbiguousReverse(_))
    ));
}

#[test]
fn link_sequence_invariants() {
    let (_, mut storage) = braess();
    let ab = storage.find_link("A", "B", 0, 0).unwrap();
    let bc = storage.find_link("B", "C", 0, 0).unwrap();
    let cd = storage.find_link("C", "D", 0, 0).unwrap();
    let ba = storage.find_link("B", "A", 0, 0).unwrap();

    let seq = LinkSequence::new(vec![ab, bc, cd], &storage).unwrap();
    assert_eq!(seq.len(), 3);
    assert_eq!(seq.delay(), Duration::from_millis(16));
    assert!(seq.contains(bc));
    assert!(!seq.contains(ba));

    assert!(matches!(
        LinkSequence::new(vec![ab, bc, cd, ab], &storage),
        Err(NetError::DuplicateLink(_))
    ));
    assert!(matches!(
        LinkSequence::new(vec![ab, cd], &storage),
        Err(NetError::DiscontiguousSequence(_))
    ));

    let empty = LinkSequence::empty();
    assert!(empty.is_empty());
    assert_eq!(empty.delay(), Duration::ZERO);
}

#[test]
fn path_interning() {
    let (_, mut storage) = braess();
    let first = storage.path_from_string("[A->B, B->C, C->D]", 1).unwrap();
    let second = storage.path_from_string("[A->B, B->C, C->D]", 1).unwrap();
    assert_eq!(first, second);

    // a different cookie yields a distinct path over the same links
    let other_cookie = storage.path_from_string("[A->B, B->C, C->D]", 2).unwrap();
    assert_ne!(first, other_cookie);
    assert_eq!(
        storage.path(first).link_sequence(),
        storage.path(other_cookie).link_sequence()
    );

    // tags are unique and non-zero for non-empty paths
    assert_ne!(storage.path(first).tag(), 0);
    assert_ne!(storage.path(first).tag(), storage.path(other_cookie).tag());
    assert_eq!(storage.find_path_by_tag(storage.path(first).tag()), Some(first));

    // the empty path is a shared singleton with tag 0
    let empty_a = storage.path_from_string("[]", 1).unwrap();
    let empty_b = storage.path_from_string("[]", 2).unwrap();
    assert_eq!(empty_a, empty_b);
    assert_eq!(empty_a, storage.empty_path());
    assert_eq!(storage.path(empty_a).tag(), 0);
    assert!(storage.path(empty_a).is_empty());
}

#[test]
fn path_delay_and_hops() {
    let (_, mut storage) = braess();
    let path = storage.path_from_string("[A->B, B->C, C->D]", 0).unwrap();
    let path = storage.path(path).clone();
    assert_eq!(path.delay(), Duration::from_millis(16));
    assert_eq!(path.len(), 3);
    assert_eq!(
        path.first_hop(&storage),
        Some(storage.require_node("A").unwrap())
    );
    assert_eq!(
        path.last_hop(&storage),
        Some(storage.require_node("D").unwrap())
    );
}

#[test]
fn path_string_errors() {
    let (_, mut storage) = braess();
    assert!(matches!(
        storage.path_from_string("A->B", 0),
        Err(NetError::MalformedPathString(_))
    ));
    assert!(matches!(
        storage.path_from_string("[A-B]", 0),
        Err(NetError::MalformedPathString(_))
    ));
    assert!(matches!(
        storage.path_from_string("[A->X]", 0),
        Err(NetError::LinkNotFound { .. })
    ));
    // the edge exists in the opposite direction only
    assert!(matches!(
        storage.path_from_string("[C->B]", 0),
        Err(NetError::LinkNotFound { .. })
    ));
}

#[test]
fn path_string_with_ports() {
    let mut storage = GraphStorage::new();
    storage.link_from_description(&ld("A", "B", 1, 1)).unwrap();
    let second = storage.link_from_description(&ld("A", "B", 7, 9)).unwrap();

    let path = storage.path_from_string("[A:7->B:9]", 0).unwrap();
    assert_eq!(storage.path(path).link_sequence().links(), &[second]);
    assert!(matches!(
        storage.path_from_string("[A:7->B:1]", 0),
        Err(NetError::LinkNotFound { .. })
    ));
}

#[test]
fn formatting() {
    let (_, mut storage) = single_edge();
    let link = storage.find_link("A", "B", 0, 0).unwrap();
    assert_eq!(link.fmt(&storage), "A:1->B:1");

    let path = storage.path_from_string("[A->B]", 0).unwrap();
    let seq = storage.path(path).link_sequence().clone();
    assert_eq!(seq.fmt(&storage), "[A:1->B:1]");
    assert_eq!(seq.fmt_compact(&storage), "[A->B]");
    assert_eq!(LinkSequence::empty().fmt_compact(&storage), "[]");
}

#[test]
fn clusters() {
    let mut desc = GraphDescription::new();
    desc.add_bi_edge(
        "A",
        "B",
        Duration::from_millis(1),
        Bandwidth::from_kbps(10),
    );
    desc.add_bi_edge(
        "B",
        "C",
        Duration::from_millis(1),
        Bandwidth::from_kbps(10),
    );
    desc.clusters = vec![
        ClusterDescription {
            name: "left".to_string(),
            nodes: btreeset! {"A".to_string(), "B".to_string()},
        },
        ClusterDescription {
            name: "right".to_string(),
            nodes: btreeset! {"C".to_string()},
        },
    ];

    assert_eq!(
        desc.nodes_in_same_cluster("A").unwrap(),
        btreeset! {"B".to_string()}
    );
    assert_eq!(desc.nodes_in_same_cluster("C").unwrap(), btreeset! {});
    assert_eq!(
        desc.nodes_in_other_clusters("A").unwrap(),
        btreeset! {"C".to_string()}
    );
    assert!(matches!(
        desc.nodes_in_same_cluster("X"),
        Err(NetError::NotInCluster(_))
    ));

    assert!(desc.is_intra_cluster_link(&desc.links[0]));
    assert!(!desc.is_intra_cluster_link(&desc.links[2]));
}

#[test]
fn full_graph_generator() {
    let desc = generate_full_graph(3, Bandwidth::from_kbps(10), Duration::from_micros(10));
    assert_eq!(desc.links.len(), 6);
    let storage = GraphStorage::from_description(&desc).unwrap();
    assert_eq!(storage.num_links(), 6);
    assert_eq!(storage.nodes().count(), 3);
    assert!(desc.contains_node("N2"));
    assert!(!desc.contains_node("N3"));
}

#[test]
fn graph_description_serde() {
    let (desc, _) = braess();
    let json = serde_json::to_string(&desc).unwrap();
    let parsed: GraphDescription = serde_json::from_str(&json).unwrap();
    assert_eq!(desc, parsed);
}
