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

use netsim::net::{GraphStorage, LinkSequence};
use netsim::types::NetError;
use pretty_assertions::assert_eq;

use super::braess;
use crate::dfs::constraint::{Constraint, ConstraintDescription, EdgeDescription};
use crate::error::PlanError;

fn seq(storage: &mut GraphStorage, path: &str) -> LinkSequence {
    let id = storage.path_from_string(path, 0).unwrap();
    storage.path(id).link_sequence().clone()
}

fn visit(src: &str, dst: &str) -> ConstraintDescription {
    ConstraintDescription::VisitEdge {
        edge: EdgeDescription::new(src, dst),
    }
}

fn avoid(src: &str, dst: &str) -> ConstraintDescription {
    ConstraintDescription::AvoidEdge {
        edge: EdgeDescription::new(src, dst),
    }
}

#[test]
fn dummy_always_complies() {
    let mut storage = braess();
    let constraint = ConstraintDescription::Dummy
        .compile(&mut storage, 0)
        .unwrap();

    for path in ["[]", "[A->B]", "[D->B, B->A]"] {
        let path = seq(&mut storage, path);
        assert!(constraint.complies(&path));
    }
}

#[test]
fn visit_edge() {
    let mut storage = braess();
    let constraint = visit("A", "B").compile(&mut storage, 0).unwrap();

    assert!(!constraint.complies(&seq(&mut storage, "[]")));
    assert!(constraint.complies(&seq(&mut storage, "[A->B]")));
    assert!(!constraint.complies(&seq(&mut storage, "[D->B, B->A]")));
    assert!(constraint.complies(&seq(&mut storage, "[C->A, A->B, B->A]")));
    assert!(!constraint.complies(&seq(&mut storage, "[A->C, C->D]")));
}

#[test]
fn visit_edge_compile_errors() {
    let mut storage = braess();
    // self loop
    assert!(matches!(
        visit("A", "A").compile(&mut storage, 0),
        Err(PlanError::Net(NetError::SelfLoop(_)))
    ));
    // the A -> D edge does not exist
    assert!(matches!(
        visit("A", "D").compile(&mut storage, 0),
        Err(PlanError::Net(NetError::LinkNotFound { .. }))
    ));
    // empty endpoint
    assert!(matches!(
        visit("", "D").compile(&mut storage, 0),
        Err(PlanError::Net(NetError::LinkNotFound { .. }))
    ));
}

#[test]
fn avoid_edge() {
    let mut storage = braess();
    let constraint = avoid("A", "B").compile(&mut storage, 0).unwrap();

    assert!(constraint.complies(&seq(&mut storage, "[]")));
    assert!(!constraint.complies(&seq(&mut storage, "[A->B]")));
    assert!(constraint.complies(&seq(&mut storage, "[D->B, B->A]")));
    assert!(!constraint.complies(&seq(&mut storage, "[C->A, A->B, B->A]")));
    assert!(constraint.complies(&seq(&mut storage, "[A->C, C->D]")));
}

#[test]
fn avoid_edges() {
    let mut storage = braess();
    let constraint = ConstraintDescription::AvoidEdges {
        edges: vec![
            EdgeDescription::new("A", "B"),
            EdgeDescription::new("C", "D"),
        ],
    }
    .compile(&mut storage, 0)
    .unwrap();

    assert!(constraint.complies(&seq(&mut storage, "[]")));
    assert!(constraint.complies(&seq(&mut storage, "[A->C, C->A]")));
    assert!(!constraint.complies(&seq(&mut storage, "[A->B, B->D]")));
    assert!(!constraint.complies(&seq(&mut storage, "[A->C, C->D]")));
}

#[test]
fn avoid_path() {
    let mut storage = braess();
    let constraint = ConstraintDescription::AvoidPath {
        path: "[A->B, B->D]".to_string(),
    }
    .compile(&mut storage, 0)
    .unwrap();

    // only the exact path is excluded
    assert!(!constraint.complies(&seq(&mut storage, "[A->B, B->D]")));
    assert!(constraint.complies(&seq(&mut storage, "[A->B]")));
    assert!(constraint.complies(&seq(&mut storage, "[A->C, C->D]")));
    assert!(constraint.complies(&seq(&mut storage, "[]")));
}

#[test]
fn avoid_empty_path_is_rejected() {
    let mut storage = braess();
    assert!(matches!(
        ConstraintDescription::AvoidPath {
            path: "[]".to_string()
        }
        .compile(&mut storage, 0),
        Err(PlanError::EmptyAvoidPath)
    ));
    assert!(matches!(
        ConstraintDescription::AvoidPath {
            path: "bogus".to_string()
        }
        .compile(&mut storage, 0),
        Err(PlanError::Net(NetError::MalformedPathString(_)))
    ));
}

#[test]
fn and_or_negate() {
    let mut storage = braess();
    let and = ConstraintDescription::And {
        left: Box::new(visit("A", "B")),
        right: Box::new(avoid("C", "D")),
    }
    .compile(&mut storage, 0)
    .unwrap();
    assert!(and.complies(&seq(&mut storage, "[A->B, B->D]")));
    assert!(!and.complies(&seq(&mut storage, "[A->B, B->C, C->D]")));
    assert!(!and.complies(&seq(&mut storage, "[A->C, C->D]")));

    let or = ConstraintDescription::Or {
        left: Box::new(visit("A", "B")),
        right: Box::new(visit("A", "C")),
    }
    .compile(&mut storage, 0)
    .unwrap();
    assert!(or.complies(&seq(&mut storage, "[A->B, B->D]")));
    assert!(or.complies(&seq(&mut storage, "[A->C, C->D]")));
    assert!(!or.complies(&seq(&mut storage, "[D->B]")));

    let negate = ConstraintDescription::Negate {
        constraint: Box::new(visit("A", "B")),
    }
    .compile(&mut storage, 0)
    .unwrap();
    assert!(!negate.complies(&seq(&mut storage, "[A->B]")));
    assert!(negate.complies(&seq(&mut storage, "[A->C]")));
}

#[test]
fn builders_match_descriptions() {
    let mut storage = braess();
    let ab = storage.find_link("A", "B", 0, 0).unwrap();
    let cd = storage.find_link("C", "D", 0, 0).unwrap();

    let built = Constraint::VisitEdge(ab).and(Constraint::AvoidEdge(cd));
    let compiled = ConstraintDescription::And {
        left: Box::new(visit("A", "B")),
        right: Box::new(avoid("C", "D")),
    }
    .compile(&mut storage, 0)
    .unwrap();
    assert_eq!(built, compiled);

    // avoid_edges sorts and deduplicates
    let bulk = Constraint::avoid_edges(vec![cd, ab, cd]);
    match &bulk {
        Constraint::AvoidEdges(edges) => assert_eq!(edges.len(), 2),
        other => panic!("unexpected constraint: {other:?}"),
    }
}

#[test]
fn description_serde_round_trip() {
    let desc = ConstraintDescription::And {
        left: Box::new(visit("A", "B")),
        right: Box::new(ConstraintDescription::Negate {
            constraint: Box::new(ConstraintDescription::AvoidPath {
                path: "[A->C, C->D]".to_string(),
            }),
        }),
    };
    let json = serde_json::to_string(&desc).unwrap();
    let parsed: ConstraintDescription = serde_json::from_str(&json).unwrap();
    assert_eq!(desc, parsed);
}
