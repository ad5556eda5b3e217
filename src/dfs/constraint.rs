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

//! Composable predicates over link sequences.
//!
//! Constraints are a small closed family: leaf predicates about single
//! edges, edge sets and whole paths, combined with and/or/negate. A
//! constraint can be built programmatically or compiled from its
//! declarative wire form ([`ConstraintDescription`]); malformed
//! descriptions fail at compile time, not at evaluation time.

use netsim::formatter::NetFormatter;
use netsim::net::{GraphStorage, LinkSequence};
use netsim::types::LinkId;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// A predicate deciding whether a path (link sequence) complies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Considers any path compliant.
    Dummy,
    /// The sequence must contain the edge.
    VisitEdge(LinkId),
    /// The sequence must not contain the edge.
    AvoidEdge(LinkId),
    /// The sequence must not contain any of the edges (sorted set).
    AvoidEdges(Vec<LinkId>),
    /// The sequence must not be exactly this path.
    AvoidPath(Vec<LinkId>),
    /// Both constraints must hold (short-circuits on the first).
    And(Box<Constraint>, Box<Constraint>),
    /// At least one constraint must hold (short-circuits on the first).
    Or(Box<Constraint>, Box<Constraint>),
    /// The constraint must not hold.
    Negate(Box<Constraint>),
}

impl Constraint {
    /// Whether the given sequence complies with this constraint.
    pub fn complies(&self, seq: &LinkSequence) -> bool {
        match self {
            Constraint::Dummy => true,
            Constraint::VisitEdge(edge) => seq.contains(*edge),
            Constraint::AvoidEdge(edge) => !seq.contains(*edge),
            Constraint::AvoidEdges(edges) => seq
                .links()
                .iter()
                .all(|link| edges.binary_search(link).is_err()),
            Constraint::AvoidPath(path) => seq.links() != path.as_slice(),
            Constraint::And(left, right) => left.complies(seq) && right.complies(seq),
            Constraint::Or(left, right) => left.complies(seq) || right.complies(seq),
            Constraint::Negate(inner) => !inner.complies(seq),
        }
    }

    /// Build an [`Constraint::AvoidEdges`] constraint, sorting and
    /// deduplicating the edges for fast membership tests.
    pub fn avoid_edges(mut edges: Vec<LinkId>) -> Self {
        edges.sort();
        edges.dedup();
        Constraint::AvoidEdges(edges)
    }

    /// Combine with another constraint conjunctively.
    pub fn and(self, right: Constraint) -> Self {
        Constraint::And(Box::new(self), Box::new(right))
    }

    /// Combine with another constraint disjunctively.
    pub fn or(self, right: Constraint) -> Self {
        Constraint::Or(Box::new(self), Box::new(right))
    }

    /// Negate this constraint.
    pub fn negate(self) -> Self {
        Constraint::Negate(Box::new(self))
    }
}

impl NetFormatter for Constraint {
    fn fmt(&self, storage: &GraphStorage) -> String {
        match self {
            Constraint::Dummy => "[DUMMY]".to_string(),
            Constraint::VisitEdge(edge) => format!("[VISIT {}]", edge.fmt(storage)),
            Constraint::AvoidEdge(edge) => format!("[AVOID {}]", edge.fmt(storage)),
            Constraint::AvoidEdges(edges) => format!("[BULK_AVOID {}]", edges.len()),
            Constraint::AvoidPath(path) => {
                format!("[AVOID_PATH {} links]", path.len())
            }
            Constraint::And(left, right) => {
                format!("[{} AND {}]", left.fmt(storage), right.fmt(storage))
            }
            Constraint::Or(left, right) => {
                format!("[{} OR {}]", left.fmt(storage), right.fmt(storage))
            }
            Constraint::Negate(inner) => format!("[NEGATE {}]", inner.fmt(storage)),
        }
    }
}

/// An edge referenced by node names (and optional ports) in a constraint
/// description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    /// Name of the source node.
    pub src: String,
    /// Name of the destination node.
    pub dst: String,
    /// Port on the source node; zero matches the first link.
    #[serde(default)]
    pub src_port: u32,
    /// Port on the destination node; zero matches the first link.
    #[serde(default)]
    pub dst_port: u32,
}

impl EdgeDescription {
    /// Reference the (first) edge between two nodes.
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            src_port: 0,
            dst_port: 0,
        }
    }
}

/// The declarative (wire) form of a [`Constraint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintDescription {
    /// Compiles to [`Constraint::Dummy`].
    Dummy,
    /// Compiles to [`Constraint::VisitEdge`].
    VisitEdge {
        /// The edge to visit.
        edge: EdgeDescription,
    },
    /// Compiles to [`Constraint::AvoidEdge`].
    AvoidEdge {
        /// The edge to avoid.
        edge: EdgeDescription,
    },
    /// Compiles to [`Constraint::AvoidEdges`].
    AvoidEdges {
        /// The edges to avoid.
        edges: Vec<EdgeDescription>,
    },
    /// Compiles to [`Constraint::AvoidPath`].
    AvoidPath {
        /// The path to avoid, in path-string form (`"[A->B, B->C]"`).
        path: String,
    },
    /// Compiles to [`Constraint::And`].
    And {
        /// Left operand, evaluated first.
        left: Box<ConstraintDescription>,
        /// Right operand.
        right: Box<ConstraintDescription>,
    },
    /// Compiles to [`Constraint::Or`].
    Or {
        /// Left operand, evaluated first.
        left: Box<ConstraintDescription>,
        /// Right operand.
        right: Box<ConstraintDescription>,
    },
    /// Compiles to [`Constraint::Negate`].
    Negate {
        /// The constraint to negate.
        constraint: Box<ConstraintDescription>,
    },
}

impl ConstraintDescription {
    /// Compile the description against a storage. Every referenced edge
    /// must already exist; the avoided path is interned under `cookie`.
    pub fn compile(
        &self,
        storage: &mut GraphStorage,
        cookie: u64,
    ) -> Result<Constraint, PlanError> {
        Ok(match self {
            ConstraintDescription::Dummy => Constraint::Dummy,
            ConstraintDescription::VisitEdge { edge } => {
                Constraint::VisitEdge(find_edge(storage, edge)?)
            }
            ConstraintDescription::AvoidEdge { edge } => {
                Constraint::AvoidEdge(find_edge(storage, edge)?)
            }
            ConstraintDescription::AvoidEdges { edges } => Constraint::avoid_edges(
                edges
                    .iter()
                    .map(|e| find_edge(storage, e))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            ConstraintDescription::AvoidPath { path } => {
                let id = storage.path_from_string(path, cookie)?;
                let path = storage.path(id);
                if path.is_empty() {
                    return Err(PlanError::EmptyAvoidPath);
                }
                Constraint::AvoidPath(path.link_sequence().links().to_vec())
            }
            ConstraintDescription::And { left, right } => Constraint::And(
                Box::new(left.compile(storage, cookie)?),
                Box::new(right.compile(storage, cookie)?),
            ),
            ConstraintDescription::Or { left, right } => Constraint::Or(
                Box::new(left.compile(storage, cookie)?),
                Box::new(right.compile(storage, cookie)?),
            ),
            ConstraintDescription::Negate { constraint } => {
                Constraint::Negate(Box::new(constraint.compile(storage, cookie)?))
            }
        })
    }
}

fn find_edge(storage: &GraphStorage, edge: &EdgeDescription) -> Result<LinkId, PlanError> {
    Ok(storage.find_link(&edge.src, &edge.dst, edge.src_port, edge.dst_port)?)
}
