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

#![deny(missing_docs, missing_debug_implementations)]

//! # PathPlan
//!
//! Path planning over [`netsim`] network graphs: constrained enumeration of
//! loopless paths, a query cache on top of it, and a multi-commodity flow
//! engine backed by linear programming.
//!
//! ## Structure
//!
//! - [`dfs`] compiles a graph into a per-destination search structure
//!   ([`dfs::CompactGraph`]) and enumerates all loopless paths between two
//!   endpoints with [`dfs::Dfs`], pruned by hop count, cumulative weight, a
//!   wallclock budget and composable [`dfs::constraint::Constraint`]s.
//! - [`cache`] caches the full delay-sorted path list per endpoint pair and
//!   serves lowest-delay, k-lowest, k-hops-from-lowest and k-diverse
//!   queries from it.
//! - [`flow`] formulates multi-commodity flow problems over the same graphs
//!   and answers feasibility, max-flow, max-scale and max-increment
//!   queries, recovering per-commodity path decompositions. The LP solver
//!   is wrapped behind the opaque triplet-form bridge in [`flow::lp`].

pub mod cache;
pub mod dfs;
mod error;
pub mod flow;

#[cfg(test)]
mod test;

pub use cache::PathCache;
pub use dfs::constraint::{Constraint, ConstraintDescription};
pub use dfs::{CompactGraph, Dfs, DfsRequest, SearchTermination};
pub use error::PlanError;
pub use flow::{Commodity, FlowAndPath, McProblem};
