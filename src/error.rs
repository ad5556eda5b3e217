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

//! Error type of the planning layer.

use netsim::types::NetError;
use thiserror::Error;

/// Error thrown by path enumeration, the path cache and the flow engine.
#[derive(Debug, Error)]
pub enum PlanError {
    /// An error of the underlying network model.
    #[error(transparent)]
    Net(#[from] NetError),
    /// The search source is not part of the graph.
    #[error("source vertex not found: {0}")]
    SourceNotFound(String),
    /// The search destination is not part of the graph.
    #[error("destination vertex not found: {0}")]
    DestinationNotFound(String),
    /// The stop-check interval of a search request must be positive.
    #[error("steps to check for stop must be positive")]
    ZeroStopCheckStep,
    /// The wallclock budget of a search request must be positive.
    #[error("max duration must be positive")]
    ZeroDuration,
    /// An avoid-path constraint needs a non-empty path.
    #[error("avoid-path constraint with an empty path")]
    EmptyAvoidPath,
}
