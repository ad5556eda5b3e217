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

//! Module containing all basic type definitions.

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type IndexType = u32;

/// Node identification (and index into the graph).
pub type NodeId = NodeIndex<IndexType>;

/// Link identification (and edge index into the graph).
pub type LinkId = EdgeIndex<IndexType>;

/// Handle of an interned path. The raw value is the path's tag: tags are
/// unique across all non-empty paths of a storage, and the empty path always
/// has tag 0.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathId(pub(crate) u32);

impl PathId {
    /// The tag of the path, unique within its storage.
    pub fn tag(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path#{}", self.0)
    }
}

/// Bandwidth of a link, in bits per second.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bandwidth(u64);

impl Bandwidth {
    /// Create a new bandwidth from a number of bits per second.
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    /// Create a new bandwidth from a number of kilobits per second.
    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps * 1_000)
    }

    /// Create a new bandwidth from a number of megabits per second.
    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps * 1_000_000)
    }

    /// The raw number of bits per second.
    pub const fn bps(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 1_000_000_000 && self.0 % 1_000_000_000 == 0 {
            write!(f, "{}Gbps", self.0 / 1_000_000_000)
        } else if self.0 >= 1_000_000 && self.0 % 1_000_000 == 0 {
            write!(f, "{}Mbps", self.0 / 1_000_000)
        } else if self.0 >= 1_000 && self.0 % 1_000 == 0 {
            write!(f, "{}kbps", self.0 / 1_000)
        } else {
            write!(f, "{}bps", self.0)
        }
    }
}

/// Error thrown by the network model and the simulation core.
#[derive(Debug, Error)]
pub enum NetError {
    /// The node name is not present in the storage.
    #[error("node was not found in the graph: {0}")]
    NodeNotFound(String),
    /// There is no link between the two nodes (or none with the requested
    /// ports).
    #[error("link does not exist: {src} -> {dst}")]
    LinkNotFound {
        /// Source node name.
        src: String,
        /// Destination node name.
        dst: String,
    },
    /// A link description without a source or destination name.
    #[error("link source or destination missing")]
    MissingEndpoint,
    /// A link whose source and destination are the same node.
    #[error("link source is the same as its destination: {0}")]
    SelfLoop(String),
    /// A new link must carry both port numbers.
    #[error("source or destination port missing for new link from {src} to {dst}")]
    MissingPort {
        /// Source node name.
        src: String,
        /// Destination node name.
        dst: String,
    },
    /// The requested ports match an existing link only partially.
    #[error("ports of link {src} -> {dst} match an existing link only partially")]
    InconsistentPorts {
        /// Source node name.
        src: String,
        /// Destination node name.
        dst: String,
    },
    /// Links must have a strictly positive delay.
    #[error("link {src} -> {dst} must have a positive delay")]
    ZeroDelay {
        /// Source node name.
        src: String,
        /// Destination node name.
        dst: String,
    },
    /// Links must have a strictly positive bandwidth.
    #[error("link {src} -> {dst} must have a positive bandwidth")]
    ZeroBandwidth {
        /// Source node name.
        src: String,
        /// Destination node name.
        dst: String,
    },
    /// A reverse-link lookup found no reverse link.
    #[error("link {0} has no reverse link")]
    NoReverse(String),
    /// A reverse-link lookup found more than one reverse link.
    #[error("link {0} has more than one reverse link")]
    AmbiguousReverse(String),
    /// The path string does not parse.
    #[error("path string malformed: {0}")]
    MalformedPathString(String),
    /// The same link appears twice in a link sequence.
    #[error("duplicate link in sequence: {0}")]
    DuplicateLink(String),
    /// Two consecutive links of a sequence do not share a node.
    #[error("link sequence is not contiguous at {0}")]
    DiscontiguousSequence(String),
    /// The node does not belong to any cluster.
    #[error("node {0} is not in any cluster")]
    NotInCluster(String),
    /// A packet capture with an unknown magic number.
    #[error("unknown packet capture magic: {0:#010x}")]
    BadCaptureMagic(u32),
    /// A packet capture record ends in the middle of a header.
    #[error("truncated packet capture record")]
    TruncatedCapture,
    /// The capture was taken on a link layer this reader does not decode.
    #[error("unsupported capture link type: {0}")]
    UnsupportedLinkType(u32),
    /// Downscaling parameters are out of range.
    #[error("invalid downscale parameters: index {index} of {n}")]
    BadDownscale {
        /// Number of output bins.
        n: u64,
        /// The requested bin.
        index: u64,
    },
    /// I/O error while reading a capture.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
