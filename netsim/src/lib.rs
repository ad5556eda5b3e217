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

#![deny(missing_docs, missing_debug_implementations)]

//! # NetSim
//!
//! A library for modelling directed, weighted multigraphs of network nodes
//! and links, and for simulating packet flows over them in virtual time.
//!
//! ## Main concepts
//!
//! The [`net::GraphStorage`] is the main data structure for the network
//! model. It interns nodes (by name), links (by endpoint and port pair) and
//! paths (by link sequence and grouping cookie), and hands out cheap, stable
//! handles ([`types::NodeId`], [`types::LinkId`], [`types::PathId`]) backed
//! by a [Petgraph](https://docs.rs/petgraph/latest/petgraph/index.html)
//! stable graph.
//!
//! The simulation core lives in [`event`]: virtual time is a 64-bit tick
//! counter ([`event::EventTime`]), and an [`event::EventQueue`] dispatches
//! events to [`event::EventConsumer`]s in non-decreasing time order. Two
//! queue implementations exist: [`event::SimTimeEventQueue`] (simulated
//! time, picosecond ticks) and [`event::RealTimeEventQueue`] (wallclock
//! time, nanosecond ticks).
//!
//! Packet forwarding is built from [`pipe::Pipe`]s (fixed delay) and
//! [`queue::PacketQueue`]s (rate-limited, bounded buffers with tail-drop or
//! random-drop policies), both driven by the event queue. Queue drain rates
//! can be animated over virtual time with [`animator::LinearAnimator`].
//! Offline packet captures can be replayed into a simulation with
//! [`pcap::PcapPacketGen`] and [`pcap::BulkPacketGenerator`].

pub mod animator;
pub mod collections;
pub mod enforcer;
pub mod event;
pub mod formatter;
pub mod net;
pub mod packet;
pub mod pcap;
pub mod pipe;
pub mod queue;
pub mod stats;
pub mod types;

#[cfg(test)]
mod test;

/// Re-export of the most commonly used types.
pub mod prelude {
    pub use crate::event::{
        ConsumerRef, EventConsumer, EventQueue, EventTime, RealTimeEventQueue, SimTimeEventQueue,
    };
    pub use crate::formatter::NetFormatter;
    pub use crate::net::{GraphDescription, GraphStorage, LinkDescription, LinkSequence};
    pub use crate::packet::{FiveTuple, HandlerRef, Packet, PacketHandler};
    pub use crate::types::{Bandwidth, LinkId, NetError, NodeId, PathId};
}
