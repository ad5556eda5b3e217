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

//! A pipe adds a constant delay to all incoming packets.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::event::{ConsumerRef, EventConsumer, EventQueue, EventTime};
use crate::net::GraphStorage;
use crate::packet::{HandlerRef, Packet, PacketHandler};
use crate::types::LinkId;

/// Statistics about a [`Pipe`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipeStats {
    /// Number of packets that exited the pipe.
    pub pkts_tx: u64,
    /// Number of bytes that exited the pipe.
    pub bytes_tx: u64,
    /// Number of packets currently in flight.
    pub pkts_in_flight: u64,
    /// Number of bytes currently in flight.
    pub bytes_in_flight: u64,
}

/// A fixed-delay pipe. On ingress of a packet at time `t`, its delivery to
/// the downstream handler is scheduled at `t + delay`. The downstream
/// reference is non-owning from the topology's point of view: the topology
/// builder owns both ends.
pub struct Pipe {
    id: String,
    delay: EventTime,
    me: Weak<RefCell<Pipe>>,
    other_end: Option<HandlerRef>,
    // in-flight packets with their exit times; FIFO because the delay is
    // the same for every packet
    in_flight: VecDeque<(EventTime, Packet)>,
    stats: PipeStats,
}

impl Pipe {
    /// Create a new pipe with the given delay (in ticks of the queue that
    /// will drive it).
    pub fn new(src: &str, dst: &str, delay: EventTime) -> Rc<RefCell<Pipe>> {
        Rc::new_cyclic(|me| {
            RefCell::new(Pipe {
                id: format!("pipe_{src}_{dst}"),
                delay,
                me: me.clone(),
                other_end: None,
                in_flight: VecDeque::new(),
                stats: PipeStats::default(),
            })
        })
    }

    /// Create a pipe for a graph link, taking the delay from the link.
    pub fn from_link(
        storage: &GraphStorage,
        link: LinkId,
        queue: &dyn EventQueue,
    ) -> Rc<RefCell<Pipe>> {
        let l = storage.link(link);
        Self::new(
            storage.node_name(l.src()),
            storage.node_name(l.dst()),
            queue.time_from_duration(l.delay()),
        )
    }

    /// Connect this pipe to a handler. All packets will be processed by the
    /// handler as they exit the pipe.
    pub fn connect(&mut self, handler: HandlerRef) {
        self.other_end = Some(handler);
    }

    /// The statistics of this pipe.
    pub fn stats(&self) -> &PipeStats {
        &self.stats
    }

    fn self_ref(&self) -> ConsumerRef {
        self.me.upgrade().unwrap()
    }
}

impl PacketHandler for Pipe {
    fn handle_packet(&mut self, pkt: Packet, queue: &mut dyn EventQueue) {
        let exit_at = queue.current_time() + self.delay;
        queue.enqueue_at(exit_at, &self.self_ref());
        self.stats.pkts_in_flight += 1;
        self.stats.bytes_in_flight += pkt.size_bytes() as u64;
        self.in_flight.push_back((exit_at, pkt));
    }
}

impl EventConsumer for Pipe {
    fn id(&self) -> &str {
        &self.id
    }

    fn handle_event(&mut self, queue: &mut dyn EventQueue) {
        let now = queue.current_time();
        while matches!(self.in_flight.front(), Some((at, _)) if *at <= now) {
            let (_, pkt) = self.in_flight.pop_front().unwrap();
            self.stats.pkts_in_flight -= 1;
            self.stats.bytes_in_flight -= pkt.size_bytes() as u64;
            self.stats.pkts_tx += 1;
            self.stats.bytes_tx += pkt.size_bytes() as u64;
            match &self.other_end {
                Some(handler) => handler.borrow_mut().handle_packet(pkt, queue),
                None => log::warn!("{}: no downstream handler, packet dropped", self.id),
            }
        }
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("id", &self.id)
            .field("delay", &self.delay)
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
