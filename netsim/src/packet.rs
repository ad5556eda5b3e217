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

//! Packets, five-tuples and the packet handler interface.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::event::{EventQueue, EventTime};

/// An IPv4 address. Stored as a plain integer.
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Clone, Copy, Serialize, Deserialize,
)]
pub struct IpAddress(u32);

impl IpAddress {
    /// Create an address from its integer form.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The integer form of the address.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for IpAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0.to_be_bytes();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl From<std::net::Ipv4Addr> for IpAddress {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Self(u32::from(addr))
    }
}

/// An access-layer (TCP/UDP) port.
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Clone, Copy, Serialize, Deserialize,
)]
pub struct AccessPort(pub u16);

/// An IP protocol number.
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Clone, Copy, Serialize, Deserialize,
)]
pub struct IpProto(pub u8);

/// The TCP protocol number.
pub const PROTO_TCP: IpProto = IpProto(6);
/// The UDP protocol number.
pub const PROTO_UDP: IpProto = IpProto(17);
/// The ICMP protocol number.
pub const PROTO_ICMP: IpProto = IpProto(1);

/// A combination of source/destination address, protocol and
/// source/destination access-layer ports. Uniquely identifies an IP
/// connection; its hash is cached at construction and can be used for
/// matching.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct FiveTuple {
    ip_src: IpAddress,
    ip_dst: IpAddress,
    proto: IpProto,
    src_port: AccessPort,
    dst_port: AccessPort,
    hash: u64,
}

impl FiveTuple {
    /// Create a new five-tuple, caching its hash.
    pub fn new(
        ip_src: IpAddress,
        ip_dst: IpAddress,
        proto: IpProto,
        src_port: AccessPort,
        dst_port: AccessPort,
    ) -> Self {
        let mut hash = 17u64;
        for v in [
            proto.0 as u64,
            ip_src.raw() as u64,
            ip_dst.raw() as u64,
            src_port.0 as u64,
            dst_port.0 as u64,
        ] {
            hash = hash.wrapping_mul(37).wrapping_add(v);
        }
        Self {
            ip_src,
            ip_dst,
            proto,
            src_port,
            dst_port,
            hash,
        }
    }

    /// The IP source address.
    pub fn ip_src(&self) -> IpAddress {
        self.ip_src
    }

    /// The IP destination address.
    pub fn ip_dst(&self) -> IpAddress {
        self.ip_dst
    }

    /// The IP protocol.
    pub fn proto(&self) -> IpProto {
        self.proto
    }

    /// The access-layer source port.
    pub fn src_port(&self) -> AccessPort {
        self.src_port
    }

    /// The access-layer destination port.
    pub fn dst_port(&self) -> AccessPort {
        self.dst_port
    }

    /// The cached hash value.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// A tuple matching the other side of the connection: source and
    /// destination swapped.
    pub fn reverse(&self) -> FiveTuple {
        FiveTuple::new(
            self.ip_dst,
            self.ip_src,
            self.proto,
            self.dst_port,
            self.src_port,
        )
    }
}

impl PartialEq for FiveTuple {
    fn eq(&self, other: &Self) -> bool {
        self.ip_src == other.ip_src
            && self.ip_dst == other.ip_dst
            && self.proto == other.proto
            && self.src_port == other.src_port
            && self.dst_port == other.dst_port
    }
}

impl Eq for FiveTuple {}

impl std::hash::Hash for FiveTuple {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl std::fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(proto {}, {}:{} -> {}:{})",
            self.proto.0, self.ip_src, self.src_port.0, self.ip_dst, self.dst_port.0
        )
    }
}

/// Protocol-specific packet fields.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketKind {
    /// A TCP segment of a reliable stream.
    Tcp {
        /// Sequence number.
        seq: u32,
        /// TCP flags.
        flags: u8,
    },
    /// A UDP datagram.
    Udp,
}

/// A packet travelling through the simulation.
///
/// Packets are move-only owned values: they are handed from component to
/// component by value and never cloned.
#[derive(Debug)]
pub struct Packet {
    five_tuple: FiveTuple,
    size_bytes: u32,
    time_sent: EventTime,
    ttl: u8,
    id: u16,
    payload_len: u16,
    kind: PacketKind,
}

impl Packet {
    /// Create a new TCP packet.
    pub fn tcp(five_tuple: FiveTuple, size_bytes: u32, time_sent: EventTime, seq: u32) -> Self {
        Self {
            five_tuple,
            size_bytes,
            time_sent,
            ttl: 0,
            id: 0,
            payload_len: 0,
            kind: PacketKind::Tcp { seq, flags: 0 },
        }
    }

    /// Create a new UDP packet.
    pub fn udp(five_tuple: FiveTuple, size_bytes: u32, time_sent: EventTime) -> Self {
        Self {
            five_tuple,
            size_bytes,
            time_sent,
            ttl: 0,
            id: 0,
            payload_len: 0,
            kind: PacketKind::Udp,
        }
    }

    /// The five-tuple of the packet.
    pub fn five_tuple(&self) -> &FiveTuple {
        &self.five_tuple
    }

    /// Total size of the packet in bytes.
    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    /// The virtual time at which the packet was created.
    pub fn time_sent(&self) -> EventTime {
        self.time_sent
    }

    /// Update the send time of the packet.
    pub fn set_time_sent(&mut self, at: EventTime) {
        self.time_sent = at;
    }

    /// Time-to-live.
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Set the time-to-live.
    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }

    /// IP identification field.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Set the IP identification field.
    pub fn set_id(&mut self, id: u16) {
        self.id = id;
    }

    /// Length of the payload in bytes.
    pub fn payload_len(&self) -> u16 {
        self.payload_len
    }

    /// Set the payload length.
    pub fn set_payload_len(&mut self, len: u16) {
        self.payload_len = len;
    }

    /// Protocol-specific fields.
    pub fn kind(&self) -> &PacketKind {
        &self.kind
    }

    /// Set the TCP flags. Has no effect on non-TCP packets.
    pub fn set_flags(&mut self, new_flags: u8) {
        if let PacketKind::Tcp { flags, .. } = &mut self.kind {
            *flags = new_flags;
        }
    }
}

/// An entity that can receive packets.
pub trait PacketHandler {
    /// Process one packet. The event queue is passed in so the handler can
    /// schedule events.
    fn handle_packet(&mut self, pkt: Packet, queue: &mut dyn EventQueue);
}

/// Shared handle to a packet handler.
pub type HandlerRef = Rc<RefCell<dyn PacketHandler>>;

/// A terminal handler that collects the packets it receives, together with
/// the time each one arrived.
#[derive(Debug, Default)]
pub struct PacketSink {
    received: Vec<(EventTime, Packet)>,
}

impl PacketSink {
    /// Create a new, empty sink.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Number of packets received so far.
    pub fn packet_count(&self) -> usize {
        self.received.len()
    }

    /// The received packets with their arrival times.
    pub fn received(&self) -> &[(EventTime, Packet)] {
        &self.received
    }

    /// The arrival time of the last received packet.
    pub fn last_rx_at(&self) -> Option<EventTime> {
        self.received.last().map(|(at, _)| *at)
    }
}

impl PacketHandler for PacketSink {
    fn handle_packet(&mut self, pkt: Packet, queue: &mut dyn EventQueue) {
        self.received.push((queue.current_time(), pkt));
    }
}
