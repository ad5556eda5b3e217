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

//! Replay of offline packet captures into the simulation.
//!
//! [`PcapReader`] decodes the classic libpcap file format (Ethernet, IPv4,
//! TCP/UDP); [`PcapPacketGen`] maps trace timestamps to virtual time;
//! [`BulkPacketGenerator`] injects the generated packets into a downstream
//! [`PacketHandler`] as the simulation advances.

use std::cell::RefCell;
use std::io::Read;
use std::rc::{Rc, Weak};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::event::{ConsumerRef, EventConsumer, EventQueue, EventTime};
use crate::packet::{
    AccessPort, FiveTuple, HandlerRef, IpAddress, Packet, PacketHandler, PacketKind, PROTO_TCP,
    PROTO_UDP,
};
use crate::types::NetError;

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_MICROS_SWAPPED: u32 = 0xd4c3_b2a1;
const MAGIC_NANOS: u32 = 0xa1b2_3c4d;
const MAGIC_NANOS_SWAPPED: u32 = 0x4d3c_b2a1;

const LINKTYPE_ETHERNET: u32 = 1;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOrder {
    Le,
    Be,
}

impl FileOrder {
    fn read_u32(&self, buf: &[u8]) -> u32 {
        match self {
            FileOrder::Le => LittleEndian::read_u32(buf),
            FileOrder::Be => BigEndian::read_u32(buf),
        }
    }
}

/// A TCP or UDP packet decoded from a capture, with its trace timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPacket {
    /// Absolute trace timestamp (seconds since the trace epoch).
    pub timestamp: Duration,
    /// The decoded five-tuple.
    pub five_tuple: FiveTuple,
    /// Total IP packet length in bytes.
    pub size_bytes: u32,
    /// Time-to-live of the IP header.
    pub ttl: u8,
    /// IP identification field.
    pub id: u16,
    /// Length of the transport payload in bytes.
    pub payload_len: u16,
    /// Protocol-specific fields.
    pub kind: PacketKind,
}

/// Reader for the classic libpcap file format. Yields the TCP and UDP
/// packets of the capture; anything else (non-Ethernet, non-IPv4, other
/// transports) is skipped.
#[derive(Debug)]
pub struct PcapReader<R> {
    input: R,
    order: FileOrder,
    nano_timestamps: bool,
}

impl<R: Read> PcapReader<R> {
    /// Open a capture, reading and validating the global header.
    pub fn new(mut input: R) -> Result<Self, NetError> {
        let mut header = [0u8; 24];
        input.read_exact(&mut header)?;
        let (order, nano_timestamps) = match LittleEndian::read_u32(&header[..4]) {
            MAGIC_MICROS => (FileOrder::Le, false),
            MAGIC_MICROS_SWAPPED => (FileOrder::Be, false),
            MAGIC_NANOS => (FileOrder::Le, true),
            MAGIC_NANOS_SWAPPED => (FileOrder::Be, true),
            magic => return Err(NetError::BadCaptureMagic(magic)),
        };
        let link_type = order.read_u32(&header[20..24]);
        if link_type != LINKTYPE_ETHERNET {
            return Err(NetError::UnsupportedLinkType(link_type));
        }
        Ok(Self {
            input,
            order,
            nano_timestamps,
        })
    }

    /// Read records until the next TCP/UDP packet, or `None` at the end of
    /// the capture.
    pub fn next_packet(&mut self) -> Result<Option<CapturedPacket>, NetError> {
        loop {
            let mut header = [0u8; 16];
            if !read_exact_or_eof(&mut self.input, &mut header)? {
                return Ok(None);
            }

            let ts_sec = self.order.read_u32(&header[0..4]);
            let ts_frac = self.order.read_u32(&header[4..8]);
            let incl_len = self.order.read_u32(&header[8..12]);
            let nanos = if self.nano_timestamps {
                ts_frac
            } else {
                ts_frac * 1_000
            };
            let timestamp = Duration::new(ts_sec as u64, nanos);

            let mut frame = vec![0u8; incl_len as usize];
            self.input
                .read_exact(&mut frame)
                .map_err(|_| NetError::TruncatedCapture)?;

            if let Some(packet) = decode_frame(timestamp, &frame) {
                return Ok(Some(packet));
            }
        }
    }
}

/// Read the full buffer, distinguishing a clean end-of-stream (`false`)
/// from a mid-header truncation (error).
fn read_exact_or_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<bool, NetError> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..])? {
            0 if filled == 0 => return Ok(false),
            0 => return Err(NetError::TruncatedCapture),
            n => filled += n,
        }
    }
    Ok(true)
}

/// Decode an Ethernet frame down to its five-tuple. Returns `None` for
/// anything that is not IPv4 TCP/UDP.
fn decode_frame(timestamp: Duration, frame: &[u8]) -> Option<CapturedPacket> {
    if frame.len() < 14 {
        return None;
    }
    let mut ethertype = BigEndian::read_u16(&frame[12..14]);
    let mut ip_offset = 14;
    if ethertype == ETHERTYPE_VLAN {
        if frame.len() < 18 {
            return None;
        }
        ethertype = BigEndian::read_u16(&frame[16..18]);
        ip_offset = 18;
    }
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }

    let ip = &frame[ip_offset..];
    if ip.len() < 20 || ip[0] >> 4 != 4 {
        return None;
    }
    let ihl = ((ip[0] & 0x0f) as usize) * 4;
    if ihl < 20 || ip.len() < ihl {
        return None;
    }
    let total_len = BigEndian::read_u16(&ip[2..4]);
    let id = BigEndian::read_u16(&ip[4..6]);
    let ttl = ip[8];
    let proto = ip[9];
    let ip_src = IpAddress::new(BigEndian::read_u32(&ip[12..16]));
    let ip_dst = IpAddress::new(BigEndian::read_u32(&ip[16..20]));

    let transport = &ip[ihl..];
    match proto {
        p if p == PROTO_TCP.0 => {
            if transport.len() < 20 {
                return None;
            }
            let src_port = AccessPort(BigEndian::read_u16(&transport[0..2]));
            let dst_port = AccessPort(BigEndian::read_u16(&transport[2..4]));
            let seq = BigEndian::read_u32(&transport[4..8]);
            let data_offset = ((transport[12] >> 4) as usize) * 4;
            let flags = transport[13];
            let payload_len = (total_len as usize)
                .saturating_sub(ihl)
                .saturating_sub(data_offset) as u16;
            Some(CapturedPacket {
                timestamp,
                five_tuple: FiveTuple::new(ip_src, ip_dst, PROTO_TCP, src_port, dst_port),
                size_bytes: total_len as u32,
                ttl,
                id,
                payload_len,
                kind: PacketKind::Tcp { seq, flags },
            })
        }
        p if p == PROTO_UDP.0 => {
            if transport.len() < 8 {
                return None;
            }
            let src_port = AccessPort(BigEndian::read_u16(&transport[0..2]));
            let dst_port = AccessPort(BigEndian::read_u16(&transport[2..4]));
            let udp_len = BigEndian::read_u16(&transport[4..6]);
            Some(CapturedPacket {
                timestamp,
                five_tuple: FiveTuple::new(ip_src, ip_dst, PROTO_UDP, src_port, dst_port),
                size_bytes: total_len as u32,
                ttl,
                id,
                payload_len: udp_len.saturating_sub(8),
                kind: PacketKind::Udp,
            })
        }
        _ => None,
    }
}

/// A source of packets with pre-assigned virtual send times.
pub trait PacketSource {
    /// The next packet, or `None` when the source is exhausted.
    fn next_packet(&mut self, queue: &dyn EventQueue) -> Result<Option<Packet>, NetError>;
}

/// Generates simulator packets from an offline capture.
///
/// The first packet of the trace arrives at virtual time zero. Every
/// inter-packet gap of at least `max_interpacket_gap` is accumulated into a
/// shift that is subtracted from all subsequent packets, collapsing long
/// silent periods of the trace.
#[derive(Debug)]
pub struct PcapPacketGen<R> {
    reader: PcapReader<R>,
    max_interpacket_gap: Option<Duration>,
    time_shift: Duration,
    first_timestamp: Option<Duration>,
    prev_timestamp: Duration,
    downscale: Option<(u64, u64)>,
}

impl<R: Read> PcapPacketGen<R> {
    /// Create a generator over an open capture.
    pub fn new(reader: PcapReader<R>) -> Self {
        Self {
            reader,
            max_interpacket_gap: None,
            time_shift: Duration::ZERO,
            first_timestamp: None,
            prev_timestamp: Duration::ZERO,
            downscale: None,
        }
    }

    /// Gaps of at least this duration are collapsed.
    pub fn set_max_interpacket_gap(&mut self, gap: Duration) {
        self.max_interpacket_gap = Some(gap);
    }

    /// Only emit packets whose five-tuple hashes into bin `index` out of
    /// `n`; all other packets are dropped silently.
    pub fn enable_downscaling(&mut self, n: u64, index: u64) -> Result<(), NetError> {
        if n < 2 || index >= n {
            return Err(NetError::BadDownscale { n, index });
        }
        self.downscale = Some((n, index));
        Ok(())
    }

    fn ignore(&self, five_tuple: &FiveTuple) -> bool {
        match self.downscale {
            Some((n, index)) => five_tuple.hash() % n != index,
            None => false,
        }
    }

    /// Translate an absolute trace timestamp into virtual time.
    fn virtual_time(&mut self, timestamp: Duration, queue: &dyn EventQueue) -> EventTime {
        let first = match self.first_timestamp {
            None => {
                self.first_timestamp = Some(timestamp);
                self.prev_timestamp = timestamp;
                return EventTime::ZERO;
            }
            Some(first) => first,
        };

        assert!(
            timestamp >= self.prev_timestamp,
            "decreasing timestamp in capture"
        );
        let gap = timestamp - self.prev_timestamp;
        if matches!(self.max_interpacket_gap, Some(max) if gap >= max) {
            self.time_shift += gap;
            log::info!("collapsing inter-packet gap of {gap:?}");
        }
        self.prev_timestamp = timestamp;

        let since_start = timestamp - first;
        queue.time_from_duration(since_start - self.time_shift)
    }
}

impl<R: Read> PacketSource for PcapPacketGen<R> {
    fn next_packet(&mut self, queue: &dyn EventQueue) -> Result<Option<Packet>, NetError> {
        loop {
            let captured = match self.reader.next_packet()? {
                Some(captured) => captured,
                None => return Ok(None),
            };
            if self.ignore(&captured.five_tuple) {
                continue;
            }

            let at = self.virtual_time(captured.timestamp, queue);
            let mut packet = match captured.kind {
                PacketKind::Tcp { seq, flags } => {
                    let mut p = Packet::tcp(captured.five_tuple, captured.size_bytes, at, seq);
                    p.set_flags(flags);
                    p
                }
                PacketKind::Udp => Packet::udp(captured.five_tuple, captured.size_bytes, at),
            };
            packet.set_ttl(captured.ttl);
            packet.set_id(captured.id);
            packet.set_payload_len(captured.payload_len);
            return Ok(Some(packet));
        }
    }
}

/// An event consumer that drains a set of [`PacketSource`]s and injects
/// their packets into a downstream handler at the packets' virtual send
/// times.
pub struct BulkPacketGenerator {
    id: String,
    me: Weak<RefCell<BulkPacketGenerator>>,
    sources: Vec<Box<dyn PacketSource>>,
    pending: Vec<Option<Packet>>,
    out: HandlerRef,
}

impl BulkPacketGenerator {
    /// Create a new generator, prime all sources and schedule the first
    /// injection.
    pub fn new(
        id: impl Into<String>,
        sources: Vec<Box<dyn PacketSource>>,
        out: HandlerRef,
        queue: &mut dyn EventQueue,
    ) -> Rc<RefCell<BulkPacketGenerator>> {
        let generator = Rc::new_cyclic(|me| {
            RefCell::new(BulkPacketGenerator {
                id: id.into(),
                me: me.clone(),
                sources,
                pending: Vec::new(),
                out,
            })
        });
        {
            let mut this = generator.borrow_mut();
            for i in 0..this.sources.len() {
                let next = this.fetch(i, queue);
                this.pending.push(next);
            }
            if let Some((_, at)) = this.earliest() {
                queue.enqueue_at(at, &(generator.clone() as ConsumerRef));
            }
        }
        generator
    }

    /// Pull the next packet out of one source, logging and ending the
    /// source on errors.
    fn fetch(&mut self, index: usize, queue: &dyn EventQueue) -> Option<Packet> {
        match self.sources[index].next_packet(queue) {
            Ok(next) => next,
            Err(e) => {
                log::warn!("{}: packet source failed: {e}", self.id);
                None
            }
        }
    }

    /// The source index and send time of the earliest pending packet.
    fn earliest(&self) -> Option<(usize, EventTime)> {
        self.pending
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i, p.time_sent())))
            .min_by_key(|(_, at)| *at)
    }
}

impl EventConsumer for BulkPacketGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn handle_event(&mut self, queue: &mut dyn EventQueue) {
        let now = queue.current_time();
        while let Some((index, at)) = self.earliest() {
            if at > now {
                break;
            }
            let packet = self.pending[index].take().unwrap();
            self.out.borrow_mut().handle_packet(packet, queue);
            self.pending[index] = self.fetch(index, queue);
        }
        if let Some((_, at)) = self.earliest() {
            let me = self.me.upgrade().unwrap();
            queue.enqueue_at(at, &(me as ConsumerRef));
        }
    }
}

impl std::fmt::Debug for BulkPacketGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkPacketGenerator")
            .field("id", &self.id)
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}
